//! Resolves the tenant account for each API request.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::error::AppError;
use crate::domain::account::Account;
use crate::domain::error::DomainError;

use super::HttpState;

pub const IDENTITY_HEADER: &str = "x-rh-identity";

#[derive(Debug, Serialize, Deserialize)]
struct IdentityEnvelope {
    identity: Identity,
}

#[derive(Debug, Serialize, Deserialize)]
struct Identity {
    #[serde(default)]
    account_number: String,
}

/// Inserts the resolved [`Account`] into the request extensions. The account
/// is also copied onto the response so the access log can report it.
pub async fn resolve_account(
    State(state): State<HttpState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let account = if state.auth.enabled {
        match account_from_headers(request.headers()) {
            Ok(account) => account,
            Err(err) => return AppError::from(err).into_response(),
        }
    } else {
        state.auth.default_account.clone()
    };

    request.extensions_mut().insert(account.clone());
    let mut response = next.run(request).await;
    response.extensions_mut().insert(account);
    response
}

fn account_from_headers(headers: &HeaderMap) -> Result<Account, DomainError> {
    let raw = headers
        .get(IDENTITY_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(DomainError::NoAccount)?;

    let decoded = STANDARD.decode(raw.trim()).map_err(|err| {
        debug!(
            target = "edge::http::identity",
            error = %err,
            "identity header is not base64"
        );
        DomainError::NoAccount
    })?;

    let envelope: IdentityEnvelope = serde_json::from_slice(&decoded).map_err(|err| {
        debug!(
            target = "edge::http::identity",
            error = %err,
            "identity header is not valid json"
        );
        DomainError::NoAccount
    })?;

    if envelope.identity.account_number.trim().is_empty() {
        return Err(DomainError::NoAccount);
    }
    Account::new(envelope.identity.account_number).map_err(|_| DomainError::NoAccount)
}

/// Builds an identity header value for `account`.
pub fn encode_identity(account: &str) -> String {
    let envelope = IdentityEnvelope {
        identity: Identity {
            account_number: account.to_string(),
        },
    };
    // Serializing two plain strings cannot fail.
    let json = serde_json::to_vec(&envelope).unwrap_or_default();
    STANDARD.encode(json)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            IDENTITY_HEADER,
            HeaderValue::from_str(value).expect("valid header"),
        );
        headers
    }

    #[test]
    fn reads_account_number_from_identity() {
        let headers = headers_with(&encode_identity("6089719"));
        let account = account_from_headers(&headers).expect("account");
        assert_eq!(account.as_str(), "6089719");
    }

    #[test]
    fn missing_header_has_no_account() {
        assert_eq!(
            account_from_headers(&HeaderMap::new()),
            Err(DomainError::NoAccount)
        );
    }

    #[test]
    fn undecodable_header_has_no_account() {
        let headers = headers_with("not base64!");
        assert_eq!(account_from_headers(&headers), Err(DomainError::NoAccount));
    }

    #[test]
    fn empty_account_number_has_no_account() {
        let headers = headers_with(&encode_identity(""));
        assert_eq!(account_from_headers(&headers), Err(DomainError::NoAccount));

        let headers = headers_with(&STANDARD.encode(r#"{"identity":{}}"#));
        assert_eq!(account_from_headers(&headers), Err(DomainError::NoAccount));
    }
}
