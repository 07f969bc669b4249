use std::error::Error as StdError;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::{
    application::{images::ImageServiceError, repos::RepoError},
    domain::error::DomainError,
    infra::error::InfraError,
};

/// Full error chain kept for the server log. Never sent to clients.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(RepoError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("validation failed: {message}")]
    Validation {
        message: String,
        hint: Option<&'static str>,
    },
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl From<RepoError> for AppError {
    fn from(error: RepoError) -> Self {
        match error {
            RepoError::Domain(domain) => AppError::Domain(domain),
            other => AppError::Repo(other),
        }
    }
}

impl From<ImageServiceError> for AppError {
    fn from(error: ImageServiceError) -> Self {
        match error {
            ImageServiceError::Domain(domain) => AppError::Domain(domain),
            ImageServiceError::Repo(repo) => repo.into(),
            ImageServiceError::Queue(err) => AppError::unexpected(err.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: u16,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<&'static str>,
}

impl AppError {
    pub fn validation(message: impl Into<String>, hint: &'static str) -> Self {
        Self::Validation {
            message: message.into(),
            hint: Some(hint),
        }
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Domain(err) => domain_status(err),
            AppError::Repo(err) if err.is_not_found() => StatusCode::NOT_FOUND,
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Repo(_) | AppError::Infra(_) | AppError::Unexpected(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn public_message(&self) -> String {
        let status = self.status_code();
        match status {
            StatusCode::BAD_REQUEST => format!("Bad Request: {self}"),
            StatusCode::NOT_FOUND => format!("Not Found: {self}"),
            _ => "Internal Server Error".to_string(),
        }
    }

    fn hint(&self) -> Option<&'static str> {
        match self {
            AppError::Validation { hint, .. } => *hint,
            AppError::Domain(DomainError::AlreadyBuilding) => {
                Some("wait for the running build to finish or cancel it first")
            }
            AppError::Domain(DomainError::NoAccount) => {
                Some("send a base64 encoded x-rh-identity header with an account number")
            }
            _ => None,
        }
    }
}

fn domain_status(err: &DomainError) -> StatusCode {
    if err.is_validation() || err.is_conflict() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            error: ErrorDetail {
                code: status.as_u16(),
                message: self.public_message(),
                hint: self.hint(),
            },
        };
        let report = ErrorReport::from_error("application::error::AppError", status, &self);
        let mut response = (status, Json(body)).into_response();
        report.attach(&mut response);
        response
    }
}
