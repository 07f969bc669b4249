//! HTTP port for the image service.

mod identity;
mod images;
mod middleware;

pub use identity::{IDENTITY_HEADER, encode_identity};

use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use sqlx::Error as SqlxError;

use crate::application::error::ErrorReport;
use crate::application::images::ImageService;
use crate::config::AuthSettings;
use crate::infra::db::PostgresRepositories;

use middleware::{log_responses, set_request_context};

pub const API_PREFIX: &str = "/api/edge/v1";
pub const METRIC_HTTP_REQUEST_MS: &str = "edge_http_request_ms";

#[derive(Clone)]
pub struct HttpState {
    pub images: Arc<ImageService>,
    pub auth: AuthSettings,
    /// Used by the health probe when a database is configured.
    pub db: Option<Arc<PostgresRepositories>>,
}

pub fn build_router(state: HttpState) -> Router {
    let api = Router::new()
        .route(
            "/images",
            get(images::list_images).post(images::create_image),
        )
        .route(
            "/images/{id}",
            get(images::get_image)
                .patch(images::update_image)
                .delete(images::delete_image),
        )
        .route(
            "/images/{id}/update",
            post(images::upgrade_image).delete(images::cancel_upgrade),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            identity::resolve_account,
        ));

    Router::new()
        .nest(API_PREFIX, api)
        .route("/health", get(health))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

async fn health(State(state): State<HttpState>) -> Response {
    match state.db.as_ref() {
        Some(db) => db_health_response(db.health_check().await),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

fn db_health_response(result: Result<(), SqlxError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}
