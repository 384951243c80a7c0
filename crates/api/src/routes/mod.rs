//! API route definitions.

use axum::Router;

use crate::AppState;
use crate::error::ApiError;
use docgate_core::storage::Provider;

pub mod health;
pub mod redaction;
pub mod storage;
pub mod uploads;

/// Creates the API router with all routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(storage::routes())
        .merge(uploads::routes())
        .merge(redaction::routes())
}

/// Parse a provider identifier from a path or body.
pub(crate) fn parse_provider(raw: &str) -> Result<Provider, ApiError> {
    raw.parse::<Provider>().map_err(ApiError::from)
}
