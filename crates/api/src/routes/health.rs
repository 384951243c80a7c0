//! Health check endpoint.

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::AppState;
use docgate_core::storage::Provider;

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: &'static str,
    /// Service version.
    pub version: &'static str,
    /// Providers with a configured connection.
    pub providers: Vec<Provider>,
    /// Chunked uploads being tracked.
    pub active_uploads: usize,
    /// Redaction sessions held in memory.
    pub active_sessions: usize,
}

/// GET `/health`
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        providers: state.gateway.configured_providers(),
        active_uploads: state.gateway.active_uploads(),
        active_sessions: state.redaction.active_sessions(),
    })
}

/// Creates health check routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::test_support::{app, body_json, empty_request, send};

    #[tokio::test]
    async fn test_health_lists_providers() {
        let (app, _) = app();
        let response = send(&app, empty_request("GET", "/api/v1/health")).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["providers"], serde_json::json!(["gcp", "aws", "azure"]));
        assert_eq!(body["active_sessions"], 0);
    }
}
