//! HTTP API layer with Axum routes.
//!
//! This crate provides:
//! - REST routes for the storage gateway and redaction sessions
//! - Domain error to HTTP response mapping
//! - Request and response types

pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use docgate_core::redaction::RedactionService;
use docgate_core::storage::StorageGateway;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Storage gateway over the configured providers.
    pub gateway: Arc<StorageGateway>,
    /// Redaction session manager.
    pub redaction: Arc<RedactionService>,
}

impl AppState {
    /// Create application state.
    #[must_use]
    pub const fn new(gateway: Arc<StorageGateway>, redaction: Arc<RedactionService>) -> Self {
        Self { gateway, redaction }
    }
}

/// Creates the main application router.
///
/// `max_body_bytes` caps raw uploads and parts as well as JSON bodies.
pub fn create_router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes())
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use axum::Router;
    use axum::body::{Body, Bytes};
    use axum::http::{Request, Response};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    use docgate_core::redaction::{RedactionConfig, RedactionService};
    use docgate_core::storage::{GatewayConfig, StorageGateway};

    use crate::{AppState, create_router};

    /// Router over in-process providers.
    pub(crate) fn app() -> (Router, AppState) {
        let gateway = Arc::new(StorageGateway::new(&GatewayConfig::in_memory()));
        let redaction = Arc::new(RedactionService::new(
            Arc::clone(&gateway),
            RedactionConfig::default(),
        ));
        let state = AppState::new(gateway, redaction);
        (create_router(state.clone(), 8 * 1024 * 1024), state)
    }

    pub(crate) async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
        app.clone().oneshot(request).await.unwrap()
    }

    pub(crate) fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub(crate) fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    pub(crate) async fn body_bytes(response: Response<Body>) -> Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    pub(crate) async fn body_json(response: Response<Body>) -> Value {
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }
}
