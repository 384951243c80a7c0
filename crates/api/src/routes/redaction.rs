//! Redaction session routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::parse_provider;
use crate::AppState;
use crate::error::{ApiError, ApiResult};
use docgate_core::redaction::{
    ApplyOptions, DetectionKind, PreparedSession, RedactionRectangle, SaveTarget, SessionDetails,
};
use docgate_core::storage::UploadedObject;

/// Creates the redaction session routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/redaction/sessions", post(prepare_session))
        .route(
            "/redaction/sessions/{session_id}",
            get(session_details).delete(cleanup_session),
        )
        .route("/redaction/sessions/{session_id}/apply", post(apply_redactions))
        .route("/redaction/sessions/{session_id}/preview", post(preview_page))
        .route("/redaction/sessions/{session_id}/detect", post(detect_sensitive))
        .route("/redaction/sessions/{session_id}/save", post(save_session))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for preparing a session.
#[derive(Debug, Deserialize)]
pub struct PrepareRequest {
    /// Source provider.
    pub provider: String,
    /// Source bucket.
    pub bucket: String,
    /// Source key.
    pub key: String,
}

/// Request body for applying redactions.
#[derive(Debug, Deserialize)]
pub struct ApplyRequest {
    /// Rectangles to paint.
    pub redactions: Vec<RedactionRectangle>,
    /// Call options.
    #[serde(default)]
    pub options: ApplyOptions,
}

/// Response for an apply call.
#[derive(Debug, Serialize)]
pub struct ApplyResponse {
    /// Redacted document, base64.
    pub document: String,
    /// Size of the original document.
    pub original_size: usize,
    /// Size of the redacted document.
    pub redacted_size: usize,
    /// Time spent producing the document.
    pub processing_time_ms: u64,
    /// Rectangles painted.
    pub redactions_applied: usize,
}

/// Request body for a preview.
#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    /// Page to render.
    pub page_number: u32,
    /// Overlays to draw.
    #[serde(default)]
    pub redactions: Vec<RedactionRectangle>,
}

/// Request body for auto-detection.
#[derive(Debug, Deserialize)]
pub struct DetectRequest {
    /// Kinds to look for; empty means all.
    #[serde(default)]
    pub types: Vec<String>,
    /// Minimum confidence to report.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
}

const fn default_confidence_threshold() -> f64 {
    0.5
}

/// Request body for saving. Unset fields default to the source location.
#[derive(Debug, Default, Deserialize)]
pub struct SaveRequest {
    /// Destination provider.
    #[serde(default)]
    pub provider: Option<String>,
    /// Destination bucket.
    #[serde(default)]
    pub bucket: Option<String>,
    /// Destination key.
    #[serde(default)]
    pub key: Option<String>,
}

// ============================================================================
// Route Handlers
// ============================================================================

/// POST `/redaction/sessions`
async fn prepare_session(
    State(state): State<AppState>,
    Json(payload): Json<PrepareRequest>,
) -> ApiResult<(StatusCode, Json<PreparedSession>)> {
    let provider = parse_provider(&payload.provider)?;
    let prepared = state
        .redaction
        .prepare(provider, &payload.bucket, &payload.key)
        .await?;
    Ok((StatusCode::CREATED, Json(prepared)))
}

/// GET `/redaction/sessions/{session_id}`
async fn session_details(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<SessionDetails>> {
    Ok(Json(state.redaction.details(&session_id).await?))
}

/// POST `/redaction/sessions/{session_id}/apply`
async fn apply_redactions(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(payload): Json<ApplyRequest>,
) -> ApiResult<Json<ApplyResponse>> {
    let outcome = state
        .redaction
        .apply(&session_id, payload.redactions, &payload.options)
        .await?;
    Ok(Json(ApplyResponse {
        document: STANDARD.encode(&outcome.document),
        original_size: outcome.original_size,
        redacted_size: outcome.redacted_size,
        processing_time_ms: outcome.processing_time_ms,
        redactions_applied: outcome.redactions_applied,
    }))
}

/// POST `/redaction/sessions/{session_id}/preview`
///
/// Responds with the SVG itself.
async fn preview_page(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(payload): Json<PreviewRequest>,
) -> ApiResult<impl IntoResponse> {
    let preview = state
        .redaction
        .preview(&session_id, payload.page_number, &payload.redactions)
        .await?;
    Ok(([(header::CONTENT_TYPE, preview.content_type)], preview.image))
}

/// POST `/redaction/sessions/{session_id}/detect`
async fn detect_sensitive(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(payload): Json<DetectRequest>,
) -> ApiResult<impl IntoResponse> {
    let kinds = payload
        .types
        .iter()
        .map(|t| t.parse::<DetectionKind>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(ApiError::bad_request)?;
    let suggestions = state
        .redaction
        .auto_detect(&session_id, &kinds, payload.confidence_threshold)
        .await?;
    Ok(Json(json!({ "suggestions": suggestions })))
}

/// POST `/redaction/sessions/{session_id}/save`
async fn save_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    payload: Option<Json<SaveRequest>>,
) -> ApiResult<Json<UploadedObject>> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let target = SaveTarget {
        provider: payload.provider.as_deref().map(parse_provider).transpose()?,
        bucket: payload.bucket,
        key: payload.key,
    };
    Ok(Json(state.redaction.save(&session_id, target).await?))
}

/// DELETE `/redaction/sessions/{session_id}`
async fn cleanup_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<StatusCode> {
    state.redaction.cleanup(&session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
