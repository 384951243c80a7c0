//! Object routes: list, upload, download, delete and signed URLs.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;

use super::parse_provider;
use crate::AppState;
use crate::error::{ApiError, ApiResult};
use docgate_core::storage::{SIGNED_URL_TTL_HOURS, SignedUrl, UploadedObject};

/// Creates the object routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/storage/{provider}/buckets/{bucket}/objects",
            get(list_objects),
        )
        .route(
            "/storage/{provider}/buckets/{bucket}/objects/{*key}",
            get(download_object)
                .put(upload_object)
                .delete(delete_object),
        )
        .route(
            "/storage/{provider}/buckets/{bucket}/signed-url",
            post(signed_url),
        )
}

// ============================================================================
// Request Types
// ============================================================================

/// Query for object listing.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Key prefix; empty lists the whole bucket.
    #[serde(default)]
    pub prefix: String,
}

/// Request body for a signed URL.
#[derive(Debug, Deserialize)]
pub struct SignedUrlRequest {
    /// Object key.
    pub key: String,
    /// Validity in hours, 1 to 168.
    pub ttl_hours: u32,
}

// ============================================================================
// Route Handlers
// ============================================================================

/// GET `/storage/{provider}/buckets/{bucket}/objects?prefix=`
async fn list_objects(
    State(state): State<AppState>,
    Path((provider, bucket)): Path<(String, String)>,
    Query(query): Query<ListQuery>,
) -> ApiResult<impl IntoResponse> {
    let provider = parse_provider(&provider)?;
    let objects = state.gateway.list(provider, &bucket, &query.prefix).await?;
    Ok(Json(json!({ "objects": objects })))
}

/// PUT `/storage/{provider}/buckets/{bucket}/objects/{*key}`
///
/// The raw body is the object. `Content-Type` is stored when given and
/// derived from the key otherwise.
async fn upload_object(
    State(state): State<AppState>,
    Path((provider, bucket, key)): Path<(String, String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<UploadedObject>)> {
    let provider = parse_provider(&provider)?;
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty());
    let uploaded = state
        .gateway
        .upload(provider, &bucket, &key, body, content_type)
        .await?;
    Ok((StatusCode::CREATED, Json(uploaded)))
}

/// GET `/storage/{provider}/buckets/{bucket}/objects/{*key}`
async fn download_object(
    State(state): State<AppState>,
    Path((provider, bucket, key)): Path<(String, String, String)>,
) -> ApiResult<impl IntoResponse> {
    let provider = parse_provider(&provider)?;
    let object = state.gateway.download(provider, &bucket, &key).await?;
    Ok(([(header::CONTENT_TYPE, object.content_type)], object.bytes))
}

/// DELETE `/storage/{provider}/buckets/{bucket}/objects/{*key}`
async fn delete_object(
    State(state): State<AppState>,
    Path((provider, bucket, key)): Path<(String, String, String)>,
) -> ApiResult<StatusCode> {
    let provider = parse_provider(&provider)?;
    state.gateway.delete(provider, &bucket, &key).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST `/storage/{provider}/buckets/{bucket}/signed-url`
async fn signed_url(
    State(state): State<AppState>,
    Path((provider, bucket)): Path<(String, String)>,
    Json(payload): Json<SignedUrlRequest>,
) -> ApiResult<Json<SignedUrl>> {
    let provider = parse_provider(&provider)?;
    if !SIGNED_URL_TTL_HOURS.contains(&payload.ttl_hours) {
        return Err(ApiError::bad_request(format!(
            "ttl_hours must be between {} and {}",
            SIGNED_URL_TTL_HOURS.start(),
            SIGNED_URL_TTL_HOURS.end()
        )));
    }
    let signed = state
        .gateway
        .generate_signed_url(provider, &bucket, &payload.key, payload.ttl_hours)
        .await?;
    Ok(Json(signed))
}
