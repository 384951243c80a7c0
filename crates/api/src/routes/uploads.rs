//! Chunked upload routes.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};

use super::parse_provider;
use crate::AppState;
use crate::error::ApiResult;
use docgate_core::storage::{CompletedPart, UploadStatus, UploadedObject};

/// Creates the chunked upload routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/storage/{provider}/uploads", post(initiate_upload))
        .route(
            "/storage/uploads/{upload_id}",
            get(upload_status).delete(abort_upload),
        )
        .route(
            "/storage/uploads/{upload_id}/parts/{part_number}",
            put(upload_part),
        )
        .route("/storage/uploads/{upload_id}/complete", post(complete_upload))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for starting a chunked upload.
#[derive(Debug, Deserialize)]
pub struct InitiateUploadRequest {
    /// Target bucket.
    pub bucket: String,
    /// Target key.
    pub key: String,
    /// Content type of the final object; derived from the key when absent.
    #[serde(default)]
    pub content_type: Option<String>,
}

/// Response for a started upload.
#[derive(Debug, Serialize)]
pub struct InitiateUploadResponse {
    /// Upload identifier for the part and completion calls.
    pub upload_id: String,
}

/// Response for a transferred part.
#[derive(Debug, Serialize)]
pub struct UploadPartResponse {
    /// Part number.
    pub part_number: u32,
    /// Token to echo back on completion.
    pub part_token: String,
}

/// Request body for completing an upload.
#[derive(Debug, Deserialize)]
pub struct CompleteUploadRequest {
    /// Target bucket; must match the initiated upload.
    pub bucket: String,
    /// Target key; must match the initiated upload.
    pub key: String,
    /// Parts to assemble, in any order.
    pub parts: Vec<CompletedPart>,
}

// ============================================================================
// Route Handlers
// ============================================================================

/// POST `/storage/{provider}/uploads`
async fn initiate_upload(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Json(payload): Json<InitiateUploadRequest>,
) -> ApiResult<(StatusCode, Json<InitiateUploadResponse>)> {
    let provider = parse_provider(&provider)?;
    let upload_id = state
        .gateway
        .initiate_upload(
            provider,
            &payload.bucket,
            &payload.key,
            payload.content_type.as_deref(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(InitiateUploadResponse { upload_id })))
}

/// PUT `/storage/uploads/{upload_id}/parts/{part_number}`
async fn upload_part(
    State(state): State<AppState>,
    Path((upload_id, part_number)): Path<(String, u32)>,
    body: Bytes,
) -> ApiResult<Json<UploadPartResponse>> {
    let part_token = state
        .gateway
        .upload_part(&upload_id, part_number, body)
        .await?;
    Ok(Json(UploadPartResponse {
        part_number,
        part_token,
    }))
}

/// POST `/storage/uploads/{upload_id}/complete`
async fn complete_upload(
    State(state): State<AppState>,
    Path(upload_id): Path<String>,
    Json(payload): Json<CompleteUploadRequest>,
) -> ApiResult<Json<UploadedObject>> {
    let uploaded = state
        .gateway
        .complete_upload(&upload_id, &payload.bucket, &payload.key, &payload.parts)
        .await?;
    Ok(Json(uploaded))
}

/// GET `/storage/uploads/{upload_id}`
async fn upload_status(
    State(state): State<AppState>,
    Path(upload_id): Path<String>,
) -> ApiResult<Json<UploadStatus>> {
    Ok(Json(state.gateway.upload_status(&upload_id)?))
}

/// DELETE `/storage/uploads/{upload_id}`
async fn abort_upload(
    State(state): State<AppState>,
    Path(upload_id): Path<String>,
) -> ApiResult<StatusCode> {
    state.gateway.abort_upload(&upload_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};

    use crate::test_support::{app, body_bytes, body_json, empty_request, json_request, send};

    fn put_part(upload_id: &str, n: u32, body: &'static [u8]) -> Request<Body> {
        Request::builder()
            .method("PUT")
            .uri(format!("/api/v1/storage/uploads/{upload_id}/parts/{n}"))
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_chunked_upload_over_http() {
        let (app, _) = app();

        let response = send(
            &app,
            json_request(
                "POST",
                "/api/v1/storage/azure/uploads",
                &json!({ "bucket": "media", "key": "big.bin" }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let upload_id = body_json(response).await["upload_id"]
            .as_str()
            .unwrap()
            .to_string();

        let second = body_json(send(&app, put_part(&upload_id, 2, b"world")).await).await;
        let first = body_json(send(&app, put_part(&upload_id, 1, b"hello ")).await).await;

        let status = body_json(
            send(&app, empty_request("GET", &format!("/api/v1/storage/uploads/{upload_id}"))).await,
        )
        .await;
        assert_eq!(status["state"], "parts_uploading");
        assert_eq!(status["parts"].as_array().map(Vec::len), Some(2));

        let parts: Vec<Value> = [&second, &first]
            .iter()
            .map(|p| json!({ "part_number": p["part_number"], "part_token": p["part_token"] }))
            .collect();
        let response = send(
            &app,
            json_request(
                "POST",
                &format!("/api/v1/storage/uploads/{upload_id}/complete"),
                &json!({ "bucket": "media", "key": "big.bin", "parts": parts }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["size_bytes"], 11);

        let response = send(
            &app,
            empty_request("GET", "/api/v1/storage/azure/buckets/media/objects/big.bin"),
        )
        .await;
        assert_eq!(body_bytes(response).await.as_ref(), b"hello world");
    }

    #[tokio::test]
    async fn test_abort_then_status_is_not_found() {
        let (app, _) = app();
        let response = send(
            &app,
            json_request(
                "POST",
                "/api/v1/storage/gcp/uploads",
                &json!({ "bucket": "media", "key": "a.bin" }),
            ),
        )
        .await;
        let upload_id = body_json(response).await["upload_id"]
            .as_str()
            .unwrap()
            .to_string();
        let uri = format!("/api/v1/storage/uploads/{upload_id}");

        let response = send(&app, empty_request("DELETE", &uri)).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let response = send(&app, empty_request("GET", &uri)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_part_in_completion_is_bad_request() {
        let (app, _) = app();
        let response = send(
            &app,
            json_request(
                "POST",
                "/api/v1/storage/aws/uploads",
                &json!({ "bucket": "media", "key": "a.bin" }),
            ),
        )
        .await;
        let upload_id = body_json(response).await["upload_id"]
            .as_str()
            .unwrap()
            .to_string();

        let response = send(
            &app,
            json_request(
                "POST",
                &format!("/api/v1/storage/uploads/{upload_id}/complete"),
                &json!({
                    "bucket": "media",
                    "key": "a.bin",
                    "parts": [{ "part_number": 1, "part_token": "made-up" }]
                }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "BAD_REQUEST");
    }
}
