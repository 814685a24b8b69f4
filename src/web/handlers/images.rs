use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;
use time::OffsetDateTime;

use crate::app::AppState;
use crate::cleanup::{self, CleanupReport};
use crate::models::assistant::AssistantType;
use crate::web::ApiError;

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageQuery {
    pub assistant_type: AssistantType,
}

// POST /api/images
pub async fn upload_image(
    State(state): State<AppState>,
    Query(q): Query<ImageQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !content_type.starts_with("image/png") {
        return Err(ApiError::bad_request("unsupported_media_type", "Only image/png uploads are accepted"));
    }
    if body.is_empty() || !body.starts_with(&PNG_SIGNATURE) {
        return Err(ApiError::bad_request("invalid_image", "Body is not a PNG image"));
    }

    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let pathname = cleanup::image_pathname(q.assistant_type.as_str(), OffsetDateTime::now_utc(), &suffix[..8]);
    let size = body.len();
    let blob = state.blobs.put(&pathname, body, "image/png").await?;
    tracing::info!(pathname = %blob.pathname, size, "stored generated image");

    Ok((StatusCode::CREATED, Json(json!({ "url": blob.url, "pathname": blob.pathname }))))
}

/// Compares without short-circuiting on the first differing byte.
fn secret_matches(provided: &str, expected: &str) -> bool {
    let (a, b) = (provided.as_bytes(), expected.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

// POST /api/cleanup
pub async fn run_cleanup(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<CleanupReport>, ApiError> {
    let secret = state
        .config
        .server
        .cron_secret
        .as_deref()
        .ok_or(ApiError::MissingConfig("CRON_SECRET"))?;

    let provided = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if !provided.is_some_and(|p| secret_matches(p, secret)) {
        tracing::warn!("cleanup called without a valid cron secret");
        return Err(ApiError::Unauthorized);
    }

    let retention = time::Duration::hours(state.config.blob.image_retention_hours);
    let report = cleanup::sweep_images(state.blobs.as_ref(), retention, OffsetDateTime::now_utc()).await?;
    Ok(Json(report))
}
