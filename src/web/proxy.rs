use axum::{
    body::Body,
    extract::{OriginalUri, Path, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::{app::AppState, web::session::SpotifySession};

/// Request headers that must not be forwarded to the provider.
const STRIPPED_REQUEST_HEADERS: [&str; 6] = [
    "host",
    "connection",
    "transfer-encoding",
    "content-length",
    "cookie",
    "authorization",
];

/// Route: ANY /api/spotify/{*path}
///
/// Forwards the request to the provider's Web API with the session's bearer
/// token. The upstream status, headers and body are relayed unchanged.
pub async fn proxy_request(
    State(state): State<AppState>,
    SpotifySession { access_token, .. }: SpotifySession,
    Path(path): Path<String>,
    method: Method,
    headers: HeaderMap,
    OriginalUri(uri): OriginalUri,
    body: Body,
) -> Result<Response, ProxyError> {
    let api_base = state.config.spotify.api_base_url.as_str();
    let target_url = build_target_url(api_base, &path, uri.query())?;

    tracing::info!(method = %method, path = %path, "proxying provider request");

    forward_request(&state.http, &target_url, method, headers, body, &access_token)
        .await
        .map_err(|e| {
            tracing::error!(error = ?e, target_url = %target_url, "forward request failed");
            e
        })
}

/// Joins `path` onto the API base, rejecting anything that could escape it.
fn build_target_url(api_base: &str, path: &str, query: Option<&str>) -> Result<String, ProxyError> {
    if path.contains("..") || path.starts_with("//") || path.contains('@') {
        return Err(ProxyError::InvalidPath);
    }

    let base_url = format!("{}/{}", api_base.trim_end_matches('/'), path.trim_start_matches('/'));
    let target_url = match query.filter(|q| !q.is_empty()) {
        Some(query) => format!("{}?{}", base_url, query),
        None => base_url,
    };

    let target = url::Url::parse(&target_url).map_err(|_| ProxyError::InvalidPath)?;
    let base = url::Url::parse(api_base).map_err(|e| ProxyError::Internal(format!("bad api base: {}", e)))?;
    if target.host() != base.host() || target.port_or_known_default() != base.port_or_known_default() {
        tracing::error!(target = %target_url, base = %api_base, "proxy target host mismatch");
        return Err(ProxyError::HostMismatch);
    }
    Ok(target_url)
}

async fn forward_request(
    client: &reqwest::Client,
    url: &str,
    method: Method,
    mut headers: HeaderMap,
    body: Body,
    access_token: &str,
) -> Result<Response, ProxyError> {
    for name in STRIPPED_REQUEST_HEADERS {
        headers.remove(name);
    }

    // 10 MiB cap so a single request cannot exhaust memory
    const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;
    let body_bytes = axum::body::to_bytes(body, MAX_BODY_SIZE)
        .await
        .map_err(|e| ProxyError::BodyTooLarge(e.to_string()))?;

    let mut req = client
        .request(
            reqwest::Method::from_bytes(method.as_str().as_bytes())
                .map_err(|_| ProxyError::Internal("invalid method".to_string()))?,
            url,
        )
        .bearer_auth(access_token);

    for (name, value) in headers.iter() {
        if let Ok(val) = value.to_str() {
            req = req.header(name.as_str(), val);
        }
    }

    if !body_bytes.is_empty() {
        req = req.body(body_bytes);
    }

    let response = req
        .send()
        .await
        .map_err(|e| ProxyError::Upstream(e.to_string()))?;

    let status = response.status().as_u16();
    let upstream_headers = response.headers().clone();
    let body_bytes = response
        .bytes()
        .await
        .map_err(|e| ProxyError::Upstream(e.to_string()))?;

    let mut res = Response::builder().status(status);
    for (name, value) in upstream_headers.iter() {
        let name = name.as_str();
        if name != "connection" && name != "transfer-encoding" && name != "content-length" {
            res = res.header(name, value.as_bytes());
        }
    }

    res.body(Body::from(body_bytes))
        .map_err(|e| ProxyError::Internal(format!("failed to build response: {}", e)))
}

#[derive(Debug)]
pub enum ProxyError {
    InvalidPath,
    HostMismatch,
    BodyTooLarge(String),
    Upstream(String),
    Internal(String),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ProxyError::InvalidPath => (StatusCode::BAD_REQUEST, "invalid_path", "Invalid proxy path".to_string()),
            ProxyError::HostMismatch => (StatusCode::BAD_REQUEST, "invalid_path", "Target host mismatch".to_string()),
            ProxyError::BodyTooLarge(err) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "body_too_large",
                format!("Failed to read request body: {}", err),
            ),
            ProxyError::Upstream(err) => (
                StatusCode::BAD_GATEWAY,
                "bad_gateway",
                format!("Upstream provider error: {}", err),
            ),
            ProxyError::Internal(err) => {
                tracing::error!(error = %err, "proxy internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "Internal server error".to_string())
            }
        };

        (status, Json(json!({ "error": code, "message": message }))).into_response()
    }
}
