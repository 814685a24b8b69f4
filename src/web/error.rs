use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use crate::assistant::AssistantError;
use crate::auth::tokens::TokenError;

/// Errors surfaced by HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0} is not configured")]
    MissingConfig(&'static str),
    #[error("{message}")]
    BadRequest { code: &'static str, message: String },
    #[error("not authenticated")]
    NotAuthenticated,
    /// The refresh token is gone or was rejected; the client must log in again.
    #[error("session expired, login required")]
    RequiresLogin,
    #[error("unauthorized")]
    Unauthorized,
    #[error("not found")]
    NotFound,
    /// Non-2xx from a third-party API, relayed with its status and body.
    #[error("upstream returned {status}")]
    Upstream { status: StatusCode, body: Value },
    #[error("upstream unreachable: {0}")]
    BadGateway(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        ApiError::BadRequest { code, message: message.into() }
    }

    /// Short machine-readable code, also used in redirect query strings.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::MissingConfig(_) => "missing_configuration",
            ApiError::BadRequest { code, .. } => *code,
            ApiError::NotAuthenticated => "not_authenticated",
            ApiError::RequiresLogin => "requires_login",
            ApiError::Unauthorized => "unauthorized",
            ApiError::NotFound => "not_found",
            ApiError::Upstream { .. } => "upstream_error",
            ApiError::BadGateway(_) => "bad_gateway",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.code();
        match self {
            ApiError::Upstream { status, body } => {
                tracing::warn!(%status, "relaying upstream error");
                (status, Json(body)).into_response()
            }
            ApiError::RequiresLogin => (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "error": code,
                    "message": "Session expired, please log in again",
                    "requiresLogin": true,
                })),
            )
                .into_response(),
            ApiError::Internal(e) => {
                tracing::error!(error = ?e, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": code, "message": "Internal server error" })),
                )
                    .into_response()
            }
            other => {
                let status = match &other {
                    ApiError::MissingConfig(_) => StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
                    ApiError::NotAuthenticated | ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
                    ApiError::NotFound => StatusCode::NOT_FOUND,
                    ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status.is_server_error() {
                    tracing::error!(error = %other, "request failed");
                } else {
                    tracing::debug!(error = %other, "request rejected");
                }
                (status, Json(json!({ "error": code, "message": other.to_string() }))).into_response()
            }
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Rejected { status, body } | TokenError::Upstream { status, body } => {
                ApiError::Upstream { status, body }
            }
            TokenError::Transport(e) => ApiError::BadGateway(e.to_string()),
            TokenError::Decode(e) => ApiError::BadGateway(format!("malformed token response: {}", e)),
            TokenError::MissingConfig(name) => ApiError::MissingConfig(name),
        }
    }
}

impl From<AssistantError> for ApiError {
    fn from(e: AssistantError) -> Self {
        match e {
            AssistantError::Upstream { status, body } => ApiError::Upstream { status, body },
            AssistantError::Transport(e) => ApiError::BadGateway(e.to_string()),
            AssistantError::Decode(e) => ApiError::BadGateway(format!("malformed assistant response: {}", e)),
            AssistantError::MissingConfig(name) => ApiError::MissingConfig(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(resp: Response) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn missing_config_is_explicit_500() {
        let resp = ApiError::MissingConfig("SPOTIFY_CLIENT_ID").into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(resp).await;
        assert_eq!(body["error"], "missing_configuration");
        assert_eq!(body["message"], "SPOTIFY_CLIENT_ID is not configured");
    }

    #[tokio::test]
    async fn upstream_errors_keep_status_and_body() {
        let resp = ApiError::Upstream {
            status: StatusCode::TOO_MANY_REQUESTS,
            body: json!({"error": {"status": 429, "message": "rate limited"}}),
        }
        .into_response();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = body_json(resp).await;
        assert_eq!(body["error"]["message"], "rate limited");
    }

    #[tokio::test]
    async fn requires_login_flags_the_client() {
        let resp = ApiError::RequiresLogin.into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(resp).await["requiresLogin"], true);
    }

    #[test]
    fn rejected_refresh_maps_to_upstream() {
        let e: ApiError = TokenError::Rejected { status: StatusCode::BAD_REQUEST, body: json!({}) }.into();
        assert!(matches!(e, ApiError::Upstream { status, .. } if status == StatusCode::BAD_REQUEST));
    }
}
