use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::AppConfig;

/// Successful response from the provider's token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Lifetime in seconds as reported by the provider
    pub expires_in: i64,
    /// Only present on code exchange and on rotating refreshes
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// The provider refused the refresh token; the session cannot be recovered.
    #[error("refresh token rejected by provider ({status})")]
    Rejected { status: StatusCode, body: Value },
    #[error("token endpoint returned {status}")]
    Upstream { status: StatusCode, body: Value },
    #[error("token endpoint unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed token response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("{0} is not configured")]
    MissingConfig(&'static str),
}

/// Thin client for the identity provider's token endpoint.
///
/// Every call is a single attempt; callers decide what a failure means.
#[derive(Debug, Clone)]
pub struct TokenClient {
    http: reqwest::Client,
    token_url: String,
    redirect_uri: String,
    client_id: Option<String>,
    client_secret: Option<String>,
}

impl TokenClient {
    pub fn from_config(cfg: &AppConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            token_url: cfg.spotify.token_url.clone(),
            redirect_uri: cfg.redirect_uri(),
            client_id: cfg.spotify.client_id.clone(),
            client_secret: cfg.spotify.client_secret.clone(),
        }
    }

    pub async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<TokenGrant, TokenError> {
        let client_id = self.client_id()?;
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("client_id", client_id),
            ("code_verifier", code_verifier),
        ];
        self.post_form(&form)
            .await?
            .map_err(|(status, body)| TokenError::Upstream { status, body })
    }

    /// A 400 or 401 means the refresh token is dead, anything else is treated
    /// as transient.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, TokenError> {
        let client_id = self.client_id()?;
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", client_id),
        ];
        self.post_form(&form).await?.map_err(|(status, body)| {
            if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
                TokenError::Rejected { status, body }
            } else {
                TokenError::Upstream { status, body }
            }
        })
    }

    fn client_id(&self) -> Result<&str, TokenError> {
        self.client_id
            .as_deref()
            .ok_or(TokenError::MissingConfig("SPOTIFY_CLIENT_ID"))
    }

    async fn post_form(
        &self,
        form: &[(&str, &str)],
    ) -> Result<Result<TokenGrant, (StatusCode, Value)>, TokenError> {
        let mut req = self.http.post(&self.token_url).form(form);
        if let (Some(id), Some(secret)) = (&self.client_id, &self.client_secret) {
            req = req.basic_auth(id, Some(secret));
        }

        let response = req.send().await?;
        let status = StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
        let bytes = response.bytes().await?;

        if !status.is_success() {
            tracing::warn!(%status, "token endpoint rejected request");
            return Ok(Err((status, upstream_body(&bytes))));
        }

        Ok(Ok(serde_json::from_slice(&bytes)?))
    }
}

/// Provider error bodies are relayed as-is when they are JSON.
pub fn upstream_body(bytes: &[u8]) -> Value {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(v) => v,
        Err(_) => json!({
            "error": "upstream_error",
            "message": String::from_utf8_lossy(bytes),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grant_without_refresh_token_parses() {
        let g: TokenGrant = serde_json::from_str(
            r#"{"access_token":"a","token_type":"Bearer","expires_in":3600,"scope":"user-top-read"}"#,
        )
        .unwrap();
        assert_eq!(g.expires_in, 3600);
        assert!(g.refresh_token.is_none());
    }

    #[test]
    fn upstream_body_keeps_json_and_wraps_text() {
        assert_eq!(upstream_body(br#"{"error":"invalid_grant"}"#), json!({"error": "invalid_grant"}));
        let wrapped = upstream_body(b"Bad Gateway");
        assert_eq!(wrapped["message"], "Bad Gateway");
    }
}
