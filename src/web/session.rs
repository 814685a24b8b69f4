use axum::{extract::FromRequestParts, http::request::Parts};
use std::future::Future;
use time::OffsetDateTime;
use tower_cookies::Cookies;

use crate::app::AppState;
use crate::auth::session;
use crate::auth::tokens::TokenError;
use crate::web::ApiError;

/// Extractor that guarantees a usable provider access token.
///
/// Reads the session cookies and, when the access token has expired,
/// refreshes it before the handler runs. New cookies are queued on the
/// request's cookie jar and land on whatever response the handler returns.
///
/// ```ignore
/// async fn handler(SpotifySession { access_token, .. }: SpotifySession) -> impl IntoResponse {
///     format!("token: {}", access_token.len())
/// }
/// ```
pub struct SpotifySession {
    pub access_token: String,
    pub cookies: Cookies,
}

impl FromRequestParts<AppState> for SpotifySession {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            let cookies = Cookies::from_request_parts(parts, state).await.map_err(|(status, msg)| {
                tracing::error!(%status, msg, "cookie layer missing");
                ApiError::Internal(anyhow::anyhow!("cookie extraction failed: {}", msg))
            })?;
            let access_token = ensure_access_token(state, &cookies).await?;
            Ok(SpotifySession { access_token, cookies })
        }
    }
}

/// Returns a non-expired access token, refreshing the session if needed.
pub async fn ensure_access_token(state: &AppState, cookies: &Cookies) -> Result<String, ApiError> {
    let tokens = session::read_tokens(cookies, &state.cookie_key);
    if tokens.is_empty() {
        return Err(ApiError::NotAuthenticated);
    }

    let now = OffsetDateTime::now_utc().unix_timestamp();
    if !tokens.needs_refresh(now) {
        if let Some(token) = tokens.access_token {
            return Ok(token);
        }
    }

    let Some(refresh_token) = tokens.refresh_token else {
        tracing::info!("access token expired and no refresh token present");
        session::clear_session(cookies);
        return Err(ApiError::RequiresLogin);
    };

    let (access_token, _) = refresh_session(state, cookies, &refresh_token).await?;
    Ok(access_token)
}

/// Exchanges `refresh_token` for new credentials and rewrites the session
/// cookies. Returns the new access token and its expiry (unix seconds).
///
/// A rejected refresh token clears the session and yields
/// [`ApiError::RequiresLogin`]; any other failure leaves the cookies alone.
pub async fn refresh_session(
    state: &AppState,
    cookies: &Cookies,
    refresh_token: &str,
) -> Result<(String, i64), ApiError> {
    let result = state
        .refresh_locks
        .run(refresh_token, || state.tokens.refresh(refresh_token))
        .await;

    match result {
        Ok(grant) => {
            let spotify = &state.config.spotify;
            let expires_at = session::write_tokens(
                cookies,
                &state.cookie_key,
                state.config.server.secure_cookies,
                &grant,
                OffsetDateTime::now_utc(),
                spotify.expiry_margin_secs,
                spotify.refresh_cookie_days,
            );
            tracing::debug!(expires_at, rotated = grant.refresh_token.is_some(), "session refreshed");
            Ok((grant.access_token, expires_at))
        }
        Err(TokenError::Rejected { status, .. }) => {
            tracing::warn!(%status, "refresh token rejected, clearing session");
            session::clear_session(cookies);
            Err(ApiError::RequiresLogin)
        }
        Err(e) => {
            tracing::error!(error = ?e, "token refresh failed");
            Err(e.into())
        }
    }
}
