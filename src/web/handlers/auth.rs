use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use time::OffsetDateTime;
use tower_cookies::Cookies;

use crate::app::AppState;
use crate::auth::{pkce, session};
use crate::spotify::SpotifyApi;
use crate::web::session::{refresh_session, SpotifySession};
use crate::web::ApiError;

/// Generates the PKCE handshake and stores its secrets in cookies.
fn begin_handshake(state: &AppState, cookies: &Cookies) -> Result<pkce::AuthorizationRequest, ApiError> {
    let client_id = state
        .config
        .spotify
        .client_id
        .as_deref()
        .ok_or(ApiError::MissingConfig("SPOTIFY_CLIENT_ID"))?;

    let req = pkce::authorization_request(&state.config.spotify, client_id, &state.config.redirect_uri())?;
    session::write_handshake(
        cookies,
        &state.cookie_key,
        state.config.server.secure_cookies,
        &req.code_verifier,
        &req.state,
    );
    tracing::debug!("issued authorization request");
    Ok(req)
}

// GET /api/auth/authorize
pub async fn authorize(State(state): State<AppState>, cookies: Cookies) -> Result<Json<serde_json::Value>, ApiError> {
    let req = begin_handshake(&state, &cookies)?;
    Ok(Json(json!({
        "url": req.url,
        "state": req.state,
        "codeVerifier": req.code_verifier,
    })))
}

// GET /api/auth/login
pub async fn login(State(state): State<AppState>, cookies: Cookies) -> Result<Redirect, ApiError> {
    let req = begin_handshake(&state, &cookies)?;
    Ok(Redirect::temporary(&req.url))
}

/// Validates the callback parameters against the handshake cookies, redeems
/// the code and writes the session. Returns the access token expiry.
async fn complete_exchange(
    state: &AppState,
    cookies: &Cookies,
    code: Option<&str>,
    param_state: Option<&str>,
    fallback_verifier: Option<&str>,
) -> Result<i64, ApiError> {
    let code = code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::bad_request("missing_code", "Authorization code is missing"))?;

    let handshake = session::read_handshake(cookies, &state.cookie_key);
    if let (Some(expected), Some(received)) = (handshake.state.as_deref(), param_state) {
        if expected != received {
            tracing::warn!("authorization state mismatch");
            return Err(ApiError::bad_request("state_mismatch", "Authorization state does not match"));
        }
    }

    let verifier = handshake
        .code_verifier
        .or_else(|| fallback_verifier.filter(|v| !v.is_empty()).map(str::to_string))
        .ok_or_else(|| {
            ApiError::bad_request("auth_flow_interrupted", "Authorization flow was interrupted, please start again")
        })?;

    let grant = state.tokens.exchange_code(code, &verifier).await?;

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
    session::clear_handshake(cookies);
    tracing::info!(expires_at, "session established");
    Ok(expires_at)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBody {
    pub code: Option<String>,
    pub state: Option<String>,
    pub code_verifier: Option<String>,
}

// POST /api/auth/token
pub async fn token(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(body): Json<TokenBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let expires_at = complete_exchange(
        &state,
        &cookies,
        body.code.as_deref(),
        body.state.as_deref(),
        body.code_verifier.as_deref(),
    )
    .await?;
    Ok(Json(json!({ "success": true, "expiresAt": expires_at })))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

// GET /api/auth/callback
pub async fn callback(State(state): State<AppState>, cookies: Cookies, Query(q): Query<CallbackQuery>) -> Redirect {
    if let Some(error) = q.error.as_deref() {
        tracing::warn!(error, description = ?q.error_description, "provider returned an authorization error");
        session::clear_handshake(&cookies);
        return error_redirect(error);
    }

    match complete_exchange(&state, &cookies, q.code.as_deref(), q.state.as_deref(), None).await {
        Ok(_) => Redirect::temporary(&state.config.server.post_login_path),
        Err(e) => {
            tracing::warn!(error = %e, "callback exchange failed");
            error_redirect(e.code())
        }
    }
}

fn error_redirect(code: &str) -> Redirect {
    let encoded: String = url::form_urlencoded::byte_serialize(code.as_bytes()).collect();
    Redirect::temporary(&format!("/?error={}", encoded))
}

// POST /api/auth/refresh
pub async fn refresh(State(state): State<AppState>, cookies: Cookies) -> Result<Json<serde_json::Value>, ApiError> {
    let tokens = session::read_tokens(&cookies, &state.cookie_key);
    let Some(refresh_token) = tokens.refresh_token else {
        session::clear_session(&cookies);
        return Err(ApiError::RequiresLogin);
    };

    let (_, expires_at) = refresh_session(&state, &cookies, &refresh_token).await?;
    Ok(Json(json!({ "success": true, "expiresAt": expires_at })))
}

// GET /api/auth/session
pub async fn session_probe(
    State(state): State<AppState>,
    SpotifySession { access_token, cookies }: SpotifySession,
) -> Result<Response, ApiError> {
    let api = SpotifyApi::new(&state.http, &state.config.spotify.api_base_url, &access_token);
    match api.me().await {
        Ok(profile) => Ok(Json(json!({
            "authenticated": true,
            "user": { "id": profile.id, "displayName": profile.display_name },
        }))
        .into_response()),
        Err(ApiError::Upstream { status, .. }) if status == StatusCode::UNAUTHORIZED => {
            tracing::info!("provider rejected access token, clearing session");
            session::clear_session(&cookies);
            Ok((
                StatusCode::UNAUTHORIZED,
                Json(json!({ "authenticated": false, "requiresLogin": true })),
            )
                .into_response())
        }
        Err(e) => Err(e),
    }
}

// POST /api/auth/logout
pub async fn logout(cookies: Cookies) -> StatusCode {
    session::clear_session(&cookies);
    session::clear_handshake(&cookies);
    StatusCode::NO_CONTENT
}
