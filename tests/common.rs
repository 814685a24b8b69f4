#![allow(dead_code)]

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request};
use axum::response::Response;
use axum::Router;
use base64::Engine as _;
use roastify::app::{build_router, AppState};
use roastify::config::AppConfig;
use roastify::repos::memory::MemoryBlobStore;
use serde_json::Value;
use tower_cookies::cookie::{Cookie, CookieJar};
use tower_cookies::Key;

pub const COOKIE_KEY: [u8; 64] = [42u8; 64];
pub const PUBLIC_URL: &str = "http://localhost:3000";
pub const CRON_SECRET: &str = "cron-secret";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub blobs: Arc<MemoryBlobStore>,
}

/// Config with every third party pointed at `mock_uri`.
pub fn test_config(mock_uri: &str) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.server.public_url = PUBLIC_URL.into();
    cfg.server.cookie_key_base64 = base64::engine::general_purpose::STANDARD.encode(COOKIE_KEY);
    cfg.server.cron_secret = Some(CRON_SECRET.into());
    cfg.spotify.client_id = Some("test-client".into());
    cfg.spotify.client_secret = Some("test-secret".into());
    cfg.spotify.auth_url = format!("{}/authorize", mock_uri);
    cfg.spotify.token_url = format!("{}/api/token", mock_uri);
    cfg.spotify.api_base_url = format!("{}/v1", mock_uri);
    cfg.openai.api_key = Some("sk-test".into());
    cfg.openai.base_url = format!("{}/openai", mock_uri);
    cfg.openai.roast_assistant_id = Some("asst_roast".into());
    cfg.blob.cleanup_interval_secs = 0;
    cfg
}

pub fn build_test_app(cfg: AppConfig) -> TestApp {
    let blobs = MemoryBlobStore::new();
    let state = AppState::with_blobs(cfg, blobs.clone()).expect("app state");
    TestApp { router: build_router(state.clone()), state, blobs }
}

pub fn key() -> Key {
    Key::from(&COOKIE_KEY)
}

/// Builds a `Cookie` request header with values encrypted the way the server expects.
pub fn cookie_header(pairs: &[(&str, &str)]) -> String {
    let key = key();
    let mut jar = CookieJar::new();
    for (name, value) in pairs {
        jar.private_mut(&key).add(Cookie::new(name.to_string(), value.to_string()));
    }
    jar.delta()
        .map(|c| format!("{}={}", c.name(), c.value()))
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn session_cookies(access: &str, refresh: &str, expires_at: i64) -> String {
    cookie_header(&[
        ("access_token", access),
        ("refresh_token", refresh),
        ("token_expiry", &expires_at.to_string()),
    ])
}

pub fn now() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

pub fn set_cookies(res: &Response) -> Vec<Cookie<'static>> {
    res.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|s| Cookie::parse(s.to_string()).ok())
        .collect()
}

/// Decrypts a cookie set on the response.
pub fn decrypt(cookies: &[Cookie<'static>], name: &str) -> Option<String> {
    let key = key();
    let mut jar = CookieJar::new();
    for c in cookies {
        jar.add_original(c.clone());
    }
    jar.private(&key).get(name).map(|c| c.value().to_string())
}

pub fn find<'a>(cookies: &'a [Cookie<'static>], name: &str) -> Option<&'a Cookie<'static>> {
    cookies.iter().find(|c| c.name() == name)
}

pub fn is_removed(cookies: &[Cookie<'static>], name: &str) -> bool {
    find(cookies, name)
        .map(|c| c.value().is_empty() && c.max_age() == Some(time::Duration::ZERO))
        .unwrap_or(false)
}

pub async fn json_body(res: Response) -> Value {
    let bytes = to_bytes(res.into_body(), 1024 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn text_body(res: Response) -> String {
    let bytes = to_bytes(res.into_body(), 1024 * 1024).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn get(uri: &str, cookies: Option<&str>) -> Request<Body> {
    let mut req = Request::get(uri);
    if let Some(c) = cookies {
        req = req.header(header::COOKIE, c);
    }
    req.body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, cookies: Option<&str>, body: &Value) -> Request<Body> {
    let mut req = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
    if let Some(c) = cookies {
        req = req.header(header::COOKIE, c);
    }
    req.body(Body::from(body.to_string())).unwrap()
}
