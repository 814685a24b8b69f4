use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{any, get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_cookies::{CookieManagerLayer, Key};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

use crate::assistant::AssistantClient;
use crate::auth::{refresh_lock::RefreshLocks, tokens::TokenClient};
use crate::config::{decode_cookie_key, AppConfig};
use crate::repos::{http::HttpBlobStore, memory::MemoryBlobStore, BlobStore};
use crate::web::handlers::{auth, images, roast, share, stats};

const OUTBOUND_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub cookie_key: Key,
    pub http: reqwest::Client,
    pub tokens: TokenClient,
    pub refresh_locks: RefreshLocks,
    pub assistant: AssistantClient,
    pub blobs: Arc<dyn BlobStore>,
}

impl AppState {
    /// Builds shared state, picking the HTTP blob store when a token is
    /// configured and the in-memory one otherwise.
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let http = build_http_client()?;
        let blobs: Arc<dyn BlobStore> = if config.blob.token.is_some() {
            HttpBlobStore::from_config(&config.blob, http.clone())?
        } else {
            MemoryBlobStore::new()
        };
        Self::with_parts(config, http, blobs)
    }

    pub fn with_blobs(config: AppConfig, blobs: Arc<dyn BlobStore>) -> anyhow::Result<Self> {
        Self::with_parts(config, build_http_client()?, blobs)
    }

    fn with_parts(config: AppConfig, http: reqwest::Client, blobs: Arc<dyn BlobStore>) -> anyhow::Result<Self> {
        let key_bytes = decode_cookie_key(&config.server.cookie_key_base64)?;
        Ok(Self {
            cookie_key: Key::from(&key_bytes),
            tokens: TokenClient::from_config(&config, http.clone()),
            refresh_locks: RefreshLocks::new(),
            assistant: AssistantClient::new(config.openai.clone(), http.clone()),
            http,
            blobs,
            config,
        })
    }
}

fn build_http_client() -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(OUTBOUND_TIMEOUT)
        .user_agent(concat!("roastify/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

pub async fn run() -> anyhow::Result<()> {
    // logging
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();

    let config = AppConfig::load()?;
    let state = AppState::new(config.clone())?;

    let _cleanup = crate::cleanup::spawn_cleanup(
        state.blobs.clone(),
        config.blob.image_retention_hours,
        config.blob.cleanup_interval_secs,
    );

    let app = build_router(state);

    let addr = config.server.bind_addr.clone();
    tracing::info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    let router = Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/api/auth/authorize", get(auth::authorize))
        .route("/api/auth/login", get(auth::login))
        .route("/api/auth/token", post(auth::token))
        .route("/api/auth/callback", get(auth::callback))
        .route("/api/auth/refresh", post(auth::refresh))
        .route("/api/auth/session", get(auth::session_probe))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/spotify/{*path}", any(crate::web::proxy::proxy_request))
        .route("/api/stats", get(stats::listening_stats))
        .route("/api/roast", post(roast::start_roast))
        .route("/api/roast/{thread_id}/runs/{run_id}", get(roast::run_status))
        .route("/api/share", post(share::create_share))
        .route("/api/share/{id}", get(share::get_share))
        .route("/api/share/{id}/card.svg", get(share::share_card))
        .route("/api/shorten", post(share::shorten))
        .route("/s/{code}", get(share::resolve))
        .route(
            "/api/images",
            post(images::upload_image).layer(DefaultBodyLimit::max(images::MAX_IMAGE_BYTES)),
        )
        .route("/api/cleanup", post(images::run_cleanup))
        .with_state(state)
        .layer(CookieManagerLayer::new())
        .layer(TraceLayer::new_for_http());

    match cors {
        Some(cors) => router.layer(cors),
        None => router,
    }
}

/// Credentialed CORS for the configured public origin only.
fn cors_layer(config: &AppConfig) -> Option<CorsLayer> {
    let origin = url::Url::parse(&config.server.public_url).ok()?.origin().ascii_serialization();
    let origin = HeaderValue::from_str(&origin).ok()?;
    Some(
        CorsLayer::new()
            .allow_origin(origin)
            .allow_credentials(true)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
    )
}
