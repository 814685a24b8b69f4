use serde::Deserialize;
use base64::Engine as _;
use rand::RngCore;

use crate::models::assistant::AssistantType;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerCfg {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_public_url")]
    pub public_url: String,
    /// Base64-encoded 32 or 64 byte key used to encrypt cookies
    #[serde(default)]
    pub cookie_key_base64: String,
    #[serde(default)]
    pub secure_cookies: bool,
    #[serde(default = "default_post_login_path")]
    pub post_login_path: String,
    /// Bearer secret required by the cleanup endpoint
    #[serde(default)]
    pub cron_secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyCfg {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default = "default_spotify_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_spotify_token_url")]
    pub token_url: String,
    #[serde(default = "default_spotify_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_spotify_scopes")]
    pub scopes: String,
    #[serde(default = "default_redirect_path")]
    pub redirect_path: String,
    #[serde(default = "default_expiry_margin_secs")]
    pub expiry_margin_secs: i64,
    #[serde(default = "default_refresh_cookie_days")]
    pub refresh_cookie_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiCfg {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub roast_assistant_id: Option<String>,
    #[serde(default)]
    pub hype_assistant_id: Option<String>,
    #[serde(default)]
    pub analysis_assistant_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlobCfg {
    /// Read-write token for the blob API; the in-memory store is used when absent
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_blob_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub public_base_url: Option<String>,
    #[serde(default = "default_share_ttl_days")]
    pub share_ttl_days: i64,
    #[serde(default = "default_image_retention_hours")]
    pub image_retention_hours: i64,
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    pub server: ServerCfg,
    pub spotify: SpotifyCfg,
    pub openai: OpenAiCfg,
    pub blob: BlobCfg,
}

fn default_bind_addr() -> String { "127.0.0.1:8080".to_string() }
fn default_public_url() -> String { "http://127.0.0.1:8080".to_string() }
fn default_post_login_path() -> String { "/dashboard".to_string() }
fn default_spotify_auth_url() -> String { "https://accounts.spotify.com/authorize".to_string() }
fn default_spotify_token_url() -> String { "https://accounts.spotify.com/api/token".to_string() }
fn default_spotify_api_base_url() -> String { "https://api.spotify.com/v1".to_string() }
fn default_spotify_scopes() -> String { "user-read-private user-read-email user-top-read user-read-recently-played".to_string() }
fn default_redirect_path() -> String { "/api/auth/callback".to_string() }
fn default_expiry_margin_secs() -> i64 { 60 }
fn default_refresh_cookie_days() -> i64 { 30 }
fn default_openai_base_url() -> String { "https://api.openai.com/v1".to_string() }
fn default_blob_api_url() -> String { "https://blob.vercel-storage.com".to_string() }
fn default_share_ttl_days() -> i64 { 30 }
fn default_image_retention_hours() -> i64 { 24 }
fn default_cleanup_interval_secs() -> u64 { 3600 }

impl Default for ServerCfg {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            public_url: default_public_url(),
            cookie_key_base64: String::new(),
            secure_cookies: false,
            post_login_path: default_post_login_path(),
            cron_secret: None,
        }
    }
}

impl Default for SpotifyCfg {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            auth_url: default_spotify_auth_url(),
            token_url: default_spotify_token_url(),
            api_base_url: default_spotify_api_base_url(),
            scopes: default_spotify_scopes(),
            redirect_path: default_redirect_path(),
            expiry_margin_secs: default_expiry_margin_secs(),
            refresh_cookie_days: default_refresh_cookie_days(),
        }
    }
}

impl Default for OpenAiCfg {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_openai_base_url(),
            roast_assistant_id: None,
            hype_assistant_id: None,
            analysis_assistant_id: None,
        }
    }
}

impl Default for BlobCfg {
    fn default() -> Self {
        Self {
            token: None,
            api_url: default_blob_api_url(),
            public_base_url: None,
            share_ttl_days: default_share_ttl_days(),
            image_retention_hours: default_image_retention_hours(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

/// Flat variable names used by the hosting platform and the config key each
/// one fills when no nested `ROASTIFY__SECTION__KEY` variable sets it.
const FLAT_ENV: &[(&str, &str)] = &[
    ("APP_BIND_ADDR", "server.bind_addr"),
    ("APP_PUBLIC_URL", "server.public_url"),
    ("COOKIE_KEY_BASE64", "server.cookie_key_base64"),
    ("APP_FORCE_SECURE", "server.secure_cookies"),
    ("APP_POST_LOGIN_PATH", "server.post_login_path"),
    ("CRON_SECRET", "server.cron_secret"),
    ("SPOTIFY_CLIENT_ID", "spotify.client_id"),
    ("SPOTIFY_CLIENT_SECRET", "spotify.client_secret"),
    ("SPOTIFY_AUTH_URL", "spotify.auth_url"),
    ("SPOTIFY_TOKEN_URL", "spotify.token_url"),
    ("SPOTIFY_API_BASE_URL", "spotify.api_base_url"),
    ("SPOTIFY_SCOPES", "spotify.scopes"),
    ("SPOTIFY_EXPIRY_MARGIN_SECS", "spotify.expiry_margin_secs"),
    ("OPENAI_API_KEY", "openai.api_key"),
    ("OPENAI_BASE_URL", "openai.base_url"),
    ("OPENAI_ROAST_ASSISTANT_ID", "openai.roast_assistant_id"),
    ("OPENAI_HYPE_ASSISTANT_ID", "openai.hype_assistant_id"),
    ("OPENAI_ANALYSIS_ASSISTANT_ID", "openai.analysis_assistant_id"),
    ("BLOB_READ_WRITE_TOKEN", "blob.token"),
    ("BLOB_API_URL", "blob.api_url"),
    ("BLOB_PUBLIC_BASE_URL", "blob.public_base_url"),
    ("IMAGE_RETENTION_HOURS", "blob.image_retention_hours"),
    ("CLEANUP_INTERVAL_SECS", "blob.cleanup_interval_secs"),
];

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Reads one section. A section nobody configured falls back to its
/// defaults; anything else that fails to deserialize is a startup error.
fn section<T: serde::de::DeserializeOwned + Default>(settings: &config::Config, name: &str) -> anyhow::Result<T> {
    match settings.get::<T>(name) {
        Ok(v) => Ok(v),
        Err(config::ConfigError::NotFound(_)) => Ok(T::default()),
        Err(e) => Err(anyhow::anyhow!("invalid {} configuration: {}", name, e)),
    }
}

impl OpenAiCfg {
    pub fn assistant_id(&self, kind: AssistantType) -> Option<&str> {
        match kind {
            AssistantType::Roast => self.roast_assistant_id.as_deref(),
            AssistantType::Hype => self.hype_assistant_id.as_deref(),
            AssistantType::Analysis => self.analysis_assistant_id.as_deref(),
        }
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        // Flat names are defaults, so a nested ROASTIFY__SECTION__KEY variable
        // overrides them key by key.
        let mut builder = config::Config::builder();
        for (name, key) in FLAT_ENV {
            if let Some(value) = env_opt(name) {
                builder = builder.set_default(*key, value)?;
            }
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix("ROASTIFY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut server: ServerCfg = section(&settings, "server")?;
        let spotify: SpotifyCfg = section(&settings, "spotify")?;
        let openai: OpenAiCfg = section(&settings, "openai")?;
        let blob: BlobCfg = section(&settings, "blob")?;

        if server.cookie_key_base64.is_empty() {
            // Generate a dev key (64 bytes) and keep it in-memory only
            let mut key = [0u8; 64];
            rand::rngs::OsRng.fill_bytes(&mut key);
            server.cookie_key_base64 = base64::engine::general_purpose::STANDARD.encode(key);
            tracing::warn!(
                "COOKIE_KEY_BASE64 not provided; generated a temporary dev key. Sessions will be invalidated on restart."
            );
        }

        let cfg = AppConfig { server, spotify, openai, blob };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Checks run once at startup. Hard errors for values the server cannot
    /// work without, warnings for optional integrations.
    pub fn validate(&self) -> anyhow::Result<()> {
        decode_cookie_key(&self.server.cookie_key_base64)?;
        url::Url::parse(&self.server.public_url)
            .map_err(|e| anyhow::anyhow!("invalid public_url {:?}: {}", self.server.public_url, e))?;
        url::Url::parse(&self.spotify.api_base_url)
            .map_err(|e| anyhow::anyhow!("invalid spotify api_base_url: {}", e))?;

        if self.spotify.expiry_margin_secs < 0 {
            return Err(anyhow::anyhow!("expiry_margin_secs must not be negative"));
        }
        if self.spotify.client_id.is_none() {
            tracing::warn!("SPOTIFY_CLIENT_ID not configured; login will fail until it is set");
        }
        if self.openai.api_key.is_none() {
            tracing::warn!("OPENAI_API_KEY not configured; roast generation is disabled");
        }
        if self.blob.token.is_some() && self.blob.public_base_url.is_none() {
            return Err(anyhow::anyhow!("blob.public_base_url is required when a blob token is configured"));
        }
        if self.blob.token.is_none() {
            tracing::warn!("BLOB_READ_WRITE_TOKEN not configured; using in-memory blob storage");
        }
        Ok(())
    }

    /// Absolute redirect URI registered with the identity provider.
    pub fn redirect_uri(&self) -> String {
        format!("{}{}", self.server.public_url.trim_end_matches('/'), self.spotify.redirect_path)
    }

    pub fn public_link(&self, path: &str) -> String {
        format!("{}/{}", self.server.public_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}

pub fn decode_cookie_key(b64: &str) -> anyhow::Result<[u8; 64]> {
    // tower-cookies private jars need 64 bytes (32 for signing + 32 for encryption)
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(b64.as_bytes())
        .map_err(|e| anyhow::anyhow!("invalid COOKIE_KEY_BASE64: {}", e))?;
    let mut out = [0u8; 64];
    match bytes.len() {
        32 => {
            out[..32].copy_from_slice(&bytes);
            out[32..].copy_from_slice(&bytes);
        }
        64 => out.copy_from_slice(&bytes),
        n => {
            return Err(anyhow::anyhow!(
                "COOKIE_KEY_BASE64 must decode to 32 or 64 bytes, got {}",
                n
            ))
        }
    }
    Ok(out)
}
