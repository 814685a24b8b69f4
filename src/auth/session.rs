use tower_cookies::{Cookie, Cookies, Key};
use time::{Duration, OffsetDateTime};

use crate::auth::tokens::TokenGrant;

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";
pub const TOKEN_EXPIRY_COOKIE: &str = "token_expiry";
pub const CODE_VERIFIER_COOKIE: &str = "code_verifier";
pub const AUTH_STATE_COOKIE: &str = "auth_state";

/// Lifetime of the PKCE handshake cookies.
pub const HANDSHAKE_TTL_MINUTES: i64 = 10;

/// Upper bound on the access token lifetime a grant can claim.
const MAX_ACCESS_LIFETIME_SECS: i64 = 24 * 60 * 60;
const SESSION_COOKIES: [&str; 3] = [ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE, TOKEN_EXPIRY_COOKIE];
const HANDSHAKE_COOKIES: [&str; 2] = [CODE_VERIFIER_COOKIE, AUTH_STATE_COOKIE];

/// Token material carried by the browser between requests.
#[derive(Debug, Clone, Default)]
pub struct SessionTokens {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    /// unix seconds
    pub expires_at: Option<i64>,
}

impl SessionTokens {
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }

    /// True when the access token is gone, its expiry is unknown, or it has passed.
    pub fn needs_refresh(&self, now: i64) -> bool {
        if self.access_token.is_none() {
            return true;
        }
        match self.expires_at {
            Some(exp) => now >= exp,
            None => true,
        }
    }
}

/// Transient PKCE secrets stored between the authorize redirect and the callback.
#[derive(Debug, Clone, Default)]
pub struct Handshake {
    pub code_verifier: Option<String>,
    pub state: Option<String>,
}

fn base_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    let mut c = Cookie::new(name, value);
    c.set_path("/");
    c.set_http_only(true);
    c.set_same_site(tower_cookies::cookie::SameSite::Lax);
    c.set_secure(secure);
    c
}

fn removal(name: &'static str) -> Cookie<'static> {
    let mut c = Cookie::new(name, "");
    c.set_path("/");
    c
}

fn read_private(cookies: &Cookies, key: &Key, name: &str) -> Option<String> {
    cookies
        .private(key)
        .get(name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

pub fn read_tokens(cookies: &Cookies, key: &Key) -> SessionTokens {
    SessionTokens {
        access_token: read_private(cookies, key, ACCESS_TOKEN_COOKIE),
        refresh_token: read_private(cookies, key, REFRESH_TOKEN_COOKIE),
        expires_at: read_private(cookies, key, TOKEN_EXPIRY_COOKIE).and_then(|v| v.parse().ok()),
    }
}

/// Persists a token grant and returns the computed expiry (unix seconds).
///
/// The access token expires `margin_secs` before the provider says it does.
/// The refresh cookie is only rewritten when the grant carries a refresh
/// token, which keeps the existing one on non-rotating refreshes.
pub fn write_tokens(
    cookies: &Cookies,
    key: &Key,
    secure: bool,
    grant: &TokenGrant,
    now: OffsetDateTime,
    margin_secs: i64,
    refresh_days: i64,
) -> i64 {
    let lifetime = grant.expires_in.saturating_sub(margin_secs).clamp(0, MAX_ACCESS_LIFETIME_SECS);
    let expires_at = (now + Duration::seconds(lifetime)).unix_timestamp();
    let jar = cookies.private(key);

    let mut access = base_cookie(ACCESS_TOKEN_COOKIE, grant.access_token.clone(), secure);
    access.set_max_age(Duration::seconds(lifetime));
    jar.add(access);

    let mut expiry = base_cookie(TOKEN_EXPIRY_COOKIE, expires_at.to_string(), secure);
    expiry.set_max_age(Duration::days(refresh_days));
    jar.add(expiry);

    if let Some(refresh_token) = &grant.refresh_token {
        let mut refresh = base_cookie(REFRESH_TOKEN_COOKIE, refresh_token.clone(), secure);
        refresh.set_max_age(Duration::days(refresh_days));
        jar.add(refresh);
    }

    expires_at
}

pub fn clear_session(cookies: &Cookies) {
    for name in SESSION_COOKIES {
        cookies.remove(removal(name));
    }
}

pub fn write_handshake(cookies: &Cookies, key: &Key, secure: bool, code_verifier: &str, state: &str) {
    let jar = cookies.private(key);
    for (name, value) in [(CODE_VERIFIER_COOKIE, code_verifier), (AUTH_STATE_COOKIE, state)] {
        let mut c = base_cookie(name, value.to_string(), secure);
        c.set_max_age(Duration::minutes(HANDSHAKE_TTL_MINUTES));
        jar.add(c);
    }
}

pub fn read_handshake(cookies: &Cookies, key: &Key) -> Handshake {
    Handshake {
        code_verifier: read_private(cookies, key, CODE_VERIFIER_COOKIE),
        state: read_private(cookies, key, AUTH_STATE_COOKIE),
    }
}

pub fn clear_handshake(cookies: &Cookies) {
    for name in HANDSHAKE_COOKIES {
        cookies.remove(removal(name));
    }
}
