use base64::Engine as _;
use oauth2::basic::BasicClient;
use oauth2::{AuthUrl, ClientId, CsrfToken, PkceCodeChallenge, RedirectUrl, Scope, TokenUrl};
use sha2::Digest;

use crate::config::SpotifyCfg;

/// Everything the browser needs to start the consent redirect, plus the
/// secrets the server keeps for the callback.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
    pub code_verifier: String,
}

pub fn authorization_request(
    spotify: &SpotifyCfg,
    client_id: &str,
    redirect_uri: &str,
) -> anyhow::Result<AuthorizationRequest> {
    let client = BasicClient::new(
        ClientId::new(client_id.to_string()),
        None,
        AuthUrl::new(spotify.auth_url.clone())?,
        Some(TokenUrl::new(spotify.token_url.clone())?),
    )
    .set_redirect_uri(RedirectUrl::new(redirect_uri.to_string())?);

    let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
    let (auth_url, csrf_token) = client
        .authorize_url(CsrfToken::new_random)
        .add_scopes(
            spotify
                .scopes
                .split_whitespace()
                .map(|s| Scope::new(s.to_string())),
        )
        .set_pkce_challenge(pkce_challenge)
        .url();

    Ok(AuthorizationRequest {
        url: auth_url.to_string(),
        state: csrf_token.secret().to_string(),
        code_verifier: pkce_verifier.secret().to_string(),
    })
}

/// S256 challenge for a verifier: base64url(sha256(verifier)) without padding.
pub fn s256_challenge(verifier: &str) -> String {
    let digest = sha2::Sha256::digest(verifier.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest)
}
