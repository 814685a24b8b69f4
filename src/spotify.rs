//! Typed reads against the provider's Web API on behalf of a session.

use axum::http::StatusCode;
use serde::de::DeserializeOwned;

use crate::auth::tokens::upstream_body;
use crate::models::stats::{Artist, ListeningStats, Paging, Profile, TimeRange, Track};
use crate::web::ApiError;

const TOP_LIMIT: &str = "20";

#[derive(Debug, Clone)]
pub struct SpotifyApi<'a> {
    http: &'a reqwest::Client,
    base_url: &'a str,
    access_token: &'a str,
}

impl<'a> SpotifyApi<'a> {
    pub fn new(http: &'a reqwest::Client, base_url: &'a str, access_token: &'a str) -> Self {
        Self { http, base_url, access_token }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T, ApiError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path);
        let response = self
            .http
            .get(&url)
            .bearer_auth(self.access_token)
            .query(query)
            .send()
            .await
            .map_err(|e| ApiError::BadGateway(e.to_string()))?;

        let status = StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
        let bytes = response.bytes().await.map_err(|e| ApiError::BadGateway(e.to_string()))?;
        if !status.is_success() {
            tracing::warn!(%status, path, "provider API error");
            return Err(ApiError::Upstream { status, body: upstream_body(&bytes) });
        }
        serde_json::from_slice(&bytes)
            .map_err(|e| ApiError::BadGateway(format!("malformed provider response for {}: {}", path, e)))
    }

    pub async fn me(&self) -> Result<Profile, ApiError> {
        self.get("me", &[]).await
    }

    /// Fetches both top lists concurrently and summarizes them.
    pub async fn listening_stats(&self, time_range: TimeRange) -> Result<ListeningStats, ApiError> {
        let query = [("limit", TOP_LIMIT), ("time_range", time_range.as_str())];
        let (artists, tracks) = tokio::try_join!(
            self.get::<Paging<Artist>>("me/top/artists", &query),
            self.get::<Paging<Track>>("me/top/tracks", &query),
        )?;
        Ok(ListeningStats::summarize(time_range, &artists.items, &tracks.items))
    }
}
