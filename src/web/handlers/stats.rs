use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::app::AppState;
use crate::models::stats::{ListeningStats, TimeRange};
use crate::spotify::SpotifyApi;
use crate::web::session::SpotifySession;
use crate::web::ApiError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsQuery {
    #[serde(default)]
    pub time_range: TimeRange,
}

// GET /api/stats
pub async fn listening_stats(
    State(state): State<AppState>,
    SpotifySession { access_token, .. }: SpotifySession,
    Query(q): Query<StatsQuery>,
) -> Result<Json<ListeningStats>, ApiError> {
    let api = SpotifyApi::new(&state.http, &state.config.spotify.api_base_url, &access_token);
    let stats = api.listening_stats(q.time_range).await?;
    tracing::debug!(time_range = q.time_range.as_str(), artists = stats.top_artists.len(), "computed listening stats");
    Ok(Json(stats))
}
