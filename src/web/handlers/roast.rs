use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::assistant::{is_valid_id, StartedRun};
use crate::models::assistant::{AssistantType, RunStatus};
use crate::models::stats::{ListeningStats, TimeRange};
use crate::spotify::SpotifyApi;
use crate::web::session::SpotifySession;
use crate::web::ApiError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoastRequest {
    pub assistant_type: AssistantType,
    #[serde(default)]
    pub time_range: TimeRange,
}

// POST /api/roast
pub async fn start_roast(
    State(state): State<AppState>,
    SpotifySession { access_token, .. }: SpotifySession,
    Json(req): Json<RoastRequest>,
) -> Result<Json<StartedRun>, ApiError> {
    state.assistant.ensure_configured(req.assistant_type)?;

    let api = SpotifyApi::new(&state.http, &state.config.spotify.api_base_url, &access_token);
    let stats = api.listening_stats(req.time_range).await?;
    let prompt = build_prompt(req.assistant_type, &stats)?;

    let started = state.assistant.start_run(req.assistant_type, &prompt).await?;
    Ok(Json(started))
}

fn build_prompt(kind: AssistantType, stats: &ListeningStats) -> Result<String, ApiError> {
    let payload = serde_json::to_string_pretty(stats).map_err(anyhow::Error::from)?;
    let ask = match kind {
        AssistantType::Roast => "Roast my music taste.",
        AssistantType::Hype => "Hype up my music taste.",
        AssistantType::Analysis => "Analyze my music taste.",
    };
    Ok(format!(
        "{} Here are my listening stats ({}):\n{}",
        ask,
        stats.time_range.as_str(),
        payload
    ))
}

// GET /api/roast/{thread_id}/runs/{run_id}
pub async fn run_status(
    State(state): State<AppState>,
    Path((thread_id, run_id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    if !is_valid_id(&thread_id) || !is_valid_id(&run_id) {
        return Err(ApiError::bad_request("invalid_id", "Invalid thread or run id"));
    }

    let run = state.assistant.run_status(&thread_id, &run_id).await?;
    let body = match run.status {
        RunStatus::Completed => {
            let text = state.assistant.latest_reply(&thread_id).await?;
            if text.is_none() {
                tracing::warn!(%thread_id, %run_id, "completed run has no assistant reply");
            }
            json!({ "status": run.status, "text": text })
        }
        ref status if status.is_terminal_failure() => {
            let message = run.last_error.as_ref().and_then(|e| e.message.clone());
            tracing::warn!(%thread_id, %run_id, ?status, error = ?message, "assistant run did not complete");
            json!({ "status": run.status, "error": message })
        }
        _ => json!({ "status": run.status }),
    };
    Ok(Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_embeds_stats_and_persona() {
        let stats = ListeningStats::summarize(TimeRange::ShortTerm, &[], &[]);
        let prompt = build_prompt(AssistantType::Hype, &stats).unwrap();
        assert!(prompt.starts_with("Hype up my music taste."));
        assert!(prompt.contains("short_term"));
        assert!(prompt.contains("\"topArtists\""));
    }
}
