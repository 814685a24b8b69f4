//! Client for the hosted assistant API (threads, messages and runs).
//!
//! A roast is produced by creating a thread, posting the listener's stats as
//! a user message and starting a run against the persona's assistant. The run
//! completes asynchronously; callers poll [`AssistantClient::run_status`].

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::auth::tokens::upstream_body;
use crate::config::OpenAiCfg;
use crate::models::assistant::{AssistantType, RunStatus};

#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("assistant API returned {status}")]
    Upstream { status: StatusCode, body: Value },
    #[error("assistant API unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed assistant response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("{0} is not configured")]
    MissingConfig(&'static str),
}

#[derive(Debug, Clone, Deserialize)]
struct Created {
    id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Run {
    pub id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub last_error: Option<RunError>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedRun {
    pub thread_id: String,
    pub run_id: String,
    pub status: RunStatus,
}

#[derive(Debug, Clone, Deserialize)]
struct MessageList {
    #[serde(default)]
    data: Vec<Message>,
}

#[derive(Debug, Clone, Deserialize)]
struct Message {
    role: String,
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Debug, Clone, Deserialize)]
struct ContentPart {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<TextContent>,
}

#[derive(Debug, Clone, Deserialize)]
struct TextContent {
    value: String,
}

#[derive(Debug, Clone)]
pub struct AssistantClient {
    http: reqwest::Client,
    cfg: OpenAiCfg,
}

impl AssistantClient {
    pub fn new(cfg: OpenAiCfg, http: reqwest::Client) -> Self {
        Self { http, cfg }
    }

    /// Fails fast when the API key or the persona's assistant id is absent.
    pub fn ensure_configured(&self, kind: AssistantType) -> Result<(), AssistantError> {
        self.api_key()?;
        self.cfg
            .assistant_id(kind)
            .ok_or(AssistantError::MissingConfig(missing_assistant_key(kind)))?;
        Ok(())
    }

    /// Creates a thread, posts `prompt` and starts a run for `kind`.
    pub async fn start_run(&self, kind: AssistantType, prompt: &str) -> Result<StartedRun, AssistantError> {
        let assistant_id = self
            .cfg
            .assistant_id(kind)
            .ok_or(AssistantError::MissingConfig(missing_assistant_key(kind)))?
            .to_string();

        let thread: Created = self.post("threads", &json!({})).await?;
        tracing::debug!(thread_id = %thread.id, assistant = %kind, "created thread");

        let _: Created = self
            .post(
                &format!("threads/{}/messages", thread.id),
                &json!({ "role": "user", "content": prompt }),
            )
            .await?;

        let run: Run = self
            .post(
                &format!("threads/{}/runs", thread.id),
                &json!({ "assistant_id": assistant_id }),
            )
            .await?;

        tracing::info!(thread_id = %thread.id, run_id = %run.id, assistant = %kind, "started assistant run");
        Ok(StartedRun { thread_id: thread.id, run_id: run.id, status: run.status })
    }

    pub async fn run_status(&self, thread_id: &str, run_id: &str) -> Result<Run, AssistantError> {
        self.get(&format!("threads/{}/runs/{}", thread_id, run_id)).await
    }

    /// Text of the newest assistant message in the thread, if any.
    pub async fn latest_reply(&self, thread_id: &str) -> Result<Option<String>, AssistantError> {
        let list: MessageList = self
            .get(&format!("threads/{}/messages?order=desc&limit=10", thread_id))
            .await?;
        Ok(list
            .data
            .into_iter()
            .find(|m| m.role == "assistant")
            .and_then(|m| join_text(&m.content)))
    }

    fn api_key(&self) -> Result<&str, AssistantError> {
        self.cfg.api_key.as_deref().ok_or(AssistantError::MissingConfig("OPENAI_API_KEY"))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.cfg.base_url.trim_end_matches('/'), path)
    }

    async fn post<T: serde::de::DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, AssistantError> {
        let req = self
            .http
            .post(self.url(path))
            .bearer_auth(self.api_key()?)
            .header("OpenAI-Beta", "assistants=v2")
            .json(body);
        decode(req.send().await?).await
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, AssistantError> {
        let req = self
            .http
            .get(self.url(path))
            .bearer_auth(self.api_key()?)
            .header("OpenAI-Beta", "assistants=v2");
        decode(req.send().await?).await
    }
}

async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T, AssistantError> {
    let status = StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let bytes = response.bytes().await?;
    if !status.is_success() {
        tracing::warn!(%status, "assistant API error");
        return Err(AssistantError::Upstream { status, body: upstream_body(&bytes) });
    }
    Ok(serde_json::from_slice(&bytes)?)
}

fn join_text(parts: &[ContentPart]) -> Option<String> {
    let text: Vec<&str> = parts
        .iter()
        .filter(|p| p.kind == "text")
        .filter_map(|p| p.text.as_ref().map(|t| t.value.as_str()))
        .collect();
    if text.is_empty() {
        None
    } else {
        Some(text.join("\n"))
    }
}

fn missing_assistant_key(kind: AssistantType) -> &'static str {
    match kind {
        AssistantType::Roast => "OPENAI_ROAST_ASSISTANT_ID",
        AssistantType::Hype => "OPENAI_HYPE_ASSISTANT_ID",
        AssistantType::Analysis => "OPENAI_ANALYSIS_ASSISTANT_ID",
    }
}

/// Thread and run ids are interpolated into URL paths.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= 128 && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_restricted_to_safe_characters() {
        assert!(is_valid_id("thread_abc123"));
        assert!(is_valid_id("run-XYZ"));
        assert!(!is_valid_id(""));
        assert!(!is_valid_id("../secrets"));
        assert!(!is_valid_id("a/b"));
    }

    #[test]
    fn reply_text_joins_text_parts_only() {
        let msg: Message = serde_json::from_value(json!({
            "role": "assistant",
            "content": [
                {"type": "text", "text": {"value": "Your taste", "annotations": []}},
                {"type": "image_file", "image_file": {"file_id": "f"}},
                {"type": "text", "text": {"value": "is loud.", "annotations": []}}
            ]
        }))
        .unwrap();
        assert_eq!(join_text(&msg.content).as_deref(), Some("Your taste\nis loud."));
    }
}
