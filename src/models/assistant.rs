use serde::{Deserialize, Serialize};

/// Persona used to generate commentary about a listener's taste.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssistantType {
    Roast,
    Hype,
    Analysis,
}

impl AssistantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssistantType::Roast => "roast",
            AssistantType::Hype => "hype",
            AssistantType::Analysis => "analysis",
        }
    }
}

impl std::str::FromStr for AssistantType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "roast" => Ok(AssistantType::Roast),
            "hype" => Ok(AssistantType::Hype),
            "analysis" => Ok(AssistantType::Analysis),
            other => Err(anyhow::anyhow!("unknown assistant type: {}", other)),
        }
    }
}

impl std::fmt::Display for AssistantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of an assistant run as reported by the assistant API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Incomplete,
    Expired,
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    pub fn is_terminal_failure(&self) -> bool {
        matches!(
            self,
            RunStatus::Failed | RunStatus::Cancelled | RunStatus::Expired | RunStatus::Incomplete
        )
    }
}
