use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::models::assistant::AssistantType;

/// Blob path prefix for share records.
pub const SHARE_PREFIX: &str = "shares/";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareRecord {
    pub text: String,
    pub assistant_type: AssistantType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl ShareRecord {
    pub fn pathname(id: &str) -> String {
        format!("{}{}.json", SHARE_PREFIX, id)
    }

    /// Records past their TTL are reported exactly like missing ones.
    pub fn is_expired(&self, now: OffsetDateTime, ttl_days: i64) -> bool {
        now - self.created_at > time::Duration::days(ttl_days)
    }
}
