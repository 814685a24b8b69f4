//! Retention sweep for generated images.
//!
//! Image pathnames embed their creation time (`images/{kind}-{millis}-{suffix}.png`),
//! so age is decided from the name alone without reading object metadata.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use time::OffsetDateTime;

use crate::repos::BlobStore;

pub const IMAGE_PREFIX: &str = "images/";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub scanned: usize,
    pub deleted: usize,
}

/// Unix milliseconds embedded in an image pathname.
///
/// The timestamp is the first `-`-separated segment of the file stem made of
/// at least 10 digits. Names without one yield `None` and are never deleted.
pub fn parse_image_timestamp(pathname: &str) -> Option<i64> {
    let file = pathname.rsplit('/').next()?;
    let stem = file.rsplit_once('.').map(|(s, _)| s).unwrap_or(file);
    stem.split('-')
        .find(|seg| seg.len() >= 10 && seg.chars().all(|c| c.is_ascii_digit()))
        .and_then(|seg| seg.parse().ok())
}

pub fn image_pathname(kind: &str, created_at: OffsetDateTime, suffix: &str) -> String {
    let millis = created_at.unix_timestamp_nanos() / 1_000_000;
    format!("{}{}-{}-{}.png", IMAGE_PREFIX, kind, millis, suffix)
}

/// Deletes images whose embedded timestamp is older than `retention`.
pub async fn sweep_images(
    store: &dyn BlobStore,
    retention: time::Duration,
    now: OffsetDateTime,
) -> anyhow::Result<CleanupReport> {
    let cutoff_ms = ((now - retention).unix_timestamp_nanos() / 1_000_000) as i64;
    let blobs = store.list(IMAGE_PREFIX).await?;

    let stale: Vec<String> = blobs
        .iter()
        .filter(|b| matches!(parse_image_timestamp(&b.pathname), Some(ts) if ts < cutoff_ms))
        .map(|b| b.pathname.clone())
        .collect();

    if !stale.is_empty() {
        store.delete(&stale).await?;
    }

    let report = CleanupReport { scanned: blobs.len(), deleted: stale.len() };
    tracing::info!(scanned = report.scanned, deleted = report.deleted, "image cleanup finished");
    Ok(report)
}

/// Runs [`sweep_images`] every `interval_secs`. Zero disables the task.
pub fn spawn_cleanup(
    store: Arc<dyn BlobStore>,
    retention_hours: i64,
    interval_secs: u64,
) -> Option<tokio::task::JoinHandle<()>> {
    if interval_secs == 0 {
        tracing::info!("background image cleanup disabled");
        return None;
    }

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let retention = time::Duration::hours(retention_hours);
            if let Err(e) = sweep_images(store.as_ref(), retention, OffsetDateTime::now_utc()).await {
                tracing::error!(error = ?e, "image cleanup failed");
            }
        }
    }))
}
