use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};

use crate::auth::tokens::{TokenError, TokenGrant};

/// How long a finished refresh is handed to later callers holding the same
/// (now spent) refresh token.
const REUSE_WINDOW: Duration = Duration::from_secs(30);

type Slot = Arc<tokio::sync::Mutex<Option<(Instant, TokenGrant)>>>;

/// Single-flight guard for token refreshes, keyed by refresh token.
///
/// Concurrent requests that discover the same expired session queue on one
/// slot; the first performs the provider call and the rest reuse its grant.
/// Failures are not cached so the next request tries again.
#[derive(Clone, Default)]
pub struct RefreshLocks {
    slots: Arc<Mutex<HashMap<String, Slot>>>,
}

impl RefreshLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn run<F, Fut>(&self, refresh_token: &str, refresh: F) -> Result<TokenGrant, TokenError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<TokenGrant, TokenError>>,
    {
        let slot = self.slot_for(refresh_token);
        let mut guard = slot.lock().await;

        if let Some((at, grant)) = guard.as_ref() {
            if at.elapsed() < REUSE_WINDOW {
                tracing::debug!("reusing refresh result from concurrent request");
                return Ok(grant.clone());
            }
        }

        let grant = refresh().await?;
        *guard = Some((Instant::now(), grant.clone()));
        Ok(grant)
    }

    fn slot_for(&self, refresh_token: &str) -> Slot {
        let key = hash_token(refresh_token);
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        prune(&mut slots);
        slots.entry(key).or_default().clone()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Drops idle slots whose cached grant is stale or absent.
fn prune(slots: &mut HashMap<String, Slot>) {
    slots.retain(|_, slot| {
        if Arc::strong_count(slot) > 1 {
            return true;
        }
        match slot.try_lock() {
            Ok(cached) => matches!(cached.as_ref(), Some((at, _)) if at.elapsed() < REUSE_WINDOW),
            Err(_) => true,
        }
    });
}

fn hash_token(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    format!("{:x}", hasher.finalize())
}
