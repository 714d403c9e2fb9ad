use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// What the dashboard shows in its status panel.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SystemStatus {
    pub warehouse_configured: bool,
    pub warehouse_accessible: bool,
    pub llm_configured: bool,
    pub demo_mode: bool,
    pub network_gate_enforced: bool,
    /// Actionable next steps for anything not ready.
    pub hints: Vec<String>,
    pub checked_at: chrono::DateTime<chrono::Utc>,
}

struct Entry {
    status: SystemStatus,
    expires_at: tokio::time::Instant,
}

/// One cached status value with a fixed TTL. Staleness within the TTL is
/// accepted; `invalidate` forces the next read to probe again.
pub struct StatusCache {
    ttl: Duration,
    entry: Mutex<Option<Entry>>,
}

impl StatusCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: Mutex::new(None),
        }
    }

    pub async fn get_or_refresh<F, Fut>(&self, probe: F) -> SystemStatus
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SystemStatus>,
    {
        let mut entry = self.entry.lock().await;
        let now = tokio::time::Instant::now();

        if let Some(cached) = entry.as_ref() {
            if now < cached.expires_at {
                return cached.status.clone();
            }
        }

        debug!("Status cache miss, probing");
        let status = probe().await;
        *entry = Some(Entry {
            status: status.clone(),
            expires_at: now + self.ttl,
        });
        status
    }

    pub async fn invalidate(&self) {
        *self.entry.lock().await = None;
    }
}
