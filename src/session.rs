use crate::models::Dataset;
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// Result of one harvest run. Never patched; a refresh replaces it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestSession {
    pub token: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub pages_requested: u32,
    pub classifier: String,
    pub dataset: Dataset,
}

/// Holds the current session and decides when it must be refreshed.
#[derive(Debug)]
pub struct SessionContext {
    ttl: Duration,
    current: Option<HarvestSession>,
}

impl SessionContext {
    pub fn new(ttl_secs: u64) -> Self {
        // chrono durations overflow well below u64::MAX seconds
        const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;
        Self {
            ttl: Duration::seconds(ttl_secs.min(MAX_TTL_SECS) as i64),
            current: None,
        }
    }

    pub fn current(&self) -> Option<&HarvestSession> {
        self.current.as_ref()
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.current
            .as_ref()
            .is_some_and(|session| now.signed_duration_since(session.finished_at) < self.ttl)
    }

    /// Swap in a new session wholesale, returning the one it supersedes.
    pub fn replace(&mut self, session: HarvestSession) -> Option<HarvestSession> {
        self.current.replace(session)
    }

    /// Load a previously saved session. A missing or unreadable snapshot
    /// just leaves the context empty.
    pub fn load_snapshot(&mut self, path: &Path) -> bool {
        if !path.exists() {
            return false;
        }
        let loaded = std::fs::read_to_string(path)
            .map_err(anyhow::Error::from)
            .and_then(|content| serde_json::from_str::<HarvestSession>(&content).map_err(anyhow::Error::from));

        match loaded {
            Ok(session) => {
                debug!(path = %path.display(), records = session.dataset.len(), "loaded session snapshot");
                self.current = Some(session);
                true
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable session snapshot");
                false
            }
        }
    }

    pub fn save_snapshot(&self, path: &Path) -> Result<()> {
        let Some(session) = &self.current else {
            return Ok(());
        };
        let content = serde_json::to_string(session)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write session snapshot: {}", path.display()))?;
        Ok(())
    }
}
