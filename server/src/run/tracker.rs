//! In-memory registry of run lifecycle state

use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tracing::debug;

use super::types::{RunId, RunRecord, RunState};

/// Default time a finished run stays in the tracker
const DEFAULT_RETENTION: Duration = Duration::from_secs(3600);

/// Tracks runs started by this process.
///
/// Finished runs are evicted once they are older than the retention window;
/// evicted runs and runs from before a restart are served from disk.
pub struct RunTracker {
    runs: DashMap<RunId, RunRecord>,
    retention: Duration,
}

impl Default for RunTracker {
    fn default() -> Self {
        Self::with_retention(DEFAULT_RETENTION)
    }
}

impl RunTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(retention: Duration) -> Self {
        Self {
            runs: DashMap::new(),
            retention,
        }
    }

    /// Register a freshly accepted run, evicting expired records first
    pub fn insert_pending(&self, id: RunId, host: &str) {
        let evicted = self.evict_finished();
        if evicted > 0 {
            debug!("Evicted {} finished runs from the tracker", evicted);
        }
        self.runs.insert(
            id,
            RunRecord {
                id,
                state: RunState::Pending,
                host: host.to_string(),
                details: None,
                started_at: Utc::now(),
                finished_at: None,
            },
        );
    }

    pub fn mark_running(&self, id: RunId) {
        if let Some(mut record) = self.runs.get_mut(&id) {
            record.state = RunState::Running;
        }
    }

    /// Move a run into a terminal state.
    /// Already-terminal runs are left untouched.
    pub fn finish(&self, id: RunId, state: RunState, details: Option<String>) {
        debug_assert!(state.is_terminal());
        if let Some(mut record) = self.runs.get_mut(&id) {
            if record.state.is_terminal() {
                debug!("Ignoring {} for already finished run {}", state.as_str(), id);
                return;
            }
            record.state = state;
            record.details = details;
            record.finished_at = Some(Utc::now());
        }
    }

    /// Drop terminal records that finished longer ago than the retention window.
    /// Returns the number of records removed.
    pub fn evict_finished(&self) -> usize {
        let now = Utc::now();
        let before = self.runs.len();
        self.runs.retain(|_, record| {
            let Some(finished_at) = record.finished_at else {
                return true;
            };
            // A clock step backwards yields a negative age; keep those
            match (now - finished_at).to_std() {
                Ok(age) => age < self.retention,
                Err(_) => true,
            }
        });
        before.saturating_sub(self.runs.len())
    }

    pub fn get(&self, id: RunId) -> Option<RunRecord> {
        self.runs.get(&id).map(|r| r.value().clone())
    }

    /// Number of runs that are pending or running
    pub fn active_count(&self) -> usize {
        self.runs.iter().filter(|r| !r.state.is_terminal()).count()
    }

    pub fn total_count(&self) -> usize {
        self.runs.len()
    }
}
