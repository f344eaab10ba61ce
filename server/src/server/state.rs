use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::run::{RunError, RunService};
use crate::view::ResultPresenter;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub runs: Arc<RunService>,
    pub presenter: Arc<ResultPresenter>,
    /// Server start time for uptime reporting
    pub started_at: Instant,
}

impl AppState {
    pub fn new(runs: Arc<RunService>, presenter: Arc<ResultPresenter>) -> Self {
        Self {
            runs,
            presenter,
            started_at: Instant::now(),
        }
    }

    /// Wire the process-backed run service and presenter from configuration
    pub fn from_config(config: &Config) -> Result<Self, RunError> {
        let runs = RunService::from_config(&config.run)?;
        let presenter = ResultPresenter::new(&config.run.static_dir)?;
        Ok(Self::new(Arc::new(runs), Arc::new(presenter)))
    }
}
