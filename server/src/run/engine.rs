//! Collaborator traits for the external load-test engine and visualizer

use std::path::Path;

use async_trait::async_trait;

use super::types::{RunError, RunId};

/// Executes a load test described by a materialized config file.
///
/// Expected to write `output.json` into the run directory. A run the engine
/// ended on its own terms is reported as [`RunError::EngineTerminated`].
#[async_trait]
pub trait LoadTestEngine: Send + Sync {
    async fn run(&self, config_path: &Path, id: RunId) -> Result<(), RunError>;
}

/// Produces `image.png` from a finished run's `output.json`
#[async_trait]
pub trait Visualizer: Send + Sync {
    async fn visualize(&self, id: RunId) -> Result<(), RunError>;
}
