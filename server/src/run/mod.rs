//! Load-test run lifecycle
//!
//! This module provides:
//! - `ConfigMaterializer` for rendering run requests into `config.yaml`
//! - `LoadTestEngine` / `Visualizer` traits for the external collaborators,
//!   with process-backed implementations
//! - `RunService` for executing runs on background workers
//! - `RunTracker` for in-memory lifecycle state
//! - HTTP routes for starting runs and polling their status

mod command;
mod engine;
mod materialize;
pub mod routes;
mod service;
mod tracker;
mod types;

pub use command::{CommandEngine, CommandVisualizer};
pub use engine::{LoadTestEngine, Visualizer};
pub use materialize::ConfigMaterializer;
pub use routes::{RunErrorResponse, run_routes};
pub use service::RunService;
pub use tracker::RunTracker;
pub use types::{
    CONFIG_FILE, IMAGE_FILE, OUTPUT_FILE, OutcomeStatus, RunError, RunId, RunOutcome, RunRecord,
    RunRequest, RunState,
};
