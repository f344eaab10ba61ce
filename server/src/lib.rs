//! Load-test gateway library
//!
//! This module exports the server components for use in integration tests
//! and the `loadtest-gateway` binary.

pub mod config;
pub mod run;
pub mod server;
pub mod view;

// Re-export commonly used types
pub use config::Config;
pub use run::{LoadTestEngine, RunError, RunId, RunService, Visualizer};
pub use server::{AppState, build_router};
pub use view::ResultPresenter;
