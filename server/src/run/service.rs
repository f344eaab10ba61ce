//! Run orchestration: materialize, then execute engine and visualizer in the background

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::config::RunConfig;

use super::command::{CommandEngine, CommandVisualizer};
use super::engine::{LoadTestEngine, Visualizer};
use super::materialize::ConfigMaterializer;
use super::tracker::RunTracker;
use super::types::{RunError, RunId, RunRequest, RunState};

/// Accepts run requests and drives them to a terminal state
pub struct RunService {
    materializer: ConfigMaterializer,
    engine: Arc<dyn LoadTestEngine>,
    visualizer: Arc<dyn Visualizer>,
    tracker: Arc<RunTracker>,
    /// Bounds the number of concurrently executing runs
    slots: Arc<Semaphore>,
}

impl RunService {
    pub fn new(
        materializer: ConfigMaterializer,
        engine: Arc<dyn LoadTestEngine>,
        visualizer: Arc<dyn Visualizer>,
        max_concurrent_runs: usize,
    ) -> Self {
        Self {
            materializer,
            engine,
            visualizer,
            tracker: Arc::new(RunTracker::new()),
            slots: Arc::new(Semaphore::new(max_concurrent_runs.max(1))),
        }
    }

    /// Build a service that shells out to the configured programs
    pub fn from_config(config: &RunConfig) -> Result<Self, RunError> {
        let materializer =
            ConfigMaterializer::new(&config.static_dir, config.config_template.clone());
        let engine = CommandEngine::new(&config.engine_command, config.run_timeout)?;
        let visualizer = CommandVisualizer::new(&config.visualizer_command, &config.static_dir)?;

        Ok(Self::new(
            materializer,
            Arc::new(engine),
            Arc::new(visualizer),
            config.max_concurrent_runs,
        )
        .with_tracker(RunTracker::with_retention(config.run_retention)))
    }

    /// Replace the run tracker, e.g. to change its retention window
    pub fn with_tracker(mut self, tracker: RunTracker) -> Self {
        self.tracker = Arc::new(tracker);
        self
    }

    pub fn tracker(&self) -> &RunTracker {
        &self.tracker
    }

    /// Materialize the config for a new run and queue it for execution.
    ///
    /// Returns once `config.yaml` is on disk; the engine runs on a spawned task.
    pub async fn start(self: &Arc<Self>, request: RunRequest) -> Result<RunId, RunError> {
        let id = RunId::new();
        info!("Beginning load test for {} against {}", id, request.host());

        let config_path = self.materializer.materialize(&request, id).await?;
        self.tracker.insert_pending(id, request.host());
        counter!("loadtest_runs_started_total").increment(1);

        let service = Arc::clone(self);
        let host = request.host().to_string();
        let worker = tokio::spawn(async move { service.execute(id, config_path, host).await });

        // A panicking worker never reaches `finish`, so record it here
        let tracker = Arc::clone(&self.tracker);
        tokio::spawn(async move {
            if let Err(e) = worker.await {
                error!("Run worker for {} aborted: {}", id, e);
                tracker.finish(
                    id,
                    RunState::Exception,
                    Some(format!("Run worker aborted: {}", e)),
                );
                counter!("loadtest_runs_completed_total", "outcome" => RunState::Exception.as_str())
                    .increment(1);
            }
        });

        Ok(id)
    }

    async fn execute(&self, id: RunId, config_path: PathBuf, host: String) {
        let _permit = match self.slots.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                self.tracker.finish(
                    id,
                    RunState::Error,
                    Some("Run queue is closed".to_string()),
                );
                return;
            }
        };
        self.tracker.mark_running(id);
        let start = Instant::now();

        let (state, details) = match self.test_and_visualize(id, &config_path).await {
            Ok(()) => {
                info!("Run {} finished in {:?}", id, start.elapsed());
                (RunState::Succeeded, None)
            }
            Err(e) if e.is_engine_termination() => {
                warn!("Load test {} against {} ended early: {}", id, host, e);
                self.remove_run_dir(id).await;
                (
                    RunState::Failed,
                    Some(format!("Error during {} load tests. Deleted results.", host)),
                )
            }
            Err(e) => {
                error!("Run {} failed: {}", id, e);
                (RunState::Error, Some(e.to_string()))
            }
        };

        histogram!("loadtest_run_duration_seconds").record(start.elapsed());
        counter!("loadtest_runs_completed_total", "outcome" => state.as_str()).increment(1);
        self.tracker.finish(id, state, details);
    }

    async fn test_and_visualize(&self, id: RunId, config_path: &Path) -> Result<(), RunError> {
        self.engine.run(config_path, id).await?;
        info!("Load test complete: {}", id);
        self.visualizer.visualize(id).await?;
        info!("Visualized: {}", id);
        Ok(())
    }

    async fn remove_run_dir(&self, id: RunId) {
        let dir = self.materializer.run_dir(id);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => info!("Deleted results for {}", id),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to delete run directory {:?}: {}", dir, e),
        }
    }
}
