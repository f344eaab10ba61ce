//! Common Test Utilities for Integration Tests
//!
//! Fake collaborators and router builders shared across integration tests.

use async_trait::async_trait;
use axum::{Router, body::Body, http::Request, response::Response};
use loadtest_gateway::run::{ConfigMaterializer, IMAGE_FILE, OUTPUT_FILE, RunState};
use loadtest_gateway::{
    AppState, LoadTestEngine, ResultPresenter, RunError, RunId, RunService, Visualizer,
    build_router,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Semaphore;
use tower::util::ServiceExt;

/// How a fake engine run ends
#[derive(Clone, Copy)]
enum Behavior {
    Succeed,
    Terminate,
    Fail,
    Panic,
}

/// Engine that writes a canned `output.json` next to the config it is given.
///
/// With a gate, every run waits for one permit before doing anything.
pub struct FakeEngine {
    behavior: Behavior,
    gate: Option<Arc<Semaphore>>,
}

impl FakeEngine {
    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior,
            gate: None,
        }
    }

    pub fn succeeding() -> Self {
        Self::with_behavior(Behavior::Succeed)
    }

    /// Exits non-zero, which deletes the run's results
    pub fn terminating() -> Self {
        Self::with_behavior(Behavior::Terminate)
    }

    /// Fails without terminating, e.g. the program could not be started
    pub fn failing() -> Self {
        Self::with_behavior(Behavior::Fail)
    }

    pub fn panicking() -> Self {
        Self::with_behavior(Behavior::Panic)
    }

    pub fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            behavior: Behavior::Succeed,
            gate: Some(gate),
        }
    }
}

#[async_trait]
impl LoadTestEngine for FakeEngine {
    async fn run(&self, config_path: &Path, id: RunId) -> Result<(), RunError> {
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .expect("gate closed")
                .forget();
        }
        match self.behavior {
            Behavior::Succeed => {}
            Behavior::Terminate => {
                return Err(RunError::EngineTerminated("exit code 1".to_string()));
            }
            Behavior::Fail => {
                return Err(RunError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "failed to start load_test",
                )));
            }
            Behavior::Panic => panic!("engine crashed"),
        }
        let run_dir = config_path.parent().expect("config has a parent directory");
        let output = serde_json::json!({
            "results": [{"tpot": 21.4, "ttft": 102.7}],
            "summary": {"run_id": id.to_string(), "total_requests": 120},
        });
        tokio::fs::write(run_dir.join(OUTPUT_FILE), output.to_string()).await?;
        Ok(())
    }
}

/// Visualizer that drops a placeholder image into the run directory
pub struct FakeVisualizer {
    static_dir: PathBuf,
}

#[async_trait]
impl Visualizer for FakeVisualizer {
    async fn visualize(&self, id: RunId) -> Result<(), RunError> {
        let path = self.static_dir.join(id.to_string()).join(IMAGE_FILE);
        tokio::fs::write(path, b"\x89PNG\r\n\x1a\n").await?;
        Ok(())
    }
}

/// Test application with its static root in a temp directory
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub static_dir: TempDir,
}

impl TestApp {
    pub async fn request(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub fn run_dir(&self, id: &str) -> PathBuf {
        self.static_dir.path().join(id)
    }

    /// Poll the tracker until the run is in the given state
    pub async fn wait_for_state(&self, id: RunId, state: RunState) {
        for _ in 0..500 {
            if self.state.runs.tracker().get(id).map(|r| r.state) == Some(state) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("run {} never reached {}", id, state.as_str());
    }

    /// Poll the tracker until the run reaches a terminal state
    pub async fn wait_for_terminal(&self, id: RunId) -> RunState {
        for _ in 0..500 {
            if let Some(record) = self.state.runs.tracker().get(id)
                && record.state.is_terminal()
            {
                return record.state;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("run {} did not reach a terminal state", id);
    }
}

/// Create a test application driven by the given engine
pub fn create_test_app_with_engine(engine: FakeEngine) -> TestApp {
    create_test_app_with_template(engine, None)
}

pub fn create_test_app_with_template(engine: FakeEngine, template: Option<PathBuf>) -> TestApp {
    let static_dir = tempfile::tempdir().expect("create temp static dir");
    let runs = RunService::new(
        ConfigMaterializer::new(static_dir.path(), template),
        Arc::new(engine),
        Arc::new(FakeVisualizer {
            static_dir: static_dir.path().to_path_buf(),
        }),
        2,
    );
    let presenter = ResultPresenter::new(static_dir.path()).expect("templates compile");
    let state = AppState::new(Arc::new(runs), Arc::new(presenter));

    TestApp {
        router: build_router(state.clone()),
        state,
        static_dir,
    }
}

/// Create a test application whose runs always succeed
pub fn create_test_app() -> TestApp {
    create_test_app_with_engine(FakeEngine::succeeding())
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}

/// Initialize test logging for detailed output
#[allow(dead_code)]
pub fn init_test_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "loadtest_gateway=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}
