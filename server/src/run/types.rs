//! Run-related types and error definitions

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Fixed file names inside a run directory
pub const CONFIG_FILE: &str = "config.yaml";
pub const OUTPUT_FILE: &str = "output.json";
pub const IMAGE_FILE: &str = "image.png";

/// Errors that can occur while starting, executing or viewing a run
#[derive(Debug, Error)]
pub enum RunError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid run id: {0}")]
    InvalidId(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("Load test engine terminated ({0})")]
    EngineTerminated(String),

    #[error("Load test engine timed out after {0:?}")]
    EngineTimeout(Duration),

    #[error("Visualization failed: {0}")]
    Visualization(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl RunError {
    /// Whether the engine ended the run on its own terms (non-zero exit or
    /// timeout). These runs have their directory removed.
    pub fn is_engine_termination(&self) -> bool {
        matches!(
            self,
            RunError::EngineTerminated(_) | RunError::EngineTimeout(_)
        )
    }
}

/// Unique identifier of a run; doubles as its directory name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RunId {
    type Err = RunError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| RunError::InvalidId(s.to_string()))
    }
}

/// Lifecycle state of a tracked run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Config written, waiting for a worker slot
    Pending,
    /// Engine or visualizer executing
    Running,
    Succeeded,
    /// Engine signalled termination; results were deleted
    Failed,
    /// Engine could not be started, visualization failed, or IO failed
    Error,
    /// The worker task panicked
    Exception,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RunState::Pending | RunState::Running)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunState::Pending => "pending",
            RunState::Running => "running",
            RunState::Succeeded => "succeeded",
            RunState::Failed => "failed",
            RunState::Error => "error",
            RunState::Exception => "exception",
        }
    }
}

/// Outcome status reported to `/init-test` callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    Failed,
    Error,
    Exception,
}

/// Structured response of `/init-test`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub status: OutcomeStatus,
    /// `/view/<uuid>` once a run was accepted, empty otherwise
    pub url: String,
    pub details: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<RunState>,
}

impl RunOutcome {
    pub fn accepted(id: RunId) -> Self {
        Self {
            status: OutcomeStatus::Success,
            url: format!("/view/{}", id),
            details: id.to_string(),
            state: Some(RunState::Pending),
        }
    }

    /// Outcome describing a tracked run's current state
    pub fn from_record(record: &RunRecord) -> Self {
        let status = match record.state {
            RunState::Failed => OutcomeStatus::Failed,
            RunState::Error => OutcomeStatus::Error,
            RunState::Exception => OutcomeStatus::Exception,
            RunState::Pending | RunState::Running | RunState::Succeeded => OutcomeStatus::Success,
        };
        let url = if status == OutcomeStatus::Success {
            format!("/view/{}", record.id)
        } else {
            String::new()
        };
        Self {
            status,
            url,
            details: record
                .details
                .clone()
                .unwrap_or_else(|| record.id.to_string()),
            state: Some(record.state),
        }
    }

    pub fn error(details: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Error,
            url: String::new(),
            details: details.into(),
            state: None,
        }
    }
}

/// Tracker entry for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: RunId,
    pub state: RunState,
    /// Target host the run is pointed at
    pub host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// A validated `/init-test` payload
#[derive(Debug, Clone)]
pub struct RunRequest {
    host: String,
    payload: serde_json::Map<String, serde_json::Value>,
}

impl RunRequest {
    /// Accept a payload only if it carries a non-empty `plugin_options.host`.
    pub fn from_json(value: serde_json::Value) -> Result<Self, RunError> {
        let missing = || RunError::Validation("Requires 'host' key/value".to_string());

        let serde_json::Value::Object(payload) = value else {
            return Err(missing());
        };
        let host = payload
            .get("plugin_options")
            .and_then(|opts| opts.get("host"))
            .and_then(|h| h.as_str())
            .filter(|h| !h.trim().is_empty())
            .ok_or_else(missing)?
            .to_string();

        if let Some(path) = find_control_chars(&payload) {
            return Err(RunError::Validation(format!(
                "Value of '{}' must not contain control characters",
                path
            )));
        }

        Ok(Self { host, payload })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn payload(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.payload
    }
}

/// Dotted path of the first key or string value holding a control character.
///
/// Values are spliced into a YAML document, where a newline can start a new key.
fn find_control_chars(payload: &serde_json::Map<String, serde_json::Value>) -> Option<String> {
    fn has_control(s: &str) -> bool {
        s.chars().any(char::is_control)
    }

    fn walk(value: &serde_json::Value, path: String) -> Option<String> {
        match value {
            serde_json::Value::String(s) if has_control(s) => Some(path),
            serde_json::Value::Array(items) => items
                .iter()
                .enumerate()
                .find_map(|(i, item)| walk(item, format!("{}.{}", path, i))),
            serde_json::Value::Object(map) => map.iter().find_map(|(key, item)| {
                let path = format!("{}.{}", path, key);
                if has_control(key) {
                    Some(path)
                } else {
                    walk(item, path)
                }
            }),
            _ => None,
        }
    }

    payload.iter().find_map(|(key, item)| {
        if has_control(key) {
            Some(key.clone())
        } else {
            walk(item, key.clone())
        }
    })
}
