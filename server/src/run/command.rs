//! Engine and visualizer backed by external programs

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use super::engine::{LoadTestEngine, Visualizer};
use super::types::{RunError, RunId};

/// Split a configured command into program and leading arguments
fn split_command(command: &[String], what: &str) -> Result<(String, Vec<String>), RunError> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| RunError::Validation(format!("{} command is empty", what)))?;
    Ok((program.clone(), args.to_vec()))
}

/// Human-readable reason for a non-zero exit, including the last stderr line
fn describe_exit(output: &Output) -> String {
    let status = match output.status.code() {
        Some(code) => format!("exit code {}", code),
        None => "killed by signal".to_string(),
    };
    let stderr = String::from_utf8_lossy(&output.stderr);
    match stderr.lines().rev().find(|l| !l.trim().is_empty()) {
        Some(line) => format!("{}: {}", status, line.trim()),
        None => status,
    }
}

fn log_output(program: &str, id: RunId, output: &Output) {
    for line in String::from_utf8_lossy(&output.stdout).lines() {
        debug!(run = %id, "{}: {}", program, line);
    }
    for line in String::from_utf8_lossy(&output.stderr).lines() {
        debug!(run = %id, "{} (stderr): {}", program, line);
    }
}

/// Runs `<program> <args..> -c <config> -u <run id>`
pub struct CommandEngine {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl CommandEngine {
    pub fn new(command: &[String], timeout: Option<Duration>) -> Result<Self, RunError> {
        let (program, args) = split_command(command, "engine")?;
        Ok(Self {
            program,
            args,
            timeout,
        })
    }
}

#[async_trait]
impl LoadTestEngine for CommandEngine {
    async fn run(&self, config_path: &Path, id: RunId) -> Result<(), RunError> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .arg("-c")
            .arg(config_path)
            .arg("-u")
            .arg(id.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                RunError::IoError(std::io::Error::new(
                    e.kind(),
                    format!("failed to start {}: {}", self.program, e),
                ))
            })?;

        // Dropping the wait future on timeout kills the child
        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| RunError::EngineTimeout(limit))??,
            None => child.wait_with_output().await?,
        };
        log_output(&self.program, id, &output);

        if output.status.success() {
            Ok(())
        } else {
            let reason = describe_exit(&output);
            warn!("Load test engine failed for {}: {}", id, reason);
            Err(RunError::EngineTerminated(reason))
        }
    }
}

/// Runs `<program> <args..> <run id>` from inside the static root
pub struct CommandVisualizer {
    program: String,
    args: Vec<String>,
    working_dir: PathBuf,
}

impl CommandVisualizer {
    pub fn new(command: &[String], working_dir: impl Into<PathBuf>) -> Result<Self, RunError> {
        let (program, args) = split_command(command, "visualizer")?;
        Ok(Self {
            program,
            args,
            working_dir: working_dir.into(),
        })
    }
}

#[async_trait]
impl Visualizer for CommandVisualizer {
    async fn visualize(&self, id: RunId) -> Result<(), RunError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(id.to_string())
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                RunError::Visualization(format!("failed to start {}: {}", self.program, e))
            })?;
        log_output(&self.program, id, &output);

        if output.status.success() {
            Ok(())
        } else {
            Err(RunError::Visualization(describe_exit(&output)))
        }
    }
}
