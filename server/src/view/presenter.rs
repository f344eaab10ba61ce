//! HTML rendering of run results, progress and listings

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local};
use minijinja::{Environment, context};
use serde::Serialize;
use tracing::{debug, warn};

use crate::run::{CONFIG_FILE, IMAGE_FILE, OUTPUT_FILE, RunError, RunId, RunRecord};

const VIEW_TEMPLATE: &str = include_str!("../../templates/view.html");
const PROGRESS_TEMPLATE: &str = include_str!("../../templates/progress.html");
const LIST_TEMPLATE: &str = include_str!("../../templates/list.html");

/// Seconds between automatic reloads of the progress page
const PROGRESS_REFRESH_SECS: u64 = 5;

/// One run directory in the listing page
#[derive(Debug, Clone, Serialize)]
pub struct RunListing {
    pub name: String,
    /// Local modification time, `%Y-%m-%d %H:%M:%S`
    pub modified: String,
    #[serde(skip)]
    modified_at: SystemTime,
}

/// Renders pages from the artifacts in the static root.
///
/// Nothing is cached: every call re-reads the run directory.
pub struct ResultPresenter {
    static_dir: PathBuf,
    env: Environment<'static>,
}

impl ResultPresenter {
    pub fn new(static_dir: impl Into<PathBuf>) -> Result<Self, RunError> {
        let mut env = Environment::new();
        env.add_template("view.html", VIEW_TEMPLATE)?;
        env.add_template("progress.html", PROGRESS_TEMPLATE)?;
        env.add_template("list.html", LIST_TEMPLATE)?;

        Ok(Self {
            static_dir: static_dir.into(),
            env,
        })
    }

    pub fn static_dir(&self) -> &Path {
        &self.static_dir
    }

    /// Results page embedding `output.json` and linking the run's artifacts
    pub async fn render_results(&self, id: RunId) -> Result<String, RunError> {
        let run_dir = self.static_dir.join(id.to_string());
        let raw = match tokio::fs::read_to_string(run_dir.join(OUTPUT_FILE)).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RunError::NotFound(format!("results for {}", id)));
            }
            Err(e) => return Err(e.into()),
        };

        // Show unparseable output verbatim rather than failing the page
        let output = match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(value) => serde_json::to_string_pretty(&value).unwrap_or(raw),
            Err(e) => {
                warn!("output.json for {} is not valid JSON: {}", id, e);
                raw
            }
        };

        let has_image = tokio::fs::try_exists(run_dir.join(IMAGE_FILE))
            .await
            .unwrap_or(false);
        let has_config = tokio::fs::try_exists(run_dir.join(CONFIG_FILE))
            .await
            .unwrap_or(false);

        let template = self.env.get_template("view.html")?;
        Ok(template.render(context! {
            uuid => id.to_string(),
            output,
            has_image,
            has_config,
        })?)
    }

    /// Auto-refreshing page for runs that are still pending or running
    pub fn render_progress(&self, record: &RunRecord) -> Result<String, RunError> {
        let template = self.env.get_template("progress.html")?;
        Ok(template.render(context! {
            uuid => record.id.to_string(),
            host => &record.host,
            state => record.state.as_str(),
            started_at => record.started_at.to_rfc3339(),
            refresh_secs => PROGRESS_REFRESH_SECS,
        })?)
    }

    /// Directories under the static root, newest first
    pub async fn list_runs(&self) -> Result<Vec<RunListing>, RunError> {
        let mut runs = Vec::new();

        let mut entries = match tokio::fs::read_dir(&self.static_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Static directory {:?} does not exist yet", self.static_dir);
                return Ok(runs);
            }
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_dir() {
                continue;
            }
            let modified_at = metadata.modified()?;
            runs.push(RunListing {
                name: entry.file_name().to_string_lossy().into_owned(),
                modified: DateTime::<Local>::from(modified_at)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string(),
                modified_at,
            });
        }

        runs.sort_by(|a, b| b.modified_at.cmp(&a.modified_at));
        Ok(runs)
    }

    pub async fn render_list(&self) -> Result<String, RunError> {
        let runs = self.list_runs().await?;
        let template = self.env.get_template("list.html")?;
        Ok(template.render(context! {
            runs,
            basedir => self.static_dir.display().to_string(),
        })?)
    }
}
