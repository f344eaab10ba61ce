//! Config materialization: template rendering and run directory layout

use std::path::{Path, PathBuf};

use minijinja::{Environment, UndefinedBehavior};
use tracing::{debug, info, warn};

use super::types::{CONFIG_FILE, RunError, RunId, RunRequest};

/// Template used when no `CONFIG_TEMPLATE` is configured
const BUILTIN_TEMPLATE: &str = include_str!("../../templates/config.yaml.j2");
const TEMPLATE_NAME: &str = "llt_config_template.j2";

/// Renders run requests into `config.yaml` files under the static root
#[derive(Debug, Clone)]
pub struct ConfigMaterializer {
    static_dir: PathBuf,
    template_path: Option<PathBuf>,
}

impl ConfigMaterializer {
    pub fn new(static_dir: impl Into<PathBuf>, template_path: Option<PathBuf>) -> Self {
        Self {
            static_dir: static_dir.into(),
            template_path,
        }
    }

    pub fn static_dir(&self) -> &Path {
        &self.static_dir
    }

    /// Directory holding every artifact of a run
    pub fn run_dir(&self, id: RunId) -> PathBuf {
        self.static_dir.join(id.to_string())
    }

    /// Make sure the run directory exists.
    /// Returns true if this call created it.
    pub async fn ensure_run_dir(&self, id: RunId) -> std::io::Result<bool> {
        tokio::fs::create_dir_all(&self.static_dir).await?;
        let path = self.run_dir(id);
        match tokio::fs::create_dir(&path).await {
            Ok(()) => {
                debug!("Created run directory {:?}", path);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && path.is_dir() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Read the template source. A configured file is re-read for every run
    /// so edits apply without a restart.
    async fn template_source(&self) -> Result<String, RunError> {
        let Some(path) = &self.template_path else {
            return Ok(BUILTIN_TEMPLATE.to_string());
        };
        tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RunError::NotFound(format!("config template {}", path.display()))
            } else {
                RunError::IoError(e)
            }
        })
    }

    /// Render the config document for a run without touching the run directory
    pub async fn render(&self, request: &RunRequest, id: RunId) -> Result<String, RunError> {
        let source = self.template_source().await?;

        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Chainable);

        let mut ctx = request.payload().clone();
        ctx.insert("uuid".to_string(), id.to_string().into());
        ctx.insert(
            "output_dir".to_string(),
            self.run_dir(id).display().to_string().into(),
        );

        Ok(env.render_named_str(TEMPLATE_NAME, &source, &ctx)?)
    }

    /// Render the config and write it to `<run dir>/config.yaml`.
    ///
    /// The directory is only created once rendering succeeded, and is removed
    /// again if this call created it but the write failed.
    pub async fn materialize(&self, request: &RunRequest, id: RunId) -> Result<PathBuf, RunError> {
        let rendered = self.render(request, id).await?;

        let created = self.ensure_run_dir(id).await?;
        let path = self.run_dir(id).join(CONFIG_FILE);

        if let Err(e) = tokio::fs::write(&path, rendered).await {
            if created
                && let Err(cleanup) = tokio::fs::remove_dir_all(self.run_dir(id)).await
            {
                warn!("Failed to remove run directory for {}: {}", id, cleanup);
            }
            return Err(e.into());
        }

        info!("Config generated for {}: {:?}", id, path);
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(value: serde_json::Value) -> RunRequest {
        RunRequest::from_json(value).unwrap()
    }

    #[tokio::test]
    async fn test_render_builtin_template() {
        let materializer = ConfigMaterializer::new("/srv/static", None);
        let id = RunId::new();
        let rendered = materializer
            .render(
                &request(json!({
                    "plugin_options": {"host": "http://llm:8080", "model_name": "granite"},
                    "load_options": {"concurrency": 8}
                })),
                id,
            )
            .await
            .unwrap();

        assert!(rendered.contains("host: \"http://llm:8080\""));
        assert!(rendered.contains("model_name: \"granite\""));
        assert!(rendered.contains("concurrency: 8"));
        // Missing sections fall back to defaults
        assert!(rendered.contains("duration: 20"));
        assert!(rendered.contains(&format!("run_id: \"{}\"", id)));
        assert!(rendered.contains(&format!("dir: \"/srv/static/{}\"", id)));
    }

    #[tokio::test]
    async fn test_render_escapes_request_values() {
        let materializer = ConfigMaterializer::new("/srv/static", None);
        let id = RunId::new();
        let rendered = materializer
            .render(
                &request(json!({
                    "plugin_options": {"host": "http://x\" dir: \"/etc"},
                    "load_options": {"concurrency": "4 # more"}
                })),
                id,
            )
            .await
            .unwrap();

        assert!(rendered.contains(r#"host: "http://x\" dir: \"/etc""#));
        assert!(rendered.contains(r#"concurrency: "4 # more""#));
        let output_keys = rendered.lines().filter(|l| l.starts_with("output:")).count();
        assert_eq!(output_keys, 1);
        assert_eq!(rendered.lines().filter(|l| l.trim_start().starts_with("dir:")).count(), 1);
    }

    #[tokio::test]
    async fn test_materialize_writes_config() {
        let temp = tempfile::tempdir().unwrap();
        let materializer = ConfigMaterializer::new(temp.path(), None);
        let id = RunId::new();

        let path = materializer
            .materialize(&request(json!({"plugin_options": {"host": "http://x"}})), id)
            .await
            .unwrap();

        assert_eq!(path, temp.path().join(id.to_string()).join("config.yaml"));
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("http://x"));
    }

    #[tokio::test]
    async fn test_ensure_run_dir_is_idempotent() {
        let temp = tempfile::tempdir().unwrap();
        let materializer = ConfigMaterializer::new(temp.path(), None);
        let id = RunId::new();

        assert!(materializer.ensure_run_dir(id).await.unwrap());
        assert!(!materializer.ensure_run_dir(id).await.unwrap());
        assert!(materializer.run_dir(id).is_dir());
    }

    #[tokio::test]
    async fn test_missing_template_is_not_found() {
        let temp = tempfile::tempdir().unwrap();
        let materializer =
            ConfigMaterializer::new(temp.path(), Some(temp.path().join("missing.j2")));
        let id = RunId::new();

        let err = materializer
            .materialize(&request(json!({"plugin_options": {"host": "http://x"}})), id)
            .await
            .unwrap_err();

        assert!(matches!(err, RunError::NotFound(_)));
        assert!(!materializer.run_dir(id).exists());
    }

    #[tokio::test]
    async fn test_custom_template_file() {
        let temp = tempfile::tempdir().unwrap();
        let template = temp.path().join("custom.j2");
        std::fs::write(&template, "target={{ plugin_options.host }} id={{ uuid }}").unwrap();
        let materializer = ConfigMaterializer::new(temp.path(), Some(template));
        let id = RunId::new();

        let rendered = materializer
            .render(&request(json!({"plugin_options": {"host": "http://y"}})), id)
            .await
            .unwrap();
        assert_eq!(rendered, format!("target=http://y id={}", id));
    }
}
