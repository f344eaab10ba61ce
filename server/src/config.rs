//! Server configuration
//!
//! Configuration is loaded once from environment variables at startup and
//! handed to the router through `AppState`. Nothing mutates it afterwards.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Main server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Default log level when `RUST_LOG` is not set
    pub log_level: String,

    /// Run configuration
    pub run: RunConfig,
}

/// Settings for run materialization and the external collaborators
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Static root; every run gets a `<static_dir>/<uuid>` directory
    pub static_dir: PathBuf,
    /// Config template file. The built-in template is used when unset.
    pub config_template: Option<PathBuf>,
    /// Load-test engine program followed by any leading arguments
    pub engine_command: Vec<String>,
    /// Visualization program followed by any leading arguments
    pub visualizer_command: Vec<String>,
    /// Maximum number of runs executing at the same time
    pub max_concurrent_runs: usize,
    /// Engine wall-clock limit (no limit when unset)
    pub run_timeout: Option<Duration>,
    /// How long finished runs stay in the in-memory tracker
    pub run_retention: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8443,
            log_level: "info".to_string(),
            run: RunConfig::default(),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            static_dir: PathBuf::from("static"),
            config_template: None,
            engine_command: vec!["load_test".to_string()],
            visualizer_command: vec!["visualize".to_string()],
            max_concurrent_runs: 2,
            run_timeout: None,
            run_retention: Duration::from_secs(3600),
        }
    }
}

/// Split a command line on whitespace, dropping empty input.
fn parse_command(value: &str) -> Option<Vec<String>> {
    let parts: Vec<String> = value.split_whitespace().map(str::to_string).collect();
    if parts.is_empty() { None } else { Some(parts) }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // Server config
        if let Ok(host) = env::var("APP_HOST")
            && !host.is_empty()
        {
            config.host = host;
        }
        if let Ok(port) = env::var("APP_PORT")
            && let Ok(p) = port.parse()
        {
            config.port = p;
        }
        if let Ok(level) = env::var("LOGGING_LEVEL")
            && !level.is_empty()
        {
            config.log_level = level.to_lowercase();
        }

        // Run config
        if let Ok(dir) = env::var("STATIC_DIR")
            && !dir.is_empty()
        {
            config.run.static_dir = PathBuf::from(dir);
        }
        if let Ok(path) = env::var("CONFIG_TEMPLATE")
            && !path.is_empty()
        {
            config.run.config_template = Some(PathBuf::from(path));
        }
        if let Ok(val) = env::var("ENGINE_COMMAND")
            && let Some(cmd) = parse_command(&val)
        {
            config.run.engine_command = cmd;
        }
        if let Ok(val) = env::var("VISUALIZER_COMMAND")
            && let Some(cmd) = parse_command(&val)
        {
            config.run.visualizer_command = cmd;
        }
        if let Ok(val) = env::var("MAX_CONCURRENT_RUNS")
            && let Ok(n) = val.parse::<usize>()
            && n > 0
        {
            config.run.max_concurrent_runs = n;
        }
        if let Ok(val) = env::var("RUN_TIMEOUT_SECS")
            && let Ok(secs) = val.parse::<u64>()
            && secs > 0
        {
            config.run.run_timeout = Some(Duration::from_secs(secs));
        }
        if let Ok(val) = env::var("RUN_RETENTION_SECS")
            && let Ok(secs) = val.parse::<u64>()
        {
            config.run.run_retention = Duration::from_secs(secs);
        }

        config
    }
}
