//! Configuration module
//!
//! Handles loading and layering run configuration: defaults, config file,
//! `PARALLEL_CUCUMBER_*` environment variables, then CLI flags.

mod env;
mod file;

pub use env::EnvConfig;
use file::{find_config_file, is_yaml_file};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::environment::EnvSpec;

/// Run configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Number of workers; 0 infers it from `env_variables`
    pub workers: usize,

    /// Target scenarios per worker request
    pub batch_size: usize,

    /// Seconds between consecutive worker starts
    pub worker_delay: f64,

    /// Shared queue location
    pub queue: QueueConfig,

    /// Discovery engine invocation
    pub cucumber: CucumberConfig,

    /// Worker process invocation
    pub worker: WorkerConfig,

    /// Per-worker environment variables
    pub env_variables: EnvSpec,

    /// Enable debug logging
    pub debug: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            batch_size: 1,
            worker_delay: 0.0,
            queue: QueueConfig::default(),
            cucumber: CucumberConfig::default(),
            worker: WorkerConfig::default(),
            env_variables: EnvSpec::default(),
            debug: false,
        }
    }
}

impl RunConfig {
    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = if is_yaml_file(path) {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, or from the first standard location, or defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => match find_config_file() {
                Some(found) => Self::load(found),
                None => Ok(Self::default()),
            },
        }
    }

    /// Override fields set through environment variables
    pub fn apply_env(&mut self, env: &EnvConfig) {
        if let Some(url) = &env.queue_url {
            self.queue.url = url.clone();
        }
        if let Some(name) = &env.queue_name {
            self.queue.name = name.clone();
        }
        if let Some(workers) = env.workers {
            self.workers = workers;
        }
        if let Some(batch_size) = env.batch_size {
            self.batch_size = batch_size;
        }
        if let Some(delay) = env.worker_delay {
            self.worker_delay = delay;
        }
        if let Some(debug) = env.debug {
            self.debug = debug;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            anyhow::bail!("batch_size must be at least 1");
        }
        if !self.worker_delay.is_finite() || self.worker_delay < 0.0 {
            anyhow::bail!("worker_delay must be a non-negative number of seconds");
        }
        if self.queue.name.is_empty() {
            anyhow::bail!("queue name must not be empty");
        }
        self.env_variables
            .validate()
            .context("Invalid env_variables")?;
        Ok(())
    }
}

/// Shared queue location
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Redis URL
    pub url: String,

    /// Name of the Redis list
    pub name: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            name: "parallel-cucumber-queue".to_string(),
        }
    }
}

/// Discovery engine invocation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CucumberConfig {
    /// Executable performing the dry run
    pub command: String,

    /// Options placed before the selection arguments
    pub options: Vec<String>,
}

impl Default for CucumberConfig {
    fn default() -> Self {
        Self {
            command: "cucumber".to_string(),
            options: Vec::new(),
        }
    }
}

/// Worker process invocation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Executable run once per worker
    pub command: String,

    /// Arguments placed before the queue and batch arguments
    pub args: Vec<String>,

    /// Directory for per-worker results files; a temporary one if unset
    pub results_dir: Option<PathBuf>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            command: "parallel-cucumber-worker".to_string(),
            args: Vec::new(),
            results_dir: None,
        }
    }
}
