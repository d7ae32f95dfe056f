//! Layered settings: built-in defaults, then an optional TOML file, then
//! `AGENT_QUEUE__*` environment variables

use agent_queue_core::application::DEFAULT_SWEEP_INTERVAL;
use agent_queue_core::domain::config::{
    DEFAULT_MAX_CONCURRENT_PER_USER, DEFAULT_MAX_QUEUE_SIZE, DEFAULT_REQUEST_TIMEOUT,
};
use agent_queue_core::QueueConfig;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "AGENT_QUEUE";
const CONFIG_FILE_NAME: &str = "config.toml";
const DEFAULT_LOG_FILTER: &str = "agent_queue=info";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub queue: QueueSettings,
    pub sweep: SweepSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueSettings {
    pub max_concurrent_per_user: usize,
    pub max_queue_size: usize,
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SweepSettings {
    pub interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogSettings {
    pub format: LogFormat,
    /// Used when `RUST_LOG` is unset
    pub filter: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable, colored
    Pretty,
    /// One JSON object per line
    Json,
}

impl Settings {
    /// Load settings from `path`, or from the per-user config directory when
    /// no path is given. An explicit path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => Some((path.to_path_buf(), true)),
            None => default_config_path().map(|path| (path, false)),
        };

        let env = Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true);

        Self::from_sources(file, env)
    }

    fn from_sources(file: Option<(PathBuf, bool)>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default(
                "queue.max_concurrent_per_user",
                DEFAULT_MAX_CONCURRENT_PER_USER as i64,
            )?
            .set_default("queue.max_queue_size", DEFAULT_MAX_QUEUE_SIZE as i64)?
            .set_default(
                "queue.request_timeout_ms",
                DEFAULT_REQUEST_TIMEOUT.as_millis() as i64,
            )?
            .set_default("sweep.interval_ms", DEFAULT_SWEEP_INTERVAL.as_millis() as i64)?
            .set_default("log.format", "pretty")?
            .set_default("log.filter", DEFAULT_LOG_FILTER)?;

        if let Some((path, required)) = file {
            builder = builder.add_source(File::from(path).required(required));
        }

        builder
            .add_source(env)
            .build()
            .context("Failed to read settings")?
            .try_deserialize()
            .context("Invalid settings")
    }

    /// Default limits for the queue manager, validated
    pub fn queue_config(&self) -> Result<QueueConfig> {
        let config = QueueConfig::new(
            self.queue.max_concurrent_per_user,
            self.queue.max_queue_size,
            Duration::from_millis(self.queue.request_timeout_ms),
        );
        config.validate()?;
        Ok(config)
    }

    pub fn sweep_interval(&self) -> Result<Duration> {
        if self.sweep.interval_ms == 0 {
            anyhow::bail!("sweep.interval_ms must be greater than zero");
        }
        Ok(Duration::from_millis(self.sweep.interval_ms))
    }
}

/// `<config dir>/agent-queue/config.toml`, if the platform has a config dir
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "agent-queue").map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}
