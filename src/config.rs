//! Configuration System
//!
//! Layered runtime configuration for the orchestration core: plan limits,
//! retry backoff, video polling, the persistence sidecar and logging.
//! Built-in defaults are overridden by the global file, the workspace files
//! and finally `SHOTFORGE__*` environment variables.

use crate::error::StudioError;
use crate::logging::LoggingConfig;
use crate::pack::AspectRatio;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

mod merge;
mod sources;

pub use sources::environment::{ENV_PREFIX, ENV_SEPARATOR};
pub use sources::global_file::global_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudioConfig {
    /// Optional TOML shot catalog replacing the built-in one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_path: Option<PathBuf>,

    #[serde(default)]
    pub plan: PlanConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub video: VideoConfig,

    #[serde(default)]
    pub persistence: PersistenceConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Plan limits supplied by the permissions collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanConfig {
    /// Requests admitted per rolling minute; 0 means unlimited
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,

    /// Carried for the completion callback; not enforced by the core
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u32,
}

fn default_requests_per_minute() -> u32 {
    10
}

fn default_daily_limit() -> u32 {
    100
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: default_requests_per_minute(),
            daily_limit: default_daily_limit(),
        }
    }
}

impl PlanConfig {
    pub fn rate_limit(&self) -> Option<u32> {
        (self.requests_per_minute > 0).then_some(self.requests_per_minute)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    2000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_resolution")]
    pub default_resolution: String,

    #[serde(default = "default_video_aspect_ratio")]
    pub default_aspect_ratio: AspectRatio,
}

fn default_poll_interval_ms() -> u64 {
    10_000
}

fn default_resolution() -> String {
    "720p".to_string()
}

fn default_video_aspect_ratio() -> AspectRatio {
    AspectRatio::Widescreen
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            default_resolution: default_resolution(),
            default_aspect_ratio: default_video_aspect_ratio(),
        }
    }
}

impl VideoConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Pending saves held by the sidecar before new ones are dropped
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_true() -> bool {
    true
}

fn default_queue_capacity() -> usize {
    64
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// One problem found while validating a [`StudioConfig`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigIssue {
    Retry(String),
    Video(String),
    Persistence(String),
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigIssue::Retry(msg) => write!(f, "retry: {}", msg),
            ConfigIssue::Video(msg) => write!(f, "video: {}", msg),
            ConfigIssue::Persistence(msg) => write!(f, "persistence: {}", msg),
        }
    }
}

impl StudioConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ConfigIssue>> {
        let mut issues = Vec::new();

        if self.retry.max_retries == 0 {
            issues.push(ConfigIssue::Retry(
                "max_retries must be at least 1".to_string(),
            ));
        }
        if self.retry.initial_delay_ms == 0 {
            issues.push(ConfigIssue::Retry(
                "initial_delay_ms must be greater than 0".to_string(),
            ));
        }
        if self.video.poll_interval_ms == 0 {
            issues.push(ConfigIssue::Video(
                "poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.persistence.queue_capacity == 0 {
            issues.push(ConfigIssue::Persistence(
                "queue_capacity must be greater than 0".to_string(),
            ));
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(issues)
        }
    }

    /// Validate and fold every issue into one error.
    pub fn ensure_valid(&self) -> Result<(), StudioError> {
        self.validate().map_err(|issues| {
            let lines: Vec<String> = issues.iter().map(|issue| issue.to_string()).collect();
            StudioError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                lines.join("\n")
            ))
        })
    }
}

/// Loads [`StudioConfig`] from the layered sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for `workspace_root`.
    pub fn load(workspace_root: &Path) -> Result<StudioConfig, StudioError> {
        let builder = merge::merge_policy::builder_with_defaults()?;
        let builder = sources::global_file::add_to_builder(builder)?;
        let builder = sources::workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = sources::environment::add_to_builder(builder);

        let config: StudioConfig = builder.build()?.try_deserialize()?;
        config.ensure_valid()?;
        Ok(config)
    }

    /// Load a single file over the defaults, ignoring other sources.
    pub fn load_from_file(path: &Path) -> Result<StudioConfig, StudioError> {
        if !path.exists() {
            return Err(StudioError::ConfigError(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let config: StudioConfig = merge::merge_policy::builder_with_defaults()?
            .add_source(config::File::from(path.to_path_buf()))
            .build()?
            .try_deserialize()?;
        config.ensure_valid()?;
        Ok(config)
    }

    pub fn to_toml(config: &StudioConfig) -> Result<String, StudioError> {
        toml::to_string_pretty(config)
            .map_err(|e| StudioError::ConfigError(format!("Failed to render config: {}", e)))
    }
}
