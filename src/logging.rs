//! Logging System
//!
//! Structured logging implementation using the `tracing` crate. Provides configurable
//! log levels, output formats, and destinations.

use crate::error::StudioError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Install a subscriber at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level: trace, debug, info, warn, error, off
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: json, text (default: text)
    #[serde(default = "default_format")]
    pub format: String,

    /// Output destination: stdout, stderr, file
    #[serde(default = "default_output")]
    pub output: String,

    /// Log file path (required when output is "file")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,

    /// Enable colored output (text format only, stdout/stderr only)
    #[serde(default = "default_true")]
    pub color: bool,

    /// Module-specific log levels
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_output() -> String {
    "stderr".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            level: default_log_level(),
            format: default_format(),
            output: default_output(),
            file: None,
            color: default_true(),
            modules: HashMap::new(),
        }
    }
}

/// Where log lines go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputDestination {
    Stdout,
    Stderr,
    File,
}

/// Initialize the logging system
///
/// Priority order (highest to lowest):
/// 1. Environment variables (SHOTFORGE_LOG, SHOTFORGE_LOG_FORMAT, SHOTFORGE_LOG_OUTPUT)
/// 2. Configuration (file or CLI-adjusted)
/// 3. Defaults
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<(), StudioError> {
    if config.map(|c| !c.enabled).unwrap_or(false) {
        return Ok(());
    }

    let filter = build_env_filter(config)?;
    let format = determine_format(config)?;
    let output = determine_output(config)?;
    let use_color = config.map(|c| c.color).unwrap_or(true);
    let base_subscriber = Registry::default().with(filter);

    let init_result = match (format.as_str(), output) {
        ("json", OutputDestination::File) => base_subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(open_log_file(config)?),
            )
            .try_init(),
        ("json", OutputDestination::Stdout) => base_subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(std::io::stdout),
            )
            .try_init(),
        ("json", OutputDestination::Stderr) => base_subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        (_, OutputDestination::File) => base_subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(false)
                    .with_writer(open_log_file(config)?),
            )
            .try_init(),
        (_, OutputDestination::Stdout) => base_subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(use_color)
                    .with_writer(std::io::stdout),
            )
            .try_init(),
        (_, OutputDestination::Stderr) => base_subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(use_color)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };

    init_result
        .map_err(|e| StudioError::ConfigError(format!("Failed to initialize logging: {}", e)))
}

fn open_log_file(config: Option<&LoggingConfig>) -> Result<std::fs::File, StudioError> {
    let log_file = config.and_then(|c| c.file.clone()).ok_or_else(|| {
        StudioError::ConfigError("Log output is 'file' but no log file is set".to_string())
    })?;
    ensure_parent_dir(&log_file)?;
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)
        .map_err(|e| {
            StudioError::ConfigError(format!("Failed to open log file {:?}: {}", log_file, e))
        })
}

fn ensure_parent_dir(path: &Path) -> Result<(), StudioError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            StudioError::ConfigError(format!("Failed to create log directory: {}", e))
        })?;
    }
    Ok(())
}

/// Build environment filter from config or environment variables
fn build_env_filter(config: Option<&LoggingConfig>) -> Result<EnvFilter, StudioError> {
    if let Ok(filter) = EnvFilter::try_from_env("SHOTFORGE_LOG") {
        return Ok(filter);
    }

    let level = config.map(|c| c.level.as_str()).unwrap_or("info");
    if level == "off" {
        return Ok(EnvFilter::new("off"));
    }

    let mut filter = EnvFilter::new(level);

    if let Some(config) = config {
        for (module, module_level) in &config.modules {
            filter = filter.add_directive(parse_directive(module, module_level)?);
        }
    }

    if let Ok(modules_str) = std::env::var("SHOTFORGE_LOG_MODULES") {
        for module_spec in modules_str.split(',') {
            if let Some((module, module_level)) = module_spec.split_once('=') {
                filter = filter.add_directive(parse_directive(module.trim(), module_level.trim())?);
            }
        }
    }

    Ok(filter)
}

fn parse_directive(
    module: &str,
    level: &str,
) -> Result<tracing_subscriber::filter::Directive, StudioError> {
    format!("{}={}", module, level)
        .parse()
        .map_err(|e| StudioError::ConfigError(format!("Invalid log directive: {}", e)))
}

/// Determine output format from config or environment
fn determine_format(config: Option<&LoggingConfig>) -> Result<String, StudioError> {
    if let Ok(format) = std::env::var("SHOTFORGE_LOG_FORMAT") {
        if format == "json" || format == "text" {
            return Ok(format);
        }
    }

    let format = config.map(|c| c.format.as_str()).unwrap_or("text");
    if format != "json" && format != "text" {
        return Err(StudioError::ConfigError(format!(
            "Invalid log format: {} (must be 'json' or 'text')",
            format
        )));
    }

    Ok(format.to_string())
}

/// Determine output destination from config or environment
fn determine_output(config: Option<&LoggingConfig>) -> Result<OutputDestination, StudioError> {
    if let Ok(output) = std::env::var("SHOTFORGE_LOG_OUTPUT") {
        return parse_output_destination(&output);
    }

    let output = config.map(|c| c.output.as_str()).unwrap_or("stderr");
    parse_output_destination(output)
}

fn parse_output_destination(output: &str) -> Result<OutputDestination, StudioError> {
    match output {
        "stdout" => Ok(OutputDestination::Stdout),
        "stderr" => Ok(OutputDestination::Stderr),
        "file" => Ok(OutputDestination::File),
        _ => Err(StudioError::ConfigError(format!(
            "Invalid log output: {} (must be 'stdout', 'stderr', or 'file')",
            output
        ))),
    }
}
