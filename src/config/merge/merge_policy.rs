//! Merge rules: defaults, override order, conflict handling.
//!
//! Later sources win key by key: defaults, then the global file, then the
//! workspace files, then `SHOTFORGE__*` environment variables.

use config::builder::DefaultState;
use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("plan.requests_per_minute", 10)?
        .set_default("plan.daily_limit", 100)?
        .set_default("retry.max_retries", 3)?
        .set_default("retry.initial_delay_ms", 2000)?
        .set_default("video.poll_interval_ms", 10_000)?
        .set_default("video.default_resolution", "720p")?
        .set_default("video.default_aspect_ratio", "16:9")?
        .set_default("persistence.enabled", true)?
        .set_default("persistence.queue_capacity", 64)
}
