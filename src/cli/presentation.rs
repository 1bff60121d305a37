//! CLI presentation: text and json formatters per command.

use crate::config::{ConfigLoader, StudioConfig};
use crate::error::StudioError;
use crate::pack::{PackKind, ShotJob};
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde::Serialize;

/// Job counts for one pack kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackSummaryRow {
    pub pack: PackKind,
    pub model_jobs: usize,
    pub product_jobs: usize,
}

fn heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

fn to_json<T: Serialize>(value: &T) -> Result<String, StudioError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| StudioError::ConfigError(format!("Failed to render JSON: {}", e)))
}

pub fn format_pack_summary(rows: &[PackSummaryRow], format: &str) -> Result<String, StudioError> {
    if format == "json" {
        return to_json(&rows);
    }
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Pack", "Model session jobs", "Product-only jobs"]);
    for row in rows {
        table.add_row(vec![
            row.pack.to_string(),
            row.model_jobs.to_string(),
            row.product_jobs.to_string(),
        ]);
    }
    Ok(format!("{}\n{}", heading("Packs"), table))
}

pub fn format_expansion(
    pack: PackKind,
    product_only: bool,
    jobs: &[ShotJob],
    format: &str,
) -> Result<String, StudioError> {
    if format == "json" {
        return to_json(&jobs);
    }
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["#", "Shot", "Ratio", "Overrides"]);
    for job in jobs {
        let overrides = [
            job.overrides.shot_type.as_deref(),
            job.overrides.expression.as_deref(),
            job.overrides.camera_angle.as_deref(),
            job.overrides.focal_length.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(", ");
        table.add_row(vec![
            job.index.to_string(),
            job.label.clone(),
            job.aspect_ratio.to_string(),
            overrides,
        ]);
    }
    let audience = if product_only { "product-only" } else { "model" };
    let title = format!("{} pack ({}, {} jobs)", pack, audience, jobs.len());
    Ok(format!("{}\n{}", heading(&title), table))
}

pub fn format_config(config: &StudioConfig) -> Result<String, StudioError> {
    ConfigLoader::to_toml(config)
}
