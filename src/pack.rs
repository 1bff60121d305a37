//! Pack Expander
//!
//! Turns a pack selection into the ordered list of [`ShotJob`]s that fill a
//! session's result slots. Expansion is pure: the same pack, catalog and
//! options always produce the same jobs in the same order.

use crate::error::StudioError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod catalog;

pub use catalog::{Catalog, ModelShot, ProductShot, ShotTier};

/// Pack selections offered by the studio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackKind {
    /// E-commerce essentials
    Essential,
    /// E-commerce essentials plus the extended poses
    Plus,
    /// Social shots, each rendered square and vertical
    Social,
    /// Essential followed by social
    Complete,
}

impl PackKind {
    pub const ALL: [PackKind; 4] = [
        PackKind::Essential,
        PackKind::Plus,
        PackKind::Social,
        PackKind::Complete,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PackKind::Essential => "essential",
            PackKind::Plus => "plus",
            PackKind::Social => "social",
            PackKind::Complete => "complete",
        }
    }
}

impl fmt::Display for PackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackKind {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "essential" => Ok(PackKind::Essential),
            "plus" => Ok(PackKind::Plus),
            "social" => Ok(PackKind::Social),
            "complete" => Ok(PackKind::Complete),
            other => Err(StudioError::Validation(format!(
                "Unknown pack '{}' (expected essential, plus, social or complete)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "1:1")]
    Square,
    #[default]
    #[serde(rename = "3:4")]
    Portrait,
    #[serde(rename = "4:3")]
    Landscape,
    #[serde(rename = "9:16")]
    Vertical,
    #[serde(rename = "16:9")]
    Widescreen,
}

/// Every social shot is rendered once per ratio, in this order.
pub const SOCIAL_ASPECT_RATIOS: [AspectRatio; 2] = [AspectRatio::Square, AspectRatio::Vertical];

impl AspectRatio {
    pub fn as_str(self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait => "3:4",
            AspectRatio::Landscape => "4:3",
            AspectRatio::Vertical => "9:16",
            AspectRatio::Widescreen => "16:9",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1:1" => Ok(AspectRatio::Square),
            "3:4" => Ok(AspectRatio::Portrait),
            "4:3" => Ok(AspectRatio::Landscape),
            "9:16" => Ok(AspectRatio::Vertical),
            "16:9" => Ok(AspectRatio::Widescreen),
            other => Err(StudioError::Validation(format!(
                "Unsupported aspect ratio '{}'",
                other
            ))),
        }
    }
}

/// Parameters layered onto the session's base creative controls for one shot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShotOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shot_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera_angle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focal_length: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<AspectRatio>,
}

impl ShotOverrides {
    pub fn is_empty(&self) -> bool {
        *self == ShotOverrides::default()
    }
}

/// One unit of work inside a pack. `index` is the result slot it fills.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShotJob {
    pub index: usize,
    pub shot_id: String,
    pub label: String,
    pub overrides: ShotOverrides,
    pub aspect_ratio: AspectRatio,
}

/// Session facts that shape expansion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpandOptions {
    /// The session's chosen ratio, used by e-commerce shots
    pub aspect_ratio: AspectRatio,
    /// No model selected: draw from the product catalog
    pub product_only: bool,
}

struct ShotSpec {
    shot_id: String,
    label: String,
    overrides: ShotOverrides,
}

impl From<&ModelShot> for ShotSpec {
    fn from(shot: &ModelShot) -> Self {
        Self {
            shot_id: shot.id.clone(),
            label: shot.label.clone(),
            overrides: ShotOverrides {
                shot_type: Some(shot.shot_type.clone()),
                expression: Some(shot.expression.clone()),
                camera_angle: Some(shot.camera_angle.clone()),
                ..ShotOverrides::default()
            },
        }
    }
}

impl From<&ProductShot> for ShotSpec {
    fn from(shot: &ProductShot) -> Self {
        Self {
            shot_id: shot.id.clone(),
            label: shot.label.clone(),
            overrides: ShotOverrides {
                camera_angle: Some(shot.camera_angle.clone()),
                focal_length: Some(shot.focal_length.clone()),
                ..ShotOverrides::default()
            },
        }
    }
}

fn ecommerce_specs(catalog: &Catalog, tiers: &[ShotTier], product_only: bool) -> Vec<ShotSpec> {
    if product_only {
        catalog
            .product_shots
            .iter()
            .filter(|shot| tiers.contains(&shot.tier))
            .map(ShotSpec::from)
            .collect()
    } else {
        catalog
            .model_shots
            .iter()
            .filter(|shot| tiers.contains(&shot.tier))
            .map(ShotSpec::from)
            .collect()
    }
}

fn social_specs(catalog: &Catalog, product_only: bool) -> Result<Vec<ShotSpec>, StudioError> {
    if product_only {
        catalog
            .product_social_ids
            .iter()
            .map(|id| {
                catalog.product_shot(id).map(ShotSpec::from).ok_or_else(|| {
                    StudioError::Catalog(format!("Unknown product social shot '{}'", id))
                })
            })
            .collect()
    } else {
        catalog
            .social_shot_ids
            .iter()
            .map(|id| {
                catalog
                    .model_shot(id)
                    .map(ShotSpec::from)
                    .ok_or_else(|| StudioError::Catalog(format!("Unknown social shot '{}'", id)))
            })
            .collect()
    }
}

fn push_ecommerce(jobs: &mut Vec<ShotJob>, specs: Vec<ShotSpec>, aspect_ratio: AspectRatio) {
    for spec in specs {
        jobs.push(ShotJob {
            index: jobs.len(),
            shot_id: spec.shot_id,
            label: spec.label,
            overrides: spec.overrides,
            aspect_ratio,
        });
    }
}

fn push_social(jobs: &mut Vec<ShotJob>, specs: Vec<ShotSpec>) {
    for spec in specs {
        for ratio in SOCIAL_ASPECT_RATIOS {
            let mut overrides = spec.overrides.clone();
            overrides.aspect_ratio = Some(ratio);
            jobs.push(ShotJob {
                index: jobs.len(),
                shot_id: spec.shot_id.clone(),
                label: format!("{} ({})", spec.label, ratio),
                overrides,
                aspect_ratio: ratio,
            });
        }
    }
}

/// Expand `pack` into its ordered jobs.
pub fn expand(
    pack: PackKind,
    catalog: &Catalog,
    options: &ExpandOptions,
) -> Result<Vec<ShotJob>, StudioError> {
    let mut jobs = Vec::new();
    match pack {
        PackKind::Essential => push_ecommerce(
            &mut jobs,
            ecommerce_specs(catalog, &[ShotTier::Essential], options.product_only),
            options.aspect_ratio,
        ),
        PackKind::Plus => push_ecommerce(
            &mut jobs,
            ecommerce_specs(
                catalog,
                &[ShotTier::Essential, ShotTier::Plus],
                options.product_only,
            ),
            options.aspect_ratio,
        ),
        PackKind::Social => push_social(&mut jobs, social_specs(catalog, options.product_only)?),
        PackKind::Complete => {
            push_ecommerce(
                &mut jobs,
                ecommerce_specs(catalog, &[ShotTier::Essential], options.product_only),
                options.aspect_ratio,
            );
            push_social(&mut jobs, social_specs(catalog, options.product_only)?);
        }
    }
    Ok(jobs)
}
