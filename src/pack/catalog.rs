//! Static shot catalogs for pack expansion.
//!
//! A catalog lists model shots (pose, expression, camera angle) and product
//! shots (camera angle, focal length), each tagged with the pack tier that
//! includes it, plus the ordered social shot id lists. Catalog order is the
//! expansion order.

use crate::error::StudioError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Which pack tier a catalog entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShotTier {
    Essential,
    Plus,
    Social,
}

/// A shot featuring a model wearing or holding the product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelShot {
    pub id: String,
    pub label: String,
    pub tier: ShotTier,
    pub shot_type: String,
    pub expression: String,
    pub camera_angle: String,
}

/// A product-only shot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductShot {
    pub id: String,
    pub label: String,
    pub tier: ShotTier,
    pub camera_angle: String,
    pub focal_length: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub social_shot_ids: Vec<String>,
    #[serde(default)]
    pub product_social_ids: Vec<String>,
    #[serde(default)]
    pub model_shots: Vec<ModelShot>,
    #[serde(default)]
    pub product_shots: Vec<ProductShot>,
}

fn model_shot(
    id: &str,
    label: &str,
    tier: ShotTier,
    shot_type: &str,
    expression: &str,
    camera_angle: &str,
) -> ModelShot {
    ModelShot {
        id: id.to_string(),
        label: label.to_string(),
        tier,
        shot_type: shot_type.to_string(),
        expression: expression.to_string(),
        camera_angle: camera_angle.to_string(),
    }
}

fn product_shot(
    id: &str,
    label: &str,
    tier: ShotTier,
    camera_angle: &str,
    focal_length: &str,
) -> ProductShot {
    ProductShot {
        id: id.to_string(),
        label: label.to_string(),
        tier,
        camera_angle: camera_angle.to_string(),
        focal_length: focal_length.to_string(),
    }
}

impl Catalog {
    /// The default fashion e-commerce catalog.
    pub fn builtin() -> Self {
        use ShotTier::*;

        let model_shots = vec![
            model_shot(
                "front_full",
                "Full body, front",
                Essential,
                "full body front view",
                "neutral",
                "eye level",
            ),
            model_shot(
                "back_full",
                "Full body, back",
                Essential,
                "full body back view",
                "neutral",
                "eye level",
            ),
            model_shot(
                "side_profile",
                "Side profile",
                Essential,
                "three-quarter body side profile",
                "calm",
                "eye level",
            ),
            model_shot(
                "detail_closeup",
                "Detail close-up",
                Essential,
                "close-up on garment detail",
                "neutral",
                "slightly high angle",
            ),
            model_shot(
                "walking",
                "Walking",
                Plus,
                "full body walking toward camera",
                "confident",
                "low angle",
            ),
            model_shot(
                "seated",
                "Seated",
                Plus,
                "seated medium shot",
                "relaxed smile",
                "eye level",
            ),
            model_shot(
                "over_shoulder",
                "Over the shoulder",
                Plus,
                "medium shot looking over shoulder",
                "playful",
                "three-quarter angle",
            ),
            model_shot(
                "hands_in_pockets",
                "Hands in pockets",
                Plus,
                "three-quarter body, hands in pockets",
                "self-assured",
                "eye level",
            ),
            model_shot(
                "street_lifestyle",
                "Street lifestyle",
                Social,
                "medium shot in an urban setting",
                "candid laugh",
                "eye level",
            ),
            model_shot(
                "mirror_selfie",
                "Mirror selfie",
                Social,
                "half body mirror selfie",
                "playful",
                "high angle",
            ),
            model_shot(
                "golden_hour",
                "Golden hour portrait",
                Social,
                "waist-up portrait in warm light",
                "soft smile",
                "low angle",
            ),
        ];

        let product_shots = vec![
            product_shot(
                "hero_front",
                "Hero, front",
                Essential,
                "straight-on front",
                "50mm",
            ),
            product_shot(
                "three_quarter",
                "Three-quarter",
                Essential,
                "three-quarter view",
                "50mm",
            ),
            product_shot(
                "flat_lay",
                "Flat lay",
                Essential,
                "top-down",
                "35mm",
            ),
            product_shot(
                "macro_detail",
                "Macro detail",
                Essential,
                "close macro on texture",
                "100mm macro",
            ),
            product_shot(
                "side",
                "Side",
                Plus,
                "side view",
                "85mm",
            ),
            product_shot(
                "back",
                "Back",
                Plus,
                "rear view",
                "50mm",
            ),
            product_shot(
                "in_hand",
                "In hand",
                Plus,
                "hand-held for scale",
                "35mm",
            ),
            product_shot(
                "lifestyle_table",
                "Lifestyle table",
                Social,
                "lifestyle tabletop scene",
                "35mm",
            ),
            product_shot(
                "unboxing",
                "Unboxing",
                Social,
                "overhead unboxing",
                "24mm",
            ),
        ];

        Self {
            social_shot_ids: vec![
                "street_lifestyle".to_string(),
                "mirror_selfie".to_string(),
                "golden_hour".to_string(),
            ],
            product_social_ids: vec![
                "lifestyle_table".to_string(),
                "unboxing".to_string(),
            ],
            model_shots,
            product_shots,
        }
    }

    /// Parse and validate a TOML catalog.
    pub fn from_toml_str(raw: &str) -> Result<Self, StudioError> {
        let catalog: Catalog = toml::from_str(raw)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn load(path: &Path) -> Result<Self, StudioError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            StudioError::Catalog(format!("Failed to read catalog {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn model_shot(&self, id: &str) -> Option<&ModelShot> {
        self.model_shots.iter().find(|shot| shot.id == id)
    }

    pub fn product_shot(&self, id: &str) -> Option<&ProductShot> {
        self.product_shots.iter().find(|shot| shot.id == id)
    }

    pub fn model_shots_in(&self, tier: ShotTier) -> impl Iterator<Item = &ModelShot> {
        self.model_shots.iter().filter(move |shot| shot.tier == tier)
    }

    pub fn product_shots_in(&self, tier: ShotTier) -> impl Iterator<Item = &ProductShot> {
        self.product_shots.iter().filter(move |shot| shot.tier == tier)
    }

    pub fn validate(&self) -> Result<(), StudioError> {
        let mut seen = HashSet::new();
        for shot in &self.model_shots {
            if !seen.insert(shot.id.as_str()) {
                return Err(StudioError::Catalog(format!(
                    "Duplicate model shot id '{}'",
                    shot.id
                )));
            }
        }
        let mut seen = HashSet::new();
        for shot in &self.product_shots {
            if !seen.insert(shot.id.as_str()) {
                return Err(StudioError::Catalog(format!(
                    "Duplicate product shot id '{}'",
                    shot.id
                )));
            }
        }

        if self.model_shots_in(ShotTier::Essential).next().is_none() {
            return Err(StudioError::Catalog(
                "Catalog has no essential model shots".to_string(),
            ));
        }
        if self.product_shots_in(ShotTier::Essential).next().is_none() {
            return Err(StudioError::Catalog(
                "Catalog has no essential product shots".to_string(),
            ));
        }

        for id in &self.social_shot_ids {
            if self.model_shot(id).is_none() {
                return Err(StudioError::Catalog(format!(
                    "Social shot id '{}' does not match any model shot",
                    id
                )));
            }
        }
        for id in &self.product_social_ids {
            if self.product_shot(id).is_none() {
                return Err(StudioError::Catalog(format!(
                    "Product social id '{}' does not match any product shot",
                    id
                )));
            }
        }

        Ok(())
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}
