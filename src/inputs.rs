//! User-assembled inputs for one generate intent.

use crate::error::StudioError;
use crate::pack::AspectRatio;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Most images a single-mode request may ask for
pub const MAX_IMAGES_PER_REQUEST: u8 = 4;

/// An uploaded reference image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInput {
    pub mime_type: String,
    pub data: Arc<[u8]>,
}

impl ImageInput {
    pub fn new(mime_type: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }
}

/// Base creative controls; pack shots layer their overrides on top
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreativeControls {
    pub shot_type: Option<String>,
    pub expression: Option<String>,
    pub camera_angle: Option<String>,
    pub lighting: Option<String>,
    pub background: Option<String>,
    pub style: Option<String>,
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
}

/// Video-mode inputs. Unset ratio and resolution fall back to the configured defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoInputs {
    pub prompt: String,
    pub aspect_ratio: Option<AspectRatio>,
    pub resolution: Option<String>,
    pub source_image: Option<ImageInput>,
}

impl VideoInputs {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            aspect_ratio: None,
            resolution: None,
            source_image: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInputs {
    pub user_id: String,
    pub product_image: Option<ImageInput>,
    /// Absent for product-only sessions
    pub model_image: Option<ImageInput>,
    pub reference_images: Vec<ImageInput>,
    pub controls: CreativeControls,
    pub prompt: Option<String>,
    pub negative_prompt: Option<String>,
    pub number_of_images: u8,
    pub video: Option<VideoInputs>,
}

impl SessionInputs {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            product_image: None,
            model_image: None,
            reference_images: Vec::new(),
            controls: CreativeControls::default(),
            prompt: None,
            negative_prompt: None,
            number_of_images: 1,
            video: None,
        }
    }

    pub fn with_product_image(mut self, image: ImageInput) -> Self {
        self.product_image = Some(image);
        self
    }

    pub fn with_model_image(mut self, image: ImageInput) -> Self {
        self.model_image = Some(image);
        self
    }

    pub fn with_number_of_images(mut self, count: u8) -> Self {
        self.number_of_images = count;
        self
    }

    pub fn with_video(mut self, video: VideoInputs) -> Self {
        self.video = Some(video);
        self
    }

    pub fn is_product_only(&self) -> bool {
        self.model_image.is_none()
    }

    fn require_user(&self) -> Result<(), StudioError> {
        if self.user_id.trim().is_empty() {
            return Err(StudioError::Validation("A signed-in user is required".to_string()));
        }
        Ok(())
    }

    fn require_product_image(&self) -> Result<(), StudioError> {
        if self.product_image.is_none() {
            return Err(StudioError::Validation(
                "A product image is required".to_string(),
            ));
        }
        Ok(())
    }

    pub fn validate_single(&self) -> Result<(), StudioError> {
        self.require_user()?;
        self.require_product_image()?;
        if self.number_of_images == 0 || self.number_of_images > MAX_IMAGES_PER_REQUEST {
            return Err(StudioError::Validation(format!(
                "number_of_images must be between 1 and {} (got {})",
                MAX_IMAGES_PER_REQUEST, self.number_of_images
            )));
        }
        Ok(())
    }

    pub fn validate_pack(&self) -> Result<(), StudioError> {
        self.require_user()?;
        self.require_product_image()
    }

    pub fn validate_video(&self) -> Result<&VideoInputs, StudioError> {
        self.require_user()?;
        let video = self
            .video
            .as_ref()
            .ok_or_else(|| StudioError::Validation("Video settings are required".to_string()))?;
        if video.prompt.trim().is_empty() {
            return Err(StudioError::Validation(
                "A video prompt is required".to_string(),
            ));
        }
        if video.resolution.as_deref().is_some_and(|r| r.trim().is_empty()) {
            return Err(StudioError::Validation(
                "A video resolution is required".to_string(),
            ));
        }
        Ok(video)
    }
}
