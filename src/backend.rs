//! Collaborator interfaces consumed by the orchestration core.
//!
//! The generative backend, the prompt builder and the artifact store live
//! outside this crate. The core only depends on the traits here; backends
//! classify their own failures into [`StudioError`] variants before returning.

use crate::error::StudioError;
use crate::inputs::{ImageInput, SessionInputs};
use crate::pack::{AspectRatio, ShotOverrides};
use async_trait::async_trait;
use futures::channel::mpsc;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Image,
    Video,
}

/// Where an artifact's bytes live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    Inline(Arc<[u8]>),
    Local(PathBuf),
}

/// A generated image or video
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub mime_type: String,
    pub source: MediaSource,
}

impl Artifact {
    pub fn image(mime_type: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            kind: ArtifactKind::Image,
            mime_type: mime_type.into(),
            source: MediaSource::Inline(data.into()),
        }
    }

    /// Hex blake3 digest of the inline bytes, or of the local path for file-backed media.
    pub fn content_id(&self) -> String {
        let digest = match &self.source {
            MediaSource::Inline(bytes) => blake3::hash(bytes),
            MediaSource::Local(path) => blake3::hash(path.to_string_lossy().as_bytes()),
        };
        hex::encode(digest.as_bytes())
    }
}

impl From<LocalHandle> for Artifact {
    fn from(handle: LocalHandle) -> Self {
        Self {
            kind: ArtifactKind::Video,
            mime_type: handle.mime_type,
            source: MediaSource::Local(handle.path),
        }
    }
}

/// Fetched media that no longer depends on the remote URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalHandle {
    pub path: PathBuf,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptPart {
    Text(String),
    Image(ImageInput),
}

/// Backend-ready request built by a [`PromptBuilder`]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RequestPayload {
    pub parts: Vec<PromptPart>,
}

impl RequestPayload {
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                PromptPart::Text(text) => Some(text.as_str()),
                PromptPart::Image(_) => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub payload: RequestPayload,
    pub aspect_ratio: AspectRatio,
    pub count: usize,
    pub negative_prompt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoSubmission {
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
    pub resolution: String,
    pub source_image: Option<ImageInput>,
}

/// Handle to a long-running remote video job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoOperation {
    pub id: String,
    pub done: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VideoOperation {
    pub fn pending(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            done: false,
            result_uri: None,
            error: None,
        }
    }

    pub fn succeeded(id: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            done: true,
            result_uri: Some(uri.into()),
            error: None,
        }
    }

    pub fn failed(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            done: true,
            result_uri: None,
            error: Some(error.into()),
        }
    }
}

/// `(index, artifact)` pairs yielded as the backend produces images.
///
/// May end early: the stream can yield fewer items than requested.
pub type ImageStream = Pin<Box<dyn Stream<Item = Result<(usize, Artifact), StudioError>> + Send>>;

/// Sending half for backends whose SDK reports images through callbacks
#[derive(Clone)]
pub struct ImageSink {
    sender: mpsc::UnboundedSender<Result<(usize, Artifact), StudioError>>,
}

impl ImageSink {
    /// Forward one generated image. Returns false once the consumer is gone.
    pub fn emit(&self, index: usize, artifact: Artifact) -> bool {
        self.sender.unbounded_send(Ok((index, artifact))).is_ok()
    }

    pub fn fail(&self, error: StudioError) -> bool {
        self.sender.unbounded_send(Err(error)).is_ok()
    }
}

/// Bridge callback-style image delivery into an [`ImageStream`].
pub fn image_channel() -> (ImageSink, ImageStream) {
    let (sender, receiver) = mpsc::unbounded();
    let stream: ImageStream = Box::pin(receiver);
    (ImageSink { sender }, stream)
}

/// The generative backend
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Start image generation; images arrive on the returned stream.
    async fn generate_image(&self, request: ImageRequest) -> Result<ImageStream, StudioError>;

    /// Submit a video job; the returned operation is not yet done.
    async fn submit_video(
        &self,
        submission: &VideoSubmission,
    ) -> Result<VideoOperation, StudioError>;

    /// Refresh an operation's state.
    async fn poll_video(&self, operation: &VideoOperation) -> Result<VideoOperation, StudioError>;

    /// Download finished media into a local handle.
    async fn fetch_video_media(&self, uri: &str) -> Result<LocalHandle, StudioError>;
}

/// Turns session inputs plus per-shot overrides into a backend payload
pub trait PromptBuilder: Send + Sync {
    fn build(
        &self,
        inputs: &SessionInputs,
        overrides: &ShotOverrides,
    ) -> Result<RequestPayload, StudioError>;
}

/// Which studio workflow produced an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    Single,
    Pack,
    Video,
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkflowKind::Single => "single",
            WorkflowKind::Pack => "pack",
            WorkflowKind::Video => "video",
        };
        f.write_str(name)
    }
}

/// External storage for produced artifacts
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn save(
        &self,
        user_id: &str,
        workflow: WorkflowKind,
        artifact: &Artifact,
        description: &str,
    ) -> Result<(), StudioError>;
}

/// Plain prompt builder: the session prompt, then the base controls with
/// per-shot overrides applied, then the reference images.
#[derive(Debug, Clone, Copy, Default)]
pub struct ControlsPromptBuilder;

impl PromptBuilder for ControlsPromptBuilder {
    fn build(
        &self,
        inputs: &SessionInputs,
        overrides: &ShotOverrides,
    ) -> Result<RequestPayload, StudioError> {
        let controls = &inputs.controls;
        let mut lines = Vec::new();

        if let Some(prompt) = inputs.prompt.as_deref().filter(|p| !p.trim().is_empty()) {
            lines.push(prompt.trim().to_string());
        }

        let pick =
            |over: &Option<String>, base: &Option<String>| over.clone().or_else(|| base.clone());
        let fields = [
            ("Shot", pick(&overrides.shot_type, &controls.shot_type)),
            ("Expression", pick(&overrides.expression, &controls.expression)),
            ("Camera angle", pick(&overrides.camera_angle, &controls.camera_angle)),
            ("Focal length", overrides.focal_length.clone()),
            ("Lighting", controls.lighting.clone()),
            ("Background", controls.background.clone()),
            ("Style", controls.style.clone()),
        ];
        for (name, value) in fields {
            if let Some(value) = value {
                lines.push(format!("{}: {}", name, value));
            }
        }
        let ratio = overrides.aspect_ratio.unwrap_or(controls.aspect_ratio);
        lines.push(format!("Aspect ratio: {}", ratio));

        let mut parts = vec![PromptPart::Text(lines.join("\n"))];
        parts.extend(inputs.product_image.iter().cloned().map(PromptPart::Image));
        parts.extend(inputs.model_image.iter().cloned().map(PromptPart::Image));
        parts.extend(inputs.reference_images.iter().cloned().map(PromptPart::Image));

        Ok(RequestPayload { parts })
    }
}
