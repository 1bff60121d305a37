//! Scripted collaborators shared by the integration tests

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use shotforge::backend::{
    Artifact, ArtifactStore, GenerationBackend, ImageRequest, ImageStream, LocalHandle,
    VideoOperation, VideoSubmission, WorkflowKind,
};
use shotforge::cancel::CancelToken;
use shotforge::inputs::{ImageInput, SessionInputs};
use shotforge::orchestrator::GenerationObserver;
use shotforge::StudioError;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub type ImageItems = Vec<Result<(usize, Artifact), StudioError>>;
type ImageRule = dyn Fn(usize, &ImageRequest) -> Result<ImageItems, StudioError> + Send + Sync;

pub fn png(seed: u8) -> Artifact {
    Artifact::image("image/png", vec![seed, seed.wrapping_add(1), seed.wrapping_add(2)])
}

pub fn product_inputs() -> SessionInputs {
    SessionInputs::new("user-1")
        .with_product_image(ImageInput::new("image/jpeg", vec![0xffu8, 0xd8, 0xff]))
        .with_model_image(ImageInput::new("image/jpeg", vec![0xffu8, 0xd8, 0x01]))
}

/// Backend whose answers are decided by the test.
///
/// Image calls are numbered from 0 in the order the orchestrator makes them,
/// retries included.
pub struct ScriptedBackend {
    image_rule: Box<ImageRule>,
    image_delay: Option<Duration>,
    image_calls: AtomicUsize,
    image_requests: Mutex<Vec<ImageRequest>>,
    submit_replies: Mutex<VecDeque<Result<VideoOperation, StudioError>>>,
    poll_replies: Mutex<VecDeque<Result<VideoOperation, StudioError>>>,
    submit_calls: AtomicUsize,
    poll_times: Mutex<Vec<Instant>>,
    fetched: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    /// Every image call yields one image per requested slot.
    pub fn images_ok() -> Self {
        Self::with_image_rule(|call, request| {
            Ok((0..request.count)
                .map(|offset| Ok((offset, png((call * 8 + offset) as u8))))
                .collect())
        })
    }

    pub fn with_image_rule<F>(rule: F) -> Self
    where
        F: Fn(usize, &ImageRequest) -> Result<ImageItems, StudioError> + Send + Sync + 'static,
    {
        Self {
            image_rule: Box::new(rule),
            image_delay: None,
            image_calls: AtomicUsize::new(0),
            image_requests: Mutex::new(Vec::new()),
            submit_replies: Mutex::new(VecDeque::new()),
            poll_replies: Mutex::new(VecDeque::new()),
            submit_calls: AtomicUsize::new(0),
            poll_times: Mutex::new(Vec::new()),
            fetched: Mutex::new(Vec::new()),
        }
    }

    /// Video backend: `submit` answers in order, then `polls` in order.
    pub fn video(
        submits: Vec<Result<VideoOperation, StudioError>>,
        polls: Vec<Result<VideoOperation, StudioError>>,
    ) -> Self {
        let backend = Self::images_ok();
        *backend.submit_replies.lock() = submits.into();
        *backend.poll_replies.lock() = polls.into();
        backend
    }

    /// Make every image call take `delay` before answering.
    pub fn with_image_delay(mut self, delay: Duration) -> Self {
        self.image_delay = Some(delay);
        self
    }

    pub fn image_calls(&self) -> usize {
        self.image_calls.load(Ordering::SeqCst)
    }

    pub fn image_requests(&self) -> Vec<ImageRequest> {
        self.image_requests.lock().clone()
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn poll_times(&self) -> Vec<Instant> {
        self.poll_times.lock().clone()
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().clone()
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn generate_image(&self, request: ImageRequest) -> Result<ImageStream, StudioError> {
        let call = self.image_calls.fetch_add(1, Ordering::SeqCst);
        self.image_requests.lock().push(request.clone());
        if let Some(delay) = self.image_delay {
            tokio::time::sleep(delay).await;
        }
        let items = (self.image_rule)(call, &request)?;
        Ok(futures::stream::iter(items).boxed())
    }

    async fn submit_video(&self, _submission: &VideoSubmission) -> Result<VideoOperation, StudioError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.submit_replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(StudioError::Provider("no scripted submit reply".into())))
    }

    async fn poll_video(&self, _operation: &VideoOperation) -> Result<VideoOperation, StudioError> {
        self.poll_times.lock().push(Instant::now());
        self.poll_replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(StudioError::Provider("no scripted poll reply".into())))
    }

    async fn fetch_video_media(&self, uri: &str) -> Result<LocalHandle, StudioError> {
        self.fetched.lock().push(uri.to_string());
        Ok(LocalHandle {
            path: PathBuf::from("/tmp/shotforge").join(format!("video-{}.mp4", self.fetched.lock().len())),
            mime_type: "video/mp4".to_string(),
        })
    }
}

/// Store that records every save and can be told to fail.
#[derive(Default)]
pub struct RecordingStore {
    saved: Mutex<Vec<(String, WorkflowKind, String)>>,
    fail: bool,
}

impl RecordingStore {
    pub fn failing() -> Self {
        Self {
            saved: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// `(user_id, workflow, description)` per save, in order.
    pub fn saved(&self) -> Vec<(String, WorkflowKind, String)> {
        self.saved.lock().clone()
    }
}

#[async_trait]
impl ArtifactStore for RecordingStore {
    async fn save(
        &self,
        user_id: &str,
        workflow: WorkflowKind,
        _artifact: &Artifact,
        description: &str,
    ) -> Result<(), StudioError> {
        if self.fail {
            return Err(StudioError::Persistence("storage offline".into()));
        }
        self.saved
            .lock()
            .push((user_id.to_string(), workflow, description.to_string()));
        Ok(())
    }
}

/// Observer that records callbacks and can cancel once a slot is filled.
#[derive(Default)]
pub struct RecordingObserver {
    filled: Mutex<Vec<usize>>,
    completed: Mutex<Vec<usize>>,
    reauth: Mutex<Vec<String>>,
    cancel_after: Mutex<Option<(usize, CancelToken)>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Cancel `token` as soon as slot `index` is reported filled.
    pub fn cancel_after(&self, index: usize, token: CancelToken) {
        *self.cancel_after.lock() = Some((index, token));
    }

    pub fn filled(&self) -> Vec<usize> {
        self.filled.lock().clone()
    }

    pub fn completed(&self) -> Vec<usize> {
        self.completed.lock().clone()
    }

    pub fn reauth(&self) -> Vec<String> {
        self.reauth.lock().clone()
    }
}

impl GenerationObserver for RecordingObserver {
    fn on_slot_filled(&self, index: usize, _artifact: &Artifact) {
        self.filled.lock().push(index);
        if let Some((target, token)) = self.cancel_after.lock().as_ref() {
            if *target == index {
                token.cancel();
            }
        }
    }

    fn on_complete(&self, succeeded: usize) {
        self.completed.lock().push(succeeded);
    }

    fn on_reauth_required(&self, message: &str) {
        self.reauth.lock().push(message.to_string());
    }
}
