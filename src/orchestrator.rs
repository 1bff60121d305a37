//! Job Orchestrator
//!
//! Turns one generate intent into backend calls. Inputs are validated and the
//! job list resolved synchronously; the session then runs on its own tokio
//! task, draining jobs strictly one at a time through the retry controller
//! and publishing snapshots through the returned [`SessionHandle`].

use crate::backend::{
    Artifact, ArtifactStore, ControlsPromptBuilder, GenerationBackend, ImageRequest,
    PromptBuilder, VideoSubmission, WorkflowKind,
};
use crate::cancel::CancelToken;
use crate::config::{PlanConfig, StudioConfig};
use crate::error::{ErrorClass, StudioError};
use crate::governor::RequestGovernor;
use crate::inputs::SessionInputs;
use crate::pack::{self, AspectRatio, Catalog, ExpandOptions, PackKind, ShotOverrides};
use crate::persistence::{PersistRequest, PersistenceSidecar};
use crate::retry::{RetryController, RetryPolicy};
use crate::session::{ActiveSession, GenerationSession, SessionHandle, SessionMode, SessionStatus};
use crate::video::{VideoPoller, DEFAULT_POLL_INTERVAL};
use futures::StreamExt;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, info_span, warn, Instrument};

/// Which studio workflow a generate intent runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationMode {
    Single,
    Pack(PackKind),
    Video,
}

impl GenerationMode {
    fn session_mode(self) -> SessionMode {
        match self {
            GenerationMode::Single => SessionMode::Single,
            GenerationMode::Pack(_) => SessionMode::Pack,
            GenerationMode::Video => SessionMode::Video,
        }
    }

    fn workflow(self) -> WorkflowKind {
        match self {
            GenerationMode::Single => WorkflowKind::Single,
            GenerationMode::Pack(_) => WorkflowKind::Pack,
            GenerationMode::Video => WorkflowKind::Video,
        }
    }
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationMode::Single => f.write_str("single"),
            GenerationMode::Pack(kind) => write!(f, "pack:{}", kind),
            GenerationMode::Video => f.write_str("video"),
        }
    }
}

/// One generate intent
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub mode: GenerationMode,
    pub inputs: SessionInputs,
}

impl GenerateRequest {
    pub fn new(mode: GenerationMode, inputs: SessionInputs) -> Self {
        Self { mode, inputs }
    }
}

/// Session events for the caller. Every method defaults to a no-op.
pub trait GenerationObserver: Send + Sync {
    /// A result slot was filled.
    fn on_slot_filled(&self, _index: usize, _artifact: &Artifact) {}

    /// The session finished with at least one artifact. Not called for
    /// cancelled or errored sessions.
    fn on_complete(&self, _succeeded: usize) {}

    /// The backend rejected the credential.
    fn on_reauth_required(&self, _message: &str) {}
}

/// Observer that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl GenerationObserver for NoopObserver {}

/// An image job as the runner sees it: a contiguous run of result slots
#[derive(Debug, Clone)]
struct ImageJob {
    first_slot: usize,
    count: usize,
    label: String,
    overrides: ShotOverrides,
    aspect_ratio: AspectRatio,
}

enum Work {
    Images { jobs: Vec<ImageJob>, slot_count: usize },
    Video(VideoSubmission),
}

pub struct JobOrchestrator {
    backend: Arc<dyn GenerationBackend>,
    prompt_builder: Arc<dyn PromptBuilder>,
    catalog: Arc<Catalog>,
    governor: Arc<RequestGovernor>,
    retry: RetryController,
    poll_interval: Duration,
    video_defaults: (AspectRatio, String),
    plan: PlanConfig,
    sidecar: Option<PersistenceSidecar>,
    active: ActiveSession,
}

impl JobOrchestrator {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self {
            backend,
            prompt_builder: Arc::new(ControlsPromptBuilder),
            catalog: Arc::new(Catalog::builtin()),
            governor: Arc::new(RequestGovernor::new()),
            retry: RetryController::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            video_defaults: (AspectRatio::Widescreen, "720p".to_string()),
            plan: PlanConfig::default(),
            sidecar: None,
            active: ActiveSession::default(),
        }
    }

    /// Build an orchestrator from loaded configuration.
    ///
    /// Spawns the persistence sidecar when `store` is given and persistence is
    /// enabled, so this must run inside a tokio runtime.
    pub fn from_config(
        backend: Arc<dyn GenerationBackend>,
        store: Option<Arc<dyn ArtifactStore>>,
        config: &StudioConfig,
    ) -> Result<Self, StudioError> {
        let catalog = match &config.catalog_path {
            Some(path) => Catalog::load(path)?,
            None => Catalog::builtin(),
        };

        let mut orchestrator = Self::new(backend)
            .with_catalog(catalog)
            .with_retry_policy(RetryPolicy::from(&config.retry))
            .with_poll_interval(config.video.poll_interval())
            .with_plan(config.plan.clone());
        orchestrator.video_defaults = (
            config.video.default_aspect_ratio,
            config.video.default_resolution.clone(),
        );

        if let Some(store) = store.filter(|_| config.persistence.enabled) {
            let (sidecar, _worker) =
                PersistenceSidecar::spawn(store, config.persistence.queue_capacity);
            orchestrator = orchestrator.with_sidecar(sidecar);
        }
        Ok(orchestrator)
    }

    pub fn with_prompt_builder(mut self, prompt_builder: Arc<dyn PromptBuilder>) -> Self {
        self.prompt_builder = prompt_builder;
        self
    }

    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = Arc::new(catalog);
        self
    }

    pub fn with_governor(mut self, governor: Arc<RequestGovernor>) -> Self {
        self.governor = governor;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = RetryController::new(policy);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_plan(mut self, plan: PlanConfig) -> Self {
        self.plan = plan;
        self
    }

    pub fn with_sidecar(mut self, sidecar: PersistenceSidecar) -> Self {
        self.sidecar = Some(sidecar);
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn sidecar(&self) -> Option<&PersistenceSidecar> {
        self.sidecar.as_ref()
    }

    /// Cancel the active session, if any.
    pub fn cancel(&self) {
        self.active.cancel();
    }

    /// Start a generation session.
    ///
    /// Invalid inputs fail synchronously and leave any running session alone.
    /// Otherwise the running session is cancelled, the rate governor is
    /// consulted, and the new session is spawned. A governor rejection still
    /// returns a handle, already `errored`.
    pub fn generate(
        &self,
        request: GenerateRequest,
        observer: Arc<dyn GenerationObserver>,
    ) -> Result<SessionHandle, StudioError> {
        let GenerateRequest { mode, inputs } = request;
        let work = self.plan_work(mode, &inputs)?;

        let token = CancelToken::new();
        if self.active.replace(token.clone()) {
            info!("Cancelled previous generation session");
        }

        let (mut session, handle) = GenerationSession::new(mode.session_mode(), token);

        if !self.governor.admit(self.plan.rate_limit()) {
            let err = StudioError::RateLimited {
                limit: self.plan.requests_per_minute,
            };
            warn!(session_id = %session.id(), "{}", err);
            session.fail(err.to_string());
            return Ok(handle);
        }

        let span = info_span!("generation", session_id = %session.id(), mode = %mode);
        let runner = SessionRunner {
            backend: Arc::clone(&self.backend),
            prompt_builder: Arc::clone(&self.prompt_builder),
            retry: self.retry,
            poll_interval: self.poll_interval,
            sidecar: self.sidecar.clone(),
            observer,
            workflow: mode.workflow(),
            inputs,
        };
        tokio::spawn(runner.run(session, work).instrument(span));
        Ok(handle)
    }

    fn plan_work(&self, mode: GenerationMode, inputs: &SessionInputs) -> Result<Work, StudioError> {
        match mode {
            GenerationMode::Single => {
                inputs.validate_single()?;
                let count = usize::from(inputs.number_of_images);
                Ok(Work::Images {
                    jobs: vec![ImageJob {
                        first_slot: 0,
                        count,
                        label: inputs
                            .prompt
                            .clone()
                            .filter(|p| !p.trim().is_empty())
                            .unwrap_or_else(|| "Single image".to_string()),
                        overrides: ShotOverrides::default(),
                        aspect_ratio: inputs.controls.aspect_ratio,
                    }],
                    slot_count: count,
                })
            }
            GenerationMode::Pack(kind) => {
                inputs.validate_pack()?;
                let options = ExpandOptions {
                    aspect_ratio: inputs.controls.aspect_ratio,
                    product_only: inputs.is_product_only(),
                };
                let shots = pack::expand(kind, &self.catalog, &options)?;
                if shots.is_empty() {
                    return Err(StudioError::Validation(format!(
                        "The {} pack has no shots in this catalog",
                        kind
                    )));
                }
                let slot_count = shots.len();
                let jobs = shots
                    .into_iter()
                    .map(|shot| ImageJob {
                        first_slot: shot.index,
                        count: 1,
                        label: shot.label,
                        overrides: shot.overrides,
                        aspect_ratio: shot.aspect_ratio,
                    })
                    .collect();
                Ok(Work::Images { jobs, slot_count })
            }
            GenerationMode::Video => {
                let video = inputs.validate_video()?;
                let (default_ratio, default_resolution) = &self.video_defaults;
                Ok(Work::Video(VideoSubmission {
                    prompt: video.prompt.trim().to_string(),
                    aspect_ratio: video.aspect_ratio.unwrap_or(*default_ratio),
                    resolution: video
                        .resolution
                        .clone()
                        .unwrap_or_else(|| default_resolution.clone()),
                    source_image: video.source_image.clone(),
                }))
            }
        }
    }
}

/// Everything one spawned session needs, detached from the orchestrator
struct SessionRunner {
    backend: Arc<dyn GenerationBackend>,
    prompt_builder: Arc<dyn PromptBuilder>,
    retry: RetryController,
    poll_interval: Duration,
    sidecar: Option<PersistenceSidecar>,
    observer: Arc<dyn GenerationObserver>,
    workflow: WorkflowKind,
    inputs: SessionInputs,
}

impl SessionRunner {
    async fn run(self, mut session: GenerationSession, work: Work) {
        match work {
            Work::Images { jobs, slot_count } => {
                self.run_images(&mut session, jobs, slot_count).await
            }
            Work::Video(submission) => self.run_video(&mut session, submission).await,
        }
        debug!(status = session.status().as_str(), "Session task finished");
    }

    async fn run_images(
        &self,
        session: &mut GenerationSession,
        jobs: Vec<ImageJob>,
        slot_count: usize,
    ) {
        let total = jobs.len();
        session.start(slot_count, format!("Generating 1/{}...", total));
        info!(jobs = total, slots = slot_count, "Generation session started");

        let mut descriptions = vec![String::new(); slot_count];
        let mut last_error: Option<StudioError> = None;

        for (position, job) in jobs.iter().enumerate() {
            if session.token().is_cancelled() {
                return self.cancelled(session);
            }
            session.set_progress(format!("Generating {}/{}...", position + 1, total));

            match self.run_job(session, job).await {
                Ok(filled) => {
                    for slot in job.first_slot..job.first_slot + job.count {
                        if let Some(description) = descriptions.get_mut(slot) {
                            *description = job.label.clone();
                        }
                    }
                    debug!(job_index = position, filled, "Job finished");
                }
                Err(e) => match e.class() {
                    ErrorClass::Cancellation => return self.cancelled(session),
                    ErrorClass::Transient | ErrorClass::JobRejected => {
                        warn!(
                            job_index = position,
                            label = %job.label,
                            error = %e,
                            "Job failed, continuing with the rest"
                        );
                        last_error = Some(e);
                    }
                    _ => return self.errored(session, e),
                },
            }
        }

        if session.token().is_cancelled() {
            return self.cancelled(session);
        }

        let succeeded = session.filled_count();
        if succeeded == 0 {
            let err = last_error.unwrap_or_else(|| {
                StudioError::Provider("The backend returned no images".to_string())
            });
            return self.errored(session, err);
        }

        let mut artifacts = Vec::with_capacity(succeeded);
        for (index, artifact) in session.filled_slots() {
            let description = descriptions.get(index).cloned().unwrap_or_default();
            artifacts.push((artifact.clone(), description));
        }
        self.persist(artifacts);
        self.observer.on_complete(succeeded);
        session.finish(
            SessionStatus::Done,
            format!("Done: {}/{} generated", succeeded, slot_count),
        );
        info!(succeeded, slots = slot_count, "Generation session done");
    }

    /// Run one image job. Returns how many slots it filled.
    ///
    /// An error arriving as the first stream item counts as a failed attempt,
    /// so transient failures reported through the stream are retried too.
    async fn run_job(
        &self,
        session: &mut GenerationSession,
        job: &ImageJob,
    ) -> Result<usize, StudioError> {
        session.token().ensure_active()?;
        let payload = self.prompt_builder.build(&self.inputs, &job.overrides)?;
        let request = ImageRequest {
            payload,
            aspect_ratio: job.aspect_ratio,
            count: job.count,
            negative_prompt: self.inputs.negative_prompt.clone(),
        };

        let token = session.token().clone();
        let backend = &self.backend;
        let max_attempts = self.retry.policy().max_retries.max(1);
        let (first, rest) = self
            .retry
            .run_cancellable(
                &token,
                || {
                    let request = request.clone();
                    let token = token.clone();
                    let backend = Arc::clone(backend);
                    async move {
                        token.ensure_active()?;
                        let mut stream = backend.generate_image(request).await?;
                        match stream.next().await {
                            Some(Err(e)) => Err(e),
                            first => Ok((first, stream)),
                        }
                    }
                },
                |attempt, delay| {
                    session.set_progress(format!(
                        "Service busy, retrying in {}s (attempt {}/{})...",
                        delay.as_secs(),
                        attempt,
                        max_attempts
                    ));
                },
            )
            .await?;
        session.token().ensure_active()?;

        let mut stream = futures::stream::iter(first).chain(rest);
        let mut filled = 0usize;
        while let Some(item) = stream.next().await {
            session.token().ensure_active()?;
            match item {
                Ok((offset, artifact)) => {
                    if offset >= job.count {
                        warn!(
                            offset,
                            count = job.count,
                            "Ignoring image outside the requested range"
                        );
                        continue;
                    }
                    let slot = job.first_slot + offset;
                    if session.fill(slot, artifact.clone()) {
                        filled += 1;
                        debug!(slot, content_id = %artifact.content_id(), "Slot filled");
                        self.observer.on_slot_filled(slot, &artifact);
                    }
                }
                Err(e) => match e.class() {
                    ErrorClass::Authentication | ErrorClass::Fatal | ErrorClass::Cancellation => {
                        return Err(e)
                    }
                    _ if filled == 0 => return Err(e),
                    _ => {
                        warn!(filled, error = %e, "Image stream ended early");
                        break;
                    }
                },
            }
        }

        if filled == 0 && job.count > 0 {
            return Err(StudioError::NoImages(job.label.clone()));
        }
        Ok(filled)
    }

    async fn run_video(&self, session: &mut GenerationSession, submission: VideoSubmission) {
        session.start(1, "Submitting video job...");
        info!("Video session started");

        let token = session.token().clone();
        let poller = VideoPoller::new(Arc::clone(&self.backend), self.retry)
            .with_poll_interval(self.poll_interval);
        let result = poller
            .generate_video(&submission, &token, |_, message| session.set_progress(message))
            .await;

        match result {
            Ok(handle) => {
                if token.is_cancelled() {
                    return self.cancelled(session);
                }
                let artifact = Artifact::from(handle);
                if session.fill(0, artifact.clone()) {
                    self.observer.on_slot_filled(0, &artifact);
                }
                self.persist(vec![(artifact, submission.prompt.clone())]);
                self.observer.on_complete(1);
                session.finish(SessionStatus::Done, "Done: 1/1 generated");
            }
            Err(StudioError::Cancelled) => self.cancelled(session),
            Err(e) => self.errored(session, e),
        }
    }

    fn persist(&self, artifacts: Vec<(Artifact, String)>) {
        let Some(sidecar) = &self.sidecar else {
            return;
        };
        for (artifact, description) in artifacts {
            sidecar.submit(PersistRequest {
                user_id: self.inputs.user_id.clone(),
                workflow: self.workflow,
                artifact,
                description,
            });
        }
    }

    fn cancelled(&self, session: &mut GenerationSession) {
        info!(filled = session.filled_count(), "Generation session cancelled");
        session.finish(SessionStatus::Cancelled, "Cancelled");
    }

    fn errored(&self, session: &mut GenerationSession, err: StudioError) {
        let message = err.to_string();
        if err.class() == ErrorClass::Authentication {
            warn!(error = %message, "Credential rejected, re-authentication required");
            self.observer.on_reauth_required(&message);
        } else {
            warn!(error = %message, "Generation session failed");
        }
        session.fail(message);
    }
}
