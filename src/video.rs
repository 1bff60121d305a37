//! Video Operation Poller
//!
//! Drives one long-running video job: a retry-wrapped submit, then a fixed
//! interval poll loop until the operation is terminal or the token is
//! cancelled. Finished media is fetched into a [`LocalHandle`] before the
//! poller reports success.

use crate::backend::{GenerationBackend, LocalHandle, VideoOperation, VideoSubmission};
use crate::cancel::CancelToken;
use crate::config::VideoConfig;
use crate::error::StudioError;
use crate::retry::RetryController;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Fixed delay between status polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10_000);

/// Where the poller's state machine currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoPhase {
    Submitting,
    Polling { checks: u32 },
    Done,
    Failed,
    Cancelled,
}

impl fmt::Display for VideoPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoPhase::Submitting => f.write_str("submitting"),
            VideoPhase::Polling { checks } => write!(f, "polling ({} checks)", checks),
            VideoPhase::Done => f.write_str("done"),
            VideoPhase::Failed => f.write_str("failed"),
            VideoPhase::Cancelled => f.write_str("cancelled"),
        }
    }
}

pub struct VideoPoller {
    backend: Arc<dyn GenerationBackend>,
    retry: RetryController,
    poll_interval: Duration,
}

impl VideoPoller {
    pub fn new(backend: Arc<dyn GenerationBackend>, retry: RetryController) -> Self {
        Self {
            backend,
            retry,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn from_config(
        backend: Arc<dyn GenerationBackend>,
        retry: RetryController,
        config: &VideoConfig,
    ) -> Self {
        Self::new(backend, retry).with_poll_interval(config.poll_interval())
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Submit `submission` and poll it to completion.
    ///
    /// `on_progress(phase, message)` reports every transition along with a
    /// human-readable progress line. Returns `Err(StudioError::Cancelled)`
    /// when the token is observed cancelled at any suspension point.
    pub async fn generate_video<P>(
        &self,
        submission: &VideoSubmission,
        token: &CancelToken,
        mut on_progress: P,
    ) -> Result<LocalHandle, StudioError>
    where
        P: FnMut(VideoPhase, &str),
    {
        let result = self.drive(submission, token, &mut on_progress).await;
        match &result {
            Ok(handle) => {
                info!(path = %handle.path.display(), "Video ready");
                on_progress(VideoPhase::Done, "Video ready");
            }
            Err(StudioError::Cancelled) => {
                debug!("Video generation cancelled");
                on_progress(VideoPhase::Cancelled, "Cancelled");
            }
            Err(e) => {
                warn!(error = %e, "Video generation failed");
                on_progress(VideoPhase::Failed, &e.to_string());
            }
        }
        result
    }

    async fn drive<P>(
        &self,
        submission: &VideoSubmission,
        token: &CancelToken,
        on_progress: &mut P,
    ) -> Result<LocalHandle, StudioError>
    where
        P: FnMut(VideoPhase, &str),
    {
        token.ensure_active()?;
        on_progress(VideoPhase::Submitting, "Submitting video job...");

        let max_attempts = self.retry.policy().max_retries.max(1);
        let mut operation = self
            .retry
            .run_cancellable(
                token,
                move || async move {
                    token.ensure_active()?;
                    self.backend.submit_video(submission).await
                },
                |attempt, delay| {
                    let message = format!(
                        "Service busy, retrying in {}s (attempt {}/{})...",
                        delay.as_secs(),
                        attempt,
                        max_attempts
                    );
                    on_progress(VideoPhase::Submitting, &message);
                },
            )
            .await?;
        token.ensure_active()?;

        info!(operation_id = %operation.id, "Video job submitted");
        on_progress(VideoPhase::Polling { checks: 0 }, "Rendering video...");

        let mut checks = 0u32;
        while !operation.done {
            token.ensure_active()?;
            tokio::select! {
                biased;
                _ = token.cancelled() => return Err(StudioError::Cancelled),
                _ = sleep(self.poll_interval) => {}
            }
            token.ensure_active()?;

            operation = self.backend.poll_video(&operation).await?;
            token.ensure_active()?;
            checks += 1;

            debug!(
                operation_id = %operation.id,
                checks,
                done = operation.done,
                "Polled video operation"
            );
            if !operation.done {
                let message = format!("Video still rendering ({} checks)...", checks);
                on_progress(VideoPhase::Polling { checks }, &message);
            }
        }

        let uri = finished_uri(operation)?;
        let handle = self.backend.fetch_video_media(&uri).await?;
        token.ensure_active()?;
        Ok(handle)
    }
}

/// Extract the result URI from a terminal operation.
fn finished_uri(operation: VideoOperation) -> Result<String, StudioError> {
    if let Some(error) = operation.error {
        return Err(StudioError::VideoFailed(error));
    }
    operation.result_uri.ok_or_else(|| {
        StudioError::VideoFailed(format!(
            "operation {} finished without a result",
            operation.id
        ))
    })
}
