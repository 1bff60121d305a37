//! Cooperative cancellation for generation sessions.
//!
//! A [`CancelToken`] is cheap to clone and is handed by value into every
//! long-running operation. Work checks it before starting and after every
//! suspension point; an in-flight backend call is never interrupted.

use crate::error::StudioError;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: CancellationToken,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the token cancelled. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// Resolves once the token is cancelled. Used to cut fixed sleeps short.
    pub async fn cancelled(&self) {
        self.inner.cancelled().await
    }

    /// `Err(StudioError::Cancelled)` if the token has been cancelled.
    pub fn ensure_active(&self) -> Result<(), StudioError> {
        if self.is_cancelled() {
            Err(StudioError::Cancelled)
        } else {
            Ok(())
        }
    }
}
