//! Persistence Sidecar
//!
//! Fire-and-forget forwarding of produced artifacts to the external
//! [`ArtifactStore`]. The orchestrator enqueues and moves on; a background
//! worker drains the queue and logs failures without surfacing them.

use crate::backend::{Artifact, ArtifactStore, WorkflowKind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// One artifact to hand to the store
#[derive(Debug, Clone)]
pub struct PersistRequest {
    pub user_id: String,
    pub workflow: WorkflowKind,
    pub artifact: Artifact,
    pub description: String,
}

enum SidecarMessage {
    Save(PersistRequest),
    Flush(oneshot::Sender<()>),
}

/// Counters for the sidecar
#[derive(Debug, Default)]
pub struct SidecarStats {
    saved: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

impl SidecarStats {
    pub fn saved(&self) -> u64 {
        self.saved.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Handle to the background persistence worker
#[derive(Clone)]
pub struct PersistenceSidecar {
    sender: mpsc::Sender<SidecarMessage>,
    stats: Arc<SidecarStats>,
}

impl PersistenceSidecar {
    /// Start the worker on the current tokio runtime.
    pub fn spawn(store: Arc<dyn ArtifactStore>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let stats = Arc::new(SidecarStats::default());
        let worker = tokio::spawn(run_worker(store, receiver, Arc::clone(&stats)));
        (Self { sender, stats }, worker)
    }

    /// Enqueue a save without waiting. Returns false if the request was dropped.
    pub fn submit(&self, request: PersistRequest) -> bool {
        let content_id = request.artifact.content_id();
        match self.sender.try_send(SidecarMessage::Save(request)) {
            Ok(()) => {
                debug!(content_id = %content_id, "Queued artifact for persistence");
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(content_id = %content_id, "Persistence queue full, dropping artifact");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(content_id = %content_id, "Persistence worker stopped, dropping artifact");
                false
            }
        }
    }

    /// Wait until everything queued before this call has been processed.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.sender.send(SidecarMessage::Flush(done)).await.is_ok() {
            let _ = wait.await;
        }
    }

    pub fn stats(&self) -> &SidecarStats {
        &self.stats
    }
}

async fn run_worker(
    store: Arc<dyn ArtifactStore>,
    mut receiver: mpsc::Receiver<SidecarMessage>,
    stats: Arc<SidecarStats>,
) {
    info!("Persistence sidecar started");
    while let Some(message) = receiver.recv().await {
        match message {
            SidecarMessage::Save(request) => {
                let content_id = request.artifact.content_id();
                match store
                    .save(
                        &request.user_id,
                        request.workflow,
                        &request.artifact,
                        &request.description,
                    )
                    .await
                {
                    Ok(()) => {
                        stats.saved.fetch_add(1, Ordering::Relaxed);
                        debug!(
                            content_id = %content_id,
                            workflow = %request.workflow,
                            "Artifact persisted"
                        );
                    }
                    Err(e) => {
                        stats.failed.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            content_id = %content_id,
                            workflow = %request.workflow,
                            error = %e,
                            "Failed to persist artifact"
                        );
                    }
                }
            }
            SidecarMessage::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    info!(
        saved = stats.saved(),
        failed = stats.failed(),
        "Persistence sidecar stopped"
    );
}
