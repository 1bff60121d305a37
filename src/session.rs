//! Generation sessions: the state one generate intent owns from submission
//! to terminal status.
//!
//! The orchestrator is the single writer. Readers hold a [`SessionHandle`]
//! and observe immutable [`SessionSnapshot`]s through a watch channel.

use crate::backend::Artifact;
use crate::cancel::CancelToken;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

static SESSION_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Allocate a new session id (`gen-<millis>-<counter>`).
pub fn new_session_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let seq = SESSION_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("gen-{}-{}", millis, seq)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    Single,
    Pack,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Running,
    Cancelled,
    Errored,
    Done,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Running => "running",
            SessionStatus::Cancelled => "cancelled",
            SessionStatus::Errored => "errored",
            SessionStatus::Done => "done",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionStatus::Cancelled | SessionStatus::Errored | SessionStatus::Done
        )
    }
}

/// Read-only view of a session at one point in time
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub mode: SessionMode,
    pub status: SessionStatus,
    pub result_slots: Vec<Option<Artifact>>,
    pub progress_message: String,
    pub error: Option<String>,
}

impl SessionSnapshot {
    pub fn filled_count(&self) -> usize {
        self.result_slots.iter().filter(|slot| slot.is_some()).count()
    }
}

/// Writer side of a session. Owned by the orchestrator task.
pub(crate) struct GenerationSession {
    state: SessionSnapshot,
    sized: bool,
    publisher: watch::Sender<SessionSnapshot>,
    token: CancelToken,
}

impl GenerationSession {
    pub(crate) fn new(mode: SessionMode, token: CancelToken) -> (Self, SessionHandle) {
        let state = SessionSnapshot {
            session_id: new_session_id(),
            mode,
            status: SessionStatus::Idle,
            result_slots: Vec::new(),
            progress_message: String::new(),
            error: None,
        };
        let (publisher, receiver) = watch::channel(state.clone());
        let handle = SessionHandle {
            session_id: state.session_id.clone(),
            receiver,
            token: token.clone(),
        };
        (
            Self {
                state,
                sized: false,
                publisher,
                token,
            },
            handle,
        )
    }

    pub(crate) fn id(&self) -> &str {
        &self.state.session_id
    }

    pub(crate) fn token(&self) -> &CancelToken {
        &self.token
    }

    pub(crate) fn status(&self) -> SessionStatus {
        self.state.status
    }

    pub(crate) fn filled_count(&self) -> usize {
        self.state.filled_count()
    }

    pub(crate) fn filled_slots(&self) -> impl Iterator<Item = (usize, &Artifact)> {
        self.state
            .result_slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|artifact| (index, artifact)))
    }

    /// Pre-size the result slots and mark the session running. The slot count
    /// is fixed for the rest of the session.
    pub(crate) fn start(&mut self, slot_count: usize, message: impl Into<String>) {
        if !self.sized {
            self.state.result_slots = vec![None; slot_count];
            self.sized = true;
        }
        self.state.status = SessionStatus::Running;
        self.state.progress_message = message.into();
        self.publish();
    }

    /// Fill slot `index`. Out-of-range writes are refused.
    pub(crate) fn fill(&mut self, index: usize, artifact: Artifact) -> bool {
        match self.state.result_slots.get_mut(index) {
            Some(slot) => {
                *slot = Some(artifact);
                self.publish();
                true
            }
            None => false,
        }
    }

    pub(crate) fn set_progress(&mut self, message: impl Into<String>) {
        self.state.progress_message = message.into();
        self.publish();
    }

    pub(crate) fn finish(&mut self, status: SessionStatus, message: impl Into<String>) {
        self.state.status = status;
        self.state.progress_message = message.into();
        self.publish();
    }

    pub(crate) fn fail(&mut self, error: impl Into<String>) {
        let error = error.into();
        self.state.status = SessionStatus::Errored;
        self.state.progress_message = error.clone();
        self.state.error = Some(error);
        self.publish();
    }

    fn publish(&self) {
        // No receivers left just means nobody is watching.
        let _ = self.publisher.send(self.state.clone());
    }
}

/// Reader side of a session, returned by `generate`
#[derive(Clone)]
pub struct SessionHandle {
    session_id: String,
    receiver: watch::Receiver<SessionSnapshot>,
    token: CancelToken,
}

impl SessionHandle {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.receiver.borrow().clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.receiver.borrow().status
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.receiver.clone()
    }

    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Request cooperative cancellation.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Wait until the session reaches a terminal status.
    pub async fn wait(&self) -> SessionSnapshot {
        let mut receiver = self.receiver.clone();
        if let Ok(snapshot) = receiver
            .wait_for(|snapshot| snapshot.status.is_terminal())
            .await
        {
            return snapshot.clone();
        }
        // Writer dropped: the last published value is final.
        let last = receiver.borrow().clone();
        last
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("session_id", &self.session_id)
            .field("status", &self.status())
            .finish()
    }
}

/// Shared slot for the currently active session's token
#[derive(Debug, Default, Clone)]
pub(crate) struct ActiveSession {
    current: Arc<parking_lot::Mutex<Option<CancelToken>>>,
}

impl ActiveSession {
    /// Cancel whatever session is active and install `next` in its place.
    pub(crate) fn replace(&self, next: CancelToken) -> bool {
        let previous = self.current.lock().replace(next);
        match previous {
            Some(token) if !token.is_cancelled() => {
                token.cancel();
                true
            }
            _ => false,
        }
    }

    pub(crate) fn cancel(&self) {
        if let Some(token) = self.current.lock().as_ref() {
            token.cancel();
        }
    }
}
