//! Shotforge: Generation Orchestration Core
//!
//! Turns one studio intent (a single image, a shot pack, or a video) into
//! sequenced calls against an external generative backend, with retry and
//! backoff, per-plan rate limiting, cooperative cancellation, progressive
//! result slots and best-effort persistence of what was produced.

pub mod backend;
pub mod cancel;
pub mod cli;
pub mod config;
pub mod error;
pub mod governor;
pub mod inputs;
pub mod logging;
pub mod orchestrator;
pub mod pack;
pub mod persistence;
pub mod retry;
pub mod session;
pub mod video;

pub use backend::{
    Artifact, ArtifactStore, GenerationBackend, ImageStream, LocalHandle, PromptBuilder,
    VideoOperation, VideoSubmission,
};
pub use cancel::CancelToken;
pub use error::{ErrorClass, StudioError};
pub use orchestrator::{GenerateRequest, GenerationMode, GenerationObserver, JobOrchestrator};
pub use session::{SessionHandle, SessionSnapshot, SessionStatus};
