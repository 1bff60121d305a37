//! Error types for the Shotforge generation orchestration core.

use thiserror::Error;

/// How the orchestrator treats an error.
///
/// Backends classify their failures into [`StudioError`] variants at the
/// boundary; everything downstream matches on this closed set instead of
/// inspecting messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Overload or temporary unavailability. Retried with backoff.
    Transient,
    /// The backend refused this one request. Not retried, but a pack keeps going.
    JobRejected,
    /// The credential was rejected. Ends the session and asks for re-authentication.
    Authentication,
    /// Required input missing or malformed. Detected before any backend call.
    Validation,
    /// A suspension-point check found the session cancelled. Never user-visible.
    Cancellation,
    /// Anything else. Ends the session.
    Fatal,
}

/// Errors surfaced by the orchestration core and its collaborators
#[derive(Debug, Error)]
pub enum StudioError {
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Provider rate limit exceeded: {0}")]
    ProviderRateLimit(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Generation cancelled")]
    Cancelled,

    #[error("Rate limit reached: at most {limit} requests per minute")]
    RateLimited { limit: u32 },

    #[error("Request rejected by backend: {0}")]
    Rejected(String),

    #[error("No images returned for {0}")]
    NoImages(String),

    #[error("Video generation failed: {0}")]
    VideoFailed(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StudioError {
    /// Classify this error for retry and session policy.
    pub fn class(&self) -> ErrorClass {
        match self {
            StudioError::ServiceUnavailable(_) => ErrorClass::Transient,
            StudioError::ProviderRateLimit(_) => ErrorClass::Transient,
            StudioError::Rejected(_) | StudioError::NoImages(_) => ErrorClass::JobRejected,
            StudioError::AuthFailed(_) => ErrorClass::Authentication,
            StudioError::Validation(_) => ErrorClass::Validation,
            StudioError::Cancelled => ErrorClass::Cancellation,
            StudioError::RateLimited { .. }
            | StudioError::VideoFailed(_)
            | StudioError::Provider(_)
            | StudioError::Persistence(_)
            | StudioError::ConfigError(_)
            | StudioError::Catalog(_)
            | StudioError::Io(_) => ErrorClass::Fatal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Transient
    }

    /// Map an HTTP-like status code reported by a backend into the taxonomy.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => StudioError::AuthFailed(message),
            429 => StudioError::ProviderRateLimit(message),
            500 | 502 | 503 | 504 => StudioError::ServiceUnavailable(message),
            400 | 422 => StudioError::Rejected(message),
            _ => StudioError::Provider(format!("status {}: {}", status, message)),
        }
    }
}

impl From<config::ConfigError> for StudioError {
    fn from(err: config::ConfigError) -> Self {
        StudioError::ConfigError(err.to_string())
    }
}

impl From<toml::de::Error> for StudioError {
    fn from(err: toml::de::Error) -> Self {
        StudioError::Catalog(err.to_string())
    }
}
