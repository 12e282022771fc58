//! Error types shared across the core crate.

/// Errors returned by a [`crate::PriceProvider`].
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream returned status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Upstream response is missing {0}")]
    MissingData(String),

    #[error("Unknown upstream token id: {0}")]
    UnknownToken(String),
}

/// Errors returned by a price lookup.
#[derive(Debug, thiserror::Error)]
pub enum PriceError {
    #[error("Token not found: {0}")]
    NotFound(String),

    #[error("Price provider error: {0}")]
    Provider(#[from] ProviderError),
}

/// Errors returned by the rotation scheduler lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("Rotation scheduler is already running")]
    AlreadyRunning,

    #[error("Rotation scheduler is not running")]
    NotRunning,
}

/// Errors returned by a presence sink. These are logged, never propagated.
#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    #[error("Presence target {0} is unreachable")]
    Unreachable(String),
}
