//! Error types for the tessera-core crate

use http::StatusCode;
use thiserror::Error;

/// Result type alias using `CoreError`
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors produced while reconciling the outcomes of one fan-out
#[derive(Error, Debug)]
pub enum CoreError {
    /// No backend produced a successful outcome
    #[error("no successful responses")]
    NoSuccessfulResponses {
        /// Status of the last failed response, if any backend answered at all
        last_status: Option<StatusCode>,
    },

    /// A merged listing could not be serialized
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A response could not be assembled
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl CoreError {
    /// Error for a fan-out where nothing succeeded and no backend answered
    pub fn no_successful_responses() -> Self {
        Self::NoSuccessfulResponses { last_status: None }
    }
}

/// Failure of the transport underneath a backend
#[derive(Error, Debug)]
pub enum TransportError {
    /// HTTP client error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The request could not be addressed to the backend
    #[error("invalid target: {0}")]
    InvalidTarget(String),
}

/// Error attached to a failed backend outcome
#[derive(Error, Debug)]
pub enum BackendError {
    /// The backend is in maintenance mode; no I/O was attempted
    #[error("backend {host} is unavailable: maintenance mode")]
    Unavailable { host: String },

    /// The transport failed while talking to the backend
    #[error("backend {host} transport error: {source}")]
    Transport {
        host: String,
        #[source]
        source: TransportError,
    },
}

impl BackendError {
    /// Host of the backend the error originated from
    pub fn host(&self) -> &str {
        match self {
            Self::Unavailable { host } | Self::Transport { host, .. } => host,
        }
    }

    /// True for the maintenance short-circuit
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}
