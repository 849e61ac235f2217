//! Transport configuration errors

use thiserror::Error;

/// Result type alias using `TransportConfigError`
pub type Result<T> = std::result::Result<T, TransportConfigError>;

/// Errors raised while building transports from configuration
#[derive(Error, Debug)]
pub enum TransportConfigError {
    /// A trigger pattern is not a valid regular expression
    #[error("malformed {field} trigger in transport rule {rule:?}: {source}")]
    MalformedTriggerPattern {
        rule: String,
        field: &'static str,
        #[source]
        source: regex::Error,
    },

    /// The HTTP client for a tuning profile could not be built
    #[error("cannot build http client for transport rule {rule:?}: {source}")]
    ClientBuild {
        rule: String,
        #[source]
        source: reqwest::Error,
    },
}
