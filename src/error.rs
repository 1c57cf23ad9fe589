//! Error types for the multisource-search crate.
//!
//! [`SearchError`] never crosses the public request path: the normalizer
//! absorbs its own failures and per-source failures are turned into the
//! `error` field of a [`crate::SourceOutcome`]. The only places a caller sees
//! a `SearchError` are construction and configuration loading.

/// Stable error codes for programmatic error handling.
///
/// These codes never change. Use them rather than parsing Display output.
pub mod error_codes {
    /// A request exceeded its timeout budget.
    pub const TIMEOUT: &str = "SOURCE_TIMEOUT";

    /// Network-level failure (DNS, connection refused, reset).
    pub const TRANSPORT: &str = "SOURCE_TRANSPORT_FAILURE";

    /// The remote answered with a non-success HTTP status.
    pub const HTTP_STATUS: &str = "SOURCE_HTTP_STATUS";

    /// The response body failed JSON or shape validation.
    pub const PROTOCOL: &str = "SOURCE_PROTOCOL_ERROR";

    /// The conversion service could not be used; original text kept.
    pub const NORMALIZATION_DEGRADED: &str = "NORMALIZATION_DEGRADED";

    /// Invalid configuration.
    pub const CONFIG_INVALID: &str = "CONFIG_INVALID";
}

/// Errors that can occur while normalizing a query or querying a source.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SearchError {
    /// The request did not finish within its timeout budget.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The connection failed before or while the response was received.
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote responded with a non-success HTTP status.
    #[error("HTTP {status}: {message}")]
    Http {
        /// Numeric HTTP status code.
        status: u16,
        /// Canonical reason or a truncated body excerpt.
        message: String,
    },

    /// The response could not be parsed or has the wrong shape.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The conversion service was unusable.
    #[error("normalization degraded: {0}")]
    NormalizationDegraded(String),

    /// Invalid configuration.
    #[error("config error: {0}")]
    Config(String),
}

impl SearchError {
    /// Returns the stable error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Timeout(_) => error_codes::TIMEOUT,
            Self::Transport(_) => error_codes::TRANSPORT,
            Self::Http { .. } => error_codes::HTTP_STATUS,
            Self::Protocol(_) => error_codes::PROTOCOL,
            Self::NormalizationDegraded(_) => error_codes::NORMALIZATION_DEGRADED,
            Self::Config(_) => error_codes::CONFIG_INVALID,
        }
    }

    /// Returns true if this error is a transient failure worth retrying.
    ///
    /// Timeouts, transport failures, `408`, `429` and `5xx` statuses are
    /// retryable. Other statuses, protocol and configuration errors are not:
    /// repeating the same request would produce the same answer.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Transport(_) => true,
            Self::Http { status, .. } => {
                *status == 408 || *status == 429 || (500..=599).contains(status)
            }
            Self::Protocol(_) | Self::NormalizationDegraded(_) | Self::Config(_) => false,
        }
    }

    /// Classify a [`reqwest::Error`] into a timeout or transport failure.
    ///
    /// The request URL is stripped so query text never ends up in messages.
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        let err = err.without_url();
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Convenience type alias for multisource-search results.
pub type Result<T> = std::result::Result<T, SearchError>;
