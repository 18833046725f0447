//! Unified error type for trafficwise.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("City not supported: {0}")]
    InvalidCity(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("{provider} unavailable: {message}")]
    UpstreamUnavailable { provider: String, message: String },

    #[error("{provider} rejected credentials: {message}")]
    UpstreamAuth { provider: String, message: String },

    #[error("{provider} rate limited, retry after {retry_after_ms}ms")]
    UpstreamRateLimited { provider: String, retry_after_ms: u64 },

    #[error("{provider} did not answer within {timeout_ms}ms")]
    UpstreamTimeout { provider: String, timeout_ms: u64 },

    #[error("Refresh for {city} still running after {waited_ms}ms")]
    CacheLockTimeout { city: String, waited_ms: u64 },

    #[error("Config error: {0}")]
    Config(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for provider-side failures that the aggregator absorbs.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Error::UpstreamUnavailable { .. }
                | Error::UpstreamAuth { .. }
                | Error::UpstreamRateLimited { .. }
                | Error::UpstreamTimeout { .. }
        )
    }

    /// True for caller contract violations (bad city, malformed query).
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Error::InvalidCity(_) | Error::InvalidQuery(_))
    }

    /// HTTP status code used when this error reaches the API surface.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::InvalidCity(_) | Error::InvalidQuery(_) => 400,
            Error::UpstreamRateLimited { .. } => 429,
            Error::UpstreamUnavailable { .. } | Error::UpstreamAuth { .. } => 502,
            Error::CacheLockTimeout { .. } => 503,
            Error::UpstreamTimeout { .. } => 504,
            Error::Config(_) | Error::Json(_) | Error::Io(_) => 500,
        }
    }
}
