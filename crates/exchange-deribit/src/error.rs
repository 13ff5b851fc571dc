//! Error types for the Deribit quote gateway.

use gex_desk_core::DeskError;
use thiserror::Error;

/// Errors that can occur when talking to Deribit.
#[derive(Debug, Error)]
pub enum DeribitError {
    /// HTTP request returned a non-success status.
    #[error("API error: {status_code} - {message}")]
    Api {
        /// HTTP status code.
        status_code: u16,
        /// Response body.
        message: String,
    },

    /// JSON-RPC error object in the response envelope.
    #[error("RPC error {code}: {message}")]
    Rpc {
        /// Deribit error code.
        code: i64,
        /// Error message from the venue.
        message: String,
    },

    /// Rate limit exceeded.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimit {
        /// Seconds to wait before retry.
        retry_after_secs: u64,
    },

    /// Network error.
    #[error("network error: {0}")]
    Network(String),

    /// Request timeout.
    #[error("request timeout: {0}")]
    Timeout(String),

    /// Response could not be decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Instrument name rejected before sending.
    #[error("invalid instrument: {0}")]
    InvalidInstrument(String),

    /// Envelope carried neither `result` nor `error`.
    #[error("empty result for {0}")]
    EmptyResult(String),
}

impl DeribitError {
    /// Creates an API error from status code and message.
    pub fn api(status_code: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status_code,
            message: message.into(),
        }
    }

    /// Creates a JSON-RPC error.
    pub fn rpc(code: i64, message: impl Into<String>) -> Self {
        Self::Rpc {
            code,
            message: message.into(),
        }
    }

    /// Returns true if the next poll tick may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) | Self::RateLimit { .. } => true,
            Self::Api { status_code, .. } => *status_code >= 500,
            _ => false,
        }
    }

    /// Maps the failure onto the desk's per-instrument error.
    pub fn into_quote_unavailable(self, instrument: impl Into<String>) -> DeskError {
        DeskError::quote_unavailable(instrument, self.to_string())
    }
}

impl From<reqwest::Error> for DeribitError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Network(format!("connection failed: {err}"))
        } else if err.is_decode() {
            Self::Serialization(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for DeribitError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type alias for Deribit operations.
pub type Result<T> = std::result::Result<T, DeribitError>;
