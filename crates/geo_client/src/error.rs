//! Geo client error types

use contracts::ContractError;
use thiserror::Error;

/// Geo client specific error
#[derive(Debug, Error)]
pub enum GeoClientError {
    /// Transport-level failure (connect, timeout, body read)
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    /// Non-success HTTP status
    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },

    /// Body could not be decoded
    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    /// Client could not be built
    #[error("invalid geo client configuration: {message}")]
    Config { message: String },

    /// Wrapped ContractError
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl GeoClientError {
    pub fn transport(url: impl Into<String>, err: &reqwest::Error) -> Self {
        Self::Transport {
            url: url.into(),
            message: err.to_string(),
        }
    }

    pub fn decode(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Worth retrying: transport failures, HTTP 429 and 5xx
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => *status == 429 || (500..600).contains(status),
            _ => false,
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, GeoClientError>;
