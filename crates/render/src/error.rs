//! Render error types

use thiserror::Error;

/// Renderer-specific errors
#[derive(Debug, Error)]
pub enum RenderError {
    /// The frame consumer went away before the sequence was complete
    #[error("{kind} frame channel closed after {sent} frames")]
    ChannelClosed { kind: &'static str, sent: u64 },

    /// Contract error (basemap, timezone)
    #[error("render error: {0}")]
    Contract(#[from] contracts::ContractError),
}

pub type Result<T> = std::result::Result<T, RenderError>;
