//! Layered error definitions
//!
//! Categorized by source: config / container / session / geo / sink

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Container Errors =====
    /// The transport container cannot be parsed at all
    #[error("container corrupt in '{file}': {message}")]
    ContainerCorrupt { file: String, message: String },

    /// The container carries no stream matching the selector
    #[error("telemetry stream {selector} not found in '{file}'")]
    StreamNotFound { file: String, selector: String },

    // ===== Session Errors =====
    /// Fewer than two usable samples after stitching
    #[error("insufficient telemetry for session '{session_id}': {samples} usable samples")]
    InsufficientTelemetry { session_id: String, samples: usize },

    /// Track construction invariant violated
    #[error("invalid track: {message}")]
    InvalidTrack { message: String },

    // ===== Geo Errors =====
    /// Reverse geocoding failed after retries
    #[error("geocode unavailable: {message}")]
    GeocodeUnavailable { message: String },

    /// Basemap could not be fetched
    #[error("basemap unavailable: {message}")]
    BasemapUnavailable { message: String },

    // ===== Sink Errors =====
    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn container_corrupt(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ContainerCorrupt {
            file: file.into(),
            message: message.into(),
        }
    }

    pub fn stream_not_found(file: impl Into<String>, selector: impl Into<String>) -> Self {
        Self::StreamNotFound {
            file: file.into(),
            selector: selector.into(),
        }
    }

    pub fn insufficient_telemetry(session_id: impl Into<String>, samples: usize) -> Self {
        Self::InsufficientTelemetry {
            session_id: session_id.into(),
            samples,
        }
    }

    pub fn invalid_track(message: impl Into<String>) -> Self {
        Self::InvalidTrack {
            message: message.into(),
        }
    }

    pub fn geocode_unavailable(message: impl Into<String>) -> Self {
        Self::GeocodeUnavailable {
            message: message.into(),
        }
    }

    pub fn basemap_unavailable(message: impl Into<String>) -> Self {
        Self::BasemapUnavailable {
            message: message.into(),
        }
    }

    /// Create sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Whether the error only affects one segment and the session may continue
    pub fn is_segment_local(&self) -> bool {
        matches!(
            self,
            Self::ContainerCorrupt { .. } | Self::StreamNotFound { .. }
        )
    }
}
