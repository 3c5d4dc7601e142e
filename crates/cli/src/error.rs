//! Error types for CLI operations.

use std::path::PathBuf;

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Nothing to convert under the given inputs
    #[error("No recording sessions found under {inputs:?}")]
    NoSessions { inputs: Vec<PathBuf> },

    /// Every session failed
    #[error("No session produced usable output ({failed} failed), see {report}")]
    NoUsableOutput { failed: usize, report: String },

    /// External geo service could not be set up
    #[error("Failed to set up geo service: {message}")]
    GeoService { message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn no_sessions(inputs: &[PathBuf]) -> Self {
        Self::NoSessions {
            inputs: inputs.to_vec(),
        }
    }

    pub fn no_usable_output(failed: usize, report: impl Into<String>) -> Self {
        Self::NoUsableOutput {
            failed,
            report: report.into(),
        }
    }

    pub fn geo_service(message: impl Into<String>) -> Self {
        Self::GeoService {
            message: message.into(),
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
