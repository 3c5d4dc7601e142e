//! Command implementations.

mod export_gpx;
mod info;
mod run;
mod validate;

pub use export_gpx::run_export_gpx;
pub use info::run_info;
pub use run::run_pipeline;
pub use validate::run_validate;

use std::path::Path;

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::ConversionBlueprint;
use dashtrack_cli::CliError;
use tracing::info;

/// Load the configuration file, or the defaults when none is given
fn load_blueprint(path: Option<&Path>) -> Result<ConversionBlueprint> {
    match path {
        Some(path) if !path.exists() => {
            return Err(CliError::config_not_found(path.display().to_string()).into())
        }
        Some(path) => info!(config = %path.display(), "Loading configuration"),
        None => info!("No configuration file given, using defaults"),
    }
    ConfigLoader::load_or_default(path).context("Failed to load configuration")
}
