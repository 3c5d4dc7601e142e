//! `dashtrack validate`: load a blueprint, report problems without touching any input.

use std::path::Path;

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::ConversionBlueprint;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum ValidationReport {
    Valid {
        config: String,
        summary: ConfigSummary,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        warnings: Vec<String>,
    },
    Invalid {
        config: String,
        error: String,
    },
}

impl ValidationReport {
    fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }
}

#[derive(Debug, Serialize)]
struct ConfigSummary {
    version: String,
    telemetry_roles: Vec<String>,
    frame_rate: f64,
    overlay: bool,
    map: bool,
    timezone: String,
    speed_unit: String,
    output_dir: String,
    sink_count: usize,
}

impl From<&ConversionBlueprint> for ConfigSummary {
    fn from(blueprint: &ConversionBlueprint) -> Self {
        Self {
            version: format!("{:?}", blueprint.version),
            telemetry_roles: blueprint
                .input
                .telemetry_roles
                .iter()
                .map(ToString::to_string)
                .collect(),
            frame_rate: blueprint.output.frame_rate,
            overlay: blueprint.overlay.enabled,
            map: blueprint.map.enabled,
            timezone: blueprint.overlay.timezone.clone(),
            speed_unit: blueprint.overlay.speed_unit.symbol().to_string(),
            output_dir: blueprint.output.dir.clone(),
            sink_count: blueprint.effective_sinks().len(),
        }
    }
}

pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");
    let report = check(&args.config);

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize validation report")?
        );
    } else {
        print_report(&report);
    }

    anyhow::ensure!(report.is_valid(), "Configuration validation failed");
    Ok(())
}

fn check(path: &Path) -> ValidationReport {
    let config = path.display().to_string();
    if !path.is_file() {
        return ValidationReport::Invalid {
            error: format!("File not found: {config}"),
            config,
        };
    }
    match ConfigLoader::load_from_path(path) {
        Ok(blueprint) => ValidationReport::Valid {
            summary: ConfigSummary::from(&blueprint),
            warnings: collect_warnings(&blueprint),
            config,
        },
        Err(e) => ValidationReport::Invalid {
            error: e.to_string(),
            config,
        },
    }
}

/// Settings that load fine but are probably not what the user wants
fn collect_warnings(blueprint: &ConversionBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.sinks.is_empty() {
        warnings.push("No sinks configured - frames go to a default PNG sequence".to_string());
    }

    if !blueprint.renders_anything() {
        warnings.push(
            "Overlay and map are both disabled - only manifests and GPX are written".to_string(),
        );
    }

    if blueprint.geo.offline && blueprint.overlay.enabled && blueprint.overlay.geocode {
        warnings.push("geo.offline is set - overlay place names stay blank".to_string());
    }

    if blueprint.map.enabled && blueprint.map.trail_length == 0 {
        warnings.push("map.trail_length is 0 - no trail is drawn".to_string());
    }

    if blueprint.sync.offset_s.abs() > 60.0 {
        warnings.push(format!(
            "sync.offset_s is {}s - telemetry and video may not overlap",
            blueprint.sync.offset_s
        ));
    }

    warnings
}

fn print_report(report: &ValidationReport) {
    match report {
        ValidationReport::Invalid { config, error } => {
            println!("✗ {config} is invalid");
            println!("  {error}");
        }
        ValidationReport::Valid {
            config,
            summary,
            warnings,
        } => {
            println!("✓ {config} is valid");
            println!();
            println!("  Version:         {}", summary.version);
            println!("  Telemetry roles: {}", summary.telemetry_roles.join(", "));
            println!("  Frame rate:      {} fps", summary.frame_rate);
            println!(
                "  Overlay / map:   {} / {}",
                on_off(summary.overlay),
                on_off(summary.map)
            );
            println!("  Display:         {} {}", summary.timezone, summary.speed_unit);
            println!("  Output:          {} ({} sinks)", summary.output_dir, summary.sink_count);
            for warning in warnings {
                println!("  ! {warning}");
            }
        }
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}
