//! `run` command implementation.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::ConversionBlueprint;
use dashtrack_cli::pipeline::plan_jobs;
use dashtrack_cli::{CliError, GeoBackend, Pipeline, PipelineConfig};
use tracing::{info, warn};

use super::load_blueprint;
use crate::cli::RunArgs;

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    let mut blueprint = load_blueprint(args.config.as_deref())?;

    // Apply CLI overrides
    apply_overrides(&mut blueprint, args);
    ConfigLoader::validate(&blueprint).context("Invalid configuration after CLI overrides")?;

    info!(
        inputs = args.inputs.len(),
        output = %blueprint.output.dir,
        overlay = blueprint.overlay.enabled,
        map = blueprint.map.enabled,
        workers = blueprint.runtime.workers,
        sinks = blueprint.effective_sinks().len(),
        "Configuration loaded"
    );

    // Dry run - list what would be converted and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_dry_run(&blueprint, &args.inputs)?;
        return Ok(());
    }

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
        info!("Metrics endpoint available on port {}", args.metrics_port);
    }

    let geo = Arc::new(GeoBackend::from_config(&blueprint.geo)?);
    let pipeline = Pipeline::new(
        PipelineConfig {
            blueprint,
            inputs: args.inputs.clone(),
        },
        geo,
    )?;

    // Setup graceful shutdown handler
    let shutdown_signal = setup_shutdown_signal();

    info!("Starting conversion...");

    tokio::select! {
        result = pipeline.run() => {
            let stats = result.context("Conversion failed")?;
            info!(
                duration_secs = stats.duration.as_secs_f64(),
                fps = format!("{:.2}", stats.fps()),
                "Conversion completed"
            );

            // Print detailed statistics
            stats.print_summary();

            if !stats.report.any_usable() {
                let report = stats
                    .report_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                return Err(CliError::no_usable_output(stats.report.totals.failed, report).into());
            }
        }
        _ = shutdown_signal => {
            warn!("Received shutdown signal, stopping; report.json not written");
        }
    }

    info!("dashtrack finished");
    Ok(())
}

/// Command line flags take precedence over the configuration file
fn apply_overrides(blueprint: &mut ConversionBlueprint, args: &RunArgs) {
    if let Some(ref output) = args.output {
        info!(output = %output.display(), "Overriding output directory from CLI");
        blueprint.output.dir = output.display().to_string();
    }
    if let Some(ref timezone) = args.timezone {
        info!(timezone = %timezone, "Overriding display timezone from CLI");
        blueprint.overlay.timezone = timezone.clone();
    }
    if let Some(unit) = args.speed_unit {
        blueprint.overlay.speed_unit = unit.into();
    }
    if args.no_overlay {
        blueprint.overlay.enabled = false;
    }
    if args.no_map {
        blueprint.map.enabled = false;
    }
    if let Some(workers) = args.workers {
        blueprint.runtime.workers = workers;
    }
    if args.offline {
        blueprint.geo.offline = true;
    }
}

/// Setup Ctrl+C and SIGTERM signal handlers
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print what a run would convert
fn print_dry_run(blueprint: &ConversionBlueprint, inputs: &[PathBuf]) -> Result<()> {
    let sessions = ingestion::discover_sessions(inputs).context("Failed to scan inputs")?;
    let jobs = plan_jobs(sessions, blueprint);

    println!("\n=== Dry Run ===\n");
    println!("Output: {}", blueprint.output.dir);
    println!(
        "Overlay: {} ({:?}, {}x{}, {}, {})",
        if blueprint.overlay.enabled { "on" } else { "off" },
        blueprint.overlay.variant,
        blueprint.overlay.width,
        blueprint.overlay.height,
        blueprint.overlay.timezone,
        blueprint.overlay.speed_unit.symbol()
    );
    println!(
        "Map: {} ({}x{}, zoom {}, {})",
        if blueprint.map.enabled { "on" } else { "off" },
        blueprint.map.width,
        blueprint.map.height,
        blueprint.map.zoom,
        if blueprint.geo.offline { "offline" } else { "online" }
    );

    println!("\nSessions ({}):", jobs.len());
    for job in &jobs {
        println!(
            "  - {} ({} segments{})",
            job.session.id,
            job.session.segments.len(),
            if job.companion.is_empty() {
                String::new()
            } else {
                format!(", {} rear", job.companion.len())
            }
        );
    }
    println!();
    Ok(())
}
