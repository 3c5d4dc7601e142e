//! `export-gpx` command implementation.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono_tz::Tz;
use dashtrack_cli::pipeline::{ingest_session, plan_jobs, GPX_FILE};
use dashtrack_cli::CliError;
use dispatcher::artifacts::write_gpx;
use ingestion::{discover_sessions, IngestionMetrics};
use tracing::{info, warn};

use super::load_blueprint;
use crate::cli::ExportGpxArgs;

/// Execute the `export-gpx` command
pub async fn run_export_gpx(args: &ExportGpxArgs) -> Result<()> {
    let mut blueprint = load_blueprint(args.config.as_deref())?;
    if let Some(ref output) = args.output {
        blueprint.output.dir = output.display().to_string();
    }
    let device_tz: Tz = blueprint
        .overlay
        .device_timezone()
        .parse()
        .map_err(|_| anyhow::anyhow!("unknown device timezone"))?;
    let output_dir = PathBuf::from(&blueprint.output.dir);
    let blueprint = Arc::new(blueprint);

    let sessions = discover_sessions(&args.inputs).context("Failed to scan inputs")?;
    let jobs = plan_jobs(sessions, &blueprint);
    if jobs.is_empty() {
        return Err(CliError::no_sessions(&args.inputs).into());
    }

    let metrics = Arc::new(IngestionMetrics::new());
    let mut written = 0usize;
    for job in jobs {
        let session = job.session;
        let bp = blueprint.clone();
        let shared = metrics.clone();
        let ingest_job = session.clone();
        let ingested =
            tokio::task::spawn_blocking(move || ingest_session(&ingest_job, &bp, shared))
                .await
                .context("Ingestion task failed")?;

        let stitched = match ingested.stitched {
            Ok(stitched) => stitched,
            Err(e) => {
                warn!(session = %session.id, error = %e, "No GPX for session");
                println!("✗ {}: {}", session.id, e);
                continue;
            }
        };

        let session_dir = output_dir.join(&session.id);
        std::fs::create_dir_all(&session_dir)
            .with_context(|| format!("Failed to create {}", session_dir.display()))?;
        let path = session_dir.join(GPX_FILE);
        write_gpx(&path, &stitched.track, &session.segment_names(), device_tz)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        info!(session = %session.id, samples = stitched.track.len(), "GPX exported");
        println!(
            "✓ {} → {} ({} points)",
            session.id,
            path.display(),
            stitched.track.len()
        );
        written += 1;
    }

    let snapshot = metrics.snapshot();
    info!(
        written,
        records_parsed = snapshot.records_parsed,
        records_skipped = snapshot.records_skipped,
        "GPX export finished"
    );
    if written == 0 {
        anyhow::bail!("No session had enough telemetry for a GPX track");
    }
    Ok(())
}
