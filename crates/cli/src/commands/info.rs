//! `info` command implementation.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use contracts::ConversionBlueprint;
use dashtrack_cli::pipeline::ingest_session;
use ingestion::{discover_sessions, IngestionMetrics, Session};
use serde::Serialize;
use tracing::info;

use super::load_blueprint;
use crate::cli::InfoArgs;

/// Session info for JSON output
#[derive(Serialize)]
struct SessionInfo {
    id: String,
    folder: String,
    role: String,
    /// Converted by `run` (role carries telemetry)
    telemetry: bool,
    segments: Vec<SegmentInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stats: Option<TelemetryStats>,
}

#[derive(Serialize)]
struct SegmentInfo {
    sequence: u32,
    file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    media_duration_s: Option<f64>,
}

#[derive(Serialize)]
struct TelemetryStats {
    records_parsed: u64,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    records_skipped: BTreeMap<String, u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    segment_failures: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    track: Option<TrackInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct TrackInfo {
    samples: usize,
    start: String,
    end: String,
    duration_s: f64,
    gaps: usize,
    duplicates: usize,
    regressions: usize,
    max_speed: f64,
}

/// Execute the `info` command
pub async fn run_info(args: &InfoArgs) -> Result<()> {
    let blueprint = Arc::new(load_blueprint(args.config.as_deref())?);

    info!(inputs = args.inputs.len(), "Scanning inputs");
    let sessions = discover_sessions(&args.inputs).context("Failed to scan inputs")?;

    let mut infos = Vec::with_capacity(sessions.len());
    for session in sessions {
        infos.push(build_session_info(session, &blueprint, args.stats).await?);
    }

    if args.json {
        let json = serde_json::to_string_pretty(&infos).context("Failed to serialize session info")?;
        println!("{}", json);
    } else {
        print_session_info(&infos);
    }

    Ok(())
}

async fn build_session_info(
    session: Session,
    blueprint: &Arc<ConversionBlueprint>,
    with_stats: bool,
) -> Result<SessionInfo> {
    let telemetry = blueprint.input.telemetry_roles.contains(&session.role);
    let mut segments: Vec<SegmentInfo> = session
        .segments
        .iter()
        .map(|s| SegmentInfo {
            sequence: s.sequence,
            file: s.file_name.clone(),
            media_duration_s: None,
        })
        .collect();

    let stats = if with_stats && telemetry {
        let job = session.clone();
        let bp = blueprint.clone();
        let ingested = tokio::task::spawn_blocking(move || {
            ingest_session(&job, &bp, Arc::new(IngestionMetrics::new()))
        })
        .await
        .context("Ingestion task failed")?;

        for (segment, timing) in segments.iter_mut().zip(&ingested.timings) {
            segment.media_duration_s = timing.media_duration_s;
        }

        let (track, error) = match &ingested.stitched {
            Ok(stitched) => {
                let track = &stitched.track;
                let max_speed = track
                    .samples()
                    .iter()
                    .map(|s| s.speed_in(blueprint.overlay.speed_unit))
                    .fold(0.0, f64::max);
                (
                    Some(TrackInfo {
                        samples: track.len(),
                        start: track.start().to_string(),
                        end: track.end().to_string(),
                        duration_s: track.duration().num_milliseconds() as f64 / 1000.0,
                        gaps: track.gaps().len(),
                        duplicates: stitched.report.duplicates,
                        regressions: stitched.report.regressions,
                        max_speed,
                    }),
                    None,
                )
            }
            Err(e) => (None, Some(e.to_string())),
        };

        Some(TelemetryStats {
            records_parsed: ingested.parse.parsed,
            records_skipped: ingested
                .parse
                .skipped
                .iter()
                .map(|(reason, count)| (reason.as_str().to_string(), *count))
                .collect(),
            segment_failures: ingested.segment_failures.clone(),
            track,
            error,
        })
    } else {
        None
    };

    Ok(SessionInfo {
        id: session.id.clone(),
        folder: session.folder.display().to_string(),
        role: session.role.to_string(),
        telemetry,
        segments,
        stats,
    })
}

fn print_session_info(infos: &[SessionInfo]) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                     Recording Sessions                       ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    if infos.is_empty() {
        println!("No sessions found.\n");
        return;
    }

    for info in infos {
        let marker = if info.telemetry { "🎥" } else { "📼" };
        println!("{} {} ({}, {})", marker, info.id, info.role, info.folder);

        for (i, segment) in info.segments.iter().enumerate() {
            let is_last = i == info.segments.len() - 1 && info.stats.is_none();
            let prefix = if is_last { "└─" } else { "├─" };
            match segment.media_duration_s {
                Some(duration) => println!(
                    "   {} [{}] {} ({:.1}s)",
                    prefix, segment.sequence, segment.file, duration
                ),
                None => println!("   {} [{}] {}", prefix, segment.sequence, segment.file),
            }
        }

        if let Some(ref stats) = info.stats {
            let skipped: u64 = stats.records_skipped.values().sum();
            println!(
                "   ├─ Records: {} parsed, {} skipped",
                stats.records_parsed, skipped
            );
            for (reason, count) in &stats.records_skipped {
                println!("   │     {}: {}", reason, count);
            }
            for failure in &stats.segment_failures {
                println!("   ├─ ⚠ {}", failure);
            }
            match (&stats.track, &stats.error) {
                (Some(track), _) => {
                    println!(
                        "   └─ Track: {} samples, {} → {} ({:.1}s), {} gaps, max speed {:.1}",
                        track.samples,
                        track.start,
                        track.end,
                        track.duration_s,
                        track.gaps,
                        track.max_speed
                    );
                }
                (None, Some(error)) => println!("   └─ ✗ {}", error),
                (None, None) => println!("   └─ (no track)"),
            }
        }
        println!();
    }
}
