//! Per-session conversion: ingest, plan frames, render, dispatch, write artifacts

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono_tz::Tz;
use contracts::{
    ArtifactPatterns, CameraRole, ContractError, ConversionBlueprint, FrameClock, FrameKind,
    GeoService, RenderedFrame, SessionOutcome, SessionStatus, SinkType, TimingManifest,
};
use dispatcher::artifacts::{write_gpx, write_manifest, CompositeLayout, CompositePlan};
use dispatcher::{create_dispatcher, frame_pattern};
use ingestion::{IngestionMetrics, Session};
use render::{
    GeocodeCache, MapLayout, MapTrackGenerator, OverlayGenerator, OverlayRenderer, RenderError,
};
use sync_engine::{Synchronizer, Timeline};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use super::ingest::ingest_session;

/// GPX file name inside a session directory
pub const GPX_FILE: &str = "track.gpx";

/// Read-only state shared by every session of a run
pub struct SessionContext<G> {
    pub blueprint: Arc<ConversionBlueprint>,
    pub output_dir: PathBuf,
    pub geo: Arc<G>,
    pub places: Arc<GeocodeCache>,
    /// Built once per run, cloned into each session's generator
    pub overlay: OverlayRenderer,
    pub device_tz: Tz,
    pub ingestion: Arc<IngestionMetrics>,
}

/// One session to convert plus the other camera's files of the same folder
#[derive(Debug, Clone)]
pub struct SessionJob {
    pub session: Session,
    /// Rear segment paths, used by the composite plan of a front session
    pub companion: Vec<String>,
}

#[derive(Debug, Default)]
struct RenderCounts {
    overlay: u64,
    map: u64,
}

fn paths(session: &Session) -> Vec<String> {
    session
        .segments
        .iter()
        .map(|s| s.path.display().to_string())
        .collect()
}

/// Convert one session. Never fails: every problem ends up in the outcome.
#[instrument(
    name = "process_session",
    skip(ctx, job),
    fields(session = %job.session.id, role = %job.session.role)
)]
pub async fn process_session<G>(ctx: Arc<SessionContext<G>>, job: SessionJob) -> SessionOutcome
where
    G: GeoService + Sync + 'static,
{
    let session = job.session.clone();
    let names = session.segment_names();

    let blueprint = ctx.blueprint.clone();
    let metrics = ctx.ingestion.clone();
    let ingest_job = session.clone();
    let ingested = match tokio::task::spawn_blocking(move || {
        ingest_session(&ingest_job, &blueprint, metrics)
    })
    .await
    {
        Ok(ingested) => ingested,
        Err(e) => {
            return SessionOutcome::failed(
                &session.id,
                session.role,
                names,
                format!("ingestion task failed: {e}"),
            )
        }
    };

    let skipped_records = ingested.skipped_records();
    let mut reasons: Vec<String> = ingested
        .segment_failures
        .iter()
        .map(|failure| format!("segment skipped: {failure}"))
        .collect();

    let stitched = match ingested.stitched {
        Ok(stitched) => stitched,
        Err(e @ ContractError::InsufficientTelemetry { samples: 0, .. }) => {
            warn!(error = %e, "Session has no telemetry at all");
            // composite plan only, the session itself counts as failed
            let mut outcome = video_only(&ctx, &job, names, skipped_records, reasons);
            outcome.status = SessionStatus::Failed {
                reason: e.to_string(),
            };
            return outcome;
        }
        Err(e @ ContractError::InsufficientTelemetry { .. }) => {
            warn!(error = %e, "Session has no usable telemetry, composite plan only");
            reasons.push(format!("no overlay or map: {e}"));
            return video_only(&ctx, &job, names, skipped_records, reasons);
        }
        Err(e) => {
            warn!(error = %e, "Session has no usable telemetry");
            let mut outcome = SessionOutcome::failed(&session.id, session.role, names, e.to_string());
            outcome.skipped_records = skipped_records;
            return outcome;
        }
    };

    let blueprint = &ctx.blueprint;
    let track = Arc::new(stitched.track);
    let sync = Synchronizer::new(track.clone());
    let timeline = Timeline::plan(
        &track,
        &ingested.timings,
        blueprint.output.frame_rate,
        blueprint.sync.offset_s,
    );
    info!(
        frames = timeline.clock.frame_count(),
        frame_rate = timeline.clock.frame_rate(),
        "Frame timeline planned"
    );

    let session_dir = ctx.output_dir.join(&session.id);
    if let Err(e) = std::fs::create_dir_all(&session_dir) {
        let mut outcome = SessionOutcome::failed(
            &session.id,
            session.role,
            names,
            format!("cannot create {}: {e}", session_dir.display()),
        );
        outcome.skipped_records = skipped_records;
        return outcome;
    }

    let counts = if blueprint.renders_anything() {
        render_session(&ctx, &session.id, &sync, &timeline.clock, &mut reasons).await
    } else {
        RenderCounts::default()
    };

    let writes_png = blueprint
        .effective_sinks()
        .iter()
        .any(|sink| sink.sink_type == SinkType::Png);
    let artifacts = ArtifactPatterns {
        overlay: (writes_png && counts.overlay > 0).then(|| frame_pattern(FrameKind::Overlay)),
        map: (writes_png && counts.map > 0).then(|| frame_pattern(FrameKind::Map)),
    };

    let manifest = TimingManifest {
        session_id: session.id.clone(),
        frame_rate: timeline.clock.frame_rate(),
        frame_count: timeline.clock.frame_count(),
        start: timeline.clock.start(),
        frames: timeline.frame_timings(&sync),
        segments: timeline.spans.clone(),
        artifacts: artifacts.clone(),
    };
    if let Err(e) = write_manifest(&session_dir, &manifest) {
        reasons.push(format!("timing manifest not written: {e}"));
    }

    if blueprint.output.gpx {
        if let Err(e) = write_gpx(&session_dir.join(GPX_FILE), &track, &names, ctx.device_tz) {
            reasons.push(format!("gpx not written: {e}"));
        }
    }

    if blueprint.output.composite_plan {
        write_composite(
            &session,
            &job.companion,
            &artifacts,
            manifest.frame_rate,
            &session_dir,
            &mut reasons,
        );
    }

    SessionOutcome {
        session_id: session.id.clone(),
        role: session.role,
        segments: names,
        status: SessionStatus::from_reasons(reasons),
        samples: track.len(),
        gaps: track.gaps().len(),
        skipped_records,
        overlay_frames: counts.overlay,
        map_frames: counts.map,
    }
}

/// Session without a track: the source video can still be merged, without overlays
fn video_only<G>(
    ctx: &SessionContext<G>,
    job: &SessionJob,
    names: Vec<String>,
    skipped_records: u64,
    mut reasons: Vec<String>,
) -> SessionOutcome {
    let session = &job.session;
    let session_dir = ctx.output_dir.join(&session.id);
    if ctx.blueprint.output.composite_plan {
        match std::fs::create_dir_all(&session_dir) {
            Ok(()) => write_composite(
                session,
                &job.companion,
                &ArtifactPatterns::default(),
                ctx.blueprint.output.frame_rate,
                &session_dir,
                &mut reasons,
            ),
            Err(e) => reasons.push(format!("cannot create {}: {e}", session_dir.display())),
        }
    }

    SessionOutcome {
        session_id: session.id.clone(),
        role: session.role,
        segments: names,
        status: SessionStatus::from_reasons(reasons),
        samples: 0,
        gaps: 0,
        skipped_records,
        overlay_frames: 0,
        map_frames: 0,
    }
}

/// Render the enabled sequences concurrently into one dispatcher
async fn render_session<G>(
    ctx: &SessionContext<G>,
    session_id: &str,
    sync: &Synchronizer,
    clock: &FrameClock,
    reasons: &mut Vec<String>,
) -> RenderCounts
where
    G: GeoService + Sync + 'static,
{
    let blueprint = &ctx.blueprint;
    let (tx, rx) = mpsc::channel::<RenderedFrame>(blueprint.runtime.frame_channel_capacity);
    let dispatcher = match create_dispatcher(blueprint.effective_sinks(), &ctx.output_dir, rx).await
    {
        Ok(dispatcher) => dispatcher,
        Err(e) => {
            reasons.push(format!("no frames written: {e}"));
            return RenderCounts::default();
        }
    };
    let dispatch = dispatcher.spawn();

    let overlay = async {
        if !blueprint.overlay.enabled {
            return Ok::<_, RenderError>(None);
        }
        let mut generator = OverlayGenerator::new(ctx.overlay.clone());
        if blueprint.overlay.geocode {
            generator = generator.with_geocoding(ctx.geo.clone(), ctx.places.clone());
        }
        generator.run(session_id, sync, clock, &tx).await.map(Some)
    };

    let map = async {
        if !blueprint.map.enabled {
            return Ok::<_, RenderError>(None);
        }
        let layout = MapLayout::from_config(&blueprint.map);
        let generator = MapTrackGenerator::prepare(layout, sync.track(), ctx.geo.as_ref()).await?;
        generator.run(session_id, sync, clock, &tx).await.map(Some)
    };

    let (overlay, map) = tokio::join!(overlay, map);
    drop(tx);

    record_render("overlay", overlay, reasons);
    record_render("map", map, reasons);

    let summary = match dispatch.await {
        Ok(summary) => summary,
        Err(e) => {
            reasons.push(format!("dispatcher stopped: {e}"));
            return RenderCounts::default();
        }
    };

    for (sink, snapshot) in &summary.sinks {
        observability::record_sink_totals(
            sink,
            snapshot.write_count,
            snapshot.failure_count,
            snapshot.dropped_count,
        );
        if !snapshot.is_clean() {
            reasons.push(format!(
                "sink {sink}: {} failed, {} dropped frames",
                snapshot.failure_count, snapshot.dropped_count
            ));
        }
    }

    RenderCounts {
        overlay: summary.frames_of(FrameKind::Overlay),
        map: summary.frames_of(FrameKind::Map),
    }
}

fn record_render(kind: &str, result: Result<Option<u64>, RenderError>, reasons: &mut Vec<String>) {
    match result {
        Ok(Some(frames)) => debug!(kind, frames, "Sequence complete"),
        Ok(None) => {}
        Err(RenderError::Contract(e @ ContractError::BasemapUnavailable { .. })) => {
            warn!(error = %e, "Map track skipped");
            reasons.push(format!("{kind} skipped: {e}"));
        }
        Err(e) => {
            warn!(kind, error = %e, "Sequence incomplete");
            reasons.push(format!("{kind} incomplete: {e}"));
        }
    }
}

fn write_composite(
    session: &Session,
    companion: &[String],
    artifacts: &ArtifactPatterns,
    frame_rate: f64,
    session_dir: &Path,
    reasons: &mut Vec<String>,
) {
    if session.role != CameraRole::Front {
        debug!("Composite plan is written for front sessions only");
        return;
    }
    let plan = CompositePlan::build(
        &session.id,
        paths(session),
        companion.to_vec(),
        artifacts,
        frame_rate,
        &CompositeLayout::default(),
    );
    if let Err(e) = plan.write(session_dir) {
        reasons.push(format!("composite plan not written: {e}"));
    }
}

/// Pair each telemetry session with the other camera's files of its folder
pub fn plan_jobs(sessions: Vec<Session>, blueprint: &ConversionBlueprint) -> Vec<SessionJob> {
    let rear_of = |folder: &Path| {
        sessions
            .iter()
            .find(|s| s.role == CameraRole::Rear && s.folder == folder)
            .map(paths)
            .unwrap_or_default()
    };

    let jobs: Vec<SessionJob> = sessions
        .iter()
        .filter(|s| blueprint.input.telemetry_roles.contains(&s.role))
        .map(|s| SessionJob {
            session: s.clone(),
            companion: if s.role == CameraRole::Front {
                rear_of(&s.folder)
            } else {
                Vec::new()
            },
        })
        .collect();

    for skipped in sessions
        .iter()
        .filter(|s| !blueprint.input.telemetry_roles.contains(&s.role))
    {
        debug!(session = %skipped.id, role = %skipped.role, "Role carries no telemetry, not converted");
    }
    jobs
}
