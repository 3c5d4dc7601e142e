//! Pipeline orchestrator - coordinates all sessions of a run.
//!
//! Sessions run on a `JoinSet` bounded by a semaphore; one session failing
//! never stops the others.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono_tz::Tz;
use contracts::{ConversionBlueprint, GeoService, SessionOutcome};
use dispatcher::artifacts::{write_report, RunReport};
use ingestion::{discover_sessions, IngestionMetrics};
use observability::{record_geocode_cache, record_session_outcome, record_sessions_in_flight};
use render::{DisplayClock, GeocodeCache, OverlayLayout, OverlayRenderer};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use super::session::{plan_jobs, process_session, SessionContext};
use super::PipelineStats;
use crate::error::CliError;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The conversion blueprint, CLI overrides applied
    pub blueprint: ConversionBlueprint,

    /// Input folders or segment files
    pub inputs: Vec<PathBuf>,
}

impl PipelineConfig {
    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(&self.blueprint.output.dir)
    }
}

/// Main pipeline orchestrator
pub struct Pipeline<G> {
    config: PipelineConfig,
    context: Arc<SessionContext<G>>,
}

impl<G> Pipeline<G>
where
    G: GeoService + Sync + 'static,
{
    /// Create a new pipeline; render state is built once here.
    pub fn new(config: PipelineConfig, geo: Arc<G>) -> Result<Self> {
        let blueprint = &config.blueprint;
        let clock = DisplayClock::from_config(&blueprint.overlay)
            .context("Invalid overlay timezone")?;
        let device_tz: Tz = blueprint
            .overlay
            .device_timezone()
            .parse()
            .map_err(|_| anyhow::anyhow!("unknown device timezone"))?;

        let context = SessionContext {
            blueprint: Arc::new(blueprint.clone()),
            output_dir: config.output_dir(),
            geo,
            places: Arc::new(GeocodeCache::new(blueprint.overlay.geocode_cell_deg)),
            overlay: OverlayRenderer::new(OverlayLayout::from_config(&blueprint.overlay), clock),
            device_tz,
            ingestion: Arc::new(IngestionMetrics::new()),
        };

        Ok(Self {
            config,
            context: Arc::new(context),
        })
    }

    /// Run every discovered session to completion and write `report.json`
    pub async fn run(self) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;
        let output_dir = self.config.output_dir();

        let sessions = discover_sessions(&self.config.inputs)
            .context("Failed to scan inputs for segments")?;
        let jobs = plan_jobs(sessions, blueprint);
        if jobs.is_empty() {
            return Err(CliError::no_sessions(&self.config.inputs).into());
        }
        std::fs::create_dir_all(&output_dir)
            .with_context(|| format!("Failed to create {}", output_dir.display()))?;

        let workers = blueprint.runtime.workers.max(1);
        info!(
            sessions = jobs.len(),
            workers,
            output = %output_dir.display(),
            "Converting sessions"
        );

        let semaphore = Arc::new(Semaphore::new(workers));
        let mut set = JoinSet::new();
        let mut pending = HashMap::new();

        for (index, job) in jobs.into_iter().enumerate() {
            let placeholder = SessionOutcome::failed(
                &job.session.id,
                job.session.role,
                job.session.segment_names(),
                "session task aborted",
            );
            let semaphore = semaphore.clone();
            let context = self.context.clone();
            let handle = set.spawn(async move {
                let _permit = semaphore.clone().acquire_owned().await.ok();
                record_sessions_in_flight(workers - semaphore.available_permits());
                let started = Instant::now();
                let outcome = process_session(context, job).await;
                (index, outcome, started.elapsed())
            });
            pending.insert(handle.id(), (index, placeholder));
        }

        let mut finished: Vec<(usize, SessionOutcome, Duration)> = Vec::with_capacity(pending.len());
        while let Some(joined) = set.join_next_with_id().await {
            match joined {
                Ok((id, result)) => {
                    pending.remove(&id);
                    finished.push(result);
                }
                Err(e) => {
                    error!(error = %e, "Session task panicked");
                    if let Some((index, outcome)) = pending.remove(&e.id()) {
                        finished.push((index, outcome, Duration::ZERO));
                    }
                }
            }
        }
        record_sessions_in_flight(0);
        finished.sort_by_key(|(index, _, _)| *index);

        let mut stats = PipelineStats::default();
        let mut outcomes = Vec::with_capacity(finished.len());
        for (_, outcome, elapsed) in finished {
            let secs = elapsed.as_secs_f64();
            record_session_outcome(&outcome, secs);
            stats.conversion.update(&outcome, secs);
            match &outcome.status {
                contracts::SessionStatus::Failed { reason } => {
                    warn!(session = %outcome.session_id, reason = %reason, "Session failed")
                }
                status => info!(
                    session = %outcome.session_id,
                    status = status.as_str(),
                    samples = outcome.samples,
                    overlay_frames = outcome.overlay_frames,
                    map_frames = outcome.map_frames,
                    "Session finished"
                ),
            }
            outcomes.push(outcome);
        }

        let cache = self.context.places.stats();
        record_geocode_cache(cache.hits(), cache.misses);
        stats.geocode = cache;
        stats.ingestion = self.context.ingestion.snapshot();

        let report = RunReport::new(outcomes);
        stats.report_path = Some(
            write_report(&output_dir, &report).context("Failed to write run report")?,
        );
        stats.report = report;
        stats.duration = start_time.elapsed();

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            success = stats.report.totals.success,
            degraded = stats.report.totals.degraded,
            failed = stats.report.totals.failed,
            "Run complete"
        );
        Ok(stats)
    }
}
