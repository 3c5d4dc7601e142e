//! Blocking ingestion stage: extract, parse and stitch one session

use std::sync::Arc;

use contracts::{ContractError, ConversionBlueprint, TelemetrySample};
use ingestion::{
    parse_chunk, ExtractorConfig, IngestionMetrics, ParseStats, Session, TelemetryExtractor,
};
use sync_engine::{SegmentTiming, StitchedTrack, StitcherConfig, TrackStitcher};
use tracing::{error, info, instrument, warn};

/// Everything the ingestion stage learned about a session
#[derive(Debug)]
pub struct IngestedSession {
    /// One entry per segment, failed segments carry no duration
    pub timings: Vec<SegmentTiming>,
    pub parse: ParseStats,
    /// `"<file>: <error>"` for every segment that yielded no telemetry stream
    pub segment_failures: Vec<String>,
    pub stitched: Result<StitchedTrack, ContractError>,
}

impl IngestedSession {
    pub fn skipped_records(&self) -> u64 {
        self.parse.skipped_total()
    }
}

/// Run extraction, parsing and stitching for one session.
///
/// CPU bound, call from `spawn_blocking`. A failing segment is recorded and
/// skipped; the session only fails when stitching finds too little telemetry.
#[instrument(
    name = "ingest_session",
    skip(session, blueprint, metrics),
    fields(session = %session.id, segments = session.segments.len())
)]
pub fn ingest_session(
    session: &Session,
    blueprint: &ConversionBlueprint,
    metrics: Arc<IngestionMetrics>,
) -> IngestedSession {
    let config = ExtractorConfig::from_blueprint(blueprint);
    let reject_null_fix = config.reject_null_fix;
    let extractor = TelemetryExtractor::with_metrics(config, metrics.clone());

    let mut timings = Vec::with_capacity(session.segments.len());
    let mut parse = ParseStats::default();
    let mut segment_failures = Vec::new();
    let mut per_segment: Vec<Vec<TelemetrySample>> = Vec::with_capacity(session.segments.len());

    for segment in &session.segments {
        match extractor.extract(segment) {
            Ok(extracted) => {
                let (samples, stats) = parse_chunk(&extracted.chunk, reject_null_fix);
                metrics.record_parsed(stats.parsed, stats.skipped_total());
                parse.merge(&stats);
                timings.push(SegmentTiming {
                    file: segment.file_name.clone(),
                    sequence: segment.sequence,
                    media_duration_s: extracted.media_duration_s,
                });
                per_segment.push(samples);
            }
            Err(e) => {
                if e.is_segment_local() {
                    warn!(segment = %segment.file_name, error = %e, "Skipping segment");
                } else {
                    error!(segment = %segment.file_name, error = %e, "Segment unreadable, skipping");
                }
                segment_failures.push(format!("{}: {e}", segment.file_name));
                timings.push(SegmentTiming {
                    file: segment.file_name.clone(),
                    sequence: segment.sequence,
                    media_duration_s: None,
                });
            }
        }
    }

    let stitcher = TrackStitcher::new(StitcherConfig::from_blueprint(blueprint));
    let stitched = stitcher.stitch(&session.id, per_segment);
    if let Ok(result) = &stitched {
        info!(
            samples = result.track.len(),
            gaps = result.report.gaps,
            duplicates = result.report.duplicates,
            regressions = result.report.regressions,
            skipped_records = parse.skipped_total(),
            "Track stitched"
        );
    }

    IngestedSession {
        timings,
        parse,
        segment_failures,
        stitched,
    }
}
