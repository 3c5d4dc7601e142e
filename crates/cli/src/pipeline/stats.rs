//! Pipeline statistics and metrics.

use std::path::PathBuf;
use std::time::Duration;

use dispatcher::artifacts::RunReport;
use ingestion::MetricsSnapshot as IngestionSnapshot;
use observability::ConversionMetricsAggregator;
use render::CacheStats;

/// Statistics from a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineStats {
    /// Total duration of the pipeline run
    pub duration: Duration,

    /// Per-session outcomes as written to `report.json`
    pub report: RunReport,

    /// Where the report was written
    pub report_path: Option<PathBuf>,

    /// Session aggregates
    pub conversion: ConversionMetricsAggregator,

    /// Transport stream and record counters
    pub ingestion: IngestionSnapshot,

    /// Place-name cache usage
    pub geocode: CacheStats,
}

impl Default for PipelineStats {
    fn default() -> Self {
        Self {
            duration: Duration::ZERO,
            report: RunReport::new(Vec::new()),
            report_path: None,
            conversion: ConversionMetricsAggregator::new(),
            ingestion: IngestionSnapshot::default(),
            geocode: CacheStats::default(),
        }
    }
}

impl PipelineStats {
    /// Output frames per second of wall time
    pub fn fps(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            let frames = self.conversion.overlay_frames + self.conversion.map_frames;
            frames as f64 / secs
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                     Conversion Statistics                    ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        let totals = &self.report.totals;
        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!(
            "   ├─ Sessions: {} (success {}, degraded {}, failed {})",
            totals.sessions, totals.success, totals.degraded, totals.failed
        );
        println!("   ├─ Frames/s: {:.2}", self.fps());
        match &self.report_path {
            Some(path) => println!("   └─ Report: {}", path.display()),
            None => println!("   └─ Report: (not written)"),
        }

        let ingestion = &self.ingestion;
        println!("\n📥 Ingestion");
        println!(
            "   ├─ Segments: {} extracted, {} failed",
            ingestion.segments_extracted, ingestion.segments_failed
        );
        println!(
            "   ├─ Packets: {} ({} resync bytes, {} continuity errors)",
            ingestion.packets_read, ingestion.resync_bytes, ingestion.continuity_errors
        );
        println!(
            "   └─ Records: {} parsed, {} skipped",
            ingestion.records_parsed, ingestion.records_skipped
        );

        println!("\n🌍 Place names");
        println!(
            "   └─ Lookups: {} ({} hits, {} queries, {} failed)",
            self.geocode.lookups,
            self.geocode.hits(),
            self.geocode.misses,
            self.geocode.failures
        );

        println!("\n{}", self.conversion.summary());

        for outcome in &self.report.sessions {
            match &outcome.status {
                contracts::SessionStatus::Success => {
                    println!("✓ {}", outcome.session_id);
                }
                contracts::SessionStatus::Degraded { reasons } => {
                    println!("⚠ {}", outcome.session_id);
                    for reason in reasons {
                        println!("   - {}", reason);
                    }
                }
                contracts::SessionStatus::Failed { reason } => {
                    println!("✗ {}: {}", outcome.session_id, reason);
                }
            }
        }
        println!();
    }
}
