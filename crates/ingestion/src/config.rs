//! Extraction configuration and metrics

use std::sync::atomic::{AtomicU64, Ordering};

use contracts::{ConversionBlueprint, StreamSelector};

/// Telemetry extraction and parsing options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractorConfig {
    /// How the telemetry stream is located in the PMT
    pub selector: StreamSelector,

    /// Treat (0, 0) fixes as malformed records
    pub reject_null_fix: bool,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            selector: StreamSelector::default(),
            reject_null_fix: true,
        }
    }
}

impl ExtractorConfig {
    pub fn from_blueprint(blueprint: &ConversionBlueprint) -> Self {
        Self {
            selector: blueprint.input.stream,
            reject_null_fix: blueprint.telemetry.reject_null_fix,
        }
    }
}

/// Ingestion metrics
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Segments whose telemetry stream was extracted
    pub segments_extracted: AtomicU64,

    /// Segments that failed extraction
    pub segments_failed: AtomicU64,

    /// Transport packets read
    pub packets_read: AtomicU64,

    /// Bytes skipped while resynchronising
    pub resync_bytes: AtomicU64,

    /// Continuity counter discontinuities on the telemetry PID
    pub continuity_errors: AtomicU64,

    /// Records parsed into samples
    pub records_parsed: AtomicU64,

    /// Records skipped as malformed
    pub records_skipped: AtomicU64,
}

impl IngestionMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_extracted(&self, packets: u64, resync_bytes: u64, continuity_errors: u64) {
        self.segments_extracted.fetch_add(1, Ordering::Relaxed);
        self.packets_read.fetch_add(packets, Ordering::Relaxed);
        self.resync_bytes.fetch_add(resync_bytes, Ordering::Relaxed);
        self.continuity_errors
            .fetch_add(continuity_errors, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.segments_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_parsed(&self, parsed: u64, skipped: u64) {
        self.records_parsed.fetch_add(parsed, Ordering::Relaxed);
        self.records_skipped.fetch_add(skipped, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            segments_extracted: self.segments_extracted.load(Ordering::Relaxed),
            segments_failed: self.segments_failed.load(Ordering::Relaxed),
            packets_read: self.packets_read.load(Ordering::Relaxed),
            resync_bytes: self.resync_bytes.load(Ordering::Relaxed),
            continuity_errors: self.continuity_errors.load(Ordering::Relaxed),
            records_parsed: self.records_parsed.load(Ordering::Relaxed),
            records_skipped: self.records_skipped.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub segments_extracted: u64,
    pub segments_failed: u64,
    pub packets_read: u64,
    pub resync_bytes: u64,
    pub continuity_errors: u64,
    pub records_parsed: u64,
    pub records_skipped: u64,
}
