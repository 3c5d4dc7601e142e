//! Per-sink delivery counters
//!
//! Written by the sink worker, read by the dispatcher when it reports.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use contracts::FrameKind;
use serde::Serialize;

#[derive(Debug, Default)]
pub struct SinkMetrics {
    queue_len: AtomicUsize,
    /// Highest queue length seen since start
    peak_queue_len: AtomicUsize,
    overlay_written: AtomicU64,
    map_written: AtomicU64,
    /// Raw pixel bytes handed to the sink
    bytes_written: AtomicU64,
    failure_count: AtomicU64,
    /// Frames not delivered because the worker had stopped
    dropped_count: AtomicU64,
}

impl SinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    pub fn observe_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
        self.peak_queue_len.fetch_max(len, Ordering::Relaxed);
    }

    pub fn record_write(&self, kind: FrameKind, bytes: usize) {
        let counter = match kind {
            FrameKind::Overlay => &self.overlay_written,
            FrameKind::Map => &self.map_written,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn written(&self, kind: FrameKind) -> u64 {
        match kind {
            FrameKind::Overlay => self.overlay_written.load(Ordering::Relaxed),
            FrameKind::Map => self.map_written.load(Ordering::Relaxed),
        }
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn record_failure(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    pub fn record_dropped(&self) {
        self.dropped_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let overlay_written = self.written(FrameKind::Overlay);
        let map_written = self.written(FrameKind::Map);
        MetricsSnapshot {
            queue_len: self.queue_len(),
            peak_queue_len: self.peak_queue_len.load(Ordering::Relaxed),
            write_count: overlay_written + map_written,
            overlay_written,
            map_written,
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            failure_count: self.failure_count(),
            dropped_count: self.dropped_count(),
        }
    }
}

/// Point-in-time copy of a sink's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub queue_len: usize,
    pub peak_queue_len: usize,
    /// Frames of any kind written
    pub write_count: u64,
    pub overlay_written: u64,
    pub map_written: u64,
    pub bytes_written: u64,
    pub failure_count: u64,
    pub dropped_count: u64,
}

impl MetricsSnapshot {
    /// Every frame handed to the sink was written
    pub fn is_clean(&self) -> bool {
        self.failure_count == 0 && self.dropped_count == 0
    }
}
