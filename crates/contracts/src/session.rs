//! Session outcome and timing manifest
//!
//! A session is one camera role of one recording folder. Every session ends in
//! a `SessionOutcome`; one failing session never aborts the batch.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::{CameraRole, Coverage};

/// Final status of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionStatus {
    /// All requested artifacts were produced
    Success,
    /// The session completed but some artifacts are missing or reduced
    Degraded { reasons: Vec<String> },
    /// Nothing usable was produced
    Failed { reason: String },
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Degraded { .. } => "degraded",
            Self::Failed { .. } => "failed",
        }
    }

    /// Success, or Degraded when any reason was collected
    pub fn from_reasons(reasons: Vec<String>) -> Self {
        if reasons.is_empty() {
            Self::Success
        } else {
            Self::Degraded { reasons }
        }
    }
}

/// Per-session result written into `report.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub session_id: String,
    pub role: CameraRole,
    /// Segment files in sequence order
    pub segments: Vec<String>,
    #[serde(flatten)]
    pub status: SessionStatus,
    /// Samples in the stitched track
    pub samples: usize,
    pub gaps: usize,
    /// Records skipped as malformed across all segments
    pub skipped_records: u64,
    pub overlay_frames: u64,
    pub map_frames: u64,
}

impl SessionOutcome {
    pub fn failed(
        session_id: impl Into<String>,
        role: CameraRole,
        segments: Vec<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            role,
            segments,
            status: SessionStatus::Failed {
                reason: reason.into(),
            },
            samples: 0,
            gaps: 0,
            skipped_records: 0,
            overlay_frames: 0,
            map_frames: 0,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, SessionStatus::Failed { .. })
    }
}

/// Timestamp and coverage of one output frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameTiming {
    pub index: u64,
    pub timestamp: NaiveDateTime,
    pub coverage: Coverage,
}

/// Frame range contributed by one source segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentSpan {
    pub file: String,
    pub sequence: u32,
    pub first_frame: u64,
    pub frame_count: u64,
    /// Duration estimated from the container, None when unknown
    pub media_duration_s: Option<f64>,
}

/// Frame sequence patterns of the written artifacts, relative to the session directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPatterns {
    pub overlay: Option<String>,
    pub map: Option<String>,
}

/// Maps output frame index to telemetry time for the compositing step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingManifest {
    pub session_id: String,
    pub frame_rate: f64,
    pub frame_count: u64,
    pub start: NaiveDateTime,
    pub frames: Vec<FrameTiming>,
    pub segments: Vec<SegmentSpan>,
    pub artifacts: ArtifactPatterns,
}

impl TimingManifest {
    /// Frames that resolved to a real or interpolated position
    pub fn covered_frames(&self) -> usize {
        self.frames
            .iter()
            .filter(|frame| frame.coverage != Coverage::None)
            .count()
    }
}
