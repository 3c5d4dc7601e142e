//! Track - stitched, strictly ordered telemetry for one session

use chrono::{NaiveDateTime, TimeDelta};
use serde::Serialize;

use crate::{ContractError, TelemetrySample};

/// Uncovered interval between two consecutive accepted samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Gap {
    /// Index of the sample right before the gap
    pub after_index: usize,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Gap {
    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }
}

/// Immutable telemetry track
///
/// Samples are strictly increasing by timestamp and at least two are present.
#[derive(Debug, Clone)]
pub struct Track {
    session_id: String,
    samples: Vec<TelemetrySample>,
    gaps: Vec<Gap>,
    gap_threshold: TimeDelta,
}

impl Track {
    /// Build a track, recording every interval longer than `gap_threshold` as a gap.
    ///
    /// # Errors
    /// - `InsufficientTelemetry` with fewer than two samples
    /// - `InvalidTrack` when timestamps are not strictly increasing
    pub fn new(
        session_id: impl Into<String>,
        samples: Vec<TelemetrySample>,
        gap_threshold: TimeDelta,
    ) -> Result<Self, ContractError> {
        let session_id = session_id.into();
        if samples.len() < 2 {
            return Err(ContractError::insufficient_telemetry(
                session_id,
                samples.len(),
            ));
        }

        let mut gaps = Vec::new();
        for (index, pair) in samples.windows(2).enumerate() {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.timestamp <= prev.timestamp {
                return Err(ContractError::invalid_track(format!(
                    "sample {} at {} does not follow {}",
                    index + 1,
                    next.timestamp,
                    prev.timestamp
                )));
            }
            if next.timestamp - prev.timestamp > gap_threshold {
                gaps.push(Gap {
                    after_index: index,
                    start: prev.timestamp,
                    end: next.timestamp,
                });
            }
        }

        Ok(Self {
            session_id,
            samples,
            gaps,
            gap_threshold,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn samples(&self) -> &[TelemetrySample] {
        &self.samples
    }

    pub fn gaps(&self) -> &[Gap] {
        &self.gaps
    }

    pub fn gap_threshold(&self) -> TimeDelta {
        self.gap_threshold
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when the track holds no samples; a constructed track never does
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn first(&self) -> &TelemetrySample {
        &self.samples[0]
    }

    pub fn last(&self) -> &TelemetrySample {
        &self.samples[self.samples.len() - 1]
    }

    pub fn start(&self) -> NaiveDateTime {
        self.first().timestamp
    }

    pub fn end(&self) -> NaiveDateTime {
        self.last().timestamp
    }

    pub fn duration(&self) -> TimeDelta {
        self.end() - self.start()
    }

    /// Gap that starts right after sample `index`, if any
    pub fn gap_after(&self, index: usize) -> Option<&Gap> {
        self.gaps
            .binary_search_by_key(&index, |gap| gap.after_index)
            .ok()
            .map(|pos| &self.gaps[pos])
    }

    /// Samples grouped by source segment, in track order
    pub fn segments(&self) -> impl Iterator<Item = (u32, &[TelemetrySample])> {
        self.samples
            .chunk_by(|a, b| a.segment == b.segment)
            .map(|chunk| (chunk[0].segment, chunk))
    }
}
