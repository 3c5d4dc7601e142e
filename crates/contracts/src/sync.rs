//! Frame-time synchronization contracts
//!
//! `FrameClock` turns output frame indices into `SyncQuery` instants,
//! the synchronizer answers each with a `ResolvedPosition`.

use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::TelemetrySample;

/// A requested instant for one output frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncQuery {
    pub frame_index: u64,
    pub at: NaiveDateTime,
}

/// Maps output frame indices to telemetry time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameClock {
    start: NaiveDateTime,
    frame_rate: f64,
    frame_count: u64,
}

impl FrameClock {
    /// `frame_rate` must be positive; callers validate it through the blueprint.
    pub fn new(start: NaiveDateTime, frame_rate: f64, frame_count: u64) -> Self {
        Self {
            start,
            frame_rate,
            frame_count,
        }
    }

    /// Frame count covering `duration_secs`, at least one frame
    pub fn from_duration(start: NaiveDateTime, frame_rate: f64, duration_secs: f64) -> Self {
        let frames = (duration_secs.max(0.0) * frame_rate).round() as u64;
        Self::new(start, frame_rate, frames.max(1))
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn duration_secs(&self) -> f64 {
        self.frame_count as f64 / self.frame_rate
    }

    /// Instant of frame `frame_index`
    pub fn query(&self, frame_index: u64) -> SyncQuery {
        let nanos = (frame_index as f64 * 1e9 / self.frame_rate).round() as i64;
        SyncQuery {
            frame_index,
            at: self.start + TimeDelta::nanoseconds(nanos),
        }
    }

    /// Frame index at or after `at`, clamped to the clock's range
    pub fn frame_at(&self, at: NaiveDateTime) -> u64 {
        let elapsed = (at - self.start).num_nanoseconds().unwrap_or(i64::MAX) as f64 / 1e9;
        let index = (elapsed * self.frame_rate).ceil().max(0.0) as u64;
        index.min(self.frame_count)
    }

    pub fn queries(&self) -> impl Iterator<Item = SyncQuery> + '_ {
        (0..self.frame_count).map(move |index| self.query(index))
    }
}

/// A covered answer: the (possibly synthetic) sample and derived heading
#[derive(Debug, Clone, PartialEq)]
pub struct PositionFix {
    /// The queried instant
    pub query: NaiveDateTime,

    /// Real sample for exact hits, interpolated sample otherwise
    pub sample: TelemetrySample,

    /// Great-circle bearing in degrees [0, 360), None when stationary
    pub bearing: Option<f64>,
}

/// Why a query has no coverage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverageGap {
    BeforeStart,
    AfterEnd,
    InGap {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
}

/// Synchronizer answer for one query
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedPosition {
    /// Query hit a sample timestamp exactly
    Exact(PositionFix),
    /// Linear interpolation between the bracketing samples
    Interpolated(PositionFix),
    /// Outside the track or inside a recorded gap
    NoCoverage(CoverageGap),
}

impl ResolvedPosition {
    pub fn fix(&self) -> Option<&PositionFix> {
        match self {
            Self::Exact(fix) | Self::Interpolated(fix) => Some(fix),
            Self::NoCoverage(_) => None,
        }
    }

    pub fn coverage(&self) -> Coverage {
        match self {
            Self::Exact(_) => Coverage::Exact,
            Self::Interpolated(_) => Coverage::Interpolated,
            Self::NoCoverage(_) => Coverage::None,
        }
    }

    pub fn is_covered(&self) -> bool {
        self.fix().is_some()
    }
}

/// Coverage tag written into timing manifests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coverage {
    Exact,
    Interpolated,
    None,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 9, 17)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap()
    }

    #[test]
    fn frame_clock_maps_indices() {
        let clock = FrameClock::new(t0(), 30.0, 90);
        assert_eq!(clock.query(0).at, t0());
        assert_eq!(clock.query(30).at, t0() + TimeDelta::seconds(1));
        assert_eq!(clock.query(15).at, t0() + TimeDelta::milliseconds(500));
        assert_eq!(clock.queries().count(), 90);
        assert!((clock.duration_secs() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn frame_clock_from_duration() {
        let clock = FrameClock::from_duration(t0(), 30.0, 60.0);
        assert_eq!(clock.frame_count(), 1800);

        let empty = FrameClock::from_duration(t0(), 30.0, 0.0);
        assert_eq!(empty.frame_count(), 1);
    }

    #[test]
    fn frame_at_rounds_up_and_clamps() {
        let clock = FrameClock::new(t0(), 10.0, 50);
        assert_eq!(clock.frame_at(t0()), 0);
        assert_eq!(clock.frame_at(t0() + TimeDelta::milliseconds(250)), 3);
        assert_eq!(clock.frame_at(t0() - TimeDelta::seconds(1)), 0);
        assert_eq!(clock.frame_at(t0() + TimeDelta::seconds(60)), 50);
    }
}
