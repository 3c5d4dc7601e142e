//! Frame-time synchronizer
//!
//! Resolves every output-frame instant against an immutable track: exact
//! hits return the real sample, instants between two samples that are not
//! separated by a gap are linearly interpolated, everything else has no
//! coverage.

use std::sync::Arc;

use chrono::NaiveDateTime;
use contracts::{
    CoverageGap, FrameClock, PositionFix, ResolvedPosition, SyncQuery, TelemetrySample, Track,
};
use nalgebra::Vector3;

use crate::geodesy::{bearing_deg, longitude_delta, normalize_longitude};

/// Read-only view over a shared track, cheap to clone across renderers
#[derive(Debug, Clone)]
pub struct Synchronizer {
    track: Arc<Track>,
}

impl Synchronizer {
    pub fn new(track: Arc<Track>) -> Self {
        Self { track }
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    pub fn resolve_query(&self, query: &SyncQuery) -> ResolvedPosition {
        self.resolve(query.at)
    }

    /// Resolve one instant
    pub fn resolve(&self, at: NaiveDateTime) -> ResolvedPosition {
        let samples = self.track.samples();
        let idx = samples.partition_point(|s| s.timestamp < at);

        if let Some(hit) = samples.get(idx).filter(|s| s.timestamp == at) {
            return ResolvedPosition::Exact(PositionFix {
                query: at,
                sample: hit.clone(),
                bearing: self.bearing_at(idx),
            });
        }
        if idx == 0 {
            return ResolvedPosition::NoCoverage(CoverageGap::BeforeStart);
        }
        if idx == samples.len() {
            return ResolvedPosition::NoCoverage(CoverageGap::AfterEnd);
        }
        if let Some(gap) = self.track.gap_after(idx - 1) {
            return ResolvedPosition::NoCoverage(CoverageGap::InGap {
                start: gap.start,
                end: gap.end,
            });
        }

        let (s0, s1) = (&samples[idx - 1], &samples[idx]);
        ResolvedPosition::Interpolated(PositionFix {
            query: at,
            sample: interpolate(s0, s1, at),
            bearing: bearing_between(s0, s1),
        })
    }

    /// Resolve every frame of a clock, in frame order
    pub fn timeline<'a>(
        &'a self,
        clock: &'a FrameClock,
    ) -> impl Iterator<Item = (SyncQuery, ResolvedPosition)> + 'a {
        clock
            .queries()
            .map(move |query| (query, self.resolve_query(&query)))
    }

    /// Heading at a real sample: toward the next one, or from the previous
    /// one for the last sample
    fn bearing_at(&self, index: usize) -> Option<f64> {
        let samples = self.track.samples();
        match (samples.get(index), samples.get(index + 1)) {
            (Some(cur), Some(next)) => bearing_between(cur, next),
            (Some(cur), None) if index > 0 => bearing_between(&samples[index - 1], cur),
            _ => None,
        }
    }
}

fn bearing_between(from: &TelemetrySample, to: &TelemetrySample) -> Option<f64> {
    bearing_deg(from.latitude, from.longitude, to.latitude, to.longitude)
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Linear blend of two bracketing samples at `at`.
///
/// Discrete fields (satellites, hdop, segment) come from the nearer sample,
/// the earlier one on a tie. Speed is expressed in the earlier sample's unit.
fn interpolate(s0: &TelemetrySample, s1: &TelemetrySample, at: NaiveDateTime) -> TelemetrySample {
    let span = (s1.timestamp - s0.timestamp).num_nanoseconds().unwrap_or(i64::MAX) as f64;
    let elapsed = (at - s0.timestamp).num_nanoseconds().unwrap_or(0) as f64;
    let t = (elapsed / span).clamp(0.0, 1.0);

    let nearer = if t <= 0.5 { s0 } else { s1 };
    let a0 = Vector3::new(s0.accel.x, s0.accel.y, s0.accel.z);
    let a1 = Vector3::new(s1.accel.x, s1.accel.y, s1.accel.z);
    let accel = a0.lerp(&a1, t);

    TelemetrySample {
        timestamp: at,
        latitude: lerp(s0.latitude, s1.latitude, t),
        longitude: normalize_longitude(s0.longitude + longitude_delta(s0.longitude, s1.longitude) * t),
        speed: lerp(s0.speed, s1.speed_in(s0.speed_unit), t),
        speed_unit: s0.speed_unit,
        hdop: nearer.hdop,
        altitude: lerp(s0.altitude, s1.altitude, t),
        satellites: nearer.satellites,
        accel: contracts::Vector3 {
            x: accel.x,
            y: accel.y,
            z: accel.z,
        },
        segment: nearer.segment,
    }
}
