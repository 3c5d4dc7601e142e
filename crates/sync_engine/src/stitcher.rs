//! Track stitching
//!
//! Concatenates per-segment samples in segment order and enforces a strictly
//! increasing timeline with a running-maximum rule: a sample equal to the
//! latest accepted timestamp is a duplicate, an earlier one is a regression.
//! Both are dropped; neither reorders the track.

use chrono::TimeDelta;
use contracts::{ContractError, ConversionBlueprint, SpeedSource, SpeedUnit, TelemetrySample, Track};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::geodesy::haversine_m;

/// Stitcher settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StitcherConfig {
    /// Intervals strictly longer than this are recorded as gaps
    pub gap_threshold: TimeDelta,
    pub speed_source: SpeedSource,
    /// Unit of computed speeds
    pub speed_unit: SpeedUnit,
}

impl Default for StitcherConfig {
    fn default() -> Self {
        Self {
            gap_threshold: TimeDelta::seconds(30),
            speed_source: SpeedSource::Device,
            speed_unit: SpeedUnit::KilometersPerHour,
        }
    }
}

impl StitcherConfig {
    pub fn from_blueprint(blueprint: &ConversionBlueprint) -> Self {
        let millis = (blueprint.stitch.gap_threshold_s * 1000.0).round() as i64;
        Self {
            gap_threshold: TimeDelta::milliseconds(millis),
            speed_source: blueprint.telemetry.speed_source,
            speed_unit: blueprint.overlay.speed_unit,
        }
    }
}

/// What stitching dropped and found
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StitchReport {
    pub input_samples: usize,
    pub accepted: usize,
    /// Samples sharing the latest accepted timestamp
    pub duplicates: usize,
    /// Samples earlier than the latest accepted timestamp
    pub regressions: usize,
    pub gaps: usize,
}

/// Stitched track plus its report
#[derive(Debug, Clone)]
pub struct StitchedTrack {
    pub track: Track,
    pub report: StitchReport,
}

#[derive(Debug, Clone, Default)]
pub struct TrackStitcher {
    config: StitcherConfig,
}

impl TrackStitcher {
    pub fn new(config: StitcherConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StitcherConfig {
        &self.config
    }

    /// Stitch per-segment samples, given in segment sequence order.
    ///
    /// # Errors
    /// `InsufficientTelemetry` when fewer than two samples survive.
    #[instrument(
        name = "stitch_track",
        skip(self, segments),
        fields(session_id = %session_id)
    )]
    pub fn stitch<I>(&self, session_id: &str, segments: I) -> Result<StitchedTrack, ContractError>
    where
        I: IntoIterator<Item = Vec<TelemetrySample>>,
    {
        let mut report = StitchReport::default();
        let mut accepted: Vec<TelemetrySample> = Vec::new();

        for segment in segments {
            report.input_samples += segment.len();
            for sample in segment {
                let Some(latest) = accepted.last() else {
                    accepted.push(sample);
                    continue;
                };
                if sample.timestamp > latest.timestamp {
                    accepted.push(sample);
                } else if sample.timestamp == latest.timestamp {
                    report.duplicates += 1;
                    debug!(timestamp = %sample.timestamp, segment = sample.segment, "duplicate sample dropped");
                } else {
                    report.regressions += 1;
                    warn!(
                        timestamp = %sample.timestamp,
                        latest = %latest.timestamp,
                        segment = sample.segment,
                        "timestamp regression, sample rejected"
                    );
                }
            }
        }

        if self.config.speed_source == SpeedSource::Computed {
            apply_computed_speed(&mut accepted, self.config.speed_unit);
        }

        report.accepted = accepted.len();
        metrics::counter!("dashtrack_samples_accepted_total").increment(report.accepted as u64);
        metrics::counter!("dashtrack_samples_dropped_total", "reason" => "duplicate")
            .increment(report.duplicates as u64);
        metrics::counter!("dashtrack_samples_dropped_total", "reason" => "regression")
            .increment(report.regressions as u64);

        let track = Track::new(session_id, accepted, self.config.gap_threshold)?;
        report.gaps = track.gaps().len();
        metrics::counter!("dashtrack_track_gaps_total").increment(report.gaps as u64);

        debug!(
            samples = report.accepted,
            duplicates = report.duplicates,
            regressions = report.regressions,
            gaps = report.gaps,
            "track stitched"
        );
        Ok(StitchedTrack { track, report })
    }
}

/// Replace device speed with distance over time from the previous sample.
///
/// The first sample keeps its device reading, converted to `unit`.
fn apply_computed_speed(samples: &mut [TelemetrySample], unit: SpeedUnit) {
    if let Some(first) = samples.first_mut() {
        first.speed = round_tenth(first.speed_in(unit));
        first.speed_unit = unit;
    }
    for index in 1..samples.len() {
        let (prev, cur) = (&samples[index - 1], &samples[index]);
        let meters = haversine_m(prev.latitude, prev.longitude, cur.latitude, cur.longitude);
        let seconds = (cur.timestamp - prev.timestamp)
            .num_milliseconds()
            .max(1) as f64
            / 1000.0;
        let speed = unit.from_meters_per_second(meters / seconds);

        let cur = &mut samples[index];
        cur.speed = round_tenth(speed);
        cur.speed_unit = unit;
    }
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use contracts::Vector3;

    fn at(second: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 9, 17)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
            + TimeDelta::seconds(second)
    }

    fn sample(second: i64, segment: u32) -> TelemetrySample {
        TelemetrySample {
            timestamp: at(second),
            latitude: 45.0 + second as f64 * 0.0001,
            longitude: 9.0,
            speed: 40.0,
            speed_unit: SpeedUnit::KilometersPerHour,
            hdop: 0.8,
            altitude: 120.0,
            satellites: 10,
            accel: Vector3::default(),
            segment,
        }
    }

    fn seconds(track: &Track) -> Vec<i64> {
        track
            .samples()
            .iter()
            .map(|s| (s.timestamp - at(0)).num_seconds())
            .collect()
    }

    #[test]
    fn concatenates_segments_in_order() {
        let stitcher = TrackStitcher::default();
        let first: Vec<_> = (0..5).map(|s| sample(s, 0)).collect();
        let second: Vec<_> = (5..10).map(|s| sample(s, 1)).collect();

        let stitched = stitcher.stitch("trip_front", vec![first, second]).unwrap();
        assert_eq!(stitched.track.len(), 10);
        assert_eq!(stitched.report.input_samples, 10);
        assert_eq!(stitched.report.accepted, 10);
        assert!(stitched.track.gaps().is_empty());
        assert_eq!(seconds(&stitched.track), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn boundary_duplicate_kept_once() {
        let stitcher = TrackStitcher::default();
        let first: Vec<_> = (0..=5).map(|s| sample(s, 0)).collect();
        let second: Vec<_> = (5..=8).map(|s| sample(s, 1)).collect();

        let stitched = stitcher.stitch("trip_front", vec![first, second]).unwrap();
        assert_eq!(stitched.report.duplicates, 1);
        assert_eq!(seconds(&stitched.track), (0..=8).collect::<Vec<_>>());
        // the earlier segment wins the duplicate
        assert_eq!(stitched.track.samples()[5].segment, 0);
    }

    #[test]
    fn regression_inside_next_segment_is_rejected() {
        let stitcher = TrackStitcher::default();
        let first: Vec<_> = (80..=94).map(|s| sample(s, 0)).collect();
        let second = vec![sample(95, 1), sample(90, 1), sample(96, 1), sample(97, 1)];

        let stitched = stitcher.stitch("trip_front", vec![first, second]).unwrap();
        assert_eq!(stitched.report.regressions, 1);
        assert_eq!(seconds(&stitched.track), (80..=97).collect::<Vec<_>>());
    }

    #[test]
    fn overlapping_segment_start_is_rejected_until_it_passes_the_maximum() {
        let stitcher = TrackStitcher::default();
        let first: Vec<_> = (90..=100).map(|s| sample(s, 0)).collect();
        let second: Vec<_> = (98..=103).map(|s| sample(s, 1)).collect();

        let stitched = stitcher.stitch("trip_front", vec![first, second]).unwrap();
        assert_eq!(stitched.report.regressions, 2);
        assert_eq!(stitched.report.duplicates, 1);
        assert_eq!(seconds(&stitched.track), (90..=103).collect::<Vec<_>>());
        assert!(stitched
            .track
            .samples()
            .windows(2)
            .all(|pair| pair[0].timestamp < pair[1].timestamp));
    }

    #[test]
    fn records_gaps_between_segments() {
        let stitcher = TrackStitcher::default();
        let first: Vec<_> = (0..3).map(|s| sample(s, 0)).collect();
        let second: Vec<_> = (60..63).map(|s| sample(s, 1)).collect();

        let stitched = stitcher.stitch("trip_front", vec![first, second]).unwrap();
        assert_eq!(stitched.report.gaps, 1);
        let gap = stitched.track.gaps()[0];
        assert_eq!(gap.after_index, 2);
        assert_eq!(gap.duration(), TimeDelta::seconds(58));
    }

    #[test]
    fn default_threshold_tolerates_sparse_fixes() {
        let config = StitcherConfig::from_blueprint(&ConversionBlueprint::default());
        assert_eq!(config.gap_threshold, StitcherConfig::default().gap_threshold);

        let stitcher = TrackStitcher::new(config);
        let sparse = vec![sample(0, 0), sample(10, 0), sample(40, 0), sample(71, 0)];
        let stitched = stitcher.stitch("trip_front", vec![sparse]).unwrap();
        // 30 s is still covered, 31 s is not
        assert_eq!(stitched.report.gaps, 1);
        assert_eq!(stitched.track.gaps()[0].after_index, 2);
    }

    #[test]
    fn too_few_samples_fail() {
        let stitcher = TrackStitcher::default();
        let err = stitcher
            .stitch("trip_front", vec![vec![sample(0, 0)], vec![sample(0, 1)]])
            .unwrap_err();
        assert!(matches!(
            err,
            ContractError::InsufficientTelemetry { samples: 1, .. }
        ));

        let err = stitcher.stitch("trip_front", Vec::new()).unwrap_err();
        assert!(matches!(
            err,
            ContractError::InsufficientTelemetry { samples: 0, .. }
        ));
    }

    #[test]
    fn computed_speed_from_positions() {
        let stitcher = TrackStitcher::new(StitcherConfig {
            speed_source: SpeedSource::Computed,
            ..Default::default()
        });
        // 0.0001 degrees of latitude per second is about 11.1 m/s
        let samples: Vec<_> = (0..3).map(|s| sample(s, 0)).collect();
        let stitched = stitcher.stitch("trip_front", vec![samples]).unwrap();

        let speeds: Vec<f64> = stitched.track.samples().iter().map(|s| s.speed).collect();
        assert_eq!(speeds[0], 40.0);
        assert_eq!(speeds[1], 40.0);
        assert_eq!(speeds[2], 40.0);

        let mph = TrackStitcher::new(StitcherConfig {
            speed_source: SpeedSource::Computed,
            speed_unit: SpeedUnit::MilesPerHour,
            ..Default::default()
        });
        let samples: Vec<_> = (0..3).map(|s| sample(s, 0)).collect();
        let stitched = mph.stitch("trip_front", vec![samples]).unwrap();
        assert_eq!(stitched.track.samples()[1].speed, 24.9);
        assert_eq!(stitched.track.samples()[1].speed_unit, SpeedUnit::MilesPerHour);
    }
}
