//! Output frame timeline
//!
//! Picks the frame count of a session and which frames each source segment
//! contributes. Container durations win when every segment has one; otherwise
//! the track's own span is used.

use chrono::{NaiveDateTime, TimeDelta};
use contracts::{FrameClock, FrameTiming, SegmentSpan, Track};

use crate::Synchronizer;

/// What the timeline needs to know about one source segment
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentTiming {
    pub file: String,
    pub sequence: u32,
    pub media_duration_s: Option<f64>,
}

/// Frame clock plus per-segment frame ranges
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    pub clock: FrameClock,
    pub spans: Vec<SegmentSpan>,
}

impl Timeline {
    /// Plan the frames of a stitched track.
    ///
    /// `offset_s` shifts every query instant relative to the first sample.
    pub fn plan(track: &Track, segments: &[SegmentTiming], frame_rate: f64, offset_s: f64) -> Self {
        let start = track.start() + seconds(offset_s);
        let all_known = !segments.is_empty()
            && segments
                .iter()
                .all(|s| s.media_duration_s.is_some_and(|d| d > 0.0));

        if all_known {
            Self::from_media(start, segments, frame_rate)
        } else {
            Self::from_track(start, track, segments, frame_rate)
        }
    }

    fn from_media(start: NaiveDateTime, segments: &[SegmentTiming], frame_rate: f64) -> Self {
        let mut spans = Vec::with_capacity(segments.len());
        let mut elapsed = 0.0;
        let mut first_frame = 0u64;
        for segment in segments {
            elapsed += segment.media_duration_s.unwrap_or(0.0);
            let end_frame = (elapsed * frame_rate).round() as u64;
            spans.push(SegmentSpan {
                file: segment.file.clone(),
                sequence: segment.sequence,
                first_frame,
                frame_count: end_frame.saturating_sub(first_frame),
                media_duration_s: segment.media_duration_s,
            });
            first_frame = end_frame.max(first_frame);
        }
        let clock = FrameClock::new(start, frame_rate, first_frame.max(1));
        Self { clock, spans }
    }

    fn from_track(
        start: NaiveDateTime,
        track: &Track,
        segments: &[SegmentTiming],
        frame_rate: f64,
    ) -> Self {
        let span_secs = track.duration().num_milliseconds() as f64 / 1000.0;
        // last sample lands on a frame of its own
        let clock = FrameClock::from_duration(start, frame_rate, span_secs + 1.0 / frame_rate);

        let firsts: Vec<(u32, u64)> = track
            .segments()
            .map(|(sequence, samples)| (sequence, clock.frame_at(samples[0].timestamp)))
            .collect();

        let mut spans = Vec::with_capacity(segments.len());
        let mut cursor = 0u64;
        for segment in segments {
            let first = firsts
                .iter()
                .find(|(sequence, _)| *sequence == segment.sequence)
                .map_or(cursor, |&(_, frame)| frame.max(cursor));
            let next = firsts
                .iter()
                .find(|(sequence, _)| *sequence > segment.sequence)
                .map_or(clock.frame_count(), |&(_, frame)| frame.max(first));
            let owns_samples = firsts.iter().any(|(sequence, _)| *sequence == segment.sequence);
            let end = if owns_samples { next } else { first };

            spans.push(SegmentSpan {
                file: segment.file.clone(),
                sequence: segment.sequence,
                first_frame: first,
                frame_count: end - first,
                media_duration_s: segment.media_duration_s,
            });
            cursor = end;
        }
        Self { clock, spans }
    }

    /// Coverage of every frame, for the timing manifest
    pub fn frame_timings(&self, synchronizer: &Synchronizer) -> Vec<FrameTiming> {
        synchronizer
            .timeline(&self.clock)
            .map(|(query, resolved)| FrameTiming {
                index: query.frame_index,
                timestamp: query.at,
                coverage: resolved.coverage(),
            })
            .collect()
    }
}

fn seconds(value: f64) -> TimeDelta {
    TimeDelta::milliseconds((value * 1000.0).round() as i64)
}
