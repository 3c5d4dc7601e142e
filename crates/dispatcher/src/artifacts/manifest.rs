//! Timing manifest: frame index to telemetry time

use std::path::{Path, PathBuf};

use contracts::TimingManifest;
use tracing::{debug, instrument};

use super::write_json;
use crate::error::Result;

pub const MANIFEST_FILE: &str = "manifest.json";

/// Write `manifest.json` into the session directory
#[instrument(
    name = "write_manifest",
    skip(session_dir, manifest),
    fields(session = %manifest.session_id, frames = manifest.frame_count)
)]
pub fn write_manifest(session_dir: &Path, manifest: &TimingManifest) -> Result<PathBuf> {
    let path = session_dir.join(MANIFEST_FILE);
    write_json(&path, manifest)?;
    debug!(
        path = %path.display(),
        covered = manifest.covered_frames(),
        "timing manifest written"
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use contracts::{ArtifactPatterns, Coverage, FrameTiming, SegmentSpan};
    use tempfile::tempdir;

    #[test]
    fn manifest_round_trips_through_disk() {
        let start = NaiveDate::from_ymd_opt(2025, 9, 17)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let manifest = TimingManifest {
            session_id: "trip_front".into(),
            frame_rate: 30.0,
            frame_count: 2,
            start,
            frames: vec![
                FrameTiming {
                    index: 0,
                    timestamp: start,
                    coverage: Coverage::Exact,
                },
                FrameTiming {
                    index: 1,
                    timestamp: start + chrono::TimeDelta::milliseconds(33),
                    coverage: Coverage::None,
                },
            ],
            segments: vec![SegmentSpan {
                file: "0001_F.ts".into(),
                sequence: 0,
                first_frame: 0,
                frame_count: 2,
                media_duration_s: None,
            }],
            artifacts: ArtifactPatterns {
                overlay: Some("overlay/%06d.png".into()),
                map: None,
            },
        };

        let dir = tempdir().unwrap();
        let path = write_manifest(&dir.path().join("trip_front"), &manifest).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["frames"][1]["coverage"], "none");
        assert_eq!(json["segments"][0]["file"], "0001_F.ts");

        let back: TimingManifest = serde_json::from_str(&text).unwrap();
        assert_eq!(back, manifest);
        assert!(!path.with_extension("json.tmp").exists());
    }
}
