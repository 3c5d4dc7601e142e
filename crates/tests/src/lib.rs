//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合成 MPEG-TS 分段 (`fixtures`)
//! - 配置与合约测试
//! - 模拟 e2e 测试（Mock 地理服务，无需网络）

pub mod fixtures;

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{ContractError, SinkType};

    #[test]
    fn test_toml_round_trip() {
        let text = r#"
            [output]
            frame_rate = 25.0

            [overlay]
            variant = "compact"
            speed_unit = "mph"

            [[sinks]]
            name = "frames"
            sink_type = "png"
        "#;
        let bp = ConfigLoader::load_from_str(text, ConfigFormat::Toml).unwrap();
        assert_eq!(bp.output.frame_rate, 25.0);
        assert_eq!(bp.sinks[0].sink_type, SinkType::Png);

        let again = ConfigLoader::load_from_str(
            &ConfigLoader::to_toml(&bp).unwrap(),
            ConfigFormat::Toml,
        )
        .unwrap();
        assert_eq!(again.overlay.speed_unit, bp.overlay.speed_unit);
        assert_eq!(again.overlay.variant, bp.overlay.variant);
    }

    #[test]
    fn test_invalid_value_names_field() {
        let err = ConfigLoader::load_from_str("[map]\nzoom = 22\n", ConfigFormat::Toml).unwrap_err();
        match err {
            ContractError::ConfigValidation { field, .. } => assert_eq!(field, "map.zoom"),
            other => panic!("unexpected error {other:?}"),
        }
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use chrono::TimeDelta;
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{
        ConversionBlueprint, CoverageGap, GeoService, ResolvedPosition, SessionOutcome,
        SessionStatus, SinkConfig, SinkType, TimingManifest,
    };
    use dashtrack_cli::pipeline::{ingest_session, GPX_FILE};
    use dashtrack_cli::{GeoBackend, Pipeline, PipelineConfig, PipelineStats};
    use dispatcher::artifacts::{CompositePlan, COMPOSITE_FILE, MANIFEST_FILE, REPORT_FILE};
    use geo_client::{MockGeoConfig, MockGeoService};
    use ingestion::{discover_sessions, IngestionMetrics};
    use sync_engine::Synchronizer;

    use crate::fixtures::{base_time, drive, record, recording, SegmentBuilder};

    /// Small rasters and 2 fps keep a run fast
    fn blueprint(output: &Path) -> ConversionBlueprint {
        let mut bp = ConversionBlueprint::default();
        bp.output.dir = output.display().to_string();
        bp.output.frame_rate = 2.0;
        bp.overlay.width = 320;
        bp.overlay.height = 160;
        bp.map.width = 128;
        bp.map.height = 128;
        bp
    }

    async fn run<G>(bp: ConversionBlueprint, inputs: Vec<PathBuf>, geo: G) -> PipelineStats
    where
        G: GeoService + Sync + 'static,
    {
        let config = PipelineConfig {
            blueprint: bp,
            inputs,
        };
        Pipeline::new(config, Arc::new(geo))
            .unwrap()
            .run()
            .await
            .unwrap()
    }

    fn segment(first_second: i64, count: i64) -> Vec<u8> {
        SegmentBuilder::new(count as u64)
            .records(drive(base_time(), first_second, count))
            .build()
    }

    fn png_count(dir: &Path) -> usize {
        fs::read_dir(dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter(|e| e.path().extension().is_some_and(|ext| ext == "png"))
                    .count()
            })
            .unwrap_or(0)
    }

    fn read_manifest(session_dir: &Path) -> TimingManifest {
        let text = fs::read_to_string(session_dir.join(MANIFEST_FILE)).unwrap();
        serde_json::from_str(&text).unwrap()
    }

    fn reasons(outcome: &SessionOutcome) -> &[String] {
        match &outcome.status {
            SessionStatus::Degraded { reasons } => reasons,
            other => panic!("expected degraded, got {other:?}"),
        }
    }

    /// Two front segments plus a rear companion: every artifact is written
    /// and both sequences have the same frame count.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_full_run_writes_all_artifacts() {
        let tmp = tempfile::tempdir().unwrap();
        let folder = recording(
            tmp.path(),
            "trip",
            &[
                ("0001_F.ts", segment(0, 10)),
                ("0002_F.ts", segment(10, 10)),
                ("0001_R.ts", SegmentBuilder::new(10).without_telemetry().build()),
            ],
        )
        .unwrap();
        let out = tmp.path().join("out");

        let stats = run(blueprint(&out), vec![folder], MockGeoService::new()).await;

        let report = &stats.report;
        assert_eq!(report.totals.sessions, 1);
        assert_eq!(report.totals.success, 1);
        let outcome = &report.sessions[0];
        assert_eq!(outcome.session_id, "trip_front");
        assert_eq!(outcome.status, SessionStatus::Success);
        assert_eq!(outcome.samples, 20);
        assert_eq!(outcome.gaps, 0);
        assert_eq!(outcome.overlay_frames, 40);
        assert_eq!(outcome.map_frames, 40);

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(out.join(REPORT_FILE)).unwrap()).unwrap();
        assert_eq!(json["totals"]["success"], 1);
        assert_eq!(json["sessions"][0]["status"], "success");

        let session_dir = out.join("trip_front");
        let manifest = read_manifest(&session_dir);
        assert_eq!(manifest.frame_count, 40);
        assert_eq!(manifest.frames.len(), 40);
        // the last frame falls half a second after the last sample
        assert_eq!(manifest.covered_frames(), 39);
        assert_eq!(manifest.segments.len(), 2);
        assert_eq!(manifest.segments[1].first_frame, 20);
        assert_eq!(manifest.artifacts.overlay.as_deref(), Some("overlay/%06d.png"));
        assert_eq!(manifest.artifacts.map.as_deref(), Some("map/%06d.png"));

        assert_eq!(png_count(&session_dir.join("overlay")), 40);
        assert_eq!(png_count(&session_dir.join("map")), 40);

        let gpx = fs::read_to_string(session_dir.join(GPX_FILE)).unwrap();
        assert_eq!(gpx.matches("<trkpt ").count(), 20);

        let plan: CompositePlan =
            serde_json::from_str(&fs::read_to_string(session_dir.join(COMPOSITE_FILE)).unwrap())
                .unwrap();
        assert_eq!(plan.front.len(), 2);
        assert_eq!(plan.rear.len(), 1);
    }

    /// A segment that is not a transport stream is skipped, the rest of the
    /// session still renders.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_corrupt_segment_degrades_session() {
        let tmp = tempfile::tempdir().unwrap();
        let folder = recording(
            tmp.path(),
            "trip",
            &[("0001_F.ts", segment(0, 10)), ("0002_F.ts", vec![0u8; 4096])],
        )
        .unwrap();
        let out = tmp.path().join("out");

        let stats = run(blueprint(&out), vec![folder], MockGeoService::new()).await;

        let outcome = &stats.report.sessions[0];
        let reasons = reasons(outcome);
        assert!(
            reasons.iter().any(|r| r.contains("segment skipped") && r.contains("0002_F.ts")),
            "{reasons:?}"
        );
        assert_eq!(outcome.samples, 10);
        assert!(outcome.overlay_frames > 0);
        assert_eq!(outcome.overlay_frames, outcome.map_frames);

        let manifest = read_manifest(&out.join(&outcome.session_id));
        assert_eq!(manifest.frame_count, outcome.overlay_frames);
        assert_eq!(manifest.segments.len(), 2);
    }

    /// A session without a single telemetry sample fails but still gets its
    /// composite plan, the other session is unaffected.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_session_without_telemetry_is_isolated() {
        let tmp = tempfile::tempdir().unwrap();
        let good = recording(tmp.path(), "a_trip", &[("0001_F.ts", segment(0, 10))]).unwrap();
        let empty = recording(
            tmp.path(),
            "b_trip",
            &[("0001_F.ts", SegmentBuilder::new(10).build())],
        )
        .unwrap();
        let out = tmp.path().join("out");

        let stats = run(blueprint(&out), vec![good, empty], MockGeoService::new()).await;

        let report = &stats.report;
        assert_eq!(report.totals.sessions, 2);
        assert_eq!(report.totals.success, 1);
        assert_eq!(report.totals.degraded, 0);
        assert_eq!(report.totals.failed, 1);

        let failed = report
            .sessions
            .iter()
            .find(|s| s.session_id == "b_trip_front")
            .unwrap();
        match &failed.status {
            SessionStatus::Failed { reason } => {
                assert!(reason.contains("insufficient telemetry"), "{reason}")
            }
            other => panic!("expected failed, got {other:?}"),
        }
        assert_eq!(failed.samples, 0);
        assert_eq!(failed.overlay_frames, 0);

        let session_dir = out.join("b_trip_front");
        assert!(!session_dir.join("overlay").exists());
        assert!(!session_dir.join(MANIFEST_FILE).exists());
        let plan: CompositePlan =
            serde_json::from_str(&fs::read_to_string(session_dir.join(COMPOSITE_FILE)).unwrap())
                .unwrap();
        assert_eq!(plan.inputs.len(), 1);
        assert_eq!(plan.filter_graph, "[0:v]null[outv]");

        assert_eq!(png_count(&out.join("a_trip_front").join("overlay")), 20);
    }

    /// One sample cannot be interpolated: the session degrades to its
    /// composite plan only.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_single_sample_session_is_video_only() {
        let tmp = tempfile::tempdir().unwrap();
        let lonely = SegmentBuilder::new(10)
            .record(record(base_time(), 45.0, 9.0, 30.0))
            .build();
        let folder = recording(tmp.path(), "trip", &[("0001_F.ts", lonely)]).unwrap();
        let out = tmp.path().join("out");

        let stats = run(blueprint(&out), vec![folder], MockGeoService::new()).await;

        let report = &stats.report;
        assert_eq!(report.totals.sessions, 1);
        assert_eq!(report.totals.degraded, 1);
        assert_eq!(report.totals.failed, 0);

        let outcome = &report.sessions[0];
        let reasons = reasons(outcome);
        assert!(
            reasons.iter().any(|r| r.contains("insufficient telemetry")),
            "{reasons:?}"
        );
        assert_eq!(outcome.overlay_frames, 0);
        assert_eq!(outcome.map_frames, 0);

        let session_dir = out.join(&outcome.session_id);
        assert!(!session_dir.join("overlay").exists());
        let plan: CompositePlan =
            serde_json::from_str(&fs::read_to_string(session_dir.join(COMPOSITE_FILE)).unwrap())
                .unwrap();
        assert_eq!(plan.filter_graph, "[0:v]null[outv]");
    }

    /// No basemap: the overlay is still produced, the map is skipped.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_basemap_failure_degrades_map_only() {
        let tmp = tempfile::tempdir().unwrap();
        let folder = recording(tmp.path(), "trip", &[("0001_F.ts", segment(0, 10))]).unwrap();
        let out = tmp.path().join("out");
        let geo = MockGeoService::with_config(MockGeoConfig {
            fail_basemap: true,
            ..Default::default()
        });

        let stats = run(blueprint(&out), vec![folder], geo).await;

        let outcome = &stats.report.sessions[0];
        let reasons = reasons(outcome);
        assert!(reasons.iter().any(|r| r.starts_with("map skipped")), "{reasons:?}");
        assert_eq!(outcome.overlay_frames, 20);
        assert_eq!(outcome.map_frames, 0);

        let manifest = read_manifest(&out.join("trip_front"));
        assert!(manifest.artifacts.overlay.is_some());
        assert!(manifest.artifacts.map.is_none());
    }

    /// A malformed record between valid ones costs exactly one sample.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_corrupted_record_is_isolated() {
        let tmp = tempfile::tempdir().unwrap();
        let mut records = drive(base_time(), 0, 5);
        records.push(b"Viidure 2025/09/17 10:00:0? N:45.4 E:9.1 1 km/h".to_vec());
        records.extend(drive(base_time(), 5, 5));
        let folder = recording(
            tmp.path(),
            "trip",
            &[("0001_F.ts", SegmentBuilder::new(10).records(records).build())],
        )
        .unwrap();
        let out = tmp.path().join("out");

        let stats = run(blueprint(&out), vec![folder], MockGeoService::new()).await;

        let outcome = &stats.report.sessions[0];
        assert_eq!(outcome.status, SessionStatus::Success);
        assert_eq!(outcome.samples, 10);
        assert_eq!(outcome.skipped_records, 1);
        assert_eq!(stats.ingestion.records_skipped, 1);
    }

    /// Overlapping segments: the repeated timestamp and the older sample are
    /// dropped, ordering stays strict.
    #[test]
    fn test_clock_regression_across_segments() {
        let tmp = tempfile::tempdir().unwrap();
        let start = base_time();
        let mut second = vec![
            record(start + TimeDelta::seconds(9), 45.4651, 9.19, 36.0),
            record(start + TimeDelta::seconds(5), 45.4647, 9.19, 36.0),
        ];
        second.extend(drive(start, 10, 10));
        let folder = recording(
            tmp.path(),
            "trip",
            &[
                ("0001_F.ts", segment(0, 10)),
                ("0002_F.ts", SegmentBuilder::new(12).records(second).build()),
            ],
        )
        .unwrap();

        let sessions = discover_sessions(&[folder]).unwrap();
        let ingested = ingest_session(
            &sessions[0],
            &ConversionBlueprint::default(),
            Arc::new(IngestionMetrics::new()),
        );
        assert!(ingested.segment_failures.is_empty());

        let stitched = ingested.stitched.unwrap();
        assert_eq!(stitched.report.input_samples, 22);
        assert_eq!(stitched.report.duplicates, 1);
        assert_eq!(stitched.report.regressions, 1);
        assert_eq!(stitched.report.accepted, 20);

        let samples = stitched.track.samples();
        assert!(samples.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert_eq!(stitched.track.segments().count(), 2);
    }

    /// Between two samples ten seconds apart the position is interpolated
    /// linearly under the default configuration; with a tighter gap threshold
    /// the same instant has no coverage.
    #[test]
    fn test_sync_interpolates_between_samples() {
        let tmp = tempfile::tempdir().unwrap();
        let start = base_time();
        let records = [
            record(start, 45.0, 9.19, 10.0),
            record(start + TimeDelta::seconds(10), 45.001, 9.19, 20.0),
        ];
        let folder = recording(
            tmp.path(),
            "trip",
            &[(
                "0001_F.ts",
                SegmentBuilder::new(10)
                    .record(records[0].clone())
                    .records(std::iter::repeat_n(Vec::new(), 9))
                    .record(records[1].clone())
                    .build(),
            )],
        )
        .unwrap();
        let sessions = discover_sessions(&[folder]).unwrap();

        let stitched = ingest_session(
            &sessions[0],
            &ConversionBlueprint::default(),
            Arc::new(IngestionMetrics::new()),
        )
        .stitched
        .unwrap();
        assert_eq!(stitched.report.gaps, 0);
        let sync = Synchronizer::new(Arc::new(stitched.track));

        match sync.resolve(start + TimeDelta::seconds(5)) {
            ResolvedPosition::Interpolated(fix) => {
                assert!((fix.sample.speed - 15.0).abs() < 1e-9);
                assert!((fix.sample.latitude - 45.0005).abs() < 1e-9);
            }
            other => panic!("expected interpolation, got {other:?}"),
        }
        assert!(matches!(
            sync.resolve(start - TimeDelta::seconds(1)),
            ResolvedPosition::NoCoverage(CoverageGap::BeforeStart)
        ));

        let mut bp = ConversionBlueprint::default();
        bp.stitch.gap_threshold_s = 5.0;
        let stitched = ingest_session(&sessions[0], &bp, Arc::new(IngestionMetrics::new()))
            .stitched
            .unwrap();
        assert_eq!(stitched.report.gaps, 1);
        let sync = Synchronizer::new(Arc::new(stitched.track));
        assert!(matches!(
            sync.resolve(start + TimeDelta::seconds(5)),
            ResolvedPosition::NoCoverage(CoverageGap::InGap { .. })
        ));
    }

    /// A TOML configuration with the map disabled and a log sink only.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_config_file_drives_pipeline() {
        let tmp = tempfile::tempdir().unwrap();
        let folder = recording(tmp.path(), "trip", &[("0001_F.ts", segment(0, 10))]).unwrap();
        let out = tmp.path().join("out");

        let text = r#"
            [output]
            frame_rate = 1.0
            composite_plan = false

            [overlay]
            width = 160
            height = 80
            variant = "compact"

            [map]
            enabled = false

            [[sinks]]
            name = "console"
            sink_type = "log"
        "#;
        let mut bp = ConfigLoader::load_from_str(text, ConfigFormat::Toml).unwrap();
        bp.output.dir = out.display().to_string();
        assert_eq!(bp.effective_sinks()[0].sink_type, SinkType::Log);

        let stats = run(bp, vec![folder], MockGeoService::new()).await;

        let outcome = &stats.report.sessions[0];
        assert_eq!(outcome.status, SessionStatus::Success);
        assert_eq!(outcome.overlay_frames, 10);
        assert_eq!(outcome.map_frames, 0);

        let session_dir = out.join("trip_front");
        let manifest = read_manifest(&session_dir);
        assert_eq!(manifest.frame_count, 10);
        assert_eq!(manifest.artifacts, Default::default());
        assert!(!session_dir.join("overlay").exists());
        assert!(!session_dir.join(COMPOSITE_FILE).exists());
        assert!(session_dir.join(GPX_FILE).exists());
    }

    /// The offline backend renders the map from placeholder tiles.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_offline_backend() {
        let tmp = tempfile::tempdir().unwrap();
        let folder = recording(tmp.path(), "trip", &[("0001_F.ts", segment(0, 10))]).unwrap();
        let out = tmp.path().join("out");
        let mut bp = blueprint(&out);
        bp.geo.offline = true;
        bp.sinks = vec![SinkConfig::png("frames")];

        let geo = GeoBackend::from_config(&bp.geo).unwrap();
        assert!(matches!(geo, GeoBackend::Offline(_)));
        let stats = run(bp, vec![folder], geo).await;

        let outcome = &stats.report.sessions[0];
        assert_eq!(outcome.status, SessionStatus::Success);
        assert_eq!(outcome.map_frames, 20);
        assert_eq!(png_count(&out.join("trip_front").join("map")), 20);
    }
}
