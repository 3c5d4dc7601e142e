//! Telemetry stream extractor
//!
//! Two passes over a segment: the first locates the PAT and the PMT, the
//! second reassembles the telemetry PES packets in container order and
//! measures the video PTS span.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::sync::Arc;

use bytes::Bytes;
use contracts::{ContractError, RawTelemetryChunk, SegmentRef, StreamSelector};
use tracing::{debug, instrument, warn};

use crate::config::{ExtractorConfig, IngestionMetrics};
use crate::error::Result;
use crate::ts::{
    pes, psi, PacketReader, PesAssembler, PesHeader, ProgramMap, TsPacket, PES_CLOCK_RATE,
    PID_PAT,
};

/// Per-segment extraction statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractStats {
    pub packets: u64,
    pub resync_bytes: u64,
    pub continuity_errors: u64,
    pub pes_packets: u64,
    pub pes_errors: u64,
    pub telemetry_pid: u16,
}

/// Extractor output for one segment
#[derive(Debug, Clone)]
pub struct ExtractedSegment {
    pub chunk: RawTelemetryChunk,

    /// Video PTS span in seconds, None without video timestamps
    pub media_duration_s: Option<f64>,

    pub stats: ExtractStats,
}

/// Pulls the telemetry elementary stream out of transport-stream segments
#[derive(Debug, Clone)]
pub struct TelemetryExtractor {
    config: ExtractorConfig,
    metrics: Arc<IngestionMetrics>,
}

impl TelemetryExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self::with_metrics(config, Arc::new(IngestionMetrics::new()))
    }

    pub fn with_metrics(config: ExtractorConfig, metrics: Arc<IngestionMetrics>) -> Self {
        Self { config, metrics }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<IngestionMetrics> {
        &self.metrics
    }

    /// Extract the telemetry chunk of one segment file
    ///
    /// # Errors
    /// - `ContainerCorrupt` when no packets or no program map can be found
    /// - `StreamNotFound` when the selector matches no elementary stream
    /// - `Io` on read failures
    #[instrument(
        name = "extract_segment",
        skip(self, segment),
        fields(segment = %segment.file_name, sequence = segment.sequence)
    )]
    pub fn extract(&self, segment: &SegmentRef) -> std::result::Result<ExtractedSegment, ContractError> {
        let result = File::open(&segment.path)
            .map_err(ContractError::from)
            .and_then(|file| {
                self.extract_from(BufReader::new(file), segment.sequence, &segment.file_name)
            });

        match &result {
            Ok(extracted) => {
                let stats = &extracted.stats;
                self.metrics
                    .record_extracted(stats.packets, stats.resync_bytes, stats.continuity_errors);
                metrics::counter!("dashtrack_segments_total", "status" => "ok").increment(1);
                debug!(
                    bytes = extracted.chunk.bytes.len(),
                    packets = stats.packets,
                    pid = stats.telemetry_pid,
                    "telemetry stream extracted"
                );
            }
            Err(e) => {
                self.metrics.record_failed();
                metrics::counter!("dashtrack_segments_total", "status" => "failed").increment(1);
                warn!(error = %e, "segment extraction failed");
            }
        }
        result
    }

    /// Extract from any seekable reader
    pub fn extract_from<R: Read + Seek>(
        &self,
        reader: R,
        sequence: u32,
        file_name: &str,
    ) -> std::result::Result<ExtractedSegment, ContractError> {
        let mut packets = PacketReader::new(reader);
        let program = probe_program(&mut packets).map_err(|e| e.into_contract(file_name))?;
        if packets.packets() == 0 {
            return Err(ContractError::container_corrupt(
                file_name,
                "no transport packets found",
            ));
        }
        let program = program.ok_or_else(|| {
            ContractError::container_corrupt(file_name, "no program map table found")
        })?;

        let telemetry_pid = select_stream(&program, self.config.selector)
            .ok_or_else(|| ContractError::stream_not_found(file_name, self.config.selector.to_string()))?;
        let video_pid = program.first_video().map(|s| s.pid);

        let mut inner = packets.into_inner();
        inner.seek(SeekFrom::Start(0))?;
        let collected = collect_stream(PacketReader::new(inner), telemetry_pid, video_pid)
            .map_err(|e| e.into_contract(file_name))?;

        Ok(ExtractedSegment {
            chunk: RawTelemetryChunk {
                sequence,
                source_file: file_name.to_string(),
                bytes: Bytes::from(collected.payload),
            },
            media_duration_s: collected.media_duration_s,
            stats: collected.stats,
        })
    }
}

/// Resolve the telemetry PID from the selector
fn select_stream(program: &ProgramMap, selector: StreamSelector) -> Option<u16> {
    match selector {
        StreamSelector::Ordinal(index) => program.streams.get(index).map(|s| s.pid),
        StreamSelector::Pid(pid) => program.contains(pid).then_some(pid),
    }
}

/// First pass: PAT then PMT of the first program
fn probe_program<R: Read>(reader: &mut PacketReader<R>) -> Result<Option<ProgramMap>> {
    let mut pmt_pid = None;
    while let Some(raw) = reader.next_packet()? {
        let Ok(packet) = TsPacket::parse(raw) else {
            continue;
        };
        if !packet.pusi || packet.transport_error {
            continue;
        }

        if pmt_pid.is_none() && packet.pid == PID_PAT {
            match psi::section_from_payload(packet.payload()).and_then(psi::parse_pat) {
                Ok(programs) => pmt_pid = programs.first().map(|p| p.pmt_pid),
                Err(e) => debug!(error = %e, "skipping unreadable PAT"),
            }
        } else if pmt_pid == Some(packet.pid) {
            match psi::section_from_payload(packet.payload()).and_then(psi::parse_pmt) {
                Ok(program) => return Ok(Some(program)),
                Err(e) => debug!(error = %e, "skipping unreadable PMT"),
            }
        }
    }
    Ok(None)
}

struct Collected {
    payload: Vec<u8>,
    media_duration_s: Option<f64>,
    stats: ExtractStats,
}

/// Second pass: telemetry payload in container order plus video PTS span
fn collect_stream<R: Read>(
    mut reader: PacketReader<R>,
    telemetry_pid: u16,
    video_pid: Option<u16>,
) -> Result<Collected> {
    let mut stats = ExtractStats {
        telemetry_pid,
        ..Default::default()
    };
    let mut assembler = PesAssembler::new();
    let mut payload = Vec::new();
    let mut last_cc: Option<u8> = None;
    let mut first_pts: Option<u64> = None;
    let mut max_pts_offset = 0u64;

    while let Some(raw) = reader.next_packet()? {
        let Ok(packet) = TsPacket::parse(raw) else {
            continue;
        };
        if packet.transport_error {
            continue;
        }

        if packet.pid == telemetry_pid {
            if !packet.has_payload {
                continue;
            }
            if let Some(last) = last_cc {
                if packet.continuity_counter == last {
                    // duplicate packet
                    continue;
                }
                if packet.continuity_counter != (last + 1) & 0x0F {
                    stats.continuity_errors += 1;
                }
            }
            last_cc = Some(packet.continuity_counter);

            if let Some(pes) = assembler.push(packet.payload(), packet.pusi) {
                append_pes(&pes, &mut payload, &mut stats);
            }
        } else if Some(packet.pid) == video_pid && packet.pusi {
            if let Some(pts) = PesHeader::parse(packet.payload()).ok().and_then(|h| h.pts) {
                match first_pts {
                    None => first_pts = Some(pts),
                    Some(first) => {
                        if let Some(offset) = pes::timestamp_delta(first, pts) {
                            max_pts_offset = max_pts_offset.max(offset);
                        }
                    }
                }
            }
        }
    }
    if let Some(pes) = assembler.flush() {
        append_pes(&pes, &mut payload, &mut stats);
    }

    stats.packets = reader.packets();
    stats.resync_bytes = reader.skipped_bytes();

    let media_duration_s = (first_pts.is_some() && max_pts_offset > 0)
        .then(|| max_pts_offset as f64 / PES_CLOCK_RATE as f64);

    Ok(Collected {
        payload,
        media_duration_s,
        stats,
    })
}

fn append_pes(pes: &[u8], out: &mut Vec<u8>, stats: &mut ExtractStats) {
    match pes::pes_payload(pes) {
        Ok(bytes) => {
            out.extend_from_slice(bytes);
            stats.pes_packets += 1;
        }
        Err(e) => {
            stats.pes_errors += 1;
            debug!(error = %e, "dropping malformed telemetry PES");
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ts::pes::tests::{private_pes, video_pes};
    use crate::ts::psi::tests::{pat, pmt};
    use crate::ts::{SYNC_BYTE, TS_PACKET_SIZE};
    use std::io::Cursor;

    pub(crate) const PMT_PID: u16 = 0x1000;
    pub(crate) const VIDEO_PID: u16 = 0x0100;
    pub(crate) const AUDIO_PID: u16 = 0x0101;
    pub(crate) const DATA_PID: u16 = 0x0102;

    /// Packetize `data` on `pid`, stuffing the last packet through the adaptation field
    pub(crate) fn packetize(pid: u16, data: &[u8], cc: &mut u8) -> Vec<u8> {
        let mut out = Vec::new();
        let chunks: Vec<&[u8]> = data.chunks(TS_PACKET_SIZE - 4).collect();
        for (i, chunk) in chunks.iter().enumerate() {
            let mut packet = vec![SYNC_BYTE, (pid >> 8) as u8 & 0x1F, pid as u8];
            if i == 0 {
                packet[1] |= 0x40;
            }
            let stuffing = TS_PACKET_SIZE - 4 - chunk.len();
            if stuffing == 0 {
                packet.push(0x10 | (*cc & 0x0F));
            } else {
                packet.push(0x30 | (*cc & 0x0F));
                packet.push((stuffing - 1) as u8);
                if stuffing > 1 {
                    packet.push(0x00);
                    packet.extend(std::iter::repeat(0xFF).take(stuffing - 2));
                }
            }
            packet.extend_from_slice(chunk);
            assert_eq!(packet.len(), TS_PACKET_SIZE);
            out.extend(packet);
            *cc = cc.wrapping_add(1) & 0x0F;
        }
        out
    }

    /// A segment with PAT, PMT (video, audio, data), video PTS every second
    /// and one telemetry PES per record.
    pub(crate) fn build_segment(records: &[&[u8]], seconds: u64) -> Vec<u8> {
        let mut psi_payload = vec![0u8];
        psi_payload.extend(pat(PMT_PID));
        let mut pmt_payload = vec![0u8];
        pmt_payload.extend(pmt(&[(0x1B, VIDEO_PID), (0x0F, AUDIO_PID), (0x06, DATA_PID)]));

        let (mut cc_pat, mut cc_pmt, mut cc_video, mut cc_data) = (0, 0, 0, 0);
        let mut out = packetize(0, &psi_payload, &mut cc_pat);
        out.extend(packetize(PMT_PID, &pmt_payload, &mut cc_pmt));
        for second in 0..=seconds {
            out.extend(packetize(VIDEO_PID, &video_pes(1_000 + second * PES_CLOCK_RATE), &mut cc_video));
            if let Some(record) = records.get(second as usize) {
                out.extend(packetize(DATA_PID, &private_pes(record), &mut cc_data));
            }
        }
        for record in records.iter().skip(seconds as usize + 1) {
            out.extend(packetize(DATA_PID, &private_pes(record), &mut cc_data));
        }
        out
    }

    fn extractor() -> TelemetryExtractor {
        TelemetryExtractor::new(ExtractorConfig::default())
    }

    #[test]
    fn extracts_telemetry_in_order() {
        let long = vec![b'L'; 400];
        let records: [&[u8]; 3] = [b"Viidure one\0", &long, b"Viidure three\0"];
        let data = build_segment(&records, 2);

        let extracted = extractor()
            .extract_from(Cursor::new(data), 3, "0003_F.ts")
            .unwrap();
        let mut expected = b"Viidure one\0".to_vec();
        expected.extend(&long);
        expected.extend(b"Viidure three\0");
        assert_eq!(extracted.chunk.bytes.as_ref(), expected.as_slice());
        assert_eq!(extracted.chunk.sequence, 3);
        assert_eq!(extracted.chunk.source_file, "0003_F.ts");
        assert_eq!(extracted.stats.telemetry_pid, DATA_PID);
        assert_eq!(extracted.stats.pes_packets, 3);
        assert_eq!(extracted.stats.continuity_errors, 0);
        assert_eq!(extracted.media_duration_s, Some(2.0));
    }

    #[test]
    fn survives_garbage_between_packets() {
        let mut data = vec![0x00, 0x01, 0x02];
        data.extend(build_segment(&[b"Viidure a\0"], 1));
        let extracted = extractor()
            .extract_from(Cursor::new(data), 0, "x_F.ts")
            .unwrap();
        assert_eq!(extracted.chunk.bytes.as_ref(), b"Viidure a\0");
        assert_eq!(extracted.stats.resync_bytes, 3);
    }

    #[test]
    fn select_by_pid() {
        let data = build_segment(&[b"Viidure a\0"], 0);
        let config = ExtractorConfig {
            selector: StreamSelector::Pid(DATA_PID),
            ..Default::default()
        };
        let extracted = TelemetryExtractor::new(config)
            .extract_from(Cursor::new(data), 0, "x_F.ts")
            .unwrap();
        assert_eq!(extracted.chunk.bytes.as_ref(), b"Viidure a\0");
    }

    #[test]
    fn missing_stream_is_reported() {
        let data = build_segment(&[], 0);
        let config = ExtractorConfig {
            selector: StreamSelector::Ordinal(5),
            ..Default::default()
        };
        let err = TelemetryExtractor::new(config)
            .extract_from(Cursor::new(data), 0, "x_F.ts")
            .unwrap_err();
        assert!(matches!(err, ContractError::StreamNotFound { .. }));
        assert!(err.is_segment_local());
    }

    #[test]
    fn garbage_file_is_corrupt() {
        let err = extractor()
            .extract_from(Cursor::new(vec![0u8; 4096]), 0, "x_F.ts")
            .unwrap_err();
        assert!(matches!(err, ContractError::ContainerCorrupt { .. }), "{err}");

        let mut cc = 0;
        let only_video = packetize(VIDEO_PID, &video_pes(0), &mut cc);
        let err = extractor()
            .extract_from(Cursor::new(only_video), 0, "x_F.ts")
            .unwrap_err();
        assert!(err.to_string().contains("program map"), "{err}");
    }

    #[test]
    fn counts_continuity_errors() {
        let mut data = build_segment(&[b"Viidure a\0", b"Viidure b\0", b"Viidure c\0"], 2);
        // drop the middle telemetry packet
        let packets: Vec<Vec<u8>> = data.chunks(TS_PACKET_SIZE).map(<[u8]>::to_vec).collect();
        let data_packets: Vec<usize> = packets
            .iter()
            .enumerate()
            .filter(|(_, p)| TsPacket::parse(p).map(|p| p.pid).ok() == Some(DATA_PID))
            .map(|(i, _)| i)
            .collect();
        data = packets
            .into_iter()
            .enumerate()
            .filter(|(i, _)| *i != data_packets[1])
            .flat_map(|(_, p)| p)
            .collect();

        let extracted = extractor()
            .extract_from(Cursor::new(data), 0, "x_F.ts")
            .unwrap();
        assert_eq!(extracted.stats.continuity_errors, 1);
        assert_eq!(extracted.chunk.bytes.as_ref(), b"Viidure a\0Viidure c\0");
    }

    #[test]
    fn extract_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0001_F.ts");
        std::fs::write(&path, build_segment(&[b"Viidure a\0"], 0)).unwrap();
        let segment = SegmentRef {
            path,
            file_name: "0001_F.ts".into(),
            role: contracts::CameraRole::Front,
            sequence: 0,
        };
        let ex = extractor();
        let extracted = ex.extract(&segment).unwrap();
        assert_eq!(extracted.chunk.bytes.len(), 10);
        assert_eq!(ex.metrics().snapshot().segments_extracted, 1);
    }
}
