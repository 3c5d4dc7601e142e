//! 合成 MPEG-TS 分段与 Viidure 遥测记录
//!
//! 分段布局：PAT、PMT (视频 / 音频 / 数据)，每秒一个带 PTS 的视频 PES，
//! 每条记录一个私有流 PES。

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

const TS_PACKET_SIZE: usize = 188;
const SYNC_BYTE: u8 = 0x47;
const CLOCK_RATE: u64 = 90_000;

pub const PMT_PID: u16 = 0x1000;
pub const VIDEO_PID: u16 = 0x0100;
pub const AUDIO_PID: u16 = 0x0101;
pub const DATA_PID: u16 = 0x0102;

/// 2025-09-17 10:00:00 本地时间
pub fn base_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 9, 17)
        .and_then(|d| d.and_hms_opt(10, 0, 0))
        .expect("valid fixture time")
}

/// 一条完整的 Viidure 记录
pub fn record(at: NaiveDateTime, lat: f64, lon: f64, speed_kmh: f64) -> Vec<u8> {
    let ns = if lat < 0.0 { 'S' } else { 'N' };
    let ew = if lon < 0.0 { 'W' } else { 'E' };
    format!(
        "Viidure {} {ns}:{:.5} {ew}:{:.5} {speed_kmh:.1} km/h 0.9 120.0 9 x:0.01 y:-0.02 z:0.98",
        at.format("%Y/%m/%d %H:%M:%S"),
        lat.abs(),
        lon.abs(),
    )
    .into_bytes()
}

/// `count` 条每秒一次的记录，从 `start` 起向北行驶
pub fn drive(start: NaiveDateTime, first_second: i64, count: i64) -> Vec<Vec<u8>> {
    (first_second..first_second + count)
        .map(|s| {
            record(
                start + TimeDelta::seconds(s),
                45.4642 + s as f64 * 0.0001,
                9.1900,
                36.0,
            )
        })
        .collect()
}

/// Builder for one synthetic segment file
#[derive(Debug, Clone, Default)]
pub struct SegmentBuilder {
    records: Vec<Vec<u8>>,
    seconds: u64,
    telemetry_stream: bool,
}

impl SegmentBuilder {
    /// `seconds` of video, telemetry stream declared
    pub fn new(seconds: u64) -> Self {
        Self {
            records: Vec::new(),
            seconds,
            telemetry_stream: true,
        }
    }

    pub fn records(mut self, records: impl IntoIterator<Item = Vec<u8>>) -> Self {
        self.records.extend(records);
        self
    }

    pub fn record(mut self, record: impl Into<Vec<u8>>) -> Self {
        self.records.push(record.into());
        self
    }

    /// Video and audio only, as on a rear camera without GPS
    pub fn without_telemetry(mut self) -> Self {
        self.telemetry_stream = false;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut streams = vec![(0x1B, VIDEO_PID), (0x0F, AUDIO_PID)];
        if self.telemetry_stream {
            streams.push((0x06, DATA_PID));
        }
        let mut pat_payload = vec![0u8];
        pat_payload.extend(pat(PMT_PID));
        let mut pmt_payload = vec![0u8];
        pmt_payload.extend(pmt(&streams));

        let (mut cc_pat, mut cc_pmt, mut cc_video, mut cc_data) = (0, 0, 0, 0);
        let mut out = packetize(0, &pat_payload, &mut cc_pat);
        out.extend(packetize(PMT_PID, &pmt_payload, &mut cc_pmt));
        for second in 0..=self.seconds {
            out.extend(packetize(
                VIDEO_PID,
                &video_pes(1_000 + second * CLOCK_RATE),
                &mut cc_video,
            ));
            if !self.telemetry_stream {
                continue;
            }
            if let Some(record) = self.records.get(second as usize) {
                out.extend(packetize(DATA_PID, &private_pes(record), &mut cc_data));
            }
        }
        if self.telemetry_stream {
            for record in self.records.iter().skip(self.seconds as usize + 1) {
                out.extend(packetize(DATA_PID, &private_pes(record), &mut cc_data));
            }
        }
        out
    }

    pub fn write_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.build())
    }
}

/// Write `files` under `root/folder` and return the folder
pub fn recording(root: &Path, folder: &str, files: &[(&str, Vec<u8>)]) -> io::Result<PathBuf> {
    let dir = root.join(folder);
    fs::create_dir_all(&dir)?;
    for (name, bytes) in files {
        fs::write(dir.join(name), bytes)?;
    }
    Ok(dir)
}

fn packetize(pid: u16, data: &[u8], cc: &mut u8) -> Vec<u8> {
    let mut out = Vec::new();
    for (i, chunk) in data.chunks(TS_PACKET_SIZE - 4).enumerate() {
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
                packet.extend(std::iter::repeat_n(0xFF, stuffing - 2));
            }
        }
        packet.extend_from_slice(chunk);
        out.extend(packet);
        *cc = cc.wrapping_add(1) & 0x0F;
    }
    out
}

fn section(table_id: u8, id: u16, body: &[u8]) -> Vec<u8> {
    let section_length = 5 + body.len() + 4;
    let mut out = vec![
        table_id,
        0xB0 | ((section_length >> 8) as u8 & 0x0F),
        section_length as u8,
    ];
    out.extend_from_slice(&id.to_be_bytes());
    out.extend_from_slice(&[0xC1, 0x00, 0x00]);
    out.extend_from_slice(body);
    // CRC is not checked by the reader
    out.extend_from_slice(&[0, 0, 0, 0]);
    out
}

fn pat(pmt_pid: u16) -> Vec<u8> {
    let body = [0x00, 0x01, 0xE0 | (pmt_pid >> 8) as u8, pmt_pid as u8];
    section(0x00, 1, &body)
}

fn pmt(streams: &[(u8, u16)]) -> Vec<u8> {
    let pcr = streams.first().map_or(0x1FFF, |s| s.1);
    let mut body = vec![0xE0 | (pcr >> 8) as u8, pcr as u8, 0xF0, 0x00];
    for &(stream_type, pid) in streams {
        body.extend_from_slice(&[stream_type, 0xE0 | (pid >> 8) as u8, pid as u8, 0xF0, 0x00]);
    }
    section(0x02, 1, &body)
}

fn encode_timestamp(value: u64) -> [u8; 5] {
    [
        0x20 | ((((value >> 30) as u8) & 0x07) << 1) | 0x01,
        ((value >> 22) & 0xFF) as u8,
        ((((value >> 15) & 0x7F) << 1) as u8) | 0x01,
        ((value >> 7) & 0xFF) as u8,
        (((value & 0x7F) << 1) as u8) | 0x01,
    ]
}

fn private_pes(payload: &[u8]) -> Vec<u8> {
    let length = 3 + payload.len();
    let mut pes = vec![0x00, 0x00, 0x01, 0xBD, (length >> 8) as u8, length as u8];
    pes.extend_from_slice(&[0x80, 0x00, 0x00]);
    pes.extend_from_slice(payload);
    pes
}

fn video_pes(pts: u64) -> Vec<u8> {
    let mut pes = vec![0x00, 0x00, 0x01, 0xE0, 0x00, 0x00, 0x80, 0x80, 0x05];
    pes.extend_from_slice(&encode_timestamp(pts));
    pes.extend_from_slice(&[0x00, 0x00, 0x00, 0x01, 0x09]);
    pes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_is_packet_aligned() {
        let data = SegmentBuilder::new(3).records(drive(base_time(), 0, 3)).build();
        assert_eq!(data.len() % TS_PACKET_SIZE, 0);
        assert!(data.chunks(TS_PACKET_SIZE).all(|p| p[0] == SYNC_BYTE));
    }

    #[test]
    fn record_hemispheres() {
        let text = String::from_utf8(record(base_time(), -33.4, -70.6, 12.0)).unwrap();
        assert!(text.contains("S:33.40000 W:70.60000"), "{text}");
        assert!(text.starts_with("Viidure 2025/09/17 10:00:00"));
    }
}
