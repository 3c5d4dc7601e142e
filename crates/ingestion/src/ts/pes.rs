//! PES headers, timestamps and reassembly

use crate::error::{IngestionError, Result};

/// 90 kHz PES clock
pub const PES_CLOCK_RATE: u64 = 90_000;

const TIMESTAMP_MASK: u64 = 0x1_FFFF_FFFF;

/// Parse a 33-bit PTS/DTS from its 5-byte marker-bit encoding
pub fn parse_timestamp(data: &[u8]) -> Result<u64> {
    if data.len() < 5 {
        return Err(IngestionError::invalid_pes("timestamp requires 5 bytes"));
    }
    Ok(((u64::from(data[0]) & 0x0E) << 29)
        | (u64::from(data[1]) << 22)
        | ((u64::from(data[2]) & 0xFE) << 14)
        | (u64::from(data[3]) << 7)
        | (u64::from(data[4]) >> 1))
}

/// Forward distance between two 33-bit timestamps, None when `later` precedes `earlier`
pub fn timestamp_delta(earlier: u64, later: u64) -> Option<u64> {
    let delta = later.wrapping_sub(earlier) & TIMESTAMP_MASK;
    (delta < TIMESTAMP_MASK / 2).then_some(delta)
}

/// Stream ids without the optional PES header
fn has_optional_header(stream_id: u8) -> bool {
    !matches!(stream_id, 0xBC | 0xBE | 0xBF | 0xF0 | 0xF1 | 0xF2 | 0xF8 | 0xFF)
}

/// Parsed PES header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PesHeader {
    pub stream_id: u8,
    /// 0 for unbounded packets
    pub packet_length: u16,
    pub pts: Option<u64>,
    /// Bytes before the payload, start code included
    pub header_size: usize,
}

impl PesHeader {
    pub const MIN_SIZE: usize = 6;

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::MIN_SIZE {
            return Err(IngestionError::invalid_pes("data too short for PES header"));
        }
        if data[..3] != [0x00, 0x00, 0x01] {
            return Err(IngestionError::invalid_pes("missing start code"));
        }

        let stream_id = data[3];
        let packet_length = u16::from_be_bytes([data[4], data[5]]);

        if !has_optional_header(stream_id) {
            return Ok(Self {
                stream_id,
                packet_length,
                pts: None,
                header_size: Self::MIN_SIZE,
            });
        }

        if data.len() < 9 || data[6] & 0xC0 != 0x80 {
            return Err(IngestionError::invalid_pes("malformed optional header"));
        }
        let pts_dts_flags = (data[7] >> 6) & 0x03;
        let header_size = 9 + usize::from(data[8]);
        if header_size > data.len() {
            return Err(IngestionError::invalid_pes("header overruns data"));
        }
        let pts = if pts_dts_flags & 0x02 != 0 {
            Some(parse_timestamp(&data[9..])?)
        } else {
            None
        };

        Ok(Self {
            stream_id,
            packet_length,
            pts,
            header_size,
        })
    }
}

/// Collects one PID's payloads into complete PES packets, split on PUSI
#[derive(Debug, Default)]
pub struct PesAssembler {
    buffer: Vec<u8>,
    started: bool,
}

impl PesAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one packet payload; returns the previous PES when a new one starts
    pub fn push(&mut self, payload: &[u8], pusi: bool) -> Option<Vec<u8>> {
        let mut completed = None;
        if pusi {
            if self.started && !self.buffer.is_empty() {
                completed = Some(std::mem::take(&mut self.buffer));
            }
            self.started = true;
        }
        // continuation bytes before the first start are unusable
        if self.started {
            self.buffer.extend_from_slice(payload);
        }
        completed
    }

    /// Take the trailing PES at end of stream
    pub fn flush(&mut self) -> Option<Vec<u8>> {
        self.started = false;
        (!self.buffer.is_empty()).then(|| std::mem::take(&mut self.buffer))
    }
}

/// Payload bytes of a complete PES packet
///
/// Bounded packets are cut to their declared length; trailing stuffing of the
/// last transport packet is dropped that way.
pub fn pes_payload(pes: &[u8]) -> Result<&[u8]> {
    let header = PesHeader::parse(pes)?;
    let end = if header.packet_length == 0 {
        pes.len()
    } else {
        (PesHeader::MIN_SIZE + usize::from(header.packet_length)).min(pes.len())
    };
    Ok(pes.get(header.header_size..end).unwrap_or_default())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn encode_timestamp(value: u64) -> [u8; 5] {
        [
            0x20 | ((((value >> 30) as u8) & 0x07) << 1) | 0x01,
            ((value >> 22) & 0xFF) as u8,
            ((((value >> 15) & 0x7F) << 1) as u8) | 0x01,
            ((value >> 7) & 0xFF) as u8,
            (((value & 0x7F) << 1) as u8) | 0x01,
        ]
    }

    /// Private stream 1 PES carrying `payload`
    pub(crate) fn private_pes(payload: &[u8]) -> Vec<u8> {
        let length = 3 + payload.len();
        let mut pes = vec![0x00, 0x00, 0x01, 0xBD, (length >> 8) as u8, length as u8];
        pes.extend_from_slice(&[0x80, 0x00, 0x00]);
        pes.extend_from_slice(payload);
        pes
    }

    /// Unbounded video PES header with a PTS
    pub(crate) fn video_pes(pts: u64) -> Vec<u8> {
        let mut pes = vec![0x00, 0x00, 0x01, 0xE0, 0x00, 0x00, 0x80, 0x80, 0x05];
        pes.extend_from_slice(&encode_timestamp(pts));
        pes.extend_from_slice(&[0x00, 0x00, 0x00, 0x01, 0x09]);
        pes
    }

    #[test]
    fn timestamp_parse() {
        for value in [0u64, 90_000, 0x1_2345_6789 & TIMESTAMP_MASK, TIMESTAMP_MASK] {
            assert_eq!(parse_timestamp(&encode_timestamp(value)).unwrap(), value);
        }
        assert!(parse_timestamp(&[0x21, 0x00]).is_err());
    }

    #[test]
    fn timestamp_delta_wraps() {
        assert_eq!(timestamp_delta(100, 190), Some(90));
        assert_eq!(timestamp_delta(TIMESTAMP_MASK - 9, 10), Some(20));
        assert_eq!(timestamp_delta(190, 100), None);
    }

    #[test]
    fn header_with_pts() {
        let header = PesHeader::parse(&video_pes(180_000)).unwrap();
        assert_eq!(header.stream_id, 0xE0);
        assert_eq!(header.pts, Some(180_000));
        assert_eq!(header.header_size, 14);
    }

    #[test]
    fn header_without_optional_fields() {
        let data = [0x00, 0x00, 0x01, 0xBF, 0x00, 0x03, b'a', b'b', b'c'];
        let header = PesHeader::parse(&data).unwrap();
        assert_eq!(header.header_size, 6);
        assert_eq!(pes_payload(&data).unwrap(), b"abc");
    }

    #[test]
    fn payload_cut_to_declared_length() {
        let mut pes = private_pes(b"Viidure");
        pes.extend_from_slice(&[0xFF; 20]);
        assert_eq!(pes_payload(&pes).unwrap(), b"Viidure");
        assert!(pes_payload(b"\x00\x00\x02\xBD\x00\x00").is_err());
    }

    #[test]
    fn assembler_splits_on_unit_start() {
        let mut asm = PesAssembler::new();
        assert_eq!(asm.push(b"orphan", false), None);
        assert_eq!(asm.push(b"ab", true), None);
        assert_eq!(asm.push(b"cd", false), None);
        assert_eq!(asm.push(b"ef", true), Some(b"abcd".to_vec()));
        assert_eq!(asm.flush(), Some(b"ef".to_vec()));
        assert_eq!(asm.flush(), None);
    }
}
