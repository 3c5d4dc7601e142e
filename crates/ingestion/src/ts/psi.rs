//! PAT / PMT sections
//!
//! Only what is needed to map a program to its elementary stream PIDs.
//! Sections are expected to fit in one packet, which holds for camera muxers.

use crate::error::{IngestionError, Result};

const TABLE_ID_PAT: u8 = 0x00;
const TABLE_ID_PMT: u8 = 0x02;

/// Strip the pointer field from a section-starting payload
pub fn section_from_payload(payload: &[u8]) -> Result<&[u8]> {
    let pointer = *payload
        .first()
        .ok_or_else(|| IngestionError::invalid_section("empty PSI payload"))?;
    let start = 1 + usize::from(pointer);
    payload
        .get(start..)
        .ok_or_else(|| IngestionError::invalid_section("pointer field overruns payload"))
}

/// Header fields shared by long-form sections, returning the body without CRC
fn section_body(section: &[u8], table_id: u8) -> Result<&[u8]> {
    if section.len() < 3 {
        return Err(IngestionError::invalid_section("section shorter than header"));
    }
    if section[0] != table_id {
        return Err(IngestionError::invalid_section(format!(
            "expected table id 0x{table_id:02x}, got 0x{:02x}",
            section[0]
        )));
    }
    let section_length = (usize::from(section[1] & 0x0F) << 8) | usize::from(section[2]);
    let end = 3 + section_length;
    if section_length < 9 || end > section.len() {
        return Err(IngestionError::invalid_section(format!(
            "section length {section_length} does not fit"
        )));
    }
    // table header (5 bytes after length) .. CRC32
    Ok(&section[8..end - 4])
}

/// One program listed in the PAT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatEntry {
    pub program_number: u16,
    pub pmt_pid: u16,
}

/// Programs of the PAT, network information entries excluded
pub fn parse_pat(section: &[u8]) -> Result<Vec<PatEntry>> {
    let body = section_body(section, TABLE_ID_PAT)?;
    Ok(body
        .chunks_exact(4)
        .map(|entry| PatEntry {
            program_number: u16::from_be_bytes([entry[0], entry[1]]),
            pmt_pid: (u16::from(entry[2] & 0x1F) << 8) | u16::from(entry[3]),
        })
        .filter(|entry| entry.program_number != 0)
        .collect())
}

/// Elementary stream declared by a PMT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementaryStream {
    pub stream_type: u8,
    pub pid: u16,
}

impl ElementaryStream {
    pub fn is_video(&self) -> bool {
        matches!(self.stream_type, 0x01 | 0x02 | 0x10 | 0x1B | 0x24)
    }
}

/// Program Map Table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramMap {
    pub program_number: u16,
    pub pcr_pid: u16,
    /// Streams in declaration order
    pub streams: Vec<ElementaryStream>,
}

impl ProgramMap {
    pub fn first_video(&self) -> Option<&ElementaryStream> {
        self.streams.iter().find(|s| s.is_video())
    }

    pub fn contains(&self, pid: u16) -> bool {
        self.streams.iter().any(|s| s.pid == pid)
    }
}

pub fn parse_pmt(section: &[u8]) -> Result<ProgramMap> {
    let body = section_body(section, TABLE_ID_PMT)?;
    let program_number = u16::from_be_bytes([section[3], section[4]]);
    if body.len() < 4 {
        return Err(IngestionError::invalid_section("PMT body too short"));
    }
    let pcr_pid = (u16::from(body[0] & 0x1F) << 8) | u16::from(body[1]);
    let program_info_length = (usize::from(body[2] & 0x0F) << 8) | usize::from(body[3]);

    let mut pos = 4 + program_info_length;
    let mut streams = Vec::new();
    while pos + 5 <= body.len() {
        let stream_type = body[pos];
        let pid = (u16::from(body[pos + 1] & 0x1F) << 8) | u16::from(body[pos + 2]);
        let es_info_length = (usize::from(body[pos + 3] & 0x0F) << 8) | usize::from(body[pos + 4]);
        streams.push(ElementaryStream { stream_type, pid });
        pos += 5 + es_info_length;
    }

    Ok(ProgramMap {
        program_number,
        pcr_pid,
        streams,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build a section with a zero CRC; CRCs are not verified.
    pub(crate) fn section(table_id: u8, id: u16, body: &[u8]) -> Vec<u8> {
        let section_length = 5 + body.len() + 4;
        let mut out = vec![
            table_id,
            0xB0 | ((section_length >> 8) as u8 & 0x0F),
            section_length as u8,
        ];
        out.extend_from_slice(&id.to_be_bytes());
        out.extend_from_slice(&[0xC1, 0x00, 0x00]);
        out.extend_from_slice(body);
        out.extend_from_slice(&[0, 0, 0, 0]);
        out
    }

    pub(crate) fn pat(pmt_pid: u16) -> Vec<u8> {
        let body = [
            0x00,
            0x00,
            0xE0,
            0x10, // network PID entry
            0x00,
            0x01,
            0xE0 | (pmt_pid >> 8) as u8,
            pmt_pid as u8,
        ];
        section(TABLE_ID_PAT, 1, &body)
    }

    pub(crate) fn pmt(streams: &[(u8, u16)]) -> Vec<u8> {
        let pcr = streams.first().map_or(0x1FFF, |s| s.1);
        let mut body = vec![0xE0 | (pcr >> 8) as u8, pcr as u8, 0xF0, 0x00];
        for &(stream_type, pid) in streams {
            body.extend_from_slice(&[stream_type, 0xE0 | (pid >> 8) as u8, pid as u8, 0xF0, 0x00]);
        }
        section(TABLE_ID_PMT, 1, &body)
    }

    #[test]
    fn pat_lists_programs() {
        let programs = parse_pat(&pat(0x1000)).unwrap();
        assert_eq!(
            programs,
            vec![PatEntry {
                program_number: 1,
                pmt_pid: 0x1000
            }]
        );
    }

    #[test]
    fn pmt_lists_streams_in_order() {
        let map = parse_pmt(&pmt(&[(0x1B, 0x100), (0x0F, 0x101), (0x06, 0x102)])).unwrap();
        assert_eq!(map.streams.len(), 3);
        assert_eq!(map.streams[2].pid, 0x102);
        assert_eq!(map.first_video().map(|s| s.pid), Some(0x100));
        assert_eq!(map.pcr_pid, 0x100);
        assert!(map.contains(0x101));
    }

    #[test]
    fn pointer_field_is_honoured() {
        let mut payload = vec![2, 0xFF, 0xFF];
        payload.extend(pat(0x1000));
        let section = section_from_payload(&payload).unwrap();
        assert!(parse_pat(section).is_ok());
        assert!(section_from_payload(&[9, 0]).is_err());
    }

    #[test]
    fn wrong_table_id_is_rejected() {
        assert!(parse_pmt(&pat(0x1000)).is_err());
        assert!(parse_pat(&[0x00, 0xB0]).is_err());
    }
}
