//! 188-byte transport packets and a resynchronising packet reader

use std::io::{self, Read};

use crate::error::{IngestionError, Result};

/// Transport packet size in bytes
pub const TS_PACKET_SIZE: usize = 188;

/// Packet sync byte
pub const SYNC_BYTE: u8 = 0x47;

/// Program Association Table PID
pub const PID_PAT: u16 = 0x0000;

/// Null packet PID
pub const PID_NULL: u16 = 0x1FFF;

/// Parsed packet header with a borrowed payload
#[derive(Debug, Clone, Copy)]
pub struct TsPacket<'a> {
    pub pid: u16,
    /// Payload unit start indicator
    pub pusi: bool,
    pub transport_error: bool,
    pub continuity_counter: u8,
    pub has_payload: bool,
    payload: &'a [u8],
}

impl<'a> TsPacket<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        if data.len() != TS_PACKET_SIZE {
            return Err(IngestionError::invalid_packet(format!(
                "expected {TS_PACKET_SIZE} bytes, got {}",
                data.len()
            )));
        }
        if data[0] != SYNC_BYTE {
            return Err(IngestionError::invalid_packet(format!(
                "bad sync byte 0x{:02x}",
                data[0]
            )));
        }

        let transport_error = data[1] & 0x80 != 0;
        let pusi = data[1] & 0x40 != 0;
        let pid = (u16::from(data[1] & 0x1F) << 8) | u16::from(data[2]);
        let afc = (data[3] >> 4) & 0x03;
        let continuity_counter = data[3] & 0x0F;

        let has_adaptation = afc & 0x02 != 0;
        let has_payload = afc & 0x01 != 0;

        let mut offset = 4;
        if has_adaptation {
            let length = usize::from(data[4]);
            offset = 5 + length;
            if offset > TS_PACKET_SIZE {
                return Err(IngestionError::invalid_packet(format!(
                    "adaptation field length {length} overruns packet"
                )));
            }
        }

        let payload = if has_payload { &data[offset..] } else { &[][..] };

        Ok(Self {
            pid,
            pusi,
            transport_error,
            continuity_counter,
            has_payload,
            payload,
        })
    }

    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }
}

/// Reads aligned packets, skipping garbage until the next sync byte
pub struct PacketReader<R> {
    inner: R,
    buf: [u8; TS_PACKET_SIZE],
    packets: u64,
    skipped_bytes: u64,
    truncated_tail: usize,
}

impl<R: Read> PacketReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: [0; TS_PACKET_SIZE],
            packets: 0,
            skipped_bytes: 0,
            truncated_tail: 0,
        }
    }

    /// Next sync-aligned packet, None at end of input
    pub fn next_packet(&mut self) -> io::Result<Option<&[u8; TS_PACKET_SIZE]>> {
        let mut filled = self.fill(0)?;
        loop {
            if filled < TS_PACKET_SIZE {
                self.truncated_tail = filled;
                return Ok(None);
            }
            if self.buf[0] == SYNC_BYTE {
                self.packets += 1;
                return Ok(Some(&self.buf));
            }

            // Lost sync: drop bytes up to the next candidate and refill.
            let skip = self.buf[1..]
                .iter()
                .position(|&b| b == SYNC_BYTE)
                .map_or(TS_PACKET_SIZE, |pos| pos + 1);
            self.skipped_bytes += skip as u64;
            self.buf.copy_within(skip.., 0);
            filled = self.fill(TS_PACKET_SIZE - skip)?;
        }
    }

    /// Fill `buf[from..]`, returning the total valid length
    fn fill(&mut self, from: usize) -> io::Result<usize> {
        let mut len = from;
        while len < TS_PACKET_SIZE {
            match self.inner.read(&mut self.buf[len..]) {
                Ok(0) => break,
                Ok(n) => len += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(len)
    }

    pub fn packets(&self) -> u64 {
        self.packets
    }

    /// Bytes discarded while searching for sync
    pub fn skipped_bytes(&self) -> u64 {
        self.skipped_bytes
    }

    /// Length of an incomplete trailing packet
    pub fn truncated_tail(&self) -> usize {
        self.truncated_tail
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}
