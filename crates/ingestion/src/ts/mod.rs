//! Minimal MPEG transport stream layer: packets, PSI tables and PES reassembly

pub mod packet;
pub mod pes;
pub mod psi;

pub use packet::{PacketReader, TsPacket, PID_NULL, PID_PAT, SYNC_BYTE, TS_PACKET_SIZE};
pub use pes::{PesAssembler, PesHeader, PES_CLOCK_RATE};
pub use psi::{ElementaryStream, PatEntry, ProgramMap};
