//! Sink implementations
//!
//! Contains PngSequenceSink, LogSink, and MemorySink.

mod log;
mod memory;
mod png;

pub use self::log::LogSink;
pub use self::memory::MemorySink;
pub use self::png::{frame_file_name, frame_pattern, PngSequenceSink, PngSinkConfig};
