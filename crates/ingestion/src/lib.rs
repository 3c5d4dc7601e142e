//! # Ingestion
//!
//! Telemetry ingestion for dashcam transport-stream segments.
//!
//! Responsibilities:
//! - Discover recording sessions and order their segments
//! - Extract the telemetry elementary stream from each segment (`TelemetryExtractor`)
//! - Parse Viidure records into `TelemetrySample`s, skipping malformed ones (`RecordScanner`)
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{discover_sessions, parse_chunk, ExtractorConfig, TelemetryExtractor};
//!
//! let sessions = discover_sessions(&[input_dir])?;
//! let extractor = TelemetryExtractor::new(ExtractorConfig::default());
//! for segment in &sessions[0].segments {
//!     let extracted = extractor.extract(segment)?;
//!     let (samples, stats) = parse_chunk(&extracted.chunk, true);
//! }
//! ```

mod config;
mod error;
mod extractor;
mod parser;
mod segment;
pub mod ts;

// Re-exports
pub use config::{ExtractorConfig, IngestionMetrics, MetricsSnapshot};
pub use error::{IngestionError, Result};
pub use extractor::{ExtractStats, ExtractedSegment, TelemetryExtractor};
pub use parser::{parse_chunk, parse_record, ParseStats, RecordScanner, RECORD_MARKER};
pub use segment::{discover_sessions, natural_cmp, Session};

