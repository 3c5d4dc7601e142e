//! Pipeline orchestration module.

mod geo;
mod ingest;
mod orchestrator;
mod session;
mod stats;

pub use geo::GeoBackend;
pub use ingest::{ingest_session, IngestedSession};
pub use orchestrator::{Pipeline, PipelineConfig};
pub use session::{plan_jobs, process_session, SessionContext, SessionJob, GPX_FILE};
pub use stats::PipelineStats;
