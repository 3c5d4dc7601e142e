//! Per-session and per-run artifact files
//!
//! Everything the external compositing step reads besides the frame
//! sequences: the timing manifest, the GPX track, the composite plan and
//! the run report.

mod composite;
mod gpx;
mod manifest;
mod report;

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::error::{DispatcherError, Result};

pub use composite::{CompositeInput, CompositeLayout, CompositePlan, COMPOSITE_FILE};
pub use gpx::{render_gpx, write_gpx, GPX_CREATOR};
pub use manifest::{write_manifest, MANIFEST_FILE};
pub use report::{write_report, RunReport, RunTotals, REPORT_FILE};

/// Pretty JSON written through a temp file and renamed into place, so a
/// crash never leaves a truncated artifact behind.
pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let tmp = path.with_extension("json.tmp");
    let file = File::create(&tmp).map_err(|e| DispatcherError::artifact(&tmp, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value).map_err(|e| DispatcherError::artifact(path, e))?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    fs::rename(&tmp, path).map_err(|e| DispatcherError::artifact(path, e))?;
    Ok(())
}
