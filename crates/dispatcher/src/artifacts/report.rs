//! Run report: one outcome per session

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use contracts::{SessionOutcome, SessionStatus};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::write_json;
use crate::error::Result;

pub const REPORT_FILE: &str = "report.json";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTotals {
    pub sessions: usize,
    pub success: usize,
    pub degraded: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub totals: RunTotals,
    pub sessions: Vec<SessionOutcome>,
}

impl RunReport {
    pub fn new(sessions: Vec<SessionOutcome>) -> Self {
        let mut totals = RunTotals {
            sessions: sessions.len(),
            ..RunTotals::default()
        };
        for outcome in &sessions {
            match outcome.status {
                SessionStatus::Success => totals.success += 1,
                SessionStatus::Degraded { .. } => totals.degraded += 1,
                SessionStatus::Failed { .. } => totals.failed += 1,
            }
        }
        Self {
            generated_at: Utc::now(),
            totals,
            sessions,
        }
    }

    /// True when at least one session produced something usable
    pub fn any_usable(&self) -> bool {
        self.totals.success + self.totals.degraded > 0
    }
}

/// Write `report.json` into the output root
#[instrument(name = "write_report", skip(output_dir, report), fields(sessions = report.totals.sessions))]
pub fn write_report(output_dir: &Path, report: &RunReport) -> Result<PathBuf> {
    let path = output_dir.join(REPORT_FILE);
    write_json(&path, report)?;
    info!(
        path = %path.display(),
        success = report.totals.success,
        degraded = report.totals.degraded,
        failed = report.totals.failed,
        "run report written"
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::CameraRole;
    use tempfile::tempdir;

    #[test]
    fn totals_count_each_status() {
        let mut ok = SessionOutcome::failed("a", CameraRole::Front, vec![], "x");
        ok.status = SessionStatus::Success;
        let mut degraded = ok.clone();
        degraded.session_id = "b".into();
        degraded.status = SessionStatus::from_reasons(vec!["basemap unavailable".into()]);
        let failed = SessionOutcome::failed("c", CameraRole::Rear, vec![], "no samples");

        let report = RunReport::new(vec![ok, degraded, failed]);
        assert_eq!(
            report.totals,
            RunTotals {
                sessions: 3,
                success: 1,
                degraded: 1,
                failed: 1
            }
        );
        assert!(report.any_usable());

        let dir = tempdir().unwrap();
        let path = write_report(dir.path(), &report).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(json["sessions"][1]["status"], "degraded");
        assert_eq!(json["sessions"][1]["reasons"][0], "basemap unavailable");
        assert_eq!(json["sessions"][2]["reason"], "no samples");
    }

    #[test]
    fn all_failed_is_not_usable() {
        let report = RunReport::new(vec![SessionOutcome::failed(
            "a",
            CameraRole::Front,
            vec![],
            "x",
        )]);
        assert!(!report.any_usable());
    }
}
