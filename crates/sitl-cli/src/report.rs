use anyhow::{Context, Result};
use serde::Serialize;
use sitl_flight::Outcome;
use std::path::Path;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// JSON summary of one run, written when `[report] path` is set.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub scenario: String,
    pub passed: bool,
    pub reason: Option<String>,
    pub telemetry_log: Option<String>,
    pub started: String,
    pub finished: String,
}

impl RunReport {
    pub fn new(
        scenario: &str,
        outcome: &Outcome,
        telemetry_log: Option<&str>,
        started: OffsetDateTime,
        finished: OffsetDateTime,
    ) -> Result<Self> {
        Ok(Self {
            scenario: scenario.to_string(),
            passed: outcome.passed,
            reason: outcome.reason.clone(),
            telemetry_log: telemetry_log.map(str::to_string),
            started: started.format(&Rfc3339).context("format start time")?,
            finished: finished.format(&Rfc3339).context("format end time")?,
        })
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let body = serde_json::to_string_pretty(self).context("encode report")?;
        std::fs::write(path, body).with_context(|| format!("write report {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn writes_rfc3339_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        let report = RunReport::new(
            "loiter",
            &Outcome::fail("loiter failed"),
            Some("logs/flight.tlog"),
            datetime!(2026-03-01 10:00:00 UTC),
            datetime!(2026-03-01 10:04:30 UTC),
        )
        .unwrap();
        report.write(&path).unwrap();

        let v: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(v["scenario"], "loiter");
        assert_eq!(v["passed"], false);
        assert_eq!(v["reason"], "loiter failed");
        assert_eq!(v["telemetry_log"], "logs/flight.tlog");
        assert_eq!(v["started"], "2026-03-01T10:00:00Z");
        assert_eq!(v["finished"], "2026-03-01T10:04:30Z");
    }
}
