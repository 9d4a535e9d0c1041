//! Sync run report
//!
//! Structured record of one reconciliation run: which pass did what to
//! whom, and why the rest was skipped. The CLI prints it as a narrative
//! or serializes it whole; per-member failures land here instead of
//! aborting the batch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The five reconciliation passes, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pass {
    Rename,
    Convert,
    Delete,
    Add,
    Renew,
}

impl Pass {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Pass::Rename => "rename",
            Pass::Convert => "convert",
            Pass::Delete => "delete",
            Pass::Add => "add",
            Pass::Renew => "renew",
        }
    }
}

impl std::fmt::Display for Pass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to one member in one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The pass changed something for this member.
    Applied,
    /// Nothing to do (already applied, filtered out, or warned about).
    Skipped,
    /// The member's step errored; the run continued without them.
    Failed,
}

/// One member's outcome in one pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberOutcome {
    pub handle: String,
    pub outcome: Outcome,
    /// Human-readable reason or action description.
    pub detail: String,
}

/// Counters and outcomes for a single pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassReport {
    pub pass: Pass,
    pub applied: u32,
    pub skipped: u32,
    pub failed: u32,
    pub outcomes: Vec<MemberOutcome>,
}

impl PassReport {
    #[must_use]
    pub fn new(pass: Pass) -> Self {
        Self {
            pass,
            applied: 0,
            skipped: 0,
            failed: 0,
            outcomes: Vec::new(),
        }
    }

    pub fn applied(&mut self, handle: &str, detail: impl Into<String>) {
        self.applied += 1;
        self.push(handle, Outcome::Applied, detail);
    }

    pub fn skipped(&mut self, handle: &str, detail: impl Into<String>) {
        self.skipped += 1;
        self.push(handle, Outcome::Skipped, detail);
    }

    pub fn failed(&mut self, handle: &str, detail: impl Into<String>) {
        self.failed += 1;
        self.push(handle, Outcome::Failed, detail);
    }

    fn push(&mut self, handle: &str, outcome: Outcome, detail: impl Into<String>) {
        self.outcomes.push(MemberOutcome {
            handle: handle.to_string(),
            outcome,
            detail: detail.into(),
        });
    }
}

/// Full record of one `sync` run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    /// Correlates log lines with this run.
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// True when no mutation was performed.
    pub dry_run: bool,
    pub passes: Vec<PassReport>,
}

impl SyncReport {
    #[must_use]
    pub fn new(dry_run: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            dry_run,
            passes: Vec::new(),
        }
    }

    pub fn record(&mut self, pass: PassReport) {
        self.passes.push(pass);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// (applied, skipped, failed) across all passes.
    #[must_use]
    pub fn totals(&self) -> (u32, u32, u32) {
        self.passes.iter().fold((0, 0, 0), |(a, s, f), p| {
            (a + p.applied, s + p.skipped, f + p.failed)
        })
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.passes.iter().any(|p| p.failed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_track_outcomes() {
        let mut pass = PassReport::new(Pass::Rename);
        pass.applied("fred", "renamed to freddy");
        pass.skipped("wilma", "already renamed");
        pass.failed("barney", "no snapshot entry");
        pass.applied("dino", "renamed to rex");

        assert_eq!(pass.applied, 2);
        assert_eq!(pass.skipped, 1);
        assert_eq!(pass.failed, 1);
        assert_eq!(pass.outcomes.len(), 4);
        assert_eq!(pass.outcomes[2].outcome, Outcome::Failed);
    }

    #[test]
    fn test_report_totals() {
        let mut report = SyncReport::new(false);
        let mut rename = PassReport::new(Pass::Rename);
        rename.applied("fred", "renamed");
        let mut add = PassReport::new(Pass::Add);
        add.applied("new1", "created");
        add.failed("new2", "no address");
        report.record(rename);
        report.record(add);
        report.finish();

        assert_eq!(report.totals(), (2, 0, 1));
        assert!(report.has_failures());
        assert!(report.finished_at.is_some());
    }

    #[test]
    fn test_report_serializes() {
        let mut report = SyncReport::new(true);
        report.record(PassReport::new(Pass::Convert));
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"dry_run\":true"));
        assert!(json.contains("\"convert\""));
        let back: SyncReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.run_id, report.run_id);
    }
}
