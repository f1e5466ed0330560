//! Per-unit statuses and run outcomes.
//!
//! A unit is whatever a stage processes one at a time: an uploaded file,
//! a bronze shard, a warehouse group. Stages record one status per unit
//! and summarize the run as a [`RunOutcome`], which decides the exit code.

use serde::{Deserialize, Serialize};
use std::process::ExitCode;

/// What happened to a single unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitStatus {
    Success,
    /// Nothing to do for this unit (e.g. a group with no columns or files).
    Skipped,
    Failed,
}

impl UnitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitStatus::Success => "success",
            UnitStatus::Skipped => "skipped",
            UnitStatus::Failed => "failed",
        }
    }
}

/// Summary of a whole stage run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// No unit succeeded or failed: nothing matched, or everything was skipped.
    NothingToDo,
    /// At least one unit succeeded and none failed.
    Completed,
    /// Some units succeeded and some failed.
    PartialFailure,
    /// Units failed and none succeeded.
    TotalFailure,
}

impl RunOutcome {
    /// Classify a run from the statuses of the units it attempted.
    pub fn classify<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = UnitStatus>,
    {
        let (mut succeeded, mut failed) = (0usize, 0usize);
        for status in statuses {
            match status {
                UnitStatus::Success => succeeded += 1,
                UnitStatus::Failed => failed += 1,
                UnitStatus::Skipped => {}
            }
        }

        match (succeeded, failed) {
            (0, 0) => RunOutcome::NothingToDo,
            (_, 0) => RunOutcome::Completed,
            (0, _) => RunOutcome::TotalFailure,
            _ => RunOutcome::PartialFailure,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, RunOutcome::PartialFailure | RunOutcome::TotalFailure)
    }

    pub fn exit_code(&self) -> ExitCode {
        if self.is_failure() {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        }
    }
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            RunOutcome::NothingToDo => "nothing to do",
            RunOutcome::Completed => "completed",
            RunOutcome::PartialFailure => "partial failure",
            RunOutcome::TotalFailure => "total failure",
        };
        f.write_str(text)
    }
}

/// Counts failures against `error_handling.max_failures`.
#[derive(Debug, Clone)]
pub struct FailureBudget {
    max_failures: usize,
    failures: usize,
}

impl FailureBudget {
    /// `max_failures` of 0 means unlimited.
    pub fn new(max_failures: usize) -> Self {
        Self {
            max_failures,
            failures: 0,
        }
    }

    /// Record one failure. Returns true when the run must stop.
    pub fn record_failure(&mut self) -> bool {
        self.failures += 1;
        self.is_exhausted()
    }

    pub fn is_exhausted(&self) -> bool {
        self.max_failures != 0 && self.failures >= self.max_failures
    }

    pub fn failures(&self) -> usize {
        self.failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use UnitStatus::*;

    #[test]
    fn test_classify() {
        assert_eq!(RunOutcome::classify([]), RunOutcome::NothingToDo);
        assert_eq!(RunOutcome::classify([Skipped, Skipped]), RunOutcome::NothingToDo);
        assert_eq!(RunOutcome::classify([Success, Skipped]), RunOutcome::Completed);
        assert_eq!(RunOutcome::classify([Success, Failed]), RunOutcome::PartialFailure);
        assert_eq!(RunOutcome::classify([Failed, Skipped]), RunOutcome::TotalFailure);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(RunOutcome::Completed.exit_code(), ExitCode::SUCCESS);
        assert_eq!(RunOutcome::NothingToDo.exit_code(), ExitCode::SUCCESS);
        assert_eq!(RunOutcome::PartialFailure.exit_code(), ExitCode::FAILURE);
        assert_eq!(RunOutcome::TotalFailure.exit_code(), ExitCode::FAILURE);
    }

    #[test]
    fn test_budget_stops_at_first_failure_by_default() {
        let mut budget = FailureBudget::new(1);
        assert!(!budget.is_exhausted());
        assert!(budget.record_failure());
    }

    #[test]
    fn test_budget_unlimited() {
        let mut budget = FailureBudget::new(0);
        for _ in 0..100 {
            assert!(!budget.record_failure());
        }
        assert_eq!(budget.failures(), 100);
    }

    #[test]
    fn test_budget_limit() {
        let mut budget = FailureBudget::new(3);
        assert!(!budget.record_failure());
        assert!(!budget.record_failure());
        assert!(budget.record_failure());
    }
}
