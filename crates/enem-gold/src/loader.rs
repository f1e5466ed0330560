//! The gold load run: one full-replace load job per column group.

use std::time::Instant;

use tracing::{debug, error, info, warn};

use enem_core::emit;
use enem_core::metrics::events::LoadJobCompleted;
use enem_core::{
    ErrorHandlingConfig, FailureBudget, Reportable, RunOutcome, StorageProvider, UnitStatus,
};

use crate::config::GoldConfig;
use crate::discovery::{GroupSources, resolve_groups};
use crate::error::PipelineError;
use crate::warehouse::{TableRef, Warehouse};

/// What happened to one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupOutcome {
    pub group: String,
    pub status: UnitStatus,
    /// Files handed to the load job.
    pub files: usize,
    pub job_id: Option<String>,
    pub error: Option<String>,
}

impl GroupOutcome {
    fn new(group: &GroupSources) -> Self {
        Self {
            group: group.name.clone(),
            status: UnitStatus::Success,
            files: group.uris.len(),
            job_id: None,
            error: None,
        }
    }
}

/// Result of a whole load run.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub groups: Vec<GroupOutcome>,
    /// The failure budget ran out before every group was loaded.
    pub stopped_early: bool,
}

impl LoadReport {
    pub fn loaded(&self) -> impl Iterator<Item = &GroupOutcome> {
        self.groups
            .iter()
            .filter(|group| group.status == UnitStatus::Success)
    }
}

impl Reportable for LoadReport {
    fn outcome(&self) -> RunOutcome {
        RunOutcome::classify(self.groups.iter().map(|group| group.status))
    }
}

/// Loads every silver group into its warehouse table.
pub struct Loader<W> {
    storage: StorageProvider,
    config: GoldConfig,
    warehouse: W,
    max_failures: usize,
}

impl<W: Warehouse> Loader<W> {
    pub fn new(
        storage: StorageProvider,
        config: GoldConfig,
        warehouse: W,
        error_handling: &ErrorHandlingConfig,
    ) -> Self {
        Self {
            storage,
            config,
            warehouse,
            max_failures: error_handling.max_failures,
        }
    }

    /// Load every group, in sorted order.
    ///
    /// Group failures are recorded in the report. Only discovery errors
    /// fail the run itself.
    pub async fn run(&self) -> Result<LoadReport, PipelineError> {
        let groups = resolve_groups(&self.storage, &self.config).await?;

        if groups.is_empty() {
            info!("No groups found under {}; nothing to do", self.config.source_prefix);
            return Ok(LoadReport::default());
        }
        info!("Found {} group(s) to load", groups.len());

        let mut report = LoadReport::default();
        let mut budget = FailureBudget::new(self.max_failures);

        for (index, group) in groups.iter().enumerate() {
            let outcome = self.load_group(group).await;
            let failed = outcome.status == UnitStatus::Failed;
            report.groups.push(outcome);

            if failed && budget.record_failure() {
                let remaining = groups.len() - index - 1;
                if remaining > 0 {
                    error!(
                        "Stopping after {} failed group(s); {remaining} group(s) not loaded",
                        budget.failures()
                    );
                    report.stopped_early = true;
                }
                break;
            }
        }

        info!(
            "Load finished: {} table(s) loaded, {} failed",
            report.loaded().count(),
            budget.failures()
        );
        Ok(report)
    }

    async fn load_group(&self, group: &GroupSources) -> GroupOutcome {
        let mut outcome = GroupOutcome::new(group);
        info!(target = %group.name, "Loading files from folder");

        if group.uris.is_empty() {
            warn!(target = %group.name, "No Parquet files found for group; skipping");
            outcome.status = UnitStatus::Skipped;
            return outcome;
        }

        let table = match TableRef::new(
            &self.config.project_id,
            &self.config.dataset_id,
            &group.name,
        ) {
            Ok(table) => table,
            Err(e) => {
                error!(target = %group.name, error = %e, "Cannot load group");
                outcome.status = UnitStatus::Failed;
                outcome.error = Some(e.to_string());
                return outcome;
            }
        };

        for uri in &group.uris {
            debug!(target = %group.name, "-> Found: {uri}");
        }
        info!(
            target = %group.name,
            "Starting load of {} file(s) into table {table}",
            group.uris.len()
        );

        let start = Instant::now();
        let result = self.warehouse.load_parquet(&table, &group.uris).await;

        match result {
            Ok(job) => {
                info!(
                    target = %group.name,
                    job_id = %job.job_id,
                    rows = ?job.output_rows,
                    "Table loaded successfully with {} file(s)",
                    group.uris.len()
                );
                outcome.job_id = Some(job.job_id);
            }
            Err(e) => {
                error!(target = %group.name, error = %e, "Load job failed");
                outcome.status = UnitStatus::Failed;
                outcome.error = Some(e.to_string());
            }
        }

        emit!(LoadJobCompleted {
            status: outcome.status,
            duration: start.elapsed(),
            target: group.name.clone(),
        });
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(status: UnitStatus) -> GroupOutcome {
        GroupOutcome {
            group: "notas".to_string(),
            status,
            files: 1,
            job_id: None,
            error: None,
        }
    }

    #[test]
    fn test_report_outcome() {
        let mut report = LoadReport::default();
        assert_eq!(report.outcome(), RunOutcome::NothingToDo);

        report.groups = vec![outcome(UnitStatus::Skipped)];
        assert_eq!(report.outcome(), RunOutcome::NothingToDo);

        report.groups.push(outcome(UnitStatus::Success));
        assert_eq!(report.outcome(), RunOutcome::Completed);
        assert_eq!(report.loaded().count(), 1);

        report.groups.push(outcome(UnitStatus::Failed));
        assert_eq!(report.outcome(), RunOutcome::PartialFailure);
    }
}
