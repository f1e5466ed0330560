//! The silver transformation run.
//!
//! Shards are processed one at a time: read whole, strip the denylist,
//! then write one Parquet file per column group that has at least one of
//! its columns in the shard. Shards are never merged with each other.

use bytes::Bytes;
use object_store::path::Path;
use snafu::prelude::*;
use tracing::{debug, error, info, warn};

use enem_core::emit;
use enem_core::metrics::events::{RecordsProcessed, ShardProcessed, SilverFileWritten};
use enem_core::{
    ErrorHandlingConfig, FailureBudget, Reportable, RunOutcome, SilverManifest, StorageProvider,
    Table, UnitStatus,
};

use crate::columns::{drop_denylisted, project_group};
use crate::config::{Config, InputFormat, SilverConfig};
use crate::error::{
    DecodeCsvSnafu, DecodeParquetSnafu, DenylistSnafu, EncodeSnafu, PipelineError, ProjectSnafu,
    ReadShardSnafu, TransformError, WriteGroupSnafu,
};
use crate::source::{SourceShard, resolve_sources};

/// A silver file written for one group of one shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupFile {
    pub group: String,
    pub path: Path,
    /// Full storage URI, as handed to the warehouse.
    pub uri: String,
    pub rows: usize,
}

/// What happened to one bronze shard.
#[derive(Debug, Clone)]
pub struct ShardOutcome {
    pub source: Path,
    pub status: UnitStatus,
    /// Files written, in group declaration order. Kept on failure: there is
    /// no rollback of files written before the error.
    pub written: Vec<GroupFile>,
    /// Groups with none of their columns in this shard.
    pub skipped_groups: Vec<String>,
    pub rows: usize,
    pub error: Option<String>,
}

impl ShardOutcome {
    fn new(source: Path) -> Self {
        Self {
            source,
            status: UnitStatus::Success,
            written: Vec::new(),
            skipped_groups: Vec::new(),
            rows: 0,
            error: None,
        }
    }
}

/// Result of a whole transformation run.
#[derive(Debug, Clone, Default)]
pub struct TransformReport {
    pub shards: Vec<ShardOutcome>,
    /// Where the manifest was written, if it was.
    pub manifest: Option<Path>,
    /// The failure budget ran out before every shard was processed.
    pub stopped_early: bool,
}

impl TransformReport {
    pub fn files_written(&self) -> impl Iterator<Item = &GroupFile> {
        self.shards.iter().flat_map(|shard| shard.written.iter())
    }

    pub fn failed_shards(&self) -> impl Iterator<Item = &ShardOutcome> {
        self.shards
            .iter()
            .filter(|shard| shard.status == UnitStatus::Failed)
    }
}

impl Reportable for TransformReport {
    fn outcome(&self) -> RunOutcome {
        RunOutcome::classify(self.shards.iter().map(|shard| shard.status))
    }
}

/// Location of the silver file for `group` of the shard named `basename`.
pub fn group_path(destination_prefix: &str, group: &str, basename: &str) -> Path {
    Path::from(format!(
        "{}/{group}/{basename}_{group}.parquet",
        destination_prefix.trim_end_matches('/')
    ))
}

/// Runs the bronze to silver transformation.
pub struct Transformer {
    storage: StorageProvider,
    config: SilverConfig,
    csv_delimiter: u8,
    max_failures: usize,
}

impl Transformer {
    /// Connect to storage and build a transformer from the loaded config.
    pub async fn from_config(config: Config) -> Result<Self, PipelineError> {
        let storage = StorageProvider::connect(&config.storage).await?;
        Self::new(storage, config.silver, &config.error_handling)
    }

    pub fn new(
        storage: StorageProvider,
        config: SilverConfig,
        error_handling: &ErrorHandlingConfig,
    ) -> Result<Self, PipelineError> {
        let csv_delimiter = config.csv_delimiter_byte()?;
        Ok(Self {
            storage,
            config,
            csv_delimiter,
            max_failures: error_handling.max_failures,
        })
    }

    /// Transform every matching shard.
    ///
    /// Shard failures are recorded in the report. Only listing and manifest
    /// errors fail the run itself.
    pub async fn run(&self) -> Result<TransformReport, PipelineError> {
        let shards = resolve_sources(
            &self.storage,
            &self.config.source_prefix,
            self.config.input_format,
            self.config.partitioned,
        )
        .await?;

        if shards.is_empty() {
            info!(
                "No shards match {}*.{}; nothing to do",
                self.config.source_prefix,
                self.config.input_format.extension()
            );
            return Ok(TransformReport::default());
        }
        info!("Found {} shard(s) to transform", shards.len());

        let mut report = TransformReport::default();
        let mut manifest = SilverManifest::new();
        let mut budget = FailureBudget::new(self.max_failures);

        for (index, shard) in shards.iter().enumerate() {
            let outcome = self.process_shard(shard).await;
            emit!(ShardProcessed {
                status: outcome.status
            });

            for file in &outcome.written {
                manifest.add(&file.group, file.uri.clone());
            }

            let failed = outcome.status == UnitStatus::Failed;
            report.shards.push(outcome);

            if failed && budget.record_failure() {
                let remaining = shards.len() - index - 1;
                if remaining > 0 {
                    error!(
                        "Stopping after {} failed shard(s); {remaining} shard(s) not processed",
                        budget.failures()
                    );
                    report.stopped_early = true;
                }
                break;
            }
        }

        if self.config.write_manifest {
            if budget.failures() > 0 {
                warn!("Not writing manifest: the run had failed shards");
            } else if !manifest.is_empty() {
                let location = manifest
                    .write(&self.storage, &self.config.destination_prefix)
                    .await?;
                info!(path = %location, groups = manifest.groups.len(), "Wrote manifest");
                report.manifest = Some(location);
            }
        }

        info!(
            "Processing finished: {} shard(s), {} file(s) written, {} failed",
            report.shards.len(),
            report.files_written().count(),
            budget.failures()
        );
        Ok(report)
    }

    async fn process_shard(&self, shard: &SourceShard) -> ShardOutcome {
        info!(source = %shard.path, "Processing shard");
        let mut outcome = ShardOutcome::new(shard.path.clone());

        match self.transform_shard(shard, &mut outcome).await {
            Ok(()) if outcome.written.is_empty() => {
                warn!(source = %shard.path, "No group had columns in this shard");
                outcome.status = UnitStatus::Skipped;
            }
            Ok(()) => {
                info!(
                    source = %shard.path,
                    files = outcome.written.len(),
                    rows = outcome.rows,
                    "Shard transformed"
                );
            }
            Err(e) => {
                error!(source = %shard.path, error = %e, "Shard failed");
                outcome.status = UnitStatus::Failed;
                outcome.error = Some(e.to_string());
            }
        }

        outcome
    }

    async fn transform_shard(
        &self,
        shard: &SourceShard,
        outcome: &mut ShardOutcome,
    ) -> Result<(), TransformError> {
        let path = shard.path.to_string();
        let bytes = self
            .storage
            .get(&shard.path)
            .await
            .context(ReadShardSnafu { path: &path })?;

        let table = match self.config.input_format {
            InputFormat::Parquet => {
                Table::from_parquet(bytes).context(DecodeParquetSnafu { path: &path })?
            }
            InputFormat::Csv => {
                Table::from_csv(bytes, self.csv_delimiter, self.config.csv_encoding)
                    .context(DecodeCsvSnafu { path: &path })?
            }
        };
        outcome.rows = table.num_rows();

        let table = drop_denylisted(&table, &self.config.column_denylist)
            .context(DenylistSnafu { path: &path })?;

        for (group, declared) in &self.config.column_groups {
            let Some(projected) =
                project_group(&table, group, declared).context(ProjectSnafu { group })?
            else {
                debug!(target = %group, source = %path, "No group columns present; skipping");
                outcome.skipped_groups.push(group.clone());
                continue;
            };

            let dest = group_path(&self.config.destination_prefix, group, &shard.basename);
            let encoded = projected
                .to_parquet(self.config.compression)
                .context(EncodeSnafu { group })?;
            let bytes = encoded.len() as u64;

            info!(target = %group, path = %dest, "Saving file");
            self.storage
                .put_parquet(&dest, Bytes::from(encoded))
                .await
                .context(WriteGroupSnafu {
                    path: dest.to_string(),
                })?;

            let rows = projected.num_rows();
            emit!(RecordsProcessed {
                count: rows as u64,
                target: group.clone(),
            });
            emit!(SilverFileWritten {
                bytes,
                target: group.clone(),
            });

            outcome.written.push(GroupFile {
                group: group.clone(),
                uri: self.storage.uri(&dest),
                path: dest,
                rows,
            });
        }

        Ok(())
    }
}
