//! Verbatim upload of local files into the bronze tier.

use std::path::{Path as LocalPath, PathBuf};

use object_store::path::Path;
use snafu::prelude::*;
use tracing::{error, info, warn};

use enem_core::emit;
use enem_core::metrics::events::FileUploaded;
use enem_core::{
    ErrorHandlingConfig, FailureBudget, Reportable, RunOutcome, StorageProvider, UnitStatus,
};

use crate::config::BronzeConfig;
use crate::error::{IngestError, ReadDirectorySnafu, UploadSnafu};

/// One local file and where it goes in the bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTask {
    pub source: PathBuf,
    pub destination: Path,
}

/// What happened to one file.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub source: PathBuf,
    pub destination: Path,
    pub status: UnitStatus,
    pub bytes: u64,
    pub error: Option<String>,
}

/// Result of an ingestion run.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub uploads: Vec<UploadOutcome>,
    /// The failure budget ran out before every file was uploaded.
    pub stopped_early: bool,
}

impl IngestReport {
    pub fn bytes_uploaded(&self) -> u64 {
        self.uploads
            .iter()
            .filter(|upload| upload.status == UnitStatus::Success)
            .map(|upload| upload.bytes)
            .sum()
    }
}

impl Reportable for IngestReport {
    fn outcome(&self) -> RunOutcome {
        RunOutcome::classify(self.uploads.iter().map(|upload| upload.status))
    }
}

/// Copy `local` to `destination`, replacing any existing object.
///
/// Returns the number of bytes uploaded.
pub async fn upload_file(
    storage: &StorageProvider,
    local: &LocalPath,
    destination: &Path,
) -> Result<u64, IngestError> {
    let bytes = storage
        .upload_file(local, destination)
        .await
        .context(UploadSnafu { path: local })?;
    info!(
        bytes,
        "uploaded {} to {}",
        local.display(),
        storage.uri(destination)
    );
    Ok(bytes)
}

/// Object path for `file_name` under `prefix`.
pub fn destination_for(prefix: &str, file_name: &str) -> Path {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        Path::from(file_name)
    } else {
        Path::from(format!("{prefix}/{file_name}"))
    }
}

/// Upload tasks for the direct files of `dir`, sorted by file name.
///
/// Sub-directories are skipped.
pub async fn directory_tasks(
    dir: &LocalPath,
    destination_prefix: &str,
) -> Result<Vec<UploadTask>, IngestError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .context(ReadDirectorySnafu { path: dir })?;

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .context(ReadDirectorySnafu { path: dir })?
    {
        let path = entry.path();
        // Follows symlinks, so a linked file is uploaded.
        let metadata = tokio::fs::metadata(&path)
            .await
            .context(ReadDirectorySnafu { path: dir })?;
        if metadata.is_file() {
            files.push((entry.file_name().to_string_lossy().into_owned(), path));
        }
    }
    files.sort();

    Ok(files
        .into_iter()
        .map(|(name, source)| UploadTask {
            destination: destination_for(destination_prefix, &name),
            source,
        })
        .collect())
}

/// Upload the direct files of `dir` under `destination_prefix`.
pub async fn upload_directory(
    storage: &StorageProvider,
    dir: &LocalPath,
    destination_prefix: &str,
    max_failures: usize,
) -> Result<IngestReport, IngestError> {
    let tasks = directory_tasks(dir, destination_prefix).await?;
    if tasks.is_empty() {
        warn!("No files to upload in {}", dir.display());
    }
    Ok(run_tasks(storage, &tasks, max_failures).await)
}

/// Uploads every configured file and directory.
pub struct Ingester {
    storage: StorageProvider,
    config: BronzeConfig,
    max_failures: usize,
}

impl Ingester {
    pub fn new(
        storage: StorageProvider,
        config: BronzeConfig,
        error_handling: &ErrorHandlingConfig,
    ) -> Self {
        Self {
            storage,
            config,
            max_failures: error_handling.max_failures,
        }
    }

    /// Upload single files first, then directories, sharing one failure budget.
    pub async fn run(&self) -> Result<IngestReport, IngestError> {
        let mut tasks: Vec<UploadTask> = self
            .config
            .uploads
            .iter()
            .map(|upload| UploadTask {
                source: upload.source.clone(),
                destination: Path::from(upload.destination.as_str()),
            })
            .collect();

        for directory in &self.config.directories {
            tasks.extend(directory_tasks(&directory.source, &directory.destination_prefix).await?);
        }

        if tasks.is_empty() {
            info!("Nothing configured to upload");
            return Ok(IngestReport::default());
        }
        info!("Uploading {} file(s)", tasks.len());

        let report = run_tasks(&self.storage, &tasks, self.max_failures).await;
        info!(
            "Ingestion finished: {} file(s), {} byte(s) uploaded",
            report.uploads.len(),
            report.bytes_uploaded()
        );
        Ok(report)
    }
}

async fn run_tasks(
    storage: &StorageProvider,
    tasks: &[UploadTask],
    max_failures: usize,
) -> IngestReport {
    let mut report = IngestReport::default();
    let mut budget = FailureBudget::new(max_failures);

    for (index, task) in tasks.iter().enumerate() {
        let mut outcome = UploadOutcome {
            source: task.source.clone(),
            destination: task.destination.clone(),
            status: UnitStatus::Success,
            bytes: 0,
            error: None,
        };

        match upload_file(storage, &task.source, &task.destination).await {
            Ok(bytes) => outcome.bytes = bytes,
            Err(e) => {
                error!(error = %e, "Upload failed");
                outcome.status = UnitStatus::Failed;
                outcome.error = Some(e.to_string());
            }
        }
        emit!(FileUploaded {
            status: outcome.status,
            bytes: outcome.bytes,
        });

        let failed = outcome.status == UnitStatus::Failed;
        report.uploads.push(outcome);

        if failed && budget.record_failure() {
            let remaining = tasks.len() - index - 1;
            if remaining > 0 {
                error!(
                    "Stopping after {} failed upload(s); {remaining} file(s) not uploaded",
                    budget.failures()
                );
                report.stopped_early = true;
            }
            break;
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_for() {
        assert_eq!(
            destination_for("bronze/parquet/", "chunk_1.parquet").as_ref(),
            "bronze/parquet/chunk_1.parquet"
        );
        assert_eq!(destination_for("", "a.csv").as_ref(), "a.csv");
    }

    #[tokio::test]
    async fn test_directory_tasks_sorted_and_flat() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.parquet"), b"b").unwrap();
        std::fs::write(dir.path().join("a.parquet"), b"a").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/c.parquet"), b"c").unwrap();

        let tasks = directory_tasks(dir.path(), "bronze/parquet").await.unwrap();
        let destinations: Vec<&str> = tasks.iter().map(|t| t.destination.as_ref()).collect();

        assert_eq!(
            destinations,
            vec!["bronze/parquet/a.parquet", "bronze/parquet/b.parquet"]
        );
    }

    #[tokio::test]
    async fn test_missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = directory_tasks(&dir.path().join("absent"), "bronze").await;
        assert!(matches!(result, Err(IngestError::ReadDirectory { .. })));
    }
}
