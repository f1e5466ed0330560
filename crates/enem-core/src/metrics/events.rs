//! Internal events for stage metrics emission.
//!
//! Each event struct represents a measurable occurrence in one of the stages.
//! Events implement the `InternalEvent` trait which emits the corresponding
//! Prometheus metric.
//!
//! ## Target Labels
//!
//! Silver and gold metrics carry a `target` label holding the column group
//! (e.g., `"notas"`, `"escola"`).

use metrics::{counter, histogram};
use std::time::Duration;
use tracing::trace;

use crate::outcome::UnitStatus;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

// ============================================================================
// Storage
// ============================================================================

/// Object store call made through `StorageProvider`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOperation {
    Get,
    Put,
    List,
    Upload,
}

impl StorageOperation {
    pub fn label(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Put => "put",
            Self::List => "list",
            Self::Upload => "upload",
        }
    }
}

/// One finished object store call, successful or not.
pub struct StorageRequestCompleted {
    pub operation: StorageOperation,
    pub ok: bool,
    pub duration: Duration,
}

impl InternalEvent for StorageRequestCompleted {
    fn emit(self) {
        let operation = self.operation.label();
        let status = if self.ok { "success" } else { "error" };
        trace!(operation, status, elapsed = ?self.duration, "Object store call");

        counter!("enem_storage_requests_total", "operation" => operation, "status" => status)
            .increment(1);
        histogram!("enem_storage_request_duration_seconds", "operation" => operation)
            .record(self.duration.as_secs_f64());
    }
}

// ============================================================================
// Bronze
// ============================================================================

/// Event emitted when a local file has been uploaded to the bronze tier.
pub struct FileUploaded {
    pub status: UnitStatus,
    pub bytes: u64,
}

impl InternalEvent for FileUploaded {
    fn emit(self) {
        trace!(status = self.status.as_str(), bytes = self.bytes, "File uploaded");
        counter!("enem_files_uploaded_total", "status" => self.status.as_str()).increment(1);
        counter!("enem_bytes_uploaded_total").increment(self.bytes);
    }
}

/// Event emitted when a CSV chunk has been written as a Parquet shard.
pub struct ChunkWritten {
    pub rows: u64,
    pub bytes: u64,
}

impl InternalEvent for ChunkWritten {
    fn emit(self) {
        trace!(rows = self.rows, bytes = self.bytes, "Chunk written");
        counter!("enem_chunks_written_total").increment(1);
        counter!("enem_chunk_rows_total").increment(self.rows);
    }
}

// ============================================================================
// Silver
// ============================================================================

/// Event emitted when a bronze shard has been transformed (or failed to be).
pub struct ShardProcessed {
    pub status: UnitStatus,
}

impl InternalEvent for ShardProcessed {
    fn emit(self) {
        trace!(status = self.status.as_str(), "Shard processed");
        counter!("enem_shards_processed_total", "status" => self.status.as_str()).increment(1);
    }
}

/// Event emitted when records are projected into a column group.
pub struct RecordsProcessed {
    pub count: u64,
    /// Column group label.
    pub target: String,
}

impl InternalEvent for RecordsProcessed {
    fn emit(self) {
        trace!(count = self.count, target = %self.target, "Records processed");
        counter!("enem_records_processed_total", "target" => self.target).increment(self.count);
    }
}

/// Event emitted when a silver Parquet file has been written.
pub struct SilverFileWritten {
    pub bytes: u64,
    /// Column group label.
    pub target: String,
}

impl InternalEvent for SilverFileWritten {
    fn emit(self) {
        trace!(bytes = self.bytes, target = %self.target, "Silver file written");
        counter!("enem_silver_files_written_total", "target" => self.target.clone()).increment(1);
        counter!("enem_bytes_written_total", "target" => self.target).increment(self.bytes);
    }
}

// ============================================================================
// Gold
// ============================================================================

/// Event emitted when a warehouse load job for a group has finished.
pub struct LoadJobCompleted {
    pub status: UnitStatus,
    pub duration: Duration,
    /// Column group (table) label.
    pub target: String,
}

impl InternalEvent for LoadJobCompleted {
    fn emit(self) {
        trace!(
            status = self.status.as_str(),
            duration_ms = self.duration.as_millis(),
            target = %self.target,
            "Load job completed"
        );
        counter!(
            "enem_load_jobs_total",
            "status" => self.status.as_str(),
            "target" => self.target.clone()
        )
        .increment(1);
        histogram!("enem_load_job_duration_seconds", "target" => self.target)
            .record(self.duration.as_secs_f64());
    }
}
