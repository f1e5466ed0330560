//! Error types for the warehouse load.

use gcp_bigquery_client::error::BQError;
use snafu::prelude::*;

pub use enem_core::error::{ConfigError, ManifestError, StorageError};

/// Errors from the warehouse for a single group.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum WarehouseError {
    /// The group name cannot be used as a table identifier.
    #[snafu(display(
        "'{name}' is not a valid table name (letters, digits and underscores, at most 1024)"
    ))]
    InvalidTableName { name: String },

    /// The warehouse client could not be built.
    #[snafu(display("Failed to connect to BigQuery: {source}"))]
    Connect { source: BQError },

    /// The load job request could not be built.
    #[snafu(display("Failed to build load job for {table}: {source}"))]
    JobEncode {
        table: String,
        source: serde_json::Error,
    },

    /// The load job was rejected on submission.
    #[snafu(display("Failed to submit load job for {table}: {source}"))]
    Submit { table: String, source: BQError },

    /// The job status could not be fetched.
    #[snafu(display("Failed to poll load job {job_id}: {source}"))]
    Poll { job_id: String, source: BQError },

    /// The service returned a job we could not read.
    #[snafu(display("Unreadable load job response: {source}"))]
    JobStatus { source: serde_json::Error },

    /// The service returned a job without an id.
    #[snafu(display("Load job for {table} has no job id"))]
    MissingJobId { table: String },

    /// The job finished with an error.
    #[snafu(display("Load job {job_id} failed: {message}"))]
    JobFailed { job_id: String, message: String },
}

/// Errors finding the groups to load.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DiscoveryError {
    /// Listing the silver prefix failed.
    #[snafu(display("Failed to list {prefix}: {source}"))]
    List { prefix: String, source: StorageError },

    /// The silver manifest could not be read.
    #[snafu(display("Failed to read silver manifest: {source}"))]
    ReadManifest { source: ManifestError },
}

/// Top-level errors that abort the whole run.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PipelineError {
    /// Configuration error.
    #[snafu(display("Configuration error: {source}"))]
    Config { source: ConfigError },

    /// Storage error.
    #[snafu(display("Storage error: {source}"))]
    Storage { source: StorageError },

    /// Group discovery failed.
    #[snafu(display("Discovery error: {source}"))]
    Discovery { source: DiscoveryError },

    /// The warehouse is unreachable.
    #[snafu(display("Warehouse error: {source}"))]
    Warehouse { source: WarehouseError },
}

impl From<StorageError> for PipelineError {
    fn from(source: StorageError) -> Self {
        PipelineError::Storage { source }
    }
}

impl From<ConfigError> for PipelineError {
    fn from(source: ConfigError) -> Self {
        PipelineError::Config { source }
    }
}

impl From<DiscoveryError> for PipelineError {
    fn from(source: DiscoveryError) -> Self {
        PipelineError::Discovery { source }
    }
}

impl From<WarehouseError> for PipelineError {
    fn from(source: WarehouseError) -> Self {
        PipelineError::Warehouse { source }
    }
}
