//! Error types for the silver transformation.

use snafu::prelude::*;

pub use enem_core::error::{ConfigError, CsvError, ManifestError, ParquetError, StorageError};

/// Errors that fail a single shard. The run records them and moves on
/// (or stops, per the failure budget).
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum TransformError {
    /// The shard could not be fetched.
    #[snafu(display("Failed to read {path}: {source}"))]
    ReadShard { path: String, source: StorageError },

    /// The shard is not valid Parquet.
    #[snafu(display("Failed to decode {path}: {source}"))]
    DecodeParquet { path: String, source: ParquetError },

    /// The shard is not valid CSV.
    #[snafu(display("Failed to decode {path}: {source}"))]
    DecodeCsv { path: String, source: CsvError },

    /// Dropping the denylisted columns failed.
    #[snafu(display("Failed to apply column denylist to {path}: {source}"))]
    Denylist { path: String, source: ParquetError },

    /// Column projection failed.
    #[snafu(display("Failed to project group '{group}': {source}"))]
    Project { group: String, source: ParquetError },

    /// A group file could not be encoded.
    #[snafu(display("Failed to encode group '{group}': {source}"))]
    Encode { group: String, source: ParquetError },

    /// A group file could not be written.
    #[snafu(display("Failed to write {path}: {source}"))]
    WriteGroup { path: String, source: StorageError },
}

/// Top-level errors that abort the whole run.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PipelineError {
    /// Configuration error.
    #[snafu(display("Configuration error: {source}"))]
    Config { source: ConfigError },

    /// Storage error (connecting or listing).
    #[snafu(display("Storage error: {source}"))]
    Storage { source: StorageError },

    /// Manifest error.
    #[snafu(display("Manifest error: {source}"))]
    Manifest { source: ManifestError },
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

impl From<ManifestError> for PipelineError {
    fn from(source: ManifestError) -> Self {
        PipelineError::Manifest { source }
    }
}
