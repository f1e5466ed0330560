//! Error types for bronze ingestion.

use std::path::PathBuf;

use snafu::prelude::*;

pub use enem_core::error::{ConfigError, CsvError, ParquetError, StorageError};

/// Errors from uploading or chunking local files.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum IngestError {
    /// A local directory could not be listed.
    #[snafu(display("Failed to read directory {}: {source}", path.display()))]
    ReadDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A file could not be copied into the bucket.
    #[snafu(display("Failed to upload {}: {source}", path.display()))]
    Upload { path: PathBuf, source: StorageError },

    /// The configured delimiter is unusable.
    #[snafu(display("Invalid chunking delimiter: {source}"))]
    Delimiter { source: ConfigError },

    /// The CSV to chunk could not be opened.
    #[snafu(display("Failed to open {}: {source}", path.display()))]
    OpenCsv {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The CSV could not be decoded.
    #[snafu(display("Failed to read {}: {source}", path.display()))]
    ReadCsv { path: PathBuf, source: CsvError },

    /// A chunk could not be encoded as Parquet.
    #[snafu(display("Failed to encode chunk {index}: {source}"))]
    EncodeChunk { index: usize, source: ParquetError },

    /// A chunk could not be written to disk.
    #[snafu(display("Failed to write {}: {source}", path.display()))]
    WriteChunk {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The chunking task panicked or was cancelled.
    #[snafu(display("Chunking task failed: {source}"))]
    ChunkTask { source: tokio::task::JoinError },
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

    /// Ingestion error.
    #[snafu(display("Ingestion error: {source}"))]
    Ingest { source: IngestError },
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

impl From<IngestError> for PipelineError {
    fn from(source: IngestError) -> Self {
        PipelineError::Ingest { source }
    }
}
