//! Common error types shared by the bronze, silver and gold stages.
//!
//! This module defines error types for storage, configuration, columnar
//! codecs and metrics that every stage crate builds on.

use snafu::prelude::*;

// ============ Storage Errors ============

/// Errors that can occur during storage operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StorageError {
    /// Invalid storage URL format.
    #[snafu(display("Invalid storage URL: {url}"))]
    InvalidUrl { url: String },

    /// Object store operation failed.
    #[snafu(display("Storage operation failed: {source}"))]
    ObjectStore { source: object_store::Error },

    /// IO error during storage operations.
    #[snafu(display("IO error: {source}"))]
    Io { source: std::io::Error },

    /// Failed to read a local file for upload.
    #[snafu(display("Failed to read local file {}: {source}", path.display()))]
    LocalRead {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    /// Streaming upload failed before the object was committed.
    #[snafu(display("Upload of {path} failed: {source}"))]
    Upload {
        path: String,
        source: std::io::Error,
    },

    /// S3 configuration error.
    #[snafu(display("S3 configuration error: {source}"))]
    S3Config { source: object_store::Error },

    /// GCS configuration error.
    #[snafu(display("GCS configuration error: {source}"))]
    GcsConfig { source: object_store::Error },
}

impl StorageError {
    /// Check if this error represents a "not found" condition (404, NoSuchKey, etc.)
    pub fn is_not_found(&self) -> bool {
        match self {
            StorageError::ObjectStore { source } => {
                matches!(source, object_store::Error::NotFound { .. })
            }
            _ => false,
        }
    }
}

// ============ Config Errors ============

/// Errors that can occur during configuration parsing and validation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// Bucket is empty.
    #[snafu(display("storage.bucket cannot be empty"))]
    EmptyBucket,

    /// A required string field is empty.
    #[snafu(display("{field} cannot be empty"))]
    EmptyField { field: String },

    /// A delimiter that is not a single ASCII character.
    #[snafu(display("{field} must be a single ASCII character, got '{delimiter}'"))]
    InvalidDelimiter { field: String, delimiter: char },

    /// A column group declares no columns.
    #[snafu(display("Column group '{group}' declares no columns"))]
    EmptyGroup { group: String },

    /// Environment variable interpolation failed.
    #[snafu(display("Environment variable interpolation failed:\n{message}"))]
    EnvInterpolation { message: String },

    /// Failed to parse YAML configuration.
    #[snafu(display("Failed to parse YAML: {source}"))]
    YamlParse { source: serde_yaml::Error },

    /// Failed to read configuration file.
    #[snafu(display("Failed to read configuration file: {source}"))]
    ReadFile { source: std::io::Error },

    /// Unsupported config file format.
    #[snafu(display("Unsupported config format for {}: only .yaml/.yml supported", path.display()))]
    UnsupportedFormat { path: std::path::PathBuf },

    /// Failed to read configuration directory.
    #[snafu(display("Failed to read directory {}", path.display()))]
    ReadDir {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    /// No configuration files were given.
    #[snafu(display("No config files or directories specified"))]
    NoConfigPaths,

    /// Multiple configuration errors occurred.
    #[snafu(display("Multiple config errors:\n{}", errors.join("\n")))]
    MultipleErrors { errors: Vec<String> },
}

// ============ Columnar Errors ============

/// Errors that can occur while encoding or decoding Parquet.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ParquetError {
    /// Failed to open a Parquet payload.
    #[snafu(display("Failed to read Parquet: {source}"))]
    ParquetRead {
        source: parquet::errors::ParquetError,
    },

    /// Failed to decode a record batch.
    #[snafu(display("Failed to decode Parquet batch: {source}"))]
    BatchDecode { source: arrow::error::ArrowError },

    /// Failed to create the Parquet writer.
    #[snafu(display("Failed to create Parquet writer: {source}"))]
    WriterCreate {
        source: parquet::errors::ParquetError,
    },

    /// Failed to write to Parquet.
    #[snafu(display("Failed to write to Parquet: {source}"))]
    ParquetWrite {
        source: parquet::errors::ParquetError,
    },

    /// Failed to project a batch onto a column subset.
    #[snafu(display("Failed to project columns: {source}"))]
    Projection { source: arrow::error::ArrowError },
}

/// Errors that can occur while decoding CSV.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CsvError {
    /// Schema inference over the leading rows failed.
    #[snafu(display("Failed to infer CSV schema: {source}"))]
    InferSchema { source: arrow::error::ArrowError },

    /// Failed to build the CSV reader.
    #[snafu(display("Failed to build CSV reader: {source}"))]
    ReaderBuild { source: arrow::error::ArrowError },

    /// A row could not be decoded with the inferred schema.
    #[snafu(display("Failed to decode CSV batch: {source}"))]
    CsvDecode { source: arrow::error::ArrowError },

    /// Rewinding the input after inference failed.
    #[snafu(display("Failed to rewind CSV input: {source}"))]
    Rewind { source: std::io::Error },
}

// ============ Manifest Errors ============

/// Errors that can occur while reading or writing the silver manifest.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ManifestError {
    /// The manifest could not be serialized.
    #[snafu(display("Failed to encode manifest: {source}"))]
    ManifestEncode { source: serde_json::Error },

    /// The stored manifest is not valid JSON for this version.
    #[snafu(display("Failed to decode manifest {path}: {source}"))]
    ManifestDecode {
        path: String,
        source: serde_json::Error,
    },

    /// Storage error while reading or writing the manifest.
    #[snafu(display("Manifest storage error: {source}"))]
    ManifestStorage { source: StorageError },
}

// ============ Metrics Errors ============

/// Errors that can occur during metrics initialization and export.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MetricsError {
    /// Failed to initialize Prometheus recorder.
    #[snafu(display("Failed to initialize Prometheus recorder"))]
    PrometheusInit {
        source: metrics_exporter_prometheus::BuildError,
    },

    /// Metrics recorder already initialized (double-init attempted).
    #[snafu(display("Metrics recorder already initialized"))]
    AlreadyInitialized,

    /// Failed to write the textfile export.
    #[snafu(display("Failed to write metrics textfile {}: {source}", path.display()))]
    TextfileWrite {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
}
