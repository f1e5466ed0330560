//! Configuration types shared by every stage.

mod loader;
mod path;
mod vars;

pub use loader::{load_from_paths, merge_values};
pub use path::{CliArgs, ConfigArgs, ConfigPath, is_yaml_file};
pub use vars::interpolate;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::ConfigError;

/// Byte size constants (binary/IEC units).
pub const KB: usize = 1024;
pub const MB: usize = 1024 * KB;

/// Object storage location and credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Bare GCS bucket name, or a `gs://`, `s3://`, `file://` URL or absolute path.
    pub bucket: String,
    /// Service-account key file shared by storage and the warehouse client.
    #[serde(default)]
    pub credentials_path: Option<PathBuf>,
    /// Extra backend options (e.g. `aws_region`, `google_application_credentials`).
    #[serde(default)]
    pub options: HashMap<String, String>,
}

impl StorageConfig {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            credentials_path: None,
            options: HashMap::new(),
        }
    }

    /// The bucket as a storage URL.
    ///
    /// A bare name is a GCS bucket; anything with a scheme or a leading `/`
    /// is used as given.
    pub fn bucket_url(&self) -> String {
        let bucket = self.bucket.trim_end_matches('/');
        if bucket.contains("://") || bucket.starts_with('/') || bucket.starts_with("file:") {
            bucket.to_string()
        } else {
            format!("gs://{bucket}")
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket.trim().is_empty() {
            return Err(ConfigError::EmptyBucket);
        }
        Ok(())
    }
}

/// Metrics export for batch runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Prometheus text exposition written here when the stage exits.
    #[serde(default)]
    pub textfile: Option<PathBuf>,
}

/// How many unit failures a stage tolerates before it stops.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ErrorHandlingConfig {
    /// Maximum failures before stopping (0 = unlimited, default: 1).
    #[serde(default = "default_max_failures")]
    pub max_failures: usize,
}

impl Default for ErrorHandlingConfig {
    fn default() -> Self {
        Self {
            max_failures: default_max_failures(),
        }
    }
}

fn default_max_failures() -> usize {
    1
}

/// Parquet compression codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ParquetCompression {
    Uncompressed,
    #[default]
    Snappy,
    Gzip,
    Zstd,
    Lz4,
}

impl From<ParquetCompression> for parquet::basic::Compression {
    fn from(compression: ParquetCompression) -> Self {
        use parquet::basic::{Compression, GzipLevel, ZstdLevel};

        match compression {
            ParquetCompression::Uncompressed => Compression::UNCOMPRESSED,
            ParquetCompression::Snappy => Compression::SNAPPY,
            ParquetCompression::Gzip => Compression::GZIP(GzipLevel::default()),
            ParquetCompression::Zstd => Compression::ZSTD(ZstdLevel::default()),
            ParquetCompression::Lz4 => Compression::LZ4_RAW,
        }
    }
}

/// Character encoding of a CSV source. INEP publishes the microdata in Latin-1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CsvEncoding {
    #[default]
    #[serde(rename = "utf-8", alias = "utf8")]
    Utf8,
    #[serde(rename = "latin1", alias = "iso-8859-1")]
    Latin1,
}

impl CsvEncoding {
    /// Encoding to transcode from, or `None` when the bytes are already UTF-8.
    pub fn transcode_from(self) -> Option<&'static encoding_rs::Encoding> {
        match self {
            CsvEncoding::Utf8 => None,
            // WHATWG maps the latin1 label to windows-1252, a superset of
            // ISO-8859-1 for printable characters.
            CsvEncoding::Latin1 => Some(encoding_rs::WINDOWS_1252),
        }
    }
}

/// Reject an empty or whitespace-only string field.
pub fn require_non_empty(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::EmptyField {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Convert a configured delimiter to the single byte the CSV codec expects.
pub fn delimiter_byte(field: &str, delimiter: char) -> Result<u8, ConfigError> {
    if delimiter.is_ascii() {
        Ok(delimiter as u8)
    } else {
        Err(ConfigError::InvalidDelimiter {
            field: field.to_string(),
            delimiter,
        })
    }
}

/// Default CSV delimiter of the ENEM microdata.
pub fn default_csv_delimiter() -> char {
    ';'
}
