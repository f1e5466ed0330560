//! Configuration for bronze ingestion and CSV chunking.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::info;

use enem_core::config::{default_csv_delimiter, delimiter_byte, require_non_empty};
use enem_core::{
    ConfigError, CsvEncoding, ErrorHandlingConfig, MetricsConfig, ParquetCompression, StageConfig,
    StorageConfig,
};

/// The parts of the shared config document the bronze stage reads.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    #[serde(default)]
    pub bronze: BronzeConfig,
    #[serde(default)]
    pub error_handling: ErrorHandlingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BronzeConfig {
    /// Single files to copy into the bucket.
    #[serde(default)]
    pub uploads: Vec<FileUpload>,
    /// Local directories whose direct files are copied under a prefix.
    #[serde(default)]
    pub directories: Vec<DirectoryUpload>,
    #[serde(default)]
    pub chunking: Option<ChunkingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileUpload {
    pub source: PathBuf,
    /// Object path inside the bucket, e.g. `bronze/microdados_enem.csv`.
    pub destination: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirectoryUpload {
    pub source: PathBuf,
    pub destination_prefix: String,
}

/// Splitting a large local CSV into numbered Parquet shards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChunkingConfig {
    pub source: PathBuf,
    pub output_dir: PathBuf,
    #[serde(default = "default_rows_per_chunk")]
    pub rows_per_chunk: usize,
    #[serde(default = "default_csv_delimiter")]
    pub delimiter: char,
    #[serde(default)]
    pub encoding: CsvEncoding,
    #[serde(default)]
    pub compression: ParquetCompression,
    /// Rows read to infer column types. All rows when unset, which costs one
    /// extra pass over the file.
    #[serde(default)]
    pub infer_schema_rows: Option<usize>,
}

fn default_rows_per_chunk() -> usize {
    500_000
}

impl ChunkingConfig {
    pub fn delimiter_byte(&self) -> Result<u8, ConfigError> {
        delimiter_byte("bronze.chunking.delimiter", self.delimiter)
    }
}

impl BronzeConfig {
    pub fn has_uploads(&self) -> bool {
        !self.uploads.is_empty() || !self.directories.is_empty()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        for upload in &self.uploads {
            if upload.source.as_os_str().is_empty() {
                errors.push("bronze.uploads[].source cannot be empty".to_string());
            }
            if let Err(e) = require_non_empty("bronze.uploads[].destination", &upload.destination)
            {
                errors.push(e.to_string());
            }
        }

        for directory in &self.directories {
            if directory.source.as_os_str().is_empty() {
                errors.push("bronze.directories[].source cannot be empty".to_string());
            }
        }

        if let Some(chunking) = &self.chunking {
            if chunking.infer_schema_rows == Some(0) {
                errors.push("bronze.chunking.infer_schema_rows must be at least 1".to_string());
            }
            if chunking.rows_per_chunk == 0 {
                errors.push("bronze.chunking.rows_per_chunk must be at least 1".to_string());
            }
            if let Err(e) = chunking.delimiter_byte() {
                errors.push(e.to_string());
            }
        }

        match errors.len() {
            0 => Ok(()),
            _ => Err(ConfigError::MultipleErrors { errors }),
        }
    }
}

impl StageConfig for Config {
    const STAGE: &'static str = "bronze";

    fn validate(&self) -> Result<(), ConfigError> {
        self.storage.validate()?;
        self.bronze.validate()
    }

    fn metrics(&self) -> &MetricsConfig {
        &self.metrics
    }

    fn log_startup_info(&self) {
        let bronze = &self.bronze;
        info!(
            "Bronze ingestion into {}: {} file(s), {} directory(ies)",
            self.storage.bucket_url(),
            bronze.uploads.len(),
            bronze.directories.len()
        );
        if let Some(chunking) = &bronze.chunking {
            info!(
                "  Chunking {} -> {} ({} rows per chunk)",
                chunking.source.display(),
                chunking.output_dir.display(),
                chunking.rows_per_chunk
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
storage:
  bucket: enem-bucket
bronze:
  uploads:
    - source: dados/MICRODADOS_ENEM_2023.csv
      destination: bronze/microdados_enem.csv
  directories:
    - source: parquet_chunks
      destination_prefix: bronze/parquet
  chunking:
    source: dados/MICRODADOS_ENEM_2023.csv
    output_dir: parquet_chunks
silver:
  source_prefix: ignored-here
"#;

    #[test]
    fn test_defaults() {
        let config: Config = serde_yaml::from_str(YAML).unwrap();
        StageConfig::validate(&config).unwrap();

        let chunking = config.bronze.chunking.as_ref().unwrap();
        assert_eq!(chunking.rows_per_chunk, 500_000);
        assert_eq!(chunking.delimiter_byte().unwrap(), b';');
        assert_eq!(chunking.infer_schema_rows, None);
        assert_eq!(chunking.encoding, CsvEncoding::Utf8);
        assert!(config.bronze.has_uploads());
    }

    #[test]
    fn test_section_optional() {
        let config: Config = serde_yaml::from_str("storage:\n  bucket: enem-bucket\n").unwrap();
        StageConfig::validate(&config).unwrap();
        assert!(!config.bronze.has_uploads());
        assert!(config.bronze.chunking.is_none());
    }

    #[test]
    fn test_validation_collects_errors() {
        let mut config: Config = serde_yaml::from_str(YAML).unwrap();
        config.bronze.uploads[0].destination = " ".to_string();
        if let Some(chunking) = config.bronze.chunking.as_mut() {
            chunking.rows_per_chunk = 0;
        }

        match config.bronze.validate().unwrap_err() {
            ConfigError::MultipleErrors { errors } => {
                assert_eq!(errors.len(), 2);
                assert!(errors[0].contains("destination"));
                assert!(errors[1].contains("rows_per_chunk"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
