//! Configuration for the silver transformation.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::info;

use enem_core::config::{default_csv_delimiter, delimiter_byte, require_non_empty};
use enem_core::{
    ConfigError, CsvEncoding, ErrorHandlingConfig, MetricsConfig, ParquetCompression, StageConfig,
    StorageConfig,
};

/// Ordered mapping from group name to the columns it keeps.
///
/// Iteration follows declaration order in the config file.
pub type ColumnGroups = IndexMap<String, Vec<String>>;

/// The parts of the shared config document the silver stage reads.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub silver: SilverConfig,
    #[serde(default)]
    pub error_handling: ErrorHandlingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Format of the bronze shards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    #[default]
    Parquet,
    Csv,
}

impl InputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            InputFormat::Parquet => "parquet",
            InputFormat::Csv => "csv",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SilverConfig {
    /// Shard path prefix, e.g. `bronze/parquet/MICRODADOS_ENEM_2023_chunk_`.
    pub source_prefix: String,
    #[serde(default)]
    pub input_format: InputFormat,
    /// Match every `{source_prefix}*.{format}` shard instead of the single
    /// file `{source_prefix}.{format}`.
    #[serde(default = "default_partitioned")]
    pub partitioned: bool,
    pub destination_prefix: String,
    /// Columns dropped from every shard before grouping.
    #[serde(default)]
    pub column_denylist: Vec<String>,
    pub column_groups: ColumnGroups,
    #[serde(default)]
    pub compression: ParquetCompression,
    #[serde(default = "default_csv_delimiter")]
    pub csv_delimiter: char,
    #[serde(default)]
    pub csv_encoding: CsvEncoding,
    /// Write `{destination_prefix}/_manifest.json` after a clean run.
    #[serde(default = "default_write_manifest")]
    pub write_manifest: bool,
}

fn default_partitioned() -> bool {
    true
}

fn default_write_manifest() -> bool {
    true
}

impl SilverConfig {
    pub fn csv_delimiter_byte(&self) -> Result<u8, ConfigError> {
        delimiter_byte("silver.csv_delimiter", self.csv_delimiter)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        for (field, value) in [
            ("silver.source_prefix", &self.source_prefix),
            ("silver.destination_prefix", &self.destination_prefix),
        ] {
            if let Err(e) = require_non_empty(field, value) {
                errors.push(e.to_string());
            }
        }

        if self.column_groups.is_empty() {
            errors.push("silver.column_groups cannot be empty".to_string());
        }
        for (group, columns) in &self.column_groups {
            if group.trim().is_empty() {
                errors.push("column group names cannot be empty".to_string());
            } else if columns.is_empty() {
                errors.push(
                    ConfigError::EmptyGroup {
                        group: group.clone(),
                    }
                    .to_string(),
                );
            }
        }

        if let Err(e) = self.csv_delimiter_byte() {
            errors.push(e.to_string());
        }

        match errors.len() {
            0 => Ok(()),
            _ => Err(ConfigError::MultipleErrors { errors }),
        }
    }
}

impl StageConfig for Config {
    const STAGE: &'static str = "silver";

    fn validate(&self) -> Result<(), ConfigError> {
        self.storage.validate()?;
        self.silver.validate()
    }

    fn metrics(&self) -> &MetricsConfig {
        &self.metrics
    }

    fn log_startup_info(&self) {
        let silver = &self.silver;
        info!(
            "Transforming {}*.{} -> {} ({} group(s), {} denylisted column(s))",
            silver.source_prefix,
            silver.input_format.extension(),
            silver.destination_prefix,
            silver.column_groups.len(),
            silver.column_denylist.len()
        );
        for (group, columns) in &silver.column_groups {
            info!("  Group: {group} ({} column(s))", columns.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
storage:
  bucket: enem-bucket
silver:
  source_prefix: bronze/parquet/MICRODADOS_ENEM_2023_chunk_
  destination_prefix: silver/parquet
  column_denylist: [CO_PROVA_CN, TX_RESPOSTAS_CN]
  column_groups:
    participante: [NU_INSCRICAO, NU_ANO, TP_FAIXA_ETARIA]
    notas: [NU_INSCRICAO, NU_NOTA_CN]
    escola: [NU_INSCRICAO, CO_MUNICIPIO_ESC]
gold:
  project_id: ignored-here
"#;

    #[test]
    fn test_defaults_and_group_order() {
        let config: Config = serde_yaml::from_str(YAML).unwrap();
        StageConfig::validate(&config).unwrap();

        let silver = &config.silver;
        assert!(silver.partitioned);
        assert!(silver.write_manifest);
        assert_eq!(silver.input_format, InputFormat::Parquet);
        assert_eq!(silver.compression, ParquetCompression::Snappy);
        assert_eq!(silver.csv_delimiter_byte().unwrap(), b';');
        assert_eq!(silver.csv_encoding, CsvEncoding::Utf8);
        assert_eq!(
            silver.column_groups.keys().collect::<Vec<_>>(),
            vec!["participante", "notas", "escola"]
        );
        assert_eq!(config.error_handling.max_failures, 1);
    }

    #[test]
    fn test_validation_collects_errors() {
        let mut config: Config = serde_yaml::from_str(YAML).unwrap();
        config.silver.destination_prefix = String::new();
        config.silver.column_groups.insert("vazio".to_string(), vec![]);

        let err = config.silver.validate().unwrap_err();
        match err {
            ConfigError::MultipleErrors { errors } => {
                assert_eq!(errors.len(), 2);
                assert!(errors[1].contains("vazio"));
            }
            other => panic!("expected MultipleErrors, got {other}"),
        }
    }

    #[test]
    fn test_unknown_silver_field_rejected() {
        let yaml = YAML.replace("destination_prefix:", "destination:");
        assert!(serde_yaml::from_str::<Config>(&yaml).is_err());
    }
}
