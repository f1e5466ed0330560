//! Warehouse abstraction for full-replace Parquet loads.
//!
//! A load always replaces the whole table with the given files; there is no
//! append mode. `BigQueryWarehouse` is the production implementation.

mod bigquery;

pub use bigquery::{BigQueryWarehouse, load_job_request};

use std::fmt;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use crate::error::WarehouseError;

static TABLE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_]{1,1024}$").expect("valid table name regex")
});

/// Fully qualified destination table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
}

impl TableRef {
    /// Build a reference, rejecting table names the warehouse would not accept.
    pub fn new(
        project_id: impl Into<String>,
        dataset_id: impl Into<String>,
        table_id: &str,
    ) -> Result<Self, WarehouseError> {
        validate_table_name(table_id)?;
        Ok(Self {
            project_id: project_id.into(),
            dataset_id: dataset_id.into(),
            table_id: table_id.to_string(),
        })
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project_id, self.dataset_id, self.table_id)
    }
}

/// Check that `name` is a usable table identifier.
pub fn validate_table_name(name: &str) -> Result<(), WarehouseError> {
    if TABLE_NAME.is_match(name) {
        Ok(())
    } else {
        Err(WarehouseError::InvalidTableName {
            name: name.to_string(),
        })
    }
}

/// A load job that ran to completion without errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadJob {
    pub job_id: String,
    /// Rows in the table after the load, when the service reports it.
    pub output_rows: Option<u64>,
}

/// A warehouse that can replace a table's contents with Parquet files.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Replace `table` with the rows of every file in `uris` and wait for the
    /// job to finish. A job that finishes with an error is returned as `Err`.
    async fn load_parquet(
        &self,
        table: &TableRef,
        uris: &[String],
    ) -> Result<LoadJob, WarehouseError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_table_names() {
        for name in ["notas", "socioeconomico", "Group_2023", "_x", "1"] {
            assert!(validate_table_name(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn test_invalid_table_names() {
        for name in ["", "notas-2023", "notas.v2", "ação", "with space"] {
            assert!(
                matches!(
                    validate_table_name(name),
                    Err(WarehouseError::InvalidTableName { .. })
                ),
                "{name}"
            );
        }
        assert!(validate_table_name(&"a".repeat(1025)).is_err());
        assert!(validate_table_name(&"a".repeat(1024)).is_ok());
    }

    #[test]
    fn test_table_ref_display() {
        let table = TableRef::new("enem-project", "dados_enem_2023", "notas").unwrap();
        assert_eq!(table.to_string(), "enem-project.dados_enem_2023.notas");
    }
}
