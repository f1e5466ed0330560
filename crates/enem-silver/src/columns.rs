//! Column selection: denylist removal and group projection.
//!
//! Both work on column names only. A name that is not in the table is
//! never an error.

use std::collections::HashSet;

use tracing::debug;

use enem_core::{ParquetError, Table};

/// Indices of the columns that survive the denylist, in table order.
pub fn retained_indices(columns: &[&str], denylist: &[String]) -> Vec<usize> {
    let denied: HashSet<&str> = denylist.iter().map(String::as_str).collect();
    columns
        .iter()
        .enumerate()
        .filter(|(_, name)| !denied.contains(*name))
        .map(|(i, _)| i)
        .collect()
}

/// Which declared columns of a group the table has.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSelection {
    /// Table indices of the present columns, in declared order, each once.
    pub indices: Vec<usize>,
    /// Declared columns the table does not have.
    pub missing: Vec<String>,
}

impl GroupSelection {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Select `declared` from `columns`: the intersection, in declared order.
///
/// A column declared twice is selected once.
pub fn select_group(columns: &[&str], declared: &[String]) -> GroupSelection {
    let mut indices = Vec::with_capacity(declared.len());
    let mut missing = Vec::new();
    let mut seen = HashSet::new();

    for name in declared {
        if !seen.insert(name.as_str()) {
            continue;
        }
        match columns.iter().position(|c| *c == name.as_str()) {
            Some(i) => indices.push(i),
            None => missing.push(name.clone()),
        }
    }

    GroupSelection { indices, missing }
}

/// Drop every denylisted column present in `table`.
pub fn drop_denylisted(table: &Table, denylist: &[String]) -> Result<Table, ParquetError> {
    let columns = table.column_names();
    let keep = retained_indices(&columns, denylist);
    let dropped = columns.len() - keep.len();
    debug!(dropped, kept = keep.len(), "Applied column denylist");

    if dropped == 0 {
        return Ok(table.clone());
    }
    table.project(&keep)
}

/// Project `table` onto a group, or `None` when none of its columns are present.
pub fn project_group(
    table: &Table,
    group: &str,
    declared: &[String],
) -> Result<Option<Table>, ParquetError> {
    let selection = select_group(&table.column_names(), declared);

    if !selection.missing.is_empty() {
        debug!(
            target = %group,
            missing = ?selection.missing,
            "Group columns not present in source"
        );
    }

    if selection.is_empty() {
        return Ok(None);
    }
    table.project(&selection.indices).map(Some)
}
