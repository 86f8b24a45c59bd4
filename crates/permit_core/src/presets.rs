//! Column presets: values forced onto columns during insert/update,
//! usually sourced from a session variable.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::PolicyError;

/// One preset row. `value` is a literal string or a session-variable
/// reference (`X-Hasura-User-Id`); `None` means the value widget was
/// cleared.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnPreset {
    pub column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ColumnPreset {
    fn blank() -> Self {
        ColumnPreset {
            column: String::new(),
            value: Some(String::new()),
        }
    }
}

/// The ordered preset rows of one permission. Non-empty columns are
/// pairwise distinct at all times; mutations that would break that are
/// rejected without touching the rows.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct PresetSet {
    rows: Vec<ColumnPreset>,
}

impl PresetSet {
    pub fn new() -> Self {
        PresetSet { rows: Vec::new() }
    }

    pub fn rows(&self) -> &[ColumnPreset] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Columns already claimed by a preset row; the UI greys these out in
    /// the column picker of every other row.
    pub fn used_columns(&self) -> BTreeSet<&str> {
        self.rows
            .iter()
            .filter(|row| !row.column.is_empty())
            .map(|row| row.column.as_str())
            .collect()
    }

    /// Appends a blank row. There can never be more presets than the
    /// table has columns.
    pub fn add(&mut self, total_columns: usize) -> Result<(), PolicyError> {
        if self.rows.len() >= total_columns {
            return Err(PolicyError::PresetLimitReached { total_columns });
        }
        self.rows.push(ColumnPreset::blank());
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Result<ColumnPreset, PolicyError> {
        if index >= self.rows.len() {
            return Err(PolicyError::PresetIndexOutOfRange {
                index,
                len: self.rows.len(),
            });
        }
        Ok(self.rows.remove(index))
    }

    /// Points a row at a column. Rejected if another row already uses the
    /// column.
    pub fn set_column(&mut self, index: usize, column: &str) -> Result<(), PolicyError> {
        if index >= self.rows.len() {
            return Err(PolicyError::PresetIndexOutOfRange {
                index,
                len: self.rows.len(),
            });
        }
        if !column.is_empty() {
            let taken = self
                .rows
                .iter()
                .enumerate()
                .any(|(i, row)| i != index && row.column == column);
            if taken {
                return Err(PolicyError::DuplicatePresetColumn(column.to_string()));
            }
        }
        self.rows[index].column = column.to_string();
        Ok(())
    }

    pub fn set_value(&mut self, index: usize, value: Option<String>) -> Result<(), PolicyError> {
        if index >= self.rows.len() {
            return Err(PolicyError::PresetIndexOutOfRange {
                index,
                len: self.rows.len(),
            });
        }
        self.rows[index].value = value;
        Ok(())
    }

    pub(crate) fn push_loaded(&mut self, column: String, value: Option<String>) {
        self.rows.push(ColumnPreset { column, value });
    }
}
