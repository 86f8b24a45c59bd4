//! Read-only collaborator inputs: the table's column list and the named
//! session-variable placeholders offered as value suggestions. Both are
//! fetched by the surrounding layer before the editor opens; this core
//! only reads them. An empty column list is tolerated everywhere (it just
//! means no preset can be added and no column can be validated).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableContext {
    /// Ordered column names of the table under edit.
    #[serde(default)]
    pub columns: Vec<String>,
    /// Session-claim placeholders (`X-Hasura-User-Id`, ...) offered as
    /// free-form suggestions for rule and preset values, never enforced.
    #[serde(default)]
    pub permission_variables: Vec<String>,
}

impl TableContext {
    pub fn new(columns: Vec<String>) -> Self {
        TableContext {
            columns,
            permission_variables: Vec::new(),
        }
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|column| column == name)
    }

    pub fn total_columns(&self) -> usize {
        self.columns.len()
    }
}
