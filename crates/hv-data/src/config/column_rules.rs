//! Column drop/rename rules applied while reading exported screening tables

use serde::{Serialize, Deserialize};

/// Rules that clean up exported column names before schema detection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnRules {
    /// Columns whose name contains any of these fragments are dropped
    pub drop_containing: Vec<String>,

    /// `(from, to)` prefix rewrites, first match wins
    pub rename_prefixes: Vec<(String, String)>,
}

impl Default for ColumnRules {
    fn default() -> Self {
        Self {
            drop_containing: vec!["_bar_".to_string(), "cbv_ratio".to_string()],
            rename_prefixes: vec![("AC_zscore_n_".to_string(), "zscore_".to_string())],
        }
    }
}

impl ColumnRules {
    /// Rules that keep every column unchanged
    pub fn passthrough() -> Self {
        Self {
            drop_containing: Vec::new(),
            rename_prefixes: Vec::new(),
        }
    }

    /// The output name of `column`, or `None` when it is dropped
    pub fn apply(&self, column: &str) -> Option<String> {
        if self.drop_containing.iter().any(|fragment| column.contains(fragment.as_str())) {
            return None;
        }
        for (from, to) in &self.rename_prefixes {
            if let Some(rest) = column.strip_prefix(from.as_str()) {
                return Some(format!("{}{}", to, rest));
            }
        }
        Some(column.to_string())
    }
}
