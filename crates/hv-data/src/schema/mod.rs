//! Column layout detection from header names

use crate::SchemaError;

pub const COUNT_PREFIX: &str = "count_";
pub const SCORE_PREFIX: &str = "zscore_";
pub const STRUCTURE_SUFFIX: &str = "_smiles";
pub const STRUCTURE_COLUMN: &str = "SMILES";
pub const COMPOUND_COLUMN: &str = "compound";
pub const LIBRARY_COLUMN: &str = "library";
pub const AXIS_COLUMN: &str = "axis";
pub const HISTORY_HITS_COLUMN: &str = "history_hits";
pub const NEGATIVE_CONTROL: &str = "zscore_NTC";

/// Schema detector for classifying columns by naming convention
pub struct SchemaDetector {
    case_sensitive: bool,
}

/// The roles of every column of an input table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    /// All columns, in header order
    pub columns: Vec<String>,
    /// Columns named `count_*`
    pub count_columns: Vec<String>,
    /// Columns named `zscore_*`
    pub score_columns: Vec<String>,
    /// Columns named `*_smiles`, or `SMILES`
    pub structure_columns: Vec<String>,
    pub has_compound: bool,
    pub has_library: bool,
    pub has_axis: bool,
    pub has_history_hits: bool,
}

impl SchemaDetector {
    /// Create a new schema detector
    pub fn new() -> Self {
        Self { case_sensitive: false }
    }

    /// Match prefixes and suffixes case-sensitively
    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    /// Classify `columns`; fails when a required column family is missing
    pub fn detect(&self, columns: &[String]) -> Result<ColumnLayout, SchemaError> {
        if columns.is_empty() {
            return Err(SchemaError::EmptyInput);
        }

        let count_columns = self.find_columns(columns, COUNT_PREFIX, "");
        if count_columns.is_empty() {
            return Err(SchemaError::MissingColumns { kind: "count", pattern: "prefix \"count_\"" });
        }

        let score_columns = self.find_columns(columns, SCORE_PREFIX, "");
        if score_columns.is_empty() {
            return Err(SchemaError::MissingColumns { kind: "score", pattern: "prefix \"zscore_\"" });
        }

        let mut structure_columns = Vec::new();
        for column in columns {
            if self.matches(column, "", STRUCTURE_SUFFIX) || self.equals(column, STRUCTURE_COLUMN) {
                structure_columns.push(column.clone());
            }
        }
        if structure_columns.is_empty() {
            return Err(SchemaError::MissingColumns {
                kind: "structure",
                pattern: "suffix \"_smiles\" or a \"SMILES\" column",
            });
        }

        let has = |name: &str| columns.iter().any(|c| c == name);

        Ok(ColumnLayout {
            columns: columns.to_vec(),
            count_columns,
            score_columns,
            structure_columns,
            has_compound: has(COMPOUND_COLUMN),
            has_library: has(LIBRARY_COLUMN),
            has_axis: has(AXIS_COLUMN),
            has_history_hits: has(HISTORY_HITS_COLUMN),
        })
    }

    fn find_columns(&self, columns: &[String], prefix: &str, suffix: &str) -> Vec<String> {
        columns
            .iter()
            .filter(|column| self.matches(column, prefix, suffix))
            .cloned()
            .collect()
    }

    fn matches(&self, column: &str, prefix: &str, suffix: &str) -> bool {
        if self.case_sensitive {
            column.starts_with(prefix) && column.ends_with(suffix)
        } else {
            let column = column.to_lowercase();
            column.starts_with(&prefix.to_lowercase()) && column.ends_with(&suffix.to_lowercase())
        }
    }

    fn equals(&self, column: &str, name: &str) -> bool {
        if self.case_sensitive {
            column == name
        } else {
            column.eq_ignore_ascii_case(name)
        }
    }
}

impl Default for SchemaDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ColumnLayout {
    /// Display name of a score column: `zscore_x` → `x`
    pub fn metric_name(score_column: &str) -> &str {
        match score_column.get(..SCORE_PREFIX.len()) {
            Some(prefix) if prefix.eq_ignore_ascii_case(SCORE_PREFIX) => &score_column[SCORE_PREFIX.len()..],
            _ => score_column,
        }
    }

    /// The `count_*` column paired with a score column
    pub fn count_column_for(&self, score_column: &str) -> Option<&str> {
        let wanted = format!("{}{}", COUNT_PREFIX, Self::metric_name(score_column));
        self.count_columns
            .iter()
            .find(|c| c.eq_ignore_ascii_case(&wanted))
            .map(String::as_str)
    }

    pub fn has_score(&self, column: &str) -> bool {
        self.score_columns.iter().any(|c| c == column)
    }

    /// Initial (x, y) metrics: the negative control goes on y when present
    pub fn default_axes(&self) -> (String, String) {
        let first = self.score_columns[0].clone();
        if self.has_score(NEGATIVE_CONTROL) {
            let x = self
                .score_columns
                .iter()
                .find(|c| c.as_str() != NEGATIVE_CONTROL)
                .cloned()
                .unwrap_or_else(|| NEGATIVE_CONTROL.to_string());
            (x, NEGATIVE_CONTROL.to_string())
        } else {
            let y = self.score_columns.get(1).cloned().unwrap_or_else(|| first.clone());
            (first, y)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_detects_column_families() {
        let layout = SchemaDetector::new()
            .detect(&cols(&["library", "axis", "c1_smiles", "SMILES", "count_A", "zscore_A", "Zscore_B", "history_hits"]))
            .unwrap();
        assert_eq!(layout.count_columns, cols(&["count_A"]));
        assert_eq!(layout.score_columns, cols(&["zscore_A", "Zscore_B"]));
        assert_eq!(layout.structure_columns, cols(&["c1_smiles", "SMILES"]));
        assert!(layout.has_library && layout.has_axis && layout.has_history_hits);
        assert!(!layout.has_compound);
    }

    #[test]
    fn test_missing_families_are_schema_errors() {
        let detector = SchemaDetector::new();
        assert_eq!(detector.detect(&[]), Err(SchemaError::EmptyInput));
        assert!(matches!(
            detector.detect(&cols(&["count_A", "c1_smiles"])),
            Err(SchemaError::MissingColumns { kind: "score", .. })
        ));
        assert!(matches!(
            detector.detect(&cols(&["count_A", "zscore_A"])),
            Err(SchemaError::MissingColumns { kind: "structure", .. })
        ));
        assert!(matches!(
            detector.detect(&cols(&["zscore_A", "c1_smiles"])),
            Err(SchemaError::MissingColumns { kind: "count", .. })
        ));
    }

    #[test]
    fn test_case_sensitive_matching() {
        let detector = SchemaDetector::new().with_case_sensitive(true);
        assert!(detector.detect(&cols(&["Count_A", "zscore_A", "c1_smiles"])).is_err());
    }

    #[test]
    fn test_default_axes_prefer_negative_control_on_y() {
        let layout = SchemaDetector::new()
            .detect(&cols(&["count_NTC", "zscore_NTC", "zscore_PSA", "c1_smiles"]))
            .unwrap();
        assert_eq!(layout.default_axes(), ("zscore_PSA".to_string(), "zscore_NTC".to_string()));

        let layout = SchemaDetector::new()
            .detect(&cols(&["count_A", "zscore_A", "zscore_B", "c1_smiles"]))
            .unwrap();
        assert_eq!(layout.default_axes(), ("zscore_A".to_string(), "zscore_B".to_string()));
    }

    #[test]
    fn test_metric_names_and_count_pairing() {
        let layout = SchemaDetector::new()
            .detect(&cols(&["count_PSA", "zscore_PSA", "c1_smiles"]))
            .unwrap();
        assert_eq!(ColumnLayout::metric_name("zscore_PSA"), "PSA");
        assert_eq!(layout.count_column_for("zscore_PSA"), Some("count_PSA"));
        assert_eq!(layout.count_column_for("zscore_X"), None);
    }
}
