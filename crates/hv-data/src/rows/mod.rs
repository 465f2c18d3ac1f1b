//! Row Store: normalized input rows with stable composite keys

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, info};

use hv_core::{EntityKey, RawRecord, Value};

use crate::schema::{
    ColumnLayout, SchemaDetector, AXIS_COLUMN, COMPOUND_COLUMN, HISTORY_HITS_COLUMN, LIBRARY_COLUMN,
};
use crate::SchemaError;

/// Axis category of the tri structural class
pub const TRI_AXIS: i64 = 6;

/// Library label used for rows without one
pub const UNKNOWN_LIBRARY: &str = "Unknown";

/// Structural class of a row, derived from its axis category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StructuralClass {
    Mono,
    Di,
    Tri,
}

impl StructuralClass {
    pub const ALL: [StructuralClass; 3] = [StructuralClass::Mono, StructuralClass::Di, StructuralClass::Tri];

    /// Axes 0–2 are mono, 3–5 di and 6 tri. Any other axis has no class.
    pub fn from_axis(axis: i64) -> Option<Self> {
        match axis {
            0..=2 => Some(StructuralClass::Mono),
            3..=5 => Some(StructuralClass::Di),
            TRI_AXIS => Some(StructuralClass::Tri),
            _ => None,
        }
    }

    /// Trace name used on the chart
    pub fn trace_name(self) -> &'static str {
        match self {
            StructuralClass::Mono => "Mono-sython",
            StructuralClass::Di => "Di-sython",
            StructuralClass::Tri => "Tri-sython",
        }
    }
}

/// One ingested row. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Position in the ingested sequence
    pub index: usize,
    pub library: String,
    pub axis: Option<i64>,
    pub key: EntityKey,
    /// Structure descriptor per structure column, in column order
    pub structures: IndexMap<String, String>,
    pub compound: Option<String>,
    pub history_hits: Option<String>,
    /// The full original record
    pub values: RawRecord,
}

impl Row {
    /// Numeric value of `column`; missing and non-numeric cells yield `None`
    pub fn metric(&self, column: &str) -> Option<f64> {
        self.values.get(column).and_then(Value::as_f64)
    }

    /// Rank value with missing treated as the worst possible value
    pub fn rank_value(&self, column: &str) -> f64 {
        self.metric(column).unwrap_or(f64::NEG_INFINITY)
    }

    /// Raw cell of `column`
    pub fn value(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    /// Structural class; `None` when the axis is missing or outside 0–6.
    /// Such rows are never plotted as interactive points.
    pub fn class(&self) -> Option<StructuralClass> {
        self.axis.and_then(StructuralClass::from_axis)
    }

    pub fn is_tri(&self) -> bool {
        self.axis == Some(TRI_AXIS)
    }

    /// Number of historical hit markers (comma count + 1), if any
    pub fn history_hit_count(&self) -> Option<usize> {
        self.history_hits
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|s| s.matches(',').count() + 1)
    }

    /// Title shown on cards and hover labels
    pub fn display_name(&self) -> String {
        match &self.compound {
            Some(compound) => compound.clone(),
            None => format!("VC{}", self.index),
        }
    }
}

/// Prefix of keys synthesized from the library and structure columns
pub const SYNTHESIZED_KEY_PREFIX: &str = "lib:";

/// Derive the composite key of a record: the compound when present,
/// otherwise `lib:` then the library and every structure descriptor joined
/// by `|`. A `|` or `\` inside a part is backslash-escaped.
pub fn key_for(library: &str, compound: Option<&str>, structures: &IndexMap<String, String>) -> EntityKey {
    if let Some(compound) = compound {
        return EntityKey::new(compound);
    }
    let parts: Vec<String> = std::iter::once(library)
        .chain(structures.values().map(String::as_str))
        .map(escape_key_part)
        .collect();
    EntityKey::new(format!("{}{}", SYNTHESIZED_KEY_PREFIX, parts.join("|")))
}

fn escape_key_part(part: &str) -> String {
    part.replace('\\', "\\\\").replace('|', "\\|")
}

/// The ingested row set
#[derive(Debug, Clone)]
pub struct RowStore {
    rows: Vec<Arc<Row>>,
    layout: ColumnLayout,
    libraries: Vec<String>,
}

impl RowStore {
    /// Normalize `records` into rows. Fails without building anything when the
    /// input is empty or a required column family is missing.
    pub fn ingest(records: Vec<RawRecord>, detector: &SchemaDetector) -> Result<Self, SchemaError> {
        if records.is_empty() {
            return Err(SchemaError::EmptyInput);
        }

        let mut columns: IndexSet<String> = IndexSet::new();
        for record in &records {
            for column in record.keys() {
                if !columns.contains(column) {
                    columns.insert(column.clone());
                }
            }
        }
        let columns: Vec<String> = columns.into_iter().collect();
        let layout = detector.detect(&columns)?;

        let mut libraries: IndexSet<String> = IndexSet::new();
        let rows: Vec<Arc<Row>> = records
            .into_iter()
            .enumerate()
            .map(|(index, values)| {
                let row = Self::build_row(index, values, &layout);
                if !libraries.contains(&row.library) {
                    libraries.insert(row.library.clone());
                }
                Arc::new(row)
            })
            .collect();

        info!(
            "Ingested {} rows ({} score columns, {} structure columns, {} libraries)",
            rows.len(),
            layout.score_columns.len(),
            layout.structure_columns.len(),
            libraries.len()
        );

        Ok(Self {
            rows,
            layout,
            libraries: libraries.into_iter().collect(),
        })
    }

    fn build_row(index: usize, values: RawRecord, layout: &ColumnLayout) -> Row {
        let text = |column: &str| {
            values
                .get(column)
                .map(Value::to_text)
                .filter(|s| !s.is_empty())
        };

        let library = text(LIBRARY_COLUMN).unwrap_or_else(|| UNKNOWN_LIBRARY.to_string());
        let compound = text(COMPOUND_COLUMN);
        let history_hits = text(HISTORY_HITS_COLUMN);
        let axis = values.get(AXIS_COLUMN).and_then(Value::as_i64);
        if axis.is_none() && layout.has_axis {
            debug!("Row {} has no usable axis value", index);
        }

        let structures: IndexMap<String, String> = layout
            .structure_columns
            .iter()
            .map(|column| (column.clone(), values.get(column).map(Value::to_text).unwrap_or_default()))
            .collect();

        let key = key_for(&library, compound.as_deref(), &structures);

        Row {
            index,
            library,
            axis,
            key,
            structures,
            compound,
            history_hits,
            values,
        }
    }

    pub fn rows(&self) -> &[Arc<Row>] {
        &self.rows
    }

    pub fn get(&self, index: usize) -> Option<&Arc<Row>> {
        self.rows.get(index)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn layout(&self) -> &ColumnLayout {
        &self.layout
    }

    /// Distinct library labels in first-appearance order
    pub fn libraries(&self) -> &[String] {
        &self.libraries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fields: &[(&str, Value)]) -> RawRecord {
        fields.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn sample() -> Vec<RawRecord> {
        vec![
            record(&[
                ("library", "L1".into()),
                ("axis", Value::Int(6)),
                ("c1_smiles", "CCO".into()),
                ("c2_smiles", "CCN".into()),
                ("count_x", Value::Int(3)),
                ("zscore_x", Value::Float(1.5)),
            ]),
            record(&[
                ("library", Value::Null),
                ("axis", Value::Int(2)),
                ("c1_smiles", "C".into()),
                ("c2_smiles", Value::Null),
                ("count_x", Value::Int(1)),
                ("zscore_x", "n/a".into()),
                ("compound", "CPD-9".into()),
                ("history_hits", "a,b,c".into()),
            ]),
        ]
    }

    #[test]
    fn test_ingest_assigns_indices_and_keys() {
        let store = RowStore::ingest(sample(), &SchemaDetector::new()).unwrap();
        assert_eq!(store.len(), 2);

        let first = &store.rows()[0];
        assert_eq!(first.index, 0);
        assert_eq!(first.key.as_str(), "lib:L1|CCO|CCN");
        assert_eq!(first.class(), Some(StructuralClass::Tri));
        assert!(first.is_tri());
        assert_eq!(first.metric("zscore_x"), Some(1.5));

        let second = &store.rows()[1];
        assert_eq!(second.key.as_str(), "CPD-9");
        assert_eq!(second.library, UNKNOWN_LIBRARY);
        assert_eq!(second.metric("zscore_x"), None);
        assert_eq!(second.rank_value("zscore_x"), f64::NEG_INFINITY);
        assert_eq!(second.history_hit_count(), Some(3));
        assert_eq!(second.display_name(), "CPD-9");
        assert_eq!(first.display_name(), "VC0");

        assert_eq!(store.libraries(), &["L1".to_string(), UNKNOWN_LIBRARY.to_string()]);
    }

    #[test]
    fn test_empty_input_is_rejected() {
        assert_eq!(RowStore::ingest(Vec::new(), &SchemaDetector::new()).unwrap_err(), SchemaError::EmptyInput);
    }

    #[test]
    fn test_missing_structure_columns_rejected() {
        let records = vec![record(&[("count_x", Value::Int(1)), ("zscore_x", Value::Float(1.0))])];
        assert!(matches!(
            RowStore::ingest(records, &SchemaDetector::new()),
            Err(SchemaError::MissingColumns { kind: "structure", .. })
        ));
    }

    #[test]
    fn test_structural_classes() {
        assert_eq!(StructuralClass::from_axis(0), Some(StructuralClass::Mono));
        assert_eq!(StructuralClass::from_axis(2), Some(StructuralClass::Mono));
        assert_eq!(StructuralClass::from_axis(3), Some(StructuralClass::Di));
        assert_eq!(StructuralClass::from_axis(5), Some(StructuralClass::Di));
        assert_eq!(StructuralClass::from_axis(6), Some(StructuralClass::Tri));
        assert_eq!(StructuralClass::from_axis(7), None);
        assert_eq!(StructuralClass::from_axis(-1), None);
        assert_eq!(StructuralClass::Tri.trace_name(), "Tri-sython");
    }

    #[test]
    fn test_rows_outside_the_axis_bands_have_no_class() {
        let records = vec![
            record(&[("axis", Value::Int(7)), ("c1_smiles", "C".into()), ("count_x", Value::Int(1)), ("zscore_x", Value::Float(1.0))]),
            record(&[("axis", Value::Int(-1)), ("c1_smiles", "N".into()), ("count_x", Value::Int(1)), ("zscore_x", Value::Float(1.0))]),
            record(&[("axis", Value::Null), ("c1_smiles", "O".into()), ("count_x", Value::Int(1)), ("zscore_x", Value::Float(1.0))]),
            record(&[("axis", "x".into()), ("c1_smiles", "S".into()), ("count_x", Value::Int(1)), ("zscore_x", Value::Float(1.0))]),
        ];
        let store = RowStore::ingest(records, &SchemaDetector::new()).unwrap();
        assert!(store.rows().iter().all(|row| row.class().is_none() && !row.is_tri()));
    }

    #[test]
    fn test_compound_cannot_collide_with_synthesized_key() {
        let structures: IndexMap<String, String> =
            [("c1_smiles".to_string(), "CCO".to_string())].into_iter().collect();
        let synthesized = key_for("L1", None, &structures);
        assert_eq!(synthesized.as_str(), "lib:L1|CCO");
        assert_ne!(key_for("L1", Some("L1|CCO"), &structures), synthesized);

        // A separator inside a part cannot shift the boundary between parts
        let split: IndexMap<String, String> = [
            ("c1_smiles".to_string(), "B|C".to_string()),
            ("c2_smiles".to_string(), "D".to_string()),
        ]
        .into_iter()
        .collect();
        let shifted: IndexMap<String, String> = [
            ("c1_smiles".to_string(), "B".to_string()),
            ("c2_smiles".to_string(), "C|D".to_string()),
        ]
        .into_iter()
        .collect();
        assert_ne!(key_for("L1", None, &split), key_for("L1", None, &shifted));
        assert_eq!(key_for("L1", None, &split).as_str(), "lib:L1|B\\|C|D");
    }
}
