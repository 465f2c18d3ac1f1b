//! Table widgets: the hits table and the top-hits table

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use hv_core::{EntityKey, Value};
use hv_data::schema::{AXIS_COLUMN, HISTORY_HITS_COLUMN, LIBRARY_COLUMN};
use hv_data::{ColumnLayout, Unique};

/// Field holding a row's copy count
pub const COPIES_FIELD: &str = "copies";

/// Column definition, possibly grouping child columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub title: String,
    pub field: Option<String>,
    pub children: Vec<ColumnSpec>,
    pub frozen: bool,
}

impl ColumnSpec {
    pub fn leaf(title: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            field: Some(field.into()),
            children: Vec::new(),
            frozen: false,
        }
    }

    pub fn group(title: impl Into<String>, children: Vec<ColumnSpec>) -> Self {
        Self {
            title: title.into(),
            field: None,
            children,
            frozen: false,
        }
    }

    fn frozen(mut self) -> Self {
        self.frozen = true;
        self
    }

    /// Fields of this column and its children, left to right
    pub fn fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = self.field.as_deref().into_iter().collect();
        for child in &self.children {
            fields.extend(child.fields());
        }
        fields
    }
}

/// `c1_smiles` → `BB1`, `core_smiles` → `core`; names without an
/// underscore are kept
fn structure_title(column: &str) -> String {
    let Some((prefix, _)) = column.split_once('_') else {
        return column.to_string();
    };
    match prefix.strip_prefix('c') {
        Some(digits) if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => format!("BB{}", digits),
        _ => prefix.to_string(),
    }
}

/// Column groups shared by both tables
pub fn assemble_columns(layout: &ColumnLayout) -> Vec<ColumnSpec> {
    let structures = layout
        .structure_columns
        .iter()
        .map(|c| ColumnSpec::leaf(structure_title(c), c.clone()))
        .collect();
    let counts = layout
        .count_columns
        .iter()
        .map(|c| ColumnSpec::leaf(c.get("count_".len()..).unwrap_or(c), c.clone()))
        .collect();
    let scores = layout
        .score_columns
        .iter()
        .map(|c| ColumnSpec::leaf(ColumnLayout::metric_name(c), c.clone()))
        .collect();

    let mut columns = vec![
        ColumnSpec::leaf("Library", LIBRARY_COLUMN).frozen(),
        ColumnSpec::leaf("Axis", AXIS_COLUMN).frozen(),
        ColumnSpec::group("SMILES", structures),
        ColumnSpec::leaf("Encodings", COPIES_FIELD),
        ColumnSpec::group("Count", counts),
        ColumnSpec::group("z-score", scores),
    ];
    if layout.has_history_hits {
        columns.push(ColumnSpec::leaf("HH", HISTORY_HITS_COLUMN));
    }
    columns
}

/// One table row, keyed by entity
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub key: EntityKey,
    pub library: String,
    pub cells: IndexMap<String, Value>,
    /// `visible` checkbox; only the top-hits table shows it
    pub visible: Option<bool>,
    /// `hit` tick
    pub hit: bool,
}

impl TableRow {
    /// Row for `unique` with a cell for every field of `columns`
    pub fn from_unique(unique: &Unique, columns: &[ColumnSpec]) -> Self {
        let row = &unique.row;
        let cells = columns
            .iter()
            .flat_map(|c| c.fields())
            .map(|field| {
                let value = match field {
                    COPIES_FIELD => Value::Int(unique.copies as i64),
                    HISTORY_HITS_COLUMN => Value::Int(row.history_hit_count().unwrap_or(0) as i64),
                    LIBRARY_COLUMN => Value::Text(row.library.clone()),
                    other => row.value(other).cloned().unwrap_or(Value::Null),
                };
                (field.to_string(), value)
            })
            .collect();

        Self {
            key: row.key.clone(),
            library: row.library.clone(),
            cells,
            visible: None,
            hit: false,
        }
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = Some(visible);
        self
    }

    pub fn with_hit(mut self, hit: bool) -> Self {
        self.hit = hit;
        self
    }
}

/// Editable flag columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagColumn {
    Visible,
    Hit,
}

/// Events a table widget reports back
#[derive(Debug, Clone, PartialEq)]
pub enum TableEvent {
    CellEdited { key: EntityKey, column: FlagColumn, value: bool },
    /// Header click on the visible column
    AllVisibleToggled { value: bool },
    RowDeleted { key: EntityKey },
}

/// A row-indexed grid
pub trait TableWidget: Send + Sync {
    fn set_columns(&self, columns: Vec<ColumnSpec>);

    fn set_rows(&self, rows: Vec<TableRow>);

    fn rows(&self) -> Vec<TableRow>;

    fn update_or_insert_row(&self, key: &EntityKey, row: TableRow);

    /// Returns whether a row was removed
    fn delete_row(&self, key: &EntityKey) -> bool;

    fn row(&self, key: &EntityKey) -> Option<TableRow> {
        self.rows().into_iter().find(|r| &r.key == key)
    }

    fn len(&self) -> usize {
        self.rows().len()
    }
}

/// Table widget keeping rows in insertion order
#[derive(Default)]
pub struct MemoryTable {
    columns: RwLock<Vec<ColumnSpec>>,
    rows: RwLock<IndexMap<EntityKey, TableRow>>,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> Vec<ColumnSpec> {
        self.columns.read().clone()
    }

    pub fn keys(&self) -> Vec<EntityKey> {
        self.rows.read().keys().cloned().collect()
    }
}

impl TableWidget for MemoryTable {
    fn set_columns(&self, columns: Vec<ColumnSpec>) {
        *self.columns.write() = columns;
    }

    fn set_rows(&self, rows: Vec<TableRow>) {
        *self.rows.write() = rows.into_iter().map(|r| (r.key.clone(), r)).collect();
    }

    fn rows(&self) -> Vec<TableRow> {
        self.rows.read().values().cloned().collect()
    }

    fn update_or_insert_row(&self, key: &EntityKey, row: TableRow) {
        self.rows.write().insert(key.clone(), row);
    }

    fn delete_row(&self, key: &EntityKey) -> bool {
        self.rows.write().shift_remove(key).is_some()
    }

    fn row(&self, key: &EntityKey) -> Option<TableRow> {
        self.rows.read().get(key).cloned()
    }

    fn len(&self) -> usize {
        self.rows.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hv_core::RawRecord;
    use hv_data::{aggregate, AggregationParams, RowStore, SchemaDetector};

    fn layout_and_unique() -> (ColumnLayout, Unique) {
        let mut record = RawRecord::new();
        record.insert("library".into(), Value::from("L1"));
        record.insert("axis".into(), Value::Int(6));
        record.insert("c1_smiles".into(), Value::from("CCO"));
        record.insert("SMILES".into(), Value::from("CCO.CN"));
        record.insert("count_PSA".into(), Value::Int(7));
        record.insert("zscore_PSA".into(), Value::Float(2.5));
        record.insert("history_hits".into(), Value::from("a,b,c"));
        let store = RowStore::ingest(vec![record], &SchemaDetector::new()).unwrap();
        let aggregation = aggregate(&store, "zscore_PSA", &AggregationParams::default()).unwrap();
        (store.layout().clone(), aggregation.uniques[0].clone())
    }

    #[test]
    fn test_column_groups() {
        let (layout, _) = layout_and_unique();
        let columns = assemble_columns(&layout);
        let titles: Vec<&str> = columns.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Library", "Axis", "SMILES", "Encodings", "Count", "z-score", "HH"]);
        assert!(columns[0].frozen);

        let structures: Vec<&str> = columns[2].children.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(structures, vec!["BB1", "SMILES"]);
        assert_eq!(columns[4].children[0].title, "PSA");
        assert_eq!(columns[5].children[0].title, "PSA");
    }

    #[test]
    fn test_structure_titles() {
        assert_eq!(structure_title("c1_smiles"), "BB1");
        assert_eq!(structure_title("c12_smiles"), "BB12");
        assert_eq!(structure_title("core_smiles"), "core");
        assert_eq!(structure_title("c_smiles"), "c");
        assert_eq!(structure_title("scaffold_smiles"), "scaffold");
        assert_eq!(structure_title("SMILES"), "SMILES");
    }

    #[test]
    fn test_row_cells() {
        let (layout, unique) = layout_and_unique();
        let row = TableRow::from_unique(&unique, &assemble_columns(&layout)).with_visible(true);
        assert_eq!(row.cells["copies"], Value::Int(1));
        assert_eq!(row.cells["history_hits"], Value::Int(3));
        assert_eq!(row.cells["zscore_PSA"], Value::Float(2.5));
        assert_eq!(row.visible, Some(true));
        assert!(!row.hit);
    }

    #[test]
    fn test_memory_table_keeps_order() {
        let (layout, unique) = layout_and_unique();
        let columns = assemble_columns(&layout);
        let table = MemoryTable::new();
        table.set_columns(columns.clone());

        let row = TableRow::from_unique(&unique, &columns);
        table.update_or_insert_row(&row.key.clone(), row.clone());
        table.update_or_insert_row(&row.key.clone(), row.clone().with_hit(true));
        assert_eq!(table.len(), 1);
        assert!(table.row(&row.key).unwrap().hit);

        assert!(table.delete_row(&row.key));
        assert!(!table.delete_row(&row.key));
        assert_eq!(table.len(), 0);
        assert_eq!(table.columns().len(), 7);
    }
}
