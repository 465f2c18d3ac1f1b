//! Aggregation Engine: grouping, representative selection and per-library Top-N

use std::cmp::Ordering;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use hv_core::EntityKey;

use crate::rows::{Row, RowStore};
use crate::SchemaError;

/// Tunables of one aggregation pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregationParams {
    /// Maximum number of top entries per library
    pub n_top_hits: usize,
    /// Minimum rank value for a tri-axis unique to become a top entry
    pub inclusion_threshold: f64,
}

impl Default for AggregationParams {
    fn default() -> Self {
        Self {
            n_top_hits: 5,
            inclusion_threshold: 0.5,
        }
    }
}

/// The representative row of a group, annotated with the group size
#[derive(Debug, Clone, PartialEq)]
pub struct Unique {
    pub row: Arc<Row>,
    pub copies: usize,
}

impl Unique {
    pub fn key(&self) -> &EntityKey {
        &self.row.key
    }

    pub fn library(&self) -> &str {
        &self.row.library
    }

    /// Title with the copy count appended when the group has duplicates
    pub fn title(&self) -> String {
        if self.copies > 1 {
            format!("{} [{}]", self.row.display_name(), self.copies)
        } else {
            self.row.display_name()
        }
    }
}

/// A unique selected for default visibility
#[derive(Debug, Clone, PartialEq)]
pub struct TopEntry {
    pub unique: Unique,
    pub visible: bool,
}

impl TopEntry {
    pub fn key(&self) -> &EntityKey {
        self.unique.key()
    }
}

/// Result of one aggregation pass
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    /// Rank metric the pass was computed for
    pub metric: String,
    /// One entry per group, in first-encounter order
    pub uniques: Vec<Unique>,
    /// Row indices of every group with at least two rows
    pub duplicates: IndexMap<EntityKey, Vec<usize>>,
    /// Top entries per library; every library has a (possibly empty) list
    pub tops: IndexMap<String, Vec<TopEntry>>,
    positions: IndexMap<EntityKey, usize>,
}

impl Aggregation {
    pub fn unique(&self, key: &EntityKey) -> Option<&Unique> {
        self.positions.get(key).map(|&i| &self.uniques[i])
    }

    pub fn contains(&self, key: &EntityKey) -> bool {
        self.positions.contains_key(key)
    }

    /// `(key, library)` of every unique
    pub fn catalog(&self) -> impl Iterator<Item = (EntityKey, String)> + '_ {
        self.uniques.iter().map(|u| (u.key().clone(), u.library().to_string()))
    }

    /// Uniques belonging to `library`
    pub fn uniques_in<'a>(&'a self, library: &'a str) -> impl Iterator<Item = &'a Unique> + 'a {
        self.uniques.iter().filter(move |u| u.library() == library)
    }

    pub fn top_entry(&self, key: &EntityKey) -> Option<&TopEntry> {
        self.tops.values().flatten().find(|t| t.key() == key)
    }

    pub fn top_entry_mut(&mut self, key: &EntityKey) -> Option<&mut TopEntry> {
        self.tops.values_mut().flatten().find(|t| t.key() == key)
    }

    /// Keys of the visible top entries of `library`
    pub fn visible_tops(&self, library: &str) -> Vec<EntityKey> {
        self.tops
            .get(library)
            .map(|entries| entries.iter().filter(|t| t.visible).map(|t| t.key().clone()).collect())
            .unwrap_or_default()
    }

    /// Every top entry, library by library
    pub fn all_tops(&self) -> impl Iterator<Item = &TopEntry> {
        self.tops.values().flatten()
    }

    /// Original row indices of the group of `key`: its duplicate list,
    /// or the representative's own index for a singleton group
    pub fn encodings(&self, key: &EntityKey) -> Option<Vec<usize>> {
        if let Some(indices) = self.duplicates.get(key) {
            return Some(indices.clone());
        }
        self.unique(key).map(|u| vec![u.row.index])
    }
}

/// Descending by rank value; equal values keep the smaller ingestion index first
fn rank_order(metric: &str, a: &Row, b: &Row) -> Ordering {
    b.rank_value(metric)
        .partial_cmp(&a.rank_value(metric))
        .unwrap_or(Ordering::Equal)
        .then(a.index.cmp(&b.index))
}

/// Group `store` by key, pick one representative per group by `metric`,
/// and rank the tri-axis uniques of every library.
pub fn aggregate(store: &RowStore, metric: &str, params: &AggregationParams) -> Result<Aggregation, SchemaError> {
    if !store.layout().has_score(metric) {
        return Err(SchemaError::UnknownMetric(metric.to_string()));
    }

    // key -> (representative position in `rows`, member indices)
    let mut groups: IndexMap<EntityKey, (usize, Vec<usize>)> = IndexMap::new();
    let rows = store.rows();

    for (position, row) in rows.iter().enumerate() {
        match groups.get_mut(&row.key) {
            Some((best, members)) => {
                members.push(row.index);
                if row.rank_value(metric) > rows[*best].rank_value(metric) {
                    *best = position;
                }
            }
            None => {
                groups.insert(row.key.clone(), (position, vec![row.index]));
            }
        }
    }

    let mut uniques = Vec::with_capacity(groups.len());
    let mut positions = IndexMap::with_capacity(groups.len());
    let mut duplicates = IndexMap::new();

    for (key, (best, members)) in groups {
        positions.insert(key.clone(), uniques.len());
        uniques.push(Unique {
            row: rows[best].clone(),
            copies: members.len(),
        });
        if members.len() >= 2 {
            duplicates.insert(key, members);
        }
    }

    let mut tops: IndexMap<String, Vec<TopEntry>> = store
        .libraries()
        .iter()
        .map(|library| (library.clone(), Vec::new()))
        .collect();

    for unique in &uniques {
        let qualifies = unique.row.is_tri()
            && unique
                .row
                .metric(metric)
                .map_or(false, |value| value >= params.inclusion_threshold);
        if qualifies {
            tops.entry(unique.row.library.clone())
                .or_default()
                .push(TopEntry { unique: unique.clone(), visible: true });
        }
    }

    for (library, entries) in tops.iter_mut() {
        entries.sort_by(|a, b| rank_order(metric, &a.unique.row, &b.unique.row));
        entries.truncate(params.n_top_hits);
        debug!("Library {}: {} top entries", library, entries.len());
    }

    info!(
        "Aggregated {} rows by {}: {} uniques, {} duplicate groups",
        rows.len(),
        metric,
        uniques.len(),
        duplicates.len()
    );

    Ok(Aggregation {
        metric: metric.to_string(),
        uniques,
        duplicates,
        tops,
        positions,
    })
}
