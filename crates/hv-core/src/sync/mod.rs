//! Selection coordination across the chart, the tables and the overlay cards

mod generation;

pub use generation::{Generation, GenerationCounter};

use std::sync::Arc;
use parking_lot::RwLock;
use ahash::AHashMap;
use indexmap::IndexSet;
use tracing::debug;

use crate::data::{EntityKey, LibraryFilter};

/// Selection coordinator shared by every view.
///
/// Tracks three key sets: `hits` (user-curated), `visible` (keys with an
/// overlay card) and `highlighted` (enlarged chart markers, mirrors
/// `visible`). `visible` is always a subset of the keys in the current
/// catalog and of the active library filter.
pub struct SelectionCoordinator {
    state: Arc<RwLock<SelectionState>>,
}

/// Selection state shared across views
#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    /// User-curated hits, in the order they were kept
    pub hits: IndexSet<EntityKey>,

    /// Keys currently shown as overlays
    pub visible: IndexSet<EntityKey>,

    /// Keys drawn as selected chart markers
    pub highlighted: IndexSet<EntityKey>,

    /// Active library filter
    pub filter: LibraryFilter,

    /// Library of every key in the current unique population
    catalog: AHashMap<EntityKey, String>,
}

/// Keys that entered (`shown`) or left (`hidden`) the visible set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionDelta {
    pub shown: Vec<EntityKey>,
    pub hidden: Vec<EntityKey>,
}

impl SelectionDelta {
    pub fn is_empty(&self) -> bool {
        self.shown.is_empty() && self.hidden.is_empty()
    }
}

impl SelectionState {
    fn library_of(&self, key: &EntityKey) -> Option<&str> {
        self.catalog.get(key).map(String::as_str)
    }

    fn admits(&self, key: &EntityKey) -> bool {
        match (self.filter.library(), self.library_of(key)) {
            (Some(active), Some(library)) => active == library,
            _ => false,
        }
    }

    fn replace_visible(&mut self, next: IndexSet<EntityKey>) -> SelectionDelta {
        let hidden = self.visible.iter().filter(|k| !next.contains(*k)).cloned().collect();
        let shown = next.iter().filter(|k| !self.visible.contains(*k)).cloned().collect();
        self.highlighted = next.clone();
        self.visible = next;
        SelectionDelta { shown, hidden }
    }
}

impl SelectionCoordinator {
    /// Create a new selection coordinator
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(SelectionState::default())),
        }
    }

    /// Get a copy of the current selection state
    pub fn snapshot(&self) -> SelectionState {
        self.state.read().clone()
    }

    pub fn filter(&self) -> LibraryFilter {
        self.state.read().filter.clone()
    }

    pub fn visible(&self) -> Vec<EntityKey> {
        self.state.read().visible.iter().cloned().collect()
    }

    pub fn highlighted(&self) -> Vec<EntityKey> {
        self.state.read().highlighted.iter().cloned().collect()
    }

    pub fn hits(&self) -> Vec<EntityKey> {
        self.state.read().hits.iter().cloned().collect()
    }

    pub fn is_visible(&self, key: &EntityKey) -> bool {
        self.state.read().visible.contains(key)
    }

    pub fn is_hit(&self, key: &EntityKey) -> bool {
        self.state.read().hits.contains(key)
    }

    /// Hits whose library matches the active filter
    pub fn hits_in_filter(&self) -> Vec<EntityKey> {
        let state = self.state.read();
        state.hits.iter().filter(|k| state.admits(k)).cloned().collect()
    }

    /// Replace the key catalog after an aggregation pass and hide every
    /// visible key that no longer exists or no longer passes the filter.
    pub fn revalidate<I>(&self, catalog: I) -> SelectionDelta
    where
        I: IntoIterator<Item = (EntityKey, String)>,
    {
        let mut state = self.state.write();
        state.catalog = catalog.into_iter().collect();

        let next: IndexSet<EntityKey> = state.visible.iter().filter(|k| state.admits(k)).cloned().collect();
        let delta = state.replace_visible(next);
        if !delta.hidden.is_empty() {
            debug!("Revalidation hid {} orphaned keys", delta.hidden.len());
        }
        delta
    }

    /// Add keys to the visible set. Keys already visible, unknown to the
    /// catalog or outside the active filter are ignored.
    pub fn show<'a, I>(&self, keys: I) -> SelectionDelta
    where
        I: IntoIterator<Item = &'a EntityKey>,
    {
        let mut state = self.state.write();
        let mut delta = SelectionDelta::default();

        for key in keys {
            if state.visible.contains(key) {
                continue;
            }
            if !state.admits(key) {
                debug!("Ignoring show for {} outside filter {}", key, state.filter);
                continue;
            }
            state.visible.insert(key.clone());
            state.highlighted.insert(key.clone());
            delta.shown.push(key.clone());
        }
        delta
    }

    /// Remove keys from the visible set; absent keys are a no-op
    pub fn hide<'a, I>(&self, keys: I) -> SelectionDelta
    where
        I: IntoIterator<Item = &'a EntityKey>,
    {
        let mut state = self.state.write();
        let mut delta = SelectionDelta::default();

        for key in keys {
            if state.visible.shift_remove(key) {
                state.highlighted.shift_remove(key);
                delta.hidden.push(key.clone());
            }
        }
        delta
    }

    /// Flip membership of `key` in the hit set; returns the new membership
    pub fn toggle_hit(&self, key: &EntityKey) -> bool {
        let mut state = self.state.write();
        if state.hits.shift_remove(key) {
            false
        } else {
            state.hits.insert(key.clone());
            true
        }
    }

    /// Set membership of `key` in the hit set; returns whether anything changed
    pub fn set_hit(&self, key: &EntityKey, hit: bool) -> bool {
        let mut state = self.state.write();
        if hit {
            state.hits.insert(key.clone())
        } else {
            state.hits.shift_remove(key)
        }
    }

    /// Switch the library filter and recompute the visible set as the
    /// visible top entries of that library followed by its hits.
    ///
    /// `seeded` lists the keys of top entries flagged visible; entries from
    /// other libraries are dropped. The `All` filter shows nothing.
    pub fn set_library_filter<I>(&self, filter: LibraryFilter, seeded: I) -> SelectionDelta
    where
        I: IntoIterator<Item = EntityKey>,
    {
        let mut state = self.state.write();
        state.filter = filter;

        let mut next = IndexSet::new();
        if state.filter.library().is_some() {
            for key in seeded {
                if state.admits(&key) {
                    next.insert(key);
                }
            }
            let hits: Vec<EntityKey> = state.hits.iter().filter(|k| state.admits(k)).cloned().collect();
            next.extend(hits);
        }

        let delta = state.replace_visible(next);
        debug!(
            "Library filter {}: {} shown, {} hidden",
            state.filter,
            delta.shown.len(),
            delta.hidden.len()
        );
        delta
    }
}

impl Default for SelectionCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(k: &str) -> EntityKey {
        EntityKey::from(k)
    }

    fn coordinator() -> SelectionCoordinator {
        let coordinator = SelectionCoordinator::new();
        coordinator.revalidate(vec![
            (key("A"), "L1".to_string()),
            (key("B"), "L1".to_string()),
            (key("C"), "L2".to_string()),
        ]);
        coordinator.set_library_filter(LibraryFilter::parse("L1"), Vec::new());
        coordinator
    }

    #[test]
    fn test_show_is_idempotent() {
        let coordinator = coordinator();
        let first = coordinator.show([&key("A")]);
        let second = coordinator.show([&key("A")]);
        assert_eq!(first.shown, vec![key("A")]);
        assert!(second.is_empty());
        assert_eq!(coordinator.visible(), vec![key("A")]);
        assert_eq!(coordinator.highlighted(), vec![key("A")]);
    }

    #[test]
    fn test_hide_absent_key_is_noop() {
        let coordinator = coordinator();
        coordinator.show([&key("A")]);
        let delta = coordinator.hide([&key("B")]);
        assert!(delta.is_empty());
        assert_eq!(coordinator.visible(), vec![key("A")]);
    }

    #[test]
    fn test_show_then_hide_hide_wins() {
        let coordinator = coordinator();
        coordinator.show([&key("A")]);
        coordinator.hide([&key("A")]);
        assert!(coordinator.visible().is_empty());
    }

    #[test]
    fn test_show_rejects_other_library_and_unknown_keys() {
        let coordinator = coordinator();
        let delta = coordinator.show([&key("C"), &key("Z")]);
        assert!(delta.is_empty());
    }

    #[test]
    fn test_toggle_hit_does_not_touch_visible() {
        let coordinator = coordinator();
        assert!(coordinator.toggle_hit(&key("B")));
        assert!(coordinator.visible().is_empty());
        assert!(!coordinator.toggle_hit(&key("B")));
        assert!(coordinator.hits().is_empty());
    }

    #[test]
    fn test_library_filter_seeds_tops_and_hits() {
        let coordinator = coordinator();
        coordinator.set_hit(&key("B"), true);
        coordinator.set_hit(&key("C"), true);

        let delta = coordinator.set_library_filter(LibraryFilter::parse("L1"), vec![key("A"), key("C")]);
        assert_eq!(delta.shown, vec![key("A"), key("B")]);
        assert_eq!(coordinator.visible(), vec![key("A"), key("B")]);

        let delta = coordinator.set_library_filter(LibraryFilter::parse("L2"), Vec::new());
        assert_eq!(delta.hidden, vec![key("A"), key("B")]);
        assert_eq!(coordinator.visible(), vec![key("C")]);
    }

    #[test]
    fn test_all_filter_hides_everything() {
        let coordinator = coordinator();
        coordinator.show([&key("A")]);
        let delta = coordinator.set_library_filter(LibraryFilter::All, vec![key("A")]);
        assert_eq!(delta.hidden, vec![key("A")]);
        assert!(coordinator.visible().is_empty());
    }

    #[test]
    fn test_revalidate_hides_orphans() {
        let coordinator = coordinator();
        coordinator.show([&key("A"), &key("B")]);
        let delta = coordinator.revalidate(vec![(key("A"), "L1".to_string())]);
        assert_eq!(delta.hidden, vec![key("B")]);
        assert_eq!(coordinator.visible(), vec![key("A")]);
    }
}
