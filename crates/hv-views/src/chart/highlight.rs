//! Batched marker highlighting

use ahash::AHashSet;
use indexmap::IndexSet;

use hv_core::EntityKey;

use super::surface::{StyleUpdate, TraceId};
use super::traces::TraceDescriptor;

/// How the affected keys combine with the current highlight set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightMode {
    Add,
    Remove,
    Replace,
}

/// Selected point indices per rendered trace
#[derive(Debug, Clone, Default)]
pub struct HighlightState {
    selected: Vec<IndexSet<usize>>,
}

impl HighlightState {
    /// Forget every selection after a new render pass
    pub fn reset(&mut self, trace_count: usize) {
        self.selected = vec![IndexSet::new(); trace_count];
    }

    pub fn selected(&self, trace: TraceId) -> Option<&IndexSet<usize>> {
        self.selected.get(trace)
    }

    /// Combine `keys` with the current selection and return one update per
    /// trace whose selection changed. Traces without point identities are skipped.
    pub fn apply(
        &mut self,
        traces: &[TraceDescriptor],
        keys: &[EntityKey],
        mode: HighlightMode,
    ) -> Vec<(TraceId, StyleUpdate)> {
        if self.selected.len() != traces.len() {
            self.reset(traces.len());
        }
        let wanted: AHashSet<&EntityKey> = keys.iter().collect();
        let mut updates = Vec::new();

        for (trace_id, trace) in traces.iter().enumerate() {
            if !trace.has_ids() {
                continue;
            }
            let matches: IndexSet<usize> = trace
                .ids
                .iter()
                .enumerate()
                .filter(|(_, id)| wanted.contains(id))
                .map(|(index, _)| index)
                .collect();

            let current = &self.selected[trace_id];
            let next: IndexSet<usize> = match mode {
                HighlightMode::Add => current.iter().chain(matches.iter()).copied().collect(),
                HighlightMode::Remove => current.iter().filter(|i| !matches.contains(*i)).copied().collect(),
                HighlightMode::Replace => matches,
            };

            if &next != current {
                updates.push((trace_id, StyleUpdate::selection(next.iter().copied().collect())));
                self.selected[trace_id] = next;
            }
        }
        updates
    }
}
