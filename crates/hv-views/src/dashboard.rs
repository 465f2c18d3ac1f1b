//! Dashboard controller.
//!
//! Owns the loaded rows, the aggregation pass, the selection state and the
//! overlays, and keeps the chart and both tables in step with them. Every
//! recompute advances the generation; overlay creations captured under an
//! older generation are discarded when they complete.

use std::sync::Arc;

use egui::{Pos2, Rect, Vec2};
use tracing::{debug, info, warn};

use hv_core::events::events::{
    DataLoaded, DataRejected, HitsChanged, LibraryFilterChanged, TopsChanged, UniquesChanged, VisibleChanged,
};
use hv_core::{
    DashboardSettings, EntityKey, EventBus, Generation, GenerationCounter, LibraryFilter, RawRecord, RowSource,
    SelectionCoordinator,
};
use hv_data::{aggregate, Aggregation, AggregationParams, DataError, Row, RowStore, SchemaDetector, SchemaError, Unique};

use crate::chart::{ChartAdapter, ChartSurface, HeadlessChart, HighlightMode, TraceBuilder};
use crate::overlay::{CardAction, CardContent, Completion, OverlayManager, OverlayRequest, OverlayServices, ResolvedOverlay};
use crate::structure::{EchoRenderer, StructureRenderer};
use crate::tables::{assemble_columns, ColumnSpec, FlagColumn, MemoryTable, TableEvent, TableRow, TableWidget};
use crate::ViewError;

/// The widgets and services the dashboard drives
#[derive(Clone)]
pub struct Collaborators {
    pub chart: Arc<dyn ChartSurface>,
    pub renderer: Arc<dyn StructureRenderer>,
    pub hits_table: Arc<dyn TableWidget>,
    pub tops_table: Arc<dyn TableWidget>,
}

impl Collaborators {
    /// In-memory collaborators for batch use and tests
    pub fn headless(panel: Rect) -> Self {
        Self {
            chart: Arc::new(HeadlessChart::new(panel)),
            renderer: Arc::new(EchoRenderer::new()),
            hits_table: Arc::new(MemoryTable::new()),
            tops_table: Arc::new(MemoryTable::new()),
        }
    }
}

/// Everything derived from one successful ingestion
struct Session {
    store: RowStore,
    aggregation: Aggregation,
    x: String,
    y: String,
    columns: Vec<ColumnSpec>,
    /// Structure columns drawn on cards
    card_structures: Vec<String>,
}

pub struct Dashboard {
    settings: DashboardSettings,
    detector: SchemaDetector,
    session: Option<Session>,
    filter: LibraryFilter,
    selection: SelectionCoordinator,
    overlays: OverlayManager,
    chart: ChartAdapter,
    services: OverlayServices,
    hits_table: Arc<dyn TableWidget>,
    tops_table: Arc<dyn TableWidget>,
    generations: GenerationCounter,
    events: Arc<EventBus>,
}

impl Dashboard {
    pub fn new(settings: DashboardSettings, collaborators: Collaborators) -> Self {
        let services = OverlayServices {
            chart: collaborators.chart.clone(),
            renderer: collaborators.renderer,
            structure_size: settings.structure.to_vec2(),
        };
        Self {
            overlays: OverlayManager::new(settings.card),
            chart: ChartAdapter::new(collaborators.chart),
            detector: SchemaDetector::new(),
            session: None,
            filter: LibraryFilter::All,
            selection: SelectionCoordinator::new(),
            services,
            hits_table: collaborators.hits_table,
            tops_table: collaborators.tops_table,
            generations: GenerationCounter::new(),
            events: Arc::new(EventBus::new()),
            settings,
        }
    }

    /// Use a custom schema detector for later loads
    pub fn with_detector(mut self, detector: SchemaDetector) -> Self {
        self.detector = detector;
        self
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn settings(&self) -> &DashboardSettings {
        &self.settings
    }

    pub fn selection(&self) -> &SelectionCoordinator {
        &self.selection
    }

    pub fn overlays(&self) -> &OverlayManager {
        &self.overlays
    }

    pub fn chart(&self) -> &ChartAdapter {
        &self.chart
    }

    pub fn filter(&self) -> &LibraryFilter {
        &self.filter
    }

    pub fn generation(&self) -> Generation {
        self.generations.current()
    }

    pub fn store(&self) -> Option<&RowStore> {
        self.session.as_ref().map(|s| &s.store)
    }

    pub fn aggregation(&self) -> Option<&Aggregation> {
        self.session.as_ref().map(|s| &s.aggregation)
    }

    /// Rank metric, drawn on x
    pub fn x_metric(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.x.as_str())
    }

    pub fn y_metric(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.y.as_str())
    }

    /// Library selector options: `All` followed by every library
    pub fn library_options(&self) -> Vec<String> {
        let mut options = vec![LibraryFilter::ALL_LABEL.to_string()];
        if let Some(session) = &self.session {
            options.extend(session.store.libraries().iter().cloned());
        }
        options
    }

    fn session(&self) -> Result<&Session, ViewError> {
        self.session.as_ref().ok_or(ViewError::NoData)
    }

    fn params(&self) -> AggregationParams {
        AggregationParams {
            n_top_hits: self.settings.n_top_hits,
            inclusion_threshold: self.settings.inclusion_threshold,
        }
    }

    /// Load rows from `source`. On failure nothing is committed and the
    /// previous session stays on screen.
    pub async fn load(&mut self, source: &dyn RowSource) -> Result<Vec<OverlayRequest>, ViewError> {
        let records = match source.load().await {
            Ok(records) => records,
            Err(e) => {
                let error = match e.downcast::<DataError>() {
                    Ok(error) => error,
                    Err(other) => DataError::Other(other.to_string()),
                };
                self.reject(source.source_name(), &error.to_string());
                return Err(error.into());
            }
        };
        self.ingest(source.source_name(), records)
    }

    /// Replace the session with `records`
    pub fn ingest(&mut self, source_name: &str, records: Vec<RawRecord>) -> Result<Vec<OverlayRequest>, ViewError> {
        let store = match RowStore::ingest(records, &self.detector) {
            Ok(store) => store,
            Err(e) => {
                self.reject(source_name, &e.to_string());
                return Err(e.into());
            }
        };
        let (x, y) = store.layout().default_axes();
        let aggregation = aggregate(&store, &x, &self.params())?;
        let columns = assemble_columns(store.layout());
        let card_structures = self.settings.enabled_structure_columns(&store.layout().structure_columns);

        info!(
            "Loaded {} rows from {} ({} libraries, ranking by {})",
            store.len(),
            source_name,
            store.libraries().len(),
            x
        );
        self.events.publish(DataLoaded {
            source_name: source_name.to_string(),
            row_count: store.len(),
            column_count: store.layout().columns.len(),
        });

        // A new load starts a fresh session: no hits, no cards, all libraries
        self.overlays.clear_all();
        self.selection = SelectionCoordinator::new();
        self.filter = LibraryFilter::All;
        self.hits_table.set_columns(columns.clone());
        self.tops_table.set_columns(columns.clone());
        self.hits_table.set_rows(Vec::new());

        self.session = Some(Session {
            store,
            aggregation: aggregation.clone(),
            x,
            y,
            columns,
            card_structures,
        });
        self.events.publish(HitsChanged { key: None, count: 0 });
        Ok(self.commit(aggregation))
    }

    fn reject(&self, source_name: &str, error: &str) {
        warn!("Rejected {}: {}", source_name, error);
        self.events.publish(DataRejected {
            source_name: source_name.to_string(),
            error: error.to_string(),
        });
    }

    /// Rank by another score column. Unknown columns leave everything unchanged.
    pub fn set_rank_metric(&mut self, metric: &str) -> Result<Vec<OverlayRequest>, ViewError> {
        let session = self.session()?;
        if !session.store.layout().has_score(metric) {
            return Err(SchemaError::UnknownMetric(metric.to_string()).into());
        }
        let aggregation = aggregate(&session.store, metric, &self.params())?;
        if let Some(session) = self.session.as_mut() {
            session.x = metric.to_string();
        }
        Ok(self.commit(aggregation))
    }

    pub fn set_y_metric(&mut self, metric: &str) -> Result<Vec<OverlayRequest>, ViewError> {
        let session = self.session()?;
        if !session.store.layout().has_score(metric) {
            return Err(SchemaError::UnknownMetric(metric.to_string()).into());
        }
        if let Some(session) = self.session.as_mut() {
            session.y = metric.to_string();
        }
        self.recompute()
    }

    /// Switch the library filter; the visible set is reseeded from the
    /// library's visible top entries and hits
    pub fn set_library_filter(&mut self, filter: LibraryFilter) -> Result<Vec<OverlayRequest>, ViewError> {
        let session = self.session()?;
        if let Some(library) = filter.library() {
            if !session.store.libraries().iter().any(|l| l == library) {
                return Err(ViewError::UnknownLibrary(library.to_string()));
            }
        }
        info!("Library filter: {}", filter);
        self.events.publish(LibraryFilterChanged { filter: filter.to_string() });
        self.filter = filter;
        self.recompute()
    }

    /// Replace the settings and recompute with the new tunables
    pub fn apply_settings(&mut self, settings: DashboardSettings) -> Result<Vec<OverlayRequest>, ViewError> {
        settings.validate()?;
        self.services.structure_size = settings.structure.to_vec2();
        self.overlays = OverlayManager::new(settings.card);
        self.settings = settings;
        match self.session.as_mut() {
            Some(session) => {
                session.card_structures = self
                    .settings
                    .enabled_structure_columns(&session.store.layout().structure_columns);
                self.recompute()
            }
            None => Ok(Vec::new()),
        }
    }

    fn recompute(&mut self) -> Result<Vec<OverlayRequest>, ViewError> {
        let session = self.session()?;
        let aggregation = aggregate(&session.store, &session.x, &self.params())?;
        Ok(self.commit(aggregation))
    }

    /// Install a fresh aggregation and rebuild every view from it
    fn commit(&mut self, aggregation: Aggregation) -> Vec<OverlayRequest> {
        let generation = self.generations.advance();
        let dropped = self.overlays.clear_all();
        if !dropped.is_empty() {
            debug!("{} dropped {} overlays", generation, dropped.len());
        }

        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        session.aggregation = aggregation;

        let revalidated = self.selection.revalidate(session.aggregation.catalog());

        let (traces, layout) = TraceBuilder {
            aggregation: &session.aggregation,
            layout: session.store.layout(),
            settings: &self.settings,
            x: &session.x,
            y: &session.y,
        }
        .build(&self.filter, session.store.libraries());
        self.chart.render(traces, layout);

        let seeded = self
            .filter
            .library()
            .map(|library| session.aggregation.visible_tops(library))
            .unwrap_or_default();
        let delta = self.selection.set_library_filter(self.filter.clone(), seeded);

        self.refresh_tables();

        let visible = self.selection.visible();
        let requests = self.request_overlays(&visible, generation);
        self.chart.highlight(&visible, HighlightMode::Replace);

        if let Some(session) = &self.session {
            let aggregation = &session.aggregation;
            self.events.publish(UniquesChanged {
                generation,
                rank_metric: aggregation.metric.clone(),
                count: aggregation.uniques.len(),
                duplicate_groups: aggregation.duplicates.len(),
            });
            self.events.publish(TopsChanged {
                generation,
                libraries: aggregation.tops.len(),
                entries: aggregation.all_tops().count(),
            });
        }

        let mut hidden = revalidated.hidden;
        hidden.extend(delta.hidden);
        self.events.publish(VisibleChanged {
            shown: delta.shown,
            hidden,
            visible: visible.len(),
        });
        requests
    }

    fn table_row(&self, unique: &Unique) -> Option<TableRow> {
        let session = self.session.as_ref()?;
        Some(TableRow::from_unique(unique, &session.columns).with_hit(self.selection.is_hit(unique.key())))
    }

    /// Rebuild both tables from the aggregation and the hit set
    fn refresh_tables(&self) {
        let Some(session) = &self.session else {
            return;
        };
        let mut tops: Vec<TableRow> = session
            .aggregation
            .all_tops()
            .filter_map(|entry| Some(self.table_row(&entry.unique)?.with_visible(entry.visible)))
            .collect();
        // Shown entries that did not make the cut are listed too
        for key in self.selection.visible() {
            if session.aggregation.top_entry(&key).is_some() {
                continue;
            }
            if let Some(row) = session.aggregation.unique(&key).and_then(|u| self.table_row(u)) {
                tops.push(row.with_visible(true));
            }
        }
        self.tops_table.set_rows(tops);

        let hits = self
            .selection
            .hits()
            .iter()
            .filter_map(|key| session.aggregation.unique(key))
            .filter_map(|unique| self.table_row(unique))
            .collect();
        self.hits_table.set_rows(hits);
    }

    /// Start overlays for `keys` and list them as visible in the top-hits table
    fn request_overlays(&mut self, keys: &[EntityKey], generation: Generation) -> Vec<OverlayRequest> {
        let Some(session) = &self.session else {
            return Vec::new();
        };
        let mut requests = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(unique) = session.aggregation.unique(key) else {
                continue;
            };
            if let Some(row) = self.table_row(unique) {
                self.tops_table.update_or_insert_row(key, row.with_visible(true));
            }
            let content = CardContent::describe(
                unique,
                session.store.layout(),
                &session.x,
                &session.y,
                &session.card_structures,
            );
            let size = content.estimated_size(&self.settings);
            if let Some(request) = self.overlays.request(content, size, generation, &self.services) {
                requests.push(request);
            }
        }
        requests
    }

    /// Make `keys` visible. Keys outside the active library are ignored.
    pub fn show(&mut self, keys: &[EntityKey]) -> Vec<OverlayRequest> {
        let delta = self.selection.show(keys);
        if let Some(session) = self.session.as_mut() {
            for key in &delta.shown {
                if let Some(entry) = session.aggregation.top_entry_mut(key) {
                    entry.visible = true;
                }
            }
        }

        let requests = self.request_overlays(&delta.shown, self.generations.current());
        if !delta.shown.is_empty() {
            self.chart.highlight(&delta.shown, HighlightMode::Add);
            self.events.publish(VisibleChanged {
                shown: delta.shown,
                hidden: Vec::new(),
                visible: self.selection.visible().len(),
            });
        }

        let misses = self.overlays.reanchor(self.chart.surface().as_ref());
        if !misses.is_empty() {
            self.hide(&misses);
        }
        requests
    }

    /// Hide `keys`: their cards and connectors go, top entries stay listed
    /// unchecked and any other row leaves the top-hits table.
    pub fn hide(&mut self, keys: &[EntityKey]) {
        for key in keys {
            self.overlays.destroy(key);
        }
        let delta = self.selection.hide(keys);
        if delta.hidden.is_empty() {
            return;
        }

        for key in &delta.hidden {
            let top = self
                .session
                .as_mut()
                .and_then(|s| s.aggregation.top_entry_mut(key))
                .map(|entry| {
                    entry.visible = false;
                    entry.unique.clone()
                });
            match top {
                Some(unique) => {
                    if let Some(row) = self.table_row(&unique) {
                        self.tops_table.update_or_insert_row(key, row.with_visible(false));
                    }
                }
                None => {
                    self.tops_table.delete_row(key);
                }
            }
        }

        self.chart.highlight(&delta.hidden, HighlightMode::Remove);
        self.events.publish(VisibleChanged {
            shown: Vec::new(),
            hidden: delta.hidden,
            visible: self.selection.visible().len(),
        });
    }

    /// Anchor a resolved overlay; a key without a chart point is hidden
    pub fn complete_overlay(&mut self, resolved: ResolvedOverlay) -> Completion {
        let key = resolved.key().clone();
        let completion = self
            .overlays
            .complete(resolved, self.generations.current(), self.chart.surface().as_ref());
        if completion == Completion::AnchorMiss {
            warn!("No chart point for {}, hiding it", key);
            self.hide(&[key]);
        }
        completion
    }

    /// Resolve and complete `requests` one after another
    pub async fn settle(&mut self, requests: Vec<OverlayRequest>) -> Vec<Completion> {
        let mut completions = Vec::with_capacity(requests.len());
        for request in requests {
            let resolved = request.resolve().await;
            completions.push(self.complete_overlay(resolved));
        }
        completions
    }

    /// Show `keys` and wait until their cards are anchored
    pub async fn show_now(&mut self, keys: &[EntityKey]) -> Vec<Completion> {
        let requests = self.show(keys);
        self.settle(requests).await
    }

    /// A click on a chart point toggles its card
    pub fn on_point_clicked(&mut self, key: &EntityKey) -> Vec<OverlayRequest> {
        if self.selection.is_visible(key) {
            self.hide(std::slice::from_ref(key));
            Vec::new()
        } else {
            self.show(std::slice::from_ref(key))
        }
    }

    /// The chart moved its axes; connectors follow and cards whose point
    /// is gone are hidden
    pub fn on_relayout(&mut self) -> Vec<EntityKey> {
        let misses = self.overlays.reanchor(self.chart.surface().as_ref());
        if !misses.is_empty() {
            self.hide(&misses);
        }
        misses
    }

    pub fn on_resize(&mut self) -> Vec<EntityKey> {
        self.on_relayout()
    }

    pub fn begin_drag(&mut self, key: &EntityKey, pointer: Pos2) -> bool {
        self.overlays.begin_drag(key, pointer)
    }

    pub fn drag_to(&mut self, key: &EntityKey, pointer: Pos2) -> Option<Rect> {
        self.overlays.drag_to(key, pointer)
    }

    pub fn end_drag(&mut self, key: &EntityKey) -> bool {
        self.overlays.end_drag(key)
    }

    pub fn set_card_size(&mut self, key: &EntityKey, size: Vec2) -> bool {
        self.overlays.set_card_size(key, size)
    }

    fn known(&self, key: &EntityKey) -> Result<&Unique, ViewError> {
        self.session()?
            .aggregation
            .unique(key)
            .ok_or_else(|| ViewError::UnknownKey(key.clone()))
    }

    /// Flip a key's hit membership; returns the new membership
    pub fn toggle_hit(&mut self, key: &EntityKey) -> Result<bool, ViewError> {
        self.known(key)?;
        let hit = self.selection.toggle_hit(key);
        self.sync_hit(key, hit);
        Ok(hit)
    }

    /// Set a key's hit membership; returns whether it changed
    pub fn set_hit(&mut self, key: &EntityKey, hit: bool) -> Result<bool, ViewError> {
        self.known(key)?;
        let changed = self.selection.set_hit(key, hit);
        if changed {
            self.sync_hit(key, hit);
        }
        Ok(changed)
    }

    fn sync_hit(&self, key: &EntityKey, hit: bool) {
        if hit {
            if let Some(row) = self.known(key).ok().and_then(|unique| self.table_row(unique)) {
                self.hits_table.update_or_insert_row(key, row);
            }
        } else {
            self.hits_table.delete_row(key);
        }
        if let Some(mut row) = self.tops_table.row(key) {
            row.hit = hit;
            self.tops_table.update_or_insert_row(key, row);
        }
        debug!("Hit {} → {}", key, hit);
        self.events.publish(HitsChanged {
            key: Some(key.clone()),
            count: self.selection.hits().len(),
        });
    }

    /// Check or uncheck one top entry's visible flag
    pub fn set_top_visible(&mut self, key: &EntityKey, visible: bool) -> Result<Vec<OverlayRequest>, ViewError> {
        self.known(key)?;
        let unique = self
            .session
            .as_mut()
            .and_then(|s| s.aggregation.top_entry_mut(key))
            .map(|entry| {
                entry.visible = visible;
                entry.unique.clone()
            });
        if let Some(row) = unique.as_ref().and_then(|u| self.table_row(u)) {
            self.tops_table.update_or_insert_row(key, row.with_visible(visible));
        }

        if visible {
            Ok(self.show(std::slice::from_ref(key)))
        } else {
            self.hide(std::slice::from_ref(key));
            Ok(Vec::new())
        }
    }

    /// Check or uncheck every top entry; only the active library's cards change
    pub fn set_all_tops_visible(&mut self, visible: bool) -> Vec<OverlayRequest> {
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        let mut in_filter = Vec::new();
        for entry in session.aggregation.tops.values_mut().flatten() {
            entry.visible = visible;
            if self.filter.matches(entry.unique.library()) {
                in_filter.push(entry.key().clone());
            }
        }
        self.refresh_tables();

        if visible {
            self.show(&in_filter)
        } else {
            self.hide(&in_filter);
            Vec::new()
        }
    }

    pub fn handle_table_event(&mut self, event: TableEvent) -> Result<Vec<OverlayRequest>, ViewError> {
        match event {
            TableEvent::CellEdited { key, column: FlagColumn::Visible, value } => self.set_top_visible(&key, value),
            TableEvent::CellEdited { key, column: FlagColumn::Hit, value } => {
                self.set_hit(&key, value)?;
                Ok(Vec::new())
            }
            TableEvent::AllVisibleToggled { value } => Ok(self.set_all_tops_visible(value)),
            TableEvent::RowDeleted { key } => {
                self.set_hit(&key, false)?;
                Ok(Vec::new())
            }
        }
    }

    /// Run a card button. `Copy` returns the text to put on the clipboard.
    pub fn card_action(&mut self, key: &EntityKey, action: CardAction) -> Result<Option<String>, ViewError> {
        match action {
            CardAction::Bag => {
                self.toggle_hit(key)?;
                Ok(None)
            }
            CardAction::Copy => {
                if let Some(overlay) = self.overlays.get(key) {
                    return Ok(overlay.content.first_structure().map(str::to_string));
                }
                let unique = self.known(key)?;
                Ok(unique.row.structures.values().find(|s| !s.is_empty()).cloned())
            }
            CardAction::Close => {
                self.hide(std::slice::from_ref(key));
                Ok(None)
            }
        }
    }

    /// Uniques of the active library that are hits or visible top entries
    pub fn visible_hits(&self) -> Vec<Unique> {
        let (Some(session), Some(library)) = (&self.session, self.filter.library()) else {
            return Vec::new();
        };
        let mut keys = self.selection.hits_in_filter();
        for key in session.aggregation.visible_tops(library) {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys.iter()
            .filter_map(|key| session.aggregation.unique(key).cloned())
            .collect()
    }

    /// Every original row grouped under `key`
    pub fn encodings(&self, key: &EntityKey) -> Result<Vec<Arc<Row>>, ViewError> {
        let session = self.session()?;
        let indices = session
            .aggregation
            .encodings(key)
            .ok_or_else(|| ViewError::UnknownKey(key.clone()))?;
        Ok(indices
            .into_iter()
            .filter_map(|i| session.store.get(i).cloned())
            .collect())
    }

    /// Square the single-library chart and re-anchor the cards
    pub fn square_axes(&mut self) -> Option<(f64, f64)> {
        let range = self.chart.square_axes()?;
        self.on_relayout();
        Some(range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::{pos2, vec2};
    use hv_core::Value;

    fn record(compound: &str, library: &str, axis: i64, x: f64, y: f64) -> RawRecord {
        let mut record = RawRecord::new();
        record.insert("compound".into(), Value::Text(compound.into()));
        record.insert("library".into(), Value::Text(library.into()));
        record.insert("axis".into(), Value::Int(axis));
        record.insert("c1_smiles".into(), Value::Text(format!("C{}", compound)));
        record.insert("count_A".into(), Value::Int(3));
        record.insert("zscore_A".into(), Value::Float(x));
        record.insert("zscore_B".into(), Value::Float(y));
        record
    }

    fn dashboard() -> Dashboard {
        let panel = Rect::from_min_size(pos2(0.0, 0.0), vec2(800.0, 600.0));
        let mut dashboard = Dashboard::new(DashboardSettings::default(), Collaborators::headless(panel));
        dashboard
            .ingest(
                "fixture",
                vec![
                    record("A", "L1", 6, 3.0, 1.0),
                    record("B", "L1", 6, 2.0, 1.5),
                    record("C", "L1", 2, 5.0, 0.5),
                    record("D", "L2", 6, 4.0, 2.0),
                ],
            )
            .unwrap();
        dashboard
    }

    fn key(k: &str) -> EntityKey {
        EntityKey::from(k)
    }

    #[test]
    fn test_load_starts_on_all_libraries() {
        let dashboard = dashboard();
        assert_eq!(dashboard.filter(), &LibraryFilter::All);
        assert_eq!(dashboard.x_metric(), Some("zscore_A"));
        assert_eq!(dashboard.y_metric(), Some("zscore_B"));
        assert!(dashboard.selection().visible().is_empty());
        assert!(dashboard.chart().is_faceted());
        assert_eq!(dashboard.library_options(), vec!["All", "L1", "L2"]);
    }

    #[test]
    fn test_library_filter_seeds_top_entries() {
        let mut dashboard = dashboard();
        let requests = dashboard.set_library_filter(LibraryFilter::parse("L1")).unwrap();
        assert_eq!(dashboard.selection().visible(), vec![key("A"), key("B")]);
        assert_eq!(requests.len(), 2);
        assert!(!dashboard.chart().is_faceted());
    }

    #[test]
    fn test_unknown_library_and_metric_are_rejected() {
        let mut dashboard = dashboard();
        let before = dashboard.generation();
        assert!(matches!(
            dashboard.set_library_filter(LibraryFilter::parse("L9")),
            Err(ViewError::UnknownLibrary(_))
        ));
        assert!(dashboard.set_rank_metric("zscore_Z").is_err());
        assert_eq!(dashboard.generation(), before);
        assert_eq!(dashboard.x_metric(), Some("zscore_A"));
    }

    #[test]
    fn test_hits_do_not_change_visibility() {
        let mut dashboard = dashboard();
        dashboard.set_library_filter(LibraryFilter::parse("L1")).unwrap();
        assert!(dashboard.toggle_hit(&key("C")).unwrap());
        assert!(!dashboard.selection().is_visible(&key("C")));
        assert!(matches!(dashboard.toggle_hit(&key("Z")), Err(ViewError::UnknownKey(_))));
    }

    #[test]
    fn test_hide_keeps_top_rows_unchecked() {
        let mut dashboard = dashboard();
        dashboard.set_library_filter(LibraryFilter::parse("L1")).unwrap();
        dashboard.show(&[key("C")]);
        dashboard.hide(&[key("A"), key("C")]);

        let tops = dashboard.tops_table.clone();
        assert_eq!(tops.row(&key("A")).and_then(|r| r.visible), Some(false));
        assert!(tops.row(&key("C")).is_none());
        assert_eq!(dashboard.selection().visible(), vec![key("B")]);
    }

    #[test]
    fn test_encodings_of_singleton() {
        let dashboard = dashboard();
        let rows = dashboard.encodings(&key("D")).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].index, 3);
    }
}
