//! Overlay/connector manager: floating cards anchored to chart points.
//!
//! Each key moves through `Absent → Creating → Anchored → Dragged → Anchored`
//! and back to `Absent` when destroyed. Creation is split in three steps so
//! nothing is held across the asynchronous part:
//!
//! 1. [`OverlayManager::request`] registers a ticket and returns an [`OverlayRequest`];
//! 2. [`OverlayRequest::resolve`] waits for the chart's render pass and renders the structures;
//! 3. [`OverlayManager::complete`] checks the ticket against the current generation and anchors the card.

mod anchor;
mod card;
mod connector;
mod placement;

pub use anchor::{anchor_point, try_anchor, AnchorMiss};
pub use card::{CardAction, CardContent, CardLine};
pub use connector::{card_attachment, ConnectorCanvas, ConnectorLine};
pub use placement::place_card;

use std::sync::Arc;

use egui::{Pos2, Rect, Vec2};
use indexmap::IndexMap;
use tracing::{debug, warn};

use hv_core::{CardSettings, EntityKey, Generation};

use crate::chart::ChartSurface;
use crate::structure::{InlineGraphic, StructureRenderer};

/// Identifies one creation attempt of one overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    pub generation: Generation,
    serial: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayPhase {
    Absent,
    Creating,
    Anchored,
    Dragged,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DragState {
    Idle,
    /// Pointer position and card origin when the drag started
    Dragging { pointer: Pos2, origin: Pos2 },
}

/// A card on screen
#[derive(Debug, Clone)]
pub struct Overlay {
    pub content: CardContent,
    /// One slot per structure column; `None` when blank or failed
    pub structures: Vec<Option<InlineGraphic>>,
    pub rect: Rect,
    pub anchor: Pos2,
    pub generation: Generation,
    drag: DragState,
}

impl Overlay {
    /// Offset from the drag start while dragging
    pub fn drag_offset(&self) -> Option<Vec2> {
        match self.drag {
            DragState::Idle => None,
            DragState::Dragging { origin, .. } => Some(self.rect.min - origin),
        }
    }
}

/// Collaborators an overlay needs while it is being created
#[derive(Clone)]
pub struct OverlayServices {
    pub chart: Arc<dyn ChartSurface>,
    pub renderer: Arc<dyn StructureRenderer>,
    pub structure_size: Vec2,
}

/// An overlay waiting for the chart and the structure renderer
pub struct OverlayRequest {
    ticket: Ticket,
    content: CardContent,
    size: Vec2,
    services: OverlayServices,
}

/// The answers an overlay was waiting for
#[derive(Debug, Clone)]
pub struct ResolvedOverlay {
    pub ticket: Ticket,
    pub content: CardContent,
    pub size: Vec2,
    pub structures: Vec<Option<InlineGraphic>>,
}

impl ResolvedOverlay {
    pub fn key(&self) -> &EntityKey {
        &self.content.key
    }
}

impl OverlayRequest {
    pub fn key(&self) -> &EntityKey {
        &self.content.key
    }

    pub fn ticket(&self) -> Ticket {
        self.ticket
    }

    /// Wait for the chart's render pass, then render every structure slot.
    /// A failing structure leaves its slot blank.
    pub async fn resolve(self) -> ResolvedOverlay {
        self.services.chart.render_complete().await;

        let mut structures = Vec::with_capacity(self.content.structures.len());
        for (column, descriptor) in &self.content.structures {
            if descriptor.is_empty() {
                structures.push(None);
                continue;
            }
            match self
                .services
                .renderer
                .render_structure(descriptor, self.services.structure_size)
                .await
            {
                Ok(graphic) => structures.push(Some(graphic)),
                Err(e) => {
                    warn!("Card {} leaves {} blank: {}", self.content.key, column, e);
                    structures.push(None);
                }
            }
        }

        ResolvedOverlay {
            ticket: self.ticket,
            content: self.content,
            size: self.size,
            structures,
        }
    }
}

/// Outcome of completing a resolved overlay
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// The card is on screen at this rectangle
    Anchored(Rect),
    /// Captured under an older generation; discarded
    Stale,
    /// Destroyed or re-requested while creating; discarded
    Superseded,
    /// The key has no point on the chart; the caller hides it
    AnchorMiss,
}

/// Owns every overlay and the connector canvas
pub struct OverlayManager {
    card: CardSettings,
    pending: IndexMap<EntityKey, Ticket>,
    overlays: IndexMap<EntityKey, Overlay>,
    connectors: ConnectorCanvas,
    next_serial: u64,
}

impl OverlayManager {
    pub fn new(card: CardSettings) -> Self {
        Self {
            card,
            pending: IndexMap::new(),
            overlays: IndexMap::new(),
            connectors: ConnectorCanvas::new(),
            next_serial: 0,
        }
    }

    pub fn phase(&self, key: &EntityKey) -> OverlayPhase {
        if self.pending.contains_key(key) {
            return OverlayPhase::Creating;
        }
        match self.overlays.get(key) {
            Some(overlay) if overlay.drag != DragState::Idle => OverlayPhase::Dragged,
            Some(_) => OverlayPhase::Anchored,
            None => OverlayPhase::Absent,
        }
    }

    pub fn get(&self, key: &EntityKey) -> Option<&Overlay> {
        self.overlays.get(key)
    }

    /// Keys of the cards on screen
    pub fn keys(&self) -> Vec<EntityKey> {
        self.overlays.keys().cloned().collect()
    }

    pub fn pending_keys(&self) -> Vec<EntityKey> {
        self.pending.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.overlays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overlays.is_empty() && self.pending.is_empty()
    }

    pub fn connectors(&self) -> &ConnectorCanvas {
        &self.connectors
    }

    /// Start creating a card for `content.key`. Returns `None` when the key
    /// already has a card or a creation in flight.
    pub fn request(
        &mut self,
        content: CardContent,
        size: Vec2,
        generation: Generation,
        services: &OverlayServices,
    ) -> Option<OverlayRequest> {
        if self.phase(&content.key) != OverlayPhase::Absent {
            return None;
        }
        self.next_serial += 1;
        let ticket = Ticket {
            generation,
            serial: self.next_serial,
        };
        self.pending.insert(content.key.clone(), ticket);
        debug!("Overlay {} creating ({})", content.key, generation);

        Some(OverlayRequest {
            ticket,
            content,
            size,
            services: services.clone(),
        })
    }

    /// Anchor a resolved overlay if it is still wanted
    pub fn complete(&mut self, resolved: ResolvedOverlay, current: Generation, surface: &dyn ChartSurface) -> Completion {
        let key = resolved.key().clone();

        if resolved.ticket.generation != current {
            if self.pending.get(&key) == Some(&resolved.ticket) {
                self.pending.shift_remove(&key);
            }
            debug!("Discarding overlay {} from {} (now {})", key, resolved.ticket.generation, current);
            return Completion::Stale;
        }
        if self.pending.get(&key) != Some(&resolved.ticket) {
            debug!("Discarding superseded overlay {}", key);
            return Completion::Superseded;
        }
        self.pending.shift_remove(&key);

        let anchor = match try_anchor(surface, &key) {
            Ok(anchor) => anchor,
            Err(miss) => {
                debug!("{}", miss);
                return Completion::AnchorMiss;
            }
        };

        let rect = place_card(anchor.x, resolved.size, surface.panel_rect(), &self.card);
        self.connectors.attach(key.clone(), anchor, rect);
        self.overlays.insert(
            key.clone(),
            Overlay {
                content: resolved.content,
                structures: resolved.structures,
                rect,
                anchor,
                generation: current,
                drag: DragState::Idle,
            },
        );
        debug!("Overlay {} anchored at {:?}", key, anchor);
        Completion::Anchored(rect)
    }

    /// Remove a card, its connector and any creation in flight.
    /// Returns whether anything existed.
    pub fn destroy(&mut self, key: &EntityKey) -> bool {
        let pending = self.pending.shift_remove(key).is_some();
        let overlay = self.overlays.shift_remove(key).is_some();
        self.connectors.remove(key);
        if pending || overlay {
            debug!("Overlay {} destroyed", key);
        }
        pending || overlay
    }

    /// Destroy everything; returns the keys that had a card or a creation in flight
    pub fn clear_all(&mut self) -> Vec<EntityKey> {
        let mut keys: Vec<EntityKey> = self.pending.keys().cloned().collect();
        keys.extend(self.overlays.keys().cloned());
        self.pending.clear();
        self.overlays.clear();
        self.connectors.clear();
        keys
    }

    /// Recompute every connector's chart end. Cards whose point is gone
    /// are destroyed and their keys returned.
    pub fn reanchor(&mut self, surface: &dyn ChartSurface) -> Vec<EntityKey> {
        let mut misses = Vec::new();
        for (key, overlay) in self.overlays.iter_mut() {
            match try_anchor(surface, key) {
                Ok(anchor) => {
                    overlay.anchor = anchor;
                    self.connectors.update_chart_end(key, anchor);
                }
                Err(_) => misses.push(key.clone()),
            }
        }
        for key in &misses {
            self.destroy(key);
        }
        if !misses.is_empty() {
            debug!("Re-anchoring dropped {} overlays", misses.len());
        }
        misses
    }

    /// Start dragging a card by its header
    pub fn begin_drag(&mut self, key: &EntityKey, pointer: Pos2) -> bool {
        match self.overlays.get_mut(key) {
            Some(overlay) => {
                overlay.drag = DragState::Dragging {
                    pointer,
                    origin: overlay.rect.min,
                };
                true
            }
            None => false,
        }
    }

    /// Move a dragged card with the pointer; the connector's card end follows
    pub fn drag_to(&mut self, key: &EntityKey, pointer: Pos2) -> Option<Rect> {
        let overlay = self.overlays.get_mut(key)?;
        let DragState::Dragging { pointer: start, origin } = overlay.drag else {
            return None;
        };
        overlay.rect = Rect::from_min_size(origin + (pointer - start), overlay.rect.size());
        self.connectors.update_card_end(key, overlay.rect);
        Some(overlay.rect)
    }

    /// Release a dragged card where it is
    pub fn end_drag(&mut self, key: &EntityKey) -> bool {
        match self.overlays.get_mut(key) {
            Some(overlay) if overlay.drag != DragState::Idle => {
                overlay.drag = DragState::Idle;
                true
            }
            _ => false,
        }
    }

    /// Adopt the size the host measured for a card
    pub fn set_card_size(&mut self, key: &EntityKey, size: Vec2) -> bool {
        match self.overlays.get_mut(key) {
            Some(overlay) => {
                overlay.rect = Rect::from_min_size(overlay.rect.min, size);
                self.connectors.update_card_end(key, overlay.rect);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{AxisLayout, AxisPair, ChartLayout, HeadlessChart, TraceDescriptor};
    use crate::structure::EchoRenderer;
    use egui::{pos2, vec2};
    use hv_core::GenerationCounter;

    fn chart() -> Arc<HeadlessChart> {
        let chart = Arc::new(HeadlessChart::new(Rect::from_min_size(pos2(0.0, 0.0), vec2(465.0, 275.0))));
        let trace = TraceDescriptor {
            name: "Tri-sython".into(),
            class: None,
            axes: AxisPair::PRIMARY,
            ids: vec![EntityKey::from("A"), EntityKey::from("B")],
            x: vec![Some(5.0), Some(1.0)],
            y: vec![Some(5.0), Some(1.0)],
            colors: Vec::new(),
            marker_size: 20.0,
            hover_text: Vec::new(),
            show_legend: true,
        };
        let layout = ChartLayout {
            axes: vec![AxisLayout {
                axes: AxisPair::PRIMARY,
                domain_x: (0.0, 1.0),
                domain_y: (0.0, 1.0),
                x_range: Some((0.0, 10.0)),
                y_range: Some((0.0, 10.0)),
                show_x_ticks: true,
                show_y_ticks: true,
                x_title: None,
                y_title: None,
            }],
            ..ChartLayout::default()
        };
        chart.render_traces(&[trace], &layout);
        chart
    }

    fn content(key: &str, structures: &[(&str, &str)]) -> CardContent {
        CardContent {
            key: EntityKey::from(key),
            title: key.to_string(),
            copies: 1,
            lines: Vec::new(),
            structures: structures.iter().map(|(c, d)| (c.to_string(), d.to_string())).collect(),
        }
    }

    fn services(chart: Arc<HeadlessChart>, renderer: Arc<EchoRenderer>) -> OverlayServices {
        OverlayServices {
            chart,
            renderer,
            structure_size: vec2(240.0, 100.0),
        }
    }

    #[tokio::test]
    async fn test_create_anchor_and_connect() {
        let chart = chart();
        let renderer = Arc::new(EchoRenderer::new());
        let services = services(chart.clone(), renderer.clone());
        let generations = GenerationCounter::new();
        let generation = generations.advance();
        let mut manager = OverlayManager::new(CardSettings::default());

        let request = manager
            .request(content("A", &[("c1_smiles", "CCO"), ("c2_smiles", "")]), vec2(250.0, 200.0), generation, &services)
            .unwrap();
        assert_eq!(manager.phase(&EntityKey::from("A")), OverlayPhase::Creating);
        assert!(manager
            .request(content("A", &[]), vec2(250.0, 200.0), generation, &services)
            .is_none());

        let resolved = request.resolve().await;
        assert_eq!(renderer.calls(), 1);
        assert!(resolved.structures[0].is_some());
        assert!(resolved.structures[1].is_none());

        let completion = manager.complete(resolved, generations.current(), chart.as_ref());
        // x = 5 maps to 60 + 200 = 260, so the 250 wide card starts at 135
        assert_eq!(completion, Completion::Anchored(Rect::from_min_size(pos2(135.0, 30.0), vec2(250.0, 200.0))));

        let key = EntityKey::from("A");
        assert_eq!(manager.phase(&key), OverlayPhase::Anchored);
        let line = manager.connectors().get(&key).copied().unwrap();
        assert_eq!(line.chart_end, pos2(260.0, 105.0));
        assert_eq!(line.card_end, pos2(260.0, 230.0));
    }

    #[tokio::test]
    async fn test_render_failure_leaves_slot_blank() {
        let chart = chart();
        let renderer = Arc::new(EchoRenderer::new());
        renderer.fail_on("BAD");
        let services = services(chart.clone(), renderer);
        let generations = GenerationCounter::new();
        let mut manager = OverlayManager::new(CardSettings::default());

        let request = manager
            .request(content("A", &[("c1_smiles", "BAD"), ("c2_smiles", "CC")]), vec2(250.0, 200.0), generations.current(), &services)
            .unwrap();
        let resolved = request.resolve().await;
        assert!(matches!(manager.complete(resolved, generations.current(), chart.as_ref()), Completion::Anchored(_)));

        let overlay = manager.get(&EntityKey::from("A")).unwrap();
        assert!(overlay.structures[0].is_none());
        assert_eq!(overlay.structures[1].as_ref().map(|g| g.descriptor.as_str()), Some("CC"));
    }

    #[tokio::test]
    async fn test_stale_and_superseded_results_are_discarded() {
        let chart = chart();
        let services = services(chart.clone(), Arc::new(EchoRenderer::new()));
        let generations = GenerationCounter::new();
        let mut manager = OverlayManager::new(CardSettings::default());

        let stale = manager
            .request(content("A", &[]), vec2(250.0, 200.0), generations.current(), &services)
            .unwrap()
            .resolve()
            .await;
        generations.advance();
        assert_eq!(manager.complete(stale, generations.current(), chart.as_ref()), Completion::Stale);
        assert_eq!(manager.phase(&EntityKey::from("A")), OverlayPhase::Absent);

        let superseded = manager
            .request(content("B", &[]), vec2(250.0, 200.0), generations.current(), &services)
            .unwrap()
            .resolve()
            .await;
        assert!(manager.destroy(&EntityKey::from("B")));
        assert_eq!(manager.complete(superseded, generations.current(), chart.as_ref()), Completion::Superseded);
        assert!(manager.is_empty());
    }

    #[tokio::test]
    async fn test_drag_reanchor_and_destroy() {
        let chart = chart();
        let services = services(chart.clone(), Arc::new(EchoRenderer::new()));
        let generations = GenerationCounter::new();
        let mut manager = OverlayManager::new(CardSettings::default());
        let key = EntityKey::from("A");

        for name in ["A", "B"] {
            let resolved = manager
                .request(content(name, &[]), vec2(100.0, 50.0), generations.current(), &services)
                .unwrap()
                .resolve()
                .await;
            manager.complete(resolved, generations.current(), chart.as_ref());
        }

        assert!(manager.begin_drag(&key, pos2(200.0, 40.0)));
        assert_eq!(manager.phase(&key), OverlayPhase::Dragged);
        let moved = manager.drag_to(&key, pos2(230.0, 60.0)).unwrap();
        assert_eq!(moved.min, pos2(240.0, 50.0));
        assert_eq!(manager.get(&key).unwrap().drag_offset(), Some(vec2(30.0, 20.0)));
        assert_eq!(manager.connectors().get(&key).unwrap().card_end, pos2(290.0, 100.0));
        assert!(manager.end_drag(&key));
        assert_eq!(manager.phase(&key), OverlayPhase::Anchored);
        assert_eq!(manager.get(&key).unwrap().rect.min, pos2(240.0, 50.0));
        assert!(manager.drag_to(&key, pos2(0.0, 0.0)).is_none());

        chart.filter_out(&EntityKey::from("B"));
        assert_eq!(manager.reanchor(chart.as_ref()), vec![EntityKey::from("B")]);
        assert_eq!(manager.phase(&EntityKey::from("B")), OverlayPhase::Absent);
        assert_eq!(manager.connectors().len(), 1);

        assert!(manager.destroy(&key));
        assert!(!manager.destroy(&key));
        assert!(manager.connectors().is_empty());
    }
}
