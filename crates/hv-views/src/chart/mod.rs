//! Chart adapter: pushes traces, highlights and axis changes to a chart surface

pub mod headless;
pub mod highlight;
pub mod surface;
pub mod traces;

pub use headless::{HeadlessChart, PlotMargins};
pub use highlight::{HighlightMode, HighlightState};
pub use surface::{
    AxisPair, AxisTransform, ChartSurface, Orientation, PointLocation, RelayoutRequest, StyleUpdate, TraceId,
};
pub use traces::{
    diagonal, square_range, Annotation, AnnotationAnchor, AxisLayout, ChartLayout, ChartMode, LineShape,
    TraceBuilder, TraceDescriptor,
};

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use hv_core::EntityKey;

/// Owns the only path through which trace styles and axis ranges change
pub struct ChartAdapter {
    surface: Arc<dyn ChartSurface>,
    traces: RwLock<Vec<TraceDescriptor>>,
    layout: RwLock<ChartLayout>,
    highlight: Mutex<HighlightState>,
}

impl ChartAdapter {
    pub fn new(surface: Arc<dyn ChartSurface>) -> Self {
        Self {
            surface,
            traces: RwLock::new(Vec::new()),
            layout: RwLock::new(ChartLayout::default()),
            highlight: Mutex::new(HighlightState::default()),
        }
    }

    pub fn surface(&self) -> &Arc<dyn ChartSurface> {
        &self.surface
    }

    /// Replace the chart contents; the highlight set starts empty
    pub fn render(&self, traces: Vec<TraceDescriptor>, layout: ChartLayout) {
        self.surface.render_traces(&traces, &layout);
        self.highlight.lock().reset(traces.len());
        debug!("Rendered {} traces ({:?})", traces.len(), layout.mode);
        *self.traces.write() = traces;
        *self.layout.write() = layout;
    }

    /// Push the combined highlight set, one style update per changed trace.
    /// Returns the number of updates sent.
    pub fn highlight(&self, keys: &[EntityKey], mode: HighlightMode) -> usize {
        let traces = self.traces.read();
        let updates = self.highlight.lock().apply(&traces, keys, mode);
        for (trace, update) in &updates {
            self.surface.restyle(*trace, update);
        }
        updates.len()
    }

    pub fn is_faceted(&self) -> bool {
        matches!(self.layout.read().mode, ChartMode::Facets { .. })
    }

    /// Whether any trace carries a point for `key`
    pub fn has_point(&self, key: &EntityKey) -> bool {
        self.traces.read().iter().any(|t| t.position_of(key).is_some())
    }

    pub fn traces(&self) -> Vec<TraceDescriptor> {
        self.traces.read().clone()
    }

    pub fn layout(&self) -> ChartLayout {
        self.layout.read().clone()
    }

    /// Give both axes the same range and draw the `y = x` diagonal.
    /// Not available for the facet grid.
    pub fn square_axes(&self) -> Option<(f64, f64)> {
        if self.is_faceted() {
            return None;
        }
        let (lo, hi) = square_range(&self.traces.read())?;

        let mut layout = self.layout.write();
        layout.shapes.retain(|shape| !(shape.dotted && shape.axes == AxisPair::PRIMARY));
        layout.shapes.push(diagonal(lo, hi));
        if let Some(axis) = layout.axis_mut(AxisPair::PRIMARY) {
            axis.x_range = Some((lo, hi));
            axis.y_range = Some((lo, hi));
        }

        self.surface.relayout(&RelayoutRequest {
            axes: AxisPair::PRIMARY,
            x_range: Some((lo, hi)),
            y_range: Some((lo, hi)),
            shapes: Some(layout.shapes.clone()),
        });
        Some((lo, hi))
    }
}
