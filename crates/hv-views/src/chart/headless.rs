//! A chart surface without a screen, used by the command line report and tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use ahash::AHashSet;
use async_trait::async_trait;
use egui::Rect;
use parking_lot::RwLock;
use tokio::sync::Notify;
use tracing::trace;

use hv_core::EntityKey;

use super::surface::{
    AxisPair, AxisTransform, ChartSurface, Orientation, PointLocation, RelayoutRequest, StyleUpdate, TraceId,
};
use super::traces::{ChartLayout, TraceDescriptor};

/// Space between the panel edges and the plot area, in pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotMargins {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl Default for PlotMargins {
    fn default() -> Self {
        Self {
            left: 60.0,
            right: 5.0,
            top: 5.0,
            bottom: 70.0,
        }
    }
}

struct HeadlessState {
    panel: Rect,
    margins: PlotMargins,
    traces: Vec<TraceDescriptor>,
    layout: ChartLayout,
    restyles: Vec<(TraceId, StyleUpdate)>,
    relayouts: Vec<RelayoutRequest>,
    filtered_out: AHashSet<EntityKey>,
}

/// In-memory chart surface.
///
/// Render passes complete immediately unless the chart was built with
/// [`HeadlessChart::with_manual_completion`], in which case
/// [`HeadlessChart::complete_render`] signals completion.
pub struct HeadlessChart {
    state: RwLock<HeadlessState>,
    completed: AtomicBool,
    auto_complete: bool,
    render_count: AtomicUsize,
    notify: Notify,
}

impl HeadlessChart {
    pub fn new(panel: Rect) -> Self {
        Self {
            state: RwLock::new(HeadlessState {
                panel,
                margins: PlotMargins::default(),
                traces: Vec::new(),
                layout: ChartLayout::default(),
                restyles: Vec::new(),
                relayouts: Vec::new(),
                filtered_out: AHashSet::new(),
            }),
            completed: AtomicBool::new(true),
            auto_complete: true,
            render_count: AtomicUsize::new(0),
            notify: Notify::new(),
        }
    }

    /// Keep render passes pending until `complete_render` is called
    pub fn with_manual_completion(mut self) -> Self {
        self.auto_complete = false;
        self
    }

    pub fn with_margins(self, margins: PlotMargins) -> Self {
        self.state.write().margins = margins;
        self
    }

    /// Signal that the current render pass finished
    pub fn complete_render(&self) {
        self.completed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_render_complete(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn render_count(&self) -> usize {
        self.render_count.load(Ordering::SeqCst)
    }

    pub fn resize(&self, panel: Rect) {
        self.state.write().panel = panel;
    }

    /// Stop reporting a point, as if the surface had filtered it out
    pub fn filter_out(&self, key: &EntityKey) {
        self.state.write().filtered_out.insert(key.clone());
    }

    pub fn traces(&self) -> Vec<TraceDescriptor> {
        self.state.read().traces.clone()
    }

    pub fn layout(&self) -> ChartLayout {
        self.state.read().layout.clone()
    }

    pub fn restyles(&self) -> Vec<(TraceId, StyleUpdate)> {
        self.state.read().restyles.clone()
    }

    pub fn relayouts(&self) -> Vec<RelayoutRequest> {
        self.state.read().relayouts.clone()
    }

    pub fn clear_log(&self) {
        let mut state = self.state.write();
        state.restyles.clear();
        state.relayouts.clear();
    }
}

impl HeadlessState {
    /// Layout range, or the padded extent of the data drawn on the axis
    fn range(&self, axes: AxisPair, fixed: Option<(f64, f64)>, pick: fn(&TraceDescriptor) -> &[Option<f64>]) -> (f64, f64) {
        if let Some(range) = fixed {
            return range;
        }
        let values: Vec<f64> = self
            .traces
            .iter()
            .filter(|t| t.axes == axes)
            .flat_map(|t| pick(t).iter().flatten().copied())
            .filter(|v| v.is_finite())
            .collect();
        if values.is_empty() {
            return (0.0, 1.0);
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let pad = if max > min { (max - min) * 0.05 } else { 0.5 };
        (min - pad, max + pad)
    }
}

#[async_trait]
impl ChartSurface for HeadlessChart {
    fn render_traces(&self, traces: &[TraceDescriptor], layout: &ChartLayout) {
        {
            let mut state = self.state.write();
            state.traces = traces.to_vec();
            state.layout = layout.clone();
            state.filtered_out.clear();
        }
        self.render_count.fetch_add(1, Ordering::SeqCst);
        trace!("Headless render pass with {} traces", traces.len());

        if self.auto_complete {
            self.complete_render();
        } else {
            self.completed.store(false, Ordering::SeqCst);
        }
    }

    async fn render_complete(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_render_complete() {
                return;
            }
            notified.await;
        }
    }

    fn locate_point(&self, key: &EntityKey) -> Option<PointLocation> {
        let state = self.state.read();
        if state.filtered_out.contains(key) {
            return None;
        }
        state.traces.iter().enumerate().find_map(|(trace, descriptor)| {
            let index = descriptor.position_of(key)?;
            Some(PointLocation {
                trace,
                index,
                axes: descriptor.axes,
                x: descriptor.x.get(index).copied().flatten()?,
                y: descriptor.y.get(index).copied().flatten()?,
            })
        })
    }

    fn axis_transforms(&self, axes: AxisPair) -> Option<(AxisTransform, AxisTransform)> {
        let state = self.state.read();
        let axis = state.layout.axis(axes)?;
        let margins = state.margins;
        let plot_w = (state.panel.width() - margins.left - margins.right).max(0.0);
        let plot_h = (state.panel.height() - margins.top - margins.bottom).max(0.0);

        let x = AxisTransform {
            offset: margins.left + axis.domain_x.0 * plot_w,
            length: (axis.domain_x.1 - axis.domain_x.0) * plot_w,
            range: state.range(axes, axis.x_range, |t| t.x.as_slice()),
            orientation: Orientation::Horizontal,
        };
        let y = AxisTransform {
            offset: margins.top + (1.0 - axis.domain_y.1) * plot_h,
            length: (axis.domain_y.1 - axis.domain_y.0) * plot_h,
            range: state.range(axes, axis.y_range, |t| t.y.as_slice()),
            orientation: Orientation::Vertical,
        };
        Some((x, y))
    }

    fn panel_rect(&self) -> Rect {
        self.state.read().panel
    }

    fn restyle(&self, trace: TraceId, update: &StyleUpdate) {
        self.state.write().restyles.push((trace, update.clone()));
    }

    fn relayout(&self, request: &RelayoutRequest) {
        let mut state = self.state.write();
        if let Some(axis) = state.layout.axis_mut(request.axes) {
            if request.x_range.is_some() {
                axis.x_range = request.x_range;
            }
            if request.y_range.is_some() {
                axis.y_range = request.y_range;
            }
        }
        if let Some(shapes) = &request.shapes {
            state.layout.shapes = shapes.clone();
        }
        state.relayouts.push(request.clone());
    }
}
