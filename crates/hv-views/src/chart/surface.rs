//! The charting-surface contract

use async_trait::async_trait;
use egui::{Color32, Rect};

use hv_core::EntityKey;

use super::traces::{ChartLayout, LineShape, TraceDescriptor};

/// Position of a trace in the last rendered trace list
pub type TraceId = usize;

/// A subplot's axis pair; `0` is the primary `x`/`y` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct AxisPair(pub usize);

impl AxisPair {
    pub const PRIMARY: AxisPair = AxisPair(0);

    /// `x`, `x2`, `x3`, ...
    pub fn x_name(self) -> String {
        if self.0 == 0 {
            "x".to_string()
        } else {
            format!("x{}", self.0 + 1)
        }
    }

    /// `y`, `y2`, `y3`, ...
    pub fn y_name(self) -> String {
        if self.0 == 0 {
            "y".to_string()
        } else {
            format!("y{}", self.0 + 1)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    /// Pixel coordinates grow downward while data values grow upward
    Vertical,
}

/// Data-to-pixel mapping of one axis, relative to the chart panel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisTransform {
    /// Pixel offset of the axis start inside the panel
    pub offset: f32,
    /// Pixel length of the axis
    pub length: f32,
    /// Data range shown
    pub range: (f64, f64),
    pub orientation: Orientation,
}

impl AxisTransform {
    /// Panel-relative pixel of a data value
    pub fn to_pixel(&self, value: f64) -> Option<f32> {
        let span = self.range.1 - self.range.0;
        if !value.is_finite() || !span.is_finite() || span == 0.0 {
            return None;
        }
        let fraction = ((value - self.range.0) / span) as f32;
        Some(match self.orientation {
            Orientation::Horizontal => self.offset + fraction * self.length,
            Orientation::Vertical => self.offset + (1.0 - fraction) * self.length,
        })
    }

    /// Data value under a panel-relative pixel
    pub fn to_value(&self, pixel: f32) -> Option<f64> {
        if self.length == 0.0 {
            return None;
        }
        let fraction = ((pixel - self.offset) / self.length) as f64;
        let fraction = match self.orientation {
            Orientation::Horizontal => fraction,
            Orientation::Vertical => 1.0 - fraction,
        };
        Some(self.range.0 + fraction * (self.range.1 - self.range.0))
    }
}

/// Where a keyed point currently sits in data space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLocation {
    pub trace: TraceId,
    /// Index of the point within its trace
    pub index: usize,
    pub axes: AxisPair,
    pub x: f64,
    pub y: f64,
}

/// Marker style pushed to one trace in a single call
#[derive(Debug, Clone, PartialEq)]
pub struct StyleUpdate {
    pub selected_points: Vec<usize>,
    pub selected_marker_size: f32,
    pub selected_line_width: f32,
    pub selected_line_color: Color32,
    pub unselected_opacity: f32,
}

impl StyleUpdate {
    /// Selection style for the given point indices
    pub fn selection(selected_points: Vec<usize>) -> Self {
        Self {
            selected_points,
            selected_marker_size: 30.0,
            selected_line_width: 2.0,
            selected_line_color: Color32::BLACK,
            unselected_opacity: 0.4,
        }
    }
}

/// Axis range and shape changes applied to an already rendered chart
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RelayoutRequest {
    pub axes: AxisPair,
    pub x_range: Option<(f64, f64)>,
    pub y_range: Option<(f64, f64)>,
    /// Replaces the layout's shapes when set
    pub shapes: Option<Vec<LineShape>>,
}

/// A chart that renders trace descriptors and reports point positions.
///
/// Implementations live outside this crate except for the headless one.
#[async_trait]
pub trait ChartSurface: Send + Sync {
    /// Replace every trace and the layout
    fn render_traces(&self, traces: &[TraceDescriptor], layout: &ChartLayout);

    /// Resolves once the last render pass has completed
    async fn render_complete(&self);

    /// Data-space location of the point identified by `key`
    fn locate_point(&self, key: &EntityKey) -> Option<PointLocation>;

    /// Current transforms of an axis pair
    fn axis_transforms(&self, axes: AxisPair) -> Option<(AxisTransform, AxisTransform)>;

    /// Screen rectangle of the chart panel
    fn panel_rect(&self) -> Rect;

    fn restyle(&self, trace: TraceId, update: &StyleUpdate);

    fn relayout(&self, request: &RelayoutRequest);
}
