//! Trace descriptors and chart layout assembled from an aggregation pass

use egui::Color32;

use hv_core::{DashboardSettings, EntityKey, LibraryFilter};
use hv_data::{Aggregation, ColumnLayout, Row, StructuralClass, Unique};

use super::surface::AxisPair;
use crate::overlay::CardContent;

const SINGLE_MARKER_SIZE: f32 = 20.0;
const FACET_MARKER_SIZE: f32 = 10.0;
const FACET_X_GAP: f32 = 0.03;
const FACET_Y_GAP: f32 = 0.05;
const FACET_RANGE_PADDING: f64 = 0.05;
const SQUARE_PADDING: f64 = 0.01;

/// One scatter trace
#[derive(Debug, Clone, PartialEq)]
pub struct TraceDescriptor {
    pub name: String,
    /// Set for the per-class traces of a single library
    pub class: Option<StructuralClass>,
    pub axes: AxisPair,
    /// Point identities; empty for static facet traces
    pub ids: Vec<EntityKey>,
    pub x: Vec<Option<f64>>,
    pub y: Vec<Option<f64>>,
    pub colors: Vec<Color32>,
    pub marker_size: f32,
    pub hover_text: Vec<String>,
    pub show_legend: bool,
}

impl TraceDescriptor {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn has_ids(&self) -> bool {
        !self.ids.is_empty()
    }

    /// Index of the point identified by `key`
    pub fn position_of(&self, key: &EntityKey) -> Option<usize> {
        self.ids.iter().position(|id| id == key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChartMode {
    /// One library, one subplot with a trace per structural class
    #[default]
    Single,
    /// Every library in its own subplot
    Facets { rows: usize, columns: usize },
}

/// Per-subplot axis layout
#[derive(Debug, Clone, PartialEq)]
pub struct AxisLayout {
    pub axes: AxisPair,
    /// Horizontal extent in panel fractions
    pub domain_x: (f32, f32),
    /// Vertical extent in panel fractions, measured from the bottom
    pub domain_y: (f32, f32),
    /// Fixed data ranges; `None` lets the surface fit the data
    pub x_range: Option<(f64, f64)>,
    pub y_range: Option<(f64, f64)>,
    pub show_x_ticks: bool,
    pub show_y_ticks: bool,
    pub x_title: Option<String>,
    pub y_title: Option<String>,
}

impl AxisLayout {
    fn full(axes: AxisPair) -> Self {
        Self {
            axes,
            domain_x: (0.0, 1.0),
            domain_y: (0.0, 1.0),
            x_range: None,
            y_range: None,
            show_x_ticks: true,
            show_y_ticks: true,
            x_title: None,
            y_title: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationAnchor {
    /// Fractions of a subplot's domain
    Facet(AxisPair),
    /// Fractions of the whole panel
    Paper,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub text: String,
    pub anchor: AnnotationAnchor,
    pub position: (f32, f32),
    pub color: Color32,
    /// Degrees
    pub rotation: f32,
}

/// A straight line in data coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct LineShape {
    pub axes: AxisPair,
    pub from: (f64, f64),
    pub to: (f64, f64),
    pub color: Color32,
    pub width: f32,
    pub dotted: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChartLayout {
    pub mode: ChartMode,
    pub axes: Vec<AxisLayout>,
    pub annotations: Vec<Annotation>,
    pub shapes: Vec<LineShape>,
    pub font_size: f32,
    /// No interaction and no point identities
    pub static_plot: bool,
}

impl ChartLayout {
    pub fn axis(&self, axes: AxisPair) -> Option<&AxisLayout> {
        self.axes.iter().find(|a| a.axes == axes)
    }

    pub fn axis_mut(&mut self, axes: AxisPair) -> Option<&mut AxisLayout> {
        self.axes.iter_mut().find(|a| a.axes == axes)
    }
}

fn axis_title(metric: &str) -> String {
    format!("{} (z-score)", ColumnLayout::metric_name(metric))
}

/// Builds the traces and layout for the active metrics and library filter
pub struct TraceBuilder<'a> {
    pub aggregation: &'a Aggregation,
    pub layout: &'a ColumnLayout,
    pub settings: &'a DashboardSettings,
    pub x: &'a str,
    pub y: &'a str,
}

impl<'a> TraceBuilder<'a> {
    pub fn build(&self, filter: &LibraryFilter, libraries: &[String]) -> (Vec<TraceDescriptor>, ChartLayout) {
        match filter.library() {
            Some(library) => self.single(library),
            None => self.facets(libraries),
        }
    }

    fn class_color(&self, class: StructuralClass) -> Color32 {
        let colors = &self.settings.colors;
        match class {
            StructuralClass::Mono => colors.mono_color(),
            StructuralClass::Di => colors.di_color(),
            StructuralClass::Tri => colors.tri_color(),
        }
    }

    /// Marker color of a row. Facets also draw rows outside the axis
    /// bands: a missing axis counts as mono, any other axis as tri.
    fn point_color(&self, row: &Row) -> Color32 {
        let class = match row.axis {
            None => StructuralClass::Mono,
            Some(axis) => StructuralClass::from_axis(axis).unwrap_or(StructuralClass::Tri),
        };
        self.class_color(class)
    }

    fn trace(&self, name: String, members: &[&Unique], axes: AxisPair, interactive: bool) -> TraceDescriptor {
        let (ids, hover_text) = if interactive {
            (
                members.iter().map(|u| u.key().clone()).collect(),
                members
                    .iter()
                    .map(|u| CardContent::describe(u, self.layout, self.x, self.y, &[]).hover_text())
                    .collect(),
            )
        } else {
            (Vec::new(), Vec::new())
        };

        TraceDescriptor {
            name,
            class: None,
            axes,
            ids,
            x: members.iter().map(|u| u.row.metric(self.x)).collect(),
            y: members.iter().map(|u| u.row.metric(self.y)).collect(),
            colors: members.iter().map(|u| self.point_color(&u.row)).collect(),
            marker_size: if interactive { SINGLE_MARKER_SIZE } else { FACET_MARKER_SIZE },
            hover_text,
            show_legend: interactive,
        }
    }

    fn single(&self, library: &str) -> (Vec<TraceDescriptor>, ChartLayout) {
        let mut traces = Vec::new();
        for class in StructuralClass::ALL {
            let members: Vec<&Unique> = self
                .aggregation
                .uniques_in(library)
                .filter(|u| u.row.class() == Some(class))
                .collect();
            if members.is_empty() {
                continue;
            }
            let mut trace = self.trace(class.trace_name().to_string(), &members, AxisPair::PRIMARY, true);
            trace.class = Some(class);
            traces.push(trace);
        }

        let mut axis = AxisLayout::full(AxisPair::PRIMARY);
        axis.x_title = Some(axis_title(self.x));
        axis.y_title = Some(axis_title(self.y));

        let layout = ChartLayout {
            mode: ChartMode::Single,
            axes: vec![axis],
            annotations: Vec::new(),
            shapes: Vec::new(),
            font_size: self.settings.font_size,
            static_plot: false,
        };
        (traces, layout)
    }

    fn shared_range(&self, metric: &str) -> (f64, f64) {
        let values: Vec<f64> = self.aggregation.uniques.iter().filter_map(|u| u.row.metric(metric)).collect();
        if values.is_empty() {
            return (0.0, 1.0);
        }
        let min = values.iter().copied().fold(0.0, f64::min);
        let max = values.iter().copied().fold(0.0, f64::max);
        let offset = (max - min) * FACET_RANGE_PADDING;
        (min - offset, max + offset)
    }

    fn facets(&self, libraries: &[String]) -> (Vec<TraceDescriptor>, ChartLayout) {
        let n = libraries.len();
        let columns = (n as f64).sqrt().ceil() as usize;
        let mut layout = ChartLayout {
            mode: ChartMode::Facets { rows: 0, columns },
            font_size: self.settings.font_size,
            static_plot: true,
            ..ChartLayout::default()
        };
        if n == 0 {
            return (Vec::new(), layout);
        }

        let rows = (n + columns - 1) / columns;
        let last_row_count = n - (rows - 1) * columns;
        let last_row_incomplete = last_row_count > 0 && last_row_count < columns;
        layout.mode = ChartMode::Facets { rows, columns };

        let x_range = self.shared_range(self.x);
        let y_range = self.shared_range(self.y);
        let cell_w = 1.0 / columns as f32;
        let cell_h = 1.0 / rows as f32;

        let mut traces = Vec::with_capacity(n);
        for (i, library) in libraries.iter().enumerate() {
            let axes = AxisPair(i);
            let members: Vec<&Unique> = self.aggregation.uniques_in(library).collect();
            let maximum = members
                .iter()
                .filter_map(|u| u.row.metric(self.x))
                .fold(f64::NEG_INFINITY, f64::max);

            if !members.is_empty() {
                traces.push(self.trace(library.clone(), &members, axes, false));
            }

            let row = i / columns;
            let column = i % columns;
            let is_last_row = row == rows - 1;
            let is_second_last_row = row + 2 == rows;

            layout.axes.push(AxisLayout {
                axes,
                domain_x: (
                    column as f32 * cell_w + FACET_X_GAP * cell_w / 2.0,
                    (column + 1) as f32 * cell_w - FACET_X_GAP * cell_w / 2.0,
                ),
                domain_y: (
                    1.0 - (row + 1) as f32 * cell_h + FACET_Y_GAP * cell_h / 2.0,
                    1.0 - row as f32 * cell_h - FACET_Y_GAP * cell_h / 2.0,
                ),
                x_range: Some(x_range),
                y_range: Some(y_range),
                show_x_ticks: is_last_row || (last_row_incomplete && is_second_last_row && column >= last_row_count),
                show_y_ticks: column == 0,
                x_title: None,
                y_title: None,
            });

            layout.annotations.push(Annotation {
                text: library.clone(),
                anchor: AnnotationAnchor::Facet(axes),
                position: (0.5, 0.9),
                color: if maximum >= self.settings.facet_alert_threshold {
                    Color32::from_rgb(0xff, 0x00, 0x00)
                } else {
                    Color32::BLACK
                },
                rotation: 0.0,
            });
        }

        layout.annotations.push(Annotation {
            text: axis_title(self.x),
            anchor: AnnotationAnchor::Paper,
            position: (0.5, -0.08),
            color: Color32::BLACK,
            rotation: 0.0,
        });
        layout.annotations.push(Annotation {
            text: axis_title(self.y),
            anchor: AnnotationAnchor::Paper,
            position: (-0.05, 0.5),
            color: Color32::BLACK,
            rotation: -90.0,
        });

        (traces, layout)
    }
}

/// Common `[lo, hi]` over every finite x and y value of the traces,
/// widened to a span of at least 1 and padded by 1 %
pub fn square_range(traces: &[TraceDescriptor]) -> Option<(f64, f64)> {
    let finite = |values: &[Option<f64>]| -> Vec<f64> { values.iter().flatten().copied().filter(|v| v.is_finite()).collect() };
    let xs: Vec<f64> = traces.iter().flat_map(|t| finite(&t.x)).collect();
    let ys: Vec<f64> = traces.iter().flat_map(|t| finite(&t.y)).collect();
    if xs.is_empty() || ys.is_empty() {
        return None;
    }

    let lo = xs.iter().chain(ys.iter()).copied().fold(f64::INFINITY, f64::min);
    let hi = xs.iter().chain(ys.iter()).copied().fold(f64::NEG_INFINITY, f64::max);
    let pad = (hi - lo).max(1.0) * SQUARE_PADDING;
    Some((lo - pad, hi + pad))
}

/// Dotted `y = x` line across `[lo, hi]`
pub fn diagonal(lo: f64, hi: f64) -> LineShape {
    LineShape {
        axes: AxisPair::PRIMARY,
        from: (lo, lo),
        to: (hi, hi),
        color: Color32::from_rgb(0xd7, 0xd7, 0xd7),
        width: 1.0,
        dotted: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hv_core::{RawRecord, Value};
    use hv_data::{aggregate, AggregationParams, RowStore, SchemaDetector};

    fn record(compound: &str, library: &str, axis: i64, x: f64, y: f64) -> RawRecord {
        let mut record = RawRecord::new();
        record.insert("compound".into(), Value::from(compound));
        record.insert("library".into(), Value::from(library));
        record.insert("axis".into(), Value::Int(axis));
        record.insert("c1_smiles".into(), Value::from("C"));
        record.insert("count_x".into(), Value::Int(1));
        record.insert("zscore_x".into(), Value::Float(x));
        record.insert("zscore_y".into(), Value::Float(y));
        record
    }

    fn fixture(records: Vec<RawRecord>) -> (RowStore, Aggregation) {
        let store = RowStore::ingest(records, &SchemaDetector::new()).unwrap();
        let aggregation = aggregate(&store, "zscore_x", &AggregationParams::default()).unwrap();
        (store, aggregation)
    }

    #[test]
    fn test_single_library_traces_by_class() {
        let (store, aggregation) = fixture(vec![
            record("A", "L1", 1, 1.0, 0.0),
            record("B", "L1", 6, 2.0, 0.5),
            record("C", "L1", 6, 3.0, 1.0),
            record("D", "L2", 4, 4.0, 1.0),
        ]);
        let settings = DashboardSettings::default();
        let builder = TraceBuilder { aggregation: &aggregation, layout: store.layout(), settings: &settings, x: "zscore_x", y: "zscore_y" };
        let (traces, layout) = builder.build(&LibraryFilter::parse("L1"), store.libraries());

        let names: Vec<&str> = traces.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Mono-sython", "Tri-sython"]);
        assert_eq!(traces[1].ids, vec![EntityKey::from("B"), EntityKey::from("C")]);
        assert_eq!(traces[1].x, vec![Some(2.0), Some(3.0)]);
        assert_eq!(traces[1].colors[0], settings.colors.tri_color());
        assert_eq!(traces[1].marker_size, 20.0);
        assert_eq!(traces[1].position_of(&EntityKey::from("C")), Some(1));
        assert_eq!(layout.mode, ChartMode::Single);
        assert_eq!(layout.axes[0].x_title.as_deref(), Some("x (z-score)"));
        assert!(!layout.static_plot);
    }

    #[test]
    fn test_rows_outside_the_axis_bands_are_not_plotted() {
        let mut unbanded = record("N", "L1", 0, 5.0, 1.0);
        unbanded.shift_remove("axis");
        let (store, aggregation) = fixture(vec![
            record("A", "L1", 6, 1.0, 0.0),
            record("H", "L1", 7, 2.0, 0.5),
            record("M", "L1", -1, 3.0, 1.0),
            unbanded,
        ]);
        let settings = DashboardSettings::default();
        let builder = TraceBuilder { aggregation: &aggregation, layout: store.layout(), settings: &settings, x: "zscore_x", y: "zscore_y" };

        let (traces, _) = builder.build(&LibraryFilter::parse("L1"), store.libraries());
        let ids: Vec<&EntityKey> = traces.iter().flat_map(|t| t.ids.iter()).collect();
        assert_eq!(ids, vec![&EntityKey::from("A")]);
        assert!(traces.iter().all(|t| t.position_of(&EntityKey::from("H")).is_none()));

        // The static facet still draws every unique row
        let (facets, _) = builder.build(&LibraryFilter::All, store.libraries());
        assert_eq!(facets[0].x.len(), 4);
        assert_eq!(facets[0].colors[1], settings.colors.tri_color());
        assert_eq!(facets[0].colors[3], settings.colors.mono_color());
    }

    #[test]
    fn test_facet_grid() {
        let (store, aggregation) = fixture(vec![
            record("A", "L1", 6, 0.5, 0.0),
            record("B", "L2", 6, 1.5, 0.0),
            record("C", "L3", 6, 0.2, 0.0),
        ]);
        let settings = DashboardSettings::default();
        let builder = TraceBuilder { aggregation: &aggregation, layout: store.layout(), settings: &settings, x: "zscore_x", y: "zscore_y" };
        let (traces, layout) = builder.build(&LibraryFilter::All, store.libraries());

        assert_eq!(layout.mode, ChartMode::Facets { rows: 2, columns: 2 });
        assert!(layout.static_plot);
        assert!(traces.iter().all(|t| t.ids.is_empty() && t.marker_size == 10.0));

        // L3 sits alone on the last row; L2 has no cell below it
        let ticks: Vec<(bool, bool)> = layout.axes.iter().map(|a| (a.show_x_ticks, a.show_y_ticks)).collect();
        assert_eq!(ticks, vec![(false, true), (true, false), (true, true)]);

        let x_range = layout.axes[0].x_range.unwrap();
        assert!((x_range.0 - -0.075).abs() < 1e-9);
        assert!((x_range.1 - 1.575).abs() < 1e-9);

        assert_eq!(layout.annotations[0].color, Color32::BLACK);
        assert_eq!(layout.annotations[1].color, Color32::from_rgb(0xff, 0, 0));
        assert_eq!(layout.annotations.len(), 5);
    }

    #[test]
    fn test_square_range() {
        let trace = TraceDescriptor {
            name: "t".into(),
            class: None,
            axes: AxisPair::PRIMARY,
            ids: Vec::new(),
            x: vec![Some(0.2), None],
            y: vec![Some(0.4), Some(0.3)],
            colors: Vec::new(),
            marker_size: 20.0,
            hover_text: Vec::new(),
            show_legend: true,
        };
        let (lo, hi) = square_range(&[trace]).unwrap();
        assert!((lo - 0.19).abs() < 1e-9);
        assert!((hi - 0.41).abs() < 1e-9);
        assert_eq!(square_range(&[]), None);
    }
}
