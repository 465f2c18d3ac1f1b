//! Overlay card content

use egui::Vec2;

use hv_core::{DashboardSettings, EntityKey, Value};
use hv_data::{ColumnLayout, Unique};

use crate::structure::normalize_descriptor;

/// One `label: value` line of a card or hover label
#[derive(Debug, Clone, PartialEq)]
pub struct CardLine {
    pub label: String,
    pub value: String,
    /// Set for the x and y metric lines
    pub emphasized: bool,
}

/// Footer actions of a card
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardAction {
    /// Toggle the key's hit membership
    Bag,
    /// Copy the first structure descriptor
    Copy,
    Close,
}

/// Everything an overlay card shows for one unique
#[derive(Debug, Clone, PartialEq)]
pub struct CardContent {
    pub key: EntityKey,
    pub title: String,
    pub copies: usize,
    pub lines: Vec<CardLine>,
    /// `(column, descriptor)` per drawn structure slot; empty descriptors stay blank
    pub structures: Vec<(String, String)>,
}

fn count_and_score(unique: &Unique, layout: &ColumnLayout, score_column: &str) -> String {
    let count = layout
        .count_column_for(score_column)
        .and_then(|column| unique.row.value(column))
        .map(Value::to_text)
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| "-".to_string());
    let score = unique
        .row
        .metric(score_column)
        .map(|score| format!("{:.2}", score))
        .unwrap_or_else(|| "-".to_string());
    format!("{} ({})", count, score)
}

impl CardContent {
    /// Assemble the card of `unique` for the active `x`/`y` metrics
    pub fn describe(unique: &Unique, layout: &ColumnLayout, x: &str, y: &str, structure_columns: &[String]) -> Self {
        let mut lines = Vec::with_capacity(layout.score_columns.len() + 1);

        for (metric, axis) in [(x, "x"), (y, "y")] {
            lines.push(CardLine {
                label: format!("{} ({})", ColumnLayout::metric_name(metric), axis),
                value: count_and_score(unique, layout, metric),
                emphasized: true,
            });
        }
        for metric in layout.score_columns.iter().filter(|c| c.as_str() != x && c.as_str() != y) {
            lines.push(CardLine {
                label: ColumnLayout::metric_name(metric).to_string(),
                value: count_and_score(unique, layout, metric),
                emphasized: false,
            });
        }
        if let Some(count) = unique.row.history_hit_count() {
            lines.push(CardLine {
                label: "HH".to_string(),
                value: count.to_string(),
                emphasized: false,
            });
        }

        let structures = structure_columns
            .iter()
            .map(|column| {
                let cell = unique.row.value(column).map(Value::to_text).unwrap_or_default();
                let descriptor = normalize_descriptor(&cell).unwrap_or_default().to_string();
                (column.clone(), descriptor)
            })
            .collect();

        Self {
            key: unique.key().clone(),
            title: unique.title(),
            copies: unique.copies,
            lines,
            structures,
        }
    }

    /// Plain-text hover label: the title followed by every line
    pub fn hover_text(&self) -> String {
        let mut text = vec![self.title.clone()];
        text.extend(self.lines.iter().map(|line| format!("{}: {}", line.label, line.value)));
        text.join("\n")
    }

    /// First non-blank structure descriptor
    pub fn first_structure(&self) -> Option<&str> {
        self.structures
            .iter()
            .map(|(_, descriptor)| descriptor.as_str())
            .find(|descriptor| !descriptor.is_empty())
    }

    /// Laid-out card size before the host measures the real one
    pub fn estimated_size(&self, settings: &DashboardSettings) -> Vec2 {
        let card = &settings.card;
        let height = card.header_height
            + self.structures.len() as f32 * settings.structure.height
            + self.lines.len() as f32 * card.row_height
            + card.footer_height
            + 2.0 * card.margin;
        Vec2::new(settings.card_width(), height)
    }
}
