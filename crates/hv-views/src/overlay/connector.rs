//! The shared canvas holding every connector line

use egui::{Color32, Pos2, Rect, Stroke};
use indexmap::IndexMap;

use hv_core::EntityKey;

/// A line from a chart point to its card
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConnectorLine {
    pub chart_end: Pos2,
    pub card_end: Pos2,
}

/// Point of a card the connector attaches to: the middle of its bottom edge
pub fn card_attachment(card: Rect) -> Pos2 {
    card.center_bottom()
}

/// Connector lines keyed by overlay
#[derive(Debug, Clone)]
pub struct ConnectorCanvas {
    lines: IndexMap<EntityKey, ConnectorLine>,
    stroke: Stroke,
}

impl Default for ConnectorCanvas {
    fn default() -> Self {
        Self {
            lines: IndexMap::new(),
            stroke: Stroke::new(1.0, Color32::from_rgb(0xaf, 0xaf, 0xaf)),
        }
    }
}

impl ConnectorCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stroke(&self) -> Stroke {
        self.stroke
    }

    pub fn attach(&mut self, key: EntityKey, chart_end: Pos2, card: Rect) {
        self.lines.insert(
            key,
            ConnectorLine {
                chart_end,
                card_end: card_attachment(card),
            },
        );
    }

    /// Follow a moved or resized card
    pub fn update_card_end(&mut self, key: &EntityKey, card: Rect) -> bool {
        match self.lines.get_mut(key) {
            Some(line) => {
                line.card_end = card_attachment(card);
                true
            }
            None => false,
        }
    }

    pub fn update_chart_end(&mut self, key: &EntityKey, chart_end: Pos2) -> bool {
        match self.lines.get_mut(key) {
            Some(line) => {
                line.chart_end = chart_end;
                true
            }
            None => false,
        }
    }

    /// Remove a line; absent keys are a no-op
    pub fn remove(&mut self, key: &EntityKey) -> bool {
        self.lines.shift_remove(key).is_some()
    }

    pub fn get(&self, key: &EntityKey) -> Option<&ConnectorLine> {
        self.lines.get(key)
    }

    pub fn lines(&self) -> impl Iterator<Item = (&EntityKey, &ConnectorLine)> {
        self.lines.iter()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::{pos2, vec2};

    #[test]
    fn test_line_ends_follow_updates() {
        let mut canvas = ConnectorCanvas::new();
        let key = EntityKey::from("A");
        canvas.attach(key.clone(), pos2(10.0, 200.0), Rect::from_min_size(pos2(0.0, 30.0), vec2(100.0, 50.0)));
        assert_eq!(canvas.get(&key).unwrap().card_end, pos2(50.0, 80.0));

        canvas.update_card_end(&key, Rect::from_min_size(pos2(20.0, 40.0), vec2(100.0, 50.0)));
        canvas.update_chart_end(&key, pos2(11.0, 201.0));
        assert_eq!(canvas.get(&key).copied(), Some(ConnectorLine { chart_end: pos2(11.0, 201.0), card_end: pos2(70.0, 90.0) }));

        assert!(canvas.remove(&key));
        assert!(!canvas.remove(&key));
        assert!(canvas.is_empty());
    }
}
