//! Card placement inside the chart panel

use egui::{Pos2, Rect, Vec2};

use hv_core::CardSettings;

/// Card rectangle centered horizontally on `anchor_x`, kept `margin` pixels
/// inside the panel, at a fixed offset below the panel top
pub fn place_card(anchor_x: f32, size: Vec2, panel: Rect, card: &CardSettings) -> Rect {
    let min_left = panel.left() + card.margin;
    let max_left = panel.right() - card.margin - size.x;
    let left = (anchor_x - size.x / 2.0).min(max_left).max(min_left);
    Rect::from_min_size(Pos2::new(left, panel.top() + card.top_offset), size)
}
