//! Data-space to screen-space anchoring

use egui::Pos2;
use thiserror::Error;

use hv_core::EntityKey;

use crate::chart::ChartSurface;

/// A key has no point on the current chart
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("No rendered point for {key}")]
pub struct AnchorMiss {
    pub key: EntityKey,
}

/// Screen position of the point identified by `key`
pub fn try_anchor(surface: &dyn ChartSurface, key: &EntityKey) -> Result<Pos2, AnchorMiss> {
    let miss = || AnchorMiss { key: key.clone() };

    let location = surface.locate_point(key).ok_or_else(miss)?;
    let (x_axis, y_axis) = surface.axis_transforms(location.axes).ok_or_else(miss)?;
    let x = x_axis.to_pixel(location.x).ok_or_else(miss)?;
    let y = y_axis.to_pixel(location.y).ok_or_else(miss)?;

    let panel = surface.panel_rect();
    Ok(Pos2::new(panel.left() + x, panel.top() + y))
}

/// Like [`try_anchor`], `None` when the point is not rendered
pub fn anchor_point(surface: &dyn ChartSurface, key: &EntityKey) -> Option<Pos2> {
    try_anchor(surface, key).ok()
}
