//! Dashboard settings

use std::path::Path;

use egui::{Color32, Vec2};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or validating settings
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid color for {field}: {value:?}")]
    InvalidColor { field: &'static str, value: String },

    #[error("Invalid threshold for {field}: {value}")]
    InvalidThreshold { field: &'static str, value: f64 },
}

/// User-configurable dashboard settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardSettings {
    /// Number of top entries kept per library
    pub n_top_hits: usize,

    /// Minimum rank value for a tri-axis entry to qualify as a top entry
    pub inclusion_threshold: f64,

    /// Structure columns drawn on overlay cards, in drawing order
    pub render: IndexMap<String, bool>,

    /// Structure slot size
    pub structure: StructureSize,

    /// Marker colors per structural class
    pub colors: ClassColors,

    /// Overlay card geometry
    pub card: CardSettings,

    /// Facet titles are highlighted when the facet's max x reaches this value
    pub facet_alert_threshold: f64,

    /// Annotation font size
    pub font_size: f32,
}

/// Structure slot size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StructureSize {
    pub width: f32,
    pub height: f32,
}

impl StructureSize {
    pub fn to_vec2(self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }
}

/// Hex marker colors for the mono/di/tri structural classes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassColors {
    pub mono: String,
    pub di: String,
    pub tri: String,
}

impl ClassColors {
    pub fn mono_color(&self) -> Color32 {
        parse_hex_color(&self.mono).unwrap_or(Color32::from_rgb(0x0d, 0x6e, 0xfd))
    }

    pub fn di_color(&self) -> Color32 {
        parse_hex_color(&self.di).unwrap_or(Color32::from_rgb(0x6f, 0x42, 0xc1))
    }

    pub fn tri_color(&self) -> Color32 {
        parse_hex_color(&self.tri).unwrap_or(Color32::from_rgb(0xd6, 0x33, 0x84))
    }
}

/// Overlay card geometry in pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CardSettings {
    /// Distance kept between a card and the chart panel's left/right edges
    pub margin: f32,
    /// Card top, measured from the chart panel's top edge
    pub top_offset: f32,
    /// Extra card width on top of the structure width
    pub width_padding: f32,
    pub row_height: f32,
    pub header_height: f32,
    pub footer_height: f32,
}

impl Default for CardSettings {
    fn default() -> Self {
        Self {
            margin: 5.0,
            top_offset: 30.0,
            width_padding: 10.0,
            row_height: 18.0,
            header_height: 26.0,
            footer_height: 28.0,
        }
    }
}

impl Default for DashboardSettings {
    fn default() -> Self {
        let mut render = IndexMap::new();
        render.insert("SMILES".to_string(), false);
        render.insert("c1_smiles".to_string(), true);
        render.insert("c2_smiles".to_string(), true);
        render.insert("c3_smiles".to_string(), true);

        Self {
            n_top_hits: 5,
            inclusion_threshold: 0.5,
            render,
            structure: StructureSize { width: 240.0, height: 100.0 },
            colors: ClassColors {
                mono: "#0d6efd".to_string(),
                di: "#6f42c1".to_string(),
                tri: "#d63384".to_string(),
            },
            card: CardSettings::default(),
            facet_alert_threshold: 1.0,
            font_size: 12.0,
        }
    }
}

impl DashboardSettings {
    /// Parse settings from JSON; missing fields keep their defaults
    pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a JSON file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        for (field, value) in [
            ("colors.mono", &self.colors.mono),
            ("colors.di", &self.colors.di),
            ("colors.tri", &self.colors.tri),
        ] {
            if parse_hex_color(value).is_none() {
                return Err(SettingsError::InvalidColor { field, value: value.clone() });
            }
        }
        // z-score cut-off for a hit; below zero it would admit depleted compounds
        if !self.inclusion_threshold.is_finite() || self.inclusion_threshold < 0.0 {
            return Err(SettingsError::InvalidThreshold {
                field: "inclusion_threshold",
                value: self.inclusion_threshold,
            });
        }
        if !self.facet_alert_threshold.is_finite() {
            return Err(SettingsError::InvalidThreshold {
                field: "facet_alert_threshold",
                value: self.facet_alert_threshold,
            });
        }
        Ok(())
    }

    /// Structure columns to draw on cards: enabled render entries that exist in `available`
    pub fn enabled_structure_columns(&self, available: &[String]) -> Vec<String> {
        self.render
            .iter()
            .filter(|(column, enabled)| **enabled && available.iter().any(|c| c == *column))
            .map(|(column, _)| column.clone())
            .collect()
    }

    /// Card width: structure width plus padding
    pub fn card_width(&self) -> f32 {
        self.structure.width + self.card.width_padding
    }
}

/// Parse `#rrggbb` or `#rgb` into a color
pub fn parse_hex_color(hex: &str) -> Option<Color32> {
    let digits = hex.trim().strip_prefix('#')?;
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();

    match digits.len() {
        6 => Some(Color32::from_rgb(
            channel(&digits[0..2])?,
            channel(&digits[2..4])?,
            channel(&digits[4..6])?,
        )),
        3 => {
            let expand = |i: usize| channel(&digits[i..i + 1]).map(|v| v * 17);
            Some(Color32::from_rgb(expand(0)?, expand(1)?, expand(2)?))
        }
        _ => None,
    }
}
