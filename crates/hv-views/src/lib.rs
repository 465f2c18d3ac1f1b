//! View adapters, overlay management and the dashboard controller

pub mod chart;
pub mod dashboard;
pub mod overlay;
pub mod structure;
pub mod tables;

use thiserror::Error;

use hv_core::{EntityKey, SettingsError};
use hv_data::{DataError, SchemaError};

// Re-exports
pub use chart::{ChartAdapter, ChartSurface, HeadlessChart, HighlightMode, TraceDescriptor};
pub use dashboard::{Collaborators, Dashboard};
pub use overlay::{
    AnchorMiss, CardAction, CardContent, Completion, OverlayManager, OverlayPhase, OverlayRequest, ResolvedOverlay,
};
pub use structure::{EchoRenderer, InlineGraphic, RenderServiceError, StructureRenderer};
pub use tables::{FlagColumn, MemoryTable, TableEvent, TableRow, TableWidget};

/// Errors surfaced by dashboard operations
#[derive(Error, Debug)]
pub enum ViewError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error("Unknown key: {0}")]
    UnknownKey(EntityKey),

    #[error("Unknown library: {0}")]
    UnknownLibrary(String),

    #[error("No data loaded")]
    NoData,

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

impl From<SchemaError> for ViewError {
    fn from(error: SchemaError) -> Self {
        ViewError::Data(DataError::Schema(error))
    }
}
