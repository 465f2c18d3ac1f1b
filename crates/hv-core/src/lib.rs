//! Core functionality for the hit visualizer
//!
//! This crate provides the shared vocabulary (keys, raw records, settings),
//! the change-notification bus and the selection state that keeps the chart,
//! the two tables and the overlay cards consistent.

pub mod data;
pub mod events;
pub mod state;
pub mod sync;

// Re-export commonly used types
pub use data::{EntityKey, LibraryFilter, RawRecord, RowSource, Value};
pub use events::{handler_from_fn, Event, EventBus, EventHandler};
pub use state::{CardSettings, ClassColors, DashboardSettings, SettingsError, StructureSize};
pub use sync::{Generation, GenerationCounter, SelectionCoordinator, SelectionDelta};
