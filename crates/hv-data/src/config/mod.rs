//! Source configuration: null tokens and column rules

pub mod column_rules;
pub mod null_handling;

pub use column_rules::*;
pub use null_handling::*;
