//! Raw record vocabulary shared by the data and view crates

use std::borrow::Borrow;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A scalar cell value as delivered by the tabular-parsing collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the value. Non-numeric and non-finite values yield `None`.
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            Value::Int(v) => *v as f64,
            Value::Float(v) => *v,
            Value::Text(s) => s.trim().parse::<f64>().ok()?,
            Value::Null | Value::Bool(_) => return None,
        };
        value.is_finite().then_some(value)
    }

    /// Integer view of the value; floats qualify only when they have no fraction.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Float(v) if v.is_finite() && v.fract() == 0.0 => Some(*v as i64),
            Value::Text(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    /// Text view of the value; `Null` becomes the empty string.
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(v) => f.write_str(v),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

/// One input row: column name to scalar, in header order
pub type RawRecord = IndexMap<String, Value>;

/// Composite identity of a logical entity across duplicate encodings
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityKey(String);

impl EntityKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for EntityKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EntityKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// The active library filter of the chart and the overlay set
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum LibraryFilter {
    /// Every library, drawn as a static facet grid
    #[default]
    All,
    Library(String),
}

impl LibraryFilter {
    pub const ALL_LABEL: &'static str = "All";

    pub fn parse(label: &str) -> Self {
        if label == Self::ALL_LABEL {
            LibraryFilter::All
        } else {
            LibraryFilter::Library(label.to_string())
        }
    }

    pub fn matches(&self, library: &str) -> bool {
        match self {
            LibraryFilter::All => true,
            LibraryFilter::Library(active) => active == library,
        }
    }

    pub fn library(&self) -> Option<&str> {
        match self {
            LibraryFilter::All => None,
            LibraryFilter::Library(active) => Some(active),
        }
    }
}

impl fmt::Display for LibraryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LibraryFilter::All => f.write_str(Self::ALL_LABEL),
            LibraryFilter::Library(library) => f.write_str(library),
        }
    }
}

/// Trait for row sources (the tabular-parsing collaborator)
#[async_trait::async_trait]
pub trait RowSource: Send + Sync {
    /// Load every row, in file order
    async fn load(&self) -> anyhow::Result<Vec<RawRecord>>;

    /// Get the source name/path
    fn source_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(Value::Int(3).as_f64(), Some(3.0));
        assert_eq!(Value::from(" 1.5 ").as_f64(), Some(1.5));
        assert_eq!(Value::from("abc").as_f64(), None);
        assert_eq!(Value::Float(f64::NAN).as_f64(), None);
        assert_eq!(Value::Null.as_f64(), None);
        assert_eq!(Value::Bool(true).as_f64(), None);
    }

    #[test]
    fn test_integer_coercion() {
        assert_eq!(Value::Float(6.0).as_i64(), Some(6));
        assert_eq!(Value::Float(6.5).as_i64(), None);
        assert_eq!(Value::from("4").as_i64(), Some(4));
    }

    #[test]
    fn test_library_filter() {
        assert_eq!(LibraryFilter::parse("All"), LibraryFilter::All);
        let filter = LibraryFilter::parse("L1");
        assert!(filter.matches("L1"));
        assert!(!filter.matches("L2"));
        assert!(LibraryFilter::All.matches("anything"));
        assert_eq!(filter.to_string(), "L1");
    }
}
