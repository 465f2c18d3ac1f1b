//! Structure rendering collaborator

use std::sync::atomic::{AtomicUsize, Ordering};

use ahash::AHashSet;
use async_trait::async_trait;
use egui::Vec2;
use parking_lot::RwLock;
use thiserror::Error;

/// A structure failed to render; the card keeps a blank slot
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Failed to render structure {descriptor:?}: {reason}")]
pub struct RenderServiceError {
    pub descriptor: String,
    pub reason: String,
}

/// Inline graphic produced for one structure slot
#[derive(Debug, Clone, PartialEq)]
pub struct InlineGraphic {
    pub descriptor: String,
    pub size: Vec2,
    /// SVG markup
    pub markup: String,
}

/// Turns a textual structure descriptor into an inline graphic
#[async_trait]
pub trait StructureRenderer: Send + Sync {
    async fn render_structure(&self, descriptor: &str, size: Vec2) -> Result<InlineGraphic, RenderServiceError>;
}

/// The descriptor drawn for a cell: its first whitespace-separated token
pub fn normalize_descriptor(cell: &str) -> Option<&str> {
    cell.split_whitespace().next()
}

/// Renders an empty placeholder frame of the requested size and keeps the
/// descriptor on the graphic. No descriptor text reaches the markup.
///
/// Used by the command line report and the tests.
#[derive(Default)]
pub struct EchoRenderer {
    failing: RwLock<AHashSet<String>>,
    calls: AtomicUsize,
}

impl EchoRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later render of `descriptor` fail
    pub fn fail_on(&self, descriptor: impl Into<String>) {
        self.failing.write().insert(descriptor.into());
    }

    /// Number of render calls received
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StructureRenderer for EchoRenderer {
    async fn render_structure(&self, descriptor: &str, size: Vec2) -> Result<InlineGraphic, RenderServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.failing.read().contains(descriptor) {
            return Err(RenderServiceError {
                descriptor: descriptor.to_string(),
                reason: "renderer refused descriptor".to_string(),
            });
        }

        let markup = format!(
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}"><rect width="100%" height="100%" fill="none" stroke="#dee2e6"/></svg>"##,
            w = size.x,
            h = size.y,
        );
        Ok(InlineGraphic {
            descriptor: descriptor.to_string(),
            size,
            markup,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_descriptor() {
        assert_eq!(normalize_descriptor("  CCO extra"), Some("CCO"));
        assert_eq!(normalize_descriptor("CCO"), Some("CCO"));
        assert_eq!(normalize_descriptor("   "), None);
    }

    #[tokio::test]
    async fn test_echo_renderer() {
        let renderer = EchoRenderer::new();
        renderer.fail_on("bad");

        let graphic = renderer.render_structure("C<O", Vec2::new(240.0, 100.0)).await.unwrap();
        assert_eq!(graphic.descriptor, "C<O");
        assert!(!graphic.markup.contains("C<O"));
        assert!(graphic.markup.contains(r#"width="240" height="100""#));
        assert_eq!(graphic.size, Vec2::new(240.0, 100.0));

        let err = renderer.render_structure("bad", Vec2::new(1.0, 1.0)).await.unwrap_err();
        assert_eq!(err.descriptor, "bad");
        assert_eq!(renderer.calls(), 2);
    }
}
