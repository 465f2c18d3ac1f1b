use std::sync::Arc;
use parking_lot::Mutex;
use ahash::AHashMap;

/// Dashboard-wide event bus carrying change notifications
pub struct EventBus {
    handlers: Arc<Mutex<AHashMap<std::any::TypeId, Vec<Box<dyn EventHandler>>>>>,
}

/// Event trait that all events must implement
pub trait Event: Send + Sync + 'static {
    fn as_any(&self) -> &dyn std::any::Any;
}

/// Handler trait for event handlers
pub trait EventHandler: Send + Sync {
    fn handle(&mut self, event: &dyn Event);
}

/// Change notifications exposed by the dashboard
pub mod events {
    use super::Event;
    use crate::data::EntityKey;
    use crate::sync::Generation;

    /// Rows ingested from a source
    #[derive(Debug, Clone)]
    pub struct DataLoaded {
        pub source_name: String,
        pub row_count: usize,
        pub column_count: usize,
    }

    /// Ingestion failed; nothing was committed
    #[derive(Debug, Clone)]
    pub struct DataRejected {
        pub source_name: String,
        pub error: String,
    }

    /// The unique population was rebuilt
    #[derive(Debug, Clone)]
    pub struct UniquesChanged {
        pub generation: Generation,
        pub rank_metric: String,
        pub count: usize,
        pub duplicate_groups: usize,
    }

    /// Per-library top entries were rebuilt or a visibility flag flipped
    #[derive(Debug, Clone)]
    pub struct TopsChanged {
        pub generation: Generation,
        pub libraries: usize,
        pub entries: usize,
    }

    /// The user-curated hit set changed
    #[derive(Debug, Clone)]
    pub struct HitsChanged {
        pub key: Option<EntityKey>,
        pub count: usize,
    }

    /// Keys entered or left the visible set
    #[derive(Debug, Clone)]
    pub struct VisibleChanged {
        pub shown: Vec<EntityKey>,
        pub hidden: Vec<EntityKey>,
        pub visible: usize,
    }

    /// The library filter changed
    #[derive(Debug, Clone)]
    pub struct LibraryFilterChanged {
        pub filter: String,
    }

    // Implement Event trait for all event types
    macro_rules! impl_event {
        ($($t:ty),*) => {
            $(
                impl Event for $t {
                    fn as_any(&self) -> &dyn std::any::Any {
                        self
                    }
                }
            )*
        }
    }

    impl_event!(
        DataLoaded,
        DataRejected,
        UniquesChanged,
        TopsChanged,
        HitsChanged,
        VisibleChanged,
        LibraryFilterChanged
    );
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Mutex::new(AHashMap::new())),
        }
    }

    /// Subscribe to events of a specific type
    pub fn subscribe<E: Event>(&self, handler: Box<dyn EventHandler>) {
        let type_id = std::any::TypeId::of::<E>();
        let mut handlers = self.handlers.lock();
        handlers.entry(type_id).or_insert_with(Vec::new).push(handler);
    }

    /// Publish an event to every handler subscribed to its type.
    ///
    /// Handlers run while the bus is locked and must not publish.
    pub fn publish<E: Event>(&self, event: E) {
        let type_id = std::any::TypeId::of::<E>();
        let mut handlers = self.handlers.lock();

        if let Some(event_handlers) = handlers.get_mut(&type_id) {
            for handler in event_handlers.iter_mut() {
                handler.handle(&event);
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper struct for creating event handlers from closures
pub struct ClosureEventHandler<F> {
    handler: F,
}

impl<F> EventHandler for ClosureEventHandler<F>
where
    F: FnMut(&dyn Event) + Send + Sync,
{
    fn handle(&mut self, event: &dyn Event) {
        (self.handler)(event);
    }
}

/// Create an event handler from a closure
pub fn handler_from_fn<F>(f: F) -> Box<dyn EventHandler>
where
    F: FnMut(&dyn Event) + Send + Sync + 'static,
{
    Box::new(ClosureEventHandler { handler: f })
}

#[cfg(test)]
mod tests {
    use super::events::{HitsChanged, VisibleChanged};
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_publish_reaches_matching_subscribers_only() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = hits.clone();

        bus.subscribe::<HitsChanged>(handler_from_fn(move |event| {
            if let Some(change) = event.as_any().downcast_ref::<HitsChanged>() {
                seen.store(change.count, Ordering::SeqCst);
            }
        }));

        bus.publish(VisibleChanged { shown: vec![], hidden: vec![], visible: 0 });
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        bus.publish(HitsChanged { key: None, count: 3 });
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }
}
