use std::sync::Arc;

use crate::dispatcher::{DefaultDispatcher, DispatchReport, MessageDispatcher};
use crate::registry::StoreRegistry;

/// Base for transport consumers that hand raw messages to a dispatcher.
///
/// A broker listener embeds an `EventSubscriber` and calls
/// [`EventSubscriber::on_message`] for every delivery. Ordering across
/// concurrent deliveries is not preserved here; a transport that needs
/// per-stream ordering must serialize delivery itself.
#[derive(Clone)]
pub struct EventSubscriber {
    dispatcher: Arc<dyn MessageDispatcher>,
}

impl EventSubscriber {
    /// A subscriber dispatching into [`StoreRegistry::global`].
    pub fn new() -> Self {
        Self::with_dispatcher(Arc::new(DefaultDispatcher::new(StoreRegistry::global())))
    }

    pub fn with_dispatcher(dispatcher: Arc<dyn MessageDispatcher>) -> Self {
        Self { dispatcher }
    }

    pub fn set_dispatcher(&mut self, dispatcher: Arc<dyn MessageDispatcher>) {
        self.dispatcher = dispatcher;
    }

    pub fn dispatcher(&self) -> &Arc<dyn MessageDispatcher> {
        &self.dispatcher
    }

    pub fn on_message(&self, raw: &str) -> DispatchReport {
        self.dispatcher.dispatch(raw)
    }

    pub fn on_bytes(&self, raw: &[u8]) -> DispatchReport {
        self.dispatcher.dispatch_bytes(raw)
    }
}

impl Default for EventSubscriber {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::DropReason;
    use crate::memory::JsonDocumentStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting(AtomicUsize);

    impl MessageDispatcher for Counting {
        fn dispatch(&self, _raw: &str) -> DispatchReport {
            self.0.fetch_add(1, Ordering::SeqCst);
            DispatchReport::Dropped(DropReason::NoStores)
        }
    }

    #[test]
    fn default_subscriber_uses_global_registry() {
        let orders = Arc::new(JsonDocumentStore::keyed_by_field("subscriber-test-orders", "id"));
        StoreRegistry::global().register(orders.clone());

        let subscriber = EventSubscriber::default();
        let report = subscriber.on_message(
            r#"{"dataSource":"subscriber-test-orders","eventType":"CREATE","data":{"id":7}}"#,
        );
        assert_eq!(report.applied(), 1);
        assert!(orders.contains(&"7".to_string()));
    }

    #[test]
    fn dispatcher_can_be_swapped() {
        let first = Arc::new(Counting(AtomicUsize::new(0)));
        let second = Arc::new(Counting(AtomicUsize::new(0)));
        let mut subscriber = EventSubscriber::with_dispatcher(first.clone());

        subscriber.on_message("{}");
        subscriber.set_dispatcher(second.clone());
        subscriber.on_message("{}");
        subscriber.on_bytes(b"{}");

        assert_eq!(first.0.load(Ordering::SeqCst), 1);
        assert_eq!(second.0.load(Ordering::SeqCst), 2);
    }
}
