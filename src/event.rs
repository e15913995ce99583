//! Entity-lifecycle notifications, delivered to caller-registered sinks.
//!
//! Delivery is fire-and-forget from the access engine's perspective: sinks
//! are invoked synchronously in registration order, at most once per storage
//! operation, and a failing sink never fails the operation that triggered it.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::{error, sync::Arc, sync::Mutex};

/// Lifecycle transition carried by an event.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum EventKind {
    /// An item was created.
    Created,
    /// An item was overwritten by an update.
    Updated,
    /// An item was deleted.
    Deleted,
}

/// One entity-lifecycle notification.
#[derive(Clone, Debug)]
pub struct EntityEvent {
    /// Registry name of the entity type.
    pub entity: String,
    /// Which lifecycle transition happened.
    pub kind: EventKind,
    /// The item after the operation (for deletes, the removed snapshot).
    pub item: Value,
    /// The previous snapshot, present on updates when the item existed.
    pub previous: Option<Value>,
    /// When the operation completed.
    pub timestamp: DateTime<Utc>,
}

/// Receiver of entity-lifecycle notifications.
pub trait EventSink: Send + Sync {
    /// Handle one event. Errors are reported out-of-band and never propagate
    /// into the storage operation that produced the event.
    fn publish(&self, event: &EntityEvent) -> Result<(), Box<dyn error::Error + Send + Sync>>;
}

/// Dispatches events to registered sinks in registration order.
#[derive(Default)]
pub struct EventDispatcher {
    sinks: Mutex<Vec<Arc<dyn EventSink>>>,
}

impl EventDispatcher {
    /// Create a dispatcher with no sinks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sink. Sinks receive events in registration order.
    pub fn subscribe(&self, sink: Arc<dyn EventSink>) {
        let mut sinks = match self.sinks.lock() {
            Ok(sinks) => sinks,
            Err(poisoned) => poisoned.into_inner(),
        };
        sinks.push(sink);
    }

    pub(crate) fn dispatch(&self, event: &EntityEvent) {
        let sinks = match self.sinks.lock() {
            Ok(sinks) => sinks.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        for sink in sinks {
            if let Err(error) = sink.publish(event) {
                #[cfg(feature = "tracing")]
                tracing::warn!(entity = %event.entity, %error, "event sink failed");
                #[cfg(not(feature = "tracing"))]
                drop(error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[derive(Default)]
    struct RecordingSink {
        label: &'static str,
        seen: Mutex<Vec<(&'static str, EventKind)>>,
    }

    struct SharedSink {
        label: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
        fail: bool,
    }

    impl EventSink for SharedSink {
        fn publish(
            &self,
            _event: &EntityEvent,
        ) -> Result<(), Box<dyn error::Error + Send + Sync>> {
            let mut log = self.log.lock().unwrap();
            log.push(self.label);
            if self.fail {
                return Err("sink unavailable".into());
            }
            Ok(())
        }
    }

    impl EventSink for RecordingSink {
        fn publish(
            &self,
            event: &EntityEvent,
        ) -> Result<(), Box<dyn error::Error + Send + Sync>> {
            self.seen.lock().unwrap().push((self.label, event.kind));
            Ok(())
        }
    }

    fn event(kind: EventKind) -> EntityEvent {
        EntityEvent {
            entity: "User".to_string(),
            kind,
            item: json!({ "id": "u1" }),
            previous: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_delivery_in_registration_order() {
        let dispatcher = EventDispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        dispatcher.subscribe(Arc::new(SharedSink {
            label: "first",
            log: log.clone(),
            fail: false,
        }));
        dispatcher.subscribe(Arc::new(SharedSink {
            label: "second",
            log: log.clone(),
            fail: false,
        }));
        dispatcher.dispatch(&event(EventKind::Created));
        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn test_failing_sink_does_not_stop_delivery() {
        let dispatcher = EventDispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        dispatcher.subscribe(Arc::new(SharedSink {
            label: "failing",
            log: log.clone(),
            fail: true,
        }));
        dispatcher.subscribe(Arc::new(SharedSink {
            label: "after",
            log: log.clone(),
            fail: false,
        }));
        dispatcher.dispatch(&event(EventKind::Deleted));
        assert_eq!(*log.lock().unwrap(), vec!["failing", "after"]);
    }

    #[test]
    fn test_each_sink_sees_each_event_once() {
        let dispatcher = EventDispatcher::new();
        let sink = Arc::new(RecordingSink {
            label: "only",
            seen: Mutex::new(Vec::new()),
        });
        dispatcher.subscribe(sink.clone());
        dispatcher.dispatch(&event(EventKind::Created));
        dispatcher.dispatch(&event(EventKind::Updated));
        assert_eq!(
            *sink.seen.lock().unwrap(),
            vec![("only", EventKind::Created), ("only", EventKind::Updated)]
        );
    }
}
