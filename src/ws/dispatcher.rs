//! Typed callback registry for discovery events.
//!
//! Subscribers register per [`EventKind`]; dispatch walks a snapshot of the
//! list taken at dispatch start, so callbacks may subscribe or unsubscribe
//! (themselves included) without affecting the pass in progress. A panicking
//! callback is caught and logged; the remaining callbacks still run.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::ws::{DiscoveryEvent, EventKind};

type Handler = Arc<dyn Fn(&DiscoveryEvent) + Send + Sync + 'static>;

/// Capability returned by [`EventDispatcher::on`]. Passing it to
/// [`EventDispatcher::off`] removes exactly that registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionHandle {
    kind: EventKind,
    id: u64,
}

/// Fan-out of events to registered callbacks, one slot per event kind.
pub struct EventDispatcher {
    slots: [Mutex<Vec<(u64, Handler)>>; EventKind::COUNT],
    next_id: AtomicU64,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| Mutex::new(Vec::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register `handler` for `kind`. Handlers fire in registration order;
    /// registering the same closure twice yields two independent handles.
    pub fn on(
        &self,
        kind: EventKind,
        handler: impl Fn(&DiscoveryEvent) + Send + Sync + 'static,
    ) -> SubscriptionHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.slot(kind).push((id, Arc::new(handler)));
        SubscriptionHandle { kind, id }
    }

    /// Remove the registration behind `handle`. Idempotent.
    pub fn off(&self, handle: &SubscriptionHandle) {
        self.slot(handle.kind).retain(|(id, _)| *id != handle.id);
    }

    /// Invoke every subscriber for the event's kind, in registration order,
    /// over a snapshot taken at dispatch start. No subscribers is a no-op.
    pub fn dispatch(&self, event: &DiscoveryEvent) {
        let snapshot: Vec<Handler> = self
            .slot(event.kind())
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        for handler in snapshot {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handler(event))) {
                tracing::error!(
                    kind = ?event.kind(),
                    "Subscriber callback panicked: {}",
                    panic_message(&panic)
                );
            }
        }
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.slot(kind).len()
    }

    fn slot(&self, kind: EventKind) -> std::sync::MutexGuard<'_, Vec<(u64, Handler)>> {
        // A handler can never panic while the lock is held (dispatch runs
        // over a snapshot), so poisoning is unreachable.
        self.slots[kind.index()]
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
