//! Synchronous publish/subscribe registry.

use super::{Event, EventKind};
use anyhow::Result;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

/// Receives events from an [`EventBus`].
///
/// A failing observer (error or panic) is isolated: the failure is logged
/// and delivery continues with the next observer.
pub trait Observer: Send + Sync {
    fn notify(&self, event: &Event) -> Result<()>;
}

impl<F> Observer for F
where
    F: Fn(&Event) -> Result<()> + Send + Sync,
{
    fn notify(&self, event: &Event) -> Result<()> {
        self(event)
    }
}

/// Ordered registry of typed and wildcard subscriptions.
///
/// Emission is synchronous and happens on the caller's task: every observer
/// subscribed to the event's kind, in subscription order, then every
/// wildcard observer, in subscription order.
#[derive(Default)]
pub struct EventBus {
    typed: Vec<(EventKind, Arc<dyn Observer>)>,
    wildcard: Vec<Arc<dyn Observer>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a shared observer to one event kind.
    pub fn subscribe(&mut self, kind: EventKind, observer: Arc<dyn Observer>) -> &mut Self {
        self.typed.push((kind, observer));
        self
    }

    /// Subscribe a shared observer to every event.
    pub fn subscribe_all(&mut self, observer: Arc<dyn Observer>) -> &mut Self {
        self.wildcard.push(observer);
        self
    }

    /// Convenience for [`subscribe`](Self::subscribe) with an owned observer or closure.
    pub fn on<O: Observer + 'static>(&mut self, kind: EventKind, observer: O) -> &mut Self {
        self.subscribe(kind, Arc::new(observer))
    }

    /// Convenience for [`subscribe_all`](Self::subscribe_all).
    pub fn on_any<O: Observer + 'static>(&mut self, observer: O) -> &mut Self {
        self.subscribe_all(Arc::new(observer))
    }

    /// Total number of subscriptions (typed and wildcard).
    pub fn subscriber_count(&self) -> usize {
        self.typed.len() + self.wildcard.len()
    }

    /// Build an event and deliver it to all matching observers.
    pub fn emit(&self, kind: EventKind, data: serde_json::Value) {
        let event = Event::new(kind, data);

        let typed = self
            .typed
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, observer)| observer);

        for observer in typed.chain(self.wildcard.iter()) {
            deliver(observer.as_ref(), &event);
        }
    }
}

fn deliver(observer: &dyn Observer, event: &Event) {
    match catch_unwind(AssertUnwindSafe(|| observer.notify(event))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!("observer failed on {}: {e:#}", event.kind),
        Err(_) => warn!("observer panicked on {}", event.kind),
    }
}
