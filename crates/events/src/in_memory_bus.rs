//! In-memory event bus for tests/dev.

use std::sync::{Mutex, mpsc};

use hourbridge_core::TenantId;

use crate::bus::{EventBus, Subscription};
use crate::tenant::TenantScoped;

#[derive(Debug)]
pub enum InMemoryBusError {
    /// Subscriber list lock was poisoned by a panicking publisher.
    Poisoned,
}

type Filter<M> = Box<dyn Fn(&M) -> bool + Send>;

struct Subscriber<M> {
    tx: mpsc::Sender<M>,
    filter: Option<Filter<M>>,
}

impl<M> Subscriber<M> {
    fn wants(&self, message: &M) -> bool {
        self.filter.as_ref().is_none_or(|f| f(message))
    }
}

/// In-memory fan-out bus. Every live subscriber gets its own copy of each
/// message it accepts; dropped subscriptions are pruned on the next publish.
pub struct InMemoryEventBus<M> {
    subscribers: Mutex<Vec<Subscriber<M>>>,
}

impl<M> core::fmt::Debug for InMemoryEventBus<M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let count = self.subscribers.lock().map(|s| s.len()).unwrap_or(0);
        f.debug_struct("InMemoryEventBus").field("subscribers", &count).finish()
    }
}

impl<M> InMemoryEventBus<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to the messages accepted by `filter` only.
    pub fn subscribe_filtered(&self, filter: impl Fn(&M) -> bool + Send + 'static) -> Subscription<M> {
        self.attach(Some(Box::new(filter)))
    }

    /// Messages that involve `tenant` on either side, e.g. one tenant's
    /// notification dispatcher.
    pub fn subscribe_for_tenant(&self, tenant: TenantId) -> Subscription<M>
    where
        M: TenantScoped + 'static,
    {
        self.subscribe_filtered(move |m: &M| m.involves(tenant))
    }

    fn attach(&self, filter: Option<Filter<M>>) -> Subscription<M> {
        let (tx, rx) = mpsc::channel();
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(Subscriber { tx, filter });
        }
        Subscription::new(rx)
    }
}

impl<M> Default for InMemoryEventBus<M> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl<M> EventBus<M> for InMemoryEventBus<M>
where
    M: Clone + Send + 'static,
{
    type Error = InMemoryBusError;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        let mut subs = self.subscribers.lock().map_err(|_| InMemoryBusError::Poisoned)?;
        subs.retain(|s| !s.wants(&message) || s.tx.send(message.clone()).is_ok());
        Ok(())
    }

    fn subscribe(&self) -> Subscription<M> {
        self.attach(None)
    }
}
