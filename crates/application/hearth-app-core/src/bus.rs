//! In-process publish/subscribe keyed by [`Channel`].
//!
//! Dispatch is synchronous: `publish` runs every handler registered on the
//! channel at that moment, in registration order, on the caller's thread.
//! Handlers are expected to be cheap (live views forward into their own
//! queue). A panicking handler is logged and skipped; the rest of the
//! dispatch continues.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use hearth_core::{ActorId, Channel, ConnectionId, Event};
use tracing::{debug, error};

type Handler = Box<dyn Fn(&Event) + Send + Sync>;

struct Registration {
    id: u64,
    delivery: Mutex<Delivery>,
    idle: Condvar,
    handler: Handler,
}

/// No lock is held while the handler runs, so a handler may publish to its
/// own channel or unsubscribe itself.
struct Delivery {
    active: bool,
    // One entry per call in progress; a thread appears twice when a handler
    // re-enters its own channel.
    running_on: Vec<ThreadId>,
}

impl Registration {
    fn delivery(&self) -> MutexGuard<'_, Delivery> {
        self.delivery.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks a call as started, or returns false once unsubscribed.
    fn enter(&self) -> bool {
        let mut delivery = self.delivery();
        if !delivery.active {
            return false;
        }
        delivery.running_on.push(thread::current().id());
        true
    }

    fn exit(&self) {
        let me = thread::current().id();
        let mut delivery = self.delivery();
        if let Some(pos) = delivery.running_on.iter().position(|t| *t == me) {
            delivery.running_on.swap_remove(pos);
        }
        drop(delivery);
        self.idle.notify_all();
    }

    /// Stops new calls, then waits for calls on other threads to finish.
    /// Calls further up the current thread's stack are left to unwind on
    /// their own.
    fn deactivate(&self) {
        let me = thread::current().id();
        let mut delivery = self.delivery();
        delivery.active = false;
        while delivery.running_on.iter().any(|t| *t != me) {
            delivery = self
                .idle
                .wait(delivery)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

#[derive(Default)]
struct BusInner {
    next_id: AtomicU64,
    channels: Mutex<HashMap<Channel, Vec<Arc<Registration>>>>,
}

impl BusInner {
    fn remove(&self, channel: &Channel, id: u64) {
        let mut channels = self.channels.lock().expect("bus registry lock poisoned");
        if let Some(regs) = channels.get_mut(channel) {
            regs.retain(|r| r.id != id);
            if regs.is_empty() {
                channels.remove(channel);
            }
        }
    }
}

/// Cheap to clone; clones share one registration table.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` on `channel`. The registration lives until the
    /// returned [`Subscription`] is unsubscribed or dropped.
    ///
    /// Two handlers on different threads that each unsubscribe the other
    /// from inside their calls will wait on each other forever.
    pub fn subscribe<F>(&self, channel: Channel, handler: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let registration = Arc::new(Registration {
            id,
            delivery: Mutex::new(Delivery {
                active: true,
                running_on: Vec::new(),
            }),
            idle: Condvar::new(),
            handler: Box::new(handler),
        });
        self.inner
            .channels
            .lock()
            .expect("bus registry lock poisoned")
            .entry(channel.clone())
            .or_default()
            .push(registration.clone());
        debug!(%channel, subscription = id, "subscribed");

        Subscription {
            bus: self.inner.clone(),
            channel,
            registration,
            released: AtomicBool::new(false),
        }
    }

    /// Delivers `event` to every handler registered on `channel` right now.
    /// Returns how many handlers ran to completion.
    pub fn publish(&self, channel: &Channel, event: &Event) -> usize {
        let targets: Vec<Arc<Registration>> = self
            .inner
            .channels
            .lock()
            .expect("bus registry lock poisoned")
            .get(channel)
            .cloned()
            .unwrap_or_default();

        let mut delivered = 0;
        for registration in targets {
            if !registration.enter() {
                continue;
            }
            let outcome = catch_unwind(AssertUnwindSafe(|| (registration.handler)(event)));
            registration.exit();
            match outcome {
                Ok(()) => delivered += 1,
                Err(_) => error!(
                    %channel,
                    kind = %event.kind,
                    subscription = registration.id,
                    "event subscriber panicked"
                ),
            }
        }
        delivered
    }

    pub fn subscribe_global<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.subscribe(Channel::Global, handler)
    }

    pub fn publish_global(&self, event: Event) -> usize {
        self.publish(&Channel::Global, &event)
    }

    pub fn subscribe_to_actor<F>(&self, actor: &ActorId, handler: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.subscribe(Channel::actor(actor), handler)
    }

    pub fn publish_to_actor(&self, actor: &ActorId, event: Event) -> usize {
        self.publish(&Channel::actor(actor), &event)
    }

    pub fn subscribe_to_connection<F>(&self, connection: &ConnectionId, handler: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.subscribe(Channel::connection(connection), handler)
    }

    pub fn publish_to_connection(&self, connection: &ConnectionId, event: Event) -> usize {
        self.publish(&Channel::connection(connection), &event)
    }

    pub fn subscriber_count(&self, channel: &Channel) -> usize {
        self.inner
            .channels
            .lock()
            .expect("bus registry lock poisoned")
            .get(channel)
            .map_or(0, Vec::len)
    }

    pub fn total_subscriptions(&self) -> usize {
        self.inner
            .channels
            .lock()
            .expect("bus registry lock poisoned")
            .values()
            .map(Vec::len)
            .sum()
    }
}

/// Capability to remove exactly one registration. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    bus: Arc<BusInner>,
    channel: Channel,
    registration: Arc<Registration>,
    released: AtomicBool,
}

impl Subscription {
    /// Idempotent. Once this returns, the handler will not be invoked again
    /// and no call to it is still running on another thread.
    pub fn unsubscribe(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        self.registration.deactivate();
        self.bus.remove(&self.channel, self.registration.id);
        debug!(channel = %self.channel, subscription = self.registration.id, "unsubscribed");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
