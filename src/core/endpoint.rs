//! # Endpoint - the unit applications construct to publish and receive events.
//!
//! An [`Endpoint`] is bound to one execution context (by default the calling
//! thread). It owns a subscription table, publishes through the context's
//! [`Proxy`] and delivers events only when its owner calls
//! [`dispatch`](Endpoint::dispatch).
//!
//! ## Lifecycle
//! ```text
//! Endpoint::new ──► Pool::attach(ctx) ──► Proxy::register(ep)
//!
//! subscribe::<T>(cb) ──► table[T].append(cb)      (first for T: Proxy::subscribe)
//! action.invoke()    ──► table[T].remove(handle)  (last for T:  Proxy::unsubscribe)
//!
//! publish(ev)  ──► Proxy::publish(ep, Arc<Envelope>)
//! dispatch()   ──► Proxy::pull(ep) ──► every callback of table[type], in order
//!
//! drop         ──► Proxy::deregister(ep) ──► Pool::detach(ctx)
//! ```
//!
//! ## Rules
//! - `Endpoint` is `!Send`: it stays on the thread that created it.
//! - Nothing is delivered synchronously, not even to same-context subscribers.
//! - `dispatch` is not re-entrant: a nested call on the same endpoint returns
//!   `false` without doing work.
//! - Callbacks may subscribe, unsubscribe and publish while being dispatched.
//!   A callback removed mid-dispatch is not called afterwards; a callback added
//!   mid-dispatch first sees the next event.
//! - While a dispatch runs, a subscriber list emptied by its callbacks stays in
//!   the table (its slot generations keep advancing) and is swept afterwards.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::core::pool::Pool;
use crate::core::proxy::Proxy;
use crate::core::{ContextId, EndpointId};
use crate::events::{Envelope, Event, EventTypeId};
use crate::subscribers::{ListHandle, SubscriberList};

type Callback = Rc<RefCell<dyn FnMut(&Envelope)>>;

struct Shared {
    id: EndpointId,
    proxy: Arc<Proxy>,
    table: RefCell<HashMap<EventTypeId, SubscriberList<Callback>>>,
    dispatching: Cell<bool>,
}

/// Resets the dispatch barrier on every exit path, unwinding included.
struct DispatchGuard<'a>(&'a Cell<bool>);

impl<'a> DispatchGuard<'a> {
    fn enter(flag: &'a Cell<bool>) -> Option<Self> {
        if flag.replace(true) {
            None
        } else {
            Some(Self(flag))
        }
    }
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl Shared {
    fn subscribe<T: Event, F: FnMut(&T) + 'static>(self: &Rc<Self>, mut callback: F) -> UnsubscribeAction {
        let event_type = EventTypeId::of::<T>();
        let erased: Callback = Rc::new(RefCell::new(move |envelope: &Envelope| {
            if let Some(event) = envelope.downcast_ref::<T>() {
                callback(event);
            }
        }));

        let handle = {
            let mut table = self.table.borrow_mut();
            let list = table.entry(event_type).or_default();
            if list.is_empty() {
                self.proxy.subscribe(self.id, event_type);
            }
            list.append(erased)
        };
        tracing::debug!(endpoint = %self.id, event = event_type.name(), "subscribed");

        UnsubscribeAction {
            endpoint: Rc::downgrade(self),
            event_type,
            handle: Some(handle),
        }
    }

    fn release(&self, event_type: EventTypeId, handle: ListHandle) -> bool {
        let mut table = self.table.borrow_mut();
        let Some(list) = table.get_mut(&event_type) else {
            return false;
        };
        let Some(removed) = list.remove(handle) else {
            return false;
        };
        if list.is_empty() {
            // Handles snapshotted by a running dispatch must not resolve
            // against a fresh list, so the emptied one is kept until it ends.
            if !self.dispatching.get() {
                table.remove(&event_type);
            }
            self.proxy.unsubscribe(self.id, event_type);
        }
        // The callback may own state whose drop re-enters this endpoint.
        drop(table);
        drop(removed);
        tracing::debug!(endpoint = %self.id, event = event_type.name(), "unsubscribed");
        true
    }

    fn publish<T: Event>(&self, event: T) {
        self.proxy
            .publish(self.id, Arc::new(Envelope::new(self.id, event)));
    }

    fn dispatch(&self) -> bool {
        let Some(_guard) = DispatchGuard::enter(&self.dispatching) else {
            tracing::trace!(endpoint = %self.id, "nested dispatch refused");
            return false;
        };
        let Some(envelope) = self.proxy.pull(self.id) else {
            return false;
        };

        let event_type = envelope.type_id();
        let handles = self
            .table
            .borrow()
            .get(&event_type)
            .map(SubscriberList::handles)
            .unwrap_or_default();
        tracing::trace!(
            endpoint = %self.id,
            event = event_type.name(),
            seq = envelope.seq(),
            callbacks = handles.len(),
            "dispatching"
        );

        let event: &Envelope = &envelope;
        for handle in handles {
            let callback = self
                .table
                .borrow()
                .get(&event_type)
                .and_then(|list| list.get(handle))
                .cloned();
            let Some(callback) = callback else {
                continue;
            };
            match callback.try_borrow_mut() {
                Ok(mut f) => (&mut *f)(event),
                Err(_) => {
                    tracing::warn!(endpoint = %self.id, event = event_type.name(), "callback busy, skipped");
                }
            }
        }
        self.table.borrow_mut().retain(|_, list| !list.is_empty());
        true
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let table = std::mem::take(self.table.get_mut());
        if !table.is_empty() {
            tracing::debug!(
                endpoint = %self.id,
                types = table.len(),
                "endpoint dropped with live subscriptions"
            );
        }
        self.proxy.deregister(self.id);
        drop(table);

        let context = self.proxy.context();
        if let Some(pool) = self.proxy.pool() {
            if let Err(err) = pool.detach(context) {
                tracing::warn!(endpoint = %self.id, error = err.as_label(), "detach failed: {err}");
            }
        }
        tracing::debug!(endpoint = %self.id, context = %context, "endpoint closed");
    }
}

/// Context-affine publisher/receiver of events.
///
/// # Example
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use relaybus::{ContextId, Endpoint, Pool, BusConfig};
///
/// struct Ping;
///
/// let pool = Pool::new(BusConfig::default());
/// let ctx = ContextId::next();
/// let a = Endpoint::attach(&pool, ctx);
/// let b = Endpoint::attach(&pool, ctx);
///
/// let hits = Rc::new(Cell::new(0));
/// let counter = Rc::clone(&hits);
/// let mut action = b.subscribe(move |_: &Ping| counter.set(counter.get() + 1));
///
/// a.publish(Ping);
/// assert!(!a.dispatch());
/// assert!(b.dispatch());
/// assert!(!b.dispatch());
/// assert_eq!(hits.get(), 1);
///
/// action.invoke();
/// ```
pub struct Endpoint {
    shared: Rc<Shared>,
}

impl Endpoint {
    /// Attaches to the global pool under the calling thread's context.
    pub fn new() -> Self {
        Self::attach(&Pool::global(), ContextId::current_thread())
    }

    /// Attaches to `pool` under an explicit `context`.
    ///
    /// Every endpoint using the same context must be driven from the same
    /// thread.
    pub fn attach(pool: &Arc<Pool>, context: ContextId) -> Self {
        let id = EndpointId::next();
        let proxy = pool.attach(context);
        proxy.register(id);
        tracing::debug!(endpoint = %id, context = %context, "endpoint opened");
        Self {
            shared: Rc::new(Shared {
                id,
                proxy,
                table: RefCell::new(HashMap::new()),
                dispatching: Cell::new(false),
            }),
        }
    }

    /// Identity of this endpoint.
    pub fn id(&self) -> EndpointId {
        self.shared.id
    }

    /// Execution context this endpoint is attached under.
    pub fn context(&self) -> ContextId {
        self.shared.proxy.context()
    }

    /// Registers `callback` for events of type `T`.
    ///
    /// The returned action removes the callback; see [`Subscription`](crate::Subscription)
    /// for a guard that runs it on drop.
    pub fn subscribe<T: Event, F: FnMut(&T) + 'static>(&self, callback: F) -> UnsubscribeAction {
        self.shared.subscribe(callback)
    }

    /// Queues `event` for every other endpoint subscribed to `T`.
    pub fn publish<T: Event>(&self, event: T) {
        self.shared.publish(event);
    }

    /// Delivers at most one pending event to this endpoint's callbacks.
    ///
    /// Returns `false` when nothing was pending or when called from inside a
    /// dispatch of this same endpoint.
    pub fn dispatch(&self) -> bool {
        self.shared.dispatch()
    }

    /// Number of events already routed to this endpoint and not yet dispatched.
    ///
    /// Events still waiting in the context's inbound queue are not counted.
    pub fn pending(&self) -> usize {
        self.shared.proxy.pending(self.shared.id)
    }

    /// Number of callbacks registered for `T`.
    pub fn subscriber_count<T: Event>(&self) -> usize {
        self.shared
            .table
            .borrow()
            .get(&EventTypeId::of::<T>())
            .map_or(0, SubscriberList::len)
    }

    /// Non-owning handle, safe to capture inside callbacks.
    pub fn handle(&self) -> EndpointHandle {
        EndpointHandle {
            id: self.shared.id,
            shared: Rc::downgrade(&self.shared),
        }
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("id", &self.shared.id)
            .field("context", &self.context())
            .finish_non_exhaustive()
    }
}

/// Weak reference to an [`Endpoint`].
///
/// Callbacks capture this instead of the endpoint itself; every operation
/// becomes a no-op once the endpoint is dropped.
#[derive(Clone)]
pub struct EndpointHandle {
    id: EndpointId,
    shared: Weak<Shared>,
}

impl EndpointHandle {
    /// Identity of the referenced endpoint.
    pub fn id(&self) -> EndpointId {
        self.id
    }

    /// True while the endpoint is alive.
    pub fn is_alive(&self) -> bool {
        self.shared.strong_count() > 0
    }

    /// Publishes through the endpoint. Returns `false` if it is gone.
    pub fn publish<T: Event>(&self, event: T) -> bool {
        match self.shared.upgrade() {
            Some(shared) => {
                shared.publish(event);
                true
            }
            None => false,
        }
    }

    /// Subscribes through the endpoint. Returns `None` if it is gone.
    pub fn subscribe<T: Event, F: FnMut(&T) + 'static>(&self, callback: F) -> Option<UnsubscribeAction> {
        self.shared.upgrade().map(|shared| shared.subscribe(callback))
    }

    /// Dispatches on the endpoint. Returns `false` if it is gone.
    pub fn dispatch(&self) -> bool {
        self.shared.upgrade().is_some_and(|shared| shared.dispatch())
    }
}

impl fmt::Debug for EndpointHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointHandle")
            .field("id", &self.id)
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// One-shot capability removing a single callback from its endpoint.
///
/// Invoking it more than once, or after the endpoint is gone, does nothing.
#[must_use = "dropping the action leaves the callback registered until the endpoint closes"]
pub struct UnsubscribeAction {
    endpoint: Weak<Shared>,
    event_type: EventTypeId,
    handle: Option<ListHandle>,
}

impl UnsubscribeAction {
    /// Removes the callback. Returns `true` only on the call that removed it.
    pub fn invoke(&mut self) -> bool {
        let Some(handle) = self.handle.take() else {
            return false;
        };
        self.endpoint
            .upgrade()
            .is_some_and(|shared| shared.release(self.event_type, handle))
    }

    /// Type the callback was registered for.
    pub fn event_type(&self) -> EventTypeId {
        self.event_type
    }

    /// True until [`invoke`](Self::invoke) has run.
    pub fn is_pending(&self) -> bool {
        self.handle.is_some()
    }
}

impl fmt::Debug for UnsubscribeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnsubscribeAction")
            .field("event", &self.event_type.name())
            .field("pending", &self.is_pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BusConfig;

    struct Ping;
    struct Pong;

    fn counter() -> (Rc<Cell<u32>>, Rc<Cell<u32>>) {
        let c = Rc::new(Cell::new(0));
        (Rc::clone(&c), c)
    }

    fn pair() -> (Arc<Pool>, Endpoint, Endpoint) {
        let pool = Pool::new(BusConfig::default());
        let ctx = ContextId::next();
        let a = Endpoint::attach(&pool, ctx);
        let b = Endpoint::attach(&pool, ctx);
        (pool, a, b)
    }

    #[test]
    fn test_no_self_delivery() {
        let (_pool, a, _b) = pair();
        let (hits, seen) = counter();
        let _action = a.subscribe(move |_: &Ping| hits.set(hits.get() + 1));

        a.publish(Ping);
        assert!(!a.dispatch());
        assert_eq!(seen.get(), 0);
    }

    #[test]
    fn test_same_context_delivery_counts() {
        let (_pool, a, b) = pair();
        let (hits, seen) = counter();
        let _action = b.subscribe(move |_: &Ping| hits.set(hits.get() + 1));

        a.publish(Ping);
        a.publish(Ping);
        assert!(b.dispatch());
        assert!(b.dispatch());
        assert!(!b.dispatch());
        assert_eq!(seen.get(), 2);
    }

    #[test]
    fn test_publish_is_never_synchronous() {
        let (_pool, a, b) = pair();
        let (hits, seen) = counter();
        let _action = b.subscribe(move |_: &Ping| hits.set(hits.get() + 1));

        a.publish(Ping);
        assert_eq!(seen.get(), 0);
        assert_eq!(b.pending(), 1);
    }

    #[test]
    fn test_callbacks_run_in_insertion_order() {
        let (_pool, a, b) = pair();
        let order = Rc::new(RefCell::new(Vec::new()));
        let actions: Vec<_> = (0..3)
            .map(|i| {
                let order = Rc::clone(&order);
                b.subscribe(move |_: &Ping| order.borrow_mut().push(i))
            })
            .collect();

        a.publish(Ping);
        assert!(b.dispatch());
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
        assert_eq!(actions.len(), 3);
    }

    #[test]
    fn test_unsubscribe_is_idempotent_and_withdraws_interest() {
        let (pool, a, b) = pair();
        let mut first = b.subscribe(|_: &Ping| {});
        let mut second = b.subscribe(|_: &Ping| {});
        assert_eq!(b.subscriber_count::<Ping>(), 2);

        assert!(first.invoke());
        assert!(!first.invoke());
        assert!(pool.is_interested(b.context(), EventTypeId::of::<Ping>()));

        a.publish(Ping);
        assert!(second.invoke());
        assert_eq!(b.subscriber_count::<Ping>(), 0);
        assert_eq!(b.pending(), 0);
        assert!(!b.dispatch());
        assert!(!pool.is_interested(b.context(), EventTypeId::of::<Ping>()));
    }

    #[test]
    fn test_recursion_barrier() {
        let (_pool, relay, a) = pair();
        let relay_handle = relay.handle();
        let self_handle = a.handle();
        let nested = Rc::new(Cell::new(None));
        let nested_in_cb = Rc::clone(&nested);
        let (pongs, seen_pongs) = counter();

        let _ping = a.subscribe(move |_: &Ping| {
            relay_handle.publish(Pong);
            nested_in_cb.set(Some(self_handle.dispatch()));
        });
        let _pong = a.subscribe(move |_: &Pong| pongs.set(pongs.get() + 1));

        relay.publish(Ping);
        assert!(a.dispatch());
        assert_eq!(nested.get(), Some(false));
        assert_eq!(seen_pongs.get(), 0);
        assert_eq!(a.pending(), 1);

        assert!(a.dispatch());
        assert_eq!(seen_pongs.get(), 1);
        assert!(!a.dispatch());
    }

    #[test]
    fn test_unsubscribe_during_dispatch_skips_later_callback() {
        let (_pool, a, b) = pair();
        let (hits, seen) = counter();
        let later: Rc<RefCell<Option<UnsubscribeAction>>> = Rc::new(RefCell::new(None));
        let later_in_cb = Rc::clone(&later);

        let _first = b.subscribe(move |_: &Ping| {
            if let Some(mut action) = later_in_cb.borrow_mut().take() {
                action.invoke();
            }
        });
        *later.borrow_mut() = Some(b.subscribe(move |_: &Ping| hits.set(hits.get() + 1)));

        a.publish(Ping);
        assert!(b.dispatch());
        assert_eq!(seen.get(), 0);
    }

    #[test]
    fn test_same_context_isolation_by_type() {
        let pool = Pool::new(BusConfig::default());
        let ctx = ContextId::next();
        let a = Endpoint::attach(&pool, ctx);
        let b = Endpoint::attach(&pool, ctx);
        let publisher = Endpoint::attach(&pool, ctx);
        let (pings, seen_pings) = counter();
        let (pongs, seen_pongs) = counter();
        let _ping = a.subscribe(move |_: &Ping| pings.set(pings.get() + 1));
        let _pong = b.subscribe(move |_: &Pong| pongs.set(pongs.get() + 1));

        publisher.publish(Ping);
        publisher.publish(Pong);
        assert_eq!(a.pending(), 1);
        assert_eq!(b.pending(), 1);

        assert!(a.dispatch());
        assert!(!a.dispatch());
        assert!(b.dispatch());
        assert!(!b.dispatch());
        assert!(!publisher.dispatch());
        assert_eq!(seen_pings.get(), 1);
        assert_eq!(seen_pongs.get(), 1);
    }

    #[test]
    fn test_callback_added_mid_dispatch_sees_next_event() {
        let (_pool, a, b) = pair();
        let (late_hits, seen_late) = counter();
        let handle = b.handle();
        let added: Rc<RefCell<Vec<UnsubscribeAction>>> = Rc::default();
        let added_in_cb = Rc::clone(&added);

        let _first = b.subscribe(move |_: &Ping| {
            if added_in_cb.borrow().is_empty() {
                let hits = Rc::clone(&late_hits);
                added_in_cb
                    .borrow_mut()
                    .extend(handle.subscribe(move |_: &Ping| hits.set(hits.get() + 1)));
            }
        });

        a.publish(Ping);
        assert!(b.dispatch());
        assert_eq!(seen_late.get(), 0);
        assert_eq!(b.subscriber_count::<Ping>(), 2);

        a.publish(Ping);
        assert!(b.dispatch());
        assert_eq!(seen_late.get(), 1);
    }

    #[test]
    fn test_resubscribe_after_emptying_list_waits_for_next_event() {
        let (_pool, a, b) = pair();
        let (late_hits, seen_late) = counter();
        let handle = b.handle();
        let current: Rc<RefCell<Vec<UnsubscribeAction>>> = Rc::default();
        let replacements: Rc<RefCell<Vec<UnsubscribeAction>>> = Rc::default();
        let (current_in_cb, replacements_in_cb) = (Rc::clone(&current), Rc::clone(&replacements));

        // Drops every Ping callback, itself included, then registers two new ones.
        let first = b.subscribe(move |_: &Ping| {
            for mut action in current_in_cb.borrow_mut().drain(..) {
                action.invoke();
            }
            for _ in 0..2 {
                let hits = Rc::clone(&late_hits);
                replacements_in_cb
                    .borrow_mut()
                    .extend(handle.subscribe(move |_: &Ping| hits.set(hits.get() + 1)));
            }
        });
        let second = b.subscribe(|_: &Ping| {});
        current.borrow_mut().extend([first, second]);

        a.publish(Ping);
        assert!(b.dispatch());
        assert_eq!(seen_late.get(), 0);
        assert_eq!(b.subscriber_count::<Ping>(), 2);
        assert_eq!(replacements.borrow().len(), 2);

        a.publish(Ping);
        assert!(b.dispatch());
        assert_eq!(seen_late.get(), 2);
    }

    #[test]
    fn test_leaked_endpoint_does_not_keep_pool_alive() {
        let pool = Pool::new(BusConfig::default());
        let weak = Arc::downgrade(&pool);
        let ctx = ContextId::next();
        let a = Endpoint::attach(&pool, ctx);
        let b = Endpoint::attach(&pool, ctx);
        let (hits, seen) = counter();
        let _action = b.subscribe(move |_: &Ping| hits.set(hits.get() + 1));

        std::mem::forget(Endpoint::attach(&pool, ctx));
        drop(pool);
        assert!(weak.upgrade().is_none());

        // Local routing keeps working without the pool.
        a.publish(Ping);
        assert!(b.dispatch());
        assert_eq!(seen.get(), 1);
    }

    #[test]
    fn test_drop_detaches_from_pool() {
        let pool = Pool::new(BusConfig::default());
        let ctx = ContextId::next();
        let a = Endpoint::attach(&pool, ctx);
        let b = Endpoint::attach(&pool, ctx);
        let _leak = b.subscribe(|_: &Ping| {});
        assert_eq!(pool.ref_count(ctx), Some(2));

        let handle = b.handle();
        drop(b);
        assert!(!handle.is_alive());
        assert!(!handle.publish(Ping));
        assert!(!pool.is_interested(ctx, EventTypeId::of::<Ping>()));
        assert_eq!(pool.ref_count(ctx), Some(1));

        drop(a);
        assert_eq!(pool.context_count(), 0);
    }
}
