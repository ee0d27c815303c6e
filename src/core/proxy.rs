//! # Proxy - per-context router shared by every endpoint of one context.
//!
//! ## Architecture
//! ```text
//! Endpoint ─publish─► Proxy ──► Pool::push (other contexts)
//!                       └─────► queues[ep] for every other local subscriber
//!
//! Endpoint ─pull────► Proxy ──► queues[ep] empty? ──► Pool::pull ──► redistribute
//!                       └─────► queues[ep].pop_front()
//! ```
//!
//! ## Rules
//! - Never enqueues an envelope for the endpoint that published it.
//! - Per-endpoint queues are FIFO; nothing orders events across endpoints.
//! - Inbound envelopes of a type no local endpoint still wants are dropped.
//! - Reports interest to the pool only on 0→1 / 1→0 transitions.
//! - Lock order is Proxy → Pool; the pool never calls back into a proxy.
//! - The proxy holds its pool weakly. Once the pool is gone, publishing still
//!   reaches local endpoints and nothing arrives from other contexts.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::config::{BusConfig, FlushPolicy};
use crate::core::pool::Pool;
use crate::core::{ContextId, EndpointId};
use crate::events::{Envelope, EventTypeId};

type Queue = VecDeque<Arc<Envelope>>;

#[derive(Default)]
struct Tables {
    /// Local endpoints interested in each type.
    interest: HashMap<EventTypeId, BTreeSet<EndpointId>>,
    /// Pending envelopes per local endpoint.
    queues: HashMap<EndpointId, Queue>,
}

impl Tables {
    fn fan_out(&mut self, envelope: &Arc<Envelope>, skip: Option<EndpointId>) -> usize {
        let Some(targets) = self.interest.get(&envelope.type_id()) else {
            return 0;
        };
        let mut delivered = 0;
        for id in targets {
            if Some(*id) == skip {
                continue;
            }
            if let Some(queue) = self.queues.get_mut(id) {
                queue.push_back(Arc::clone(envelope));
                delivered += 1;
            }
        }
        delivered
    }
}

/// Router for one execution context.
///
/// Obtained from [`Pool::attach`]; every endpoint attached under the same
/// [`ContextId`] receives the same `Arc<Proxy>`.
pub struct Proxy {
    pool: Weak<Pool>,
    context: ContextId,
    config: BusConfig,
    tables: Mutex<Tables>,
}

impl Proxy {
    pub(crate) fn new(pool: &Arc<Pool>, context: ContextId) -> Self {
        Self {
            pool: Arc::downgrade(pool),
            context,
            config: pool.config().clone(),
            tables: Mutex::new(Tables::default()),
        }
    }

    /// Context this proxy routes for.
    pub fn context(&self) -> ContextId {
        self.context
    }

    /// Pool this proxy is attached to, if it is still alive.
    pub fn pool(&self) -> Option<Arc<Pool>> {
        self.pool.upgrade()
    }

    /// Creates the pending queue of a newly constructed endpoint.
    pub fn register(&self, endpoint: EndpointId) {
        let queue = self
            .config
            .initial_queue_capacity()
            .map(VecDeque::with_capacity)
            .unwrap_or_default();
        self.tables.lock().queues.insert(endpoint, queue);
    }

    /// Erases `endpoint`'s queue and withdraws any interest it still holds.
    pub fn deregister(&self, endpoint: EndpointId) {
        let mut tables = self.tables.lock();
        tables.queues.remove(&endpoint);

        let mut lost = Vec::new();
        tables.interest.retain(|event_type, endpoints| {
            endpoints.remove(&endpoint);
            if endpoints.is_empty() {
                lost.push(*event_type);
                false
            } else {
                true
            }
        });
        for event_type in lost {
            self.report_unsubscribe(event_type);
        }
    }

    /// Routes `envelope` published by `endpoint` to other contexts and to
    /// every other interested local endpoint.
    pub fn publish(&self, endpoint: EndpointId, envelope: Arc<Envelope>) {
        let remote = self.pool().map_or(0, |pool| pool.push(self.context, &envelope));
        let local = self.tables.lock().fan_out(&envelope, Some(endpoint));
        tracing::trace!(
            context = %self.context,
            endpoint = %endpoint,
            event = envelope.type_id().name(),
            seq = envelope.seq(),
            remote,
            local,
            "published"
        );
    }

    /// Pops the next pending envelope for `endpoint`.
    ///
    /// When the endpoint's queue is empty, the context's inbound queue is first
    /// drained from the pool and redistributed to every interested endpoint.
    pub fn pull(&self, endpoint: EndpointId) -> Option<Arc<Envelope>> {
        let mut tables = self.tables.lock();
        let empty = tables.queues.get(&endpoint).is_none_or(VecDeque::is_empty);
        if let Some(pool) = self.pool().filter(|_| empty) {
            match pool.pull(self.context) {
                Ok(batch) => {
                    for envelope in batch {
                        if tables.fan_out(&envelope, None) == 0 {
                            tracing::trace!(
                                context = %self.context,
                                event = envelope.type_id().name(),
                                seq = envelope.seq(),
                                "dropped inbound event without local interest"
                            );
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(context = %self.context, error = err.as_label(), "pull failed: {err}");
                }
            }
        }
        tables.queues.get_mut(&endpoint)?.pop_front()
    }

    /// Adds `endpoint` to the subscribers of `event_type`.
    pub fn subscribe(&self, endpoint: EndpointId, event_type: EventTypeId) {
        let mut tables = self.tables.lock();
        let endpoints = tables.interest.entry(event_type).or_default();
        if endpoints.is_empty() {
            if let Some(pool) = self.pool() {
                if let Err(err) = pool.subscribe(self.context, event_type) {
                    tracing::warn!(context = %self.context, error = err.as_label(), "subscribe failed: {err}");
                }
            }
            tracing::debug!(context = %self.context, event = event_type.name(), "context interested");
        }
        endpoints.insert(endpoint);
    }

    /// Removes `endpoint` from the subscribers of `event_type`.
    ///
    /// Pending events are discarded according to [`BusConfig::flush_policy`].
    pub fn unsubscribe(&self, endpoint: EndpointId, event_type: EventTypeId) {
        let mut tables = self.tables.lock();
        if let Some(queue) = tables.queues.get_mut(&endpoint) {
            match self.config.flush_policy {
                FlushPolicy::MatchingType => queue.retain(|e| e.type_id() != event_type),
                FlushPolicy::AllPending => queue.clear(),
            }
        }

        let Some(endpoints) = tables.interest.get_mut(&event_type) else {
            return;
        };
        endpoints.remove(&endpoint);
        if endpoints.is_empty() {
            tables.interest.remove(&event_type);
            self.report_unsubscribe(event_type);
        }
    }

    /// Number of envelopes queued for `endpoint` (inbound batch not included).
    pub fn pending(&self, endpoint: EndpointId) -> usize {
        self.tables
            .lock()
            .queues
            .get(&endpoint)
            .map_or(0, VecDeque::len)
    }

    /// Number of local endpoints subscribed to `event_type`.
    pub fn interested(&self, event_type: EventTypeId) -> usize {
        self.tables
            .lock()
            .interest
            .get(&event_type)
            .map_or(0, BTreeSet::len)
    }

    fn report_unsubscribe(&self, event_type: EventTypeId) {
        if let Some(pool) = self.pool() {
            if let Err(err) = pool.unsubscribe(self.context, event_type) {
                tracing::warn!(context = %self.context, error = err.as_label(), "unsubscribe failed: {err}");
            }
        }
        tracing::debug!(context = %self.context, event = event_type.name(), "context lost interest");
    }
}

impl std::fmt::Debug for Proxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Proxy")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ping(u32);
    struct Pong;

    fn ping_type() -> EventTypeId {
        EventTypeId::of::<Ping>()
    }

    fn setup(config: BusConfig) -> (Arc<Pool>, Arc<Proxy>, EndpointId, EndpointId) {
        let pool = Pool::new(config);
        let proxy = pool.attach(ContextId::next());
        let (a, b) = (EndpointId::next(), EndpointId::next());
        proxy.register(a);
        proxy.register(b);
        (pool, proxy, a, b)
    }

    fn publish<T: crate::Event>(proxy: &Proxy, from: EndpointId, event: T) {
        proxy.publish(from, Arc::new(Envelope::new(from, event)));
    }

    #[test]
    fn test_local_fan_out_skips_publisher() {
        let (_pool, proxy, a, b) = setup(BusConfig::default());
        proxy.subscribe(a, ping_type());
        proxy.subscribe(b, ping_type());

        publish(&proxy, a, Ping(1));
        assert!(proxy.pull(a).is_none());
        let got = proxy.pull(b).expect("b receives ping");
        assert_eq!(got.downcast_ref::<Ping>().map(|p| p.0), Some(1));
        assert!(proxy.pull(b).is_none());
    }

    #[test]
    fn test_interest_transitions_reach_pool() {
        let (pool, proxy, a, b) = setup(BusConfig::default());
        let ctx = proxy.context();

        proxy.subscribe(a, ping_type());
        proxy.subscribe(b, ping_type());
        assert!(pool.is_interested(ctx, ping_type()));
        assert_eq!(proxy.interested(ping_type()), 2);

        proxy.unsubscribe(a, ping_type());
        assert!(pool.is_interested(ctx, ping_type()));
        proxy.unsubscribe(b, ping_type());
        assert!(!pool.is_interested(ctx, ping_type()));
        assert_eq!(proxy.interested(ping_type()), 0);
    }

    #[test]
    fn test_matching_type_flush_keeps_other_types() {
        let (_pool, proxy, a, b) = setup(BusConfig::default());
        proxy.subscribe(b, ping_type());
        proxy.subscribe(b, EventTypeId::of::<Pong>());

        publish(&proxy, a, Ping(1));
        publish(&proxy, a, Pong);
        publish(&proxy, a, Ping(2));
        assert_eq!(proxy.pending(b), 3);

        proxy.unsubscribe(b, ping_type());
        assert_eq!(proxy.pending(b), 1);
        assert!(proxy.pull(b).is_some_and(|e| e.is::<Pong>()));
    }

    #[test]
    fn test_all_pending_flush_clears_queue() {
        let (_pool, proxy, a, b) =
            setup(BusConfig::default().with_flush_policy(FlushPolicy::AllPending));
        proxy.subscribe(b, ping_type());
        proxy.subscribe(b, EventTypeId::of::<Pong>());

        publish(&proxy, a, Ping(1));
        publish(&proxy, a, Pong);
        proxy.unsubscribe(b, ping_type());
        assert_eq!(proxy.pending(b), 0);
    }

    #[test]
    fn test_inbound_without_interest_is_dropped() {
        let pool = Pool::new(BusConfig::default());
        let local = pool.attach(ContextId::next());
        let remote = pool.attach(ContextId::next());
        let (sub, publisher) = (EndpointId::next(), EndpointId::next());
        local.register(sub);
        remote.register(publisher);

        local.subscribe(sub, ping_type());
        publish(&remote, publisher, Ping(9));
        assert_eq!(pool.inbound_len(local.context()), 1);

        // Interest withdrawn before the batch is drained.
        local.unsubscribe(sub, ping_type());
        local.subscribe(sub, EventTypeId::of::<Pong>());
        assert!(local.pull(sub).is_none());
        assert_eq!(pool.inbound_len(local.context()), 0);
    }

    #[test]
    fn test_pool_is_not_kept_alive_by_its_proxies() {
        let (pool, proxy, a, b) = setup(BusConfig::default());
        proxy.subscribe(b, ping_type());
        let weak = Arc::downgrade(&pool);
        drop(pool);

        assert!(weak.upgrade().is_none());
        assert!(proxy.pool().is_none());
        publish(&proxy, a, Ping(3));
        assert!(proxy.pull(b).is_some_and(|e| e.is::<Ping>()));
        assert!(proxy.pull(b).is_none());
        proxy.unsubscribe(b, ping_type());
    }

    #[test]
    fn test_deregister_withdraws_interest() {
        let (pool, proxy, a, _b) = setup(BusConfig::default());
        proxy.subscribe(a, ping_type());
        proxy.deregister(a);
        assert!(!pool.is_interested(proxy.context(), ping_type()));
        assert!(proxy.pull(a).is_none());
    }
}
