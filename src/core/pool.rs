//! # Pool - process-wide registry of execution contexts.
//!
//! The pool keeps one [`ThreadContext`] per attached [`ContextId`] and moves
//! envelopes between contexts. It never delivers locally: fan-out inside one
//! context is the [`Proxy`]'s job.
//!
//! ## Architecture
//! ```text
//! Proxy(ctx-1).publish ──► Pool::push(ctx-1, env)
//!                              ├─► ctx-2 interested? ──► ctx-2.inbound.push_back(env)
//!                              ├─► ctx-3 interested? ──► skip
//!                              └─► ctx-1             ──► skip (origin)
//!
//! Proxy(ctx-2).pull ──► Pool::pull(ctx-2) ──► take(ctx-2.inbound)
//! ```
//!
//! ## Lock discipline
//! One `RwLock` over the registry:
//! - **shared**: `pull`, `subscribe`, `unsubscribe` (each touches only the
//!   caller's own entry, guarded by a per-entry `Mutex`)
//! - **exclusive**: `attach`, `detach` (resize the registry) and `push`
//!   (writes into other contexts' entries)
//!
//! ## Rules
//! - A context entry exists while its reference count is above zero.
//! - The interest set holds a type iff some endpoint of that context subscribes
//!   to it; proxies report only 0→1 and 1→0 transitions.
//! - The pool owns each context's proxy; a proxy refers back to the pool only
//!   weakly, so dropping the last user handle frees the pool even while
//!   endpoints are still attached.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, LazyLock};

use parking_lot::{Mutex, RwLock};

use crate::config::BusConfig;
use crate::core::ContextId;
use crate::core::proxy::Proxy;
use crate::error::BusError;
use crate::events::{Envelope, EventTypeId};

static GLOBAL: LazyLock<Arc<Pool>> = LazyLock::new(|| Pool::new(BusConfig::default()));

/// Pool-owned state of one execution context.
struct ThreadContext {
    /// Endpoints currently attached under this context.
    ref_count: usize,
    /// Shared router of this context.
    proxy: Arc<Proxy>,
    /// Envelopes published by other contexts, not yet pulled.
    inbound: Mutex<VecDeque<Arc<Envelope>>>,
    /// Types at least one local endpoint subscribes to.
    interest: Mutex<HashSet<EventTypeId>>,
}

/// Process-wide registry coordinating cross-context delivery.
pub struct Pool {
    config: BusConfig,
    contexts: RwLock<HashMap<ContextId, ThreadContext>>,
}

impl Pool {
    /// Creates an independent pool.
    ///
    /// Endpoints attached to different pools never see each other's events.
    pub fn new(config: BusConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            contexts: RwLock::new(HashMap::new()),
        })
    }

    /// The process-wide pool used by [`Endpoint::new`](crate::Endpoint::new).
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL)
    }

    /// Configuration this pool hands to its proxies.
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Registers one more endpoint under `context` and returns its proxy.
    ///
    /// The first attach creates the context entry.
    pub fn attach(self: &Arc<Self>, context: ContextId) -> Arc<Proxy> {
        let mut contexts = self.contexts.write();
        let entry = match contexts.entry(context) {
            Entry::Occupied(occupied) => occupied.into_mut(),
            Entry::Vacant(vacant) => {
                tracing::debug!(context = %context, "context attached");
                let inbound = self
                    .config
                    .initial_queue_capacity()
                    .map(VecDeque::with_capacity)
                    .unwrap_or_default();
                vacant.insert(ThreadContext {
                    ref_count: 0,
                    proxy: Arc::new(Proxy::new(self, context)),
                    inbound: Mutex::new(inbound),
                    interest: Mutex::new(HashSet::new()),
                })
            }
        };
        entry.ref_count += 1;
        Arc::clone(&entry.proxy)
    }

    /// Releases one endpoint of `context`; the last release erases the entry.
    pub fn detach(&self, context: ContextId) -> Result<(), BusError> {
        let mut contexts = self.contexts.write();
        let Some(entry) = contexts.get_mut(&context) else {
            return Err(BusError::UnknownContext { context });
        };
        entry.ref_count -= 1;
        if entry.ref_count == 0 {
            contexts.remove(&context);
            tracing::debug!(context = %context, "context detached");
        }
        Ok(())
    }

    /// Queues `envelope` for every context other than `origin` interested in its type.
    ///
    /// Returns the number of contexts reached.
    pub fn push(&self, origin: ContextId, envelope: &Arc<Envelope>) -> usize {
        let event_type = envelope.type_id();
        let mut contexts = self.contexts.write();
        let mut reached = 0;
        for (id, entry) in contexts.iter_mut() {
            if *id == origin || !entry.interest.get_mut().contains(&event_type) {
                continue;
            }
            entry.inbound.get_mut().push_back(Arc::clone(envelope));
            reached += 1;
        }
        reached
    }

    /// Takes every envelope queued for `context`, leaving its inbound queue empty.
    pub fn pull(&self, context: ContextId) -> Result<VecDeque<Arc<Envelope>>, BusError> {
        let contexts = self.contexts.read();
        let entry = contexts
            .get(&context)
            .ok_or(BusError::UnknownContext { context })?;
        Ok(std::mem::take(&mut *entry.inbound.lock()))
    }

    /// Marks `context` as interested in `event_type`.
    pub fn subscribe(&self, context: ContextId, event_type: EventTypeId) -> Result<(), BusError> {
        let contexts = self.contexts.read();
        let entry = contexts
            .get(&context)
            .ok_or(BusError::UnknownContext { context })?;
        entry.interest.lock().insert(event_type);
        Ok(())
    }

    /// Withdraws the interest of `context` in `event_type`.
    pub fn unsubscribe(
        &self,
        context: ContextId,
        event_type: EventTypeId,
    ) -> Result<(), BusError> {
        let contexts = self.contexts.read();
        let entry = contexts
            .get(&context)
            .ok_or(BusError::UnknownContext { context })?;
        entry.interest.lock().remove(&event_type);
        Ok(())
    }

    /// Number of attached contexts.
    pub fn context_count(&self) -> usize {
        self.contexts.read().len()
    }

    /// Number of endpoints attached under `context`, if it is attached.
    pub fn ref_count(&self, context: ContextId) -> Option<usize> {
        self.contexts.read().get(&context).map(|c| c.ref_count)
    }

    /// True if `context` has registered interest in `event_type`.
    pub fn is_interested(&self, context: ContextId, event_type: EventTypeId) -> bool {
        self.contexts
            .read()
            .get(&context)
            .map(|c| c.interest.lock().contains(&event_type))
            .unwrap_or(false)
    }

    /// Number of envelopes waiting in `context`'s inbound queue.
    pub fn inbound_len(&self, context: ContextId) -> usize {
        self.contexts
            .read()
            .get(&context)
            .map(|c| c.inbound.lock().len())
            .unwrap_or(0)
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("config", &self.config)
            .field("contexts", &self.context_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::EndpointId;

    struct Tick;
    struct Tock;

    fn envelope<T: crate::Event>(event: T) -> Arc<Envelope> {
        Arc::new(Envelope::new(EndpointId::next(), event))
    }

    #[test]
    fn test_attach_detach_ref_counting() {
        let pool = Pool::new(BusConfig::default());
        let ctx = ContextId::next();

        let p1 = pool.attach(ctx);
        let p2 = pool.attach(ctx);
        assert!(Arc::ptr_eq(&p1, &p2));
        assert_eq!(pool.ref_count(ctx), Some(2));

        pool.detach(ctx).unwrap();
        assert_eq!(pool.ref_count(ctx), Some(1));
        pool.detach(ctx).unwrap();
        assert_eq!(pool.ref_count(ctx), None);
        assert_eq!(pool.context_count(), 0);

        assert_eq!(
            pool.detach(ctx),
            Err(BusError::UnknownContext { context: ctx })
        );
    }

    #[test]
    fn test_push_skips_origin_and_uninterested() {
        let pool = Pool::new(BusConfig::default());
        let (a, b, c) = (ContextId::next(), ContextId::next(), ContextId::next());
        for ctx in [a, b, c] {
            pool.attach(ctx);
        }
        let tick = EventTypeId::of::<Tick>();
        pool.subscribe(a, tick).unwrap();
        pool.subscribe(b, tick).unwrap();

        assert_eq!(pool.push(a, &envelope(Tick)), 1);
        assert_eq!(pool.inbound_len(a), 0);
        assert_eq!(pool.inbound_len(b), 1);
        assert_eq!(pool.inbound_len(c), 0);

        assert_eq!(pool.push(a, &envelope(Tock)), 0);
    }

    #[test]
    fn test_pull_swaps_out_queue() {
        let pool = Pool::new(BusConfig::default());
        let (a, b) = (ContextId::next(), ContextId::next());
        pool.attach(a);
        pool.attach(b);
        pool.subscribe(b, EventTypeId::of::<Tick>()).unwrap();

        pool.push(a, &envelope(Tick));
        pool.push(a, &envelope(Tick));

        let batch = pool.pull(b).unwrap();
        assert_eq!(batch.len(), 2);
        assert!(batch[0].seq() < batch[1].seq());
        assert!(pool.pull(b).unwrap().is_empty());
    }

    #[test]
    fn test_unsubscribe_stops_future_pushes() {
        let pool = Pool::new(BusConfig::default());
        let (a, b) = (ContextId::next(), ContextId::next());
        pool.attach(a);
        pool.attach(b);
        let tick = EventTypeId::of::<Tick>();

        pool.subscribe(b, tick).unwrap();
        assert!(pool.is_interested(b, tick));
        pool.unsubscribe(b, tick).unwrap();
        assert!(!pool.is_interested(b, tick));

        assert_eq!(pool.push(a, &envelope(Tick)), 0);
    }

    #[test]
    fn test_unknown_context_errors() {
        let pool = Pool::new(BusConfig::default());
        let ghost = ContextId::next();
        let tick = EventTypeId::of::<Tick>();
        assert!(pool.pull(ghost).is_err());
        assert!(pool.subscribe(ghost, tick).is_err());
        assert!(pool.unsubscribe(ghost, tick).is_err());
    }
}
