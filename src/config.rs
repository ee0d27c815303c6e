//! # Bus configuration.
//!
//! Provides [`BusConfig`] centralized settings for a [`Pool`](crate::Pool)
//! and every [`Proxy`](crate::Proxy) it creates.
//!
//! Config is used in two ways:
//! 1. **Pool creation**: `Pool::new(config)`; the global pool uses the default.
//! 2. **Proxy defaults**: each proxy copies the pool's config on first attach.
//!
//! ## Sentinel values
//! - `queue_capacity = 0` → queues allocate lazily on first push

/// What happens to an endpoint's pending events when it unsubscribes from a type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FlushPolicy {
    /// Discard only the pending events of the unsubscribed type.
    ///
    /// Events of other types stay queued, in their original order.
    #[default]
    MatchingType,

    /// Discard every pending event of the endpoint, whatever its type.
    AllPending,
}

/// Configuration shared by a pool and its proxies.
///
/// ## Field semantics
/// - `flush_policy`: pending-event handling on unsubscribe
/// - `queue_capacity`: initial allocation of each per-endpoint and inbound queue
///   (not a bound; queues are unbounded)
#[derive(Clone, Debug)]
pub struct BusConfig {
    /// Pending-event handling when an endpoint drops interest in a type.
    pub flush_policy: FlushPolicy,

    /// Initial capacity of per-endpoint and inbound queues.
    ///
    /// - `0` = allocate lazily
    /// - `n > 0` = reserve room for `n` events up front
    pub queue_capacity: usize,
}

impl BusConfig {
    /// Returns the initial queue capacity as an `Option`.
    ///
    /// - `None` → allocate lazily
    /// - `Some(n)` → reserve `n` slots
    #[inline]
    pub fn initial_queue_capacity(&self) -> Option<usize> {
        if self.queue_capacity == 0 {
            None
        } else {
            Some(self.queue_capacity)
        }
    }

    /// Returns a copy with the given flush policy.
    #[must_use]
    pub fn with_flush_policy(mut self, policy: FlushPolicy) -> Self {
        self.flush_policy = policy;
        self
    }
}

impl Default for BusConfig {
    /// Default configuration:
    ///
    /// - `flush_policy = FlushPolicy::MatchingType`
    /// - `queue_capacity = 0` (lazy)
    fn default() -> Self {
        Self {
            flush_policy: FlushPolicy::default(),
            queue_capacity: 0,
        }
    }
}
