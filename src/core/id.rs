//! Process-unique identifiers for endpoints and execution contexts.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ENDPOINT: AtomicU64 = AtomicU64::new(1);
static NEXT_CONTEXT: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_CONTEXT: ContextId = ContextId::next();
}

/// Identity of one [`Endpoint`](crate::Endpoint), never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EndpointId(u64);

impl EndpointId {
    /// Allocates a fresh id.
    pub fn next() -> Self {
        Self(NEXT_ENDPOINT.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ep-{}", self.0)
    }
}

/// Key of one execution context in the [`Pool`](crate::Pool).
///
/// Every endpoint attached under the same key shares one
/// [`Proxy`](crate::Proxy). A context must only be driven from one thread at
/// a time; [`current_thread`](Self::current_thread) gives the usual one
/// context per OS thread, [`next`](Self::next) lets a runtime hand out its own
/// keys (e.g. one per worker).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContextId(u64);

impl ContextId {
    /// Allocates a fresh context key.
    pub fn next() -> Self {
        Self(NEXT_CONTEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Context key of the calling OS thread, allocated on first call.
    pub fn current_thread() -> Self {
        THREAD_CONTEXT.with(|id| *id)
    }

    /// Raw numeric value.
    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(EndpointId::next(), EndpointId::next());
        assert_ne!(ContextId::next(), ContextId::next());
    }

    #[test]
    fn test_current_thread_is_stable_and_per_thread() {
        let here = ContextId::current_thread();
        assert_eq!(here, ContextId::current_thread());

        let there = thread::spawn(ContextId::current_thread).join().unwrap();
        assert_ne!(here, there);
    }
}
