//! # Published events and their shared envelope.
//!
//! Any `'static + Send + Sync` value is an [`Event`]. Publishing wraps it in an
//! [`Envelope`] that records the type id, the publishing endpoint and a global
//! sequence number. One envelope is shared by `Arc` across every queue and
//! context that receives it and is never mutated after publish.
//!
//! ## Ordering guarantees
//! `seq` increases monotonically across the process. Delivery order is only
//! guaranteed per destination endpoint; `seq` is informational.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::EndpointId;
use crate::events::EventTypeId;

/// Global sequence counter for published envelopes.
static ENVELOPE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Marker for values that can travel through the bus.
///
/// Implemented for every thread-safe `'static` type.
pub trait Event: Any + Send + Sync + 'static {}

impl<T: Any + Send + Sync + 'static> Event for T {}

/// Immutable, type-erased event as it sits in routing queues.
pub struct Envelope {
    type_id: EventTypeId,
    origin: EndpointId,
    seq: u64,
    payload: Box<dyn Any + Send + Sync>,
}

impl Envelope {
    /// Wraps `event` as published by `origin`.
    pub fn new<T: Event>(origin: EndpointId, event: T) -> Self {
        Self {
            type_id: EventTypeId::of::<T>(),
            origin,
            seq: ENVELOPE_SEQ.fetch_add(1, Ordering::Relaxed) + 1,
            payload: Box::new(event),
        }
    }

    /// Identity of the payload's type.
    #[inline]
    pub fn type_id(&self) -> EventTypeId {
        self.type_id
    }

    /// Endpoint that published this event.
    #[inline]
    pub fn origin(&self) -> EndpointId {
        self.origin
    }

    /// Global publish sequence number (1-based).
    #[inline]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Borrows the payload as `T` if it is one.
    pub fn downcast_ref<T: Event>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }

    /// True if the payload is a `T`.
    pub fn is<T: Event>(&self) -> bool {
        self.payload.is::<T>()
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("type", &self.type_id.name())
            .field("origin", &self.origin)
            .field("seq", &self.seq)
            .finish_non_exhaustive()
    }
}
