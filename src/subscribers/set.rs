//! # SubscriptionSet: a group of subscriptions bound to one endpoint
//!
//! [`SubscriptionSet`] registers one handler object (or closure) per event
//! type and releases all of them together. It also keeps a handle to its
//! endpoint so the owner can publish replies.
//!
//! ## What it guarantees
//! - Each registration is released exactly once (on `clear` or drop).
//! - Registrations for the same type keep their insertion order.
//!
//! ## Diagram
//! ```text
//!   SubscriptionSet::new(&endpoint)
//!        ├── .on::<A, _>(&handler) ─► Subscription(A) ─► handler.on_event(&A)
//!        ├── .on::<B, _>(&handler) ─► Subscription(B) ─► handler.on_event(&B)
//!        └── .listen::<C, _>(|c| ..) ─► Subscription(C)
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use crate::core::{Endpoint, EndpointHandle};
use crate::events::Event;

use super::subscriber::{Subscriber, forward_to};
use super::subscription::Subscription;

/// Owned collection of [`Subscription`]s on one endpoint.
#[must_use = "every subscription in the set is released when it is dropped"]
pub struct SubscriptionSet {
    endpoint: EndpointHandle,
    subscriptions: Vec<Subscription>,
}

impl SubscriptionSet {
    /// Creates an empty set bound to `endpoint`.
    pub fn new(endpoint: &Endpoint) -> Self {
        Self {
            endpoint: endpoint.handle(),
            subscriptions: Vec::new(),
        }
    }

    /// Registers `handler` for events of type `E`.
    pub fn on<E, H>(self, handler: &Rc<RefCell<H>>) -> Self
    where
        E: Event,
        H: Subscriber<E> + 'static,
    {
        self.listen(forward_to::<E, H>(handler))
    }

    /// Registers a closure for events of type `E`.
    ///
    /// Ignored (with a warning) if the endpoint is already gone.
    pub fn listen<E, F>(mut self, callback: F) -> Self
    where
        E: Event,
        F: FnMut(&E) + 'static,
    {
        match self.endpoint.subscribe(callback) {
            Some(action) => self.subscriptions.push(Subscription::from_action(action)),
            None => {
                tracing::warn!(
                    endpoint = %self.endpoint.id(),
                    event = std::any::type_name::<E>(),
                    "endpoint closed, registration ignored"
                );
            }
        }
        self
    }

    /// Publishes through the bound endpoint. Returns `false` if it is gone.
    pub fn publish<T: Event>(&self, event: T) -> bool {
        self.endpoint.publish(event)
    }

    /// Handle of the bound endpoint.
    pub fn endpoint(&self) -> &EndpointHandle {
        &self.endpoint
    }

    /// Releases every subscription now.
    pub fn clear(&mut self) {
        self.subscriptions.clear();
    }

    /// True if the set holds no subscriptions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Number of subscriptions held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }
}

impl std::fmt::Debug for SubscriptionSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionSet")
            .field("endpoint", &self.endpoint.id())
            .field("subscriptions", &self.subscriptions)
            .finish()
    }
}
