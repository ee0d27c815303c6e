//! # Scoped subscription.
//!
//! [`Subscription`] owns the [`UnsubscribeAction`] returned by
//! `Endpoint::subscribe` and runs it exactly once: on drop, or earlier through
//! [`cancel`](Subscription::cancel).
//!
//! ```text
//! Subscription::new ──► Endpoint::subscribe ──► UnsubscribeAction
//!        │
//!        ├─ cancel(self) ──► action.invoke()
//!        └─ drop         ──► action.invoke()   (no-op if already run)
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::core::{Endpoint, UnsubscribeAction};
use crate::events::{Event, EventTypeId};

use super::subscriber::{Subscriber, forward_to};

/// Registration that removes itself from its endpoint when dropped.
#[must_use = "the subscription is released as soon as it is dropped"]
pub struct Subscription {
    action: UnsubscribeAction,
}

impl Subscription {
    /// Subscribes `callback` to `T` on `endpoint`.
    pub fn new<T, F>(endpoint: &Endpoint, callback: F) -> Self
    where
        T: Event,
        F: FnMut(&T) + 'static,
    {
        Self::from_action(endpoint.subscribe(callback))
    }

    /// Subscribes a shared handler object to `T` on `endpoint`.
    ///
    /// The handler is held weakly; once its last `Rc` is gone the
    /// subscription stays registered but does nothing.
    pub fn for_handler<T, H>(endpoint: &Endpoint, handler: &Rc<RefCell<H>>) -> Self
    where
        T: Event,
        H: Subscriber<T> + 'static,
    {
        Self::new(endpoint, forward_to::<T, H>(handler))
    }

    /// Takes ownership of an action obtained elsewhere (e.g. through an
    /// [`EndpointHandle`](crate::EndpointHandle)).
    pub fn from_action(action: UnsubscribeAction) -> Self {
        Self { action }
    }

    /// Type this subscription listens to.
    pub fn event_type(&self) -> EventTypeId {
        self.action.event_type()
    }

    /// True until released.
    pub fn is_active(&self) -> bool {
        self.action.is_pending()
    }

    /// Releases the subscription now.
    pub fn cancel(mut self) {
        self.action.invoke();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.action.invoke();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("event", &self.event_type().name())
            .field("active", &self.is_active())
            .finish()
    }
}
