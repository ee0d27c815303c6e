//! # Typed subscriber trait.
//!
//! Provides [`Subscriber`], an extension point for handler objects that react
//! to one or more event types. A type implements `Subscriber<E>` once per
//! event type it observes and is registered per type, either one at a time
//! with [`Subscription::for_handler`](crate::Subscription::for_handler) or as
//! a group with [`SubscriptionSet`](crate::SubscriptionSet).
//!
//! ## Rules
//! - Handlers run on the endpoint's thread, inside `dispatch`.
//! - The bus holds handlers weakly: dropping the last `Rc` stops delivery.
//! - A handler may publish through a captured [`EndpointHandle`](crate::EndpointHandle);
//!   nested `dispatch` on the same endpoint returns `false`.
//!
//! ## Example
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use relaybus::{BusConfig, ContextId, Endpoint, Pool, Subscriber, SubscriptionSet};
//!
//! struct Start;
//! struct Stop;
//!
//! #[derive(Default)]
//! struct Machine { running: bool }
//!
//! impl Subscriber<Start> for Machine {
//!     fn on_event(&mut self, _: &Start) { self.running = true; }
//! }
//! impl Subscriber<Stop> for Machine {
//!     fn on_event(&mut self, _: &Stop) { self.running = false; }
//! }
//!
//! let pool = Pool::new(BusConfig::default());
//! let ctx = ContextId::next();
//! let control = Endpoint::attach(&pool, ctx);
//! let worker = Endpoint::attach(&pool, ctx);
//!
//! let machine = Rc::new(RefCell::new(Machine::default()));
//! let _subs = SubscriptionSet::new(&worker)
//!     .on::<Start, _>(&machine)
//!     .on::<Stop, _>(&machine);
//!
//! control.publish(Start);
//! while worker.dispatch() {}
//! assert!(machine.borrow().running);
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use crate::events::{Event, EventTypeId};

/// Handler for events of type `E`.
pub trait Subscriber<E: Event> {
    /// Processes one event.
    ///
    /// Called synchronously from `Endpoint::dispatch`, in subscription order
    /// among the callbacks registered for `E`.
    fn on_event(&mut self, event: &E);
}

/// Adapts a shared handler into a plain callback holding it weakly.
pub(crate) fn forward_to<E, H>(handler: &Rc<RefCell<H>>) -> impl FnMut(&E) + 'static
where
    E: Event,
    H: Subscriber<E> + 'static,
{
    let weak = Rc::downgrade(handler);
    move |event: &E| {
        let Some(handler) = weak.upgrade() else {
            return;
        };
        match handler.try_borrow_mut() {
            Ok(mut h) => h.on_event(event),
            Err(_) => {
                tracing::warn!(
                    event = EventTypeId::of::<E>().name(),
                    handler = std::any::type_name::<H>(),
                    "handler already borrowed, event skipped"
                );
            }
        }
    }
}
