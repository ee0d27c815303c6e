//! # Subscriber-side building blocks.
//!
//! ## Contents
//! - [`SubscriberList`] insertion-ordered slot arena with O(1) removal, used
//!   by every endpoint's subscription table
//! - [`Subscriber`] typed handler trait, one impl per observed event type
//! - [`Subscription`] scoped registration released exactly once
//! - [`SubscriptionSet`] a group of registrations for one handler object
//!
//! ## Architecture
//! ```text
//! Endpoint.table: EventTypeId ──► SubscriberList<callback>
//!                                      │
//!             Subscription ── handle ──┘   (drop → remove(handle))
//!                  ▲
//!           SubscriptionSet ── on::<E>(&handler) ──► Subscriber<E>::on_event
//! ```

mod list;
mod set;
mod subscriber;
mod subscription;

pub use list::{Iter, ListHandle, SubscriberList};
pub use set::SubscriptionSet;
pub use subscriber::Subscriber;
pub use subscription::Subscription;
