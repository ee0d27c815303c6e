//! # relaybus
//!
//! **relaybus** is an in-process publish/subscribe event bus for programs made
//! of many small, thread-bound actors.
//!
//! Actors register interest in typed events through an [`Endpoint`]; any
//! endpoint, on any thread, can publish; each interested endpoint receives the
//! event only when its owner calls [`Endpoint::dispatch`] on its own thread.
//! Events are never delivered back to the endpoint that published them.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐        ┌──────────────┐
//!     │  Endpoint a1 │   │  Endpoint a2 │        │  Endpoint b1 │
//!     │ (thread A)   │   │ (thread A)   │        │ (thread B)   │
//!     └──────┬───────┘   └──────▲───────┘        └──────▲───────┘
//!            │ publish          │ dispatch              │ dispatch
//!            ▼                  │                       │
//! ┌──────────────────────────────────────┐  ┌──────────────────────────┐
//! │  Proxy(A)                            │  │  Proxy(B)                │
//! │  - interest: type → {endpoints}      │  │  - interest              │
//! │  - queues:   endpoint → FIFO         │  │  - queues                │
//! └──────┬───────────────────────────────┘  └──────────▲───────────────┘
//!        │ push (other contexts)                       │ pull (drain inbound)
//!        ▼                                             │
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Pool (process-wide)                                              │
//! │  ContextId → ThreadContext { ref_count, proxy, inbound, interest }│
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Delivery
//! ```text
//! a1.publish(ev)
//!   ├─► Pool::push: every other context interested in type(ev) gets it inbound
//!   └─► Proxy(A): every other local endpoint interested in type(ev) gets it queued
//!
//! b1.dispatch()
//!   ├─► own queue empty? drain B's inbound into local queues
//!   ├─► pop one envelope; none → false
//!   └─► run every callback for its type, in subscription order → true
//! ```
//!
//! ## Features
//! | Area              | Description                                                      | Key types                                   |
//! |-------------------|------------------------------------------------------------------|---------------------------------------------|
//! | **Endpoints**     | Publish, subscribe and dispatch from one thread.                 | [`Endpoint`], [`EndpointHandle`]            |
//! | **Subscriptions** | Scoped registrations, typed handler objects, grouped release.    | [`Subscription`], [`Subscriber`], [`SubscriptionSet`] |
//! | **Routing**       | Per-context proxies and the cross-context pool.                  | [`Proxy`], [`Pool`], [`ContextId`]          |
//! | **Events**        | Process-wide type identity and shared envelopes.                 | [`EventTypeId`], [`Envelope`], [`Event`]    |
//! | **Configuration** | Queue allocation and unsubscribe flush policy.                   | [`BusConfig`], [`FlushPolicy`]              |
//! | **Errors**        | Pool calls on unattached contexts.                               | [`BusError`]                                |
//!
//! ## Example
//! ```rust
//! use std::sync::mpsc;
//! use std::thread;
//! use relaybus::{BusConfig, ContextId, Endpoint, Pool, Subscription};
//!
//! struct Ping(u32);
//!
//! let pool = Pool::new(BusConfig::default());
//! let (ready_tx, ready_rx) = mpsc::channel();
//! let (sent_tx, sent_rx) = mpsc::channel();
//!
//! let remote_pool = pool.clone();
//! let receiver = thread::spawn(move || {
//!     let endpoint = Endpoint::attach(&remote_pool, ContextId::current_thread());
//!     let got = std::rc::Rc::new(std::cell::Cell::new(0));
//!     let sink = got.clone();
//!     let _sub = Subscription::new(&endpoint, move |p: &Ping| sink.set(p.0));
//!     ready_tx.send(()).unwrap();
//!     sent_rx.recv().unwrap();
//!     assert!(endpoint.dispatch());
//!     got.get()
//! });
//!
//! let endpoint = Endpoint::attach(&pool, ContextId::current_thread());
//! ready_rx.recv().unwrap();
//! endpoint.publish(Ping(7));
//! sent_tx.send(()).unwrap();
//!
//! assert_eq!(receiver.join().unwrap(), 7);
//! assert!(!endpoint.dispatch());
//! ```
mod config;
mod core;
mod error;
mod events;
mod subscribers;

// ---- Public re-exports ----

pub use crate::config::{BusConfig, FlushPolicy};
pub use crate::core::{ContextId, Endpoint, EndpointHandle, EndpointId, Pool, Proxy, UnsubscribeAction};
pub use crate::error::BusError;
pub use crate::events::{Envelope, Event, EventTypeId};
pub use crate::subscribers::{Iter, ListHandle, SubscriberList, Subscriber, Subscription, SubscriptionSet};
