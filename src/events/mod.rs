//! Events: type identity and the shared envelope.
//!
//! ## Contents
//! - [`EventTypeId`] process-wide identity of a concrete event type
//! - [`Event`] marker for publishable values
//! - [`Envelope`] immutable, `Arc`-shared carrier placed on routing queues
//!
//! See `core/mod.rs` for how envelopes travel between endpoints.

mod envelope;
mod identity;

pub use envelope::{Envelope, Event};
pub use identity::EventTypeId;
