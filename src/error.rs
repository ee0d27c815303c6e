//! Error types used by the relaybus routing core.
//!
//! The public surface (`subscribe`, `publish`, `dispatch`) never fails: every
//! contract edge (repeated unsubscribe, re-entrant dispatch, late events) has a
//! defined, silent outcome. [`BusError`] only covers [`Pool`](crate::Pool)
//! calls made on behalf of a context that is not attached.

use thiserror::Error;

use crate::core::ContextId;

/// # Errors produced by the pool registry.
///
/// Raised when a caller addresses a [`ContextId`] the pool has no entry for,
/// e.g. after its last endpoint detached.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// The context has no live endpoints attached to the pool.
    #[error("execution context {context} is not attached to the pool")]
    UnknownContext {
        /// The context that was addressed.
        context: ContextId,
    },
}

impl BusError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use relaybus::{BusError, ContextId};
    ///
    /// let err = BusError::UnknownContext { context: ContextId::next() };
    /// assert_eq!(err.as_label(), "bus_unknown_context");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            BusError::UnknownContext { .. } => "bus_unknown_context",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            BusError::UnknownContext { context } => format!("unknown context: {context}"),
        }
    }
}
