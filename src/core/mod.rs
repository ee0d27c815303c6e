//! Routing core: pool, proxies and endpoints.
//!
//! ## Wiring
//! ```text
//!  context A (thread 1)                        context B (thread 2)
//! ┌──────────────────────────┐               ┌──────────────────────────┐
//! │ Endpoint a1   Endpoint a2│               │ Endpoint b1              │
//! │      │  publish    ▲     │               │      ▲ dispatch          │
//! │      ▼             │pull │               │      │ pull              │
//! │ ┌──────────────────────┐ │               │ ┌──────────────────────┐ │
//! │ │ Proxy(A)             │ │               │ │ Proxy(B)             │ │
//! │ │ interest / queues    │ │               │ │ interest / queues    │ │
//! │ └─────────┬────────────┘ │               │ └─────────▲────────────┘ │
//! └───────────┼──────────────┘               └───────────┼──────────────┘
//!             │ push(A, env)                             │ pull(B)
//!             ▼                                          │
//!      ┌──────────────────────────────────────────────────────────┐
//!      │ Pool: RwLock<HashMap<ContextId, ThreadContext>>          │
//!      │   B.interest ∋ type(env) ──► B.inbound.push_back(env)    │
//!      └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Internal modules:
//! - [`id`]: endpoint and context identifiers;
//! - [`pool`]: process-wide registry and cross-context fan-out;
//! - [`proxy`]: per-context routing tables and local fan-out;
//! - [`endpoint`]: the application-facing publish/subscribe/dispatch unit.

mod endpoint;
mod id;
mod pool;
mod proxy;

pub use endpoint::{Endpoint, EndpointHandle, UnsubscribeAction};
pub use id::{ContextId, EndpointId};
pub use pool::Pool;
pub use proxy::Proxy;
