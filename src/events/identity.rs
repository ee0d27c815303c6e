//! # Process-wide event type identity.
//!
//! Every concrete event type gets one [`EventTypeId`], assigned on first use
//! and stable for the life of the process. Ids are allocated from a global
//! counter under a write lock with a double check, so two threads racing on the
//! first use of the same type always observe the same id.
//!
//! ## Rules
//! - Same `T` → same id, on every thread.
//! - Different `T` → different ids; ids are never reused.
//! - Repeat lookups hit a per-thread memo and do not touch the shared lock.

use std::any::{TypeId, type_name};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroU64;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

/// Next id to hand out. Starts at 1 so ids fit in `NonZeroU64`.
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

static REGISTRY: LazyLock<RwLock<Registry>> = LazyLock::new(|| RwLock::new(Registry::default()));

thread_local! {
    static MEMO: RefCell<HashMap<TypeId, EventTypeId>> = RefCell::new(HashMap::new());
}

#[derive(Default)]
struct Registry {
    by_type: HashMap<TypeId, EventTypeId>,
    names: HashMap<EventTypeId, &'static str>,
}

/// Process-wide identity of a concrete event type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventTypeId(NonZeroU64);

impl EventTypeId {
    /// Returns the id of `T`, allocating it on first use.
    ///
    /// # Example
    /// ```
    /// use relaybus::EventTypeId;
    ///
    /// struct Ping;
    /// struct Pong;
    ///
    /// assert_eq!(EventTypeId::of::<Ping>(), EventTypeId::of::<Ping>());
    /// assert_ne!(EventTypeId::of::<Ping>(), EventTypeId::of::<Pong>());
    /// ```
    pub fn of<T: 'static>() -> Self {
        let key = TypeId::of::<T>();
        if let Some(id) = MEMO.with(|memo| memo.borrow().get(&key).copied()) {
            return id;
        }
        let id = Self::resolve(key, type_name::<T>());
        MEMO.with(|memo| memo.borrow_mut().insert(key, id));
        id
    }

    fn resolve(key: TypeId, name: &'static str) -> Self {
        if let Some(id) = REGISTRY.read().by_type.get(&key) {
            return *id;
        }

        let mut registry = REGISTRY.write();
        if let Some(id) = registry.by_type.get(&key) {
            return *id;
        }
        let raw = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        let id = match NonZeroU64::new(raw) {
            Some(n) => EventTypeId(n),
            None => unreachable!("event type id counter starts at 1"),
        };
        registry.by_type.insert(key, id);
        registry.names.insert(id, name);
        tracing::trace!(event = name, id = raw, "event type registered");
        id
    }

    /// Raw numeric value of the id.
    #[inline]
    pub fn get(self) -> u64 {
        self.0.get()
    }

    /// Rust type name the id was allocated for.
    pub fn name(self) -> &'static str {
        REGISTRY
            .read()
            .names
            .get(&self)
            .copied()
            .unwrap_or("<unregistered>")
    }
}

impl fmt::Display for EventTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name(), self.0)
    }
}
