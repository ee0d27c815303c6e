//! # Insertion-ordered slot arena with O(1) removal by handle.
//!
//! [`SubscriberList`] stores values in a `Vec` of slots threaded into a doubly
//! linked chain by index. `append` returns a [`ListHandle`] that stays valid
//! until that entry is removed, regardless of other insertions or removals.
//!
//! ## Rules
//! - Iteration yields live entries in insertion order.
//! - `remove` is O(1) and never moves other entries.
//! - Freed slots are reused; each reuse bumps the slot generation, so a stale
//!   handle is rejected instead of hitting the new occupant.
//!
//! ```text
//! head ─► [2] ⇄ [0] ⇄ [3] ◄─ tail        free: [1]
//! ```

use std::fmt;

/// Opaque token identifying one entry of a [`SubscriberList`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListHandle {
    index: u32,
    generation: u32,
}

struct Node<T> {
    value: T,
    prev: Option<u32>,
    next: Option<u32>,
}

struct Slot<T> {
    generation: u32,
    node: Option<Node<T>>,
}

/// Append-only ordered collection with O(1) removal by handle.
pub struct SubscriberList<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    head: Option<u32>,
    tail: Option<u32>,
    len: usize,
}

impl<T> SubscriberList<T> {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    /// Inserts `value` at the tail and returns its handle.
    ///
    /// # Panics
    /// Panics if the list would need more than `u32::MAX` slots.
    pub fn append(&mut self, value: T) -> ListHandle {
        let node = Node {
            value,
            prev: self.tail,
            next: None,
        };

        let index = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(node);
                index
            }
            None => {
                let index = u32::try_from(self.slots.len()).expect("subscriber list exceeds u32::MAX slots");
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                index
            }
        };

        match self.tail {
            Some(tail) => self.node_mut(tail).next = Some(index),
            None => self.head = Some(index),
        }
        self.tail = Some(index);
        self.len += 1;

        ListHandle {
            index,
            generation: self.slots[index as usize].generation,
        }
    }

    /// Detaches the entry behind `handle` and returns its value.
    ///
    /// Returns `None` if the handle was already removed (or its slot reused).
    pub fn remove(&mut self, handle: ListHandle) -> Option<T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);

        match node.prev {
            Some(prev) => self.node_mut(prev).next = node.next,
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => self.node_mut(next).prev = node.prev,
            None => self.tail = node.prev,
        }

        self.free.push(handle.index);
        self.len -= 1;
        Some(node.value)
    }

    /// Borrows the value behind `handle` if it is still live.
    pub fn get(&self, handle: ListHandle) -> Option<&T> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.node.as_ref().map(|n| &n.value)
    }

    /// True if `handle` refers to a live entry.
    pub fn contains(&self, handle: ListHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Number of live entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if there are no live entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterates live values in insertion order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            cursor: self.head,
        }
    }

    /// Snapshot of live handles in insertion order.
    ///
    /// Lets a caller walk the entries while the list is being modified: each
    /// handle is re-checked with [`get`](Self::get) before use.
    pub fn handles(&self) -> Vec<ListHandle> {
        let mut out = Vec::with_capacity(self.len);
        let mut cursor = self.head;
        while let Some(index) = cursor {
            let slot = &self.slots[index as usize];
            out.push(ListHandle {
                index,
                generation: slot.generation,
            });
            cursor = slot.node.as_ref().and_then(|n| n.next);
        }
        out
    }

    fn node_mut(&mut self, index: u32) -> &mut Node<T> {
        match self.slots[index as usize].node.as_mut() {
            Some(node) => node,
            None => unreachable!("linked slot {index} is vacant"),
        }
    }
}

impl<T> Default for SubscriberList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for SubscriberList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Insertion-order iterator over a [`SubscriberList`].
pub struct Iter<'a, T> {
    list: &'a SubscriberList<T>,
    cursor: Option<u32>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.cursor?;
        let node = self.list.slots[index as usize].node.as_ref()?;
        self.cursor = node.next;
        Some(&node.value)
    }
}

impl<'a, T> IntoIterator for &'a SubscriberList<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
