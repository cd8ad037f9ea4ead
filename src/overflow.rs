//! Ring-plus-spill queue for graceful overflow.

use crate::deque::{Stealer, Worker};

/// A bounded stealable ring backed by an owner-private spill stack.
///
/// Tasks are saved to the ring while it has room, because only ring
/// tasks are visible to thieves; the spill stack takes the excess.
/// Draining prefers the spill: it is LIFO, cheap, and keeps the most
/// recently saved tasks hot, and thieves could never take its content
/// anyway.
///
/// The spill stack is owned by the worker thread, so all operations that
/// may touch it take `&mut self`.
#[derive(Debug)]
pub struct OverflowWorker<T> {
    ring: Worker<T>,
    spill: Vec<T>,
}

impl<T: Copy> OverflowWorker<T> {
    /// Creates an overflow queue over a ring of the default capacity.
    pub fn new() -> Self {
        OverflowWorker {
            ring: Worker::new(),
            spill: Vec::new(),
        }
    }

    /// Creates an overflow queue over a ring with room for at least
    /// `min_capacity` slots (see [`Worker::with_capacity`]).
    pub fn with_capacity(min_capacity: usize) -> Self {
        OverflowWorker {
            ring: Worker::with_capacity(min_capacity),
            spill: Vec::new(),
        }
    }

    /// Saves a task, preferring the stealable ring over the spill stack.
    pub fn save(&mut self, task: T) {
        if let Err(task) = self.ring.push(task) {
            self.spill.push(task);
        }
    }

    /// Takes back a task, preferring the spill stack over the ring.
    pub fn retrieve(&mut self) -> Option<T> {
        self.retrieve_from_spill().or_else(|| self.retrieve_from_ring())
    }

    /// Takes back a task from the stealable ring only.
    pub fn retrieve_from_ring(&mut self) -> Option<T> {
        self.ring.pop()
    }

    /// Takes back a task from the spill stack only.
    pub fn retrieve_from_spill(&mut self) -> Option<T> {
        self.spill.pop()
    }

    /// Returns `true` if both the ring and the spill stack are empty.
    pub fn is_empty(&self) -> bool {
        self.spill.is_empty() && self.ring.is_empty()
    }

    /// Returns `true` if the stealable ring is empty.
    pub fn ring_is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Returns `true` if the spill stack is empty.
    pub fn spill_is_empty(&self) -> bool {
        self.spill.is_empty()
    }

    /// Number of tasks currently exposed to thieves.
    pub fn stealable_size(&self) -> usize {
        self.ring.size()
    }

    /// Creates a new `Stealer` handle for the ring.
    ///
    /// Thieves only ever see the ring; spilled tasks stay private to the
    /// owner until they are retrieved.
    pub fn stealer(&self) -> Stealer<T> {
        self.ring.stealer()
    }

    /// The underlying stealable ring.
    pub fn ring(&self) -> &Worker<T> {
        &self.ring
    }
}

impl<T: Copy> Default for OverflowWorker<T> {
    fn default() -> Self {
        Self::new()
    }
}
