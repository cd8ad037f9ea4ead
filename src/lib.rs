//! # Stealq — stealable task queues for cooperating worker pools
//!
//! A work-stealing substrate for pools of worker threads that chew
//! through a large, dynamically growing work set. Each worker owns a
//! bounded ring deque: it pushes and pops at the local end in LIFO order
//! with no read-modify-write operations, while idle peers steal single
//! tasks from the opposite end in FIFO order through a tagged
//! compare-and-swap. On top of the queues sit a [`QueueSet`] implementing
//! randomized victim selection, an [`OverflowWorker`] that spills to an
//! owner-private stack when a ring fills up, and a [`Terminator`] that
//! detects quiescence of the whole pool.
//!
//! Tasks must be trivially copyable, word-sized values (pointers, small
//! handles, indices): contested slots are read optimistically and the
//! losing copy is discarded.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use std::thread;
//! use stealq::{QueueSet, Terminator, VictimRng, Worker};
//!
//! // Two workers, one queue each.
//! let workers: Vec<Worker<u32>> = (0..2).map(|_| Worker::with_capacity(256)).collect();
//! let mut set = QueueSet::new(2);
//! for (i, worker) in workers.iter().enumerate() {
//!     set.register(i, worker.stealer());
//! }
//! let set = Arc::new(set);
//! let terminator = Arc::new(Terminator::new(2, set.clone()));
//!
//! // Worker 0 produces the whole work set; worker 1 lives off steals.
//! let threads: Vec<_> = workers
//!     .into_iter()
//!     .enumerate()
//!     .map(|(me, worker)| {
//!         let set = set.clone();
//!         let terminator = terminator.clone();
//!         thread::spawn(move || {
//!             let rng = VictimRng::new(me as i32 + 1);
//!             let mut done = 0;
//!             if me == 0 {
//!                 for task in 0..100 {
//!                     worker.push(task).unwrap();
//!                 }
//!             }
//!             loop {
//!                 while let Some(_task) = worker.pop().or_else(|| set.steal(me, &rng)) {
//!                     done += 1;
//!                 }
//!                 if terminator.offer_termination() {
//!                     return done;
//!                 }
//!             }
//!         })
//!     })
//!     .collect();
//!
//! let done: usize = threads.into_iter().map(|th| th.join().unwrap()).sum();
//! assert_eq!(done, 100);
//! ```

#![warn(missing_docs, missing_debug_implementations, unreachable_pub)]

mod config;
pub mod deque;
mod loom_exports;
pub mod overflow;
pub mod rng;
pub mod set;
pub mod terminator;

pub use config::{DEFAULT_CAPACITY, LOG_DEFAULT_CAPACITY};
pub use deque::{Stealer, Worker};
pub use overflow::OverflowWorker;
pub use rng::VictimRng;
pub use set::QueueSet;
pub use terminator::Terminator;

use core::fmt;

use config::{HalfWord, Word};

/// Error returned when a steal attempt fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StealError {
    /// The queue held no task.
    Empty,
    /// The task was claimed by the owner or another thief first.
    Contended,
}

impl fmt::Display for StealError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StealError::Empty => write!(f, "cannot steal from empty queue"),
            StealError::Contended => write!(f, "the task was claimed by another thread"),
        }
    }
}

#[inline]
/// Pack a `(tag, top)` pair into a single word, tag in the high half.
fn pack(tag: HalfWord, top: HalfWord) -> Word {
    (Word::from(tag) << HalfWord::BITS) | Word::from(top)
}

#[inline]
/// Unpack a word into its `(tag, top)` halves.
fn unpack(age: Word) -> (HalfWord, HalfWord) {
    ((age >> HalfWord::BITS) as HalfWord, age as HalfWord)
}
