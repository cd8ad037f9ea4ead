//! Quiescence detection for a pool of stealing workers.

use core::sync::atomic::AtomicUsize;
use core::sync::atomic::Ordering::SeqCst;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::set::QueueSet;

// Number of pure yields before the first sleep.
const YIELD_STEPS: u32 = 8;
// Initial sleep, doubled on each further step.
const MIN_SLEEP: Duration = Duration::from_millis(1);
// Sleep cap.
const MAX_SLEEP: Duration = Duration::from_millis(16);

/// Yield/sleep staircase for idle offerers.
///
/// Starts with pure yields so an offerer stays responsive while its
/// peers finish their last tasks, then sleeps with doubling durations up
/// to a bound so that a long wait releases the CPU.
#[derive(Debug)]
struct Backoff {
    step: u32,
}

impl Backoff {
    fn new() -> Self {
        Backoff { step: 0 }
    }

    fn idle(&mut self) {
        if self.step < YIELD_STEPS {
            thread::yield_now();
        } else {
            let doublings = (self.step - YIELD_STEPS).min(4);
            thread::sleep((MIN_SLEEP * (1 << doublings)).min(MAX_SLEEP));
        }

        self.step = self.step.saturating_add(1);
    }
}

/// Coordinates the shutdown of a pool of cooperating workers.
///
/// A worker that finds its own queue empty and fails to steal offers to
/// terminate; the offer stands until either every worker has offered
/// (global quiescence) or some queue in the set shows work again, in
/// which case the offer is withdrawn and the worker resumes stealing.
///
/// The protocol is single-use: once a round has terminated, the
/// terminator must be re-armed with
/// [`reset_for_reuse`](Terminator::reset_for_reuse) before the next one.
#[derive(Debug)]
pub struct Terminator<T> {
    n_threads: usize,
    offered: AtomicUsize,
    queue_set: Arc<QueueSet<T>>,
}

impl<T: Copy> Terminator<T> {
    /// Creates a terminator for a pool of `n_threads` workers draining
    /// the queues of `queue_set`.
    pub fn new(n_threads: usize, queue_set: Arc<QueueSet<T>>) -> Self {
        Terminator {
            n_threads,
            offered: AtomicUsize::new(0),
            queue_set,
        }
    }

    /// Offers to terminate on behalf of a worker that has run out of
    /// work.
    ///
    /// Returns `true` once all workers have offered: the round is over
    /// and the caller must stop. Returns `false` if work reappeared in
    /// some queue: the offer has been withdrawn and the caller should go
    /// back to stealing.
    pub fn offer_termination(&self) -> bool {
        // The count must rise before the queues are polled. A worker
        // that publishes new work after this increment is guaranteed to
        // be noticed by the peek loop below, so an offerer cannot sleep
        // through the only wake-up it will get.
        self.offered.fetch_add(1, SeqCst);

        let mut backoff = Backoff::new();
        loop {
            if self.offered.load(SeqCst) == self.n_threads {
                return true;
            }

            if self.queue_set.peek() {
                self.offered.fetch_sub(1, SeqCst);
                return false;
            }

            backoff.idle();
        }
    }

    /// Re-arms the terminator for another round.
    ///
    /// The caller is responsible for making sure no worker is still
    /// inside [`offer_termination`](Terminator::offer_termination) when
    /// this is called.
    pub fn reset_for_reuse(&self) {
        self.offered.store(0, SeqCst);
    }

    /// Number of workers participating in the protocol.
    pub fn n_threads(&self) -> usize {
        self.n_threads
    }
}
