//! Registry of stealable queues and victim-selection policies.

use crate::deque::Stealer;
use crate::rng::VictimRng;

/// An indexed set of stealable queues.
///
/// Each worker of a pool is assigned one slot, registered during pool
/// construction. Registration must be complete before any worker starts
/// running: the set is immutable afterwards and can be shared freely.
///
/// The set implements the victim-selection policies. The production
/// policy is [`steal_best_of_2`](QueueSet::steal_best_of_2), wrapped in
/// a bounded retry loop by [`steal`](QueueSet::steal);
/// [`steal_1_random`](QueueSet::steal_1_random) and
/// [`steal_best_of_all`](QueueSet::steal_best_of_all) are available as
/// alternatives.
#[derive(Debug)]
pub struct QueueSet<T> {
    stealers: Vec<Option<Stealer<T>>>,
}

impl<T: Copy> QueueSet<T> {
    /// Creates a set with `n_queues` unregistered slots.
    pub fn new(n_queues: usize) -> Self {
        QueueSet {
            stealers: (0..n_queues).map(|_| None).collect(),
        }
    }

    /// Registers the queue behind `stealer` at slot `index`.
    ///
    /// # Panics
    ///
    /// Panics if the index is out of range or the slot is already taken.
    pub fn register(&mut self, index: usize, stealer: Stealer<T>) {
        assert!(index < self.stealers.len(), "queue index out of range");
        assert!(
            self.stealers[index].is_none(),
            "queue slot registered twice"
        );

        self.stealers[index] = Some(stealer);
    }

    /// Number of slots in the set.
    pub fn len(&self) -> usize {
        self.stealers.len()
    }

    /// Returns `true` if the set has no slots.
    pub fn is_empty(&self) -> bool {
        self.stealers.is_empty()
    }

    /// The stealer registered at `index`.
    ///
    /// # Panics
    ///
    /// Panics if the slot was never registered.
    pub fn stealer(&self, index: usize) -> &Stealer<T> {
        match &self.stealers[index] {
            Some(stealer) => stealer,
            None => panic!("queue slot was never registered"),
        }
    }

    /// Returns `true` if any registered queue appears to hold work.
    ///
    /// Best-effort: the scan is not linearisable with respect to
    /// concurrent pushes and steals.
    pub fn peek(&self) -> bool {
        self.stealers.iter().flatten().any(|s| !s.is_empty())
    }

    /// Tries to steal a task for the worker at slot `me`, selecting
    /// victims with the production policy.
    ///
    /// Runs up to `2 * len()` rounds of
    /// [`steal_best_of_2`](QueueSet::steal_best_of_2) before giving up;
    /// per-round failures from races with other thieves are absorbed
    /// here.
    pub fn steal(&self, me: usize, rng: &VictimRng) -> Option<T> {
        for _ in 0..2 * self.stealers.len() {
            if let Some(task) = self.steal_best_of_2(me, rng) {
                return Some(task);
            }
        }

        None
    }

    /// Steals from the better-stocked of two distinct random victims.
    ///
    /// Both victims are drawn uniformly among the peers of `me`; their
    /// sizes are sampled and the larger one is attacked, ties going to
    /// the first. With two queues the peer is attacked directly; a lone
    /// queue has nobody to steal from.
    pub fn steal_best_of_2(&self, me: usize, rng: &VictimRng) -> Option<T> {
        let n = self.stealers.len();

        if n > 2 {
            let mut k1 = me;
            while k1 == me {
                k1 = rng.next_index(n);
            }
            let mut k2 = me;
            while k2 == me || k2 == k1 {
                k2 = rng.next_index(n);
            }

            let (s1, s2) = (self.stealer(k1), self.stealer(k2));
            let victim = if s2.size() > s1.size() { s2 } else { s1 };

            victim.steal().ok()
        } else if n == 2 {
            self.stealer((me + 1) % 2).steal().ok()
        } else {
            None
        }
    }

    /// Steals from one uniformly random victim.
    pub fn steal_1_random(&self, me: usize, rng: &VictimRng) -> Option<T> {
        let n = self.stealers.len();

        if n > 2 {
            let mut k = me;
            while k == me {
                k = rng.next_index(n);
            }

            self.stealer(k).steal().ok()
        } else if n == 2 {
            self.stealer((me + 1) % 2).steal().ok()
        } else {
            None
        }
    }

    /// Steals from the victim with the largest sampled size.
    ///
    /// Scans every peer of `me`; more accurate than
    /// [`steal_best_of_2`](QueueSet::steal_best_of_2) but linear in the
    /// size of the set, which makes it a poor fit for large pools of
    /// mostly-idle workers.
    pub fn steal_best_of_all(&self, me: usize) -> Option<T> {
        let n = self.stealers.len();

        if n > 2 {
            let mut best: Option<(usize, usize)> = None;
            for k in 0..n {
                if k == me {
                    continue;
                }
                let sz = self.stealer(k).size();
                if sz > best.map_or(0, |(_, best_sz)| best_sz) {
                    best = Some((k, sz));
                }
            }

            best.and_then(|(k, _)| self.stealer(k).steal().ok())
        } else if n == 2 {
            self.stealer((me + 1) % 2).steal().ok()
        } else {
            None
        }
    }
}
