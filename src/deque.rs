//! Bounded, single-owner work-stealing deque with tagged steals.
//!
//! The owner pushes and pops at the "local" end of a fixed-size ring in
//! LIFO order through its [`Worker`] handle; any number of thieves pop at
//! the "global" end in FIFO order through shared [`Stealer`] handles. The
//! two ends meet only on the last task, where a compare-and-swap on a
//! tagged counter word arbitrates between the owner and the thieves.
//!
//! ## Example
//!
//! ```
//! use std::thread;
//! use stealq::Worker;
//!
//! // Push 4 tasks into a queue of capacity 256.
//! let worker = Worker::with_capacity(256);
//! for task in 0..4_u32 {
//!     worker.push(task).unwrap();
//! }
//!
//! // Steal tasks one by one, concurrently with the owner's pops.
//! let stealer = worker.stealer();
//! let thief = thread::spawn(move || {
//!     let mut stolen = 0;
//!     while stealer.steal().is_ok() {
//!         stolen += 1;
//!     }
//!     stolen
//! });
//!
//! let mut popped = 0;
//! while worker.pop().is_some() {
//!     popped += 1;
//! }
//!
//! // Every task went to exactly one of the two.
//! assert_eq!(popped + thief.join().unwrap(), 4);
//! ```

use core::mem::MaybeUninit;
use core::panic::{RefUnwindSafe, UnwindSafe};
use core::sync::atomic::Ordering::{Acquire, Relaxed, Release, SeqCst};

use std::sync::Arc;

use cache_padded::CachePadded;

use crate::config::{
    AtomicWord, HalfWord, Word, DEFAULT_CAPACITY, MAX_CAPACITY, MIN_CAPACITY,
};
use crate::loom_exports::cell::{self, UnsafeCell};
use crate::loom_exports::sync::atomic::fence;
use crate::loom_exports::{debug_or_loom_assert, debug_or_loom_assert_eq};
use crate::{pack, unpack, StealError};

/// Shared deque state.
///
/// The owner end is tracked by `bottom`, the ring index of the first free
/// slot. The thief end is tracked by `age`, a single atomic word packing
/// the index of the oldest task (`top`) with a monotonic `tag`. Thieves
/// advance `top` only through a CAS of the whole word, and the tag is
/// bumped whenever `top` wraps or is reset, so a CAS armed with a stale
/// snapshot cannot succeed against a recycled `top` value.
///
/// All index arithmetic is modulo the ring size `N`. The dirty size
/// `(bottom - top) mod N` ranges over `[0, N - 1]`; the value `N - 1`
/// only arises while the owner and a thief race for the last task and
/// reads as empty.
#[derive(Debug)]
struct Deque<T> {
    /// Ring index of the first free slot. Written by the owner only.
    bottom: CachePadded<AtomicWord>,

    /// Packed `(tag, top)` word.
    age: CachePadded<AtomicWord>,

    /// Ring slots. A slot is live iff its index lies in `[top, bottom)`,
    /// taken modulo the ring size.
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,

    /// Bit mask for index arithmetic modulo the ring size.
    mask: Word,
}

impl<T: Copy> Deque<T> {
    /// Ring size, a power of two.
    #[inline]
    fn capacity(&self) -> Word {
        self.mask + 1
    }

    /// Maximum number of tasks the ring accepts, two less than its size:
    /// one slot distinguishes a full ring from an empty one, one is
    /// headroom for the pop/steal race on the last task.
    #[inline]
    fn max_tasks(&self) -> Word {
        self.mask - 1
    }

    #[inline]
    fn next_index(&self, index: Word) -> Word {
        index.wrapping_add(1) & self.mask
    }

    #[inline]
    fn prev_index(&self, index: Word) -> Word {
        index.wrapping_sub(1) & self.mask
    }

    /// Task count as directly computed from a `(bottom, top)` pair,
    /// including the transient pseudo-empty value `N - 1`.
    #[inline]
    fn dirty_size(&self, bottom: Word, top: Word) -> Word {
        bottom.wrapping_sub(top) & self.mask
    }

    /// Task count with the pseudo-empty state folded to zero.
    #[inline]
    fn size(&self, bottom: Word, top: Word) -> Word {
        let sz = self.dirty_size(bottom, top);

        if sz == self.mask {
            0
        } else {
            sz
        }
    }

    /// Read the task at the given ring index.
    ///
    /// # Safety
    ///
    /// The slot must have been initialized by a prior `write_at`. The
    /// caller must either hold the slot (no concurrent writer) or be
    /// prepared to discard the value if its claim on the slot fails.
    #[inline]
    unsafe fn read_at(&self, index: Word) -> T {
        cell::read(&self.slots[index as usize]).assume_init()
    }

    /// Write a task at the given ring index.
    ///
    /// # Safety
    ///
    /// The slot must be free: its index must not lie in `[top, bottom)`.
    #[inline]
    unsafe fn write_at(&self, index: Word, item: T) {
        cell::write(&self.slots[index as usize], MaybeUninit::new(item));
    }
}

/// Handle for the owner's LIFO push and pop operations.
///
/// There is exactly one `Worker` per queue; it can be sent to the owner
/// thread but not shared or cloned.
#[derive(Debug)]
pub struct Worker<T> {
    deque: Arc<Deque<T>>,
}

impl<T: Copy> Worker<T> {
    /// Creates a queue with the default capacity of
    /// [`DEFAULT_CAPACITY`](crate::DEFAULT_CAPACITY) slots and returns
    /// its `Worker` handle.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a queue with room for at least `min_capacity` slots,
    /// rounded up to a power of two no smaller than 4.
    ///
    /// Two of the slots are reserved, so the queue accepts up to
    /// [`max_tasks`](Worker::max_tasks) tasks.
    ///
    /// # Panics
    ///
    /// Panics if the requested capacity exceeds what the half-word `top`
    /// index can address (65536 slots).
    pub fn with_capacity(min_capacity: usize) -> Self {
        assert!(
            min_capacity <= MAX_CAPACITY,
            "ring capacity cannot exceed {} slots",
            MAX_CAPACITY
        );
        let capacity = min_capacity.max(MIN_CAPACITY).next_power_of_two();

        let slots: Box<[_]> = (0..capacity)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect();

        let deque = Arc::new(Deque {
            bottom: CachePadded::new(AtomicWord::new(0)),
            age: CachePadded::new(AtomicWord::new(0)),
            slots,
            mask: (capacity - 1) as Word,
        });

        Worker { deque }
    }

    /// Creates a new `Stealer` handle for this queue.
    ///
    /// Any number of handles can be created, either with this method or
    /// by cloning an existing one.
    pub fn stealer(&self) -> Stealer<T> {
        Stealer {
            deque: self.deque.clone(),
        }
    }

    /// Ring size.
    pub fn capacity(&self) -> usize {
        self.deque.capacity() as usize
    }

    /// Maximum number of tasks the queue accepts, two less than the ring
    /// size.
    pub fn max_tasks(&self) -> usize {
        self.deque.max_tasks() as usize
    }

    /// Number of tasks currently in the queue.
    ///
    /// The count may be overestimated: `bottom` is exact on the owner
    /// thread, but the `top` snapshot can lag behind steals that have
    /// already completed, so tasks already taken by thieves may still be
    /// counted. It is never underestimated.
    pub fn size(&self) -> usize {
        let bottom = self.deque.bottom.load(Relaxed);
        let (_, top) = unpack(self.deque.age.load(Relaxed));

        self.deque.size(bottom, Word::from(top)) as usize
    }

    /// Returns `true` if the queue holds no task.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Appends a task at the owner end of the queue.
    ///
    /// # Errors
    ///
    /// The task is handed back if the ring is full; the caller decides
    /// whether to spill it (see
    /// [`OverflowWorker`](crate::OverflowWorker)) or apply backpressure.
    pub fn push(&self, item: T) -> Result<(), T> {
        // Plain load: `bottom` is only written by this thread.
        let bottom = self.deque.bottom.load(Relaxed);

        // Ordering: Acquire pairs with the Release of a successful steal
        // CAS. Seeing the advanced `top` therefore guarantees that the
        // winning thief is done reading the slots it released, so they
        // can be overwritten below.
        let (_, top) = unpack(self.deque.age.load(Acquire));

        let dirty = self.deque.dirty_size(bottom, Word::from(top));

        if dirty < self.deque.max_tasks() {
            unsafe { self.deque.write_at(bottom, item) };

            // Ordering: Release publishes the slot write; a thief that
            // observes the new `bottom` also observes the task.
            self.deque
                .bottom
                .store(self.deque.next_index(bottom), Release);
            Ok(())
        } else if dirty == self.deque.mask {
            // The pseudo-empty state holds no task, so the push can
            // proceed; reread `bottom` rather than trust the earlier
            // snapshot.
            let bottom = self.deque.bottom.load(Relaxed);
            unsafe { self.deque.write_at(bottom, item) };
            self.deque
                .bottom
                .store(self.deque.next_index(bottom), Release);
            Ok(())
        } else {
            Err(item)
        }
    }

    /// Removes the most recently pushed task, if any.
    pub fn pop(&self) -> Option<T> {
        let bottom = self.deque.bottom.load(Relaxed);
        let (_, top) = unpack(self.deque.age.load(Relaxed));

        let dirty = self.deque.dirty_size(bottom, Word::from(top));
        debug_or_loom_assert!(
            dirty != self.deque.mask,
            "pseudo-empty state visible outside the pop/steal race"
        );
        if dirty == 0 {
            return None;
        }

        let bottom = self.deque.prev_index(bottom);
        self.deque.bottom.store(bottom, Relaxed);

        // Ordering: the fence keeps the `age` load below from being
        // hoisted above the `bottom` store. Without that store-load
        // ordering a thief could take its size snapshot from the old
        // `bottom` and claim the slot this pop is about to read without
        // either side noticing. Release/Acquire cannot provide it, as it
        // spans a store and a later load on distinct locations.
        fence(SeqCst);

        let item = unsafe { self.deque.read_at(bottom) };

        let age = self.deque.age.load(Relaxed);
        let (_, top) = unpack(age);

        if self.deque.size(bottom, Word::from(top)) > 0 {
            // At least one task separates `top` from the slot just
            // claimed, so no thief can contest it.
            return Some(item);
        }

        // The ring held exactly one task; settle its ownership.
        self.pop_last(bottom, age, item)
    }

    /// Resolves the race for the last task: either this pop or a
    /// concurrent steal takes it, and the ring is left in the canonical
    /// empty state either way.
    fn pop_last(&self, bottom: Word, old_age: Word, item: T) -> Option<T> {
        let (tag, top) = unpack(old_age);

        // Canonical empty state for the current `bottom`. The tag bump
        // invalidates every thief snapshot predating the `bottom`
        // decrement: without it, a steal armed with such a snapshot
        // could succeed after a later push recycles this `top` value and
        // walk away with a slot it never observed.
        let new_age = pack(tag.wrapping_add(1), bottom as HalfWord);

        if Word::from(top) == bottom {
            // No thief has advanced `top` yet; race them for the task.
            //
            // Ordering: SeqCst on success puts this CAS in a single
            // total order with the steal CASes contending for the same
            // task.
            if self
                .deque
                .age
                .compare_exchange(old_age, new_age, SeqCst, Relaxed)
                .is_ok()
            {
                debug_or_loom_assert!(
                    self.deque.dirty_size(bottom, Word::from(unpack(self.deque.age.load(Relaxed)).1))
                        != self.deque.mask
                );
                return Some(item);
            }
        }

        // A thief won the task and left the ring pseudo-empty. Install
        // the canonical empty state so the next push takes the fast
        // path. The store cannot race with a steal: every thief now
        // computes a zero size and backs off before its CAS.
        self.deque.age.store(new_age, SeqCst);

        debug_or_loom_assert_eq!(
            self.deque.dirty_size(bottom, Word::from(unpack(self.deque.age.load(Relaxed)).1)),
            0
        );

        None
    }
}

impl<T: Copy> Default for Worker<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> UnwindSafe for Worker<T> {}
impl<T> RefUnwindSafe for Worker<T> {}
unsafe impl<T: Send> Send for Worker<T> {}

/// Handle for the thieves' FIFO steal operations.
///
/// Handles can be cloned and shared freely between threads.
#[derive(Debug)]
pub struct Stealer<T> {
    deque: Arc<Deque<T>>,
}

impl<T: Copy> Stealer<T> {
    /// Removes the oldest task in the queue, if any.
    ///
    /// Tasks are delivered at most once: when several thieves and the
    /// owner contend for the same task, exactly one of them obtains it.
    ///
    /// # Errors
    ///
    /// [`StealError::Empty`] if no task was available from the snapshot
    /// taken by this call, [`StealError::Contended`] if the task was
    /// claimed by the owner or another thief first. Either way the
    /// caller is expected to pick another victim and retry.
    pub fn steal(&self) -> Result<T, StealError> {
        // Ordering: Acquire pairs with the owner's canonicalisation
        // store so a reset `(top, tag)` pair is seen at the latest
        // together with the `bottom` it was derived from.
        let old_age = self.deque.age.load(Acquire);

        // Ordering: the fence keeps the `bottom` load below from being
        // reordered before the `age` snapshot; it is the counterpart of
        // the owner's store-load fence in `pop`.
        fence(SeqCst);

        // Ordering: Acquire pairs with the Release in `push`; every task
        // counted by the size computation below is fully written.
        let bottom = self.deque.bottom.load(Acquire);

        let (tag, top) = unpack(old_age);

        if self.deque.size(bottom, Word::from(top)) == 0 {
            return Err(StealError::Empty);
        }

        // The slot is read before the CAS that claims it. The owner
        // never overwrites a slot in `[top, bottom)`, and if the CAS
        // below fails the value is discarded, so a read from a slot
        // recycled in the meantime is never handed out.
        let item = unsafe { self.deque.read_at(Word::from(top)) };

        let new_top = self.deque.next_index(Word::from(top));

        // The tag moves with a wrapping `top`, otherwise a snapshot from
        // the previous lap around the ring could match the CAS on this
        // one.
        let new_age = if new_top == 0 {
            pack(tag.wrapping_add(1), 0)
        } else {
            pack(tag, new_top as HalfWord)
        };

        // Ordering: SeqCst on success publishes the claim in the same
        // total order as the owner's slow-path CAS, and its Release
        // component lets the owner's Acquire in `push` conclude that the
        // slot read above has completed before the slot is reused.
        match self
            .deque
            .age
            .compare_exchange(old_age, new_age, SeqCst, Relaxed)
        {
            Ok(_) => Ok(item),
            Err(_) => Err(StealError::Contended),
        }
    }

    /// Estimate of the number of tasks in the queue.
    ///
    /// The value is computed from a racy snapshot; it is only a hint for
    /// victim selection.
    pub fn size(&self) -> usize {
        let (_, top) = unpack(self.deque.age.load(Relaxed));
        let bottom = self.deque.bottom.load(Relaxed);

        self.deque.size(bottom, Word::from(top)) as usize
    }

    /// Returns `true` if the queue appears empty.
    ///
    /// Best-effort, like [`size`](Stealer::size): a `false` result may
    /// already be stale when it is returned.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }
}

impl<T> Clone for Stealer<T> {
    fn clone(&self) -> Self {
        Stealer {
            deque: self.deque.clone(),
        }
    }
}

impl<T> PartialEq for Stealer<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.deque, &other.deque)
    }
}

impl<T> Eq for Stealer<T> {}

impl<T> UnwindSafe for Stealer<T> {}
impl<T> RefUnwindSafe for Stealer<T> {}
unsafe impl<T: Send> Send for Stealer<T> {}
unsafe impl<T: Send> Sync for Stealer<T> {}
