use crate::loom_exports::sync::atomic;

// The ring indices are 32-bit: `bottom` occupies a word of its own while
// `top` shares a word with the ABA tag. Both halves of that word must be
// updated by a single CAS, so the half-word width is pinned to 16 bits
// rather than selected per-target.
pub(crate) type HalfWord = u16;
pub(crate) type Word = u32;
pub(crate) type AtomicWord = atomic::AtomicU32;

/// Base-2 logarithm of the default ring capacity.
pub const LOG_DEFAULT_CAPACITY: u32 = 14;

/// Default ring capacity (16384 slots).
pub const DEFAULT_CAPACITY: usize = 1 << LOG_DEFAULT_CAPACITY;

// `top` is a half-word, so a ring can never be larger than what a
// half-word can index.
pub(crate) const MAX_CAPACITY: usize = 1 << HalfWord::BITS;

// A ring reserves two slots: one so that a full ring is distinguishable
// from an empty one, one as headroom for the pop/steal race on the last
// element. Anything smaller could not hold a single task.
pub(crate) const MIN_CAPACITY: usize = 4;
