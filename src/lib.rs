//! gated-array: Sparse arrays addressed by 64-bit indices, plus the
//! reentrant gate that makes them shareable across threads.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: build the thread-safe array in independent layers so each piece
//!   can be reasoned about (and reused) on its own.
//! - Layers:
//!   - IndexedArray (trait): the contract for a sparse ordered container
//!     keyed by `i64`, with a default layer that derives the searching and
//!     bulk operations from the two directional iterators every
//!     implementation provides.
//!   - SimpleArray<V>: dense storage over a slot buffer sized by the
//!     highest occupied index, with block-aligned growth and O(1) bounds
//!     queries. Fastest when occupied indices cluster near zero.
//!   - ThreadGate<R>: a reentrant shared/exclusive gate with a barring
//!     mode, scoped sentries, and bounded-wait variants of every
//!     acquisition. Useful on its own for any resource needing
//!     drain-before-exclusive coordination.
//!   - SafeIndexedArray<A>: the decorator pairing a gate with any
//!     IndexedArray, running reads under shared holds and writes under the
//!     closed gate, plus a position-chasing iterator that tolerates
//!     concurrent mutation.
//!
//! Constraints
//! - Indices are non-negative; `NOT_FOUND` (-1) is the universal "no such
//!   index" answer from every search. SimpleArray additionally caps
//!   indices at `MAX_INDEX`.
//! - Element-addressed operations treat an out-of-range index as caller
//!   error and panic; searches and iteration starting points clamp
//!   instead, so probing from -1 or past the end is well-defined.
//! - SimpleArray's buffer is proportional to the highest occupied index,
//!   not to the entry count. Sparse index patterns belong in a different
//!   IndexedArray implementation behind the same trait.
//! - The gate never evicts: exclusivity is granted by draining, and a bar
//!   keeps new threads out without touching the ones inside.
//!
//! Why this split?
//! - Localize invariants: the dense layer owns buffer geometry, the gate
//!   owns the engagement state machine, the decorator owns nothing but
//!   the pairing of the two.
//! - Minimize unsafe: the only unsafe code is the `ArrayCell` shim inside
//!   `safe_array`, two accessors whose callers are the decorator's own
//!   read/write helpers; the structural layers are safe Rust throughout.
//! - Keep the single-threaded path unpaid-for: SimpleArray used directly
//!   has no synchronization in it at all.
//!
//! Concurrency policy and interior mutability
//! - ThreadGate owns its resource and only ever shares it read-only;
//!   `&mut` access requires owning the gate (`get_mut`/`into_inner`).
//!   Reentrancy is the point of the gate, and a reentrant exclusive
//!   sentry handing out `&mut` twice would alias, so mutation under the
//!   protocol is delegated to the resource's own interior mutability.
//! - SafeIndexedArray supplies exactly that: ArrayCell mints a reference
//!   per call, inside the matching engagement, and the reference dies
//!   before the call returns.
//! - Every per-call engagement is granted reentrantly, so callers widen
//!   atomicity by taking a sentry from `gate()` around a sequence of
//!   calls. Shared holds do not trade up to exclusive; widening a write
//!   sequence means taking the close sentry.
//!
//! Index and growth semantics
//! - `add` appends at `last_index() + 1`, which lands at 0 on an empty
//!   array.
//! - SimpleArray grows to the 32-slot block containing the target index,
//!   with at least a quarter of the current capacity as headroom, and
//!   moves only the live span when it reallocates. `clear` releases the
//!   buffer outright.
//!
//! Notes and non-goals
//! - The gate tracks engagements per thread id and sentries are `!Send`;
//!   a hold belongs to the thread that took it, and dropping a sentry on
//!   another thread is not expressible.
//! - Threads blocked on a bar poll the bar owner's liveness and forcibly
//!   lift a bar whose owner terminated without releasing it. There is no
//!   such recovery for abandoned shared or exclusive holds; sentries make
//!   leaking one an explicit act (`mem::forget`).
//! - No persistence, no serialization, no async variants of the gate.
//! - SafeIter trades the snapshot guarantee for lock-free liveness; see
//!   `safe_array` for the exact contract.

pub mod indexed_array;
pub mod safe_array;
pub mod simple_array;
pub mod thread_gate;

// Public surface
pub use indexed_array::{IndexedArray, NOT_FOUND};
pub use safe_array::{ArrayCell, SafeIndexedArray, SafeIter, SafeSimpleArray};
pub use simple_array::{CursorMut, SimpleArray, MAX_INDEX};
pub use thread_gate::{BarSentry, CloseSentry, EnterSentry, ThreadGate};
