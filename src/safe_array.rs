//! A thread-safe decorator over any [`IndexedArray`].
//!
//! [`SafeIndexedArray`] owns the wrapped array inside a [`ThreadGate`] and
//! runs every operation under the matching engagement: reads take a shared
//! hold, writes close the gate. Each call is one atomic step; sequences of
//! calls interleave with other threads unless the caller widens the scope
//! by taking a sentry from [`gate`] first, in which case the per-call
//! engagements are granted reentrantly inside it. Widening a *write*
//! sequence requires the close sentry; shared holds do not trade up, so a
//! write call made under the caller's own enter sentry would wait on its
//! own hold.
//!
//! Iteration cannot pin the underlying cursor across calls without holding
//! the gate for the iterator's whole lifetime, so [`SafeIter`] trades the
//! snapshot guarantee away: it remembers only the position it yielded last
//! and asks the array for the nearest live entry past it, one shared hold
//! per step. Concurrent mutation never invalidates it, but entries added
//! behind the position are missed and entries removed ahead of it are
//! skipped. Callers who need a frozen view take the close sentry and
//! iterate the underlying array directly.
//!
//! [`gate`]: SafeIndexedArray::gate

use core::cell::UnsafeCell;
use core::fmt;

use crate::indexed_array::{Direction, IndexedArray, NOT_FOUND};
use crate::simple_array::SimpleArray;
use crate::thread_gate::ThreadGate;

/// Storage shim giving [`SafeIndexedArray`] interior mutability behind the
/// gate. Opaque on purpose: the gate's sentries deref to this cell, and
/// all the cell offers them is a synchronization scope.
pub struct ArrayCell<A> {
    cell: UnsafeCell<A>,
}

// SAFETY: the cell itself grants no access; the only references into it
// are minted by the decorator below under the owning gate's protocol,
// shared references under shared holds and the exclusive reference under
// the closed gate. The bounds mirror a lock's: sharing the cell across
// threads hands out `&A` concurrently and `&mut A` from whichever thread
// closes.
unsafe impl<A: Send + Sync> Sync for ArrayCell<A> {}

impl<A> ArrayCell<A> {
    fn new(array: A) -> Self {
        Self {
            cell: UnsafeCell::new(array),
        }
    }

    /// # Safety
    ///
    /// The caller must hold a shared or exclusive engagement on the gate
    /// owning this cell for the whole lifetime of the reference.
    unsafe fn shared(&self) -> &A {
        &*self.cell.get()
    }

    /// # Safety
    ///
    /// The caller must hold the gate closed for the whole lifetime of the
    /// reference, and no other reference into the cell may be live. Within
    /// this crate that holds because every path into the cell runs through
    /// [`SafeIndexedArray::read`] or [`SafeIndexedArray::write`], whose
    /// references die inside the call and whose closures never reenter the
    /// decorator.
    #[allow(clippy::mut_from_ref)]
    unsafe fn exclusive(&self) -> &mut A {
        &mut *self.cell.get()
    }

    fn get_mut(&mut self) -> &mut A {
        self.cell.get_mut()
    }

    fn into_inner(self) -> A {
        self.cell.into_inner()
    }
}

impl<A> fmt::Debug for ArrayCell<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayCell").finish_non_exhaustive()
    }
}

/// Gate-synchronized wrapper running every array operation under the
/// right engagement. See the [module docs](self) for the atomicity and
/// iteration contract.
pub struct SafeIndexedArray<A> {
    gate: ThreadGate<ArrayCell<A>>,
}

/// The common pairing of the decorator with the dense array.
pub type SafeSimpleArray<V> = SafeIndexedArray<SimpleArray<V>>;

impl<A> SafeIndexedArray<A> {
    /// Wraps `array` behind a fresh open gate.
    pub fn new(array: A) -> Self {
        Self {
            gate: ThreadGate::new(ArrayCell::new(array)),
        }
    }

    /// The gate guarding the array, for widening atomicity beyond a single
    /// call: take a sentry, then make the calls inside its scope. Write
    /// calls compose only under the close sentry.
    pub fn gate(&self) -> &ThreadGate<ArrayCell<A>> {
        &self.gate
    }

    /// Direct mutable access; sound because the exclusive receiver proves
    /// no other thread or scope can observe the array.
    pub fn get_mut(&mut self) -> &mut A {
        self.gate.get_mut().get_mut()
    }

    /// Consumes the wrapper and returns the array.
    pub fn into_inner(self) -> A {
        self.gate.into_inner().into_inner()
    }

    /// Runs `op` on the array under a shared hold.
    fn read<T>(&self, op: impl FnOnce(&A) -> T) -> T {
        let sentry = self.gate.enter();
        // SAFETY: the sentry holds a shared engagement for the whole call
        // and the reference dies inside it.
        op(unsafe { sentry.shared() })
    }

    /// Runs `op` on the array under the closed gate.
    fn write<T>(&self, op: impl FnOnce(&mut A) -> T) -> T {
        let sentry = self.gate.close();
        // SAFETY: the sentry holds the gate closed for the whole call, the
        // reference dies inside it, and `op` is a leaf array operation
        // that cannot reach this cell again.
        op(unsafe { sentry.exclusive() })
    }
}

impl<A: IndexedArray> SafeIndexedArray<A> {
    /// Clone of the value at `index`, if an entry exists there.
    pub fn get(&self, index: i64) -> Option<A::Value>
    where
        A::Value: Clone,
    {
        self.read(|array| array.get(index).cloned())
    }

    /// Stores `value` at `index`, returning the value displaced.
    pub fn set(&self, index: i64, value: A::Value) -> Option<A::Value> {
        self.write(|array| array.set(index, value))
    }

    /// Removes the entry at `index`, returning its value.
    pub fn remove(&self, index: i64) -> Option<A::Value> {
        self.write(|array| array.remove(index))
    }

    /// Appends `value` after the last entry and returns its index.
    pub fn add(&self, value: A::Value) -> i64 {
        self.write(|array| array.add(value))
    }

    /// Removes every entry with index in `from..to`.
    pub fn remove_range(&self, from: i64, to: i64) {
        self.write(|array| array.remove_range(from, to));
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.write(IndexedArray::clear);
    }

    /// Whether an entry exists at `index`.
    pub fn exists(&self, index: i64) -> bool {
        self.read(|array| array.exists(index))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.read(IndexedArray::len)
    }

    /// Whether the array holds no entries.
    pub fn is_empty(&self) -> bool {
        self.read(IndexedArray::is_empty)
    }

    /// Lowest occupied index, or [`NOT_FOUND`] when empty.
    pub fn first_index(&self) -> i64 {
        self.read(IndexedArray::first_index)
    }

    /// Highest occupied index, or [`NOT_FOUND`] when empty.
    pub fn last_index(&self) -> i64 {
        self.read(IndexedArray::last_index)
    }

    /// Highest occupied index at or below `index`, or [`NOT_FOUND`].
    pub fn floor_index(&self, index: i64) -> i64 {
        self.read(|array| array.floor_index(index))
    }

    /// Clone of the value at [`floor_index`](Self::floor_index).
    pub fn floor(&self, index: i64) -> Option<A::Value>
    where
        A::Value: Clone,
    {
        self.read(|array| array.floor(index).cloned())
    }

    /// Lowest occupied index at or above `index`, or [`NOT_FOUND`].
    pub fn ceiling_index(&self, index: i64) -> i64 {
        self.read(|array| array.ceiling_index(index))
    }

    /// Clone of the value at [`ceiling_index`](Self::ceiling_index).
    pub fn ceiling(&self, index: i64) -> Option<A::Value>
    where
        A::Value: Clone,
    {
        self.read(|array| array.ceiling(index).cloned())
    }

    /// Lowest index holding `value`, or [`NOT_FOUND`].
    pub fn index_of(&self, value: &A::Value) -> i64
    where
        A::Value: PartialEq,
    {
        self.read(|array| array.index_of(value))
    }

    /// Lowest index at or above `from` holding `value`, or [`NOT_FOUND`].
    pub fn index_of_from(&self, value: &A::Value, from: i64) -> i64
    where
        A::Value: PartialEq,
    {
        self.read(|array| array.index_of_from(value, from))
    }

    /// Highest index holding `value`, or [`NOT_FOUND`].
    pub fn last_index_of(&self, value: &A::Value) -> i64
    where
        A::Value: PartialEq,
    {
        self.read(|array| array.last_index_of(value))
    }

    /// Highest index at or below `to` holding `value`, or [`NOT_FOUND`].
    pub fn last_index_of_from(&self, value: &A::Value, to: i64) -> i64
    where
        A::Value: PartialEq,
    {
        self.read(|array| array.last_index_of_from(value, to))
    }

    /// Whether any entry holds `value`.
    pub fn contains(&self, value: &A::Value) -> bool
    where
        A::Value: PartialEq,
    {
        self.read(|array| array.contains(value))
    }

    /// Snapshot of the occupied indices in ascending order.
    pub fn indices(&self) -> Vec<i64> {
        self.read(IndexedArray::indices)
    }

    /// Iterates entries in ascending index order.
    pub fn iter(&self) -> SafeIter<'_, A> {
        self.iter_from(i64::MIN)
    }

    /// Iterates entries with index at or above `index`, ascending.
    pub fn iter_from(&self, index: i64) -> SafeIter<'_, A> {
        SafeIter::new(self, Direction::Forward, index)
    }

    /// Iterates entries in descending index order.
    pub fn iter_rev(&self) -> SafeIter<'_, A> {
        self.iter_rev_from(i64::MAX)
    }

    /// Iterates entries with index at or below `index`, descending.
    pub fn iter_rev_from(&self, index: i64) -> SafeIter<'_, A> {
        SafeIter::new(self, Direction::Reverse, index)
    }
}

impl<A: Default> Default for SafeIndexedArray<A> {
    fn default() -> Self {
        Self::new(A::default())
    }
}

impl<A> From<A> for SafeIndexedArray<A> {
    fn from(array: A) -> Self {
        Self::new(array)
    }
}

impl<A> fmt::Debug for SafeIndexedArray<A>
where
    A: IndexedArray,
    A::Value: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.read(|array| array.fmt_entries(f))
    }
}

/// Position-chasing iterator over a [`SafeIndexedArray`].
///
/// Holds no engagement between steps. Each [`next`] takes one shared hold,
/// finds the nearest live entry past the last yielded position, and clones
/// its value out; the clone is also cached so [`index`] and [`value`]
/// answer without touching the gate. See the [module docs](self) for what
/// concurrent mutation does and does not guarantee.
///
/// [`next`]: Iterator::next
/// [`index`]: SafeIter::index
/// [`value`]: SafeIter::value
pub struct SafeIter<'a, A: IndexedArray> {
    array: &'a SafeIndexedArray<A>,
    direction: Direction,
    /// Next position to probe from; `None` once exhausted.
    probe: Option<i64>,
    /// Entry yielded last, unless [`remove`](SafeIter::remove) consumed it.
    current: Option<(i64, A::Value)>,
}

impl<'a, A: IndexedArray> SafeIter<'a, A> {
    fn new(array: &'a SafeIndexedArray<A>, direction: Direction, from: i64) -> Self {
        Self {
            array,
            direction,
            probe: Some(from),
            current: None,
        }
    }

    /// Index of the entry yielded last.
    ///
    /// # Panics
    ///
    /// Panics if the iterator has not yielded an entry yet, is exhausted,
    /// or the entry was consumed by [`remove`](SafeIter::remove).
    pub fn index(&self) -> i64 {
        match &self.current {
            Some((index, _)) => *index,
            None => panic!("iterator is not positioned on an entry"),
        }
    }

    /// Cached value of the entry yielded last.
    ///
    /// # Panics
    ///
    /// Panics under the same conditions as [`index`](SafeIter::index).
    pub fn value(&self) -> &A::Value {
        match &self.current {
            Some((_, value)) => value,
            None => panic!("iterator is not positioned on an entry"),
        }
    }

    /// Stores `value` at the position yielded last, returning the value
    /// displaced. Returns `None` when another thread removed the entry in
    /// the meantime; the store still takes effect.
    ///
    /// # Panics
    ///
    /// Panics under the same conditions as [`index`](SafeIter::index).
    pub fn set_value(&mut self, value: A::Value) -> Option<A::Value>
    where
        A::Value: Clone,
    {
        let index = self.index();
        let previous = self.array.set(index, value.clone());
        self.current = Some((index, value));
        previous
    }

    /// Removes the entry yielded last, returning its value. Returns `None`
    /// when another thread removed it first. The iterator is no longer
    /// positioned afterwards; advancing it continues past the position.
    ///
    /// # Panics
    ///
    /// Panics under the same conditions as [`index`](SafeIter::index).
    pub fn remove(&mut self) -> Option<A::Value> {
        let index = self.index();
        self.current = None;
        self.array.remove(index)
    }
}

impl<A> Iterator for SafeIter<'_, A>
where
    A: IndexedArray,
    A::Value: Clone,
{
    type Item = (i64, A::Value);

    fn next(&mut self) -> Option<Self::Item> {
        let from = self.probe?;
        let direction = self.direction;
        let step = self.array.read(|array| {
            let index = match direction {
                Direction::Forward => array.ceiling_index(from),
                Direction::Reverse => array.floor_index(from),
            };
            match index {
                NOT_FOUND => None,
                // The value is cloned under the same hold as the probe so
                // the pair is consistent.
                index => array.get(index).map(|value| (index, value.clone())),
            }
        });
        match step {
            Some((index, value)) => {
                self.probe = match direction {
                    Direction::Forward => index.checked_add(1),
                    Direction::Reverse => index.checked_sub(1),
                };
                self.current = Some((index, value.clone()));
                Some((index, value))
            }
            None => {
                self.probe = None;
                self.current = None;
                None
            }
        }
    }
}
