//! Dense array-backed implementation of [`IndexedArray`].
//!
//! Values live in a growable buffer of `Option` slots addressed directly by
//! index, which makes every keyed operation O(1) at the price of memory
//! proportional to the greatest occupied index. The intended use is small,
//! mostly-contiguous index ranges starting at or near zero; for that shape
//! this is the fastest representation there is.
//!
//! Two deliberate restrictions follow from the layout:
//!
//! * Indices are confined to `[0, MAX_INDEX]` (the non-negative 32-bit
//!   range). Keyed operations panic outside it; iteration starting points
//!   and search probes clamp instead, so navigation never panics.
//! * The empty slot state doubles as the absence sentinel, so the array
//!   cannot tell "no entry" from "entry holding nothing". [`set_opt`] makes
//!   the collapse explicit: writing `None` is exactly [`remove`].
//!
//! [`set_opt`]: SimpleArray::set_opt
//! [`remove`]: SimpleArray::remove

use core::fmt;
use core::hash::{Hash, Hasher};

use crate::indexed_array::{Direction, IndexedArray, NOT_FOUND};

/// Greatest index a [`SimpleArray`] can occupy.
pub const MAX_INDEX: i64 = i32::MAX as i64;

/// Slot-count ceiling implied by [`MAX_INDEX`].
const MAX_SLOTS: usize = MAX_INDEX as usize + 1;

/// Growth granularity: fresh capacity is always a multiple of this.
const SLOT_BLOCK: usize = 32;

/// Dense `i64`-indexed array.
///
/// Besides the [`IndexedArray`] contract it offers the Option-writing
/// primitive [`set_opt`] and mutating traversal through [`CursorMut`].
///
/// [`set_opt`]: SimpleArray::set_opt
pub struct SimpleArray<V> {
    /// Directly indexed storage; `None` is the absence sentinel.
    slots: Vec<Option<V>>,
    /// Smallest occupied index, `NOT_FOUND` when empty.
    first: i64,
    /// Greatest occupied index, `NOT_FOUND` when empty.
    last: i64,
    /// Occupied-slot count.
    count: usize,
}

impl<V> SimpleArray<V> {
    /// Creates an empty array that allocates on first write.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            first: NOT_FOUND,
            last: NOT_FOUND,
            count: 0,
        }
    }

    /// Creates an empty array with room for indices `0..capacity` before
    /// the first regrowth.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.min(MAX_SLOTS);
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots,
            first: NOT_FOUND,
            last: NOT_FOUND,
            count: 0,
        }
    }

    /// Stores or clears the slot at `index`: `Some` behaves exactly like
    /// [`set`], `None` behaves exactly like [`remove`]. Returns the
    /// displaced value.
    ///
    /// This is the layout's native write: slots are `Option<V>`, so an
    /// explicit empty write and a removal are indistinguishable.
    ///
    /// # Panics
    ///
    /// If `index` is negative or greater than [`MAX_INDEX`].
    ///
    /// [`set`]: IndexedArray::set
    /// [`remove`]: IndexedArray::remove
    pub fn set_opt(&mut self, index: i64, value: Option<V>) -> Option<V> {
        check_index(index);
        match value {
            Some(value) => self.store(index, value),
            None => self.erase(index),
        }
    }

    /// Mutating forward cursor over the whole array.
    pub fn cursor(&mut self) -> CursorMut<'_, V> {
        CursorMut::new(self, Direction::Forward, 0)
    }

    /// Mutating forward cursor starting at the smallest occupied index
    /// `>= index`.
    pub fn cursor_from(&mut self, index: i64) -> CursorMut<'_, V> {
        CursorMut::new(self, Direction::Forward, index)
    }

    /// Mutating reverse cursor over the whole array.
    pub fn cursor_rev(&mut self) -> CursorMut<'_, V> {
        CursorMut::new(self, Direction::Reverse, i64::MAX)
    }

    /// Mutating reverse cursor starting at the greatest occupied index
    /// `<= index`.
    pub fn cursor_rev_from(&mut self, index: i64) -> CursorMut<'_, V> {
        CursorMut::new(self, Direction::Reverse, index)
    }

    /// Slot write behind `set`/`set_opt`; index already validated.
    fn store(&mut self, index: i64, value: V) -> Option<V> {
        let offset = index as usize;
        if offset >= self.slots.len() {
            self.grow(offset);
        }
        let previous = self.slots[offset].replace(value);
        if previous.is_none() {
            self.count += 1;
            if self.first == NOT_FOUND || index < self.first {
                self.first = index;
            }
            if index > self.last {
                self.last = index;
            }
        }
        previous
    }

    /// Slot clear behind `remove`/`set_opt`; index already validated.
    fn erase(&mut self, index: i64) -> Option<V> {
        let offset = index as usize;
        if offset >= self.slots.len() {
            return None;
        }
        let previous = self.slots[offset].take()?;
        self.count -= 1;
        if self.count == 0 {
            self.first = NOT_FOUND;
            self.last = NOT_FOUND;
        } else {
            // A removed boundary advances inward to the next occupied slot;
            // the occupied count guarantees the scan terminates in range.
            if index == self.first {
                let mut probe = offset + 1;
                while self.slots[probe].is_none() {
                    probe += 1;
                }
                self.first = probe as i64;
            }
            if index == self.last {
                let mut probe = offset - 1;
                while self.slots[probe].is_none() {
                    probe -= 1;
                }
                self.last = probe as i64;
            }
        }
        Some(previous)
    }

    /// Reallocates so that slot `offset` exists.
    ///
    /// Fresh capacity is the larger of the 32-aligned block containing the
    /// target and the current capacity plus a quarter, capped at the slot
    /// ceiling. Only the occupied span `[first, last]` moves across, so the
    /// cost tracks live data rather than capacity.
    fn grow(&mut self, offset: usize) {
        let capacity = self.slots.len();
        let aligned = (offset / SLOT_BLOCK + 1) * SLOT_BLOCK;
        let padded = capacity + capacity / 4;
        let grown = aligned.max(padded).min(MAX_SLOTS);
        let mut slots: Vec<Option<V>> = Vec::with_capacity(grown);
        slots.resize_with(grown, || None);
        if self.count > 0 {
            let lo = self.first as usize;
            let hi = self.last as usize;
            for (slot, fresh) in self.slots[lo..=hi].iter_mut().zip(&mut slots[lo..=hi]) {
                *fresh = slot.take();
            }
        }
        self.slots = slots;
    }

    fn make_iter(&self, direction: Direction, from: i64) -> Iter<'_, V> {
        let (next, stop) = if self.count == 0 {
            match direction {
                Direction::Forward => (1, 0),
                Direction::Reverse => (0, 1),
            }
        } else {
            match direction {
                Direction::Forward => (from.max(self.first), self.last),
                Direction::Reverse => (from.min(self.last), self.first),
            }
        };
        Iter {
            slots: &self.slots,
            direction,
            next,
            stop,
        }
    }
}

/// Panics unless `index` is storable.
#[inline]
fn check_index(index: i64) {
    assert!(
        (0..=MAX_INDEX).contains(&index),
        "index {index} outside the storable range 0..={MAX_INDEX}"
    );
}

impl<V> IndexedArray for SimpleArray<V> {
    type Value = V;

    type Iter<'a>
        = Iter<'a, V>
    where
        Self: 'a,
        V: 'a;

    /// # Panics
    ///
    /// If `index` is negative or greater than [`MAX_INDEX`].
    fn get(&self, index: i64) -> Option<&V> {
        check_index(index);
        self.slots.get(index as usize).and_then(Option::as_ref)
    }

    /// # Panics
    ///
    /// If `index` is negative or greater than [`MAX_INDEX`].
    fn set(&mut self, index: i64, value: V) -> Option<V> {
        check_index(index);
        self.store(index, value)
    }

    /// # Panics
    ///
    /// If `index` is negative or greater than [`MAX_INDEX`].
    fn remove(&mut self, index: i64) -> Option<V> {
        check_index(index);
        self.erase(index)
    }

    /// # Panics
    ///
    /// If `index` is negative or greater than [`MAX_INDEX`].
    fn exists(&self, index: i64) -> bool {
        check_index(index);
        matches!(self.slots.get(index as usize), Some(Some(_)))
    }

    fn len(&self) -> usize {
        self.count
    }

    fn iter_from(&self, index: i64) -> Iter<'_, V> {
        self.make_iter(Direction::Forward, index)
    }

    fn iter_rev_from(&self, index: i64) -> Iter<'_, V> {
        self.make_iter(Direction::Reverse, index)
    }

    fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// O(1) from the cached bound.
    fn first_index(&self) -> i64 {
        self.first
    }

    /// O(1) from the cached bound.
    fn last_index(&self) -> i64 {
        self.last
    }

    /// O(1) reset: the buffer is dropped wholesale instead of drained.
    fn clear(&mut self) {
        self.slots = Vec::new();
        self.first = NOT_FOUND;
        self.last = NOT_FOUND;
        self.count = 0;
    }
}

impl<V> Default for SimpleArray<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> Clone for SimpleArray<V> {
    /// Copies exactly the live span; trailing spare capacity is not carried.
    fn clone(&self) -> Self {
        let slots = if self.count > 0 {
            self.slots[..self.last as usize + 1].to_vec()
        } else {
            Vec::new()
        };
        Self {
            slots,
            first: self.first,
            last: self.last,
            count: self.count,
        }
    }
}

impl<V: PartialEq> PartialEq for SimpleArray<V> {
    fn eq(&self, other: &Self) -> bool {
        self.eq_entries(other)
    }
}

impl<V: Eq> Eq for SimpleArray<V> {}

impl<V: Hash> Hash for SimpleArray<V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.entries_hash());
    }
}

impl<V: fmt::Debug> fmt::Debug for SimpleArray<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_entries(f)
    }
}

/// Borrowing iterator over a [`SimpleArray`], yielding `(index, &value)`.
pub struct Iter<'a, V> {
    slots: &'a [Option<V>],
    direction: Direction,
    /// Next candidate position; already normalized into the occupied span.
    next: i64,
    /// Inclusive bound in the travel direction.
    stop: i64,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (i64, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        match self.direction {
            Direction::Forward => {
                while self.next <= self.stop {
                    let index = self.next;
                    self.next += 1;
                    if let Some(value) = self.slots[index as usize].as_ref() {
                        return Some((index, value));
                    }
                }
                None
            }
            Direction::Reverse => {
                while self.next >= self.stop {
                    let index = self.next;
                    self.next -= 1;
                    if let Some(value) = self.slots[index as usize].as_ref() {
                        return Some((index, value));
                    }
                }
                None
            }
        }
    }
}

/// Mutating cursor over a [`SimpleArray`].
///
/// Unlike the borrowing iterator this owns exclusive access to the array,
/// so entries can be rewritten or removed mid-traversal. The cursor starts
/// positioned before the first entry; every accessor other than
/// [`advance`] panics until an `advance` lands on an entry, and again after
/// a [`remove`] until the next `advance`.
///
/// [`advance`]: CursorMut::advance
/// [`remove`]: CursorMut::remove
pub struct CursorMut<'a, V> {
    array: &'a mut SimpleArray<V>,
    direction: Direction,
    /// Next candidate position.
    next: i64,
    /// Index the cursor is positioned on, `NOT_FOUND` when unpositioned.
    current: i64,
}

impl<'a, V> CursorMut<'a, V> {
    fn new(array: &'a mut SimpleArray<V>, direction: Direction, from: i64) -> Self {
        let next = match direction {
            Direction::Forward => from.max(0),
            Direction::Reverse => from.min(array.last),
        };
        Self {
            array,
            direction,
            next,
            current: NOT_FOUND,
        }
    }

    /// Moves to the next entry in the travel direction. Returns `false`
    /// when the traversal is exhausted, leaving the cursor unpositioned.
    ///
    /// Bounds are re-read from the array on every step, so entries removed
    /// through the cursor never stall the traversal.
    pub fn advance(&mut self) -> bool {
        loop {
            let in_range = self.array.count != 0
                && match self.direction {
                    Direction::Forward => self.next <= self.array.last,
                    Direction::Reverse => self.next >= self.array.first,
                };
            if !in_range {
                self.current = NOT_FOUND;
                return false;
            }
            let index = self.next;
            match self.direction {
                Direction::Forward => self.next += 1,
                Direction::Reverse => self.next -= 1,
            }
            if self.array.slots[index as usize].is_some() {
                self.current = index;
                return true;
            }
        }
    }

    /// Index of the entry the cursor is positioned on.
    ///
    /// # Panics
    ///
    /// If the cursor is not positioned on an entry.
    pub fn index(&self) -> i64 {
        assert!(
            self.current != NOT_FOUND,
            "cursor is not positioned on an entry"
        );
        self.current
    }

    /// Value of the entry the cursor is positioned on.
    ///
    /// # Panics
    ///
    /// If the cursor is not positioned on an entry.
    pub fn value(&self) -> &V {
        let index = self.index();
        match self.array.slots[index as usize].as_ref() {
            Some(value) => value,
            None => unreachable!("cursor position {index} vacated mid-traversal"),
        }
    }

    /// Mutable value of the entry the cursor is positioned on.
    ///
    /// # Panics
    ///
    /// If the cursor is not positioned on an entry.
    pub fn value_mut(&mut self) -> &mut V {
        let index = self.index();
        match self.array.slots[index as usize].as_mut() {
            Some(value) => value,
            None => unreachable!("cursor position {index} vacated mid-traversal"),
        }
    }

    /// Replaces the current entry's value, returning the one displaced.
    ///
    /// # Panics
    ///
    /// If the cursor is not positioned on an entry.
    pub fn set_value(&mut self, value: V) -> V {
        let index = self.index();
        match self.array.slots[index as usize].replace(value) {
            Some(previous) => previous,
            None => unreachable!("cursor position {index} vacated mid-traversal"),
        }
    }

    /// Removes and returns the current entry, leaving the cursor
    /// unpositioned until the next [`advance`].
    ///
    /// # Panics
    ///
    /// If the cursor is not positioned on an entry.
    ///
    /// [`advance`]: CursorMut::advance
    pub fn remove(&mut self) -> V {
        let index = self.index();
        self.current = NOT_FOUND;
        match self.array.erase(index) {
            Some(value) => value,
            None => unreachable!("cursor position {index} vacated mid-traversal"),
        }
    }
}
