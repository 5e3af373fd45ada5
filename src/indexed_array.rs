//! Contract for sparse ordered containers addressed by signed 64-bit
//! indices, plus the default layer deriving every composite operation from
//! the iteration primitive.
//!
//! An implementation supplies seven primitives: keyed access (`get`, `set`,
//! `remove`, `exists`), a length, and bidirectional iteration from an
//! arbitrary starting index. Everything else -- ordered navigation, value
//! search, ranged removal, equality, hashing, rendering -- is provided here
//! in terms of those primitives, so a storage strategy gets the whole
//! contract by writing the part only it can write. Implementations are free
//! to override any provided method they can serve faster; [`SimpleArray`]
//! overrides the bound and length queries it tracks in O(1).
//!
//! [`SimpleArray`]: crate::simple_array::SimpleArray

use core::fmt;
use core::hash::{Hash, Hasher};
use std::collections::hash_map::DefaultHasher;

/// Sentinel returned by every index-returning operation when no index
/// matches. Valid element indices are non-negative, so `-1` is never a hit.
pub const NOT_FOUND: i64 = -1;

/// Traversal direction for iterators and cursors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Direction {
    /// Ascending index order.
    Forward,
    /// Descending index order.
    Reverse,
}

/// A sparse ordered mapping from `i64` indices to values.
///
/// Indices are unique (at most one value per index) and iteration always
/// yields strictly monotonic indices: increasing forward, decreasing in
/// reverse. `first_index`/`last_index` report [`NOT_FOUND`] exactly when the
/// array is empty, and `len()` always equals the number of iterated entries.
pub trait IndexedArray {
    /// The element type stored at each occupied index.
    type Value;

    /// Borrowing iterator over `(index, &value)` pairs.
    type Iter<'a>: Iterator<Item = (i64, &'a Self::Value)>
    where
        Self: 'a,
        Self::Value: 'a;

    /// Returns the value at `index`, or `None` if the index is unoccupied.
    fn get(&self, index: i64) -> Option<&Self::Value>;

    /// Stores `value` at `index`, returning the value it displaced.
    fn set(&mut self, index: i64, value: Self::Value) -> Option<Self::Value>;

    /// Removes and returns the value at `index`, if any.
    fn remove(&mut self, index: i64) -> Option<Self::Value>;

    /// Whether `index` is occupied.
    fn exists(&self, index: i64) -> bool;

    /// Number of occupied indices.
    fn len(&self) -> usize;

    /// Iterates forward from the smallest occupied index `>= index`.
    ///
    /// A starting index that is itself unoccupied snaps to the nearest
    /// occupied index in the iteration direction; one past the end yields an
    /// empty iterator.
    fn iter_from(&self, index: i64) -> Self::Iter<'_>;

    /// Iterates in reverse from the greatest occupied index `<= index`.
    fn iter_rev_from(&self, index: i64) -> Self::Iter<'_>;

    // ---- default layer -------------------------------------------------

    /// Iterates forward over the whole array.
    fn iter(&self) -> Self::Iter<'_> {
        self.iter_from(i64::MIN)
    }

    /// Iterates in reverse over the whole array.
    fn iter_rev(&self) -> Self::Iter<'_> {
        self.iter_rev_from(i64::MAX)
    }

    /// Whether the array holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends `value` just past the current greatest occupied index and
    /// returns the index it landed on.
    ///
    /// On an empty array the empty-bound sentinel is `-1`, so the first
    /// appended value lands on index `0`.
    fn add(&mut self, value: Self::Value) -> i64 {
        let index = self.last_index() + 1;
        self.set(index, value);
        index
    }

    /// Removes every occupied index in `[from, to)`.
    fn remove_range(&mut self, from: i64, to: i64) {
        let doomed: Vec<i64> = self
            .iter_from(from)
            .map(|(index, _)| index)
            .take_while(|&index| index < to)
            .collect();
        for index in doomed {
            self.remove(index);
        }
    }

    /// Whether any occupied index holds a value equal to `value`.
    fn contains(&self, value: &Self::Value) -> bool
    where
        Self::Value: PartialEq,
    {
        self.iter().any(|(_, held)| held == value)
    }

    /// Removes every entry, one leading entry at a time.
    fn clear(&mut self) {
        loop {
            let index = self.first_index();
            if index == NOT_FOUND {
                break;
            }
            self.remove(index);
        }
    }

    /// Smallest occupied index, or [`NOT_FOUND`] when empty.
    fn first_index(&self) -> i64 {
        self.iter().next().map_or(NOT_FOUND, |(index, _)| index)
    }

    /// Greatest occupied index, or [`NOT_FOUND`] when empty.
    fn last_index(&self) -> i64 {
        self.iter_rev().next().map_or(NOT_FOUND, |(index, _)| index)
    }

    /// Greatest occupied index `<= index`, or [`NOT_FOUND`].
    fn floor_index(&self, index: i64) -> i64 {
        self.iter_rev_from(index)
            .next()
            .map_or(NOT_FOUND, |(found, _)| found)
    }

    /// Value at the greatest occupied index `<= index`.
    fn floor(&self, index: i64) -> Option<&Self::Value> {
        match self.floor_index(index) {
            NOT_FOUND => None,
            found => self.get(found),
        }
    }

    /// Smallest occupied index `>= index`, or [`NOT_FOUND`].
    fn ceiling_index(&self, index: i64) -> i64 {
        self.iter_from(index)
            .next()
            .map_or(NOT_FOUND, |(found, _)| found)
    }

    /// Value at the smallest occupied index `>= index`.
    fn ceiling(&self, index: i64) -> Option<&Self::Value> {
        match self.ceiling_index(index) {
            NOT_FOUND => None,
            found => self.get(found),
        }
    }

    /// First index holding a value equal to `value`, or [`NOT_FOUND`].
    fn index_of(&self, value: &Self::Value) -> i64
    where
        Self::Value: PartialEq,
    {
        self.index_of_from(value, i64::MIN)
    }

    /// First index `>= from` holding a value equal to `value`.
    fn index_of_from(&self, value: &Self::Value, from: i64) -> i64
    where
        Self::Value: PartialEq,
    {
        self.iter_from(from)
            .find(|&(_, held)| held == value)
            .map_or(NOT_FOUND, |(index, _)| index)
    }

    /// Last index holding a value equal to `value`, or [`NOT_FOUND`].
    fn last_index_of(&self, value: &Self::Value) -> i64
    where
        Self::Value: PartialEq,
    {
        self.last_index_of_from(value, i64::MAX)
    }

    /// Last index `<= to` holding a value equal to `value`.
    fn last_index_of_from(&self, value: &Self::Value, to: i64) -> i64
    where
        Self::Value: PartialEq,
    {
        self.iter_rev_from(to)
            .find(|&(_, held)| held == value)
            .map_or(NOT_FOUND, |(index, _)| index)
    }

    /// All occupied indices in ascending order.
    fn indices(&self) -> Vec<i64> {
        self.iter().map(|(index, _)| index).collect()
    }

    /// Order-sensitive structural equality across implementations: equal iff
    /// both arrays yield identical `(index, value)` sequences.
    fn eq_entries<B>(&self, other: &B) -> bool
    where
        B: IndexedArray<Value = Self::Value> + ?Sized,
        Self::Value: PartialEq,
    {
        if self.len() != other.len() {
            return false;
        }
        let mut mine = self.iter();
        let mut theirs = other.iter();
        loop {
            match (mine.next(), theirs.next()) {
                (None, None) => return true,
                (Some((index, value)), Some((other_index, other_value))) => {
                    if index != other_index || value != other_value {
                        return false;
                    }
                }
                _ => return false,
            }
        }
    }

    /// Order-independent combination of the element hashes.
    ///
    /// Each value is hashed on its own hasher and the results are combined
    /// with a wrapping sum, so any two arrays equal under [`eq_entries`]
    /// produce the same result no matter how their entries were visited.
    ///
    /// [`eq_entries`]: IndexedArray::eq_entries
    fn entries_hash(&self) -> u64
    where
        Self::Value: Hash,
    {
        let mut combined: u64 = 0;
        for (_, value) in self.iter() {
            let mut hasher = DefaultHasher::new();
            value.hash(&mut hasher);
            combined = combined.wrapping_add(hasher.finish());
        }
        combined
    }

    /// Map-style rendering of the entries, used by implementations' `Debug`.
    fn fmt_entries(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    where
        Self::Value: fmt::Debug,
    {
        f.debug_map().entries(self.iter()).finish()
    }
}
