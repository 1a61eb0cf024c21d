//! Buffer Store Module
//!
//! Keeps cache entries in recency order inside a contiguous buffer that
//! grows and shrinks by a fixed increment.

use crate::cache::{CacheEntry, CacheStats};
use crate::error::{CacheError, Result};

// == Buffer Store ==
/// Recency-ordered entry storage with capacity-bounded insertion.
///
/// Entries are stored oldest first:
/// - Index 0 = least recently touched
/// - Index `len - 1` = most recently touched
///
/// `capacity` is the number of slots currently reserved. It only changes in
/// [`grow`](Self::grow) (on insert) and [`shrink`](Self::shrink) (on sweep).
#[derive(Debug)]
pub struct BufferStore<V> {
    /// Entries in ascending recency order
    entries: Vec<CacheEntry<V>>,
    /// Reserved slot count
    capacity: usize,
    /// Maximum number of entries allowed
    max_size: usize,
    /// Step by which the buffer grows or shrinks
    increment: usize,
    /// Performance statistics
    stats: CacheStats,
}

impl<V> BufferStore<V> {
    // == Constructor ==
    /// Creates an empty store with `increment` slots reserved.
    ///
    /// # Arguments
    /// * `max_size` - Maximum number of entries the store can hold
    /// * `increment` - Growth and shrink step, at most `max_size`
    pub fn new(max_size: usize, increment: usize) -> Result<Self> {
        validate_sizes(max_size, increment)?;
        Ok(Self {
            entries: Vec::with_capacity(increment),
            capacity: increment,
            max_size,
            increment,
            stats: CacheStats::new(),
        })
    }

    // == Find ==
    /// Returns the index of the first entry, oldest first, matching `predicate`.
    pub fn find<F>(&self, mut predicate: F) -> Option<usize>
    where
        F: FnMut(&V) -> bool,
    {
        self.entries.iter().position(|entry| predicate(&entry.value))
    }

    // == Touch ==
    /// Moves the entry at `index` to the tail and marks it as used.
    ///
    /// Entries after `index` shift one slot left to close the gap.
    pub fn touch(&mut self, index: usize) -> &CacheEntry<V> {
        let mut entry = self.entries.remove(index);
        entry.touch();
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    // == Insert ==
    /// Appends a new entry at the tail.
    ///
    /// When the store is full, the least recently touched entry is evicted
    /// first and returned. Otherwise the buffer grows if every slot is used.
    pub fn insert(&mut self, value: V) -> Option<V> {
        let evicted = if self.entries.len() >= self.max_size {
            self.stats.record_eviction();
            Some(self.entries.remove(0).into_value())
        } else {
            if self.entries.len() >= self.capacity {
                self.grow();
            }
            None
        };

        self.entries.push(CacheEntry::new(value));
        self.stats.set_total_entries(self.entries.len());
        evicted
    }

    // == Remove At ==
    /// Removes the entry at `index`, shifting later entries left.
    pub fn remove_at(&mut self, index: usize) -> CacheEntry<V> {
        let entry = self.entries.remove(index);
        self.stats.set_total_entries(self.entries.len());
        entry
    }

    // == Drain Matching ==
    /// Removes every entry matching `predicate`, keeping survivors in order.
    ///
    /// After a removal the same index is checked again, since the following
    /// entry has shifted into it.
    pub fn remove_where<F>(&mut self, mut predicate: F) -> Vec<V>
    where
        F: FnMut(&CacheEntry<V>) -> bool,
    {
        let mut removed = Vec::new();
        let mut index = 0;
        while index < self.entries.len() {
            if predicate(&self.entries[index]) {
                removed.push(self.remove_at(index).into_value());
            } else {
                index += 1;
            }
        }
        removed
    }

    // == Resize ==
    /// Grows the buffer by one increment, never past `max_size`.
    fn grow(&mut self) {
        let target = (self.capacity + self.increment).min(self.max_size);
        self.resize(target);
    }

    /// Releases spare slots when more than one increment is unused.
    ///
    /// Returns true if the buffer was reallocated.
    pub fn shrink(&mut self) -> bool {
        let spare = self.capacity.saturating_sub(self.entries.len());
        if spare > self.increment {
            self.resize(self.entries.len() + self.increment);
            true
        } else {
            false
        }
    }

    fn resize(&mut self, slots: usize) {
        if slots > self.entries.capacity() {
            self.entries.reserve_exact(slots - self.entries.len());
        } else {
            self.entries.shrink_to(slots);
        }
        self.capacity = slots;
    }

    // == Clear ==
    /// Drops every entry and resets the buffer to one increment.
    pub fn clear(&mut self) -> usize {
        let dropped = self.entries.len();
        self.entries = Vec::with_capacity(self.increment);
        self.capacity = self.increment;
        self.stats.set_total_entries(0);
        dropped
    }

    // == Configuration ==
    /// Changes the maximum size, evicting the oldest entries that no longer fit.
    ///
    /// The increment is lowered to the new maximum when it would exceed it.
    pub fn set_max_size(&mut self, max_size: usize) -> Result<Vec<V>> {
        if max_size == 0 {
            return Err(CacheError::InvalidArgument(
                "Maximum size must be greater than zero".to_string(),
            ));
        }

        self.max_size = max_size;
        self.increment = self.increment.min(max_size);

        let overflow = self.entries.len().saturating_sub(max_size);
        let evicted: Vec<V> = self
            .entries
            .drain(..overflow)
            .map(CacheEntry::into_value)
            .collect();
        for _ in &evicted {
            self.stats.record_eviction();
        }

        if self.capacity > max_size {
            self.resize(max_size);
        }
        self.stats.set_total_entries(self.entries.len());
        Ok(evicted)
    }

    /// Changes the growth and shrink step.
    pub fn set_increment(&mut self, increment: usize) -> Result<()> {
        validate_sizes(self.max_size, increment)?;
        self.increment = increment;
        Ok(())
    }

    // == Accessors ==
    /// Returns the current number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of reserved slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn increment(&self) -> usize {
        self.increment
    }

    /// Iterates entries from least to most recently touched.
    pub fn iter(&self) -> impl Iterator<Item = &CacheEntry<V>> {
        self.entries.iter()
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    pub fn stats_mut(&mut self) -> &mut CacheStats {
        &mut self.stats
    }
}

/// Checks the size pair shared by construction and reconfiguration.
pub(crate) fn validate_sizes(max_size: usize, increment: usize) -> Result<()> {
    if max_size == 0 {
        return Err(CacheError::InvalidArgument(
            "Maximum size must be greater than zero".to_string(),
        ));
    }
    if increment == 0 {
        return Err(CacheError::InvalidArgument(
            "Buffer increment must be greater than zero".to_string(),
        ));
    }
    if increment > max_size {
        return Err(CacheError::InvalidArgument(format!(
            "Buffer increment {} is higher than the maximum size {}",
            increment, max_size
        )));
    }
    Ok(())
}
