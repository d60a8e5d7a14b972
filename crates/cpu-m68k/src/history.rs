//! Bounded diagnostic history.

use std::collections::VecDeque;

/// One exception the engine processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionRecord {
    pub vector: u8,
    pub name: &'static str,
    /// PC at the time of the exception (before the handler is entered).
    pub pc: u32,
    /// Active stack pointer at the time of the exception.
    pub sp: u32,
}

/// Ring buffer keeping the newest `capacity` entries.
///
/// A capacity of zero records nothing.
#[derive(Debug, Clone)]
pub struct History<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T> History<T> {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.capacity > 0
    }

    pub fn push(&mut self, entry: T) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Entries from newest to oldest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().rev()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::History;

    #[test]
    fn keeps_only_the_newest_entries() {
        let mut h = History::new(3);
        for n in 1..=5 {
            h.push(n);
        }
        assert_eq!(h.iter().copied().collect::<Vec<_>>(), vec![5, 4, 3]);
    }

    #[test]
    fn zero_capacity_records_nothing() {
        let mut h = History::new(0);
        h.push(1);
        assert!(h.is_empty());
        assert!(!h.is_enabled());
    }
}
