//! Bounded command history ring
//!
//! Stores previously entered command lines, evicting the oldest entry once
//! the ring is full. Consumed by the `history`, `!!`, and `!N` control
//! tokens.

use std::collections::VecDeque;

/// Bounded ring of owned command-line strings.
#[derive(Debug, Clone)]
pub struct HistoryRing {
    entries: VecDeque<String>,
    capacity: usize,
}

impl HistoryRing {
    /// Create a ring holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "history capacity must be non-zero");
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an entry, evicting the oldest if the ring is full.
    pub fn push(&mut self, entry: impl Into<String>) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry.into());
    }

    /// Get the n-th entry, 1-based, oldest first.
    pub fn get(&self, n: usize) -> Option<&str> {
        if n == 0 {
            return None;
        }
        self.entries.get(n - 1).map(String::as_str)
    }

    /// The most recently pushed entry.
    pub fn last(&self) -> Option<&str> {
        self.entries.back().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_push_and_get() {
        let mut ring = HistoryRing::new(4);
        assert!(ring.is_empty());

        ring.push("one");
        ring.push("two");
        assert_eq!(ring.len(), 2);
        assert_eq!(ring.get(1), Some("one"));
        assert_eq!(ring.get(2), Some("two"));
        assert_eq!(ring.last(), Some("two"));
    }

    #[test]
    fn test_out_of_bounds() {
        let mut ring = HistoryRing::new(2);
        ring.push("only");
        assert_eq!(ring.get(0), None);
        assert_eq!(ring.get(2), None);
    }

    #[test]
    fn test_eviction_at_capacity() {
        let capacity = 5;
        let mut ring = HistoryRing::new(capacity);
        for i in 0..=capacity {
            ring.push(format!("entry-{i}"));
        }

        // capacity + 1 pushes: the first entry is gone, the second is oldest.
        assert_eq!(ring.len(), capacity);
        assert_eq!(ring.get(1), Some("entry-1"));
        assert_eq!(ring.last(), Some(format!("entry-{capacity}").as_str()));
    }

    #[test]
    fn test_iter_oldest_first() {
        let mut ring = HistoryRing::new(3);
        ring.push("a");
        ring.push("b");
        ring.push("c");
        ring.push("d");
        let collected: Vec<&str> = ring.iter().collect();
        assert_eq!(collected, vec!["b", "c", "d"]);
    }
}
