//! Bounded record of raw protocol lines.

use std::collections::VecDeque;

/// Default number of retained entries.
pub const DEFAULT_LOG_SIZE: usize = 64;

/// FIFO of raw request and response lines, oldest first.
///
/// Once `capacity` entries are held, each new entry evicts the oldest.
/// A capacity of zero retains nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionLog {
    entries: VecDeque<String>,
    capacity: usize,
}

impl TransactionLog {
    /// Creates an empty log holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_LOG_SIZE)),
            capacity,
        }
    }

    /// Appends an entry, evicting the oldest ones if needed.
    pub fn push(&mut self, entry: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry.into());
    }

    /// Changes the capacity, dropping the oldest entries that no longer fit.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        while self.entries.len() > capacity {
            self.entries.pop_front();
        }
    }

    /// Returns the capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterates over entries, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Returns the number of held entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Returns every entry concatenated, oldest first.
    #[must_use]
    pub fn concat(&self) -> String {
        self.entries.iter().map(String::as_str).collect()
    }
}

impl Default for TransactionLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_oldest() {
        let mut log = TransactionLog::new(2);
        log.push("EHLO a\r\n");
        log.push("250 ok\r\n");
        log.push("QUIT\r\n");
        assert_eq!(log.entries().collect::<Vec<_>>(), ["250 ok\r\n", "QUIT\r\n"]);
        assert_eq!(log.concat(), "250 ok\r\nQUIT\r\n");
    }

    #[test]
    fn test_zero_capacity_retains_nothing() {
        let mut log = TransactionLog::new(0);
        log.push("EHLO a\r\n");
        assert!(log.is_empty());
        assert_eq!(log.concat(), "");
    }

    #[test]
    fn test_shrink_and_clear() {
        let mut log = TransactionLog::default();
        assert_eq!(log.capacity(), DEFAULT_LOG_SIZE);
        for i in 0..10 {
            log.push(format!("{i}"));
        }
        log.set_capacity(3);
        assert_eq!(log.concat(), "789");
        log.clear();
        assert_eq!(log.len(), 0);
    }
}
