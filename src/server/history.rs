//! Bounded, newest-first record of backend responses seen by the frontend

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// One backend response as shown on the status page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub timestamp: String,
    pub status: u16,
    pub body: String,
}

impl HistoryEntry {
    /// Rendered green on the status page
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Newest-first ring truncated to `capacity` after every insertion
#[derive(Debug, Clone)]
pub struct HistoryRing {
    capacity: usize,
    entries: VecDeque<HistoryEntry>,
}

impl HistoryRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert at the front, dropping the oldest entries beyond capacity
    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Copy of the entries, newest first
    pub fn snapshot(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }
}

/// History shared between concurrent frontend requests
///
/// Insertions are serialized by the mutex; readers take a copy.
#[derive(Debug, Clone)]
pub struct SharedHistory {
    inner: Arc<Mutex<HistoryRing>>,
}

impl SharedHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HistoryRing::new(capacity))),
        }
    }

    /// Record `entry` and return the resulting history, newest first
    pub fn record(&self, entry: HistoryEntry) -> Vec<HistoryEntry> {
        let mut ring = self.lock();
        ring.push(entry);
        ring.snapshot()
    }

    pub fn snapshot(&self) -> Vec<HistoryEntry> {
        self.lock().snapshot()
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity()
    }

    // A panic while holding the lock cannot leave the ring half-updated.
    fn lock(&self) -> MutexGuard<'_, HistoryRing> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(status: u16, n: usize) -> HistoryEntry {
        HistoryEntry {
            timestamp: format!("12:00:{:02}.000", n % 60),
            status,
            body: format!("response {}", n),
        }
    }

    #[test]
    fn test_newest_first() {
        let mut ring = HistoryRing::new(3);
        ring.push(entry(200, 1));
        ring.push(entry(500, 2));
        ring.push(entry(200, 3));

        let statuses: Vec<u16> = ring.iter().map(|e| e.status).collect();
        assert_eq!(statuses, vec![200, 500, 200]);
        let bodies: Vec<&str> = ring.iter().map(|e| e.body.as_str()).collect();
        assert_eq!(bodies, vec!["response 3", "response 2", "response 1"]);
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let mut ring = HistoryRing::new(20);
        for n in 0..100 {
            ring.push(entry(200 + (n % 5) as u16, n));
            assert!(ring.len() <= 20);
        }

        assert_eq!(ring.len(), 20);
        let expected: Vec<HistoryEntry> = (80..100)
            .rev()
            .map(|n| entry(200 + (n % 5) as u16, n))
            .collect();
        assert_eq!(ring.snapshot(), expected);
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let mut ring = HistoryRing::new(0);
        ring.push(entry(200, 1));
        assert!(ring.is_empty());
    }

    #[test]
    fn test_unbounded_capacity_allocates_lazily() {
        let history = SharedHistory::new(usize::MAX);

        let snap = history.record(entry(200, 1));

        assert_eq!(snap, vec![entry(200, 1)]);
        assert_eq!(history.capacity(), usize::MAX);
    }

    #[test]
    fn test_shared_history_record_returns_snapshot() {
        let history = SharedHistory::new(2);
        let clone = history.clone();

        history.record(entry(200, 1));
        let snap = clone.record(entry(503, 2));

        assert_eq!(snap, vec![entry(503, 2), entry(200, 1)]);
        assert_eq!(history.snapshot(), snap);
        assert_eq!(history.capacity(), 2);
    }

    #[test]
    fn test_entry_color_rule() {
        assert!(entry(200, 0).is_ok());
        assert!(!entry(201, 0).is_ok());
        assert!(!entry(500, 0).is_ok());
    }

    #[test]
    fn test_concurrent_writers_respect_capacity() {
        let history = SharedHistory::new(5);
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let h = history.clone();
                std::thread::spawn(move || {
                    for n in 0..50 {
                        h.record(entry(200, t * 100 + n));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("writer thread");
        }

        assert_eq!(history.snapshot().len(), 5);
    }
}
