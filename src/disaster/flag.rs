use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared disaster state
///
/// Written only by the annotation poller, read by every request handler.
/// Clones share the same underlying flag.
#[derive(Debug, Clone)]
pub struct DisasterFlag {
    active: Arc<AtomicBool>,
}

impl DisasterFlag {
    /// Create a new flag (initially healthy)
    pub fn new() -> Self {
        Self {
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Snapshot of the current state
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Store a new state, returning the previous one
    pub fn set(&self, active: bool) -> bool {
        self.active.swap(active, Ordering::SeqCst)
    }
}

impl Default for DisasterFlag {
    fn default() -> Self {
        Self::new()
    }
}
