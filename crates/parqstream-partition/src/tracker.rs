//! Process-local row counts per partition file
//!
//! The cache only saves footer reads. It is never the source of truth: a miss
//! means "ask the codec", and the writer reseeds from every write outcome.

use parking_lot::Mutex;
use std::collections::HashMap;

/// Last-known row count per file path.
pub trait RowCountTracker: Send + Sync {
    /// Cached count, or `None` when the caller must read the file footer.
    fn get_count(&self, path: &str) -> Option<usize>;

    /// Forget a path (after a rename or a failed write).
    fn invalidate(&self, path: &str);

    /// Add `delta` rows to a cached count. Unknown paths stay unknown.
    fn bump(&self, path: &str, delta: usize);

    /// Record a count obtained from the file itself.
    fn seed(&self, path: &str, count: usize);
}

/// In-memory tracker. Construct once per process and share by reference.
#[derive(Debug, Default)]
pub struct RowCountCache {
    counts: Mutex<HashMap<String, usize>>,
}

impl RowCountCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.counts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.lock().is_empty()
    }
}

impl RowCountTracker for RowCountCache {
    fn get_count(&self, path: &str) -> Option<usize> {
        self.counts.lock().get(path).copied()
    }

    fn invalidate(&self, path: &str) {
        self.counts.lock().remove(path);
    }

    fn bump(&self, path: &str, delta: usize) {
        if let Some(count) = self.counts.lock().get_mut(path) {
            *count += delta;
        }
    }

    fn seed(&self, path: &str, count: usize) {
        self.counts.lock().insert(path.to_string(), count);
    }
}
