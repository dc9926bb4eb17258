//! Single-writer discipline per (type, year, month)
//!
//! Rotation is a read-check-rename-create sequence, so appends to the same
//! partition key must not interleave. Different keys never contend.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::layout::PartitionKey;

/// Lazily created async mutex per partition key.
#[derive(Debug, Default)]
pub struct PartitionLocks {
    locks: Mutex<HashMap<PartitionKey, Arc<AsyncMutex<()>>>>,
}

impl PartitionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`. Released when the guard drops.
    pub async fn acquire(&self, key: &PartitionKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();
            Arc::clone(locks.entry(key.clone()).or_default())
        };
        lock.lock_owned().await
    }

    /// Number of keys seen so far.
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_key_is_exclusive() {
        let locks = PartitionLocks::new();
        let key = PartitionKey::new("t", 2025, 10);

        let guard = locks.acquire(&key).await;
        let second = tokio::time::timeout(Duration::from_millis(50), locks.acquire(&key)).await;
        assert!(second.is_err());

        drop(guard);
        let third = tokio::time::timeout(Duration::from_millis(50), locks.acquire(&key)).await;
        assert!(third.is_ok());
    }

    #[tokio::test]
    async fn different_keys_do_not_contend() {
        let locks = PartitionLocks::new();
        let _october = locks.acquire(&PartitionKey::new("t", 2025, 10)).await;
        let november = tokio::time::timeout(
            Duration::from_millis(50),
            locks.acquire(&PartitionKey::new("t", 2025, 11)),
        )
        .await;
        assert!(november.is_ok());
        assert_eq!(locks.len(), 2);
    }
}
