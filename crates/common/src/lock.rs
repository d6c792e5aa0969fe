//! Bounded-wait keyed locks.
//!
//! Reservation math is not commutative-safe under interleaving, so every
//! operation touching the same inventory record or the same order must be
//! serialized. The registry hands out one async mutex per key; acquisition
//! waits at most a configured duration and then fails instead of blocking
//! indefinitely.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::OwnedMutexGuard;

/// Error returned when a keyed lock could not be acquired within the
/// configured wait.
#[derive(Debug, Error)]
#[error("timed out acquiring critical section for {key}")]
pub struct LockTimeout {
    /// Display form of the key that was contended.
    pub key: String,
}

/// A registry of async mutexes keyed by entity identifier.
///
/// Locks for distinct keys are independent; there is no global lock. Guards
/// are owned, so they can be held across await points for the duration of
/// one operation.
pub struct KeyedLocks<K> {
    locks: Mutex<HashMap<K, Arc<tokio::sync::Mutex<()>>>>,
    wait: Duration,
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Clone + std::fmt::Display,
{
    /// Creates a registry whose acquisitions wait at most `wait`.
    pub fn new(wait: Duration) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            wait,
        }
    }

    /// Acquires the lock for `key`, failing with [`LockTimeout`] once the
    /// bounded wait expires.
    pub async fn acquire(&self, key: &K) -> Result<OwnedMutexGuard<()>, LockTimeout> {
        let entry = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };

        tokio::time::timeout(self.wait, entry.lock_owned())
            .await
            .map_err(|_| LockTimeout {
                key: key.to_string(),
            })
    }

    /// Returns the number of keys the registry currently tracks.
    pub fn key_count(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sequential_acquisitions_succeed() {
        let locks: KeyedLocks<String> = KeyedLocks::new(Duration::from_millis(50));
        let key = "SKU-001".to_string();

        let guard = locks.acquire(&key).await.unwrap();
        drop(guard);
        let guard = locks.acquire(&key).await.unwrap();
        drop(guard);

        assert_eq!(locks.key_count(), 1);
    }

    #[tokio::test]
    async fn contended_acquisition_times_out() {
        let locks: KeyedLocks<String> = KeyedLocks::new(Duration::from_millis(10));
        let key = "SKU-001".to_string();

        let _held = locks.acquire(&key).await.unwrap();
        let result = locks.acquire(&key).await;

        assert!(result.is_err());
        assert_eq!(result.unwrap_err().key, "SKU-001");
    }

    #[tokio::test]
    async fn distinct_keys_are_independent() {
        let locks: KeyedLocks<String> = KeyedLocks::new(Duration::from_millis(10));

        let _held = locks.acquire(&"SKU-001".to_string()).await.unwrap();
        let other = locks.acquire(&"SKU-002".to_string()).await;

        assert!(other.is_ok());
        assert_eq!(locks.key_count(), 2);
    }

    #[tokio::test]
    async fn released_lock_can_be_reacquired_by_waiter() {
        let locks: Arc<KeyedLocks<String>> =
            Arc::new(KeyedLocks::new(Duration::from_millis(500)));
        let key = "SKU-001".to_string();

        let guard = locks.acquire(&key).await.unwrap();

        let locks2 = locks.clone();
        let key2 = key.clone();
        let waiter = tokio::spawn(async move { locks2.acquire(&key2).await.is_ok() });

        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(guard);

        assert!(waiter.await.unwrap());
    }
}
