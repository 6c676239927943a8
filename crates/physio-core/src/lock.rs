//! Keyed async locks.
//!
//! `ScopeLocks` hands out one exclusive lock per key (a therapist ID, a
//! patient ID). Callers holding different keys never contend.

use crate::error::{PhysioError, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Idle entries are pruned once the table grows past this size.
const PRUNE_THRESHOLD: usize = 1024;

pub type ScopeGuard = OwnedMutexGuard<()>;

pub struct ScopeLocks {
    scope: &'static str,
    timeout: Duration,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl ScopeLocks {
    pub fn new(scope: &'static str, timeout: Duration) -> Self {
        Self {
            scope,
            timeout,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Waits for the lock on `key`.
    ///
    /// # Errors
    ///
    /// Returns `PhysioError::LockTimeout` if the lock is not obtained within
    /// the configured timeout. Nothing has been mutated at that point, so the
    /// caller may retry.
    pub async fn acquire(&self, key: &str) -> Result<ScopeGuard> {
        let lock = self.entry(key);
        match tokio::time::timeout(self.timeout, lock.lock_owned()).await {
            Ok(guard) => Ok(guard),
            Err(_) => {
                tracing::warn!(scope = self.scope, key, "Lock acquisition timed out");
                Err(PhysioError::LockTimeout {
                    scope: format!("{}:{}", self.scope, key),
                })
            }
        }
    }

    fn entry(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = match self.locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if locks.len() > PRUNE_THRESHOLD {
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}
