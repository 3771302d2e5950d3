//! Per-account serialization of read-modify-write balance updates.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockMap = DashMap<String, Arc<Mutex<()>>>;

/// Holds one async mutex per account key.
///
/// A guard must be held from the balance read until the matching write has
/// completed, so two operations on the same account cannot interleave and
/// lose an update. Operations on different accounts never wait on each other.
///
/// Entries only live while someone holds or waits for them; releasing the
/// last guard on an account evicts its mutex.
#[derive(Default)]
pub struct AccountLocks {
    locks: Arc<LockMap>,
}

/// Guard for one or two account locks; released on drop.
pub struct AccountGuard {
    locks: Arc<LockMap>,
    held: Vec<(String, OwnedMutexGuard<()>)>,
}

impl Drop for AccountGuard {
    fn drop(&mut self) {
        for (account, guard) in self.held.drain(..) {
            drop(guard);
            // Evict only when no other task holds a clone of the mutex.
            self.locks
                .remove_if(account.as_str(), |_, mutex| Arc::strong_count(mutex) == 1);
        }
    }
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn mutex_for(&self, account: &str) -> Arc<Mutex<()>> {
        if let Some(existing) = self.locks.get(account) {
            return existing.clone();
        }
        self.locks.entry(account.to_string()).or_default().clone()
    }

    async fn acquire(&self, account: &str) -> (String, OwnedMutexGuard<()>) {
        let guard = self.mutex_for(account).lock_owned().await;
        (account.to_string(), guard)
    }

    pub async fn lock(&self, account: &str) -> AccountGuard {
        let held = vec![self.acquire(account).await];
        AccountGuard {
            locks: self.locks.clone(),
            held,
        }
    }

    /// Locks two accounts in key order so that opposite transfers between the
    /// same pair cannot deadlock. Locking the same account twice takes it once.
    pub async fn lock_pair(&self, a: &str, b: &str) -> AccountGuard {
        if a == b {
            return self.lock(a).await;
        }
        let (low, high) = if a < b { (a, b) } else { (b, a) };
        let first = self.acquire(low).await;
        let second = self.acquire(high).await;
        AccountGuard {
            locks: self.locks.clone(),
            held: vec![second, first],
        }
    }

    /// Accounts that currently have a lock held or awaited.
    pub fn tracked_accounts(&self) -> usize {
        self.locks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_account_is_exclusive() {
        let locks = Arc::new(AccountLocks::new());
        let guard = locks.lock("ACC1").await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock("ACC1").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_different_accounts_do_not_block() {
        let locks = AccountLocks::new();
        let _a = locks.lock("ACC1").await;
        let b = tokio::time::timeout(Duration::from_secs(1), locks.lock("ACC2")).await;
        assert!(b.is_ok());
        assert_eq!(locks.tracked_accounts(), 2);
    }

    #[tokio::test]
    async fn test_opposite_pairs_do_not_deadlock() {
        let locks = Arc::new(AccountLocks::new());
        let mut handles = Vec::new();
        for i in 0..50 {
            let locks = locks.clone();
            handles.push(tokio::spawn(async move {
                let _guard = if i % 2 == 0 {
                    locks.lock_pair("ACC1", "ACC2").await
                } else {
                    locks.lock_pair("ACC2", "ACC1").await
                };
                tokio::task::yield_now().await;
            }));
        }
        for handle in handles {
            tokio::time::timeout(Duration::from_secs(5), handle)
                .await
                .unwrap()
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_released_locks_are_evicted() {
        let locks = Arc::new(AccountLocks::new());
        {
            let _pair = locks.lock_pair("ACC1", "ACC2").await;
            assert_eq!(locks.tracked_accounts(), 2);
        }
        assert_eq!(locks.tracked_accounts(), 0);

        let guard = locks.lock("ACC1").await;
        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock("ACC1").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        // The waiter still needs the entry.
        drop(guard);
        assert_eq!(locks.tracked_accounts(), 1);

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(locks.tracked_accounts(), 0);
    }

    #[tokio::test]
    async fn test_pair_with_same_account_locks_once() {
        let locks = AccountLocks::new();
        let guard = tokio::time::timeout(Duration::from_secs(1), locks.lock_pair("ACC1", "ACC1")).await;
        assert!(guard.is_ok());
    }
}
