// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-contract async mutex registry.
//!
//! The metadata store has no compare-and-swap, so every read-authorize-write
//! sequence on a contract runs under that contract's lock. Locks are
//! process-local: a multi-instance deployment must route each contract to a
//! single instance.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Guard held for the duration of a contract mutation.
pub type ContractGuard = OwnedMutexGuard<()>;

#[derive(Default)]
pub struct ContractLocks {
    // Weak so idle contracts don't pin an entry forever.
    locks: Mutex<HashMap<String, Weak<AsyncMutex<()>>>>,
}

impl ContractLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, contract_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = match self.locks.lock() {
            Ok(locks) => locks,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(existing) = locks.get(contract_id).and_then(Weak::upgrade) {
            return existing;
        }

        locks.retain(|_, weak| weak.strong_count() > 0);
        let lock = Arc::new(AsyncMutex::new(()));
        locks.insert(contract_id.to_string(), Arc::downgrade(&lock));
        lock
    }

    /// Wait for exclusive access to `contract_id`.
    pub async fn lock(&self, contract_id: &str) -> ContractGuard {
        self.handle(contract_id).lock_owned().await
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_contract_is_serialized() {
        let locks = Arc::new(ContractLocks::new());
        let guard = locks.lock("c1").await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock("c1").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn different_contracts_do_not_block() {
        let locks = ContractLocks::new();
        let _a = locks.lock("c1").await;
        let _b = tokio::time::timeout(Duration::from_millis(100), locks.lock("c2"))
            .await
            .expect("independent contract should lock immediately");
    }

    #[tokio::test]
    async fn idle_entries_are_pruned() {
        let locks = ContractLocks::new();
        drop(locks.lock("c1").await);
        drop(locks.lock("c2").await);
        assert_eq!(locks.tracked(), 1);
    }
}
