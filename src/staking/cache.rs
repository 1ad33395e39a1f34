// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Short-TTL LRU cache for contract metadata reads.
//!
//! Absorbs bursty ROI polling on the read endpoint. It is never consulted
//! inside the withdrawal critical section, which always reads the store
//! directly, and every write invalidates the entry.
//!
//! Reads are unlocked, so a load can finish after a withdrawal invalidated the
//! entry. Callers take a [`ReadTicket`] before loading; `put` drops the result
//! if any invalidation happened since.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::Duration;

use lru::LruCache;

use super::clock::SharedClock;
use super::contract::StakingContract;

/// Cached contract + insertion time (Unix seconds).
struct CacheEntry {
    contract: StakingContract,
    inserted_at: i64,
}

struct Inner {
    entries: LruCache<String, CacheEntry>,
    /// Bumped on every invalidation.
    generation: u64,
}

/// Invalidation generation observed before a store read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadTicket(u64);

/// In-process LRU cache keyed by contract id.
pub struct ContractCache {
    cache: Mutex<Inner>,
    ttl: Duration,
    clock: SharedClock,
}

impl ContractCache {
    /// Create a cache. Expiry is judged against `clock`.
    pub fn new(capacity: NonZeroUsize, ttl: Duration, clock: SharedClock) -> Self {
        Self {
            cache: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                generation: 0,
            }),
            ttl,
            clock,
        }
    }

    fn ttl_secs(&self) -> i64 {
        i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX)
    }

    /// Returns `None` if not cached or expired.
    pub fn get(&self, contract_id: &str) -> Option<StakingContract> {
        let mut cache = self.cache.lock().ok()?;
        if let Some(entry) = cache.entries.get(contract_id) {
            if self.clock.unix_now().saturating_sub(entry.inserted_at) < self.ttl_secs() {
                return Some(entry.contract.clone());
            }
            // Expired
            cache.entries.pop(contract_id);
        }
        None
    }

    /// Take before reading the store for a later [`put`](Self::put).
    pub fn ticket(&self) -> ReadTicket {
        ReadTicket(self.cache.lock().map(|c| c.generation).unwrap_or(u64::MAX))
    }

    /// Cache a contract read under `ticket`. Returns `false` and caches
    /// nothing if an invalidation happened after the ticket was taken.
    pub fn put(&self, contract: StakingContract, ticket: ReadTicket) -> bool {
        let Ok(mut cache) = self.cache.lock() else {
            return false;
        };
        if cache.generation != ticket.0 {
            return false;
        }
        cache.entries.put(
            contract.contract_id.clone(),
            CacheEntry {
                contract,
                inserted_at: self.clock.unix_now(),
            },
        );
        true
    }

    pub fn invalidate(&self, contract_id: &str) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.generation = cache.generation.wrapping_add(1);
            cache.entries.pop(contract_id);
        }
    }
}
