// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! LRU cache for wallet balance lookups.
//!
//! The frontend polls `GET /api/wallet/:email` while waiting for settlement;
//! caching the chain reads for a short TTL keeps that polling off the RPC
//! node.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;

use crate::blockchain::Balances;

/// Cached entry: balances + insertion timestamp.
struct CacheEntry {
    balances: Balances,
    inserted_at: Instant,
}

/// In-process LRU cache for per-address balance lookups.
pub struct BalanceCache {
    cache: Mutex<LruCache<String, CacheEntry>>,
    ttl: Duration,
}

impl BalanceCache {
    /// Create a new cache with the given capacity and TTL.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap()),
            )),
            ttl,
        }
    }

    /// Get the cached balances for an address.
    ///
    /// Returns `None` if not cached or expired.
    pub fn get(&self, address: &str) -> Option<Balances> {
        let key = address.to_lowercase();
        let mut cache = self.cache.lock().ok()?;
        if let Some(entry) = cache.get(&key) {
            if entry.inserted_at.elapsed() < self.ttl {
                return Some(entry.balances.clone());
            }
            // Expired — remove it
            cache.pop(&key);
        }
        None
    }

    /// Store the balances for an address.
    pub fn put(&self, address: &str, balances: Balances) {
        let key = address.to_lowercase();
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(
                key,
                CacheEntry {
                    balances,
                    inserted_at: Instant::now(),
                },
            );
        }
    }
}
