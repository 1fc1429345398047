//! Result cache (C13, §4.12): an optional, TTL-bounded, content-addressed
//! cache of tool results, keyed by a canonical hash of
//! `(tool_name, provider_name, canonical(args))`.
//!
//! Grounded on the teacher's "global mutable state, explicit init/reset"
//! design note (§9) applied to a narrower scope: unlike [`reason_core::Config`]
//! and [`reason_limiter::FifoLimiter`] this isn't a process-wide singleton —
//! an engine run constructs (or is handed) one `ResultCache` and shares it
//! behind an `Arc`, mirroring how [`reason_events::StreamingManager`] is
//! scoped per run rather than per process.

#![deny(missing_docs)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};

/// Default maximum entry count (§4.12 "default capacity 256").
pub const DEFAULT_MAX_ENTRIES: usize = 256;

struct Entry {
    value: String,
    created_at: Instant,
    seq: u64,
}

/// A bounded, TTL-expiring cache of tool results.
///
/// `ttl = None` disables the cache entirely — every [`ResultCache::get`]
/// misses and [`ResultCache::put`] is a no-op, matching §4.12 "0 = disabled"
/// (0 seconds is translated to `None` by [`reason_core::Config`] loading).
pub struct ResultCache {
    ttl: Option<Duration>,
    max_entries: usize,
    entries: Mutex<HashMap<String, Entry>>,
    next_seq: AtomicU64,
}

impl ResultCache {
    /// Build a cache with an explicit TTL and capacity.
    #[must_use]
    pub fn new(ttl: Option<Duration>, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries: max_entries.max(1),
            entries: Mutex::new(HashMap::new()),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Build a cache from the process [`reason_core::Config`].
    #[must_use]
    pub fn from_config() -> Self {
        let cfg = reason_core::Config::get();
        Self::new(cfg.tool_cache_ttl, cfg.tool_cache_max)
    }

    /// Whether this cache is enabled (non-zero TTL configured).
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.ttl.is_some()
    }

    /// Look up a value by key, lazily purging it if it has expired
    /// (§4.12 "Lookups lazily purge expired entries").
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        let Some(ttl) = self.ttl else {
            return None;
        };
        let mut guard = self.entries.lock().expect("cache lock poisoned");
        let expired = guard.get(key).is_some_and(|e| e.created_at.elapsed() > ttl);
        if expired {
            guard.remove(key);
            return None;
        }
        guard.get(key).map(|e| e.value.clone())
    }

    /// Insert (or refresh) a value under `key`. A no-op when the cache is
    /// disabled. Evicts the single oldest-by-creation entry when the
    /// capacity is exceeded (§4.12 "on overflow, evict the oldest entries").
    pub fn put(&self, key: impl Into<String>, value: impl Into<String>) {
        if self.ttl.is_none() {
            return;
        }
        let key = key.into();
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let mut guard = self.entries.lock().expect("cache lock poisoned");
        guard.insert(
            key,
            Entry {
                value: value.into(),
                created_at: Instant::now(),
                seq,
            },
        );
        while guard.len() > self.max_entries {
            if let Some(oldest_key) = guard.iter().min_by_key(|(_, e)| e.seq).map(|(k, _)| k.clone()) {
                guard.remove(&oldest_key);
            } else {
                break;
            }
        }
    }

    /// Number of entries currently cached (including not-yet-purged expired
    /// ones).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache lock poisoned").len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Build the content-addressed cache key for a tool call: a SHA-256 hex
/// digest of `(tool_name, provider_name, canonical(args))` (§4.12, §8
/// "Canonical-cache law").
#[must_use]
pub fn cache_key(tool_name: &str, provider_name: &str, args: &serde_json::Value) -> String {
    let canonical_args = reason_core::canonical::canonical_string(args);
    let mut hasher = Sha256::new();
    hasher.update(tool_name.as_bytes());
    hasher.update([0u8]);
    hasher.update(provider_name.as_bytes());
    hasher.update([0u8]);
    hasher.update(canonical_args.as_bytes());
    format!("{:x}", hasher.finalize())
}
