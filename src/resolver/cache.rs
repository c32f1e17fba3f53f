//! Time-bounded memo of inference results.
//!
//! Entries are keyed by the normalized utterance plus a bounded fingerprint of
//! the snapshot they were resolved against, so a changed page structure misses
//! instead of replaying a stale selector. Expired entries are dropped lazily on
//! read; nothing sweeps in the background.
//!
//! The fingerprint is a prefix of the serialized snapshot. Two pages whose
//! serializations share that prefix collide on the same key.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;

use crate::resolver::types::ResolvedCommand;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: ResolvedCommand,
    created_at: Instant,
}

#[derive(Debug, Clone)]
pub struct ResolutionCache {
    entries: Arc<Mutex<HashMap<String, CacheEntry>>>,
    ttl: Duration,
    /// 0 = unbounded.
    max_entries: usize,
}

impl ResolutionCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, 0)
    }

    pub fn with_capacity(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl,
            max_entries,
        }
    }

    /// Builds the composite key for an utterance under a snapshot fingerprint.
    pub fn key(normalized: &str, fingerprint: &str) -> String {
        format!("{normalized}-{fingerprint}")
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            tracing::error!("resolution cache lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Returns the cached command if present and younger than the TTL.
    /// An expired entry is removed as a side effect.
    pub fn get(&self, key: &str) -> Option<ResolvedCommand> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.created_at.elapsed() < self.ttl => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                tracing::debug!(key = %key, "cache entry expired");
                None
            }
            None => None,
        }
    }

    /// Last write wins.
    pub fn put(&self, key: String, value: ResolvedCommand) {
        let mut entries = self.lock();
        if self.max_entries > 0 && entries.len() >= self.max_entries && !entries.contains_key(&key)
        {
            // Evict ~10% of the oldest entries
            let mut by_age: Vec<_> = entries
                .iter()
                .map(|(k, v)| (k.clone(), v.created_at))
                .collect();
            by_age.sort_by_key(|(_, t)| *t);
            let to_remove = (by_age.len() / 10).max(1);
            for (old, _) in by_age.into_iter().take(to_remove) {
                entries.remove(&old);
            }
            tracing::debug!(evicted = to_remove, "resolution cache at capacity");
        }
        entries.insert(
            key,
            CacheEntry {
                value,
                created_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::types::Action;

    fn cmd(target: &str) -> ResolvedCommand {
        ResolvedCommand::new(Action::Click, target, "ok")
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = ResolutionCache::new(Duration::from_secs(300));
        let key = ResolutionCache::key("abrir menú", "[{\"tag\":\"nav\"}]");
        cache.put(key.clone(), cmd("#menu"));

        tokio::time::advance(Duration::from_secs(299)).await;
        assert_eq!(cache.get(&key), Some(cmd("#menu")));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get(&key), None);
        assert!(cache.is_empty(), "expired entry should be evicted on read");
    }

    #[tokio::test(start_paused = true)]
    async fn different_fingerprint_misses() {
        let cache = ResolutionCache::new(Duration::from_secs(300));
        cache.put(ResolutionCache::key("abrir menú", "a"), cmd("#menu"));
        assert!(cache.get(&ResolutionCache::key("abrir menú", "b")).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn capacity_evicts_oldest_first() {
        let cache = ResolutionCache::with_capacity(Duration::from_secs(300), 3);
        for i in 0..3 {
            cache.put(format!("k{i}"), cmd(&format!("#e{i}")));
            tokio::time::advance(Duration::from_millis(10)).await;
        }
        cache.put("k3".into(), cmd("#e3"));
        assert_eq!(cache.len(), 3);
        assert!(cache.get("k0").is_none());
        assert!(cache.get("k3").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn overwrite_keeps_last_write() {
        let cache = ResolutionCache::with_capacity(Duration::from_secs(300), 1);
        cache.put("k".into(), cmd("#a"));
        cache.put("k".into(), cmd("#b"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("k").unwrap().target, "#b");
    }
}
