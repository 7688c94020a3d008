use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tokio::time::Instant;

/// Client-side state derived from the signed-in session. Cleared whenever
/// the session ends so nothing leaks across logins.
pub trait SessionScopedCache: Send + Sync {
    fn name(&self) -> &'static str;
    fn clear_session_data(&self);
}

#[derive(Debug, Clone)]
struct CachedQuery {
    value: Value,
    stored_at: Instant,
}

/// Response cache for authorized GET requests, keyed by path.
#[derive(Debug)]
pub struct QueryCache {
    entries: DashMap<String, CachedQuery>,
    ttl: Duration,
}

impl QueryCache {
    /// Matches the five minute staleness window used for verification.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        let fresh = self
            .entries
            .get(key)
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| entry.value.clone());
        if fresh.is_none() {
            self.entries.remove_if(key, |_, entry| {
                entry.stored_at.elapsed() >= self.ttl
            });
        }
        fresh
    }

    pub fn insert(&self, key: impl Into<String>, value: Value) {
        self.entries.insert(
            key.into(),
            CachedQuery {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TTL)
    }
}

impl SessionScopedCache for QueryCache {
    fn name(&self) -> &'static str {
        "query-cache"
    }

    fn clear_session_data(&self) {
        let dropped = self.entries.len();
        self.entries.clear();
        log::debug!("[QueryCache] cleared {dropped} entries");
    }
}
