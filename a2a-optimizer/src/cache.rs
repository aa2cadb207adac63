use std::time::{Duration, Instant};

use a2a_core::TrustLevel;
use dashmap::DashMap;
use serde_json::Value;

const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub tool_id: String,
    pub canonical_params: String,
    pub trust_level: TrustLevel,
}

impl CacheKey {
    pub fn new(tool_id: impl Into<String>, params: &Value, trust_level: TrustLevel) -> Self {
        Self { tool_id: tool_id.into(), canonical_params: params.to_string(), trust_level }
    }
}

struct Entry {
    value: Value,
    cached_at: Instant,
}

/// Response cache keyed by `{toolId, params, trustLevel}` so a trusted and untrusted caller never
/// share a cached response for the same nominal call. Entries expire after `ttl`.
pub struct IntelligentCache {
    entries: DashMap<CacheKey, Entry>,
    ttl: Duration,
}

impl IntelligentCache {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self { entries: DashMap::new(), ttl }
    }

    pub fn put(&self, key: CacheKey, value: Value) {
        self.entries.insert(key, Entry { value, cached_at: Instant::now() });
    }

    /// Returns `Some((value, cache_hit=true))` on a live hit, evicting the entry if it's expired.
    pub fn get(&self, key: &CacheKey) -> Option<Value> {
        let expired = match self.entries.get(key) {
            Some(entry) => entry.cached_at.elapsed() >= self.ttl,
            None => return None,
        };
        if expired {
            self.entries.remove(key);
            return None;
        }
        self.entries.get(key).map(|e| e.value.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for IntelligentCache {
    fn default() -> Self {
        Self::new()
    }
}
