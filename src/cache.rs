//! Two-tier TTL cache for computed answers
//!
//! Every answer is written under two keys: a session-scoped key with a short
//! TTL and a session-empty "general" key with a long TTL, so frequently
//! asked questions are reusable across sessions. Reads check the session key
//! first. Expired entries are treated as absent and lazily purged on access,
//! or in bulk by an explicit sweep.

use crate::types::QueryResponse;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct CacheEntry {
    value: QueryResponse,
    expires_at: Instant,
}

/// Two-tier response cache
pub struct ResponseCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    session_ttl: Duration,
    general_ttl: Duration,
}

impl ResponseCache {
    pub fn new(session_ttl: Duration, general_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            session_ttl,
            general_ttl,
        }
    }

    /// Cache key for a query within a scope; the empty scope is the shared
    /// general tier
    fn cache_key(query: &str, session_id: &str) -> String {
        let combined = format!("{}::{}", query, session_id);
        format!("{:x}", Sha256::digest(combined.as_bytes()))
    }

    /// Look up a cached answer, session tier first, then general
    pub fn get(&self, query: &str, session_id: &str) -> Option<QueryResponse> {
        let session_key = Self::cache_key(query, session_id);
        let general_key = Self::cache_key(query, "");

        self.get_by_key(&session_key)
            .or_else(|| self.get_by_key(&general_key))
    }

    fn get_by_key(&self, key: &str) -> Option<QueryResponse> {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        match entries.get(key) {
            Some(entry) if Instant::now() < entry.expires_at => Some(entry.value.clone()),
            Some(_) => {
                // Lazy purge of the expired entry
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Cache an answer under both the session and the general key
    pub fn store(&self, query: &str, response: &QueryResponse, session_id: &str) {
        self.store_with_ttls(query, response, session_id, self.session_ttl, self.general_ttl);
    }

    /// Cache with explicit TTLs; a zero TTL expires immediately
    pub fn store_with_ttls(
        &self,
        query: &str,
        response: &QueryResponse,
        session_id: &str,
        session_ttl: Duration,
        general_ttl: Duration,
    ) {
        let now = Instant::now();
        let mut entries = self.entries.lock().expect("cache lock poisoned");

        entries.insert(
            Self::cache_key(query, session_id),
            CacheEntry {
                value: response.clone(),
                expires_at: now + session_ttl,
            },
        );
        entries.insert(
            Self::cache_key(query, ""),
            CacheEntry {
                value: response.clone(),
                expires_at: now + general_ttl,
            },
        );
    }

    /// Remove every expired entry, returning how many were purged
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        let before = entries.len();
        entries.retain(|_, entry| now < entry.expires_at);
        before - entries.len()
    }

    /// Drop all entries
    pub fn clear(&self) {
        self.entries.lock().expect("cache lock poisoned").clear();
    }

    /// Number of live plus not-yet-purged entries
    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
