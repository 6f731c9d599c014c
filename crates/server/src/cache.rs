//! Shared response cache for the read and head handlers.
//!
//! Keys are the normalized request URL plus the configured vary headers.
//! Only complete `200` responses are stored.

use crate::metrics::record_cache_lookup;
use axum::http::{HeaderMap, HeaderName, StatusCode, Uri};
use bytes::Bytes;
use dashmap::DashMap;
use porter_core::config::CacheConfig;
use std::time::{Duration, Instant};

/// A response captured for replay.
#[derive(Clone, Debug)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Debug)]
struct Entry {
    response: CachedResponse,
    inserted_at: Instant,
}

pub struct ResponseCache {
    entries: DashMap<String, Entry>,
    ttl: Duration,
    max_entries: usize,
    max_object_bytes: usize,
    vary_headers: Vec<HeaderName>,
}

impl ResponseCache {
    pub fn new(config: &CacheConfig) -> Self {
        let vary_headers = config
            .vary_headers
            .iter()
            .filter_map(|name| match HeaderName::from_bytes(name.as_bytes()) {
                Ok(header) => Some(header),
                Err(_) => {
                    tracing::warn!(header = %name, "ignoring invalid cache vary header");
                    None
                }
            })
            .collect();
        Self {
            entries: DashMap::new(),
            ttl: config.ttl(),
            max_entries: config.max_entries.max(1),
            max_object_bytes: config.max_object_bytes,
            vary_headers,
        }
    }

    /// Build the cache key for a request.
    ///
    /// Query parameters are sorted so that parameter order does not split
    /// entries.
    pub fn key_for(&self, uri: &Uri, headers: &HeaderMap) -> String {
        let mut key = uri.path().to_string();

        if let Some(query) = uri.query().filter(|q| !q.is_empty()) {
            let mut pairs: Vec<&str> = query.split('&').filter(|p| !p.is_empty()).collect();
            pairs.sort_unstable();
            key.push('?');
            key.push_str(&pairs.join("&"));
        }

        for name in &self.vary_headers {
            let value = headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_ascii_lowercase();
            key.push('\n');
            key.push_str(name.as_str());
            key.push(':');
            key.push_str(&value);
        }
        key
    }

    /// Look up a live entry. Expired entries are evicted.
    pub fn lookup(&self, key: &str) -> Option<CachedResponse> {
        match self.entries.get(key) {
            None => {
                record_cache_lookup("miss");
                return None;
            }
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => {
                record_cache_lookup("hit");
                return Some(entry.response.clone());
            }
            Some(_) => {}
        }

        self.entries
            .remove_if(key, |_, entry| entry.inserted_at.elapsed() >= self.ttl);
        record_cache_lookup("expired");
        None
    }

    /// Store a response. Returns whether it was stored.
    ///
    /// Partial content, non-`200` statuses and bodies over the size limit
    /// are refused.
    pub fn store(&self, key: String, response: CachedResponse) -> bool {
        if response.status != StatusCode::OK || response.body.len() > self.max_object_bytes {
            return false;
        }

        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            self.evict_oldest();
        }

        self.entries.insert(
            key,
            Entry {
                response,
                inserted_at: Instant::now(),
            },
        );
        true
    }

    fn evict_oldest(&self) {
        // Collect before removing; removing while iterating would deadlock.
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().inserted_at)
            .map(|entry| entry.key().clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
