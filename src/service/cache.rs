//! Short-lived response cache for polling HTTP clients.
//!
//! Frontends poll the quote endpoints aggressively; a 0.5 second TTL is
//! enough to collapse a burst of identical requests into one upstream
//! fetch without serving meaningfully stale pages.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::models::QuotesPage;

/// How long a cached page stays fresh.
pub const RESPONSE_CACHE_TTL: Duration = Duration::from_millis(500);

/// Logical request shape: endpoint name plus pagination.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct CacheKey {
    /// Endpoint name, e.g. "indices" or "live".
    pub endpoint: &'static str,
    /// Page size; 0 for unpaginated endpoints.
    pub limit: usize,
    /// Page offset; 0 for unpaginated endpoints.
    pub offset: usize,
}

impl CacheKey {
    /// Key for a paginated endpoint.
    pub fn new(endpoint: &'static str, limit: usize, offset: usize) -> Self {
        Self {
            endpoint,
            limit,
            offset,
        }
    }

    /// Key for an unpaginated endpoint.
    pub fn endpoint(endpoint: &'static str) -> Self {
        Self::new(endpoint, 0, 0)
    }
}

#[derive(Debug)]
struct CacheEntry {
    page: QuotesPage,
    stored_at: Instant,
}

/// TTL cache of [`QuotesPage`] values keyed by request shape.
pub struct ResponseCache {
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
    ttl: Duration,
}

impl ResponseCache {
    /// Cache with the standard TTL.
    pub fn new() -> Self {
        Self::with_ttl(RESPONSE_CACHE_TTL)
    }

    /// Cache with a custom TTL.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<CacheKey, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            log::warn!("Response cache mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// A fresh page for the key, if one is cached.
    pub fn get(&self, key: &CacheKey) -> Option<QuotesPage> {
        let entries = self.lock_entries();
        entries
            .get(key)
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| entry.page.clone())
    }

    /// Store a page, replacing any previous entry for the key.
    pub fn put(&self, key: CacheKey, page: QuotesPage) {
        self.lock_entries().insert(
            key,
            CacheEntry {
                page,
                stored_at: Instant::now(),
            },
        );
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PriceQuote;

    fn page() -> QuotesPage {
        QuotesPage::new(vec![PriceQuote::new("NIFTY 50", 19850.0)], 4)
    }

    #[test]
    fn test_fresh_entry_is_served() {
        let cache = ResponseCache::new();
        let key = CacheKey::endpoint("indices");

        assert!(cache.get(&key).is_none());
        cache.put(key.clone(), page());

        let hit = cache.get(&key).unwrap();
        assert_eq!(hit.quotes[0].symbol, "NIFTY 50");
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let cache = ResponseCache::with_ttl(Duration::ZERO);
        let key = CacheKey::endpoint("indices");

        cache.put(key.clone(), page());
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn test_pagination_is_part_of_the_key() {
        let cache = ResponseCache::new();
        cache.put(CacheKey::new("live", 10, 0), page());

        assert!(cache.get(&CacheKey::new("live", 10, 0)).is_some());
        assert!(cache.get(&CacheKey::new("live", 10, 10)).is_none());
        assert!(cache.get(&CacheKey::new("live", 20, 0)).is_none());
    }
}
