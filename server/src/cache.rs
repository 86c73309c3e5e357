//! Resolution caching for library lookups.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

pub const DEFAULT_CAPACITY: usize = 128;

/// Cache of library name -> Context7 id.
///
/// Keys are lowercased and trimmed so `FastAPI` and `fastapi ` share an entry.
pub struct LibraryCache {
    entries: Mutex<LruCache<String, String>>,
}

fn key(library_name: &str) -> String {
    library_name.trim().to_lowercase()
}

impl LibraryCache {
    /// Create a new cache with the specified capacity.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .unwrap_or(NonZeroUsize::new(DEFAULT_CAPACITY).unwrap());
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Get cached id.
    pub fn get(&self, library_name: &str) -> Option<String> {
        let mut entries = self.entries.lock().ok()?;
        entries.get(&key(library_name)).cloned()
    }

    /// Store id in cache.
    pub fn insert(&self, library_name: &str, library_id: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.put(key(library_name), library_id.to_string());
        }
    }

    /// Drop a cached id, e.g. after it stopped returning docs.
    pub fn invalidate(&self, library_name: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.pop(&key(library_name));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LibraryCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_lookup() {
        let cache = LibraryCache::new(4);
        cache.insert("FastAPI", "/fastapi/fastapi");
        assert_eq!(cache.get(" fastapi").as_deref(), Some("/fastapi/fastapi"));
        assert!(cache.get("django").is_none());
    }

    #[test]
    fn test_lru_eviction() {
        let cache = LibraryCache::new(2);
        cache.insert("a", "/a/a");
        cache.insert("b", "/b/b");
        cache.get("a");
        cache.insert("c", "/c/c");

        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_invalidate() {
        let cache = LibraryCache::default();
        cache.insert("react", "/facebook/react");
        cache.invalidate("React");
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_capacity_falls_back() {
        let cache = LibraryCache::new(0);
        cache.insert("x", "/x/x");
        assert_eq!(cache.len(), 1);
    }
}
