use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;

/// Rendered index pages, kept for a fixed time after they were first built.
///
/// Writes never invalidate entries; a fresh post shows up on the index once
/// the cached page expires.
pub struct IndexCache {
    entries: Mutex<LruCache<String, (Instant, String)>>,
    ttl: Duration,
}

impl IndexCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    pub fn key(page: usize, viewer_id: Option<i64>) -> String {
        format!("index:{}:{}", page, viewer_id.unwrap_or(0))
    }

    pub fn get(&self, key: &str) -> Option<String> {
        if self.ttl.is_zero() {
            return None;
        }
        let mut entries = self.entries.lock().ok()?;
        let (stored_at, html) = entries.get(key)?;
        if stored_at.elapsed() < self.ttl {
            return Some(html.clone());
        }
        entries.pop(key);
        None
    }

    pub fn insert(&self, key: String, html: String) {
        if self.ttl.is_zero() {
            return;
        }
        if let Ok(mut entries) = self.entries.lock() {
            entries.put(key, (Instant::now(), html));
        }
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}
