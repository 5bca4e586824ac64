//! Explicit query cache keyed by (resource, user), invalidated by hand after writes

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::catalog::Catalog;
use crate::engine::LevelStats;
use crate::progress::ProgressRecord;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Catalog,
    Progress(String),
    Stats(String),
}

#[derive(Debug, Clone)]
enum Entry {
    Catalog(Arc<Catalog>),
    Progress(Arc<Vec<ProgressRecord>>),
    Stats(LevelStats),
}

#[derive(Debug, Default)]
pub struct QueryCache {
    entries: HashMap<CacheKey, Entry>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn catalog(&self) -> Option<Arc<Catalog>> {
        match self.entries.get(&CacheKey::Catalog) {
            Some(Entry::Catalog(c)) => Some(Arc::clone(c)),
            _ => None,
        }
    }

    pub fn put_catalog(&mut self, catalog: Arc<Catalog>) {
        self.entries.insert(CacheKey::Catalog, Entry::Catalog(catalog));
    }

    pub fn progress(&self, user_id: &str) -> Option<Arc<Vec<ProgressRecord>>> {
        match self.entries.get(&CacheKey::Progress(user_id.to_string())) {
            Some(Entry::Progress(p)) => Some(Arc::clone(p)),
            _ => None,
        }
    }

    pub fn put_progress(&mut self, user_id: &str, progress: Arc<Vec<ProgressRecord>>) {
        self.entries
            .insert(CacheKey::Progress(user_id.to_string()), Entry::Progress(progress));
    }

    pub fn stats(&self, user_id: &str) -> Option<LevelStats> {
        match self.entries.get(&CacheKey::Stats(user_id.to_string())) {
            Some(Entry::Stats(s)) => Some(s.clone()),
            _ => None,
        }
    }

    pub fn put_stats(&mut self, user_id: &str, stats: LevelStats) {
        self.entries
            .insert(CacheKey::Stats(user_id.to_string()), Entry::Stats(stats));
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn invalidate(&mut self, key: &CacheKey) {
        self.entries.remove(key);
    }

    /// Drop everything derived from one user's progress
    pub fn invalidate_user(&mut self, user_id: &str) {
        self.invalidate(&CacheKey::Progress(user_id.to_string()));
        self.invalidate(&CacheKey::Stats(user_id.to_string()));
        debug!(user_id, "Invalidated cached progress and stats");
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalidate_user_leaves_other_users_and_catalog() {
        let mut cache = QueryCache::new();
        cache.put_catalog(Arc::new(Catalog::default()));
        cache.put_progress("alice", Arc::new(Vec::new()));
        cache.put_stats("alice", LevelStats::default());
        cache.put_stats("bob", LevelStats::default());

        cache.invalidate_user("alice");

        assert!(cache.catalog().is_some());
        assert!(cache.progress("alice").is_none());
        assert!(cache.stats("alice").is_none());
        assert!(cache.stats("bob").is_some());
    }

    #[test]
    fn keys_do_not_alias() {
        let mut cache = QueryCache::new();
        cache.put_stats("alice", LevelStats::default());
        assert!(cache.contains(&CacheKey::Stats("alice".to_string())));
        assert!(!cache.contains(&CacheKey::Progress("alice".to_string())));
        assert!(cache.progress("alice").is_none());

        cache.clear();
        assert!(cache.stats("alice").is_none());
    }
}
