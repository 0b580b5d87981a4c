use super::astar::PathResult;
use log::trace;
use std::collections::VecDeque;

/// Small LRU of computed routes keyed by `(start_id, end_id)`
///
/// Routes are requested again on every reroute toward the same destination,
/// and a handful of entries covers the usual back-and-forth.
#[derive(Debug, Clone)]
pub struct PathCache {
    capacity: usize,
    /// Most recently used first
    entries: VecDeque<((String, String), PathResult)>,
    hit_count: usize,
    miss_count: usize,
}

impl Default for PathCache {
    fn default() -> Self {
        Self::new(8)
    }
}

impl PathCache {
    /// A zero capacity disables caching
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
            hit_count: 0,
            miss_count: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, start_id: &str, end_id: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|((s, e), _)| s == start_id && e == end_id)
    }

    /// Look up a route, marking it most recently used
    pub fn get(&mut self, start_id: &str, end_id: &str) -> Option<PathResult> {
        match self.position(start_id, end_id) {
            Some(idx) => {
                self.hit_count += 1;
                let entry = self.entries.remove(idx)?;
                let path = entry.1.clone();
                self.entries.push_front(entry);
                trace!("[PathCache] hit {} -> {}", start_id, end_id);
                Some(path)
            }
            None => {
                self.miss_count += 1;
                None
            }
        }
    }

    /// Drop one route without touching the statistics
    pub fn remove(&mut self, start_id: &str, end_id: &str) -> Option<PathResult> {
        let idx = self.position(start_id, end_id)?;
        self.entries.remove(idx).map(|(_, path)| path)
    }

    /// Store a route, evicting the least recently used one when full
    pub fn insert(&mut self, start_id: &str, end_id: &str, path: PathResult) {
        if self.capacity == 0 {
            return;
        }
        if let Some(idx) = self.position(start_id, end_id) {
            self.entries.remove(idx);
        }
        while self.entries.len() >= self.capacity {
            if let Some(((s, e), _)) = self.entries.pop_back() {
                trace!("[PathCache] evict {} -> {}", s, e);
            }
        }
        self.entries
            .push_front(((start_id.to_string(), end_id.to_string()), path));
    }

    /// Hit count, miss count and hit rate
    pub fn get_statistics(&self) -> (usize, usize, f64) {
        let total = self.hit_count + self.miss_count;
        let hit_rate = if total > 0 {
            self.hit_count as f64 / total as f64
        } else {
            0.0
        };

        (self.hit_count, self.miss_count, hit_rate)
    }

    /// Drop every route; statistics are kept
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Position;
    use crate::navigation::astar::Waypoint;

    fn path(ids: &[&str]) -> PathResult {
        PathResult {
            nodes: ids
                .iter()
                .enumerate()
                .map(|(i, id)| Waypoint {
                    id: id.to_string(),
                    position: Position::new(i as f64, 0.0, 0),
                })
                .collect(),
            cost: ids.len() as f64,
        }
    }

    #[test]
    fn test_hit_and_miss_statistics() {
        let mut cache = PathCache::new(4);
        assert!(cache.get("a", "c").is_none());

        cache.insert("a", "c", path(&["a", "b", "c"]));
        assert_eq!(cache.get("a", "c").unwrap().ids(), vec!["a", "b", "c"]);

        let (hits, misses, hit_rate) = cache.get_statistics();
        assert_eq!(hits, 1);
        assert_eq!(misses, 1);
        assert!((hit_rate - 0.5).abs() < 1e-10);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let mut cache = PathCache::new(2);
        cache.insert("a", "b", path(&["a", "b"]));
        cache.insert("b", "c", path(&["b", "c"]));
        // touch a->b so b->c becomes the oldest
        cache.get("a", "b");
        cache.insert("c", "d", path(&["c", "d"]));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("b", "c").is_none());
        assert!(cache.get("a", "b").is_some());
        assert!(cache.get("c", "d").is_some());
    }

    #[test]
    fn test_reinsert_replaces_entry() {
        let mut cache = PathCache::new(2);
        cache.insert("a", "c", path(&["a", "c"]));
        cache.insert("a", "c", path(&["a", "b", "c"]));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a", "c").unwrap().len(), 3);
    }

    #[test]
    fn test_remove_leaves_statistics() {
        let mut cache = PathCache::new(2);
        cache.insert("a", "b", path(&["a", "b"]));

        assert_eq!(cache.remove("a", "b").unwrap().ids(), vec!["a", "b"]);
        assert!(cache.remove("a", "b").is_none());
        assert!(cache.is_empty());
        assert_eq!(cache.get_statistics(), (0, 0, 0.0));
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let mut cache = PathCache::new(0);
        cache.insert("a", "b", path(&["a", "b"]));
        assert!(cache.is_empty());
        assert!(cache.get("a", "b").is_none());
    }

    #[test]
    fn test_clear() {
        let mut cache = PathCache::default();
        cache.insert("a", "b", path(&["a", "b"]));
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.capacity(), 8);
    }
}
