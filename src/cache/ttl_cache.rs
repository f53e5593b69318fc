use dashmap::DashMap;
use std::{
    hash::Hash,
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::debug;

/// Entrada de cache con TTL
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            created_at: Instant::now(),
            ttl,
        }
    }

    fn is_expired(&self) -> bool {
        self.created_at.elapsed() >= self.ttl
    }
}

/// Cache concurrente acotado con expiración por entrada.
///
/// Al llenarse descarta primero las entradas expiradas y, si no basta,
/// la más antigua.
#[derive(Debug)]
pub struct TtlCache<K: Clone + Eq + Hash, V> {
    data: Arc<DashMap<K, CacheEntry<V>>>,
    capacity: usize,
    default_ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(capacity: usize, default_ttl: Duration) -> Self {
        Self {
            data: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
            default_ttl,
        }
    }

    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.insert_with_ttl(key, value, self.default_ttl)
    }

    pub fn insert_with_ttl(&self, key: K, value: V, ttl: Duration) -> Option<V> {
        if !self.data.contains_key(&key) && self.data.len() >= self.capacity {
            self.evict_one();
        }
        self.data
            .insert(key, CacheEntry::new(value, ttl))
            .map(|old| old.value)
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let entry = self.data.get(key)?;
        if entry.is_expired() {
            drop(entry);
            self.data.remove(key);
            None
        } else {
            Some(entry.value.clone())
        }
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.data.remove(key).map(|(_, entry)| entry.value)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Limpia entradas expiradas y retorna el número de elementos removidos
    pub fn cleanup_expired(&self) -> usize {
        let before = self.data.len();
        self.data.retain(|_, entry| !entry.is_expired());
        let removed = before.saturating_sub(self.data.len());

        if removed > 0 {
            debug!("Limpiadas {} entradas expiradas del cache", removed);
        }

        removed
    }

    fn evict_one(&self) {
        if self.cleanup_expired() > 0 {
            return;
        }

        let oldest = self
            .data
            .iter()
            .min_by_key(|entry| entry.value().created_at)
            .map(|entry| entry.key().clone());

        if let Some(key) = oldest {
            self.data.remove(&key);
        }
    }
}

impl<K, V> Clone for TtlCache<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            capacity: self.capacity,
            default_ttl: self.default_ttl,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_entries_are_not_returned() {
        let cache: TtlCache<String, u32> = TtlCache::new(10, Duration::from_secs(60));
        cache.insert("vivo".to_string(), 1);
        cache.insert_with_ttl("muerto".to_string(), 2, Duration::ZERO);

        assert_eq!(cache.get(&"vivo".to_string()), Some(1));
        assert_eq!(cache.get(&"muerto".to_string()), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn full_cache_evicts_the_oldest_entry() {
        let cache: TtlCache<u32, u32> = TtlCache::new(2, Duration::from_secs(60));
        cache.insert(1, 1);
        std::thread::sleep(Duration::from_millis(2));
        cache.insert(2, 2);
        cache.insert(3, 3);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&1), None);
        assert_eq!(cache.get(&3), Some(3));
    }

    #[test]
    fn cleanup_reports_removed_entries() {
        let cache: TtlCache<u32, u32> = TtlCache::new(10, Duration::ZERO);
        cache.insert(1, 1);
        cache.insert(2, 2);
        assert_eq!(cache.cleanup_expired(), 2);
        assert_eq!(cache.len(), 0);
    }
}
