use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use arc_swap::ArcSwap;

/// A keyed snapshot cache.
///
/// Mutations go through `ArcSwap::rcu`, which retries against the latest
/// snapshot if another writer published first. Callers that need a
/// read-modify-write across several keys must serialize those writers
/// themselves.
pub struct KeyedCache<K, V> {
    map: ArcSwap<HashMap<K, V>>,
}

impl<K, V> KeyedCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::from_map(HashMap::new())
    }

    /// Cache seeded with `map`.
    pub fn from_map(map: HashMap<K, V>) -> Self {
        Self {
            map: ArcSwap::from_pointee(map),
        }
    }

    /// Cloned value for `key` from the current snapshot.
    pub fn get(&self, key: &K) -> Option<V> {
        self.map.load().get(key).cloned()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.map.load().contains_key(key)
    }

    /// First value matching `predicate`, in unspecified order.
    pub fn find_first<P>(&self, predicate: P) -> Option<V>
    where
        P: Fn(&V) -> bool,
    {
        self.map.load().values().find(|v| predicate(v)).cloned()
    }

    /// Every value matching `predicate`.
    pub fn filter<P>(&self, predicate: P) -> Vec<V>
    where
        P: Fn(&V) -> bool,
    {
        self.map
            .load()
            .values()
            .filter(|v| predicate(v))
            .cloned()
            .collect()
    }

    /// A copy of every value in the current snapshot.
    pub fn values(&self) -> Vec<V> {
        self.map.load().values().cloned().collect()
    }

    /// The current snapshot. Later writes do not affect it.
    pub fn snapshot(&self) -> Arc<HashMap<K, V>> {
        self.map.load_full()
    }

    /// Entries in the current snapshot.
    pub fn len(&self) -> usize {
        self.map.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.load().is_empty()
    }

    /// Insert or replace.
    pub fn add(&self, key: K, value: V) {
        self.map.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.insert(key.clone(), value.clone());
            next
        });
    }

    /// Replace an existing entry. Returns false (and changes nothing) if the
    /// key is absent.
    pub fn update(&self, key: K, value: V) -> bool {
        self.modify(&key, |slot| *slot = value.clone())
    }

    /// Apply `edit` to an existing entry. Returns false if the key is absent.
    pub fn modify<F>(&self, key: &K, edit: F) -> bool
    where
        F: Fn(&mut V),
    {
        let previous = self.map.rcu(|current| {
            let mut next = HashMap::clone(current);
            if let Some(slot) = next.get_mut(key) {
                edit(slot);
            }
            next
        });
        previous.contains_key(key)
    }

    /// Apply `edit` to every entry matching `predicate`. Returns the number
    /// of entries edited.
    pub fn modify_where<P, F>(&self, predicate: P, edit: F) -> usize
    where
        P: Fn(&V) -> bool,
        F: Fn(&mut V),
    {
        let previous = self.map.rcu(|current| {
            let mut next = HashMap::clone(current);
            for slot in next.values_mut().filter(|v| predicate(v)) {
                edit(slot);
            }
            next
        });
        previous.values().filter(|v| predicate(v)).count()
    }

    /// Remove `key`. Returns the value it held, if any.
    pub fn remove(&self, key: &K) -> Option<V> {
        let previous = self.map.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.remove(key);
            next
        });
        previous.get(key).cloned()
    }

    /// Swap in a whole new map.
    pub fn replace(&self, map: HashMap<K, V>) {
        self.map.store(Arc::new(map));
    }

    /// Rebuild from `loader`. On failure the previous snapshot stays in
    /// place and the error is logged. Returns whether a new snapshot was
    /// published.
    pub fn reload<F, E>(&self, name: &str, loader: F) -> bool
    where
        F: FnOnce() -> Result<HashMap<K, V>, E>,
        E: fmt::Display,
    {
        match loader() {
            Ok(map) => {
                tracing::debug!(cache = name, entries = map.len(), "cache reloaded");
                self.replace(map);
                true
            }
            Err(e) => {
                tracing::warn!(cache = name, error = %e, "cache reload failed, keeping previous snapshot");
                false
            }
        }
    }
}

impl<K, V> Default for KeyedCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for KeyedCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedCache")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn update_only_touches_existing_keys() {
        let cache = KeyedCache::new();
        assert!(!cache.update(1, "one"));
        assert!(cache.is_empty());

        cache.add(1, "one");
        assert!(cache.update(1, "uno"));
        assert_eq!(cache.get(&1), Some("uno"));
    }

    #[test]
    fn snapshots_are_isolated_from_later_writes() {
        let cache = KeyedCache::new();
        cache.add("a", 1);
        let before = cache.snapshot();
        cache.add("b", 2);
        cache.remove(&"a");

        assert_eq!(before.len(), 1);
        assert_eq!(before.get("a"), Some(&1));
        assert_eq!(cache.len(), 1);
        assert!(cache.contains_key(&"b"));
    }

    #[test]
    fn remove_returns_previous_value() {
        let cache = KeyedCache::new();
        cache.add(7u32, String::from("seven"));
        assert_eq!(cache.remove(&7), Some(String::from("seven")));
        assert_eq!(cache.remove(&7), None);
    }

    #[test]
    fn modify_where_counts_matches() {
        let cache = KeyedCache::new();
        for i in 0..6u32 {
            cache.add(i, i);
        }
        let edited = cache.modify_where(|v| v % 2 == 0, |v| *v += 100);
        assert_eq!(edited, 3);
        assert_eq!(cache.get(&2), Some(102));
        assert_eq!(cache.get(&3), Some(3));
        assert_eq!(cache.filter(|v| *v >= 100).len(), 3);
    }

    #[test]
    fn failed_reload_keeps_previous_snapshot() {
        let cache = KeyedCache::new();
        cache.add("kept", 1);

        let ok = cache.reload("test", || Err::<HashMap<&str, i32>, _>("disk on fire"));
        assert!(!ok);
        assert_eq!(cache.get(&"kept"), Some(1));

        let ok = cache.reload("test", || {
            Ok::<_, String>(HashMap::from([("fresh", 2)]))
        });
        assert!(ok);
        assert_eq!(cache.get(&"kept"), None);
        assert_eq!(cache.get(&"fresh"), Some(2));
    }

    #[test]
    fn concurrent_writers_do_not_lose_updates() {
        let cache = Arc::new(KeyedCache::new());
        let handles: Vec<_> = (0..8u32)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..50u32 {
                        cache.add(t * 1000 + i, i);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cache.len(), 400);
    }

    #[test]
    fn readers_see_whole_snapshots_during_reload() {
        let old: HashMap<u32, u32> = (0..200).map(|k| (k, 0)).collect();
        let new: HashMap<u32, u32> = (100..300).map(|k| (k, 1)).collect();
        let cache = Arc::new(KeyedCache::from_map(old.clone()));
        let done = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let done = Arc::clone(&done);
                let (old, new) = (old.clone(), new.clone());
                std::thread::spawn(move || {
                    let mut seen = 0usize;
                    while !done.load(std::sync::atomic::Ordering::Acquire) || seen == 0 {
                        let snapshot = cache.snapshot();
                        assert!(*snapshot == old || *snapshot == new);
                        seen += 1;
                    }
                    seen
                })
            })
            .collect();

        for round in 0..200 {
            let next = if round % 2 == 0 { new.clone() } else { old.clone() };
            assert!(cache.reload("test", || Ok::<_, String>(next)));
        }
        assert!(cache.reload("test", || Ok::<_, String>(new.clone())));
        done.store(true, std::sync::atomic::Ordering::Release);

        for reader in readers {
            assert!(reader.join().unwrap() > 0);
        }
        assert_eq!(*cache.snapshot(), new);
    }

    #[derive(Clone, Debug)]
    enum Op {
        Add(u8, u16),
        Update(u8, u16),
        Remove(u8),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (any::<u8>(), any::<u16>()).prop_map(|(k, v)| Op::Add(k, v)),
            (any::<u8>(), any::<u16>()).prop_map(|(k, v)| Op::Update(k, v)),
            any::<u8>().prop_map(Op::Remove),
        ]
    }

    proptest! {
        #[test]
        fn behaves_like_a_hashmap(ops in proptest::collection::vec(op(), 0..64)) {
            let cache = KeyedCache::new();
            let mut model = HashMap::new();
            for op in ops {
                match op {
                    Op::Add(k, v) => {
                        cache.add(k, v);
                        model.insert(k, v);
                    }
                    Op::Update(k, v) => {
                        let expected = model.contains_key(&k);
                        if expected {
                            model.insert(k, v);
                        }
                        prop_assert_eq!(cache.update(k, v), expected);
                    }
                    Op::Remove(k) => {
                        prop_assert_eq!(cache.remove(&k), model.remove(&k));
                    }
                }
            }
            prop_assert_eq!(&*cache.snapshot(), &model);
        }

        #[test]
        fn reload_publishes_exactly_the_loaded_map(
            seed in proptest::collection::hash_map(any::<u8>(), any::<u16>(), 0..64),
            loaded in proptest::collection::hash_map(any::<u8>(), any::<u16>(), 0..64),
        ) {
            let cache = KeyedCache::from_map(seed);
            let expected = loaded.clone();
            prop_assert!(cache.reload("test", move || Ok::<_, String>(loaded)));
            prop_assert_eq!(&*cache.snapshot(), &expected);

            let mut values = cache.values();
            let mut expected_values: Vec<u16> = expected.values().copied().collect();
            values.sort_unstable();
            expected_values.sort_unstable();
            prop_assert_eq!(values, expected_values);
        }
    }
}
