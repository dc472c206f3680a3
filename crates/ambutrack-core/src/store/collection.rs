// ── Keyed reactive collection ──
//
// Concurrent storage with O(1) lookups and push-based change notification
// via `watch` channels. Bulk replacement rebuilds the snapshot once, so
// subscribers never observe a half-applied replace.

use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use tokio::sync::watch;

/// A reactive collection keyed by string id.
///
/// Every mutation bumps a version counter and rebuilds the snapshot that
/// subscribers receive. Snapshots are ordered by key.
pub(crate) struct KeyedCollection<T: Send + Sync + 'static> {
    by_key: DashMap<String, Arc<T>>,

    /// Serializes mutate-then-publish so snapshots are published in order.
    writer: Mutex<()>,

    /// Version counter, bumped on every mutation.
    version: watch::Sender<u64>,

    /// Full snapshot, rebuilt on mutation for efficient subscription.
    snapshot: watch::Sender<Arc<Vec<Arc<T>>>>,
}

impl<T: Send + Sync + 'static> KeyedCollection<T> {
    pub(crate) fn new() -> Self {
        let (version, _) = watch::channel(0u64);
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));

        Self {
            by_key: DashMap::new(),
            writer: Mutex::new(()),
            version,
            snapshot,
        }
    }

    /// Insert or overwrite an entity. Returns `true` if the key was new.
    pub(crate) fn upsert(&self, key: String, entity: T) -> bool {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let is_new = self.by_key.insert(key, Arc::new(entity)).is_none();
        self.publish();
        is_new
    }

    /// Replace the whole collection with `entries`.
    ///
    /// Later entries with a repeated key overwrite earlier ones. Returns the
    /// number of entities stored.
    pub(crate) fn replace_all(&self, entries: impl IntoIterator<Item = (String, T)>) -> usize {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        self.by_key.clear();
        for (key, entity) in entries {
            self.by_key.insert(key, Arc::new(entity));
        }
        self.publish();
        self.by_key.len()
    }

    pub(crate) fn get(&self, key: &str) -> Option<Arc<T>> {
        self.by_key.get(key).map(|r| Arc::clone(r.value()))
    }

    /// Get the current snapshot (cheap `Arc` clone).
    pub(crate) fn snapshot(&self) -> Arc<Vec<Arc<T>>> {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot changes via a `watch::Receiver`.
    pub(crate) fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<T>>>> {
        self.snapshot.subscribe()
    }

    pub(crate) fn version(&self) -> u64 {
        *self.version.borrow()
    }

    /// Remove all entities.
    pub(crate) fn clear(&self) {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        self.by_key.clear();
        self.publish();
    }

    pub(crate) fn len(&self) -> usize {
        self.by_key.len()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn publish(&self) {
        let mut entries: Vec<(String, Arc<T>)> = self
            .by_key
            .iter()
            .map(|r| (r.key().clone(), Arc::clone(r.value())))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        let values: Vec<Arc<T>> = entries.into_iter().map(|(_, v)| v).collect();

        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
        self.version.send_modify(|v| *v += 1);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn upsert_returns_true_for_new_key() {
        let col: KeyedCollection<String> = KeyedCollection::new();
        assert!(col.upsert("key1".into(), "hello".into()));
    }

    #[test]
    fn upsert_returns_false_for_existing_key() {
        let col: KeyedCollection<String> = KeyedCollection::new();
        col.upsert("key1".into(), "hello".into());
        assert!(!col.upsert("key1".into(), "world".into()));
        assert_eq!(*col.get("key1").unwrap(), "world");
    }

    #[test]
    fn replace_all_drops_missing_keys() {
        let col: KeyedCollection<String> = KeyedCollection::new();
        col.upsert("a".into(), "x".into());
        col.upsert("b".into(), "y".into());

        let stored = col.replace_all(vec![("b".into(), "y2".into()), ("c".into(), "z".into())]);

        assert_eq!(stored, 2);
        assert!(col.get("a").is_none());
        assert_eq!(*col.get("b").unwrap(), "y2");
    }

    #[test]
    fn replace_all_is_one_snapshot() {
        let col: KeyedCollection<String> = KeyedCollection::new();
        let mut rx = col.subscribe();
        let before = col.version();

        col.replace_all((0..10).map(|i| (format!("k{i}"), format!("v{i}"))));

        assert_eq!(col.version(), before + 1);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 10);
    }

    #[test]
    fn snapshot_is_sorted_by_key() {
        let col: KeyedCollection<String> = KeyedCollection::new();
        col.upsert("b".into(), "2".into());
        col.upsert("a".into(), "1".into());
        col.upsert("c".into(), "3".into());

        let snap: Vec<String> = col.snapshot().iter().map(|v| (**v).clone()).collect();
        assert_eq!(snap, vec!["1", "2", "3"]);
    }

    #[test]
    fn clear_empties_everything() {
        let col: KeyedCollection<String> = KeyedCollection::new();
        col.upsert("a".into(), "x".into());
        col.clear();
        assert_eq!(col.len(), 0);
        assert!(col.snapshot().is_empty());
    }
}
