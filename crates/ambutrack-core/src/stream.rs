// ── Reactive fleet streams ──
//
// Subscription types for consuming fleet changes from the FleetStore.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::VehicleRecord;

/// One immutable view of the fleet, ordered by vehicle id.
pub type FleetSnapshot = Arc<Vec<Arc<VehicleRecord>>>;

/// A subscription to the fleet.
///
/// Provides both point-in-time snapshot access and reactive change
/// notification via the `changed()` method or by converting to a `Stream`.
pub struct FleetStream {
    current: FleetSnapshot,
    receiver: watch::Receiver<FleetSnapshot>,
}

impl FleetStream {
    pub(crate) fn new(receiver: watch::Receiver<FleetSnapshot>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// Get the snapshot captured at creation time (or at the last `changed()`).
    pub fn current(&self) -> &FleetSnapshot {
        &self.current
    }

    /// Get the latest snapshot (may have changed since creation).
    pub fn latest(&self) -> FleetSnapshot {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change, returning the new snapshot.
    /// Returns `None` if the store has been dropped.
    pub async fn changed(&mut self) -> Option<FleetSnapshot> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    ///
    /// The stream yields the current snapshot first, then one item per
    /// observed change.
    pub fn into_stream(self) -> FleetWatchStream {
        FleetWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
pub struct FleetWatchStream {
    inner: WatchStream<FleetSnapshot>,
}

impl Stream for FleetWatchStream {
    type Item = FleetSnapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use futures_util::StreamExt;

    use crate::model::VehicleRecord;
    use crate::store::FleetStore;

    #[tokio::test]
    async fn changed_yields_new_snapshot() {
        let store = FleetStore::new();
        let mut fleet = store.subscribe();
        assert!(fleet.current().is_empty());

        store.upsert(VehicleRecord::new("A1", Utc::now()));

        let snap = fleet.changed().await.unwrap();
        assert_eq!(snap.len(), 1);
        assert_eq!(fleet.current().len(), 1);
    }

    #[test]
    fn changed_stays_pending_until_a_write() {
        let store = FleetStore::new();
        let mut fleet = store.subscribe();
        let mut changed = tokio_test::task::spawn(fleet.changed());
        tokio_test::assert_pending!(changed.poll());

        store.upsert(VehicleRecord::new("A1", Utc::now()));
        assert!(changed.is_woken());
        let snap = tokio_test::assert_ready!(changed.poll()).unwrap();
        assert_eq!(snap.len(), 1);
    }

    #[tokio::test]
    async fn stream_starts_with_current_snapshot() {
        let store = FleetStore::new();
        store.upsert(VehicleRecord::new("A1", Utc::now()));

        let mut stream = store.subscribe().into_stream();
        let first = stream.next().await.unwrap();
        assert_eq!(first[0].id, "A1");

        store.upsert(VehicleRecord::new("A2", Utc::now()));
        let second = stream.next().await.unwrap();
        assert_eq!(second.len(), 2);
    }

    #[tokio::test]
    async fn changed_returns_none_after_store_drop() {
        let store = FleetStore::new();
        let mut fleet = store.subscribe();
        drop(store);
        assert!(fleet.changed().await.is_none());
    }
}
