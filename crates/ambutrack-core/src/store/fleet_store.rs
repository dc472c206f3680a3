// ── Fleet store: the public face of the vehicle collection ──

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::warn;

use super::collection::KeyedCollection;
use crate::model::VehicleRecord;
use crate::stream::FleetStream;

/// Latest known record per ambulance, keyed by id.
///
/// Shared between the tracker's router task, the bootstrap task, and any
/// number of readers. Writes are last-writer-wins on whole records.
pub struct FleetStore {
    vehicles: KeyedCollection<VehicleRecord>,
    last_bootstrap: watch::Sender<Option<DateTime<Utc>>>,
    last_stream_update: watch::Sender<Option<DateTime<Utc>>>,
}

impl FleetStore {
    pub fn new() -> Self {
        let (last_bootstrap, _) = watch::channel(None);
        let (last_stream_update, _) = watch::channel(None);
        Self {
            vehicles: KeyedCollection::new(),
            last_bootstrap,
            last_stream_update,
        }
    }

    // ── Mutation ─────────────────────────────────────────────────────

    /// Replace the whole fleet. Records with an empty id are dropped.
    /// Returns the number of vehicles stored.
    pub fn replace_all(&self, records: impl IntoIterator<Item = VehicleRecord>) -> usize {
        self.vehicles.replace_all(records.into_iter().filter_map(|record| {
            if record.id.is_empty() {
                warn!("dropping vehicle without an id");
                None
            } else {
                Some((record.id.clone(), record))
            }
        }))
    }

    /// Insert or overwrite the record at `record.id`.
    ///
    /// Returns `true` if the vehicle was new. A record with an empty id is
    /// refused and nothing changes.
    pub fn upsert(&self, record: VehicleRecord) -> bool {
        if record.id.is_empty() {
            warn!("refusing vehicle update without an id");
            return false;
        }
        self.vehicles.upsert(record.id.clone(), record)
    }

    /// Remove every vehicle.
    pub fn clear(&self) {
        self.vehicles.clear();
    }

    pub(crate) fn mark_bootstrap(&self) {
        self.last_bootstrap.send_replace(Some(Utc::now()));
    }

    pub(crate) fn mark_stream_update(&self) {
        self.last_stream_update.send_replace(Some(Utc::now()));
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// All vehicles, ordered by id.
    pub fn list(&self) -> Vec<Arc<VehicleRecord>> {
        self.snapshot().as_ref().clone()
    }

    /// The current snapshot (cheap `Arc` clone).
    pub fn snapshot(&self) -> Arc<Vec<Arc<VehicleRecord>>> {
        self.vehicles.snapshot()
    }

    pub fn get(&self, id: &str) -> Option<Arc<VehicleRecord>> {
        self.vehicles.get(id)
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mutation counter, bumped once per store operation.
    pub fn version(&self) -> u64 {
        self.vehicles.version()
    }

    /// Subscribe to fleet changes.
    pub fn subscribe(&self) -> FleetStream {
        FleetStream::new(self.vehicles.subscribe())
    }

    // ── Metadata ─────────────────────────────────────────────────────

    /// When a bootstrap result was last applied.
    pub fn last_bootstrap(&self) -> Option<DateTime<Utc>> {
        *self.last_bootstrap.borrow()
    }

    /// When a streamed event last touched the store.
    pub fn last_stream_update(&self) -> Option<DateTime<Utc>> {
        *self.last_stream_update.borrow()
    }

    /// Time since the freshest of the two updates.
    pub fn data_age(&self) -> Option<chrono::Duration> {
        self.last_bootstrap()
            .max(self.last_stream_update())
            .map(|t| Utc::now() - t)
    }
}

impl Default for FleetStore {
    fn default() -> Self {
        Self::new()
    }
}
