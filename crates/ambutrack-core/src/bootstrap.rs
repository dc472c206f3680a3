// ── Bootstrap fetcher ──
//
// One-shot REST fetch of the online fleet. Runs at every channel open and
// on explicit refresh, racing with streamed updates. Each fetch carries a
// generation; only the newest generation may touch the store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use ambutrack_api::FleetClient;

use crate::convert::normalize_value;
use crate::credentials::TokenSource;
use crate::error::{CoreError, FETCH_FAILED_MESSAGE};
use crate::model::VehicleRecord;
use crate::status::TrackerStatus;
use crate::store::FleetStore;

/// Outcome of applying a finished fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// The result replaced the store with this many vehicles.
    Applied(usize),
    /// A newer fetch (or a disconnect) superseded this one.
    Stale,
}

pub(crate) struct Bootstrapper {
    client: FleetClient,
    tokens: Arc<dyn TokenSource>,
    store: Arc<FleetStore>,
    status: Arc<TrackerStatus>,
    generation: AtomicU64,
    in_flight: Mutex<Option<JoinHandle<()>>>,
}

impl Bootstrapper {
    pub(crate) fn new(
        client: FleetClient,
        tokens: Arc<dyn TokenSource>,
        store: Arc<FleetStore>,
        status: Arc<TrackerStatus>,
    ) -> Self {
        Self {
            client,
            tokens,
            store,
            status,
            generation: AtomicU64::new(0),
            in_flight: Mutex::new(None),
        }
    }

    /// Fetch and normalize the online fleet. Does not touch the store.
    pub(crate) async fn fetch_online(&self) -> Result<Vec<VehicleRecord>, CoreError> {
        let token = self.tokens.bearer();
        let raw = self.client.list_online_vehicles(token.as_ref()).await?;
        let received_at = Utc::now();
        Ok(raw
            .iter()
            .filter_map(|value| normalize_value(value, received_at))
            .collect())
    }

    /// Run a fetch to completion on the caller's task.
    ///
    /// Dropping the future before it resolves clears the loading flag.
    pub(crate) async fn refresh(&self) -> Result<BootstrapOutcome, CoreError> {
        let generation = self.begin();
        let _loading = LoadingGuard {
            owner: self,
            generation,
        };
        let result = self.fetch_online().await;
        self.finish(generation, result)
    }

    /// Start a fetch in the background, superseding any fetch in flight.
    pub(crate) fn spawn(self: &Arc<Self>) {
        let generation = self.begin();
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let _loading = LoadingGuard {
                owner: &this,
                generation,
            };
            let result = this.fetch_online().await;
            let _ = this.finish(generation, result);
        });

        let previous = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Discard every fetch in flight.
    pub(crate) fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
        self.status.set_loading(false);
    }

    fn begin(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.status.set_loading(true);
        debug!(generation, "bootstrap fetch started");
        generation
    }

    fn finish(
        &self,
        generation: u64,
        result: Result<Vec<VehicleRecord>, CoreError>,
    ) -> Result<BootstrapOutcome, CoreError> {
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(generation, "discarding stale bootstrap result");
            return Ok(BootstrapOutcome::Stale);
        }
        self.status.set_loading(false);

        match result {
            Ok(records) => {
                let stored = self.store.replace_all(records);
                self.store.mark_bootstrap();
                self.status.clear_error();
                info!(vehicles = stored, "online fleet loaded");
                Ok(BootstrapOutcome::Applied(stored))
            }
            Err(e) => {
                warn!(error = %e, "failed to fetch online fleet");
                self.status.set_error(fetch_error_message(&e));
                Err(e)
            }
        }
    }
}

/// Clears the loading flag when a fetch ends without reaching `finish`,
/// provided no newer fetch has started since.
struct LoadingGuard<'a> {
    owner: &'a Bootstrapper,
    generation: u64,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if self.owner.generation.load(Ordering::SeqCst) == self.generation {
            self.owner.status.set_loading(false);
        }
    }
}

/// The server's message when it sent one, otherwise the generic text.
fn fetch_error_message(err: &CoreError) -> String {
    match err {
        CoreError::Fetch {
            message: Some(message),
            ..
        } => message.clone(),
        _ => FETCH_FAILED_MESSAGE.into(),
    }
}
