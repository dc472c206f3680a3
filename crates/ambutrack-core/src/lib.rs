// ambutrack-core: Live fleet tracking between ambutrack-api and consumers (CLI).

pub mod bootstrap;
pub mod channel;
pub mod config;
pub mod convert;
pub mod credentials;
pub mod error;
pub mod model;
pub mod status;
pub mod store;
pub mod stream;
pub mod tracker;

// ── Primary re-exports ──────────────────────────────────────────────
pub use bootstrap::BootstrapOutcome;
pub use config::{TlsVerification, TrackerConfig};
pub use credentials::{StaticToken, TokenSource};
pub use error::CoreError;
pub use model::{VehicleRecord, VehicleStatus};
pub use status::ConnectionState;
pub use store::FleetStore;
pub use stream::{FleetSnapshot, FleetStream};
pub use tracker::Tracker;
