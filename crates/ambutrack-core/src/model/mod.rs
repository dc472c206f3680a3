// ── Domain model ──
//
// The canonical shape of a tracked vehicle. Every wire variant the server
// sends is normalized into these types by `crate::convert`.

pub mod vehicle;

pub use vehicle::{VehicleRecord, VehicleStatus};
