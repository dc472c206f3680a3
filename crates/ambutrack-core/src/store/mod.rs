// ── Fleet snapshot store ──
//
// Lock-free vehicle storage with push-based change notification.

mod collection;
mod fleet_store;

pub use fleet_store::FleetStore;
