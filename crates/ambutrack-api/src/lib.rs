// ambutrack-api: Async Rust client for the ambulance tracking service (REST + WebSocket)

pub mod client;
pub mod error;
pub mod fleet;
pub mod models;
pub mod transport;
pub mod websocket;

pub use client::FleetClient;
pub use error::Error;
pub use models::{ApiResponse, WireVehicle};
pub use websocket::{Connector, InboundEvent, Payload, SocketEvent, SocketSession, WsConnector};
