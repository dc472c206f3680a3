// Fleet endpoints
//
// The one-shot "online fleet" query used to bootstrap the live view.

use secrecy::SecretString;
use serde_json::Value;
use tracing::debug;

use crate::client::FleetClient;
use crate::error::Error;

/// Path of the online-fleet endpoint, relative to the API root.
pub const ONLINE_FLEET_PATH: &str = "/api/ambulance/online";

impl FleetClient {
    /// List the vehicles the server currently considers online.
    ///
    /// `GET /api/ambulance/online`
    ///
    /// Returns the raw vehicle objects. The body may be the usual
    /// `{ status, message, data }` envelope or a bare array; a missing,
    /// null, or empty `data` yields an empty list.
    pub async fn list_online_vehicles(
        &self,
        token: Option<&SecretString>,
    ) -> Result<Vec<Value>, Error> {
        let url = self.api_url(ONLINE_FLEET_PATH)?;
        let body = self.get_json(url, token).await?;
        let vehicles = unwrap_vehicle_list(body);
        debug!(count = vehicles.len(), "online fleet fetched");
        Ok(vehicles)
    }
}

/// Peel the envelope off a fleet response.
fn unwrap_vehicle_list(body: Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(items)) => items,
            Some(item @ Value::Object(_)) => vec![item],
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}
