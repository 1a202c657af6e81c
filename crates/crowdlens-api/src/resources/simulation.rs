// Simulation toggles
//
// The backend can replay synthetic crowd traffic for demos. Responses are
// free-form and returned as raw JSON.

use serde_json::Value;
use tracing::debug;

use crate::error::Error;
use crate::gateway::Gateway;

impl Gateway {
    /// `GET sim/start`
    pub async fn start_simulation(&self) -> Result<Value, Error> {
        debug!("starting simulation");
        self.get("sim/start").await
    }

    /// `GET sim/stop`
    pub async fn stop_simulation(&self) -> Result<Value, Error> {
        debug!("stopping simulation");
        self.get("sim/stop").await
    }
}
