//! Autopilot abstraction

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::action::FlightAction;
use crate::error::LinkError;

/// Vehicle discovered on the link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleIdentity {
    pub system_id: u8,
    pub component_id: u8,
    pub autopilot: String,
    pub vehicle_type: String,
}

/// Connection to a flight controller.
///
/// Implementations own the transport and its endpoint; callers never pass an
/// address. Every method reports the real outcome of the underlying exchange.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Autopilot: Send + Sync {
    /// Open the link and wait until a vehicle announces itself
    async fn connect(&self) -> Result<VehicleIdentity, LinkError>;

    /// Send one action and wait for the vehicle's verdict
    async fn execute(&self, action: FlightAction) -> Result<(), LinkError>;

    /// Tear the link down
    async fn disconnect(&self) -> Result<(), LinkError>;
}
