//! Flight actions and their reports

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::autopilot::VehicleIdentity;

/// Vehicle actions forwarded to the autopilot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlightAction {
    Arm,
    Takeoff,
    Land,
}

impl FlightAction {
    pub fn name(&self) -> &'static str {
        match self {
            FlightAction::Arm => "arm",
            FlightAction::Takeoff => "takeoff",
            FlightAction::Land => "land",
        }
    }

    /// Status reported once the vehicle accepted the action
    pub fn status(&self) -> &'static str {
        match self {
            FlightAction::Arm => "armed",
            FlightAction::Takeoff => "takeoff initiated",
            FlightAction::Land => "landing",
        }
    }
}

impl fmt::Display for FlightAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of a successful session operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandReport {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle: Option<VehicleIdentity>,
}

impl CommandReport {
    pub fn connected(vehicle: VehicleIdentity) -> Self {
        Self { status: "connected", vehicle: Some(vehicle) }
    }

    pub fn disconnected() -> Self {
        Self { status: "disconnected", vehicle: None }
    }

    pub fn accepted(action: FlightAction) -> Self {
        Self { status: action.status(), vehicle: None }
    }
}
