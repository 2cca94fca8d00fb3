//! In-process vehicle for dry runs and tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::info;

use crate::action::FlightAction;
use crate::autopilot::{Autopilot, VehicleIdentity};
use crate::error::LinkError;

/// One call the autopilot received
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutopilotCall {
    Connect,
    Execute(FlightAction),
    Disconnect,
}

#[derive(Default)]
struct VehicleModel {
    connected: bool,
    armed: bool,
    airborne: bool,
    calls: Vec<AutopilotCall>,
    connect_failure: Option<LinkError>,
    failures: HashMap<FlightAction, LinkError>,
}

/// Simulated multicopter that follows the usual arm → takeoff → land rules
pub struct SimulatedAutopilot {
    vehicle: VehicleIdentity,
    model: Mutex<VehicleModel>,
}

impl Default for SimulatedAutopilot {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedAutopilot {
    pub fn new() -> Self {
        Self {
            vehicle: VehicleIdentity {
                system_id: 1,
                component_id: 1,
                autopilot: "SIMULATED".to_string(),
                vehicle_type: "MAV_TYPE_QUADROTOR".to_string(),
            },
            model: Mutex::new(VehicleModel::default()),
        }
    }

    /// Make every `connect` fail with `error`
    pub fn fail_connect(&self, error: LinkError) {
        self.model.lock().connect_failure = Some(error);
    }

    /// Make every `action` fail with `error`
    pub fn fail_action(&self, action: FlightAction, error: LinkError) {
        self.model.lock().failures.insert(action, error);
    }

    /// Calls received so far, oldest first
    pub fn calls(&self) -> Vec<AutopilotCall> {
        self.model.lock().calls.clone()
    }

    pub fn is_armed(&self) -> bool {
        self.model.lock().armed
    }

    pub fn is_airborne(&self) -> bool {
        self.model.lock().airborne
    }
}

fn denied(action: FlightAction) -> LinkError {
    LinkError::Rejected {
        action,
        result: "MAV_RESULT_DENIED".to_string(),
    }
}

#[async_trait]
impl Autopilot for SimulatedAutopilot {
    async fn connect(&self) -> Result<VehicleIdentity, LinkError> {
        let mut model = self.model.lock();
        model.calls.push(AutopilotCall::Connect);
        if let Some(error) = model.connect_failure.clone() {
            return Err(error);
        }
        model.connected = true;
        info!("Simulated vehicle connected");
        Ok(self.vehicle.clone())
    }

    async fn execute(&self, action: FlightAction) -> Result<(), LinkError> {
        let mut model = self.model.lock();
        model.calls.push(AutopilotCall::Execute(action));
        if let Some(error) = model.failures.get(&action) {
            return Err(error.clone());
        }
        if !model.connected {
            return Err(LinkError::NotConnected);
        }

        match action {
            FlightAction::Arm => {
                model.armed = true;
            }
            FlightAction::Takeoff => {
                if !model.armed {
                    return Err(denied(action));
                }
                model.airborne = true;
            }
            FlightAction::Land => {
                model.airborne = false;
                model.armed = false;
            }
        }
        info!("Simulated vehicle accepted {}", action);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), LinkError> {
        let mut model = self.model.lock();
        model.calls.push(AutopilotCall::Disconnect);
        model.connected = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simulated_flight() {
        let sim = SimulatedAutopilot::new();
        sim.connect().await.unwrap();
        sim.execute(FlightAction::Arm).await.unwrap();
        sim.execute(FlightAction::Takeoff).await.unwrap();
        assert!(sim.is_airborne());
        sim.execute(FlightAction::Land).await.unwrap();
        assert!(!sim.is_airborne());
        assert!(!sim.is_armed());

        assert_eq!(
            sim.calls(),
            vec![
                AutopilotCall::Connect,
                AutopilotCall::Execute(FlightAction::Arm),
                AutopilotCall::Execute(FlightAction::Takeoff),
                AutopilotCall::Execute(FlightAction::Land),
            ]
        );
    }

    #[tokio::test]
    async fn test_takeoff_denied_when_disarmed() {
        let sim = SimulatedAutopilot::new();
        sim.connect().await.unwrap();
        let err = sim.execute(FlightAction::Takeoff).await.unwrap_err();
        assert_eq!(err.code(), "COMMAND_REJECTED");
    }

    #[tokio::test]
    async fn test_execute_without_connection() {
        let sim = SimulatedAutopilot::new();
        assert_eq!(
            sim.execute(FlightAction::Arm).await,
            Err(LinkError::NotConnected)
        );
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let sim = SimulatedAutopilot::new();
        sim.fail_connect(LinkError::Timeout("vehicle heartbeat".to_string()));
        assert!(matches!(sim.connect().await, Err(LinkError::Timeout(_))));

        let sim = SimulatedAutopilot::new();
        sim.connect().await.unwrap();
        sim.fail_action(FlightAction::Arm, denied(FlightAction::Arm));
        assert!(sim.execute(FlightAction::Arm).await.is_err());
        assert!(!sim.is_armed());
    }
}
