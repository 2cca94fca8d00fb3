//! Flight session lifecycle
//!
//! A [`FlightSession`] is the single handle the relay holds over an autopilot.
//! It moves through `Init -> Connected -> Closed` and checks that state before
//! forwarding anything, so a command issued out of order comes back as a
//! [`LinkError`] instead of whatever the transport happens to do.
//!
//! Operations are serialized: an operation lock is held for the whole exchange
//! with the vehicle, so two overlapping `takeoff` requests reach the autopilot
//! one after the other. The lifecycle state sits behind its own lock and can
//! be read while an exchange is in flight.

use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::action::{CommandReport, FlightAction};
use crate::autopilot::{Autopilot, VehicleIdentity};
use crate::error::LinkError;

/// Lifecycle state of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "vehicle", rename_all = "snake_case")]
pub enum SessionState {
    Init,
    Connected(VehicleIdentity),
    Closed,
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Init => "init",
            SessionState::Connected(_) => "connected",
            SessionState::Closed => "closed",
        }
    }
}

pub struct FlightSession {
    autopilot: Arc<dyn Autopilot>,
    operation: Mutex<()>,
    state: RwLock<SessionState>,
    require_connection: bool,
}

impl FlightSession {
    /// Create a session in the `Init` state
    pub fn new(autopilot: Arc<dyn Autopilot>, require_connection: bool) -> Self {
        Self {
            autopilot,
            operation: Mutex::new(()),
            state: RwLock::new(SessionState::Init),
            require_connection,
        }
    }

    /// Current state snapshot. Never waits on an exchange in flight.
    pub fn state(&self) -> SessionState {
        self.state.read().clone()
    }

    /// Open the autopilot link. Connecting an already connected session is a
    /// no-op that reports the known vehicle.
    pub async fn connect(&self) -> Result<CommandReport, LinkError> {
        let _operation = self.operation.lock().await;
        match self.state() {
            SessionState::Connected(vehicle) => {
                info!("Already connected to system {}", vehicle.system_id);
                Ok(CommandReport::connected(vehicle))
            }
            SessionState::Closed => Err(LinkError::SessionClosed),
            SessionState::Init => {
                let vehicle = self.autopilot.connect().await.map_err(|e| {
                    warn!("Connect failed: {}", e);
                    e
                })?;
                info!(
                    "Connected to system {} ({}, {})",
                    vehicle.system_id, vehicle.autopilot, vehicle.vehicle_type
                );
                *self.state.write() = SessionState::Connected(vehicle.clone());
                Ok(CommandReport::connected(vehicle))
            }
        }
    }

    pub async fn arm(&self) -> Result<CommandReport, LinkError> {
        self.perform(FlightAction::Arm).await
    }

    pub async fn takeoff(&self) -> Result<CommandReport, LinkError> {
        self.perform(FlightAction::Takeoff).await
    }

    pub async fn land(&self) -> Result<CommandReport, LinkError> {
        self.perform(FlightAction::Land).await
    }

    /// Forward one action to the autopilot after checking the session state
    pub async fn perform(&self, action: FlightAction) -> Result<CommandReport, LinkError> {
        let _operation = self.operation.lock().await;
        match self.state() {
            SessionState::Closed => return Err(LinkError::SessionClosed),
            SessionState::Init if self.require_connection => {
                warn!("Refusing {} before connect", action);
                return Err(LinkError::NotConnected);
            }
            _ => {}
        }

        info!("Sending {}", action);
        match self.autopilot.execute(action).await {
            Ok(()) => {
                info!("{} accepted", action);
                Ok(CommandReport::accepted(action))
            }
            Err(e) => {
                warn!("{} failed: {}", action, e);
                Err(e)
            }
        }
    }

    /// Close the link. The session cannot be reused afterwards.
    pub async fn disconnect(&self) -> Result<CommandReport, LinkError> {
        let _operation = self.operation.lock().await;
        let previous = std::mem::replace(&mut *self.state.write(), SessionState::Closed);
        match previous {
            SessionState::Closed => return Ok(CommandReport::disconnected()),
            SessionState::Connected(_) => self.autopilot.disconnect().await?,
            SessionState::Init => {}
        }
        info!("Session closed");
        Ok(CommandReport::disconnected())
    }
}
