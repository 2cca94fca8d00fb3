//! Flight command link for Skyrelay
//!
//! Owns the conversation with the flight controller: the [`Autopilot`] seam,
//! the MAVLink implementation behind it and the [`FlightSession`] that
//! enforces connect-before-command ordering.

pub mod action;
pub mod autopilot;
pub mod error;
pub mod script;
pub mod session;
pub mod simulated;
pub mod transport;

pub use action::{CommandReport, FlightAction};
pub use autopilot::{Autopilot, VehicleIdentity};
pub use error::LinkError;
pub use script::run_flight_test;
pub use session::{FlightSession, SessionState};
pub use simulated::{AutopilotCall, SimulatedAutopilot};
pub use transport::MavlinkAutopilot;
