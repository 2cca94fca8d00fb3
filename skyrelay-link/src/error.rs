//! Error types for skyrelay-link

use crate::action::FlightAction;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LinkError {
    #[error("Not connected to a vehicle")]
    NotConnected,

    #[error("Session is closed")]
    SessionClosed,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Vehicle rejected {action}: {result}")]
    Rejected {
        action: FlightAction,
        result: String,
    },
}

impl LinkError {
    /// Stable machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            LinkError::NotConnected => "NOT_CONNECTED",
            LinkError::SessionClosed => "SESSION_CLOSED",
            LinkError::Transport(_) => "LINK_ERROR",
            LinkError::Timeout(_) => "AUTOPILOT_TIMEOUT",
            LinkError::Rejected { .. } => "COMMAND_REJECTED",
        }
    }
}

impl From<std::io::Error> for LinkError {
    fn from(err: std::io::Error) -> Self {
        LinkError::Transport(err.to_string())
    }
}
