//! HTTP surfaces of Skyrelay: the flight relay API and the GPS monitor

pub mod gps;
pub mod http;
pub mod websocket;

pub use gps::{parse_datagram, GpsFix, GpsMonitor};
pub use http::{create_router, ApiState};
pub use websocket::{create_gps_router, GpsHubState};
