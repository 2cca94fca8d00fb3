pub mod config;
pub mod error;

pub use config::{
    CameraSource, GpsConfig, LinkConfig, MarkerDictionary, ServerConfig, SkyrelayConfig,
    VisionConfig,
};
pub use error::ConfigError;
