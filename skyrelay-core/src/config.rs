// Configuration for the relay, the GPS monitor and the marker watch loop

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

/// Prefix shared by all environment overrides
pub const ENV_PREFIX: &str = "SKYRELAY_";

/// Flight relay HTTP service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// Origins allowed to make credentialed cross-origin requests
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8000,
            allowed_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

/// Autopilot link configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// MAVLink connection string, e.g. `udpin:0.0.0.0:14540`
    pub endpoint: String,
    /// How long `connect` waits for the first vehicle heartbeat
    pub connect_timeout_secs: u64,
    /// How long a command waits for its COMMAND_ACK before resending
    pub ack_timeout_ms: u64,
    /// Number of sends per command before giving up
    pub command_retries: u32,
    /// Relative takeoff altitude in meters
    pub takeoff_altitude_m: f32,
    pub gcs_system_id: u8,
    pub gcs_component_id: u8,
    pub heartbeat_interval_ms: u64,
    /// Reject arm/takeoff/land until `connect` has succeeded
    pub require_connection: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            endpoint: "udpin:0.0.0.0:14540".to_string(),
            connect_timeout_secs: 10,
            ack_timeout_ms: 1000,
            command_retries: 3,
            takeoff_altitude_m: 2.5,
            gcs_system_id: 245,
            gcs_component_id: 190,
            heartbeat_interval_ms: 1000,
            require_connection: true,
        }
    }
}

/// Where the watch loop reads frames from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CameraSource {
    /// USB webcam by device index
    Device { index: i32 },
    /// Pi camera through a libcamera GStreamer pipeline
    Gstreamer,
    /// Any URI or file path understood by the capture backend
    Uri { uri: String },
}

impl Default for CameraSource {
    fn default() -> Self {
        CameraSource::Device { index: 0 }
    }
}

/// Predefined ArUco dictionaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerDictionary {
    Dict4x4_50,
    Dict5x5_100,
    Dict6x6_250,
    Dict7x7_1000,
    ArucoOriginal,
}

impl MarkerDictionary {
    /// Number of distinct marker identifiers in the dictionary
    pub fn size(&self) -> i32 {
        match self {
            MarkerDictionary::Dict4x4_50 => 50,
            MarkerDictionary::Dict5x5_100 => 100,
            MarkerDictionary::Dict6x6_250 => 250,
            MarkerDictionary::Dict7x7_1000 => 1000,
            MarkerDictionary::ArucoOriginal => 1024,
        }
    }
}

impl Default for MarkerDictionary {
    fn default() -> Self {
        MarkerDictionary::Dict6x6_250
    }
}

/// Marker watch loop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    pub camera: CameraSource,
    /// Capture resolution (width, height)
    pub resolution: (u32, u32),
    pub frame_rate: u32,
    /// Resize every frame to `resolution` before detection
    pub resize_frames: bool,
    pub target_id: i32,
    pub dictionary: MarkerDictionary,
    pub window_title: String,
    pub exit_key: char,
    /// Camera warm-up delay after opening
    pub warmup_ms: u64,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            camera: CameraSource::default(),
            resolution: (640, 480),
            frame_rate: 30,
            resize_frames: false,
            target_id: 42,
            dictionary: MarkerDictionary::default(),
            window_title: "ArUco Detection".to_string(),
            exit_key: 'q',
            warmup_ms: 1000,
        }
    }
}

impl VisionConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_rate == 0 || self.frame_rate > 120 {
            return Err(ConfigError::ValidationError(
                "vision.frame_rate must be between 1 and 120".to_string(),
            ));
        }

        if self.resolution.0 == 0 || self.resolution.1 == 0 {
            return Err(ConfigError::ValidationError(
                "vision.resolution must be non-zero".to_string(),
            ));
        }

        if self.resolution.0 > 7680 || self.resolution.1 > 4320 {
            return Err(ConfigError::ValidationError(
                "vision.resolution too large (max 8K)".to_string(),
            ));
        }

        if let CameraSource::Device { index } = self.camera {
            if !(0..=100).contains(&index) {
                return Err(ConfigError::ValidationError(
                    "vision.camera.index must be between 0 and 100".to_string(),
                ));
            }
        }

        if self.target_id < 0 || self.target_id >= self.dictionary.size() {
            return Err(ConfigError::ValidationError(format!(
                "vision.target_id {} is outside the {:?} dictionary",
                self.target_id, self.dictionary
            )));
        }

        if !self.exit_key.is_ascii() {
            return Err(ConfigError::ValidationError(
                "vision.exit_key must be an ASCII character".to_string(),
            ));
        }

        Ok(())
    }
}

/// GPS monitor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpsConfig {
    pub bind_address: String,
    /// UDP port receiving NMEA sentences
    pub udp_port: u16,
    /// HTTP port serving the map page and WebSocket
    pub http_port: u16,
    pub static_dir: String,
}

impl Default for GpsConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            udp_port: 11123,
            http_port: 3000,
            static_dir: "./public".to_string(),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SkyrelayConfig {
    pub log_level: Option<String>,
    pub server: ServerConfig,
    pub link: LinkConfig,
    pub vision: VisionConfig,
    pub gps: GpsConfig,
}

impl SkyrelayConfig {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.as_ref().display(), e)))?;
        Self::from_str(&content)
    }

    /// Load configuration from string (TOML, then YAML)
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let toml_err = match toml::from_str::<SkyrelayConfig>(content) {
            Ok(config) => return Ok(config),
            Err(e) => e,
        };

        if let Ok(config) = serde_yaml::from_str::<SkyrelayConfig>(content) {
            return Ok(config);
        }

        Err(ConfigError::ParseError(toml_err.to_string()))
    }

    /// Load from an optional file, apply environment overrides, then validate
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply `SKYRELAY_*` overrides. Unparseable values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(level) = var("LOG_LEVEL") {
            self.log_level = Some(level);
        }
        if let Some(host) = var("BIND") {
            self.server.bind_address = host;
        }
        if let Some(port) = var("PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(origins) = var("ALLOWED_ORIGINS") {
            self.server.allowed_origins = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
        if let Some(endpoint) = var("LINK_ENDPOINT") {
            self.link.endpoint = endpoint;
        }
        if let Some(altitude) = var("TAKEOFF_ALTITUDE").and_then(|a| a.parse().ok()) {
            self.link.takeoff_altitude_m = altitude;
        }
        if let Some(index) = var("CAMERA_INDEX").and_then(|i| i.parse().ok()) {
            self.vision.camera = CameraSource::Device { index };
        }
        if let Some(id) = var("TARGET_ID").and_then(|i| i.parse().ok()) {
            self.vision.target_id = id;
        }
        if let Some(port) = var("GPS_UDP_PORT").and_then(|p| p.parse().ok()) {
            self.gps.udp_port = port;
        }
        if let Some(port) = var("GPS_HTTP_PORT").and_then(|p| p.parse().ok()) {
            self.gps.http_port = port;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "server.port cannot be 0".to_string(),
            ));
        }

        for origin in &self.server.allowed_origins {
            if !(origin.starts_with("http://") || origin.starts_with("https://")) {
                return Err(ConfigError::ValidationError(format!(
                    "server.allowed_origins entry '{}' must be an http(s) origin",
                    origin
                )));
            }
        }

        const SCHEMES: [&str; 5] = ["udpin:", "udpout:", "tcpin:", "tcpout:", "serial:"];
        if !SCHEMES.iter().any(|s| self.link.endpoint.starts_with(s)) {
            return Err(ConfigError::ValidationError(format!(
                "link.endpoint '{}' must start with one of {:?}",
                self.link.endpoint, SCHEMES
            )));
        }

        if self.link.connect_timeout_secs == 0 || self.link.ack_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "link timeouts must be > 0".to_string(),
            ));
        }

        if self.link.command_retries == 0 {
            return Err(ConfigError::ValidationError(
                "link.command_retries must be > 0".to_string(),
            ));
        }

        if !(self.link.takeoff_altitude_m > 0.0 && self.link.takeoff_altitude_m <= 120.0) {
            return Err(ConfigError::ValidationError(
                "link.takeoff_altitude_m must be in (0, 120]".to_string(),
            ));
        }

        if self.link.heartbeat_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "link.heartbeat_interval_ms must be > 0".to_string(),
            ));
        }

        if self.gps.udp_port == 0 || self.gps.http_port == 0 {
            return Err(ConfigError::ValidationError(
                "gps ports cannot be 0".to_string(),
            ));
        }

        self.vision.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_config_default() {
        let config = SkyrelayConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.allowed_origins, vec!["http://localhost:3000"]);
        assert_eq!(config.link.endpoint, "udpin:0.0.0.0:14540");
        assert_eq!(config.vision.target_id, 42);
        assert_eq!(config.vision.dictionary, MarkerDictionary::Dict6x6_250);
        assert_eq!(config.vision.camera, CameraSource::Device { index: 0 });
        assert_eq!(config.gps.udp_port, 11123);
        assert_eq!(config.gps.http_port, 3000);
        assert!(config.link.require_connection);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_toml() {
        let config = SkyrelayConfig::from_str(
            r#"
            log_level = "debug"

            [server]
            port = 9000

            [link]
            endpoint = "udpin:127.0.0.1:14550"
            require_connection = false

            [vision.camera]
            kind = "gstreamer"
            "#,
        )
        .unwrap();

        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.server.port, 9000);
        // untouched fields keep their defaults
        assert_eq!(config.server.bind_address, "0.0.0.0");
        assert_eq!(config.link.endpoint, "udpin:127.0.0.1:14550");
        assert!(!config.link.require_connection);
        assert_eq!(config.vision.camera, CameraSource::Gstreamer);
    }

    #[test]
    fn test_config_from_yaml() {
        let config = SkyrelayConfig::from_str(
            "gps:\n  udp_port: 12000\nvision:\n  target_id: 7\n  camera:\n    kind: uri\n    uri: rtsp://drone/stream\n",
        )
        .unwrap();

        assert_eq!(config.gps.udp_port, 12000);
        assert_eq!(config.vision.target_id, 7);
        assert_eq!(
            config.vision.camera,
            CameraSource::Uri { uri: "rtsp://drone/stream".to_string() }
        );
    }

    #[test]
    fn test_config_from_str_rejects_garbage() {
        let result = SkyrelayConfig::from_str("[server\nport = ");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = 8081").unwrap();

        let config = SkyrelayConfig::from_file(file.path()).unwrap();
        assert_eq!(config.server.port, 8081);
    }

    #[test]
    fn test_config_from_missing_file() {
        let result = SkyrelayConfig::from_file("/nonexistent/skyrelay.toml");
        assert!(matches!(result, Err(ConfigError::IoError(_))));
    }

    #[test]
    fn test_config_overrides() {
        let env: HashMap<&str, &str> = [
            ("SKYRELAY_PORT", "8100"),
            ("SKYRELAY_LINK_ENDPOINT", "tcpout:10.0.0.2:5760"),
            ("SKYRELAY_CAMERA_INDEX", "2"),
            ("SKYRELAY_TARGET_ID", "17"),
            ("SKYRELAY_ALLOWED_ORIGINS", "http://a.local, http://b.local"),
            ("SKYRELAY_GPS_UDP_PORT", "not-a-port"),
        ]
        .into_iter()
        .collect();

        let mut config = SkyrelayConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.port, 8100);
        assert_eq!(config.link.endpoint, "tcpout:10.0.0.2:5760");
        assert_eq!(config.vision.camera, CameraSource::Device { index: 2 });
        assert_eq!(config.vision.target_id, 17);
        assert_eq!(config.server.allowed_origins, vec!["http://a.local", "http://b.local"]);
        // unparseable values are ignored
        assert_eq!(config.gps.udp_port, 11123);
    }

    #[test]
    fn test_config_validation_port_zero() {
        let mut config = SkyrelayConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_bad_origin() {
        let mut config = SkyrelayConfig::default();
        config.server.allowed_origins = vec!["localhost:3000".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_bad_endpoint() {
        let mut config = SkyrelayConfig::default();
        config.link.endpoint = "udp://:14540".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_takeoff_altitude() {
        let mut config = SkyrelayConfig::default();
        config.link.takeoff_altitude_m = 0.0;
        assert!(config.validate().is_err());

        config.link.takeoff_altitude_m = f32::NAN;
        assert!(config.validate().is_err());

        config.link.takeoff_altitude_m = 120.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_timeouts() {
        let mut config = SkyrelayConfig::default();
        config.link.ack_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = SkyrelayConfig::default();
        config.link.command_retries = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_vision_validation_frame_rate() {
        let mut vision = VisionConfig::default();
        vision.frame_rate = 0;
        assert!(vision.validate().is_err());

        vision.frame_rate = 121;
        assert!(vision.validate().is_err());

        vision.frame_rate = 120;
        assert!(vision.validate().is_ok());
    }

    #[test]
    fn test_vision_validation_resolution() {
        let mut vision = VisionConfig::default();
        vision.resolution = (0, 480);
        assert!(vision.validate().is_err());

        vision.resolution = (7681, 4320);
        assert!(vision.validate().is_err());
    }

    #[test]
    fn test_vision_validation_target_outside_dictionary() {
        let mut vision = VisionConfig::default();
        vision.target_id = 250;
        assert!(vision.validate().is_err());

        vision.dictionary = MarkerDictionary::Dict7x7_1000;
        assert!(vision.validate().is_ok());

        vision.target_id = -1;
        assert!(vision.validate().is_err());
    }

    #[test]
    fn test_vision_validation_camera_index() {
        let mut vision = VisionConfig::default();
        vision.camera = CameraSource::Device { index: 101 };
        assert!(vision.validate().is_err());

        vision.camera = CameraSource::Device { index: -1 };
        assert!(vision.validate().is_err());
    }
}
