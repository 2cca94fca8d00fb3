//! Error types for skyrelay-eye

use skyrelay_core::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VisionError {
    #[error("Camera error: {0}")]
    Camera(String),

    #[error("Detector error: {0}")]
    Detector(String),

    #[error("Display error: {0}")]
    Display(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("OpenCV error: {0}")]
    OpenCv(String),

    #[error("Vision worker panicked")]
    WorkerPanicked,
}

#[cfg(feature = "opencv")]
impl From<opencv::Error> for VisionError {
    fn from(err: opencv::Error) -> Self {
        VisionError::OpenCv(err.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vision_error_display() {
        let err = VisionError::Camera("Camera 0 failed to open".to_string());
        assert_eq!(err.to_string(), "Camera error: Camera 0 failed to open");
    }

    #[test]
    fn test_vision_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no /dev/video0");
        let vision_err: VisionError = io_err.into();
        assert!(matches!(vision_err, VisionError::Io(_)));
    }

    #[test]
    fn test_vision_error_from_config() {
        let err: VisionError = ConfigError::ValidationError("frame_rate".to_string()).into();
        assert!(err.to_string().contains("frame_rate"));
    }
}
