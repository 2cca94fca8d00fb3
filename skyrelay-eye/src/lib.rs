//! skyrelay-eye: fiducial marker watch loop
//!
//! Reads frames from a camera, finds ArUco markers, outlines the target
//! marker and shows a banner with the detection state. The loop and the
//! overlay are backend-agnostic; the OpenCV camera, detector and window live
//! behind the `opencv` feature.

#[cfg(feature = "opencv")]
pub mod aruco;
pub mod camera;
pub mod display;
pub mod error;
pub mod geometry;
pub mod overlay;
pub mod watch;

pub use display::HeadlessDisplay;
pub use error::VisionError;
pub use geometry::{Color, Detection, Point2, Quad};
pub use overlay::{Banner, Canvas, OverlayPlan};
pub use skyrelay_core::config::{CameraSource, MarkerDictionary, VisionConfig};
pub use watch::{
    spawn_watch, FrameDisplay, FrameSource, MarkerDetector, MarkerWatch, StopReason, WatchHandle,
    WatchSummary,
};

#[cfg(feature = "opencv")]
pub use aruco::{generate_marker, ArucoMarkerDetector};
#[cfg(feature = "opencv")]
pub use camera::{probe_cameras, CameraManager};
#[cfg(feature = "opencv")]
pub use display::WindowDisplay;
#[cfg(feature = "opencv")]
pub use opencv::core::Mat;
