//! Camera sources: USB webcams, the Pi camera through GStreamer, or any URI
//! the capture backend understands

use skyrelay_core::config::CameraSource;

/// libcamera pipeline for the Raspberry Pi camera, ending in an appsink the
/// capture backend can pull BGR frames from
pub fn gstreamer_pipeline(width: u32, height: u32, fps: u32) -> String {
    format!(
        "libcamerasrc ! video/x-raw, width={}, height={}, framerate={}/1 ! videoconvert ! appsink",
        width, height, fps
    )
}

/// Human readable name for log lines
pub fn describe(source: &CameraSource) -> String {
    match source {
        CameraSource::Device { index } => format!("camera {}", index),
        CameraSource::Gstreamer => "Pi camera (GStreamer)".to_string(),
        CameraSource::Uri { uri } => uri.clone(),
    }
}

#[cfg(feature = "opencv")]
pub use capture::{probe_cameras, CameraManager};

#[cfg(feature = "opencv")]
mod capture {
    use opencv::{
        core::{Mat, Size},
        imgproc,
        prelude::*,
        videoio::{
            VideoCapture, CAP_ANY, CAP_GSTREAMER, CAP_PROP_FPS, CAP_PROP_FRAME_HEIGHT,
            CAP_PROP_FRAME_WIDTH,
        },
    };
    use parking_lot::RwLock;
    use skyrelay_core::config::{CameraSource, VisionConfig};
    use std::sync::Arc;
    use std::time::Duration;
    use tracing::{info, warn};

    use super::{describe, gstreamer_pipeline};
    use crate::error::VisionError;
    use crate::watch::FrameSource;

    /// Owns one capture device
    pub struct CameraManager {
        config: Arc<VisionConfig>,
        capture: RwLock<Option<VideoCapture>>,
        is_running: RwLock<bool>,
    }

    impl CameraManager {
        pub fn new(config: Arc<VisionConfig>) -> Self {
            Self {
                config,
                capture: RwLock::new(None),
                is_running: RwLock::new(false),
            }
        }

        /// Open the configured source and let it warm up
        pub fn initialize(&self) -> Result<(), VisionError> {
            if self.capture.read().is_some() && *self.is_running.read() {
                return Ok(());
            }

            let (width, height) = self.config.resolution;
            let fps = self.config.frame_rate;
            let name = describe(&self.config.camera);
            info!("Opening {}", name);

            let mut capture = match &self.config.camera {
                CameraSource::Device { index } => VideoCapture::new(*index, CAP_ANY),
                CameraSource::Gstreamer => {
                    VideoCapture::from_file(&gstreamer_pipeline(width, height, fps), CAP_GSTREAMER)
                }
                CameraSource::Uri { uri } => VideoCapture::from_file(uri, CAP_ANY),
            }
            .map_err(|e| VisionError::Camera(format!("Failed to open {}: {}", name, e)))?;

            if !capture.is_opened()? {
                return Err(VisionError::Camera(format!("Could not open {}", name)));
            }

            if let CameraSource::Device { .. } = self.config.camera {
                // a pipeline carries its own caps; only devices take properties
                capture.set(CAP_PROP_FRAME_WIDTH, width as f64)?;
                capture.set(CAP_PROP_FRAME_HEIGHT, height as f64)?;
                capture.set(CAP_PROP_FPS, fps as f64)?;
            }

            std::thread::sleep(Duration::from_millis(self.config.warmup_ms));

            *self.capture.write() = Some(capture);
            *self.is_running.write() = true;
            info!("Camera opened successfully: {} at {}x{} @ {}fps", name, width, height, fps);
            Ok(())
        }

        /// Read one frame. `None` means the stream has ended.
        pub fn capture_frame(&self) -> Result<Option<Mat>, VisionError> {
            let mut guard = self.capture.write();
            let capture = guard
                .as_mut()
                .ok_or_else(|| VisionError::Camera("Camera not initialized".to_string()))?;

            let mut frame = Mat::default();
            if !capture.read(&mut frame)? || frame.rows() == 0 {
                return Ok(None);
            }

            if !self.config.resize_frames {
                return Ok(Some(frame));
            }
            let (width, height) = self.config.resolution;
            let mut resized = Mat::default();
            imgproc::resize(
                &frame,
                &mut resized,
                Size::new(width as i32, height as i32),
                0.0,
                0.0,
                imgproc::INTER_LINEAR,
            )?;
            Ok(Some(resized))
        }

        pub fn stop(&self) {
            if let Some(mut capture) = self.capture.write().take() {
                if let Err(e) = capture.release() {
                    warn!("Failed to release camera: {}", e);
                }
            }
            *self.is_running.write() = false;
            info!("Camera stopped");
        }

        pub fn is_running(&self) -> bool {
            *self.is_running.read()
        }
    }

    impl FrameSource for CameraManager {
        type Frame = Mat;

        fn read(&mut self) -> Result<Option<Mat>, VisionError> {
            self.capture_frame()
        }
    }

    impl Drop for CameraManager {
        fn drop(&mut self) {
            self.stop();
        }
    }

    /// Try device indices `0..max` and report which ones open
    pub fn probe_cameras(max: i32) -> Vec<(i32, bool)> {
        (0..max)
            .map(|index| {
                let found = match VideoCapture::new(index, CAP_ANY) {
                    Ok(mut capture) => {
                        let opened = capture.is_opened().unwrap_or(false);
                        let _ = capture.release();
                        opened
                    }
                    Err(_) => false,
                };
                (index, found)
            })
            .collect()
    }
}
