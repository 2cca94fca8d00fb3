// Vision commands. They need the `vision` feature (system OpenCV).

#[cfg(not(feature = "vision"))]
use skyrelay_core::config::{MarkerDictionary, VisionConfig};
#[cfg(not(feature = "vision"))]
use std::path::Path;

#[cfg(feature = "vision")]
mod enabled {
    use skyrelay_core::config::{MarkerDictionary, VisionConfig};
    use skyrelay_eye::{
        generate_marker, probe_cameras, spawn_watch, ArucoMarkerDetector, CameraManager,
        FrameDisplay, HeadlessDisplay, Mat, StopReason, VisionError, WatchHandle, WindowDisplay,
    };
    use skyrelay_eye::camera::describe;
    use std::path::Path;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use tracing::{info, warn};

    use crate::wait_for_shutdown;

    fn start<W, F>(config: Arc<VisionConfig>, display: F) -> Result<WatchHandle, VisionError>
    where
        W: FrameDisplay<Mat> + 'static,
        F: FnOnce(&VisionConfig) -> Result<W, VisionError> + Send + 'static,
    {
        let (target_id, exit_key) = (config.target_id, config.exit_key);
        spawn_watch(target_id, exit_key, move || {
            let camera = CameraManager::new(config.clone());
            camera.initialize()?;
            let detector = ArucoMarkerDetector::new(config.dictionary)?;
            Ok((camera, detector, display(&config)?))
        })
    }

    pub async fn watch(config: VisionConfig, headless: bool) -> anyhow::Result<()> {
        info!("Opening {} for marker {}", describe(&config.camera), config.target_id);
        let config = Arc::new(config);
        let handle = if headless {
            start(config, |_| Ok(HeadlessDisplay::new()))?
        } else {
            start(config, |c| WindowDisplay::new(c.window_title.clone()))?
        };

        let stopper = handle.stopper();
        let signal_task = tokio::spawn(async move {
            wait_for_shutdown().await;
            stopper.store(true, Ordering::SeqCst);
        });

        let summary = tokio::task::spawn_blocking(move || handle.join()).await??;
        signal_task.abort();

        info!(
            "Processed {} frames, target visible in {}",
            summary.frames, summary.frames_with_target
        );
        if let StopReason::ReadFailed(msg) = &summary.reason {
            warn!("Camera stopped delivering frames: {}", msg);
        }
        Ok(())
    }

    pub fn cameras(max: i32) -> anyhow::Result<()> {
        for (index, found) in probe_cameras(max) {
            if found {
                println!("Camera {} FOUND", index);
            } else {
                println!("Camera {} not available", index);
            }
        }
        Ok(())
    }

    pub fn marker(
        dictionary: MarkerDictionary,
        id: i32,
        size: i32,
        output: &Path,
    ) -> anyhow::Result<()> {
        generate_marker(dictionary, id, size, output)?;
        println!("Marker {} written to {}", id, output.display());
        Ok(())
    }
}

#[cfg(feature = "vision")]
pub use enabled::{cameras, marker, watch};

#[cfg(not(feature = "vision"))]
fn disabled() -> anyhow::Error {
    anyhow::anyhow!(
        "this build has no camera support; rebuild with `--features vision` (requires OpenCV)"
    )
}

#[cfg(not(feature = "vision"))]
pub async fn watch(_config: VisionConfig, _headless: bool) -> anyhow::Result<()> {
    Err(disabled())
}

#[cfg(not(feature = "vision"))]
pub fn cameras(_max: i32) -> anyhow::Result<()> {
    Err(disabled())
}

#[cfg(not(feature = "vision"))]
pub fn marker(
    _dictionary: MarkerDictionary,
    _id: i32,
    _size: i32,
    _output: &Path,
) -> anyhow::Result<()> {
    Err(disabled())
}
