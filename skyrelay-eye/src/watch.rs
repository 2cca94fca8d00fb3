//! Marker watch loop
//!
//! Reads a frame, detects markers, draws the overlay, shows the frame, repeats.
//! The loop owns its source, detector and display through three small traits
//! so the OpenCV backend and the test fakes plug in the same way.
//!
//! [`spawn_watch`] runs the loop on a dedicated thread. The stop flag behind
//! [`WatchHandle::stop`] is checked at the top of every iteration; a source
//! that blocks inside `read` still holds the worker until it returns.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::VisionError;
use crate::geometry::Detection;
use crate::overlay::{Canvas, OverlayPlan};

/// Produces frames until the stream ends
pub trait FrameSource {
    type Frame: Canvas;

    /// Next frame, or `None` once the stream has ended
    fn read(&mut self) -> Result<Option<Self::Frame>, VisionError>;
}

/// Finds fiducial markers in a frame
#[cfg_attr(test, mockall::automock)]
pub trait MarkerDetector<F> {
    fn detect(&mut self, frame: &F) -> Result<Vec<Detection>, VisionError>;
}

/// Shows annotated frames and reports key presses
pub trait FrameDisplay<F> {
    /// Show `frame` and return the key pressed while it was up, if any
    fn show(&mut self, frame: &F) -> Result<Option<char>, VisionError>;
}

/// Why a watch loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The configured exit key was pressed
    ExitKey,
    /// [`WatchHandle::stop`] was called
    Stopped,
    /// The source returned no frame
    StreamEnded,
    /// The source failed while reading
    ReadFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchSummary {
    pub frames: u64,
    pub frames_with_target: u64,
    pub reason: StopReason,
}

pub struct MarkerWatch<S, D, W> {
    source: S,
    detector: D,
    display: W,
    target_id: i32,
    exit_key: char,
    stop: Arc<AtomicBool>,
}

impl<S, D, W> MarkerWatch<S, D, W>
where
    S: FrameSource,
    D: MarkerDetector<S::Frame>,
    W: FrameDisplay<S::Frame>,
{
    pub fn new(source: S, detector: D, display: W, target_id: i32, exit_key: char) -> Self {
        Self {
            source,
            detector,
            display,
            target_id,
            exit_key,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that ends the loop at the next iteration when set
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    /// Process one frame. Returns `None` to keep going.
    pub fn step(&mut self, summary: &mut WatchSummary) -> Result<Option<StopReason>, VisionError> {
        let mut frame = match self.source.read() {
            Ok(Some(frame)) => frame,
            Ok(None) => return Ok(Some(StopReason::StreamEnded)),
            Err(e) => return Ok(Some(StopReason::ReadFailed(e.to_string()))),
        };

        // rejected candidates never leave the detector
        let detections = self.detector.detect(&frame)?;
        let plan = OverlayPlan::new(self.target_id, &detections);
        plan.draw(&mut frame)?;

        summary.frames += 1;
        if plan.banner.target_visible() {
            summary.frames_with_target += 1;
        }
        debug!("Frame {}: {}", summary.frames, plan.banner.text());

        match self.display.show(&frame)? {
            Some(key) if key == self.exit_key => Ok(Some(StopReason::ExitKey)),
            _ => Ok(None),
        }
    }

    /// Run until the exit key, a stop request or the end of the stream
    pub fn run(&mut self) -> Result<WatchSummary, VisionError> {
        let mut summary = WatchSummary {
            frames: 0,
            frames_with_target: 0,
            reason: StopReason::Stopped,
        };
        let mut last_visible: Option<bool> = None;

        info!("Watching for marker {}", self.target_id);
        loop {
            if self.stop.load(Ordering::SeqCst) {
                summary.reason = StopReason::Stopped;
                break;
            }

            let seen = summary.frames_with_target;
            if let Some(reason) = self.step(&mut summary)? {
                summary.reason = reason;
                break;
            }

            let visible = summary.frames_with_target > seen;
            if last_visible != Some(visible) {
                let view = if visible { "in view" } else { "out of view" };
                info!("Marker {} {}", self.target_id, view);
                last_visible = Some(visible);
            }
        }

        match &summary.reason {
            StopReason::ReadFailed(msg) => warn!("Camera frame read failed: {}", msg),
            reason => info!("Watch loop ended: {:?}", reason),
        }
        Ok(summary)
    }
}

/// Running watch loop on its own thread
pub struct WatchHandle {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<Result<WatchSummary, VisionError>>,
}

impl WatchHandle {
    /// Ask the loop to end after the current frame
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Clone of the stop flag, for signal handlers
    pub fn stopper(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the loop to end
    pub fn join(self) -> Result<WatchSummary, VisionError> {
        self.thread.join().map_err(|_| VisionError::WorkerPanicked)?
    }
}

/// Build the pipeline on a new thread and run it there.
///
/// `build` runs on the worker, so capture devices and windows are created on
/// the thread that uses them. A build error ends the worker and comes back
/// from [`WatchHandle::join`].
pub fn spawn_watch<B, S, D, W>(
    target_id: i32,
    exit_key: char,
    build: B,
) -> Result<WatchHandle, VisionError>
where
    B: FnOnce() -> Result<(S, D, W), VisionError> + Send + 'static,
    S: FrameSource + 'static,
    D: MarkerDetector<S::Frame> + 'static,
    W: FrameDisplay<S::Frame> + 'static,
{
    let stop = Arc::new(AtomicBool::new(false));
    let worker_stop = stop.clone();

    let thread = std::thread::Builder::new()
        .name("marker-watch".to_string())
        .spawn(move || {
            let (source, detector, display) = build()?;
            let mut watch = MarkerWatch::new(source, detector, display, target_id, exit_key);
            watch.stop = worker_stop;
            watch.run()
        })?;

    Ok(WatchHandle { stop, thread })
}
