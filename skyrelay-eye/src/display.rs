//! Frame sinks for the watch loop

use tracing::debug;

use crate::error::VisionError;
use crate::watch::FrameDisplay;

/// Discards frames. For boards without a screen; the loop then ends on
/// stop requests or when the stream ends.
#[derive(Debug, Default)]
pub struct HeadlessDisplay {
    shown: u64,
}

impl HeadlessDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_shown(&self) -> u64 {
        self.shown
    }
}

impl<F> FrameDisplay<F> for HeadlessDisplay {
    fn show(&mut self, _frame: &F) -> Result<Option<char>, VisionError> {
        self.shown += 1;
        if self.shown % 300 == 0 {
            debug!("{} frames processed", self.shown);
        }
        Ok(None)
    }
}

#[cfg(feature = "opencv")]
pub use window::WindowDisplay;

#[cfg(feature = "opencv")]
mod window {
    use opencv::{core::Mat, highgui};
    use tracing::warn;

    use crate::error::VisionError;
    use crate::watch::FrameDisplay;

    /// HighGUI window polled for one millisecond per frame
    pub struct WindowDisplay {
        title: String,
    }

    impl WindowDisplay {
        pub fn new(title: impl Into<String>) -> Result<Self, VisionError> {
            let title = title.into();
            highgui::named_window(&title, highgui::WINDOW_AUTOSIZE)?;
            Ok(Self { title })
        }
    }

    impl FrameDisplay<Mat> for WindowDisplay {
        fn show(&mut self, frame: &Mat) -> Result<Option<char>, VisionError> {
            highgui::imshow(&self.title, frame)?;
            let key = highgui::wait_key(1)?;
            if key < 0 {
                return Ok(None);
            }
            Ok(Some(((key & 0xFF) as u8) as char))
        }
    }

    impl Drop for WindowDisplay {
        fn drop(&mut self) {
            if let Err(e) = highgui::destroy_all_windows() {
                warn!("Failed to close windows: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_never_reports_keys() {
        let mut display = HeadlessDisplay::new();
        for _ in 0..3 {
            assert_eq!(display.show(&()).unwrap(), None);
        }
        assert_eq!(display.frames_shown(), 3);
    }
}
