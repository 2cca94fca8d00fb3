//! Detection overlay
//!
//! Turns one frame's detections into a list of drawing steps: an outline and
//! an `ID <n>` label for every instance of the target marker, plus a status
//! banner in the top-left corner. Planning is pure; [`OverlayPlan::draw`]
//! replays the plan onto any [`Canvas`].

use crate::error::VisionError;
use crate::geometry::{Color, Detection, Point2, Quad};

pub const BANNER_ORIGIN: Point2 = Point2::new(10.0, 30.0);
pub const BANNER_SCALE: f64 = 0.8;
pub const LABEL_SCALE: f64 = 0.6;
/// Labels sit this many pixels above the marker's first corner
pub const LABEL_OFFSET: f32 = 10.0;
pub const LINE_THICKNESS: i32 = 2;

/// Something an overlay can be drawn on
pub trait Canvas {
    /// Closed polygon through the four corners
    fn outline(&mut self, quad: &Quad, color: Color, thickness: i32) -> Result<(), VisionError>;

    /// Text with its baseline starting at `origin`
    fn text(
        &mut self,
        text: &str,
        origin: Point2,
        scale: f64,
        color: Color,
        thickness: i32,
    ) -> Result<(), VisionError>;
}

/// Detection state of a single frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Banner {
    Detected(i32),
    NotInFrame(i32),
    NoMarkers,
}

impl Banner {
    pub fn for_frame(target_id: i32, detections: &[Detection]) -> Self {
        if detections.is_empty() {
            Banner::NoMarkers
        } else if detections.iter().any(|d| d.id == target_id) {
            Banner::Detected(target_id)
        } else {
            Banner::NotInFrame(target_id)
        }
    }

    pub fn text(&self) -> String {
        match self {
            Banner::Detected(id) => format!("Marker {} DETECTED", id),
            Banner::NotInFrame(id) => format!("Marker {} not in frame", id),
            Banner::NoMarkers => "No markers detected".to_string(),
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Banner::Detected(_) => Color::GREEN,
            Banner::NotInFrame(_) | Banner::NoMarkers => Color::RED,
        }
    }

    pub fn target_visible(&self) -> bool {
        matches!(self, Banner::Detected(_))
    }
}

/// Label drawn next to a matching marker
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub text: String,
    pub origin: Point2,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverlayPlan {
    pub outlines: Vec<Quad>,
    pub labels: Vec<Label>,
    pub banner: Banner,
}

impl OverlayPlan {
    /// Plan the overlay for `target_id`. Other identifiers only influence the
    /// banner; nothing is drawn around them.
    pub fn new(target_id: i32, detections: &[Detection]) -> Self {
        let matches: Vec<&Detection> = detections.iter().filter(|d| d.id == target_id).collect();

        let outlines = matches.iter().map(|d| d.corners).collect();
        let labels = matches
            .iter()
            .map(|d| {
                let corner = d.corners[0];
                Label {
                    text: format!("ID {}", d.id),
                    origin: Point2::new(corner.x, corner.y - LABEL_OFFSET),
                }
            })
            .collect();

        Self {
            outlines,
            labels,
            banner: Banner::for_frame(target_id, detections),
        }
    }

    pub fn draw<C: Canvas + ?Sized>(&self, canvas: &mut C) -> Result<(), VisionError> {
        for (quad, label) in self.outlines.iter().zip(&self.labels) {
            canvas.outline(quad, Color::GREEN, LINE_THICKNESS)?;
            canvas.text(&label.text, label.origin, LABEL_SCALE, Color::GREEN, LINE_THICKNESS)?;
        }
        canvas.text(
            &self.banner.text(),
            BANNER_ORIGIN,
            BANNER_SCALE,
            self.banner.color(),
            LINE_THICKNESS,
        )
    }
}
