//! Pixel-space primitives shared by detectors and the overlay

use serde::{Deserialize, Serialize};

/// Point in image pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// The four corners of a detected marker, in detector order
pub type Quad = [Point2; 4];

/// One marker found in one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub id: i32,
    pub corners: Quad,
}

impl Detection {
    pub fn new(id: i32, corners: Quad) -> Self {
        Self { id, corners }
    }
}

/// Drawing colour in OpenCV's BGR channel order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub b: u8,
    pub g: u8,
    pub r: u8,
}

impl Color {
    pub const GREEN: Color = Color { b: 0, g: 255, r: 0 };
    pub const RED: Color = Color { b: 0, g: 0, r: 255 };
}
