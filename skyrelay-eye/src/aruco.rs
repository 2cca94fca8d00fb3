//! OpenCV ArUco backend: detector, marker images and drawing on `Mat`

use opencv::{
    core::{Mat, Point, Point2f, Scalar, Vector},
    imgcodecs, imgproc,
    objdetect::{
        self, ArucoDetector, DetectorParameters, Dictionary, PredefinedDictionaryType,
        RefineParameters,
    },
    prelude::*,
};
use skyrelay_core::config::MarkerDictionary;
use std::path::Path;
use tracing::info;

use crate::error::VisionError;
use crate::geometry::{Color, Detection, Point2, Quad};
use crate::overlay::Canvas;
use crate::watch::MarkerDetector;

fn predefined(dictionary: MarkerDictionary) -> PredefinedDictionaryType {
    match dictionary {
        MarkerDictionary::Dict4x4_50 => PredefinedDictionaryType::DICT_4X4_50,
        MarkerDictionary::Dict5x5_100 => PredefinedDictionaryType::DICT_5X5_100,
        MarkerDictionary::Dict6x6_250 => PredefinedDictionaryType::DICT_6X6_250,
        MarkerDictionary::Dict7x7_1000 => PredefinedDictionaryType::DICT_7X7_1000,
        MarkerDictionary::ArucoOriginal => PredefinedDictionaryType::DICT_ARUCO_ORIGINAL,
    }
}

fn load_dictionary(dictionary: MarkerDictionary) -> Result<Dictionary, VisionError> {
    Ok(objdetect::get_predefined_dictionary(predefined(dictionary))?)
}

/// ArUco detector with default detection parameters
pub struct ArucoMarkerDetector {
    detector: ArucoDetector,
    gray: Mat,
}

impl ArucoMarkerDetector {
    pub fn new(dictionary: MarkerDictionary) -> Result<Self, VisionError> {
        let dictionary = load_dictionary(dictionary)?;
        let params = DetectorParameters::default()?;
        let refine = RefineParameters::new(10.0, 3.0, true)?;
        Ok(Self {
            detector: ArucoDetector::new(&dictionary, &params, refine)?,
            gray: Mat::default(),
        })
    }
}

impl MarkerDetector<Mat> for ArucoMarkerDetector {
    fn detect(&mut self, frame: &Mat) -> Result<Vec<Detection>, VisionError> {
        imgproc::cvt_color(frame, &mut self.gray, imgproc::COLOR_BGR2GRAY, 0)?;

        let mut corners: Vector<Vector<Point2f>> = Vector::new();
        let mut ids: Vector<i32> = Vector::new();
        let mut rejected: Vector<Vector<Point2f>> = Vector::new();
        self.detector
            .detect_markers(&self.gray, &mut corners, &mut ids, &mut rejected)?;

        let mut detections = Vec::with_capacity(ids.len());
        for (id, quad) in ids.iter().zip(corners.iter()) {
            if quad.len() != 4 {
                return Err(VisionError::Detector(format!(
                    "marker {} has {} corners",
                    id,
                    quad.len()
                )));
            }
            let mut points = [Point2::default(); 4];
            for (slot, p) in points.iter_mut().zip(quad.iter()) {
                *slot = Point2::new(p.x, p.y);
            }
            detections.push(Detection::new(id, points));
        }
        Ok(detections)
    }
}

// pixel positions are truncated, not rounded
fn pixel(p: Point2) -> Point {
    Point::new(p.x as i32, p.y as i32)
}

fn scalar(color: Color) -> Scalar {
    Scalar::new(color.b as f64, color.g as f64, color.r as f64, 0.0)
}

impl Canvas for Mat {
    fn outline(&mut self, quad: &Quad, color: Color, thickness: i32) -> Result<(), VisionError> {
        let mut contour: Vector<Point> = Vector::new();
        for corner in quad {
            contour.push(pixel(*corner));
        }
        let mut contours: Vector<Vector<Point>> = Vector::new();
        contours.push(contour);
        imgproc::polylines(self, &contours, true, scalar(color), thickness, imgproc::LINE_8, 0)?;
        Ok(())
    }

    fn text(
        &mut self,
        text: &str,
        origin: Point2,
        scale: f64,
        color: Color,
        thickness: i32,
    ) -> Result<(), VisionError> {
        imgproc::put_text(
            self,
            text,
            pixel(origin),
            imgproc::FONT_HERSHEY_SIMPLEX,
            scale,
            scalar(color),
            thickness,
            imgproc::LINE_8,
            false,
        )?;
        Ok(())
    }
}

/// Render marker `id` as a `size`x`size` image and write it to `path`
pub fn generate_marker(
    dictionary: MarkerDictionary,
    id: i32,
    size: i32,
    path: impl AsRef<Path>,
) -> Result<(), VisionError> {
    if id < 0 || id >= dictionary.size() {
        return Err(VisionError::Detector(format!(
            "marker {} is outside the {:?} dictionary",
            id, dictionary
        )));
    }

    let dict = load_dictionary(dictionary)?;
    let mut image = Mat::default();
    objdetect::generate_image_marker(&dict, id, size, &mut image, 1)?;

    let path = path.as_ref();
    let target = path.to_string_lossy();
    if !imgcodecs::imwrite(&target, &image, &Vector::new())? {
        return Err(VisionError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("could not write {}", target),
        )));
    }
    info!("Marker {} written to {}", id, path.display());
    Ok(())
}
