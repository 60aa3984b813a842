//! Eye search and the brightness-based eye aspect ratio proxy
//!
//! Eyes are searched for in the upper part of each face box after a second,
//! local histogram equalization. The aspect ratio is not measured from
//! landmarks: each eye box is scored by mean intensity, dark boxes get a low
//! ratio and bright ones a high ratio, and the ratios are averaged.

use face_detect::{FaceRegion, RegionDetector};
use image::imageops;
use image::GrayImage;
use imageproc::contrast::equalize_histogram;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::DmsConfig;

/// Outcome of searching one face for eyes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EyeAssessment {
    /// No eye found; treated as closed
    NoEyes,
    /// One eye found (closed or occluded); treated as closed
    SingleEye,
    /// Two or more eyes scored by brightness
    Measured { ear: f32, eyes: usize },
}

impl EyeAssessment {
    pub fn is_closed(&self, ear_threshold: f32) -> bool {
        match self {
            EyeAssessment::NoEyes | EyeAssessment::SingleEye => true,
            EyeAssessment::Measured { ear, .. } => *ear < ear_threshold,
        }
    }

    pub fn ear(&self) -> Option<f32> {
        match self {
            EyeAssessment::Measured { ear, .. } => Some(*ear),
            _ => None,
        }
    }
}

/// Eye detector plus the brightness-to-ratio mapping
pub struct EyeSearch {
    detector: Box<dyn RegionDetector>,
    search_fraction: f32,
    dark_brightness: f32,
    dark_ear: f32,
    bright_ear: f32,
}

impl EyeSearch {
    pub fn new(detector: impl RegionDetector + 'static, config: &DmsConfig) -> Self {
        Self {
            detector: Box::new(detector),
            search_fraction: config.eye_search_fraction,
            dark_brightness: config.dark_eye_brightness,
            dark_ear: config.dark_eye_ear,
            bright_ear: config.bright_eye_ear,
        }
    }

    /// Search `face` (in `gray` coordinates) for eyes.
    ///
    /// Returns the eye boxes in `gray` coordinates and the assessment.
    pub fn search(&self, gray: &GrayImage, face: &FaceRegion) -> (Vec<FaceRegion>, EyeAssessment) {
        let roi = face
            .upper_fraction(self.search_fraction)
            .clamp_to(gray.width(), gray.height());
        if roi.is_empty() {
            return (Vec::new(), EyeAssessment::NoEyes);
        }

        let patch = imageops::crop_imm(gray, roi.x, roi.y, roi.width, roi.height).to_image();
        let patch = equalize_histogram(&patch);
        let eyes: Vec<FaceRegion> = self
            .detector
            .detect(&patch)
            .into_iter()
            .map(|eye| eye.clamp_to(patch.width(), patch.height()))
            .filter(|eye| !eye.is_empty())
            .collect();

        let assessment = match eyes.len() {
            0 => {
                debug!("No eyes detected in upper face region, assuming closed");
                EyeAssessment::NoEyes
            }
            1 => {
                debug!("Only one eye detected, assuming closed or occluded");
                EyeAssessment::SingleEye
            }
            n => {
                let total: f32 = eyes
                    .iter()
                    .map(|eye| self.ear_for(mean_brightness(&patch, eye)))
                    .sum();
                EyeAssessment::Measured {
                    ear: total / n as f32,
                    eyes: n,
                }
            }
        };

        let eyes = eyes.into_iter().map(|eye| eye.offset(roi.x, roi.y)).collect();
        (eyes, assessment)
    }

    fn ear_for(&self, brightness: f32) -> f32 {
        if brightness < self.dark_brightness {
            self.dark_ear
        } else {
            self.bright_ear
        }
    }
}

/// Mean intensity inside `region` (must lie within `image`)
fn mean_brightness(image: &GrayImage, region: &FaceRegion) -> f32 {
    if region.is_empty() {
        return 0.0;
    }
    let mut sum = 0u64;
    for y in region.y..region.bottom() {
        for x in region.x..region.right() {
            sum += image.get_pixel(x, y)[0] as u64;
        }
    }
    (sum as f64 / region.area() as f64) as f32
}
