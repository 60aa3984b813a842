//! Region detectors
//!
//! [`RegionDetector`] is the seam shared by face and eye search.
//! [`CascadeDetector`] implements it with a multi-scale sliding window over
//! a [`HaarCascade`], merging overlapping hits the way OpenCV's
//! `detectMultiScale` does.

use std::borrow::Cow;
use std::path::Path;

use image::imageops::{self, FilterType};
use image::GrayImage;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cascade::{HaarCascade, IntegralImages};
use crate::grouping::{group_rectangles, GROUP_EPS};
use crate::{CascadeError, FaceRegion};

/// Anything that returns candidate regions for a grayscale image
pub trait RegionDetector {
    /// Detect regions in `gray`, in detector-native order
    fn detect(&self, gray: &GrayImage) -> Vec<FaceRegion>;
}

impl<D: RegionDetector + ?Sized> RegionDetector for Box<D> {
    fn detect(&self, gray: &GrayImage) -> Vec<FaceRegion> {
        (**self).detect(gray)
    }
}

/// Multi-scale search parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionParams {
    /// Window growth per pyramid level (> 1.0)
    pub scale_factor: f64,
    /// Minimum merged hits for a region to survive grouping (0 keeps raw hits)
    pub min_neighbors: u32,
    /// Smallest region reported (defaults to the cascade window)
    pub min_size: Option<(u32, u32)>,
    /// Largest region reported
    pub max_size: Option<(u32, u32)>,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            scale_factor: 1.1,
            min_neighbors: 4,
            min_size: None,
            max_size: None,
        }
    }
}

impl DetectionParams {
    /// Frontal-face parameters with the given neighbour count
    pub fn with_min_neighbors(min_neighbors: u32) -> Self {
        Self {
            min_neighbors,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), CascadeError> {
        if !(self.scale_factor.is_finite() && self.scale_factor > 1.0) {
            return Err(CascadeError::Invalid(format!(
                "scale factor {} must be greater than 1",
                self.scale_factor
            )));
        }
        Ok(())
    }
}

/// Haar cascade run over an image pyramid
#[derive(Debug, Clone)]
pub struct CascadeDetector {
    cascade: HaarCascade,
    params: DetectionParams,
}

impl CascadeDetector {
    pub fn new(cascade: HaarCascade, params: DetectionParams) -> Result<Self, CascadeError> {
        params.validate()?;
        Ok(Self { cascade, params })
    }

    /// Load an OpenCV cascade XML file
    pub fn from_file(path: impl AsRef<Path>, params: DetectionParams) -> Result<Self, CascadeError> {
        Self::new(HaarCascade::from_file(path)?, params)
    }

    pub fn params(&self) -> &DetectionParams {
        &self.params
    }

    /// Raw window hits before grouping
    fn candidates(&self, gray: &GrayImage) -> Vec<FaceRegion> {
        let (win_w, win_h) = self.cascade.window();
        let (min_w, min_h) = self.params.min_size.unwrap_or((win_w, win_h));
        let (width, height) = gray.dimensions();

        let mut hits = Vec::new();
        let mut factor = 1.0f64;
        loop {
            let scaled_w = (width as f64 / factor).round() as u32;
            let scaled_h = (height as f64 / factor).round() as u32;
            if scaled_w < win_w || scaled_h < win_h {
                break;
            }
            let region_w = (win_w as f64 * factor).round() as u32;
            let region_h = (win_h as f64 * factor).round() as u32;
            if let Some((max_w, max_h)) = self.params.max_size {
                if region_w > max_w || region_h > max_h {
                    break;
                }
            }

            if region_w >= min_w && region_h >= min_h {
                let level: Cow<GrayImage> = if (scaled_w, scaled_h) == (width, height) {
                    Cow::Borrowed(gray)
                } else {
                    Cow::Owned(imageops::resize(gray, scaled_w, scaled_h, FilterType::Triangle))
                };
                let ii = IntegralImages::new(&level);
                let step = if factor > 2.0 { 1 } else { 2 };

                for y in (0..=scaled_h - win_h).step_by(step) {
                    for x in (0..=scaled_w - win_w).step_by(step) {
                        if self.cascade.evaluate(&ii, x, y) {
                            hits.push(
                                FaceRegion::new(
                                    (x as f64 * factor).round() as u32,
                                    (y as f64 * factor).round() as u32,
                                    region_w,
                                    region_h,
                                )
                                .clamp_to(width, height),
                            );
                        }
                    }
                }
            }

            factor *= self.params.scale_factor;
        }
        hits
    }
}

impl RegionDetector for CascadeDetector {
    fn detect(&self, gray: &GrayImage) -> Vec<FaceRegion> {
        let hits = self.candidates(gray);
        let raw = hits.len();
        let grouped = group_rectangles(hits, self.params.min_neighbors, GROUP_EPS);
        debug!("Cascade search: {} raw hits, {} regions", raw, grouped.len());
        grouped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::tests::edge_cascade;
    use image::Luma;

    #[test]
    fn test_rejects_non_growing_scale() {
        let params = DetectionParams {
            scale_factor: 1.0,
            ..Default::default()
        };
        assert!(CascadeDetector::new(edge_cascade(), params).is_err());
    }

    #[test]
    fn test_flat_image_has_no_detections() {
        let detector = CascadeDetector::new(edge_cascade(), DetectionParams::default()).unwrap();
        let flat = GrayImage::from_pixel(64, 48, Luma([128]));
        assert!(detector.detect(&flat).is_empty());
    }

    #[test]
    fn test_image_smaller_than_window() {
        let detector = CascadeDetector::new(edge_cascade(), DetectionParams::default()).unwrap();
        assert!(detector.detect(&GrayImage::new(4, 4)).is_empty());
        assert!(detector.detect(&GrayImage::new(0, 0)).is_empty());
    }

    #[test]
    fn test_edge_found_across_scales() {
        let params = DetectionParams::with_min_neighbors(0);
        let detector = CascadeDetector::new(edge_cascade(), params).unwrap();
        let image = GrayImage::from_fn(40, 40, |x, _| if x < 20 { Luma([20]) } else { Luma([220]) });

        let hits = detector.detect(&image);
        assert!(!hits.is_empty());
        // Every hit sits on the edge (within resampling blur) and inside the image
        for hit in &hits {
            assert!(hit.x <= 26 && hit.right() >= 14, "{:?}", hit);
            assert!(hit.right() <= 40 && hit.bottom() <= 40);
        }
        // More than one scale contributes
        assert!(hits.iter().any(|h| h.width > 8));
    }

    #[test]
    fn test_max_size_limits_scales() {
        let params = DetectionParams {
            min_neighbors: 0,
            max_size: Some((8, 8)),
            ..Default::default()
        };
        let detector = CascadeDetector::new(edge_cascade(), params).unwrap();
        let image = GrayImage::from_fn(40, 40, |x, _| if x < 20 { Luma([20]) } else { Luma([220]) });
        assert!(detector.detect(&image).iter().all(|h| h.width == 8));
    }
}
