//! Frame-level face localization

use std::path::Path;

use image::GrayImage;
use imageproc::contrast::equalize_histogram;
use tracing::debug;
use video_frame::VideoFrame;

use crate::{CascadeDetector, CascadeError, DetectionParams, FaceRegion, RegionDetector};

/// Face localizer: grayscale + histogram equalization, then region detection.
///
/// Holds no per-frame state; every call is independent.
pub struct FaceLocalizer {
    detector: Box<dyn RegionDetector>,
}

impl FaceLocalizer {
    pub fn new(detector: impl RegionDetector + 'static) -> Self {
        Self {
            detector: Box::new(detector),
        }
    }

    /// Localizer backed by an OpenCV frontal-face cascade file
    pub fn from_cascade_file(
        path: impl AsRef<Path>,
        params: DetectionParams,
    ) -> Result<Self, CascadeError> {
        Ok(Self::new(CascadeDetector::from_file(path, params)?))
    }

    /// Grayscale, histogram-equalized copy of the frame (`None` if the frame is empty)
    pub fn prepare(frame: &VideoFrame) -> Option<GrayImage> {
        frame.to_gray_image().map(|gray| equalize_histogram(&gray))
    }

    /// Face regions in `frame`; an empty or undecodable frame yields none
    pub fn locate(&self, frame: &VideoFrame) -> Vec<FaceRegion> {
        match Self::prepare(frame) {
            Some(gray) => self.locate_gray(&gray),
            None => {
                debug!("Empty frame {}, nothing to localize", frame.sequence);
                Vec::new()
            }
        }
    }

    /// Face regions in an already prepared image, clipped to its bounds
    pub fn locate_gray(&self, gray: &GrayImage) -> Vec<FaceRegion> {
        let (width, height) = gray.dimensions();
        if width == 0 || height == 0 {
            return Vec::new();
        }
        self.detector
            .detect(gray)
            .into_iter()
            .map(|r| r.clamp_to(width, height))
            .filter(|r| !r.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FixedDetector, ScriptedDetector};
    use image::Luma;

    #[test]
    fn test_empty_frame_yields_nothing() {
        let scripted = ScriptedDetector::new(vec![vec![FaceRegion::new(0, 0, 5, 5)]]);
        let calls = scripted.call_counter();
        let localizer = FaceLocalizer::new(scripted);

        assert!(localizer.locate(&VideoFrame::empty()).is_empty());
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_regions_clipped_to_frame() {
        let localizer = FaceLocalizer::new(FixedDetector::new(vec![
            FaceRegion::new(10, 10, 100, 100),
            FaceRegion::new(500, 500, 10, 10),
        ]));
        let frame = VideoFrame::from_gray(GrayImage::from_pixel(64, 48, Luma([90])));
        assert_eq!(localizer.locate(&frame), vec![FaceRegion::new(10, 10, 54, 38)]);
    }

    #[test]
    fn test_prepare_equalizes() {
        let gray = GrayImage::from_fn(16, 16, |x, _| Luma([100 + (x as u8 % 4)]));
        let prepared = FaceLocalizer::prepare(&VideoFrame::from_gray(gray)).unwrap();
        let max = prepared.pixels().map(|p| p[0]).max().unwrap();
        let min = prepared.pixels().map(|p| p[0]).min().unwrap();
        assert_eq!(max, 255);
        assert!(max - min > 100);
    }
}
