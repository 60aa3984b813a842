//! Normalized face samples and their stored form

use face_detect::FaceRegion;
use image::imageops::{self, FilterType};
use image::GrayImage;
use imageproc::contrast::equalize_histogram;
use serde::{Deserialize, Serialize};

use crate::AuthError;

/// Canonical sample width (pixels)
pub const SAMPLE_WIDTH: u32 = 200;
/// Canonical sample height (pixels)
pub const SAMPLE_HEIGHT: u32 = 200;

/// One normalized face observation: grayscale, histogram-equalized, canonical size
#[derive(Debug, Clone, PartialEq)]
pub struct FaceSample {
    image: GrayImage,
}

impl FaceSample {
    /// Normalize an arbitrary grayscale patch: resize to canonical size, then equalize.
    ///
    /// Equalization is idempotent and canonical-size input skips the resize,
    /// so normalizing a sample again yields the same sample.
    pub fn normalize(patch: &GrayImage) -> Option<Self> {
        if patch.width() == 0 || patch.height() == 0 {
            return None;
        }
        let image = if patch.dimensions() == (SAMPLE_WIDTH, SAMPLE_HEIGHT) {
            equalize_histogram(patch)
        } else {
            let resized = imageops::resize(patch, SAMPLE_WIDTH, SAMPLE_HEIGHT, FilterType::Triangle);
            equalize_histogram(&resized)
        };
        Some(Self { image })
    }

    /// Crop `region` out of a prepared frame and normalize it
    pub fn from_region(prepared: &GrayImage, region: &FaceRegion) -> Option<Self> {
        let region = region.clamp_to(prepared.width(), prepared.height());
        if region.is_empty() {
            return None;
        }
        let patch =
            imageops::crop_imm(prepared, region.x, region.y, region.width, region.height).to_image();
        Self::normalize(&patch)
    }

    pub fn image(&self) -> &GrayImage {
        &self.image
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    fn to_patch(&self) -> SamplePatch {
        SamplePatch {
            width: self.image.width(),
            height: self.image.height(),
            pixels: self.image.as_raw().clone(),
        }
    }
}

/// Serialized image patch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplePatch {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl SamplePatch {
    fn into_image(self) -> Result<GrayImage, AuthError> {
        let (width, height) = (self.width, self.height);
        GrayImage::from_raw(width, height, self.pixels)
            .filter(|img| img.as_raw().len() == width as usize * height as usize)
            .ok_or_else(|| {
                AuthError::CorruptRecord(format!("patch buffer does not match {}x{}", width, height))
            })
    }
}

/// Stored sample payload: older records hold a single patch, newer ones a sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoredSamples {
    Single(SamplePatch),
    Sequence(Vec<SamplePatch>),
}

/// Encode samples (capture order preserved) as an opaque blob
pub fn encode_samples(samples: &[FaceSample]) -> Result<Vec<u8>, AuthError> {
    let payload = StoredSamples::Sequence(samples.iter().map(FaceSample::to_patch).collect());
    postcard::to_allocvec(&payload).map_err(|e| AuthError::Encoding(e.to_string()))
}

/// Decode a blob into raw patches, accepting both the single and sequence forms
pub fn decode_samples(blob: &[u8]) -> Result<Vec<GrayImage>, AuthError> {
    let payload: StoredSamples =
        postcard::from_bytes(blob).map_err(|e| AuthError::CorruptRecord(e.to_string()))?;
    match payload {
        StoredSamples::Single(patch) => Ok(vec![patch.into_image()?]),
        StoredSamples::Sequence(patches) => patches.into_iter().map(SamplePatch::into_image).collect(),
    }
}
