//! Local Binary Pattern Histogram (LBPH) recognizer
//!
//! Each sample is turned into a texture descriptor: every interior pixel is
//! encoded as the 8-bit pattern of neighbours brighter than it, the pattern
//! image is split into a grid of cells, and each cell contributes a
//! normalized 256-bin histogram. Prediction is nearest neighbour over the
//! concatenated histograms using the chi-square distance.

use image::GrayImage;
use imageproc::local_binary_patterns::local_binary_pattern;
use tracing::debug;

use crate::classifier::{ClassifierError, FaceClassifier, Prediction};
use crate::FaceSample;

const BINS: usize = 256;
const GRID_X: u32 = 8;
const GRID_Y: u32 = 8;

/// LBPH nearest-neighbour recognizer
#[derive(Debug, Clone)]
pub struct LbphRecognizer {
    dimensions: (u32, u32),
    histograms: Vec<Vec<f32>>,
    labels: Vec<usize>,
}

impl LbphRecognizer {
    /// Spatial LBP histogram of one sample
    pub fn describe(image: &GrayImage) -> Vec<f32> {
        let (width, height) = image.dimensions();
        let code_w = width.saturating_sub(2);
        let code_h = height.saturating_sub(2);
        let cell_w = code_w / GRID_X;
        let cell_h = code_h / GRID_Y;

        let mut descriptor = vec![0.0f32; (GRID_X * GRID_Y) as usize * BINS];
        if cell_w == 0 || cell_h == 0 {
            return descriptor;
        }
        let cell_pixels = (cell_w * cell_h) as f32;

        for gy in 0..GRID_Y {
            for gx in 0..GRID_X {
                let offset = (gy * GRID_X + gx) as usize * BINS;
                let hist = &mut descriptor[offset..offset + BINS];
                for cy in 0..cell_h {
                    for cx in 0..cell_w {
                        // +1: codes are defined for interior pixels only
                        let x = gx * cell_w + cx + 1;
                        let y = gy * cell_h + cy + 1;
                        if let Some(code) = local_binary_pattern(image, x, y) {
                            hist[code as usize] += 1.0;
                        }
                    }
                }
                for bin in hist.iter_mut() {
                    *bin /= cell_pixels;
                }
            }
        }
        descriptor
    }

    /// Alternative chi-square distance, `2 * sum((a - b)^2 / (a + b))`
    pub fn chi_square(a: &[f32], b: &[f32]) -> f64 {
        2.0 * a
            .iter()
            .zip(b)
            .map(|(&p, &q)| {
                let sum = (p + q) as f64;
                if sum > f64::EPSILON {
                    let diff = (p - q) as f64;
                    diff * diff / sum
                } else {
                    0.0
                }
            })
            .sum::<f64>()
    }

    pub fn len(&self) -> usize {
        self.histograms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histograms.is_empty()
    }
}

impl FaceClassifier for LbphRecognizer {
    fn train(samples: &[FaceSample], labels: &[usize]) -> Result<Self, ClassifierError> {
        if samples.is_empty() {
            return Err(ClassifierError::EmptyTrainingSet);
        }
        if samples.len() != labels.len() {
            return Err(ClassifierError::LabelMismatch {
                samples: samples.len(),
                labels: labels.len(),
            });
        }
        let dimensions = samples[0].dimensions();
        if let Some(odd) = samples.iter().find(|s| s.dimensions() != dimensions) {
            return Err(ClassifierError::DimensionMismatch {
                expected: dimensions,
                actual: odd.dimensions(),
            });
        }

        let histograms = samples.iter().map(|s| Self::describe(s.image())).collect();
        debug!("LBPH trained on {} samples", samples.len());
        Ok(Self {
            dimensions,
            histograms,
            labels: labels.to_vec(),
        })
    }

    fn predict(&self, sample: &FaceSample) -> Result<Prediction, ClassifierError> {
        if sample.dimensions() != self.dimensions {
            return Err(ClassifierError::DimensionMismatch {
                expected: self.dimensions,
                actual: sample.dimensions(),
            });
        }
        let query = Self::describe(sample.image());

        let mut best = Prediction {
            label: self.labels[0],
            distance: f64::INFINITY,
        };
        for (hist, &label) in self.histograms.iter().zip(&self.labels) {
            let distance = Self::chi_square(hist, &query);
            if distance < best.distance {
                best = Prediction { label, distance };
            }
        }
        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::noise;
    use image::Luma;

    fn sample(image: &GrayImage) -> FaceSample {
        FaceSample::normalize(image).unwrap()
    }

    #[test]
    fn test_descriptor_cells_are_normalized() {
        let descriptor = LbphRecognizer::describe(sample(&noise(7, 200, 200)).image());
        assert_eq!(descriptor.len(), 64 * BINS);
        for cell in descriptor.chunks(BINS) {
            let total: f32 = cell.iter().sum();
            assert!((total - 1.0).abs() < 1e-3);
        }
    }

    #[test]
    fn test_chi_square_properties() {
        let a = vec![0.5, 0.5, 0.0];
        let b = vec![0.0, 0.5, 0.5];
        assert_eq!(LbphRecognizer::chi_square(&a, &a), 0.0);
        assert!((LbphRecognizer::chi_square(&a, &b) - 2.0).abs() < 1e-9);
        assert_eq!(LbphRecognizer::chi_square(&a, &b), LbphRecognizer::chi_square(&b, &a));
    }

    #[test]
    fn test_train_requires_samples() {
        assert_eq!(
            LbphRecognizer::train(&[], &[]).unwrap_err(),
            ClassifierError::EmptyTrainingSet
        );
        let s = sample(&noise(1, 50, 50));
        assert!(matches!(
            LbphRecognizer::train(&[s], &[0, 1]),
            Err(ClassifierError::LabelMismatch { .. })
        ));
    }

    #[test]
    fn test_nearest_neighbour() {
        let a = sample(&noise(1, 200, 200));
        let b = sample(&noise(2, 200, 200));
        let model = LbphRecognizer::train(&[a.clone(), b.clone()], &[0, 1]).unwrap();

        let hit = model.predict(&b).unwrap();
        assert_eq!(hit.label, 1);
        assert!(hit.distance < 1e-9);

        let flat = sample(&GrayImage::from_pixel(200, 200, Luma([90])));
        let miss = model.predict(&flat).unwrap();
        assert!(miss.distance > 100.0, "distance {}", miss.distance);
    }
}
