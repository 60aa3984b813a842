//! Face classifier seam

use thiserror::Error;

use crate::FaceSample;

/// Classifier failures. Training failures leave the gallery empty;
/// prediction failures count as "no match" for that face.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassifierError {
    #[error("Cannot train on an empty sample set")]
    EmptyTrainingSet,

    #[error("{samples} samples but {labels} labels")]
    LabelMismatch { samples: usize, labels: usize },

    #[error("Sample is {actual:?}, classifier expects {expected:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
}

/// Closest gallery label and its distance (lower = more confident)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub label: usize,
    pub distance: f64,
}

/// Classifier trained wholesale over the gallery; never updated incrementally
pub trait FaceClassifier: Sized {
    fn train(samples: &[FaceSample], labels: &[usize]) -> Result<Self, ClassifierError>;

    fn predict(&self, sample: &FaceSample) -> Result<Prediction, ClassifierError>;
}
