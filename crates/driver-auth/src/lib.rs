//! Driver Authentication Module
//!
//! Face recognition-based driver identification:
//! - Face sample normalization and storage blobs
//! - Driver enrollment
//! - LBPH gallery and matching
//! - Bounded verification attempts

pub mod classifier;
pub mod enrollment;
pub mod gallery;
pub mod lbph;
pub mod sample;
pub mod verification;

use face_detect::FaceLocalizer;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use video_frame::VideoFrame;

pub use classifier::{ClassifierError, FaceClassifier, Prediction};
pub use enrollment::{
    CaptureOutcome, EnrollmentRecord, EnrollmentSession, RejectReason, StoredRecord,
    ENROLL_SOFT_CAP, MIN_ENROLL_SAMPLES,
};
pub use gallery::Gallery;
pub use lbph::LbphRecognizer;
pub use sample::{FaceSample, SAMPLE_HEIGHT, SAMPLE_WIDTH};
pub use verification::{VerificationAttempt, VerificationStatus};

/// Predictions at or above this distance are treated as unknown faces
pub const CONFIDENCE_GATE: f64 = 100.0;

/// Authentication error types
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Need at least {required} face samples, captured {captured}")]
    InsufficientSamples { captured: usize, required: usize },

    #[error("Driver name must not be empty")]
    EmptyIdentity,

    #[error("Corrupt sample record: {0}")]
    CorruptRecord(String),

    #[error("Sample encoding failed: {0}")]
    Encoding(String),

    #[error("Gallery training failed: {0}")]
    Training(#[from] ClassifierError),
}

/// Authentication result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AuthResult {
    /// Face matched an enrolled driver
    Authenticated { identity: String, distance: f64 },
    /// Face detected but not recognized (or nobody enrolled)
    Unknown,
    /// No face detected
    NoFace,
}

impl AuthResult {
    pub fn identity(&self) -> Option<&str> {
        match self {
            AuthResult::Authenticated { identity, .. } => Some(identity),
            _ => None,
        }
    }
}

/// Authentication module
pub struct AuthModule<C = LbphRecognizer> {
    localizer: FaceLocalizer,

    gallery: Gallery<C>,

    /// Distance gate (lower distance = more confident)
    confidence_gate: f64,

    /// Current authenticated driver
    current_driver: Option<String>,
}

impl<C: FaceClassifier> AuthModule<C> {
    /// Create new auth module with an empty gallery
    pub fn new(localizer: FaceLocalizer) -> Self {
        Self {
            localizer,
            gallery: Gallery::empty(),
            confidence_gate: CONFIDENCE_GATE,
            current_driver: None,
        }
    }

    pub fn with_confidence_gate(mut self, gate: f64) -> Self {
        self.confidence_gate = gate;
        self
    }

    /// Start capturing enrollment samples
    pub fn enrollment(&self) -> EnrollmentSession<'_> {
        EnrollmentSession::new(&self.localizer)
    }

    /// Rebuild the gallery from every stored record.
    ///
    /// Corrupt records are skipped. A training failure leaves the gallery
    /// empty and is reported; matching keeps working as "no identity".
    pub fn rebuild_gallery(&mut self, records: &[StoredRecord]) -> Result<(), AuthError> {
        self.gallery = Gallery::rebuild(records);
        if let Some(current) = &self.current_driver {
            if !self.gallery.identities().contains(current) {
                info!("Driver '{}' no longer enrolled, logging out", current);
                self.current_driver = None;
            }
        }
        match self.gallery.training_error() {
            Some(e) => Err(AuthError::Training(e.clone())),
            None => Ok(()),
        }
    }

    pub fn gallery(&self) -> &Gallery<C> {
        &self.gallery
    }

    /// Identify the driver in `frame`. The first face region whose
    /// prediction clears the gate wins; faces are not compared to each other.
    pub fn identify(&self, frame: &VideoFrame) -> AuthResult {
        if self.gallery.is_empty() {
            debug!("Gallery empty, skipping match");
            return AuthResult::Unknown;
        }
        let Some(gray) = FaceLocalizer::prepare(frame) else {
            return AuthResult::NoFace;
        };
        let faces = self.localizer.locate_gray(&gray);
        if faces.is_empty() {
            debug!("No face in frame {}", frame.sequence);
            return AuthResult::NoFace;
        }

        for face in &faces {
            let Some(sample) = FaceSample::from_region(&gray, face) else {
                continue;
            };
            match self.gallery.predict(&sample) {
                Some(Ok(prediction)) if prediction.distance < self.confidence_gate => {
                    if let Some(name) = self.gallery.name_of(prediction.label) {
                        return AuthResult::Authenticated {
                            identity: name.to_string(),
                            distance: prediction.distance,
                        };
                    }
                }
                Some(Ok(prediction)) => {
                    debug!("Best match rejected at distance {:.1}", prediction.distance)
                }
                Some(Err(e)) => warn!("Classifier failed on face region: {}", e),
                None => return AuthResult::Unknown,
            }
        }
        AuthResult::Unknown
    }

    /// Identity name of the driver in `frame`, if any
    pub fn match_frame(&self, frame: &VideoFrame) -> Option<String> {
        match self.identify(frame) {
            AuthResult::Authenticated { identity, .. } => Some(identity),
            _ => None,
        }
    }

    /// Authenticate driver from frame, remembering who was recognized
    pub fn authenticate(&mut self, frame: &VideoFrame) -> AuthResult {
        let result = self.identify(frame);
        if let AuthResult::Authenticated { identity, distance } = &result {
            if self.current_driver.as_deref() != Some(identity.as_str()) {
                info!("Driver '{}' authenticated (distance {:.1})", identity, distance);
            }
            self.current_driver = Some(identity.clone());
        }
        result
    }

    /// Get current authenticated driver
    pub fn current_driver(&self) -> Option<&str> {
        self.current_driver.as_deref()
    }

    /// Clear authentication
    pub fn logout(&mut self) {
        self.current_driver = None;
    }
}
