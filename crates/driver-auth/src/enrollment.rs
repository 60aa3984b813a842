//! Driver enrollment
//!
//! Face samples are captured one trigger at a time. A trigger only counts
//! when the localizer finds exactly one face; zero or several faces are
//! rejected so the caller can prompt for a retry.

use chrono::{DateTime, Utc};
use face_detect::FaceLocalizer;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use video_frame::VideoFrame;

use crate::sample::{encode_samples, FaceSample};
use crate::AuthError;

/// Samples required before enrollment can be committed
pub const MIN_ENROLL_SAMPLES: usize = 5;
/// Samples after which further captures are refused
pub const ENROLL_SOFT_CAP: usize = 20;

/// Why a capture trigger did not yield a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    /// No face in the frame
    NoFace,
    /// More than one face; never pick one silently
    MultipleFaces(usize),
    /// Face region could not be normalized
    Unusable,
    /// Enough samples already captured
    SoftCapReached,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::NoFace => write!(f, "no face detected, try again"),
            RejectReason::MultipleFaces(n) => {
                write!(f, "{} faces detected, only a single face is allowed", n)
            }
            RejectReason::Unusable => write!(f, "face region unusable, try again"),
            RejectReason::SoftCapReached => write!(f, "sample limit reached"),
        }
    }
}

/// Result of one capture trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    Accepted { total: usize },
    Rejected(RejectReason),
}

/// In-progress enrollment for one identity
pub struct EnrollmentSession<'a> {
    localizer: &'a FaceLocalizer,
    samples: Vec<FaceSample>,
    soft_cap: usize,
}

impl<'a> EnrollmentSession<'a> {
    pub fn new(localizer: &'a FaceLocalizer) -> Self {
        Self {
            localizer,
            samples: Vec::new(),
            soft_cap: ENROLL_SOFT_CAP,
        }
    }

    /// Lower the soft cap (never below the commit minimum)
    pub fn with_soft_cap(mut self, soft_cap: usize) -> Self {
        self.soft_cap = soft_cap.max(MIN_ENROLL_SAMPLES);
        self
    }

    /// Handle one capture trigger on `frame`
    pub fn capture(&mut self, frame: &VideoFrame) -> CaptureOutcome {
        if self.is_full() {
            return CaptureOutcome::Rejected(RejectReason::SoftCapReached);
        }
        let Some(gray) = FaceLocalizer::prepare(frame) else {
            debug!("Capture on empty frame");
            return CaptureOutcome::Rejected(RejectReason::NoFace);
        };

        let faces = self.localizer.locate_gray(&gray);
        let outcome = match faces.as_slice() {
            [] => CaptureOutcome::Rejected(RejectReason::NoFace),
            [face] => match FaceSample::from_region(&gray, face) {
                Some(sample) => {
                    self.samples.push(sample);
                    CaptureOutcome::Accepted {
                        total: self.samples.len(),
                    }
                }
                None => CaptureOutcome::Rejected(RejectReason::Unusable),
            },
            many => CaptureOutcome::Rejected(RejectReason::MultipleFaces(many.len())),
        };

        match outcome {
            CaptureOutcome::Accepted { total } => {
                info!("Captured sample {}/{}", total, self.soft_cap)
            }
            CaptureOutcome::Rejected(reason) => debug!("Sample rejected: {}", reason),
        }
        outcome
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Enough samples to commit
    pub fn is_ready(&self) -> bool {
        self.samples.len() >= MIN_ENROLL_SAMPLES
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() >= self.soft_cap
    }

    /// Finish enrollment for `identity`
    pub fn commit(self, identity: &str) -> Result<EnrollmentRecord, AuthError> {
        EnrollmentRecord::new(identity, self.samples)
    }
}

/// Committed enrollment: identity plus samples in capture order
#[derive(Debug, Clone)]
pub struct EnrollmentRecord {
    identity: String,
    samples: Vec<FaceSample>,
    enrolled_at: DateTime<Utc>,
}

impl EnrollmentRecord {
    /// Validate and seal an enrollment
    pub fn new(identity: &str, samples: Vec<FaceSample>) -> Result<Self, AuthError> {
        let identity = identity.trim();
        if identity.is_empty() {
            return Err(AuthError::EmptyIdentity);
        }
        if samples.len() < MIN_ENROLL_SAMPLES {
            return Err(AuthError::InsufficientSamples {
                captured: samples.len(),
                required: MIN_ENROLL_SAMPLES,
            });
        }
        info!("Enrollment committed for '{}' ({} samples)", identity, samples.len());
        Ok(Self {
            identity: identity.to_string(),
            samples,
            enrolled_at: Utc::now(),
        })
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn samples(&self) -> &[FaceSample] {
        &self.samples
    }

    pub fn enrolled_at(&self) -> DateTime<Utc> {
        self.enrolled_at
    }

    /// Form handed to the storage collaborator
    pub fn to_stored(&self) -> Result<StoredRecord, AuthError> {
        Ok(StoredRecord {
            identity: self.identity.clone(),
            blob: encode_samples(&self.samples)?,
            enrolled_at: Some(self.enrolled_at),
        })
    }
}

/// Enrollment as persisted by storage: identity key plus opaque sample blob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub identity: String,
    pub blob: Vec<u8>,
    pub enrolled_at: Option<DateTime<Utc>>,
}

impl StoredRecord {
    pub fn new(identity: impl Into<String>, blob: Vec<u8>) -> Self {
        Self {
            identity: identity.into(),
            blob,
            enrolled_at: None,
        }
    }
}
