//! Driver Monitoring System (DMS)
//!
//! Per-frame drowsiness tracking:
//! - Face localization
//! - Eye search in the upper face region
//! - Brightness-based eye closure estimate
//! - Consecutive-closure accumulation with duration and rising-edge triggers

pub mod analysis;
pub mod annotate;
pub mod config;
pub mod eyes;
pub mod state;

pub use analysis::{AlertTrigger, DrowsinessReading, FaceObservation};
pub use config::DmsConfig;
pub use eyes::{EyeAssessment, EyeSearch};
pub use state::DrowsinessState;

use face_detect::{CascadeDetector, CascadeError, FaceLocalizer, RegionDetector};
use thiserror::Error;
use tracing::{debug, info};
use video_frame::VideoFrame;

/// DMS error types
#[derive(Error, Debug)]
pub enum DmsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cascade loading failed: {0}")]
    Cascade(#[from] CascadeError),
}

/// Drowsiness tracker.
///
/// Holds detectors and thresholds only; the closed-frame accumulator lives
/// in the caller's [`DrowsinessState`].
pub struct DrowsinessTracker {
    config: DmsConfig,
    faces: FaceLocalizer,
    eyes: EyeSearch,
}

impl DrowsinessTracker {
    /// Create a tracker around the given face localizer and eye detector
    pub fn new(
        config: DmsConfig,
        faces: FaceLocalizer,
        eye_detector: impl RegionDetector + 'static,
    ) -> Result<Self, DmsError> {
        config.validate()?;
        let eyes = EyeSearch::new(eye_detector, &config);
        Ok(Self { config, faces, eyes })
    }

    /// Create a tracker from the cascade files named in the configuration
    pub fn from_config(config: DmsConfig) -> Result<Self, DmsError> {
        let face_path = config
            .face_cascade_path
            .clone()
            .ok_or_else(|| DmsError::Config("face cascade path not configured".into()))?;
        let eye_path = config
            .eye_cascade_path
            .clone()
            .ok_or_else(|| DmsError::Config("eye cascade path not configured".into()))?;

        let faces = FaceLocalizer::from_cascade_file(&face_path, config.face_detection)?;
        let eyes = CascadeDetector::from_file(&eye_path, config.eye_detection)?;
        Self::new(config, faces, eyes)
    }

    pub fn config(&self) -> &DmsConfig {
        &self.config
    }

    /// Fresh per-session state at the configured frame rate
    pub fn new_state(&self) -> DrowsinessState {
        DrowsinessState::new(self.config.frame_rate_hz)
    }

    /// Process one frame: update `state`, draw overlays into `frame`.
    ///
    /// Each detected face updates the closed-frame counter. A frame without
    /// a face leaves the counter untouched.
    pub fn process(&self, frame: &mut VideoFrame, state: &mut DrowsinessState) -> DrowsinessReading {
        let mut observations = Vec::new();
        let mut rising_edge = false;

        match FaceLocalizer::prepare(frame) {
            Some(gray) => {
                for face in self.faces.locate_gray(&gray) {
                    let (eyes, assessment) = self.eyes.search(&gray, &face);
                    if assessment.is_closed(self.config.ear_threshold) {
                        state.record_closed();
                    } else {
                        let run = state.record_open();
                        if run >= self.config.consecutive_frames {
                            info!("Eyes reopened after {} closed frames", run);
                            rising_edge = true;
                        }
                    }
                    observations.push(FaceObservation {
                        face,
                        eyes,
                        assessment,
                    });
                }
            }
            None => debug!("Empty frame {}", frame.sequence),
        }

        if observations.is_empty() {
            debug!("No face detected in frame {}", frame.sequence);
        }
        annotate::draw_observations(frame, &observations);

        let closed_duration_secs = state.closed_duration_secs();
        let trigger = if closed_duration_secs >= self.config.alert_duration_secs {
            Some(AlertTrigger::Duration)
        } else if rising_edge {
            Some(AlertTrigger::RisingEdge)
        } else {
            None
        };

        DrowsinessReading {
            drowsy: trigger.is_some(),
            closed_duration_secs,
            closed_frames: state.closed_frame_count(),
            faces: observations,
            trigger,
        }
    }

    /// Zero the closed-frame counter (start of a monitoring session)
    pub fn reset(&self, state: &mut DrowsinessState) {
        debug!("Drowsiness state reset");
        state.reset();
    }
}
