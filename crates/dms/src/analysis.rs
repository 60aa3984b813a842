//! DMS analysis results

use face_detect::FaceRegion;
use serde::{Deserialize, Serialize};

use crate::eyes::EyeAssessment;

/// Why a reading came back drowsy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertTrigger {
    /// Closed duration reached the alert threshold
    Duration,
    /// Eyes reopened after a closed run that reached the consecutive-frame threshold
    RisingEdge,
}

/// One detected face and what the eye search found in it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceObservation {
    pub face: FaceRegion,
    /// Eye boxes in frame coordinates
    pub eyes: Vec<FaceRegion>,
    pub assessment: EyeAssessment,
}

/// Result of one tracker call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DrowsinessReading {
    pub drowsy: bool,

    /// Always reported, for a live "eyes closed" readout
    pub closed_duration_secs: f64,

    pub closed_frames: u32,

    pub faces: Vec<FaceObservation>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger: Option<AlertTrigger>,
}

impl DrowsinessReading {
    pub fn face_detected(&self) -> bool {
        !self.faces.is_empty()
    }
}
