//! DMS configuration

use face_detect::DetectionParams;
use serde::{Deserialize, Serialize};

use crate::DmsError;

/// DMS configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DmsConfig {
    /// Averaged eye aspect ratio below which the eyes count as closed
    pub ear_threshold: f32,

    /// Closed frames after which the next open frame raises a drowsy pulse
    pub consecutive_frames: u32,

    /// Continuous closure that raises a drowsy reading (seconds)
    pub alert_duration_secs: f64,

    /// Frame rate used to turn closed frames into seconds
    pub frame_rate_hz: f64,

    /// Eye boxes darker than this mean intensity count as closed
    pub dark_eye_brightness: f32,

    /// Aspect ratio assigned to a dark eye box
    pub dark_eye_ear: f32,

    /// Aspect ratio assigned to a bright eye box
    pub bright_eye_ear: f32,

    /// Top fraction of the face box searched for eyes
    pub eye_search_fraction: f32,

    pub face_detection: DetectionParams,
    pub eye_detection: DetectionParams,

    /// Cascade paths
    pub face_cascade_path: Option<String>,
    pub eye_cascade_path: Option<String>,
}

impl Default for DmsConfig {
    fn default() -> Self {
        Self {
            ear_threshold: 0.25,
            consecutive_frames: 30,
            alert_duration_secs: 3.0,
            frame_rate_hz: 30.0,
            dark_eye_brightness: 30.0,
            dark_eye_ear: 0.15,
            bright_eye_ear: 0.25,
            eye_search_fraction: 0.5,
            face_detection: DetectionParams::with_min_neighbors(5),
            eye_detection: DetectionParams::with_min_neighbors(5),
            face_cascade_path: None,
            eye_cascade_path: None,
        }
    }
}

impl DmsConfig {
    pub fn validate(&self) -> Result<(), DmsError> {
        if !(self.frame_rate_hz.is_finite() && self.frame_rate_hz > 0.0) {
            return Err(DmsError::Config(format!(
                "frame rate must be positive, got {}",
                self.frame_rate_hz
            )));
        }
        if !(self.alert_duration_secs.is_finite() && self.alert_duration_secs > 0.0) {
            return Err(DmsError::Config(format!(
                "alert duration must be positive, got {}",
                self.alert_duration_secs
            )));
        }
        if self.consecutive_frames == 0 {
            return Err(DmsError::Config("consecutive frame threshold must be at least 1".into()));
        }
        if !(self.eye_search_fraction > 0.0 && self.eye_search_fraction <= 1.0) {
            return Err(DmsError::Config(format!(
                "eye search fraction must be in (0, 1], got {}",
                self.eye_search_fraction
            )));
        }
        self.face_detection.validate()?;
        self.eye_detection.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DmsConfig::default();
        assert_eq!(config.consecutive_frames, 30);
        assert_eq!(config.face_detection.min_neighbors, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_rates() {
        let zero_fps = DmsConfig {
            frame_rate_hz: 0.0,
            ..Default::default()
        };
        assert!(matches!(zero_fps.validate(), Err(DmsError::Config(_))));

        let negative = DmsConfig {
            alert_duration_secs: -1.0,
            ..Default::default()
        };
        assert!(negative.validate().is_err());

        let bad_scale = DmsConfig {
            eye_detection: DetectionParams {
                scale_factor: 1.0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(bad_scale.validate(), Err(DmsError::Cascade(_))));
    }
}
