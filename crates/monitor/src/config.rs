//! Monitor configuration
//!
//! Layered from an optional TOML file and `DRIVER_MONITOR_*` environment
//! variables (nested keys separated by `__`, e.g.
//! `DRIVER_MONITOR_DMS__FRAME_RATE_HZ=15`).

use std::path::{Path, PathBuf};

use alerting::AlertConfig;
use anyhow::{ensure, Context};
use config::{Config, ConfigError, Environment, File};
use dms::DmsConfig;
use face_detect::DetectionParams;
use serde::{Deserialize, Serialize};

pub const ENV_PREFIX: &str = "DRIVER_MONITOR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Enrolled driver records
    pub store_path: PathBuf,

    /// OpenCV frontal-face cascade
    pub face_cascade: PathBuf,

    /// OpenCV eye cascade
    pub eye_cascade: PathBuf,

    /// Face search parameters for enrollment and matching
    pub auth_detection: DetectionParams,

    /// Frames to try before a verification attempt gives up
    pub max_verify_frames: usize,

    pub dms: DmsConfig,

    /// Alert latch; its `alert_duration_secs` must equal the tracker's
    pub alert: AlertConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("drivers.db"),
            face_cascade: PathBuf::from("haarcascade_frontalface_default.xml"),
            eye_cascade: PathBuf::from("haarcascade_eye.xml"),
            auth_detection: DetectionParams::with_min_neighbors(4),
            max_verify_frames: 100,
            dms: DmsConfig::default(),
            alert: AlertConfig::default(),
        }
    }
}

impl MonitorConfig {
    /// Load configuration, with `file` (if given) under the environment
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Reject inconsistent thresholds before any command runs
    pub fn validate(&self) -> anyhow::Result<()> {
        self.dms.validate().context("invalid [dms] section")?;
        self.alert.validate().context("invalid [alert] section")?;
        ensure!(
            self.alert.alert_duration_secs == self.dms.alert_duration_secs,
            "alert.alert_duration_secs ({}) differs from dms.alert_duration_secs ({})",
            self.alert.alert_duration_secs,
            self.dms.alert_duration_secs
        );
        ensure!(self.max_verify_frames > 0, "max_verify_frames must be at least 1");
        Ok(())
    }

    /// Tracker configuration with the cascade paths filled in
    pub fn tracker_config(&self) -> DmsConfig {
        DmsConfig {
            face_cascade_path: Some(self.face_cascade.display().to_string()),
            eye_cascade_path: Some(self.eye_cascade.display().to_string()),
            ..self.dms.clone()
        }
    }
}
