//! Alert latch implementation

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::AlertError;

/// Alert configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Closed duration for a duration alert (seconds, default: 3.0)
    pub alert_duration_secs: f64,
    /// Closed duration below which a fired latch re-arms (seconds, default: 1.0)
    pub rearm_below_secs: f64,
    /// Only alert on drowsy readings that also reached `alert_duration_secs`
    pub require_duration: bool,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            alert_duration_secs: 3.0,
            rearm_below_secs: 1.0,
            require_duration: false,
        }
    }
}

impl AlertConfig {
    pub fn validate(&self) -> Result<(), AlertError> {
        if !(self.rearm_below_secs >= 0.0 && self.rearm_below_secs <= self.alert_duration_secs) {
            return Err(AlertError::Config(format!(
                "re-arm watermark {} must lie between 0 and the alert duration {}",
                self.rearm_below_secs, self.alert_duration_secs
            )));
        }
        Ok(())
    }
}

/// What the caller should do with one reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertDecision {
    /// Raise the alert now
    Fire,
    /// Drowsy, but this episode has already alerted
    Suppressed,
    /// Nothing to do
    Idle,
}

/// One-shot alert latch with a low-watermark re-arm
#[derive(Debug, Clone)]
pub struct AlertLatch {
    config: AlertConfig,
    armed: bool,
    fired: usize,
}

impl AlertLatch {
    pub fn new(config: AlertConfig) -> Self {
        debug!("Creating alert latch with config: {:?}", config);
        Self {
            config,
            armed: true,
            fired: 0,
        }
    }

    /// Feed one tracker reading
    pub fn observe(&mut self, drowsy: bool, closed_duration_secs: f64) -> AlertDecision {
        let qualifies = drowsy
            && (!self.config.require_duration
                || closed_duration_secs >= self.config.alert_duration_secs);

        if qualifies {
            if self.armed {
                self.armed = false;
                self.fired += 1;
                info!(
                    "Drowsiness alert #{} (eyes closed {:.2}s)",
                    self.fired, closed_duration_secs
                );
                return AlertDecision::Fire;
            }
            return AlertDecision::Suppressed;
        }

        if !self.armed && !drowsy && closed_duration_secs < self.config.rearm_below_secs {
            debug!("Alert re-armed at {:.2}s", closed_duration_secs);
            self.armed = true;
        }
        if drowsy {
            AlertDecision::Suppressed
        } else {
            AlertDecision::Idle
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Alerts fired since creation or the last reset
    pub fn fired_count(&self) -> usize {
        self.fired
    }

    /// Re-arm and clear the count (new monitoring session)
    pub fn reset(&mut self) {
        self.armed = true;
        self.fired = 0;
    }
}

impl Default for AlertLatch {
    fn default() -> Self {
        Self::new(AlertConfig::default())
    }
}
