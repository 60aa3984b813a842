//! Alerting System
//!
//! Turns per-frame drowsy readings into discrete alerts: one alert per
//! episode, re-armed once the eyes have been open again for long enough.

mod latch;

pub use latch::{AlertConfig, AlertDecision, AlertLatch};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AlertError {
    #[error("Invalid alert configuration: {0}")]
    Config(String),
}
