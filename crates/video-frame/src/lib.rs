//! Video frame plumbing for the driver monitor
//!
//! Provides the decoded frame type consumed by the face localizer, the
//! matching engine and the drowsiness tracker, plus a directory-backed
//! frame source used by the headless runner.

pub mod frame;
pub mod sequence;

pub use frame::{PixelFormat, VideoFrame};
pub use sequence::ImageSequence;

use std::path::PathBuf;
use thiserror::Error;

/// Frame source error types
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Failed to read frame source: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("Invalid frame rate: {0}")]
    FrameRate(f64),
}
