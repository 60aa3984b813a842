//! Face Localizer
//!
//! Finds rectangular face (and eye) regions in a frame:
//! - Viola-Jones boosted Haar cascades loaded from OpenCV XML
//! - Multi-scale sliding-window search with neighbour grouping
//! - Grayscale conversion and histogram equalization ahead of detection
//!
//! Detection runs behind the [`RegionDetector`] seam so the matching engine
//! and the drowsiness tracker can share one localizer implementation.

pub mod cascade;
pub mod detector;
pub mod grouping;
pub mod localizer;
pub mod region;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use cascade::HaarCascade;
pub use detector::{CascadeDetector, DetectionParams, RegionDetector};
pub use grouping::group_rectangles;
pub use localizer::FaceLocalizer;
pub use region::FaceRegion;

use thiserror::Error;

/// Cascade loading and validation errors
#[derive(Error, Debug)]
pub enum CascadeError {
    #[error("Failed to read cascade file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed cascade XML: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("Invalid cascade format: {0}")]
    Format(String),

    #[error("Unsupported cascade: {0}")]
    Unsupported(String),

    #[error("Invalid cascade: {0}")]
    Invalid(String),
}
