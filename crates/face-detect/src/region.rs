//! Rectangular regions in frame pixel coordinates

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in a frame's pixel coordinate space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FaceRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FaceRegion {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    /// Top `fraction` of the box (eyes sit in roughly the upper half of a face)
    pub fn upper_fraction(&self, fraction: f32) -> FaceRegion {
        let height = (self.height as f32 * fraction.clamp(0.0, 1.0)) as u32;
        FaceRegion { height, ..*self }
    }

    /// Intersect with a `width` x `height` frame
    pub fn clamp_to(&self, width: u32, height: u32) -> FaceRegion {
        let x = self.x.min(width);
        let y = self.y.min(height);
        FaceRegion {
            x,
            y,
            width: self.right().min(width) - x,
            height: self.bottom().min(height) - y,
        }
    }

    /// Translate by (dx, dy), e.g. from face-local to frame coordinates
    pub fn offset(&self, dx: u32, dy: u32) -> FaceRegion {
        FaceRegion {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
            ..*self
        }
    }

    pub fn contains(&self, other: &FaceRegion) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }
}
