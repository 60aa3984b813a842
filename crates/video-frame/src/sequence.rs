//! Directory-backed frame source
//!
//! Replays a directory of still images as a video stream, one frame per
//! file in file-name order. Files that fail to decode become empty frames
//! so that downstream consumers see "no detection" rather than an error.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::{FrameError, VideoFrame};

/// Image files replayed as a frame stream
#[derive(Debug)]
pub struct ImageSequence {
    paths: Vec<PathBuf>,
    cursor: usize,
    frame_interval_ns: u64,
}

impl ImageSequence {
    /// Open a directory of images played back at `fps`
    pub fn open(dir: impl AsRef<Path>, fps: f64) -> Result<Self, FrameError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(FrameError::NotADirectory(dir.to_path_buf()));
        }
        if !(fps.is_finite() && fps > 0.0) {
            return Err(FrameError::FrameRate(fps));
        }

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && image::ImageFormat::from_path(&path).is_ok() {
                paths.push(path);
            } else {
                debug!("Skipping non-image entry {}", path.display());
            }
        }
        paths.sort();

        info!("Opened image sequence {} ({} frames)", dir.display(), paths.len());
        Ok(Self {
            paths,
            cursor: 0,
            frame_interval_ns: (1e9 / fps) as u64,
        })
    }

    /// Total number of frames in the sequence
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// True if the directory held no images
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    fn load(path: &Path) -> VideoFrame {
        match std::fs::read(path) {
            Ok(bytes) => VideoFrame::decode(&bytes).unwrap_or_else(|e| {
                warn!("Undecodable frame {}: {}", path.display(), e);
                VideoFrame::empty()
            }),
            Err(e) => {
                warn!("Unreadable frame {}: {}", path.display(), e);
                VideoFrame::empty()
            }
        }
    }
}

impl Iterator for ImageSequence {
    type Item = VideoFrame;

    fn next(&mut self) -> Option<VideoFrame> {
        let path = self.paths.get(self.cursor)?;
        let sequence = self.cursor as u32;
        let frame = Self::load(path)
            .with_timing(self.cursor as u64 * self.frame_interval_ns, sequence);
        self.cursor += 1;
        Some(frame)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.paths.len() - self.cursor;
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_sequence_order_and_timing() {
        let dir = tempfile::tempdir().unwrap();
        for (name, value) in [("b.png", 20u8), ("a.png", 10u8)] {
            RgbImage::from_pixel(4, 4, Rgb([value; 3]))
                .save(dir.path().join(name))
                .unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let frames: Vec<_> = ImageSequence::open(dir.path(), 10.0).unwrap().collect();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].get_pixel(0, 0), Some([10; 3]));
        assert_eq!(frames[1].get_pixel(0, 0), Some([20; 3]));
        assert_eq!(frames[1].sequence, 1);
        assert_eq!(frames[1].timestamp_ns, 100_000_000);
    }

    #[test]
    fn test_undecodable_file_yields_empty_frame() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.jpg"), b"garbage").unwrap();

        let mut seq = ImageSequence::open(dir.path(), 30.0).unwrap();
        assert_eq!(seq.len(), 1);
        assert!(seq.next().unwrap().is_empty());
        assert!(seq.next().is_none());
    }

    #[test]
    fn test_rejects_bad_inputs() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ImageSequence::open(dir.path().join("missing"), 30.0),
            Err(FrameError::NotADirectory(_))
        ));
        assert!(matches!(
            ImageSequence::open(dir.path(), 0.0),
            Err(FrameError::FrameRate(_))
        ));
    }
}
