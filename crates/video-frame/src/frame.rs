//! Video frame types and processing

use image::{GrayImage, ImageBuffer, Rgb, RgbImage};

/// Pixel format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    #[default]
    Rgb24,
    Gray8,
}

impl PixelFormat {
    /// Bytes per pixel
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Rgb24 => 3,
            PixelFormat::Gray8 => 1,
        }
    }
}

/// Decoded video frame
#[derive(Debug, Clone, Default)]
pub struct VideoFrame {
    /// Pixel data, row-major (width * height * channels)
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Pixel layout of `data`
    pub format: PixelFormat,
    /// Capture timestamp (nanoseconds)
    pub timestamp_ns: u64,
    /// Frame sequence number
    pub sequence: u32,
}

impl VideoFrame {
    /// Create a new video frame from raw RGB data
    pub fn new(data: Vec<u8>, width: u32, height: u32, timestamp_ns: u64, sequence: u32) -> Self {
        Self {
            data,
            width,
            height,
            format: PixelFormat::Rgb24,
            timestamp_ns,
            sequence,
        }
    }

    /// Wrap an RGB image
    pub fn from_rgb(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, 0, 0)
    }

    /// Wrap a single-channel image
    pub fn from_gray(image: GrayImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            data: image.into_raw(),
            width,
            height,
            format: PixelFormat::Gray8,
            timestamp_ns: 0,
            sequence: 0,
        }
    }

    /// Zero-sized frame, standing in for input that could not be decoded
    pub fn empty() -> Self {
        Self::default()
    }

    /// Decode an encoded still image (JPEG, PNG, ...) into an RGB frame
    pub fn decode(bytes: &[u8]) -> Result<Self, image::ImageError> {
        let img = image::load_from_memory(bytes)?;
        Ok(Self::from_rgb(img.to_rgb8()))
    }

    /// Set capture timing
    pub fn with_timing(mut self, timestamp_ns: u64, sequence: u32) -> Self {
        self.timestamp_ns = timestamp_ns;
        self.sequence = sequence;
        self
    }

    fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.channels()
    }

    /// True when the frame holds no usable pixels
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.data.len() < self.expected_len()
    }

    /// Get pixel at (x, y) as RGB
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if self.is_empty() || x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * self.format.channels();
        match self.format {
            PixelFormat::Rgb24 => Some([self.data[idx], self.data[idx + 1], self.data[idx + 2]]),
            PixelFormat::Gray8 => {
                let v = self.data[idx];
                Some([v, v, v])
            }
        }
    }

    /// Convert to grayscale
    pub fn to_gray_image(&self) -> Option<GrayImage> {
        if self.is_empty() {
            return None;
        }
        let len = self.expected_len();
        let gray = match self.format {
            PixelFormat::Gray8 => self.data[..len].to_vec(),
            PixelFormat::Rgb24 => self.data[..len]
                .chunks_exact(3)
                .map(|pixel| {
                    // Luminance formula: 0.299*R + 0.587*G + 0.114*B
                    (pixel[0] as f32 * 0.299 + pixel[1] as f32 * 0.587 + pixel[2] as f32 * 0.114)
                        as u8
                })
                .collect(),
        };
        GrayImage::from_raw(self.width, self.height, gray)
    }

    /// Copy out as an RGB image
    pub fn to_rgb_image(&self) -> Option<RgbImage> {
        if self.is_empty() {
            return None;
        }
        match self.format {
            PixelFormat::Rgb24 => {
                RgbImage::from_raw(self.width, self.height, self.data[..self.expected_len()].to_vec())
            }
            PixelFormat::Gray8 => self
                .to_gray_image()
                .map(|gray| image::DynamicImage::ImageLuma8(gray).to_rgb8()),
        }
    }

    /// Mutable RGB view over the frame's own buffer, for drawing overlays in place.
    ///
    /// Grayscale frames are promoted to RGB first.
    pub fn rgb_view_mut(&mut self) -> Option<ImageBuffer<Rgb<u8>, &mut [u8]>> {
        if self.is_empty() {
            return None;
        }
        if self.format == PixelFormat::Gray8 {
            let len = self.expected_len();
            self.data = self.data[..len].iter().flat_map(|&v| [v, v, v]).collect();
            self.format = PixelFormat::Rgb24;
        }
        let len = self.expected_len();
        ImageBuffer::from_raw(self.width, self.height, &mut self.data[..len])
    }
}
