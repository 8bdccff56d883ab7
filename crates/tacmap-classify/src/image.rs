//! Owned RGBA pixel buffers.

use crate::ClassifyError;
use serde::{Deserialize, Serialize};

/// An RGBA image, row-major, four bytes per pixel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl ImageData {
    /// Wrap an RGBA buffer, checking its length.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, ClassifyError> {
        let image = Self {
            width,
            height,
            data,
        };
        image.validate()?;
        Ok(image)
    }

    /// Build from packed RGB, with every pixel opaque.
    pub fn from_rgb(width: u32, height: u32, rgb: &[u8]) -> Result<Self, ClassifyError> {
        if rgb.len() != width as usize * height as usize * 3 {
            return Err(ClassifyError::InvalidImage(format!(
                "{width}x{height} RGB image needs {} bytes, got {}",
                width as usize * height as usize * 3,
                rgb.len()
            )));
        }
        let data = rgb
            .chunks_exact(3)
            .flat_map(|p| [p[0], p[1], p[2], u8::MAX])
            .collect();
        Self::new(width, height, data)
    }

    /// Check that dimensions are non-zero and the buffer holds exactly
    /// `width * height` pixels.
    pub fn validate(&self) -> Result<(), ClassifyError> {
        if self.width == 0 || self.height == 0 {
            return Err(ClassifyError::InvalidImage(format!(
                "empty image {}x{}",
                self.width, self.height
            )));
        }
        let expected = self.width as usize * self.height as usize * 4;
        if self.data.len() != expected {
            return Err(ClassifyError::InvalidImage(format!(
                "{}x{} RGBA image needs {expected} bytes, got {}",
                self.width,
                self.height,
                self.data.len()
            )));
        }
        Ok(())
    }

    /// RGBA of one pixel; `None` outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        let p = self.data.get(i..i + 4)?;
        Some([p[0], p[1], p[2], p[3]])
    }
}
