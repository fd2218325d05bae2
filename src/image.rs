//! Dense row-major image buffers used throughout the capture and fusion
//! pipeline.
//!
//! Two representations appear, matching the data model: a [`ByteImage`] (the
//! wire/device format, 8-bit BGR) and a [`FloatImage`] (the pyramid/blend
//! working format, normalized to `[0, 1]`). A [`GrayImage`] is the
//! single-channel float form used for weight maps and the Laplacian
//! quality term.

use serde::{Deserialize, Serialize};

/// 8-bit, 3-channel (BGR), row-major image as produced by a camera device
/// and served over the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ByteImage {
    pub width: usize,
    pub height: usize,
    /// len == width * height * 3
    pub data: Vec<u8>,
}

impl ByteImage {
    pub fn new(width: usize, height: usize, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), width * height * 3);
        Self { width, height, data }
    }

    pub fn filled(width: usize, height: usize, bgr: [u8; 3]) -> Self {
        let mut data = Vec::with_capacity(width * height * 3);
        for _ in 0..(width * height) {
            data.extend_from_slice(&bgr);
        }
        Self { width, height, data }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    /// Mean intensity across all channels, used by the settling loop.
    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        let sum: u64 = self.data.iter().map(|&b| b as u64).sum();
        sum as f64 / self.data.len() as f64
    }

    /// Convert to a float image normalized to [0, 1].
    pub fn to_float(&self) -> FloatImage {
        let data = self.data.iter().map(|&b| b as f64 / 255.0).collect();
        FloatImage { width: self.width, height: self.height, data }
    }

    /// Encode as JPEG bytes at the given quality (1-100).
    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>, crate::error::FusionError> {
        use image::codecs::jpeg::JpegEncoder;
        use image::ColorType;

        // Convert BGR -> RGB for the `image` crate encoder.
        let mut rgb = Vec::with_capacity(self.data.len());
        for px in self.data.chunks_exact(3) {
            rgb.push(px[2]);
            rgb.push(px[1]);
            rgb.push(px[0]);
        }

        let mut out = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut out, quality);
        encoder
            .encode(&rgb, self.width as u32, self.height as u32, ColorType::Rgb8.into())
            .map_err(|e| crate::error::FusionError::EncodeFailed(e.to_string()))?;
        Ok(out)
    }
}

/// 64-bit float, 3-channel (BGR), row-major image. The common working
/// representation for pyramid arithmetic.
#[derive(Clone, Debug, PartialEq)]
pub struct FloatImage {
    pub width: usize,
    pub height: usize,
    /// len == width * height * 3
    pub data: Vec<f64>,
}

impl FloatImage {
    pub fn new(width: usize, height: usize, data: Vec<f64>) -> Self {
        debug_assert_eq!(data.len(), width * height * 3);
        Self { width, height, data }
    }

    pub fn zeros(width: usize, height: usize) -> Self {
        Self { width, height, data: vec![0.0; width * height * 3] }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    #[inline]
    pub fn pixel(&self, y: usize, x: usize) -> [f64; 3] {
        let i = (y * self.width + x) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    #[inline]
    pub fn set_pixel(&mut self, y: usize, x: usize, v: [f64; 3]) {
        let i = (y * self.width + x) * 3;
        self.data[i] = v[0];
        self.data[i + 1] = v[1];
        self.data[i + 2] = v[2];
    }

    /// Clamp to [0, 1], scale to [0, 255], cast to bytes.
    pub fn to_byte_image(&self) -> ByteImage {
        let data = self
            .data
            .iter()
            .map(|&v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
            .collect();
        ByteImage { width: self.width, height: self.height, data }
    }

    /// True if every element is finite.
    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }

    pub fn grayscale(&self) -> GrayImage {
        // ITU-R BT.601 luma weights, channel order BGR.
        let mut data = Vec::with_capacity(self.width * self.height);
        for px in self.data.chunks_exact(3) {
            let (b, g, r) = (px[0], px[1], px[2]);
            data.push(0.114 * b + 0.587 * g + 0.299 * r);
        }
        GrayImage { width: self.width, height: self.height, data }
    }
}

/// Single-channel float image: weight maps, Laplacian magnitude, etc.
#[derive(Clone, Debug, PartialEq)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    /// len == width * height
    pub data: Vec<f64>,
}

impl GrayImage {
    pub fn zeros(width: usize, height: usize) -> Self {
        Self { width, height, data: vec![0.0; width * height] }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    #[inline]
    pub fn at(&self, y: usize, x: usize) -> f64 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn at_clamped(&self, y: isize, x: isize) -> f64 {
        let y = y.clamp(0, self.height as isize - 1) as usize;
        let x = x.clamp(0, self.width as isize - 1) as usize;
        self.at(y, x)
    }

    /// Broadcast this single-channel map across 3 colour channels.
    pub fn broadcast3(&self) -> FloatImage {
        let mut data = Vec::with_capacity(self.width * self.height * 3);
        for &v in &self.data {
            data.push(v);
            data.push(v);
            data.push(v);
        }
        FloatImage { width: self.width, height: self.height, data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_to_float_roundtrip_is_close() {
        let img = ByteImage::filled(2, 2, [10, 20, 30]);
        let f = img.to_float();
        let back = f.to_byte_image();
        for (a, b) in img.data.iter().zip(back.data.iter()) {
            assert!((*a as i32 - *b as i32).abs() <= 1);
        }
    }

    #[test]
    fn mean_of_flat_image() {
        let img = ByteImage::filled(4, 4, [50, 50, 50]);
        assert!((img.mean() - 50.0).abs() < 1e-9);
    }
}
