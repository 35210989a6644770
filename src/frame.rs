//! Pixel buffers handed to the tracker by the frame source.
//!
//! `RgbaFrame` is the interleaved 8-bit RGBA layout produced by cameras and
//! canvases, with an explicit row stride in bytes. `GrayFrame` is a tightly
//! packed single-channel buffer used by the detector and its pyramid.

use crate::constants::{LUMA_BLUE, LUMA_GREEN, LUMA_RED};
use crate::{Error, Result};

/// Bytes per RGBA pixel
pub const RGBA_CHANNELS: usize = 4;

/// Interleaved RGBA frame with an explicit stride
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaFrame {
    width: usize,
    height: usize,
    stride: usize,
    data: Vec<u8>,
}

impl RgbaFrame {
    /// Wrap a tightly packed RGBA buffer
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is smaller than `width * height * 4` bytes
    pub fn new(width: usize, height: usize, data: Vec<u8>) -> Result<Self> {
        Self::with_stride(width, height, width * RGBA_CHANNELS, data)
    }

    /// Wrap an RGBA buffer whose rows are `stride` bytes apart
    ///
    /// # Errors
    ///
    /// Returns an error if the stride cannot hold a row or the buffer is too short
    pub fn with_stride(width: usize, height: usize, stride: usize, data: Vec<u8>) -> Result<Self> {
        if stride < width * RGBA_CHANNELS {
            return Err(Error::InvalidInput(format!(
                "Stride {stride} too small for {width} RGBA pixels"
            )));
        }
        let required = if height == 0 { 0 } else { stride * (height - 1) + width * RGBA_CHANNELS };
        if data.len() < required {
            return Err(Error::InvalidInput(format!(
                "RGBA buffer holds {} bytes, {width}x{height} frame needs {required}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            stride,
            data,
        })
    }

    /// Frame filled with a single color
    #[must_use]
    pub fn filled(width: usize, height: usize, rgba: [u8; 4]) -> Self {
        let data = rgba.iter().copied().cycle().take(width * height * RGBA_CHANNELS).collect();
        Self {
            width,
            height,
            stride: width * RGBA_CHANNELS,
            data,
        }
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Row stride in bytes
    #[must_use]
    pub fn stride(&self) -> usize {
        self.stride
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Pixel bytes of row `y`, without stride padding
    #[must_use]
    pub fn row(&self, y: usize) -> &[u8] {
        let start = y * self.stride;
        &self.data[start..start + self.width * RGBA_CHANNELS]
    }

    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 4] {
        let i = y * self.stride + x * RGBA_CHANNELS;
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, rgba: [u8; 4]) {
        let i = y * self.stride + x * RGBA_CHANNELS;
        self.data[i..i + RGBA_CHANNELS].copy_from_slice(&rgba);
    }

    /// Paint an axis-aligned rectangle, clipped to the frame
    pub fn fill_rect(&mut self, x: usize, y: usize, width: usize, height: usize, rgba: [u8; 4]) {
        let x_end = (x + width).min(self.width);
        let y_end = (y + height).min(self.height);
        for yy in y.min(y_end)..y_end {
            for xx in x.min(x_end)..x_end {
                self.set_pixel(xx, yy, rgba);
            }
        }
    }

    /// Replace the color channels of every pixel with its luminance
    pub fn grayscale_in_place(&mut self) {
        for y in 0..self.height {
            let start = y * self.stride;
            let row = &mut self.data[start..start + self.width * RGBA_CHANNELS];
            for px in row.chunks_exact_mut(RGBA_CHANNELS) {
                let gray = luminance(px[0], px[1], px[2]);
                px[0] = gray;
                px[1] = gray;
                px[2] = gray;
            }
        }
    }

    /// Single-channel luminance copy of the frame
    #[must_use]
    pub fn to_gray(&self) -> GrayFrame {
        let mut gray = GrayFrame::default();
        self.to_gray_into(&mut gray);
        gray
    }

    /// Luminance conversion into a reusable buffer
    pub fn to_gray_into(&self, gray: &mut GrayFrame) {
        gray.reshape(self.width, self.height);
        for y in 0..self.height {
            let out = &mut gray.data[y * self.width..(y + 1) * self.width];
            for (value, px) in out.iter_mut().zip(self.row(y).chunks_exact(RGBA_CHANNELS)) {
                *value = luminance(px[0], px[1], px[2]);
            }
        }
    }

    /// Mean of the per-channel averages, used as the whitebalance statistic
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average_gray(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let (mut r, mut g, mut b) = (0u64, 0u64, 0u64);
        for y in 0..self.height {
            for px in self.row(y).chunks_exact(RGBA_CHANNELS) {
                r += u64::from(px[0]);
                g += u64::from(px[1]);
                b += u64::from(px[2]);
            }
        }
        let n = (self.width * self.height) as f64;
        (r as f64 / n + g as f64 / n + b as f64 / n) / 3.0
    }
}

/// Tightly packed 8-bit grayscale buffer
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GrayFrame {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl GrayFrame {
    /// Black frame of the given size
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
        }
    }

    /// Wrap a packed grayscale buffer
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer length is not `width * height`
    pub fn from_vec(width: usize, height: usize, data: Vec<u8>) -> Result<Self> {
        if data.len() != width * height {
            return Err(Error::InvalidInput(format!(
                "Gray buffer holds {} bytes, {width}x{height} frame needs {}",
                data.len(),
                width * height
            )));
        }
        Ok(Self { width, height, data })
    }

    #[must_use]
    pub fn filled(width: usize, height: usize, value: u8) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Row stride in pixels (always equal to the width)
    #[must_use]
    pub fn stride(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    pub fn set(&mut self, x: usize, y: usize, value: u8) {
        self.data[y * self.width + x] = value;
    }

    /// Reallocate only when the dimensions change
    pub(crate) fn reshape(&mut self, width: usize, height: usize) {
        if self.width != width || self.height != height {
            self.width = width;
            self.height = height;
            self.data.clear();
            self.data.resize(width * height, 0);
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn luminance(r: u8, g: u8, b: u8) -> u8 {
    let y = LUMA_RED * f64::from(r) + LUMA_GREEN * f64::from(g) + LUMA_BLUE * f64::from(b);
    y.round().clamp(0.0, 255.0) as u8
}
