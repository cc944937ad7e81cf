//! Monochrome bitmaps and GS v 0 raster framing
//!
//! Bitmaps are packed 8 horizontal pixels per byte, most significant bit
//! first, row-major, with a row stride of `ceil(width / 8)` bytes. A set bit
//! is ink.

use crate::error::{PrintError, PrintResult};
use crate::escpos::Directive;

/// Luma below this value prints as ink
pub const INK_THRESHOLD: u8 = 128;

/// Packed 1-bit bitmap ready for the printer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl RasterImage {
    /// Wrap already packed rows
    ///
    /// Fails when the dimensions exceed the 16-bit fields of the raster
    /// command or the data length does not match `stride * height`.
    pub fn from_packed(width: u32, height: u32, data: Vec<u8>) -> PrintResult<Self> {
        let stride = row_stride(width);
        if stride > u16::MAX as u32 || height > u16::MAX as u32 {
            return Err(PrintError::InvalidImage(format!(
                "{}x{} exceeds raster command limits",
                width, height
            )));
        }
        let expected = stride as usize * height as usize;
        if data.len() != expected {
            return Err(PrintError::InvalidImage(format!(
                "expected {} bytes for {}x{}, got {}",
                expected,
                width,
                height,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Pack an RGBA pixel buffer (4 bytes per pixel, row-major)
    pub fn from_rgba(width: u32, height: u32, rgba: &[u8]) -> PrintResult<Self> {
        let pixels = width as usize * height as usize;
        if rgba.len() != pixels * 4 {
            return Err(PrintError::InvalidImage(format!(
                "expected {} RGBA bytes for {}x{}, got {}",
                pixels * 4,
                width,
                height,
                rgba.len()
            )));
        }

        let stride = row_stride(width) as usize;
        let mut data = vec![0u8; stride * height as usize];

        for y in 0..height as usize {
            for x in 0..width as usize {
                let p = (y * width as usize + x) * 4;
                if is_ink(rgba[p], rgba[p + 1], rgba[p + 2], rgba[p + 3]) {
                    data[y * stride + x / 8] |= 1 << (7 - (x % 8));
                }
            }
        }

        Self::from_packed(width, height, data)
    }

    /// Pack a decoded image
    #[cfg(feature = "image")]
    pub fn from_image(img: &image::RgbaImage) -> PrintResult<Self> {
        Self::from_rgba(img.width(), img.height(), img.as_raw())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per row
    pub fn stride(&self) -> u32 {
        row_stride(self.width)
    }

    /// Packed bitmap rows
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Whether the pixel at (x, y) is ink
    pub fn is_set(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let byte = self.data[(y * self.stride() + x / 8) as usize];
        byte & (1 << (7 - (x % 8))) != 0
    }

    /// 4-byte dimension header: xL xH yL yH (little-endian byte width, height)
    pub fn header(&self) -> [u8; 4] {
        let x = (self.stride() as u16).to_le_bytes();
        let y = (self.height as u16).to_le_bytes();
        [x[0], x[1], y[0], y[1]]
    }

    /// Full raster command: GS v 0 m, dimension header, packed rows
    pub fn frame(&self) -> Vec<u8> {
        let mut out = Directive::RasterImage.bytes();
        out.reserve(4 + self.data.len());
        out.extend_from_slice(&self.header());
        out.extend_from_slice(&self.data);
        out
    }
}

/// Row stride in bytes for a pixel width
pub fn row_stride(width: u32) -> u32 {
    width.div_ceil(8)
}

/// Grayscale threshold: luma = 0.299R + 0.587G + 0.114B, ink below 128
///
/// Transparent pixels (alpha < 128) are blank.
pub fn is_ink(r: u8, g: u8, b: u8, a: u8) -> bool {
    if a < 128 {
        return false;
    }
    let luma = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
    luma < INK_THRESHOLD as f32
}
