//! Image normalization into the native pixel layout
//!
//! The engine reads 32bpp ARGB, top-down, with an explicit row stride. In
//! memory that is little-endian ARGB: bytes B, G, R, A for each pixel.

use image::DynamicImage;
use std::marker::PhantomData;
use tracing::{debug, trace};

use crate::error::{OcrError, Result};
use crate::ffi::{RawImage, FORMAT_ARGB32};

const BYTES_PER_PIXEL: usize = 4;

/// Rows are padded to a multiple of this many bytes.
const ROW_ALIGNMENT: usize = 4;

/// Pixel layout of a caller-owned raw buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    /// 32bpp, bytes B, G, R, A (the canonical layout)
    Bgra8,
    /// 32bpp, bytes R, G, B, A
    Rgba8,
    /// 24bpp, bytes B, G, R
    Bgr8,
    /// 24bpp, bytes R, G, B
    Rgb8,
    /// 8bpp grayscale
    Gray8,
}

impl PixelLayout {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelLayout::Bgra8 | PixelLayout::Rgba8 => 4,
            PixelLayout::Bgr8 | PixelLayout::Rgb8 => 3,
            PixelLayout::Gray8 => 1,
        }
    }

    /// Write one pixel in B, G, R, A order.
    fn to_bgra(self, src: &[u8], dst: &mut [u8]) {
        match self {
            PixelLayout::Bgra8 => dst.copy_from_slice(&src[..4]),
            PixelLayout::Rgba8 => dst.copy_from_slice(&[src[2], src[1], src[0], src[3]]),
            PixelLayout::Bgr8 => dst.copy_from_slice(&[src[0], src[1], src[2], 255]),
            PixelLayout::Rgb8 => dst.copy_from_slice(&[src[2], src[1], src[0], 255]),
            PixelLayout::Gray8 => dst.copy_from_slice(&[src[0], src[0], src[0], 255]),
        }
    }
}

/// Borrowed view of a raw raster in any supported layout.
///
/// `data` holds rows in memory order. A negative `stride` marks bottom-up
/// storage: the first row in memory is the bottom row of the image.
#[derive(Debug, Clone, Copy)]
pub struct RawRaster<'a> {
    pub data: &'a [u8],
    pub width: u32,
    pub height: u32,
    pub stride: isize,
    pub layout: PixelLayout,
}

impl<'a> RawRaster<'a> {
    /// Memory offset of top-down row `y`.
    fn row_offset(&self, y: usize) -> usize {
        let stride = self.stride.unsigned_abs();
        if self.stride >= 0 {
            y * stride
        } else {
            (self.height as usize - 1 - y) * stride
        }
    }
}

/// Canonical pixel buffer handed to the native engine.
///
/// Always owned, top-down and 32bpp ARGB. `stride` is the row length in
/// bytes and may exceed `width * 4`; always index rows through it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgbImage {
    width: u32,
    height: u32,
    stride: usize,
    pixels: Vec<u8>,
}

impl ArgbImage {
    fn blank(width: u32, height: u32) -> Result<Self> {
        validate_dimensions(width, height)?;
        let row = width as usize * BYTES_PER_PIXEL;
        let stride = row.div_ceil(ROW_ALIGNMENT) * ROW_ALIGNMENT;
        let len = stride.checked_mul(height as usize).ok_or_else(|| {
            OcrError::InvalidImage(format!("{}x{} image is too large", width, height))
        })?;
        Ok(Self {
            width,
            height,
            stride,
            pixels: vec![0; len],
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Raw bytes, `stride * height` long.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// One row without its padding.
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        &self.pixels[start..start + self.width as usize * BYTES_PER_PIXEL]
    }

    fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let start = y as usize * self.stride;
        let len = self.width as usize * BYTES_PER_PIXEL;
        &mut self.pixels[start..start + len]
    }

    /// Pixel at (x, y) as `[b, g, r, a]`.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let start = x as usize * BYTES_PER_PIXEL;
        let row = self.row(y);
        [row[start], row[start + 1], row[start + 2], row[start + 3]]
    }

    /// View this buffer as a raw raster, e.g. to copy it.
    pub fn as_raster(&self) -> RawRaster<'_> {
        RawRaster {
            data: &self.pixels,
            width: self.width,
            height: self.height,
            stride: self.stride as isize,
            layout: PixelLayout::Bgra8,
        }
    }

    /// Lock the pixels for one native call.
    ///
    /// The lock holds an exclusive borrow, so the buffer can neither move nor
    /// be freed or mutated until the lock is dropped, on any exit path.
    pub fn lock(&mut self) -> Result<PixelLock<'_>> {
        let width = i32::try_from(self.width)
            .map_err(|_| OcrError::InvalidImage(format!("width {} out of range", self.width)))?;
        let height = i32::try_from(self.height)
            .map_err(|_| OcrError::InvalidImage(format!("height {} out of range", self.height)))?;
        let stride = i64::try_from(self.stride)
            .map_err(|_| OcrError::InvalidImage(format!("stride {} out of range", self.stride)))?;

        trace!("locking {}x{} pixel buffer", width, height);
        Ok(PixelLock {
            descriptor: RawImage {
                format: FORMAT_ARGB32,
                width,
                height,
                reserved: 0,
                stride: stride.abs(),
                data: self.pixels.as_ptr(),
            },
            _pixels: PhantomData,
        })
    }
}

/// Scoped access to an [`ArgbImage`] for native code.
pub struct PixelLock<'a> {
    descriptor: RawImage,
    _pixels: PhantomData<&'a mut ArgbImage>,
}

impl PixelLock<'_> {
    /// Descriptor pointing into the locked buffer; cannot outlive the lock.
    pub fn descriptor(&self) -> &RawImage {
        &self.descriptor
    }
}

impl Drop for PixelLock<'_> {
    fn drop(&mut self) {
        trace!("released pixel lock");
    }
}

fn validate_dimensions(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(OcrError::InvalidImage(format!(
            "image has zero size ({}x{})",
            width, height
        )));
    }
    if width > i32::MAX as u32 || height > i32::MAX as u32 {
        return Err(OcrError::InvalidImage(format!(
            "image dimensions {}x{} exceed the native limit",
            width, height
        )));
    }
    Ok(())
}

/// Convert any decoded image to the canonical layout.
///
/// Always allocates a new buffer; dimensions are preserved.
pub fn normalize(image: &DynamicImage) -> Result<ArgbImage> {
    let (width, height) = (image.width(), image.height());
    validate_dimensions(width, height)?;
    debug!("normalizing {}x{} {:?} image", width, height, image.color());

    let rgba = image.to_rgba8();
    let mut out = ArgbImage::blank(width, height)?;
    for (y, src) in rgba.rows().enumerate() {
        let dst = out.row_mut(y as u32);
        for (pixel, dst) in src.zip(dst.chunks_exact_mut(BYTES_PER_PIXEL)) {
            PixelLayout::Rgba8.to_bgra(&pixel.0, dst);
        }
    }
    Ok(out)
}

/// Convert a raw raster to the canonical layout.
///
/// Bottom-up input (negative stride) comes out top-down. Canonical input is
/// still copied so the result never aliases caller memory.
pub fn normalize_raw(raster: RawRaster<'_>) -> Result<ArgbImage> {
    validate_dimensions(raster.width, raster.height)?;

    let bpp = raster.layout.bytes_per_pixel();
    let row_len = raster.width as usize * bpp;
    let stride = raster.stride.unsigned_abs();
    if stride < row_len {
        return Err(OcrError::InvalidImage(format!(
            "stride {} is shorter than a {} byte row",
            raster.stride, row_len
        )));
    }
    let required = (raster.height as usize - 1)
        .checked_mul(stride)
        .and_then(|n| n.checked_add(row_len))
        .ok_or_else(|| OcrError::InvalidImage("raster size overflows".to_string()))?;
    if raster.data.len() < required {
        return Err(OcrError::InvalidImage(format!(
            "buffer holds {} bytes, {}x{} {:?} with stride {} needs {}",
            raster.data.len(),
            raster.width,
            raster.height,
            raster.layout,
            raster.stride,
            required
        )));
    }

    debug!(
        "normalizing {}x{} {:?} raster (stride {})",
        raster.width, raster.height, raster.layout, raster.stride
    );

    let mut out = ArgbImage::blank(raster.width, raster.height)?;
    for y in 0..raster.height {
        let start = raster.row_offset(y as usize);
        let src = &raster.data[start..start + row_len];
        let dst = out.row_mut(y);
        for (src, dst) in src.chunks_exact(bpp).zip(dst.chunks_exact_mut(BYTES_PER_PIXEL)) {
            raster.layout.to_bgra(src, dst);
        }
    }
    Ok(out)
}
