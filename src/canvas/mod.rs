mod codec;

pub use codec::{decode, encode, DecodeLimits, Decoded, OutputFormat, DEFAULT_QUALITY};

use crate::error::InpaintError;
use image::{GrayImage, RgbImage};

/// Channel layout a raster is decoded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    /// Three channels, alpha flattened away
    Rgb,
    /// Single channel
    Grayscale,
}

impl ColorMode {
    pub fn channels(&self) -> usize {
        match self {
            ColorMode::Rgb => 3,
            ColorMode::Grayscale => 1,
        }
    }
}

/// Decoded RGB raster.
///
/// Width and height are always positive. A `Canvas` is never mutated after
/// construction; crop, pad and resize all produce a new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    image: RgbImage,
}

/// Single-channel selection raster paired with a [`Canvas`].
///
/// Samples above the service threshold mark pixels to be removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    image: GrayImage,
}

fn check_extent(width: u32, height: u32, len: usize, mode: ColorMode) -> Result<(), InpaintError> {
    if width == 0 || height == 0 {
        return Err(InpaintError::Dimension(format!(
            "raster must not be empty, got {}x{}",
            width, height
        )));
    }

    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(mode.channels()))
        .ok_or_else(|| {
            InpaintError::Dimension(format!("raster {}x{} overflows memory", width, height))
        })?;

    if len != expected {
        return Err(InpaintError::Dimension(format!(
            "buffer holds {} bytes, {}x{} with {} channel(s) needs {}",
            len,
            width,
            height,
            mode.channels(),
            expected
        )));
    }

    Ok(())
}

impl Canvas {
    /// Wrap raw RGB bytes laid out row-major.
    pub fn from_raw(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, InpaintError> {
        check_extent(width, height, pixels.len(), ColorMode::Rgb)?;
        let image = RgbImage::from_raw(width, height, pixels).ok_or_else(|| {
            InpaintError::Dimension(format!("cannot build {}x{} RGB raster", width, height))
        })?;
        Ok(Self { image })
    }

    pub fn from_image(image: RgbImage) -> Result<Self, InpaintError> {
        let (width, height) = image.dimensions();
        check_extent(width, height, image.as_raw().len(), ColorMode::Rgb)?;
        Ok(Self { image })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Returns (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn as_image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }
}

impl Mask {
    /// Wrap raw single-channel bytes laid out row-major.
    pub fn from_raw(width: u32, height: u32, samples: Vec<u8>) -> Result<Self, InpaintError> {
        check_extent(width, height, samples.len(), ColorMode::Grayscale)?;
        let image = GrayImage::from_raw(width, height, samples).ok_or_else(|| {
            InpaintError::Dimension(format!("cannot build {}x{} mask", width, height))
        })?;
        Ok(Self { image })
    }

    pub fn from_image(image: GrayImage) -> Result<Self, InpaintError> {
        let (width, height) = image.dimensions();
        check_extent(width, height, image.as_raw().len(), ColorMode::Grayscale)?;
        Ok(Self { image })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Returns (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn as_image(&self) -> &GrayImage {
        &self.image
    }

    pub fn into_image(self) -> GrayImage {
        self.image
    }

    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Number of samples strictly above `threshold`.
    pub fn selected_count(&self, threshold: u8) -> usize {
        self.image.as_raw().iter().filter(|&&v| v > threshold).count()
    }
}
