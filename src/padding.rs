//! Padding to the model's block size and restoration of the caller's extent.

use crate::canvas::{Canvas, Mask};
use crate::error::InpaintError;
use image::{imageops, ImageBuffer, Pixel};

/// Divisor every dimension processed by the model must be a multiple of
pub const BLOCK_SIZE: u32 = 8;

/// Where a model places the padding it adds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum PaddingConvention {
    /// All padding on the right and bottom edges; content stays at the origin
    #[default]
    Trailing,
    /// Padding split between both edges, the odd pixel going to the trailing edge
    Symmetric,
}

/// Working size the model actually processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaddedDimensions {
    pub width: u32,
    pub height: u32,
}

/// Reconciles the model's working size with the caller's canvas size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaddingAdapter {
    block_size: u32,
    convention: PaddingConvention,
}

impl Default for PaddingAdapter {
    fn default() -> Self {
        Self::new(BLOCK_SIZE, PaddingConvention::Trailing)
    }
}

fn round_up(value: u32, block: u32) -> u32 {
    value.div_ceil(block) * block
}

/// Index into `0..len` after mirroring past the end, edge sample included.
fn mirror(index: u32, len: u32) -> u32 {
    if index < len {
        return index;
    }
    let period = 2 * len;
    let folded = index % period;
    if folded < len {
        folded
    } else {
        period - 1 - folded
    }
}

/// Source index for padded position `index` when content starts at `offset`.
fn reflect(index: u32, offset: u32, len: u32) -> u32 {
    if index < offset {
        mirror(offset - 1 - index, len)
    } else {
        mirror(index - offset, len)
    }
}

fn pad_mirrored<P: Pixel>(
    image: &ImageBuffer<P, Vec<P::Subpixel>>,
    width: u32,
    height: u32,
    (off_x, off_y): (u32, u32),
) -> ImageBuffer<P, Vec<P::Subpixel>> {
    let (src_w, src_h) = image.dimensions();
    ImageBuffer::from_fn(width, height, |x, y| {
        *image.get_pixel(reflect(x, off_x, src_w), reflect(y, off_y, src_h))
    })
}

impl PaddingAdapter {
    /// `block_size` of 0 is treated as 1 (no padding).
    pub fn new(block_size: u32, convention: PaddingConvention) -> Self {
        Self {
            block_size: block_size.max(1),
            convention,
        }
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    pub fn convention(&self) -> PaddingConvention {
        self.convention
    }

    /// Smallest block multiples covering `width` x `height`.
    pub fn padded_dimensions(&self, width: u32, height: u32) -> PaddedDimensions {
        PaddedDimensions {
            width: round_up(width, self.block_size),
            height: round_up(height, self.block_size),
        }
    }

    /// Pad a canvas to the block size by mirroring its content.
    ///
    /// Content lands where `restore_original_extent` expects it for the same
    /// convention.
    pub fn pad_canvas(&self, canvas: &Canvas) -> Result<Canvas, InpaintError> {
        let (width, height) = canvas.dimensions();
        let padded = self.padded_dimensions(width, height);
        if (padded.width, padded.height) == (width, height) {
            return Ok(canvas.clone());
        }
        let offset = self.content_offset((padded.width, padded.height), (width, height));
        Canvas::from_image(pad_mirrored(canvas.as_image(), padded.width, padded.height, offset))
    }

    /// Pad a mask to the block size by mirroring its content.
    pub fn pad_mask(&self, mask: &Mask) -> Result<Mask, InpaintError> {
        let (width, height) = mask.dimensions();
        let padded = self.padded_dimensions(width, height);
        if (padded.width, padded.height) == (width, height) {
            return Ok(mask.clone());
        }
        let offset = self.content_offset((padded.width, padded.height), (width, height));
        Mask::from_image(pad_mirrored(mask.as_image(), padded.width, padded.height, offset))
    }

    /// Offset of the original content inside an output of `output` size.
    fn content_offset(&self, output: (u32, u32), original: (u32, u32)) -> (u32, u32) {
        match self.convention {
            PaddingConvention::Trailing => (0, 0),
            PaddingConvention::Symmetric => ((output.0 - original.0) / 2, (output.1 - original.1) / 2),
        }
    }

    /// Crop model output back to the caller's original size.
    ///
    /// Pure region copy, no resampling. Output already at the original size
    /// is returned unchanged.
    pub fn restore_original_extent(
        &self,
        output: Canvas,
        original_width: u32,
        original_height: u32,
    ) -> Result<Canvas, InpaintError> {
        let (out_w, out_h) = output.dimensions();
        if (out_w, out_h) == (original_width, original_height) {
            return Ok(output);
        }

        if out_w < original_width || out_h < original_height {
            return Err(InpaintError::Dimension(format!(
                "model output {}x{} is smaller than the input {}x{}",
                out_w, out_h, original_width, original_height
            )));
        }

        let (x, y) = self.content_offset((out_w, out_h), (original_width, original_height));
        tracing::debug!(
            "Cropping {}x{} output to {}x{} at ({}, {})",
            out_w,
            out_h,
            original_width,
            original_height,
            x,
            y
        );

        let cropped = imageops::crop_imm(output.as_image(), x, y, original_width, original_height).to_image();
        Canvas::from_image(cropped)
    }
}
