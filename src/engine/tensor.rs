use super::types::OutputRange;
use crate::canvas::{Canvas, Mask};
use anyhow::{ensure, Result};
use image::RgbImage;
use ndarray::{Array4, ArrayView4};

/// Converts canvases to model input tensors and model output back to canvases
pub struct TensorCodec {
    mask_threshold: u8,
    output_range: OutputRange,
}

impl TensorCodec {
    pub fn new(mask_threshold: u8, output_range: OutputRange) -> Self {
        Self {
            mask_threshold,
            output_range,
        }
    }

    /// Convert an RGB canvas into a normalized NCHW tensor
    ///
    /// Returns: Array4<f32> with shape [1, 3, height, width], values in [0, 1]
    pub fn image_tensor(&self, canvas: &Canvas) -> Array4<f32> {
        let _span = tracing::debug_span!("image_tensor").entered();

        let (width, height) = canvas.dimensions();
        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

        for (x, y, pixel) in canvas.as_image().enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            tensor[[0, 0, y, x]] = pixel[0] as f32 / 255.0;
            tensor[[0, 1, y, x]] = pixel[1] as f32 / 255.0;
            tensor[[0, 2, y, x]] = pixel[2] as f32 / 255.0;
        }

        tensor
    }

    /// Convert a mask into a binary [1, 1, height, width] tensor
    ///
    /// Samples above the threshold become 1.0, everything else 0.0.
    pub fn mask_tensor(&self, mask: &Mask) -> Array4<f32> {
        let (width, height) = mask.dimensions();
        let mut tensor = Array4::<f32>::zeros((1, 1, height as usize, width as usize));

        for (x, y, sample) in mask.as_image().enumerate_pixels() {
            if sample[0] > self.mask_threshold {
                tensor[[0, 0, y as usize, x as usize]] = 1.0;
            }
        }

        tensor
    }

    /// Convert a [1, 3, height, width] output tensor into a canvas
    pub fn output_canvas(&self, output: ArrayView4<f32>) -> Result<Canvas> {
        let shape = output.shape();
        ensure!(
            shape[0] == 1 && shape[1] == 3,
            "expected output shape [1, 3, H, W], got {:?}",
            shape
        );
        let (height, width) = (shape[2] as u32, shape[3] as u32);
        let scale = self.output_range.scale();

        let image = RgbImage::from_fn(width, height, |x, y| {
            let (x, y) = (x as usize, y as usize);
            let channel = |c: usize| (output[[0, c, y, x]] * scale).round().clamp(0.0, 255.0) as u8;
            image::Rgb([channel(0), channel(1), channel(2)])
        });

        Ok(Canvas::from_image(image)?)
    }
}
