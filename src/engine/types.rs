use crate::canvas::{Canvas, Mask};
use anyhow::Result;

/// Trait for inpainting models
/// Allows swapping between different backends (LaMa, MAT, test doubles, etc.)
pub trait InpaintModel: Send {
    /// Backend name used in logs and the health endpoint
    fn name(&self) -> &'static str;

    /// Reconstruct the selected region of an image
    ///
    /// # Arguments
    /// * `image` - Input RGB canvas
    /// * `mask` - Selection with the same dimensions as `image`
    ///
    /// # Returns
    /// * Reconstructed canvas. It may be larger than the input when the model
    ///   pads to its block size; the caller crops it back.
    fn infer(&mut self, image: &Canvas, mask: &Mask) -> Result<Canvas>;
}

/// Value range of the model's output tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputRange {
    /// Samples in [0, 1]
    #[default]
    Unit,
    /// Samples in [0, 255]
    Byte,
}

impl OutputRange {
    pub fn scale(&self) -> f32 {
        match self {
            OutputRange::Unit => 255.0,
            OutputRange::Byte => 1.0,
        }
    }
}
