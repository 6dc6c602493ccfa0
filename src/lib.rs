//! Object removal service built around a black-box inpainting model.
//!
//! Arbitrary image and mask sizes are normalized to the model's block-size
//! constraint, the model runs exactly once per request, and its padded output
//! is cropped back to the caller's canvas.

pub mod canvas;
pub mod config;
pub mod engine;
pub mod error;
pub mod mask;
pub mod padding;
pub mod pipeline;
pub mod server;

pub use canvas::{Canvas, Mask};
pub use error::InpaintError;
pub use pipeline::{InpaintPipeline, PipelineSettings};
