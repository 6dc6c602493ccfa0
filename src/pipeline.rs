//! Request-scoped orchestration: decode, align, infer, restore, encode.
//!
//! The pipeline is strictly linear and fails fast. The first failing stage's
//! error is returned unchanged and nothing partial is ever produced.

use crate::canvas::{self, Canvas, DecodeLimits, Mask, OutputFormat, DEFAULT_QUALITY};
use crate::engine::InpaintEngine;
use crate::error::InpaintError;
use crate::padding::PaddingAdapter;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// Knobs that shape a pipeline run, independent of the model.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub format: OutputFormat,
    /// 0-100, JPEG only
    pub quality: u8,
    pub limits: DecodeLimits,
    pub padding: PaddingAdapter,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            format: OutputFormat::Jpeg,
            quality: DEFAULT_QUALITY,
            limits: DecodeLimits::default(),
            padding: PaddingAdapter::default(),
        }
    }
}

/// Decoded inputs of one call.
#[derive(Debug, Clone)]
pub struct InpaintRequest {
    pub image: Canvas,
    pub mask: Mask,
}

impl InpaintRequest {
    /// Decode the image first so a malformed image fails before the mask is read.
    pub fn decode(image_bytes: &[u8], mask_bytes: &[u8], limits: &DecodeLimits) -> Result<Self, InpaintError> {
        let image = canvas::decode::<Canvas>(image_bytes, limits)?;
        let mask = canvas::decode::<Mask>(mask_bytes, limits)?;
        Ok(Self { image, mask })
    }
}

/// Restored canvas and its encoded form.
#[derive(Debug, Clone)]
pub struct InpaintResult {
    pub canvas: Canvas,
    pub encoded: Vec<u8>,
    pub format: OutputFormat,
}

impl InpaintResult {
    pub fn into_bytes(self) -> Vec<u8> {
        self.encoded
    }
}

/// Composes mask alignment, inference and restoration around a shared engine.
#[derive(Clone)]
pub struct InpaintPipeline {
    engine: Arc<InpaintEngine>,
    settings: PipelineSettings,
}

impl InpaintPipeline {
    pub fn new(engine: Arc<InpaintEngine>, settings: PipelineSettings) -> Self {
        Self { engine, settings }
    }

    pub fn engine(&self) -> &InpaintEngine {
        &self.engine
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run the whole pipeline on encoded image and mask bytes.
    ///
    /// Blocks the calling thread for the duration of inference.
    pub fn run(&self, image_bytes: &[u8], mask_bytes: &[u8]) -> Result<InpaintResult, InpaintError> {
        let _span = tracing::debug_span!("pipeline").entered();
        let start = Instant::now();

        let decode_start = Instant::now();
        let request = InpaintRequest::decode(image_bytes, mask_bytes, &self.settings.limits)?;
        tracing::debug!("decode={:.1}ms", ms(decode_start.elapsed()));

        let result = self.process(request)?;

        tracing::info!(
            "Inpainted {}x{} image into {} bytes of {} in {:.1}ms",
            result.canvas.width(),
            result.canvas.height(),
            result.encoded.len(),
            result.format.mime_type(),
            ms(start.elapsed())
        );

        Ok(result)
    }

    /// Run the pipeline on already decoded inputs.
    pub fn process(&self, request: InpaintRequest) -> Result<InpaintResult, InpaintError> {
        let InpaintRequest { image, mask } = request;
        let (width, height) = image.dimensions();
        tracing::debug!(
            "Image {}x{}, mask {}x{}",
            width,
            height,
            mask.width(),
            mask.height()
        );

        let align_start = Instant::now();
        let mask = crate::mask::align(mask, width, height)?;
        let align_time = align_start.elapsed();

        let expected = self.settings.padding.padded_dimensions(width, height);
        let infer_start = Instant::now();
        let output = self.engine.infer(&image, &mask)?;
        let infer_time = infer_start.elapsed();
        if output.dimensions() != (width, height) && output.dimensions() != (expected.width, expected.height) {
            tracing::warn!(
                "Model returned {}x{}, expected {}x{} or {}x{}",
                output.width(),
                output.height(),
                width,
                height,
                expected.width,
                expected.height
            );
        }

        let restore_start = Instant::now();
        let restored = self.settings.padding.restore_original_extent(output, width, height)?;
        let restore_time = restore_start.elapsed();

        let encode_start = Instant::now();
        let encoded = canvas::encode(&restored, self.settings.format, self.settings.quality)?;
        let encode_time = encode_start.elapsed();

        tracing::debug!(
            "align={:.1}ms, infer={:.1}ms, restore={:.1}ms, encode={:.1}ms",
            ms(align_time),
            ms(infer_time),
            ms(restore_time),
            ms(encode_time)
        );

        Ok(InpaintResult {
            canvas: restored,
            encoded,
            format: self.settings.format,
        })
    }
}
