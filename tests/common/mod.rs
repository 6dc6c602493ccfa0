#![allow(dead_code)]

use anyhow::Result;
use image::{DynamicImage, GrayImage, ImageFormat, Luma, RgbImage};
use inpaintd::engine::{InpaintEngine, InpaintModel};
use inpaintd::padding::PaddingAdapter;
use inpaintd::pipeline::{InpaintPipeline, PipelineSettings};
use inpaintd::{Canvas, Mask};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const FILL: [u8; 3] = [250, 20, 200];

/// Stand-in for a generative model: pads its inputs with `padding` the way
/// LaMa does, turns selected pixels into `FILL` and returns the padded result.
pub struct FillModel {
    pub calls: Arc<AtomicUsize>,
    pub padding: PaddingAdapter,
}

impl InpaintModel for FillModel {
    fn name(&self) -> &'static str {
        "fill"
    }

    fn infer(&mut self, image: &Canvas, mask: &Mask) -> Result<Canvas> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        anyhow::ensure!(image.dimensions() == mask.dimensions(), "size mismatch");

        let image = self.padding.pad_canvas(image)?;
        let mask = self.padding.pad_mask(mask)?;

        let mut out = image.into_image();
        for (x, y, pixel) in out.enumerate_pixels_mut() {
            if mask.as_image().get_pixel(x, y)[0] > 0 {
                *pixel = image::Rgb(FILL);
            }
        }
        Ok(Canvas::from_image(out)?)
    }
}

/// Model that always fails, the way a device fault would surface.
pub struct BrokenModel;

impl InpaintModel for BrokenModel {
    fn name(&self) -> &'static str {
        "broken"
    }

    fn infer(&mut self, _image: &Canvas, _mask: &Mask) -> Result<Canvas> {
        anyhow::bail!("CUDA out of memory")
    }
}

/// Model that returns a canvas smaller than its input.
pub struct ShrinkingModel;

impl InpaintModel for ShrinkingModel {
    fn name(&self) -> &'static str {
        "shrinking"
    }

    fn infer(&mut self, image: &Canvas, _mask: &Mask) -> Result<Canvas> {
        let (width, height) = image.dimensions();
        Ok(Canvas::from_raw(
            (width - 1).max(1),
            height,
            vec![0; ((width - 1).max(1) * height * 3) as usize],
        )?)
    }
}

pub fn fill_pipeline(settings: PipelineSettings) -> (InpaintPipeline, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let model = FillModel {
        calls: calls.clone(),
        padding: settings.padding,
    };
    (pipeline_with(Box::new(model), settings), calls)
}

pub fn pipeline_with(model: Box<dyn InpaintModel>, settings: PipelineSettings) -> InpaintPipeline {
    let engine = InpaintEngine::new(vec![model]).unwrap();
    InpaintPipeline::new(Arc::new(engine), settings)
}

/// Smooth gradient, friendly to JPEG.
pub fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ])
    })
}

/// Black mask with a white rectangle.
pub fn rect_mask(width: u32, height: u32, x0: u32, y0: u32, w: u32, h: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        if x >= x0 && x < x0 + w && y >= y0 && y < y0 + h {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

pub fn png(image: DynamicImage) -> Vec<u8> {
    let mut buffer = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .unwrap();
    buffer
}
