use super::{Canvas, ColorMode, Mask};
use crate::error::InpaintError;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ImageError, ImageReader};
use std::io::Cursor;

/// JPEG quality used when the caller does not choose one
pub const DEFAULT_QUALITY: u8 = 95;

/// Encoding of the final result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Lossy, honours the quality setting
    #[default]
    Jpeg,
    /// Lossless, quality is ignored
    Png,
}

impl OutputFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
        }
    }
}

/// Upper bound on what the decoder will accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    pub max_pixels: u64,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_pixels: 40_000_000,
        }
    }
}

/// Raster types that can be produced by [`decode`].
pub trait Decoded: Sized {
    /// Channel layout the bytes are converted into
    const MODE: ColorMode;
    /// Human readable name used in error messages
    const WHAT: &'static str;

    fn from_dynamic(image: DynamicImage) -> Result<Self, InpaintError>;
}

impl Decoded for Canvas {
    const MODE: ColorMode = ColorMode::Rgb;
    const WHAT: &'static str = "image";

    fn from_dynamic(image: DynamicImage) -> Result<Self, InpaintError> {
        Canvas::from_image(image.to_rgb8())
    }
}

impl Decoded for Mask {
    const MODE: ColorMode = ColorMode::Grayscale;
    const WHAT: &'static str = "mask";

    fn from_dynamic(image: DynamicImage) -> Result<Self, InpaintError> {
        Mask::from_image(image.to_luma8())
    }
}

fn reader<'a>(bytes: &'a [u8], what: &'static str) -> Result<ImageReader<Cursor<&'a [u8]>>, InpaintError> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| InpaintError::Decode {
            what,
            source: ImageError::IoError(e),
        })
}

/// Decode encoded bytes into a typed raster.
///
/// The header is inspected first so oversized uploads are rejected before
/// any pixel memory is allocated.
pub fn decode<T: Decoded>(bytes: &[u8], limits: &DecodeLimits) -> Result<T, InpaintError> {
    let _span = tracing::debug_span!("decode", what = T::WHAT).entered();

    let (width, height) = reader(bytes, T::WHAT)?
        .into_dimensions()
        .map_err(|source| InpaintError::Decode {
            what: T::WHAT,
            source,
        })?;

    if width == 0 || height == 0 {
        return Err(InpaintError::Dimension(format!(
            "{} is empty ({}x{})",
            T::WHAT,
            width,
            height
        )));
    }

    let pixels = width as u64 * height as u64;
    if pixels > limits.max_pixels {
        return Err(InpaintError::Dimension(format!(
            "{} has {} pixels ({}x{}), limit is {}",
            T::WHAT,
            pixels,
            width,
            height,
            limits.max_pixels
        )));
    }

    let image = reader(bytes, T::WHAT)?
        .decode()
        .map_err(|source| InpaintError::Decode {
            what: T::WHAT,
            source,
        })?;

    tracing::debug!(
        "Decoded {} {}x{} as {:?}",
        T::WHAT,
        width,
        height,
        T::MODE
    );

    T::from_dynamic(image)
}

/// Encode a canvas for the response body.
///
/// `quality` only applies to JPEG; 0 is raised to the encoder's minimum of 1.
pub fn encode(canvas: &Canvas, format: OutputFormat, quality: u8) -> Result<Vec<u8>, InpaintError> {
    let _span = tracing::debug_span!("encode").entered();

    let mut buffer = Vec::new();
    match format {
        OutputFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
            canvas.as_image().write_with_encoder(encoder)
        }
        OutputFormat::Png => canvas
            .as_image()
            .write_with_encoder(PngEncoder::new(&mut buffer)),
    }
    .map_err(|source| InpaintError::Encode { source })?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgba, RgbaImage};

    fn png_bytes(image: DynamicImage) -> Vec<u8> {
        let mut buffer = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
            .unwrap();
        buffer
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode::<Canvas>(b"definitely not an image", &DecodeLimits::default()).unwrap_err();
        assert!(matches!(err, InpaintError::Decode { what: "image", .. }));
    }

    #[test]
    fn test_decode_flattens_alpha() {
        let rgba = RgbaImage::from_pixel(5, 3, Rgba([10, 20, 30, 0]));
        let bytes = png_bytes(DynamicImage::ImageRgba8(rgba));

        let canvas: Canvas = decode(&bytes, &DecodeLimits::default()).unwrap();
        assert_eq!(canvas.dimensions(), (5, 3));
        assert_eq!(canvas.as_raw().len(), 5 * 3 * 3);
        assert_eq!(&canvas.as_raw()[..3], &[10, 20, 30]);
    }

    #[test]
    fn test_decode_mask_grayscale() {
        let gray = GrayImage::from_pixel(4, 4, Luma([200]));
        let bytes = png_bytes(DynamicImage::ImageLuma8(gray));

        let mask: Mask = decode(&bytes, &DecodeLimits::default()).unwrap();
        assert_eq!(mask.dimensions(), (4, 4));
        assert!(mask.as_raw().iter().all(|&v| v == 200));
    }

    #[test]
    fn test_decode_enforces_pixel_limit() {
        let gray = GrayImage::new(10, 10);
        let bytes = png_bytes(DynamicImage::ImageLuma8(gray));

        let limits = DecodeLimits { max_pixels: 99 };
        let err = decode::<Mask>(&bytes, &limits).unwrap_err();
        assert!(matches!(err, InpaintError::Dimension(_)));
    }

    #[test]
    fn test_encode_jpeg_keeps_dimensions() {
        let canvas = Canvas::from_raw(17, 9, vec![128; 17 * 9 * 3]).unwrap();
        let bytes = encode(&canvas, OutputFormat::Jpeg, DEFAULT_QUALITY).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);

        let decoded: Canvas = decode(&bytes, &DecodeLimits::default()).unwrap();
        assert_eq!(decoded.dimensions(), (17, 9));

        let again = encode(&decoded, OutputFormat::Jpeg, DEFAULT_QUALITY).unwrap();
        let decoded_again: Canvas = decode(&again, &DecodeLimits::default()).unwrap();
        assert_eq!(decoded_again.dimensions(), (17, 9));
    }

    #[test]
    fn test_encode_png_is_lossless() {
        let pixels: Vec<u8> = (0..6 * 4 * 3).map(|v| (v * 7 % 256) as u8).collect();
        let canvas = Canvas::from_raw(6, 4, pixels).unwrap();
        let bytes = encode(&canvas, OutputFormat::Png, 0).unwrap();

        let decoded: Canvas = decode(&bytes, &DecodeLimits::default()).unwrap();
        assert_eq!(decoded, canvas);
    }

    #[test]
    fn test_encode_quality_zero_is_accepted() {
        let canvas = Canvas::from_raw(8, 8, vec![0; 8 * 8 * 3]).unwrap();
        assert!(encode(&canvas, OutputFormat::Jpeg, 0).is_ok());
    }
}
