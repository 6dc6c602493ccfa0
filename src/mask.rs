//! Mask alignment to the paired image's dimensions.
//!
//! Mask samples are categorical (selected or not), so resizing only ever
//! uses nearest-neighbor sampling. A smoothing filter would invent
//! intermediate values along the selection boundary.

use crate::canvas::Mask;
use crate::error::InpaintError;
use fast_image_resize as fr;
use image::GrayImage;

/// Align `mask` to `target_width` x `target_height`.
///
/// Returns the mask untouched when the sizes already agree.
pub fn align(mask: Mask, target_width: u32, target_height: u32) -> Result<Mask, InpaintError> {
    if mask.dimensions() == (target_width, target_height) {
        return Ok(mask);
    }

    let _span = tracing::debug_span!("align_mask").entered();
    let (width, height) = mask.dimensions();
    tracing::debug!(
        "Resizing mask {}x{} -> {}x{} (nearest)",
        width,
        height,
        target_width,
        target_height
    );

    let src = fr::images::Image::from_vec_u8(width, height, mask.into_image().into_raw(), fr::PixelType::U8)
        .map_err(|e| InpaintError::Dimension(format!("mask buffer rejected: {}", e)))?;
    let mut dst = fr::images::Image::new(target_width, target_height, fr::PixelType::U8);

    let options = fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Nearest);
    fr::Resizer::new()
        .resize(&src, &mut dst, Some(&options))
        .map_err(|e| InpaintError::Dimension(format!("mask resize failed: {}", e)))?;

    let resized = GrayImage::from_raw(target_width, target_height, dst.into_vec())
        .ok_or_else(|| InpaintError::Dimension("resized mask has wrong length".to_string()))?;

    Mask::from_image(resized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn checker(width: u32, height: u32) -> Mask {
        let samples = (0..height)
            .flat_map(|y| (0..width).map(move |x| if (x + y) % 2 == 0 { 255 } else { 0 }))
            .collect();
        Mask::from_raw(width, height, samples).unwrap()
    }

    #[test]
    fn test_align_same_size_is_identity() {
        let mask = checker(13, 7);
        let aligned = align(mask.clone(), 13, 7).unwrap();
        assert_eq!(aligned, mask);
    }

    #[test]
    fn test_align_upsamples_half_resolution() {
        // 2x2 quadrants, doubled to 4x4
        let mask = Mask::from_raw(2, 2, vec![255, 0, 0, 255]).unwrap();
        let aligned = align(mask, 4, 4).unwrap();

        assert_eq!(aligned.dimensions(), (4, 4));
        #[rustfmt::skip]
        let expected = vec![
            255, 255, 0, 0,
            255, 255, 0, 0,
            0, 0, 255, 255,
            0, 0, 255, 255,
        ];
        assert_eq!(aligned.as_raw(), expected.as_slice());
    }

    #[test]
    fn test_align_downsamples() {
        let mask = checker(64, 48);
        let aligned = align(mask, 20, 15).unwrap();
        assert_eq!(aligned.dimensions(), (20, 15));
    }

    proptest! {
        #[test]
        fn prop_align_never_blends(
            src_w in 1u32..40,
            src_h in 1u32..40,
            dst_w in 1u32..80,
            dst_h in 1u32..80,
            seed in any::<u64>(),
        ) {
            let samples: Vec<u8> = (0..(src_w * src_h) as u64)
                .map(|i| if (i.wrapping_mul(seed | 1) >> 7) % 3 == 0 { 255 } else { 0 })
                .collect();
            let allowed: HashSet<u8> = samples.iter().copied().collect();
            let mask = Mask::from_raw(src_w, src_h, samples).unwrap();

            let aligned = align(mask, dst_w, dst_h).unwrap();

            prop_assert_eq!(aligned.dimensions(), (dst_w, dst_h));
            prop_assert!(aligned.as_raw().iter().all(|v| allowed.contains(v)));
        }
    }
}
