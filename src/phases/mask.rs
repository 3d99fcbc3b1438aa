// Mask building: text regions to a white-on-black inpainting mask

use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use tracing::debug;

use crate::core::errors::{RenderError, RenderResult};
use crate::core::types::RecognizedWord;
use crate::utils::image_ops::{encode_image, read_dimensions};

/// Padding applied around every region when no other value is configured
pub const DEFAULT_MASK_PADDING: u32 = 5;

const KEEP: Luma<u8> = Luma([0]);
const ERASE: Luma<u8> = Luma([255]);

/// Paint a mask of `width` x `height`.
///
/// Every region's box, grown by `padding` on each side and clipped to the
/// canvas, is painted white; everything else stays black. Boxes outside the
/// canvas paint nothing. Returns the mask PNG-encoded as 8-bit grayscale.
pub fn build_mask(
    width: u32,
    height: u32,
    regions: &[RecognizedWord],
    padding: u32,
) -> RenderResult<Vec<u8>> {
    let mask = paint_mask(width, height, regions, padding)?;
    encode_image(&DynamicImage::ImageLuma8(mask), ImageFormat::Png)
}

/// Same as [`build_mask`], sized from the encoded source image
pub fn build_mask_for_image(
    image_bytes: &[u8],
    regions: &[RecognizedWord],
    padding: u32,
) -> RenderResult<Vec<u8>> {
    let (width, height) = read_dimensions(image_bytes)?;
    build_mask(width, height, regions, padding)
}

pub(crate) fn paint_mask(
    width: u32,
    height: u32,
    regions: &[RecognizedWord],
    padding: u32,
) -> RenderResult<GrayImage> {
    if width == 0 || height == 0 {
        return Err(RenderError::InvalidDimensions { width, height });
    }

    let mut mask = GrayImage::from_pixel(width, height, KEEP);

    for region in regions {
        let Some((left, top, right, bottom)) = region.bbox.padded_within(padding, width, height) else {
            debug!("Region {} lies outside the {}x{} canvas, skipping", region.id, width, height);
            continue;
        };

        for y in top..bottom {
            for x in left..right {
                mask.put_pixel(x, y, ERASE);
            }
        }
    }

    Ok(mask)
}
