use image::{DynamicImage, ImageFormat, ImageReader};
use std::io::Cursor;
use std::path::Path;

use crate::core::errors::{RenderError, RenderResult};

/// Run a CPU-bound closure on the blocking pool.
///
/// Decoding, encoding and glyph rasterization are synchronous and would
/// otherwise stall every pipeline sharing the runtime.
pub async fn run_blocking<F, T>(f: F) -> RenderResult<T>
where
    F: FnOnce() -> RenderResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| RenderError::TaskJoinFailed(e.to_string()))?
}

/// Decode an image from memory
pub fn decode_image(bytes: &[u8]) -> RenderResult<DynamicImage> {
    Ok(image::load_from_memory(bytes)?)
}

/// Read width and height from the header without decoding pixels
pub fn read_dimensions(bytes: &[u8]) -> RenderResult<(u32, u32)> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(image::ImageError::IoError)?;
    Ok(reader.into_dimensions()?)
}

/// Pick an encoder from the output file extension. Unknown or read-only
/// formats fall back to PNG.
pub fn output_format_for(path: &Path) -> ImageFormat {
    match ImageFormat::from_path(path) {
        Ok(format @ (ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::WebP | ImageFormat::Bmp)) => format,
        _ => ImageFormat::Png,
    }
}

/// Encode an image in the given format. JPEG has no alpha channel, so it is
/// flattened to RGB first.
pub fn encode_image(img: &DynamicImage, format: ImageFormat) -> RenderResult<Vec<u8>> {
    let mut bytes = Vec::new();
    let mut cursor = Cursor::new(&mut bytes);
    match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8()).write_to(&mut cursor, format)?,
        _ => img.write_to(&mut cursor, format)?,
    }
    Ok(bytes)
}
