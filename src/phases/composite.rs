// Compositing: translated text drawn back over the inpainted image

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::core::errors::RenderResult;
use crate::core::types::{BoundingBox, RecognizedWord};
use crate::phases::layout::layout_region;
use crate::services::rendering::{blend_pixel, CosmicTextRenderer, FontSession, SessionMeasure};
use crate::utils::color::parse_css_color;
use crate::utils::image_ops::{decode_image, encode_image, run_blocking};

const FALLBACK_TEXT_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Draws each region's background and wrapped text onto a base image
pub struct TextCompositor {
    renderer: Arc<CosmicTextRenderer>,
}

impl TextCompositor {
    pub fn new(renderer: Arc<CosmicTextRenderer>) -> Self {
        Self { renderer }
    }

    /// Composite `regions` onto the encoded `base` image and encode the
    /// result in `format`.
    ///
    /// Regions are drawn in order, so later ones paint over earlier ones.
    /// A region whose font cannot be resolved or measured is skipped with a
    /// warning; the rest of the image is still produced.
    pub fn composite(&self, base: &[u8], regions: &[RecognizedWord], format: ImageFormat) -> RenderResult<Vec<u8>> {
        let mut canvas = decode_image(base)?.to_rgba8();
        let mut session = self.renderer.session();

        for region in regions {
            if let Err(e) = draw_region(&mut session, &mut canvas, region) {
                warn!("Skipping region {} ('{}'): {}", region.id, region.display_text(), e);
            }
        }
        drop(session);

        encode_image(&DynamicImage::ImageRgba8(canvas), format)
    }

    /// [`composite`](Self::composite) on the blocking pool
    pub async fn composite_async(
        self: Arc<Self>,
        base: Vec<u8>,
        regions: Vec<RecognizedWord>,
        format: ImageFormat,
    ) -> RenderResult<Vec<u8>> {
        run_blocking(move || self.composite(&base, &regions, format)).await
    }
}

fn draw_region(session: &mut FontSession<'_>, canvas: &mut RgbaImage, region: &RecognizedWord) -> RenderResult<()> {
    let style = &region.style;
    let font = session.resolve(style)?;

    let layout = {
        let mut measure = SessionMeasure {
            session: &mut *session,
            font: &font,
        };
        layout_region(&mut measure, region)?
    };
    let Some(layout) = layout else {
        debug!("Region {} has no text to draw", region.id);
        return Ok(());
    };

    let mut line_widths = Vec::with_capacity(layout.lines.len());
    for line in &layout.lines {
        line_widths.push(session.measure(line, &font)?);
    }

    if let Some(background) = style.background_color.as_deref() {
        match parse_css_color(background) {
            Some(color) if color[3] > 0 => fill_box(canvas, &region.bbox, style.corner_radius, color),
            Some(_) => {}
            None => warn!("Unrecognized background color '{}' on {}", background, region.id),
        }
    }

    let text_color = parse_css_color(&style.text_color).unwrap_or_else(|| {
        warn!("Unrecognized text color '{}' on {}, using black", style.text_color, region.id);
        FALLBACK_TEXT_COLOR
    });

    for ((line, width), middle_y) in layout.lines.iter().zip(&line_widths).zip(layout.baselines()) {
        session.draw_line(canvas, line, &font, text_color, layout.line_left(*width), middle_y);
    }

    Ok(())
}

/// Fill a box, rounding its corners when `radius` is positive. The radius is
/// capped at half the shorter side.
fn fill_box(canvas: &mut RgbaImage, bbox: &BoundingBox, radius: f32, color: Rgba<u8>) {
    let Some((left, top, right, bottom)) = bbox.padded_within(0, canvas.width(), canvas.height()) else {
        return;
    };

    let radius = radius
        .min(bbox.width() as f32 / 2.0)
        .min(bbox.height() as f32 / 2.0)
        .max(0.0);

    for y in top..bottom {
        for x in left..right {
            if radius > 0.0 && !inside_rounded(bbox, radius, x as f32 + 0.5, y as f32 + 0.5) {
                continue;
            }
            blend_pixel(canvas, x as i32, y as i32, color);
        }
    }
}

fn inside_rounded(bbox: &BoundingBox, radius: f32, px: f32, py: f32) -> bool {
    let (x0, y0, x1, y1) = (bbox.x0 as f32, bbox.y0 as f32, bbox.x1 as f32, bbox.y1 as f32);

    let cx = if px < x0 + radius {
        x0 + radius
    } else if px > x1 - radius {
        x1 - radius
    } else {
        return true;
    };
    let cy = if py < y0 + radius {
        y0 + radius
    } else if py > y1 - radius {
        y1 - radius
    } else {
        return true;
    };

    let (dx, dy) = (px - cx, py - cy);
    dx * dx + dy * dy <= radius * radius
}
