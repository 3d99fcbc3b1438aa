use cosmic_text::{
    fontdb, Attrs, Buffer, Color as CosmicColor, Family, FontSystem, Metrics, Shaping, Style,
    SwashCache, Weight, Wrap,
};
use image::{Rgba, RgbaImage};
use parking_lot::{Mutex, MutexGuard};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::core::errors::{RenderError, RenderResult};
use crate::core::types::{FontStyle, TextStyle};
use crate::phases::layout::{TextMeasure, LINE_HEIGHT_FACTOR};

/// Text renderer backed by cosmic-text
///
/// Owns the font database and glyph cache. Shaping and rasterization happen
/// inside a [`FontSession`], which holds both locks while one image is
/// composited.
pub struct CosmicTextRenderer {
    font_system: Mutex<FontSystem>,
    swash_cache: Mutex<SwashCache>,
}

/// A concrete face picked for a style
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFont {
    pub family: String,
    pub size: f32,
    pub weight: Weight,
    pub style: Style,
}

impl CosmicTextRenderer {
    /// Create a renderer over the system fonts plus an optional extra font directory
    pub fn new(font_dir: Option<&Path>) -> Self {
        info!("Initializing CosmicTextRenderer");

        let mut font_system = FontSystem::new();
        if let Some(dir) = font_dir {
            font_system.db_mut().load_fonts_dir(dir);
            debug!("Loaded fonts from {}", dir.display());
        }

        let face_count = font_system.db().faces().count();
        if face_count == 0 {
            warn!("No fonts available; every region will be skipped at render time");
        } else {
            info!("✓ Renderer initialized ({} font faces)", face_count);
        }

        Self::from_font_system(font_system)
    }

    pub fn from_font_system(font_system: FontSystem) -> Self {
        Self {
            font_system: Mutex::new(font_system),
            swash_cache: Mutex::new(SwashCache::new()),
        }
    }

    /// Lock the font system and glyph cache for a batch of operations
    pub fn session(&self) -> FontSession<'_> {
        FontSession {
            font_system: self.font_system.lock(),
            swash_cache: self.swash_cache.lock(),
        }
    }
}

/// Locked access to the renderer
pub struct FontSession<'a> {
    font_system: MutexGuard<'a, FontSystem>,
    swash_cache: MutexGuard<'a, SwashCache>,
}

impl FontSession<'_> {
    /// Resolve a CSS-like family list to an installed face.
    ///
    /// Candidates are tried in order; generic names map to fontdb generics.
    /// When nothing matches, any installed face is used so text still shows.
    pub fn resolve(&self, style: &TextStyle) -> RenderResult<ResolvedFont> {
        if style.font_size <= 0.0 || !style.font_size.is_finite() {
            return Err(RenderError::MeasureFailed(format!(
                "invalid font size {}",
                style.font_size
            )));
        }

        let weight = Weight(style.weight_value());
        let font_style = match style.font_style {
            FontStyle::Normal => Style::Normal,
            FontStyle::Italic => Style::Italic,
        };
        let db = self.font_system.db();

        let candidates = parse_family_list(&style.font_family);
        let found = candidates.iter().find_map(|candidate| {
            let families = [candidate.as_family()];
            db.query(&fontdb::Query {
                families: &families,
                weight,
                stretch: fontdb::Stretch::Normal,
                style: font_style,
            })
        });

        let face = match found {
            Some(id) => db.face(id),
            None => {
                debug!("No face for '{}', using first available", style.font_family);
                db.faces().next()
            }
        };

        let family = face
            .and_then(|f| f.families.first().map(|(name, _)| name.clone()))
            .ok_or_else(|| RenderError::FontNotFound {
                family: style.font_family.clone(),
            })?;

        Ok(ResolvedFont {
            family,
            size: style.font_size,
            weight,
            style: font_style,
        })
    }

    /// Logical advance width of a single line
    pub fn measure(&mut self, text: &str, font: &ResolvedFont) -> RenderResult<f32> {
        let buffer = self.shape_line(text, font);
        Ok(buffer
            .layout_runs()
            .map(|run| run.line_w)
            .fold(0.0f32, f32::max))
    }

    /// Draw one line with its left edge at `left` and its vertical middle at `middle_y`
    pub fn draw_line(
        &mut self,
        canvas: &mut RgbaImage,
        text: &str,
        font: &ResolvedFont,
        color: Rgba<u8>,
        left: f32,
        middle_y: f32,
    ) {
        if text.is_empty() {
            return;
        }

        let buffer = self.shape_line(text, font);
        let origin_x = left.round() as i32;
        let origin_y = (middle_y - line_height(font) / 2.0).round() as i32;
        let cosmic_color = CosmicColor::rgba(color[0], color[1], color[2], color[3]);

        let FontSession {
            font_system,
            swash_cache,
        } = self;

        buffer.draw(font_system, swash_cache, cosmic_color, |px, py, w, h, pixel| {
            if pixel.a() == 0 {
                return;
            }
            let src = Rgba([pixel.r(), pixel.g(), pixel.b(), pixel.a()]);
            for dy in 0..h as i32 {
                for dx in 0..w as i32 {
                    blend_pixel(canvas, origin_x + px + dx, origin_y + py + dy, src);
                }
            }
        });
    }

    fn shape_line(&mut self, text: &str, font: &ResolvedFont) -> Buffer {
        let metrics = Metrics::new(font.size, line_height(font));
        let font_system = &mut *self.font_system;

        let mut buffer = Buffer::new(font_system, metrics);
        buffer.set_size(font_system, None, None);
        buffer.set_wrap(font_system, Wrap::None);

        let attrs = Attrs::new()
            .family(Family::Name(&font.family))
            .weight(font.weight)
            .style(font.style);
        buffer.set_text(font_system, text, &attrs, Shaping::Advanced);
        buffer.shape_until_scroll(font_system, false);
        buffer
    }
}

fn line_height(font: &ResolvedFont) -> f32 {
    font.size * LINE_HEIGHT_FACTOR
}

/// Measures with one resolved font through a session
pub struct SessionMeasure<'s, 'a> {
    pub session: &'s mut FontSession<'a>,
    pub font: &'s ResolvedFont,
}

impl TextMeasure for SessionMeasure<'_, '_> {
    fn measure(&mut self, text: &str) -> RenderResult<f32> {
        self.session.measure(text, self.font)
    }
}

/// Source-over blend of `src` onto the canvas; out-of-bounds writes are dropped
pub(crate) fn blend_pixel(canvas: &mut RgbaImage, x: i32, y: i32, src: Rgba<u8>) {
    if x < 0 || y < 0 || x >= canvas.width() as i32 || y >= canvas.height() as i32 {
        return;
    }
    let dst = canvas.get_pixel_mut(x as u32, y as u32);
    let alpha = src[3] as f32 / 255.0;
    let inv_alpha = 1.0 - alpha;

    *dst = Rgba([
        (src[0] as f32 * alpha + dst[0] as f32 * inv_alpha).round() as u8,
        (src[1] as f32 * alpha + dst[1] as f32 * inv_alpha).round() as u8,
        (src[2] as f32 * alpha + dst[2] as f32 * inv_alpha).round() as u8,
        dst[3].max(src[3]),
    ]);
}

/// One entry of a CSS family list
#[derive(Debug, Clone, PartialEq)]
enum FamilyCandidate {
    Named(String),
    SansSerif,
    Serif,
    Monospace,
    Cursive,
    Fantasy,
}

impl FamilyCandidate {
    fn as_family(&self) -> Family<'_> {
        match self {
            FamilyCandidate::Named(name) => Family::Name(name),
            FamilyCandidate::SansSerif => Family::SansSerif,
            FamilyCandidate::Serif => Family::Serif,
            FamilyCandidate::Monospace => Family::Monospace,
            FamilyCandidate::Cursive => Family::Cursive,
            FamilyCandidate::Fantasy => Family::Fantasy,
        }
    }
}

fn parse_family_list(list: &str) -> Vec<FamilyCandidate> {
    let mut candidates: Vec<FamilyCandidate> = list
        .split(',')
        .map(|name| name.trim().trim_matches(|c| c == '"' || c == '\''))
        .filter(|name| !name.is_empty())
        .map(|name| match name.to_ascii_lowercase().as_str() {
            "sans-serif" | "system-ui" => FamilyCandidate::SansSerif,
            "serif" => FamilyCandidate::Serif,
            "monospace" => FamilyCandidate::Monospace,
            "cursive" => FamilyCandidate::Cursive,
            "fantasy" => FamilyCandidate::Fantasy,
            _ => FamilyCandidate::Named(name.to_string()),
        })
        .collect();

    if !candidates.contains(&FamilyCandidate::SansSerif) {
        candidates.push(FamilyCandidate::SansSerif);
    }
    candidates
}
