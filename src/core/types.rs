// Data model for the localization workflow

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Axis-aligned pixel box. An inverted box has zero extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl BoundingBox {
    pub fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> u32 {
        extent(self.x0, self.x1)
    }

    pub fn height(&self) -> u32 {
        extent(self.y0, self.y1)
    }

    pub fn center_x(&self) -> f32 {
        (self.x0 as i64 + self.x1 as i64) as f32 / 2.0
    }

    pub fn center_y(&self) -> f32 {
        (self.y0 as i64 + self.y1 as i64) as f32 / 2.0
    }

    /// Grow by `padding` on every side and clip to a `width` x `height`
    /// canvas. Returns half-open pixel ranges, or None when nothing remains.
    pub fn padded_within(&self, padding: u32, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let pad = padding.min(i32::MAX as u32) as i64;
        let clamp = |v: i64, max: u32| v.clamp(0, max as i64) as u32;

        let left = clamp(self.x0 as i64 - pad, width);
        let top = clamp(self.y0 as i64 - pad, height);
        let right = clamp(self.x1 as i64 + pad, width);
        let bottom = clamp(self.y1 as i64 + pad, height);

        (left < right && top < bottom).then_some((left, top, right, bottom))
    }
}

fn extent(start: i32, end: i32) -> u32 {
    (end as i64 - start as i64).clamp(0, u32::MAX as i64) as u32
}

/// Horizontal text alignment inside a region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    #[default]
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
}

/// Render style of one region. Any subset of fields may be given; the rest
/// take defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TextStyle {
    /// CSS-like family list, e.g. "Arial, sans-serif"
    pub font_family: String,
    pub font_size: f32,
    /// "normal", "bold" or a numeric weight
    pub font_weight: String,
    pub font_style: FontStyle,
    pub text_color: String,
    pub background_color: Option<String>,
    pub text_align: TextAlign,
    pub padding: f32,
    #[serde(rename = "borderRadius")]
    pub corner_radius: f32,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_family: "Arial, sans-serif".to_string(),
            font_size: 24.0,
            font_weight: "normal".to_string(),
            font_style: FontStyle::Normal,
            text_color: "#000000".to_string(),
            background_color: Some("rgba(255, 255, 255, 0.7)".to_string()),
            text_align: TextAlign::Center,
            padding: 5.0,
            corner_radius: 0.0,
        }
    }
}

impl TextStyle {
    /// Numeric CSS weight (400 normal, 700 bold)
    pub fn weight_value(&self) -> u16 {
        match self.font_weight.trim().to_ascii_lowercase().as_str() {
            "bold" | "bolder" => 700,
            "lighter" => 300,
            "normal" | "" => 400,
            other => other.parse().unwrap_or(400),
        }
    }
}

/// One detected text region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognizedWord {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub confidence: f32,
    pub bbox: BoundingBox,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(rename = "styles", default)]
    pub style: TextStyle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated_text: Option<String>,
}

impl RecognizedWord {
    pub fn new(id: impl Into<String>, text: impl Into<String>, confidence: f32, bbox: BoundingBox, style: TextStyle) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            confidence: confidence.clamp(0.0, 1.0),
            width: bbox.width(),
            height: bbox.height(),
            bbox,
            style,
            translated_text: None,
        }
    }

    /// Translated text when present and non-empty, source text otherwise
    pub fn display_text(&self) -> &str {
        match self.translated_text.as_deref() {
            Some(t) if !t.is_empty() => t,
            _ => &self.text,
        }
    }
}

/// Outcome of processing one image
///
/// Built only through the constructors below so that a result carries either
/// an output path or an error, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_path: Option<PathBuf>,
    /// Public-facing file name of the output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub words: Option<Vec<RecognizedWord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ImageResult {
    pub fn localized(output_path: PathBuf, words: Vec<RecognizedWord>) -> Self {
        Self {
            success: true,
            image_url: file_name_of(&output_path),
            result_path: Some(output_path),
            message: None,
            words: Some(words),
            image_path: None,
            error: None,
        }
    }

    pub fn no_text(output_path: PathBuf) -> Self {
        Self {
            success: true,
            image_url: file_name_of(&output_path),
            result_path: Some(output_path),
            message: Some(NO_TEXT_MESSAGE.to_string()),
            words: None,
            image_path: None,
            error: None,
        }
    }

    pub fn failed(input_path: PathBuf, error: impl Into<String>) -> Self {
        Self {
            success: false,
            result_path: None,
            image_url: None,
            message: None,
            words: None,
            image_path: Some(input_path),
            error: Some(error.into()),
        }
    }

    /// File name used when listing this result in the tally
    pub fn display_name(&self) -> String {
        self.image_path
            .as_deref()
            .or(self.result_path.as_deref())
            .and_then(file_name_of)
            .unwrap_or_else(|| "<unknown>".to_string())
    }
}

pub const NO_TEXT_MESSAGE: &str = "No text found in image";

fn file_name_of(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

/// Aggregate of a batch run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub processing_time_ms: f64,
    pub details: Vec<ImageResult>,
}

impl BatchSummary {
    pub fn with_total(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn record(&mut self, result: ImageResult) {
        if result.success {
            self.successful += 1;
        } else {
            self.failed += 1;
        }
        self.details.push(result);
    }

    pub fn failures(&self) -> impl Iterator<Item = &ImageResult> {
        self.details.iter().filter(|r| !r.success)
    }
}
