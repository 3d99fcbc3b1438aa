// Fake collaborators for pipeline and scheduler tests

use async_trait::async_trait;
use cosmic_text::{fontdb, FontSystem};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::core::config::Config;
use crate::core::errors::{InpaintingError, InpaintingResult, RecognitionResult};
use crate::core::types::{BoundingBox, RecognizedWord, TextStyle};
use crate::orchestration::image_pipeline::Collaborators;
use crate::phases::composite::TextCompositor;
use crate::services::inpainting::Inpainter;
use crate::services::ocr::TextRecognizer;
use crate::services::rendering::CosmicTextRenderer;
use crate::services::translation::Translator;
use crate::utils::image_ops::{encode_image, read_dimensions};

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([200, 180, 160, 255]));
    encode_image(&DynamicImage::ImageRgba8(img), ImageFormat::Png).unwrap()
}

pub fn word(index: usize, text: &str, bbox: BoundingBox) -> RecognizedWord {
    RecognizedWord::new(format!("text_{index}"), text, 0.9, bbox, TextStyle::default())
}

pub fn test_config(root: &Path, max_concurrent: usize) -> Arc<Config> {
    let vars: HashMap<&str, String> = HashMap::from([
        ("INPUT_FOLDER", root.join("input").display().to_string()),
        ("OUTPUT_FOLDER", root.join("output").display().to_string()),
        ("TEMP_FOLDER", root.join("temp").display().to_string()),
        ("MAX_CONCURRENT", max_concurrent.to_string()),
        ("TRANSLATION_CONCURRENCY", "2".to_string()),
    ]);
    Arc::new(Config::from_lookup(|key| vars.get(key).cloned()).unwrap())
}

/// Renderer with no fonts: every region is skipped, pixels pass through
pub fn fontless_compositor() -> Arc<TextCompositor> {
    let font_system = FontSystem::new_with_locale_and_db("en-US".to_string(), fontdb::Database::new());
    Arc::new(TextCompositor::new(Arc::new(CosmicTextRenderer::from_font_system(font_system))))
}

/// Returns the words registered for an image width, none otherwise.
/// Tracks how many calls overlap.
#[derive(Default)]
pub struct FakeRecognizer {
    pub words_by_width: HashMap<u32, Vec<RecognizedWord>>,
    pub delay: Duration,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeRecognizer {
    pub fn with_words(words_by_width: HashMap<u32, Vec<RecognizedWord>>) -> Self {
        Self {
            words_by_width,
            ..Self::default()
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }
}

#[async_trait]
impl TextRecognizer for FakeRecognizer {
    async fn recognize(&self, image: &[u8]) -> RecognitionResult<Vec<RecognizedWord>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let (width, _) = read_dimensions(image).unwrap_or((0, 0));
        Ok(self.words_by_width.get(&width).cloned().unwrap_or_default())
    }
}

/// Looks translations up in a table; unknown text comes back unchanged.
/// Longer text answers sooner so completion order differs from input order.
#[derive(Default)]
pub struct FakeTranslator {
    pub table: HashMap<String, String>,
}

impl FakeTranslator {
    pub fn new(pairs: &[(&str, &str)]) -> Self {
        Self {
            table: pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        }
    }
}

#[async_trait]
impl Translator for FakeTranslator {
    async fn translate(&self, text: &str, _source: &str, _target: &str) -> String {
        let delay = 40u64.saturating_sub(text.len() as u64 * 5);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        self.table.get(text).cloned().unwrap_or_else(|| text.to_string())
    }
}

/// Hands the source image back and keeps every mask it was given.
/// Fails for images of `fail_width`.
#[derive(Default)]
pub struct FakeInpainter {
    pub fail_width: Option<u32>,
    pub masks: Mutex<Vec<Vec<u8>>>,
}

#[async_trait]
impl Inpainter for FakeInpainter {
    async fn inpaint(&self, image: &[u8], mask: &[u8]) -> InpaintingResult<Vec<u8>> {
        self.masks.lock().push(mask.to_vec());
        let (width, _) = read_dimensions(image).unwrap_or((0, 0));
        if Some(width) == self.fail_width {
            return Err(InpaintingError::PredictionFailed {
                id: "fake".to_string(),
                status: "failed".to_string(),
                detail: "model refused".to_string(),
            });
        }
        Ok(image.to_vec())
    }
}

pub fn collaborators(
    recognizer: Arc<FakeRecognizer>,
    translator: Arc<FakeTranslator>,
    inpainter: Arc<FakeInpainter>,
) -> Collaborators {
    Collaborators {
        recognizer,
        translator,
        inpainter,
        compositor: fontless_compositor(),
    }
}

/// Write `files` into `<root>/input`, creating output and temp dirs too
pub fn seed_input(root: &Path, files: &[(&str, Vec<u8>)]) -> PathBuf {
    let input = root.join("input");
    std::fs::create_dir_all(&input).unwrap();
    std::fs::create_dir_all(root.join("output")).unwrap();
    std::fs::create_dir_all(root.join("temp")).unwrap();
    for (name, bytes) in files {
        std::fs::write(input.join(name), bytes).unwrap();
    }
    input
}

pub fn dir_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir).map(|mut entries| entries.next().is_none()).unwrap_or(true)
}
