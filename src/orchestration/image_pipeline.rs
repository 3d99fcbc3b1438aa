// Image Pipeline: one image from source file to localized output
//
// recognize -> translate -> mask -> inpaint -> composite -> cleanup, with a
// short-circuit when no text is found. Every failure ends in a failure
// ImageResult; nothing escapes to the scheduler.

use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::core::config::Config;
use crate::core::errors::{IoContext, PipelineError, PipelineResult};
use crate::core::types::{ImageResult, RecognizedWord};
use crate::phases::composite::TextCompositor;
use crate::phases::mask::build_mask_for_image;
use crate::services::inpainting::Inpainter;
use crate::services::ocr::TextRecognizer;
use crate::services::translation::Translator;
use crate::utils::image_ops::{output_format_for, run_blocking};

/// The external services and the renderer an image pipeline calls into
#[derive(Clone)]
pub struct Collaborators {
    pub recognizer: Arc<dyn TextRecognizer>,
    pub translator: Arc<dyn Translator>,
    pub inpainter: Arc<dyn Inpainter>,
    pub compositor: Arc<TextCompositor>,
}

/// Where a single image currently is
enum Stage {
    Recognizing,
    NoText,
    Translating(Vec<RecognizedWord>),
    MaskBuilding(Vec<RecognizedWord>),
    Inpainting {
        words: Vec<RecognizedWord>,
        mask: Vec<u8>,
    },
    Compositing {
        words: Vec<RecognizedWord>,
        inpainted: Vec<u8>,
    },
    CleaningUp(ImageResult),
    Failed(PipelineError),
    Done(ImageResult),
}

/// Files belonging to one image
struct Job {
    input_path: PathBuf,
    file_name: String,
    output_path: PathBuf,
    temp_dir: PathBuf,
    source: Arc<[u8]>,
    temp_artifacts: Vec<PathBuf>,
    output_started: bool,
}

impl Job {
    fn new(input_path: &Path, config: &Config) -> Self {
        let file_name = input_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            input_path: input_path.to_path_buf(),
            output_path: config.output_dir().join(&file_name),
            temp_dir: config.temp_dir().to_path_buf(),
            file_name,
            source: Arc::from(Vec::new()),
            temp_artifacts: Vec::new(),
            output_started: false,
        }
    }

    fn mask_path(&self) -> PathBuf {
        self.temp_dir.join(format!("mask_{}.png", self.file_name))
    }

    fn inpainted_path(&self) -> PathBuf {
        self.temp_dir.join(format!("inpainted_{}", self.file_name))
    }

    async fn write_temp(&mut self, path: PathBuf, bytes: &[u8]) -> PipelineResult<()> {
        self.temp_artifacts.push(path.clone());
        tokio::fs::write(&path, bytes).await.with_path(path)
    }

    async fn write_output(&mut self, bytes: &[u8]) -> PipelineResult<()> {
        self.output_started = true;
        tokio::fs::write(&self.output_path, bytes)
            .await
            .with_path(&self.output_path)
    }

    /// Best effort: a file that cannot be removed is only logged
    async fn remove_temp_artifacts(&mut self) {
        for path in self.temp_artifacts.drain(..) {
            remove_quietly(&path).await;
        }
    }

    async fn remove_partial_output(&mut self) {
        if self.output_started {
            remove_quietly(&self.output_path).await;
            self.output_started = false;
        }
    }
}

async fn remove_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}

/// Runs the per-image workflow
pub struct ImagePipeline {
    config: Arc<Config>,
    collaborators: Collaborators,
}

impl ImagePipeline {
    pub fn new(config: Arc<Config>, collaborators: Collaborators) -> Self {
        Self { config, collaborators }
    }

    /// Process one image. Always returns a result; failures are reported in it.
    #[instrument(skip(self, input_path), fields(file = %input_path.display()))]
    pub async fn process(&self, input_path: &Path) -> ImageResult {
        let start = Instant::now();
        let mut job = Job::new(input_path, &self.config);
        let mut stage = Stage::Recognizing;

        info!("Processing {}", job.file_name);

        loop {
            stage = match stage {
                Stage::Recognizing => match self.recognize(&mut job).await {
                    Ok(words) if words.is_empty() => Stage::NoText,
                    Ok(words) => {
                        info!("{}: {} text regions", job.file_name, words.len());
                        Stage::Translating(words)
                    }
                    Err(e) => Stage::Failed(e),
                },

                Stage::NoText => {
                    info!("{}: no text found, copying source", job.file_name);
                    let source = Arc::clone(&job.source);
                    match job.write_output(&source).await {
                        Ok(()) => Stage::Done(ImageResult::no_text(job.output_path.clone())),
                        Err(e) => Stage::Failed(e),
                    }
                }

                Stage::Translating(words) => Stage::MaskBuilding(self.translate_all(words).await),

                Stage::MaskBuilding(words) => match self.build_mask(&mut job, &words).await {
                    Ok(mask) => Stage::Inpainting { words, mask },
                    Err(e) => Stage::Failed(e),
                },

                Stage::Inpainting { words, mask } => match self.inpaint(&mut job, &mask).await {
                    Ok(inpainted) => Stage::Compositing { words, inpainted },
                    Err(e) => Stage::Failed(e),
                },

                Stage::Compositing { words, inpainted } => match self.composite(&mut job, &words, inpainted).await {
                    Ok(()) => Stage::CleaningUp(ImageResult::localized(job.output_path.clone(), words)),
                    Err(e) => Stage::Failed(e),
                },

                Stage::CleaningUp(result) => {
                    job.remove_temp_artifacts().await;
                    Stage::Done(result)
                }

                Stage::Failed(e) => {
                    error!("{} failed: {}", job.file_name, e);
                    job.remove_temp_artifacts().await;
                    job.remove_partial_output().await;
                    Stage::Done(ImageResult::failed(job.input_path.clone(), e.to_string()))
                }

                Stage::Done(result) => {
                    debug!(
                        "{} finished in {:.2}ms (success: {})",
                        job.file_name,
                        start.elapsed().as_secs_f64() * 1000.0,
                        result.success
                    );
                    return result;
                }
            };
        }
    }

    async fn recognize(&self, job: &mut Job) -> PipelineResult<Vec<RecognizedWord>> {
        let bytes = tokio::fs::read(&job.input_path).await.with_path(&job.input_path)?;
        job.source = Arc::from(bytes);
        Ok(self.collaborators.recognizer.recognize(&job.source).await?)
    }

    /// Translate every word with at most `translation_concurrency` calls in
    /// flight. Results land by index, so detection order survives any
    /// completion order.
    async fn translate_all(&self, mut words: Vec<RecognizedWord>) -> Vec<RecognizedWord> {
        let translator = &self.collaborators.translator;
        let source_language = self.config.source_language();
        let target_language = self.config.target_language();

        let mut translations: Vec<Option<String>> = vec![None; words.len()];
        {
            let mut pending = stream::iter(words.iter().enumerate().map(|(index, word)| async move {
                let translated = translator.translate(&word.text, source_language, target_language).await;
                (index, translated)
            }))
            .buffer_unordered(self.config.translation_concurrency());

            while let Some((index, translated)) = pending.next().await {
                translations[index] = Some(translated);
            }
        }

        for (word, translated) in words.iter_mut().zip(translations) {
            debug!("{}: \"{}\" -> {:?}", word.id, word.text, translated);
            word.translated_text = translated;
        }
        words
    }

    async fn build_mask(&self, job: &mut Job, words: &[RecognizedWord]) -> PipelineResult<Vec<u8>> {
        let source = Arc::clone(&job.source);
        let regions = words.to_vec();
        let padding = self.config.mask_padding();

        let mask = run_blocking(move || build_mask_for_image(&source, &regions, padding)).await?;
        let mask_path = job.mask_path();
        job.write_temp(mask_path, &mask).await?;
        Ok(mask)
    }

    async fn inpaint(&self, job: &mut Job, mask: &[u8]) -> PipelineResult<Vec<u8>> {
        let inpainted = self.collaborators.inpainter.inpaint(&job.source, mask).await?;
        let inpainted_path = job.inpainted_path();
        job.write_temp(inpainted_path, &inpainted).await?;
        Ok(inpainted)
    }

    async fn composite(&self, job: &mut Job, words: &[RecognizedWord], inpainted: Vec<u8>) -> PipelineResult<()> {
        let format = output_format_for(&job.output_path);
        let rendered = Arc::clone(&self.collaborators.compositor)
            .composite_async(inpainted, words.to_vec(), format)
            .await?;
        job.write_output(&rendered).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{BoundingBox, NO_TEXT_MESSAGE};
    use crate::orchestration::test_support::*;
    use std::collections::HashMap;

    #[test]
    fn test_temp_names_keep_the_extension() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), 2);
        let png_job = Job::new(&dir.path().join("input/page.png"), &config);
        let jpg_job = Job::new(&dir.path().join("input/page.jpg"), &config);

        assert_eq!(png_job.mask_path(), config.temp_dir().join("mask_page.png.png"));
        assert_ne!(png_job.mask_path(), jpg_job.mask_path());
        assert_ne!(png_job.inpainted_path(), jpg_job.inpainted_path());
    }

    #[tokio::test]
    async fn test_no_text_copies_source_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let source = png(40, 30);
        let input = seed_input(dir.path(), &[("blank.png", source.clone())]);
        let config = test_config(dir.path(), 2);

        let inpainter = Arc::new(FakeInpainter::default());
        let pipeline = ImagePipeline::new(
            config.clone(),
            collaborators(
                Arc::new(FakeRecognizer::default()),
                Arc::new(FakeTranslator::default()),
                inpainter.clone(),
            ),
        );

        let result = pipeline.process(&input.join("blank.png")).await;

        assert!(result.success);
        assert_eq!(result.message.as_deref(), Some(NO_TEXT_MESSAGE));
        assert!(result.words.is_none());
        let output = std::fs::read(config.output_dir().join("blank.png")).unwrap();
        assert_eq!(output, source);
        assert!(inpainter.masks.lock().is_empty());
    }

    #[tokio::test]
    async fn test_translation_keeps_detection_order() {
        let dir = tempfile::tempdir().unwrap();
        let input = seed_input(dir.path(), &[("page.png", png(120, 100))]);
        let config = test_config(dir.path(), 1);

        let words: Vec<RecognizedWord> = ["a", "bb", "ccc", "dddd", "eeeee"]
            .iter()
            .enumerate()
            .map(|(i, text)| word(i, text, BoundingBox::new(0, i as i32 * 20, 100, i as i32 * 20 + 15)))
            .collect();
        let recognizer = FakeRecognizer::with_words(HashMap::from([(120, words)]));
        let translator = FakeTranslator::new(&[("a", "A"), ("bb", "B"), ("ccc", "C"), ("dddd", "D"), ("eeeee", "E")]);

        let pipeline = ImagePipeline::new(
            config,
            collaborators(Arc::new(recognizer), Arc::new(translator), Arc::new(FakeInpainter::default())),
        );
        let result = pipeline.process(&input.join("page.png")).await;

        let words = result.words.unwrap();
        let ids: Vec<&str> = words.iter().map(|w| w.id.as_str()).collect();
        let translated: Vec<&str> = words.iter().map(|w| w.display_text()).collect();
        assert_eq!(ids, ["text_0", "text_1", "text_2", "text_3", "text_4"]);
        assert_eq!(translated, ["A", "B", "C", "D", "E"]);
    }

    #[tokio::test]
    async fn test_temp_artifacts_are_removed_after_success() {
        let dir = tempfile::tempdir().unwrap();
        let input = seed_input(dir.path(), &[("scan.jpg", png(64, 64))]);
        let config = test_config(dir.path(), 1);

        let recognizer = FakeRecognizer::with_words(HashMap::from([(
            64,
            vec![word(0, "HI", BoundingBox::new(10, 10, 50, 30))],
        )]));
        let pipeline = ImagePipeline::new(
            config.clone(),
            collaborators(
                Arc::new(recognizer),
                Arc::new(FakeTranslator::default()),
                Arc::new(FakeInpainter::default()),
            ),
        );

        let result = pipeline.process(&input.join("scan.jpg")).await;

        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.image_url.as_deref(), Some("scan.jpg"));
        assert!(dir_is_empty(config.temp_dir()));

        // Output is encoded by its extension, whatever the source format was
        let output = std::fs::read(config.output_dir().join("scan.jpg")).unwrap();
        assert_eq!(image::guess_format(&output).unwrap(), image::ImageFormat::Jpeg);
    }

    #[tokio::test]
    async fn test_failure_cleans_up_and_reports_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = seed_input(dir.path(), &[("bad.png", png(13, 13))]);
        let config = test_config(dir.path(), 1);

        let recognizer = FakeRecognizer::with_words(HashMap::from([(
            13,
            vec![word(0, "X", BoundingBox::new(1, 1, 10, 10))],
        )]));
        let inpainter = FakeInpainter {
            fail_width: Some(13),
            ..FakeInpainter::default()
        };
        let pipeline = ImagePipeline::new(
            config.clone(),
            collaborators(Arc::new(recognizer), Arc::new(FakeTranslator::default()), Arc::new(inpainter)),
        );

        let result = pipeline.process(&input.join("bad.png")).await;

        assert!(!result.success);
        assert_eq!(result.image_path.as_deref(), Some(input.join("bad.png").as_path()));
        assert!(result.error.unwrap().contains("model refused"));
        assert!(result.result_path.is_none());
        assert!(dir_is_empty(config.temp_dir()));
        assert!(dir_is_empty(config.output_dir()));
    }

    #[tokio::test]
    async fn test_unreadable_input_fails() {
        let dir = tempfile::tempdir().unwrap();
        seed_input(dir.path(), &[]);
        let config = test_config(dir.path(), 1);
        let pipeline = ImagePipeline::new(
            config,
            collaborators(
                Arc::new(FakeRecognizer::default()),
                Arc::new(FakeTranslator::default()),
                Arc::new(FakeInpainter::default()),
            ),
        );

        let result = pipeline.process(&dir.path().join("input").join("missing.png")).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("missing.png"));
    }
}
