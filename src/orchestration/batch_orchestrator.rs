// Batch Orchestrator: discovers images and runs them through the pipeline
// in fixed-size concurrency windows

use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::core::config::Config;
use crate::core::errors::{BatchError, BatchResult};
use crate::core::types::BatchSummary;
use crate::orchestration::image_pipeline::{Collaborators, ImagePipeline};

/// Extensions picked up from the input folder, compared case-insensitively
pub const SUPPORTED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "webp", "bmp"];

/// Summary file written to the output folder after each run
pub const SUMMARY_FILE_NAME: &str = "processing_results.json";

/// Main batch orchestrator
pub struct BatchOrchestrator {
    config: Arc<Config>,
    pipeline: ImagePipeline,
}

impl BatchOrchestrator {
    pub fn new(config: Arc<Config>, collaborators: Collaborators) -> Self {
        let pipeline = ImagePipeline::new(Arc::clone(&config), collaborators);
        Self { config, pipeline }
    }

    /// Process every supported image in `input_dir`
    ///
    /// # Workflow:
    /// 1. Create the output and temp folders
    /// 2. Discover images, sorted by path
    /// 3. Split them into windows of `MAX_CONCURRENT`; run each window
    ///    concurrently and wait for all of it before starting the next
    /// 4. Persist the summary and log the tally
    ///
    /// Only folder and summary I/O fail the run. Image failures are recorded
    /// in the summary.
    #[instrument(skip(self, input_dir), fields(input = %input_dir.display()))]
    pub async fn run_batch(&self, input_dir: &Path) -> BatchResult<BatchSummary> {
        let start_time = Instant::now();

        create_dir(self.config.output_dir()).await?;
        create_dir(self.config.temp_dir()).await?;

        let images = discover_images(input_dir).await?;
        if images.is_empty() {
            warn!("No images found in {}", input_dir.display());
            return Ok(BatchSummary::default());
        }

        let window_size = self.config.max_concurrent();
        let window_count = images.len().div_ceil(window_size);
        info!(
            "Found {} images, processing in {} windows of up to {}",
            images.len(),
            window_count,
            window_size
        );

        let mut summary = BatchSummary::with_total(images.len());

        for (index, window) in images.chunks(window_size).enumerate() {
            info!("Window {}/{} ({} images)", index + 1, window_count, window.len());

            let results = join_all(window.iter().map(|path| self.pipeline.process(path))).await;
            for result in results {
                summary.record(result);
            }
        }

        summary.processing_time_ms = start_time.elapsed().as_secs_f64() * 1000.0;

        self.persist(&summary).await?;
        self.log_tally(&summary);

        Ok(summary)
    }

    async fn persist(&self, summary: &BatchSummary) -> BatchResult<()> {
        let path = self.config.output_dir().join(SUMMARY_FILE_NAME);
        let json = serde_json::to_string_pretty(summary)?;

        tokio::fs::write(&path, json)
            .await
            .map_err(|source| BatchError::Persist {
                path: path.clone(),
                source,
            })?;

        debug!("Summary written to {}", path.display());
        Ok(())
    }

    fn log_tally(&self, summary: &BatchSummary) {
        info!("=== Batch complete in {:.2}s ===", summary.processing_time_ms / 1000.0);
        info!("Total images: {}", summary.total);
        info!("Successful: {}", summary.successful);
        info!("Failed: {}", summary.failed);
        info!("Processed images location: {}", self.config.output_dir().display());

        for failure in summary.failures() {
            error!(
                "  {}: {}",
                failure.display_name(),
                failure.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
}

async fn create_dir(path: &Path) -> BatchResult<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|source| BatchError::DirectoryCreation {
            path: path.to_path_buf(),
            source,
        })
}

/// Regular files in `dir` with a supported extension, sorted by path
pub async fn discover_images(dir: &Path) -> BatchResult<Vec<PathBuf>> {
    let discovery_error = |source: std::io::Error| BatchError::Discovery {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(discovery_error)?;
    let mut images = Vec::new();

    while let Some(entry) = entries.next_entry().await.map_err(discovery_error)? {
        let path = entry.path();
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        if is_file && is_supported(&path) {
            images.push(path);
        }
    }

    images.sort();
    Ok(images)
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.iter().any(|s| s.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}
