// Main entry point: run one localization batch over the input folder

use image_localizer::{
    core::Config,
    orchestration::{BatchOrchestrator, Collaborators},
    phases::TextCompositor,
    services::{
        CosmicTextRenderer, DeepLClient, FallbackTranslator, GoogleTranslateClient,
        GoogleVisionClient, ReplicateClient,
    },
};

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Arc::new(Config::new().context("Failed to load configuration")?);

    let filter = EnvFilter::new(format!(
        "image_localizer={}",
        match config.log_level() {
            tracing::Level::TRACE => "trace",
            tracing::Level::DEBUG => "debug",
            tracing::Level::INFO => "info",
            tracing::Level::WARN => "warn",
            tracing::Level::ERROR => "error",
        }
    ));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("=== IMAGE LOCALIZER ===");
    info!("Input folder: {}", config.input_dir().display());
    info!("Output folder: {}", config.output_dir().display());
    info!("Target language: {}", config.target_language());
    info!("Max concurrent: {}", config.max_concurrent());

    if config.api.google_vision_api_key.is_none() {
        warn!("GOOGLE_VISION_API_KEY is not set; text recognition will fail");
    }
    if config.api.replicate_api_key.is_none() {
        warn!("REPLICATE_API_KEY is not set; inpainting will fail");
    }

    let translator = FallbackTranslator::new(
        Arc::new(DeepLClient::new(&config).context("Failed to build DeepL client")?),
        Arc::new(GoogleTranslateClient::new(&config).context("Failed to build Google Translate client")?),
    );

    let renderer = {
        let font_dir = config.font_dir().map(|p| p.to_path_buf());
        tokio::task::spawn_blocking(move || CosmicTextRenderer::new(font_dir.as_deref()))
            .await
            .context("Font loading task failed")?
    };

    let collaborators = Collaborators {
        recognizer: Arc::new(GoogleVisionClient::new(&config).context("Failed to build Vision client")?),
        translator: Arc::new(translator),
        inpainter: Arc::new(ReplicateClient::new(&config).context("Failed to build Replicate client")?),
        compositor: Arc::new(TextCompositor::new(Arc::new(renderer))),
    };

    let orchestrator = BatchOrchestrator::new(Arc::clone(&config), collaborators);
    orchestrator.run_batch(config.input_dir()).await?;

    Ok(())
}
