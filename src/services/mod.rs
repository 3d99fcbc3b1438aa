pub mod inpainting;
pub mod ocr;
pub mod rendering;
pub mod translation;

use std::time::Duration;

// Re-export commonly used services
pub use inpainting::{Inpainter, ReplicateClient};
pub use ocr::{GoogleVisionClient, TextRecognizer};
pub use rendering::CosmicTextRenderer;
pub use translation::{
    DeepLClient, FallbackTranslator, GoogleTranslateClient, TranslationProvider, Translator,
};

/// HTTP client shared by the collaborator clients: request timeout from
/// config, pooled connections
pub(crate) fn build_http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .connect_timeout(Duration::from_secs(10))
        .build()
}
