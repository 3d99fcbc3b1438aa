// Library exports for the image localization workflow

pub mod core;
pub mod middleware;
pub mod orchestration;
pub mod phases;
pub mod services;
pub mod utils;

// Re-export commonly used types and functions
pub use core::{
    config::Config,
    errors::{
        BatchError, ConfigError, InpaintingError, PipelineError, RecognitionError, RenderError,
        TranslationError,
    },
    types::{BatchSummary, BoundingBox, ImageResult, RecognizedWord, TextAlign, TextStyle},
};

pub use middleware::{CircuitBreaker, CircuitBreakerConfig, CircuitState};

pub use orchestration::{BatchOrchestrator, Collaborators, ImagePipeline};

pub use phases::{build_mask, TextCompositor};

pub use services::{
    CosmicTextRenderer, FallbackTranslator, Inpainter, TextRecognizer, TranslationProvider,
    Translator,
};
