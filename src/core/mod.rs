pub mod config;
pub mod errors;
pub mod types;

// Re-export commonly used items for convenience
pub use config::Config;
pub use errors::{
    BatchError, ConfigError, InpaintingError, PipelineError, RecognitionError, RenderError,
    TranslationError,
};
pub use types::{
    BatchSummary, BoundingBox, FontStyle, ImageResult, RecognizedWord, TextAlign, TextStyle,
};
