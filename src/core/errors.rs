// Error types for the localization workflow
//
// One thiserror enum per concern. Collaborator errors are folded into
// PipelineError at the per-image boundary; only BatchError reaches the caller
// of a batch run.

use std::path::PathBuf;
use thiserror::Error;

/// OCR collaborator errors
#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("OCR API key is not configured (set GOOGLE_VISION_API_KEY)")]
    MissingApiKey,

    #[error("OCR request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("OCR API returned {status}: {body}")]
    ApiError { status: u16, body: String },

    #[error("Invalid OCR response: {0}")]
    InvalidResponse(String),
}

/// Translation provider errors
///
/// These never escape the translator: the fallback chain turns them into a
/// secondary attempt or a sentinel string.
#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("{provider} API key is not configured")]
    MissingApiKey { provider: &'static str },

    #[error("Translation request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("{provider} returned {status}: {body}")]
    ApiError {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Circuit breaker is open for {0}")]
    CircuitOpen(&'static str),
}

/// Inpainting collaborator errors
#[derive(Debug, Error)]
pub enum InpaintingError {
    #[error("Inpainting API key is not configured (set REPLICATE_API_KEY)")]
    MissingApiKey,

    #[error("Inpainting request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Inpainting API returned {status}: {body}")]
    ApiError { status: u16, body: String },

    #[error("Prediction {id} ended with status '{status}': {detail}")]
    PredictionFailed {
        id: String,
        status: String,
        detail: String,
    },

    #[error("Invalid inpainting response: {0}")]
    InvalidResponse(String),
}

/// Mask building and compositing errors
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Image processing failed: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Invalid canvas dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("No usable font for family '{family}'")]
    FontNotFound { family: String },

    #[error("Text could not be measured: {0}")]
    MeasureFailed(String),

    #[error("Render task join failed: {0}")]
    TaskJoinFailed(String),
}

/// Per-image pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Text recognition failed: {0}")]
    Recognition(#[from] RecognitionError),

    #[error("Inpainting failed: {0}")]
    Inpainting(#[from] InpaintingError),

    #[error("Rendering failed: {0}")]
    Render(#[from] RenderError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Batch-level errors, the only ones allowed to abort a run
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Failed to read input directory {path}: {source}")]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory {path}: {source}")]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize summary: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to write summary to {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be > 0, got {value}")]
    NotPositive { name: &'static str, value: usize },

    #[error("Invalid value for {name}: '{value}'")]
    InvalidValue { name: &'static str, value: String },

    #[error("Target language must not be empty")]
    EmptyTargetLanguage,
}

pub type RecognitionResult<T> = Result<T, RecognitionError>;
pub type TranslationResult<T> = Result<T, TranslationError>;
pub type InpaintingResult<T> = Result<T, InpaintingError>;
pub type RenderResult<T> = Result<T, RenderError>;
pub type PipelineResult<T> = Result<T, PipelineError>;
pub type BatchResult<T> = Result<T, BatchError>;
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Attach a path to an io::Error on its way into PipelineError
pub trait IoContext<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> PipelineResult<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> PipelineResult<T> {
        self.map_err(|source| PipelineError::Io {
            path: path.into(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_context_keeps_path() {
        let err: PipelineResult<()> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone")).with_path("a/b.png");
        let message = err.unwrap_err().to_string();
        assert!(message.contains("a/b.png"));
        assert!(message.contains("gone"));
    }

    #[test]
    fn test_render_error_wraps_into_pipeline_error() {
        let err: PipelineError = RenderError::InvalidDimensions { width: 0, height: 4 }.into();
        assert_eq!(err.to_string(), "Rendering failed: Invalid canvas dimensions: 0x4");
    }
}
