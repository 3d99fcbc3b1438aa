// Text recognition through Google Cloud Vision TEXT_DETECTION

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::core::config::Config;
use crate::core::errors::{RecognitionError, RecognitionResult};
use crate::core::types::{BoundingBox, RecognizedWord, TextStyle};
use crate::services::build_http_client;

pub const GOOGLE_VISION_URL: &str = "https://vision.googleapis.com/v1/images:annotate";

/// Vision does not report a per-word confidence
const DEFAULT_CONFIDENCE: f32 = 0.9;
const MAX_RESULTS: u32 = 100;

const MIN_FONT_SIZE: f32 = 16.0;
const MAX_FONT_SIZE: f32 = 32.0;

/// Finds text regions in an encoded image
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// Regions in detection order. No text is `Ok(vec![])`, not an error.
    async fn recognize(&self, image: &[u8]) -> RecognitionResult<Vec<RecognizedWord>>;
}

pub struct GoogleVisionClient {
    http_client: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
}

#[derive(Debug, Serialize)]
struct AnnotateRequest {
    requests: Vec<AnnotateImageRequest>,
}

#[derive(Debug, Serialize)]
struct AnnotateImageRequest {
    image: ImageContent,
    features: Vec<Feature>,
}

#[derive(Debug, Serialize)]
struct ImageContent {
    content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Feature {
    #[serde(rename = "type")]
    kind: &'static str,
    max_results: u32,
}

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateImageResponse {
    #[serde(default)]
    text_annotations: Vec<EntityAnnotation>,
    error: Option<ApiStatus>,
}

#[derive(Debug, Deserialize)]
struct ApiStatus {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntityAnnotation {
    #[serde(default)]
    description: String,
    #[serde(default)]
    bounding_poly: BoundingPoly,
}

#[derive(Debug, Default, Deserialize)]
struct BoundingPoly {
    #[serde(default)]
    vertices: Vec<Vertex>,
}

/// Vision omits a coordinate when it is zero
#[derive(Debug, Deserialize)]
struct Vertex {
    #[serde(default)]
    x: i32,
    #[serde(default)]
    y: i32,
}

impl GoogleVisionClient {
    pub fn new(config: &Config) -> RecognitionResult<Self> {
        Ok(Self {
            http_client: build_http_client(config.api_timeout())?,
            api_key: config.api.google_vision_api_key.clone(),
            endpoint: GOOGLE_VISION_URL.to_string(),
        })
    }
}

#[async_trait]
impl TextRecognizer for GoogleVisionClient {
    #[instrument(skip(self, image), fields(image_size = image.len()))]
    async fn recognize(&self, image: &[u8]) -> RecognitionResult<Vec<RecognizedWord>> {
        let api_key = self.api_key.as_deref().ok_or(RecognitionError::MissingApiKey)?;

        let request = AnnotateRequest {
            requests: vec![AnnotateImageRequest {
                image: ImageContent {
                    content: general_purpose::STANDARD.encode(image),
                },
                features: vec![Feature {
                    kind: "TEXT_DETECTION",
                    max_results: MAX_RESULTS,
                }],
            }],
        };

        let response = self
            .http_client
            .post(&self.endpoint)
            .query(&[("key", api_key)])
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RecognitionError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: AnnotateResponse = response
            .json()
            .await
            .map_err(|e| RecognitionError::InvalidResponse(e.to_string()))?;

        let words = words_from_response(parsed)?;
        debug!("Vision found {} text regions", words.len());
        Ok(words)
    }
}

fn words_from_response(response: AnnotateResponse) -> RecognitionResult<Vec<RecognizedWord>> {
    let Some(first) = response.responses.into_iter().next() else {
        return Ok(Vec::new());
    };

    if let Some(error) = first.error {
        return Err(RecognitionError::ApiError {
            status: u16::try_from(error.code).unwrap_or(0),
            body: error.message,
        });
    }

    // The first annotation is the whole text block
    Ok(first
        .text_annotations
        .into_iter()
        .skip(1)
        .enumerate()
        .map(|(index, annotation)| word_from_annotation(index, annotation))
        .collect())
}

fn word_from_annotation(index: usize, annotation: EntityAnnotation) -> RecognizedWord {
    let vertices = &annotation.bounding_poly.vertices;
    let xs = || vertices.iter().map(|v| v.x);
    let ys = || vertices.iter().map(|v| v.y);

    let bbox = BoundingBox::new(
        xs().min().unwrap_or(0),
        ys().min().unwrap_or(0),
        xs().max().unwrap_or(0),
        ys().max().unwrap_or(0),
    );

    let style = TextStyle {
        font_size: font_size_for_height(bbox.height()),
        ..TextStyle::default()
    };

    RecognizedWord::new(
        format!("text_{index}"),
        annotation.description,
        DEFAULT_CONFIDENCE,
        bbox,
        style,
    )
}

/// 70% of the box height, kept between 16 and 32 px
pub fn font_size_for_height(height: u32) -> f32 {
    ((height as f64 * 0.7).floor() as f32).clamp(MIN_FONT_SIZE, MAX_FONT_SIZE)
}
