// Generative inpainting through the Replicate predictions API

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use crate::core::config::Config;
use crate::core::errors::{InpaintingError, InpaintingResult};
use crate::services::build_http_client;

pub const REPLICATE_PREDICTIONS_URL: &str = "https://api.replicate.com/v1/predictions";

const PROMPT: &str = "Restore this image naturally without any text";
const NEGATIVE_PROMPT: &str = "text, letters, watermarks, low quality, blurry";
const GUIDANCE_SCALE: f32 = 7.5;
const INFERENCE_STEPS: u32 = 25;

const POLL_INTERVAL: Duration = Duration::from_secs(1);
const MAX_POLLS: u32 = 600;

/// Regenerates the white areas of a mask
#[async_trait]
pub trait Inpainter: Send + Sync {
    /// `image` and `mask` are encoded images of the same size; returns the
    /// encoded result.
    async fn inpaint(&self, image: &[u8], mask: &[u8]) -> InpaintingResult<Vec<u8>>;
}

pub struct ReplicateClient {
    http_client: reqwest::Client,
    api_key: Option<String>,
    model_version: String,
    endpoint: String,
}

#[derive(Debug, Serialize)]
struct PredictionRequest<'a> {
    version: &'a str,
    input: InpaintInput,
}

#[derive(Debug, Serialize)]
struct InpaintInput {
    image: String,
    mask: String,
    prompt: &'static str,
    negative_prompt: &'static str,
    num_outputs: u32,
    guidance_scale: f32,
    num_inference_steps: u32,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    id: String,
    status: PredictionStatus,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    urls: Option<PredictionUrls>,
}

#[derive(Debug, Deserialize)]
struct PredictionUrls {
    get: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
}

impl PredictionStatus {
    fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Processing => "processing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }
}

impl ReplicateClient {
    pub fn new(config: &Config) -> InpaintingResult<Self> {
        Ok(Self {
            http_client: build_http_client(config.api_timeout())?,
            api_key: config.api.replicate_api_key.clone(),
            model_version: config.api.replicate_model_version.clone(),
            endpoint: REPLICATE_PREDICTIONS_URL.to_string(),
        })
    }

    async fn create_prediction(&self, api_key: &str, image: &[u8], mask: &[u8]) -> InpaintingResult<Prediction> {
        let request = PredictionRequest {
            version: &self.model_version,
            input: inpaint_input(image, mask),
        };

        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .header("Prefer", "wait")
            .json(&request)
            .send()
            .await?;

        parse_json(response).await
    }

    async fn wait_for(&self, api_key: &str, mut prediction: Prediction) -> InpaintingResult<Prediction> {
        let start = Instant::now();
        let mut polls = 0;

        while !prediction.status.is_terminal() {
            if polls >= MAX_POLLS {
                return Err(InpaintingError::PredictionFailed {
                    id: prediction.id,
                    status: prediction.status.as_str().to_string(),
                    detail: format!("still running after {:?}", start.elapsed()),
                });
            }
            let Some(poll_url) = prediction.urls.as_ref().map(|u| u.get.clone()) else {
                return Err(InpaintingError::InvalidResponse(format!(
                    "prediction {} has no poll URL",
                    prediction.id
                )));
            };

            tokio::time::sleep(POLL_INTERVAL).await;
            polls += 1;

            let response = self.http_client.get(&poll_url).bearer_auth(api_key).send().await?;
            prediction = parse_json(response).await?;
            debug!("Prediction {} is {}", prediction.id, prediction.status.as_str());
        }

        Ok(prediction)
    }

    async fn download(&self, url: &str) -> InpaintingResult<Vec<u8>> {
        let response = self.http_client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InpaintingError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl Inpainter for ReplicateClient {
    #[instrument(skip(self, image, mask), fields(image_size = image.len()))]
    async fn inpaint(&self, image: &[u8], mask: &[u8]) -> InpaintingResult<Vec<u8>> {
        let api_key = self.api_key.as_deref().ok_or(InpaintingError::MissingApiKey)?;
        let start = Instant::now();

        let prediction = self.create_prediction(api_key, image, mask).await?;
        let prediction = self.wait_for(api_key, prediction).await?;

        if prediction.status != PredictionStatus::Succeeded {
            let detail = prediction
                .error
                .as_ref()
                .map(describe_error)
                .unwrap_or_else(|| "no error detail".to_string());
            warn!("Prediction {} {}: {}", prediction.id, prediction.status.as_str(), detail);
            return Err(InpaintingError::PredictionFailed {
                id: prediction.id,
                status: prediction.status.as_str().to_string(),
                detail,
            });
        }

        let url = prediction
            .output
            .as_ref()
            .and_then(first_output_url)
            .ok_or_else(|| InpaintingError::InvalidResponse(format!("prediction {} has no output", prediction.id)))?;

        let bytes = self.download(&url).await?;
        info!("Inpainting finished in {:.1}s", start.elapsed().as_secs_f64());
        Ok(bytes)
    }
}

async fn parse_json(response: reqwest::Response) -> InpaintingResult<Prediction> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(InpaintingError::ApiError {
            status: status.as_u16(),
            body,
        });
    }
    response
        .json()
        .await
        .map_err(|e| InpaintingError::InvalidResponse(e.to_string()))
}

fn inpaint_input(image: &[u8], mask: &[u8]) -> InpaintInput {
    InpaintInput {
        image: data_uri(image),
        mask: data_uri(mask),
        prompt: PROMPT,
        negative_prompt: NEGATIVE_PROMPT,
        num_outputs: 1,
        guidance_scale: GUIDANCE_SCALE,
        num_inference_steps: INFERENCE_STEPS,
    }
}

fn data_uri(bytes: &[u8]) -> String {
    let mime = image::guess_format(bytes)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream");
    format!("data:{};base64,{}", mime, general_purpose::STANDARD.encode(bytes))
}

/// Models return either a list of URLs or a single URL
fn first_output_url(output: &Value) -> Option<String> {
    match output {
        Value::String(url) => Some(url.clone()),
        Value::Array(items) => items.first().and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

fn describe_error(error: &Value) -> String {
    match error {
        Value::String(message) => message.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, RgbaImage};

    #[test]
    fn test_first_output_url() {
        let list = serde_json::json!(["https://replicate.delivery/a.png", "https://replicate.delivery/b.png"]);
        assert_eq!(first_output_url(&list).as_deref(), Some("https://replicate.delivery/a.png"));
        assert_eq!(
            first_output_url(&serde_json::json!("https://x/y.png")).as_deref(),
            Some("https://x/y.png")
        );
        assert_eq!(first_output_url(&serde_json::json!([])), None);
        assert_eq!(first_output_url(&Value::Null), None);
    }

    #[test]
    fn test_data_uri_carries_mime_type() {
        let mut png = Vec::new();
        DynamicImage::ImageRgba8(RgbaImage::new(2, 2))
            .write_to(&mut std::io::Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();
        assert!(data_uri(&png).starts_with("data:image/png;base64,"));
        assert!(data_uri(b"??").starts_with("data:application/octet-stream;base64,"));
    }

    #[test]
    fn test_request_shape() {
        let request = PredictionRequest {
            version: "abc",
            input: inpaint_input(b"img", b"msk"),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["version"], "abc");
        assert_eq!(json["input"]["prompt"], PROMPT);
        assert_eq!(json["input"]["negative_prompt"], NEGATIVE_PROMPT);
        assert_eq!(json["input"]["num_outputs"], 1);
        assert_eq!(json["input"]["guidance_scale"], 7.5);
        assert_eq!(json["input"]["num_inference_steps"], 25);
    }

    #[test]
    fn test_prediction_parsing() {
        let prediction: Prediction = serde_json::from_str(
            r#"{"id":"p1","status":"processing","output":null,"error":null,
                "urls":{"get":"https://api.replicate.com/v1/predictions/p1","cancel":"..."}}"#,
        )
        .unwrap();
        assert_eq!(prediction.status, PredictionStatus::Processing);
        assert!(!prediction.status.is_terminal());
        assert_eq!(prediction.urls.unwrap().get, "https://api.replicate.com/v1/predictions/p1");

        let failed: Prediction =
            serde_json::from_str(r#"{"id":"p2","status":"failed","error":"CUDA out of memory"}"#).unwrap();
        assert!(failed.status.is_terminal());
        assert_eq!(describe_error(failed.error.as_ref().unwrap()), "CUDA out of memory");
    }

    #[tokio::test]
    async fn test_missing_key() {
        let config = Config::from_lookup(|_| None).unwrap();
        let client = ReplicateClient::new(&config).unwrap();
        assert!(matches!(
            client.inpaint(b"a", b"b").await,
            Err(InpaintingError::MissingApiKey)
        ));
    }
}
