use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::core::config::Config;
use crate::core::errors::{TranslationError, TranslationResult};
use crate::services::build_http_client;
use crate::services::translation::{TranslationProvider, AUTO_DETECT};

const PROVIDER: &str = "Google Translate";

pub const GOOGLE_TRANSLATE_URL: &str = "https://translation.googleapis.com/language/translate/v2";

/// Google Cloud Translation v2. Authenticates with the same API key as
/// Cloud Vision.
pub struct GoogleTranslateClient {
    http_client: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
}

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<&'a str>,
    target: &'a str,
    format: &'static str,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    data: TranslateData,
}

#[derive(Debug, Deserialize)]
struct TranslateData {
    #[serde(default)]
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Translation {
    translated_text: String,
}

impl GoogleTranslateClient {
    pub fn new(config: &Config) -> TranslationResult<Self> {
        Ok(Self {
            http_client: build_http_client(config.api_timeout())?,
            api_key: config.api.google_vision_api_key.clone(),
            endpoint: GOOGLE_TRANSLATE_URL.to_string(),
        })
    }
}

fn request_body<'a>(text: &'a str, source_language: &'a str, target_language: &'a str) -> TranslateRequest<'a> {
    TranslateRequest {
        q: text,
        source: (!source_language.eq_ignore_ascii_case(AUTO_DETECT)).then_some(source_language),
        target: target_language,
        format: "text",
    }
}

fn first_translation(response: TranslateResponse) -> TranslationResult<String> {
    response
        .data
        .translations
        .into_iter()
        .next()
        .map(|t| t.translated_text)
        .ok_or_else(|| TranslationError::InvalidResponse("Google Translate returned no translations".to_string()))
}

#[async_trait]
impl TranslationProvider for GoogleTranslateClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    #[instrument(skip(self, text), fields(chars = text.len()))]
    async fn translate(&self, text: &str, source_language: &str, target_language: &str) -> TranslationResult<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(TranslationError::MissingApiKey { provider: PROVIDER })?;

        let response = self
            .http_client
            .post(&self.endpoint)
            .query(&[("key", api_key)])
            .json(&request_body(text, source_language, target_language))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TranslationError::ApiError {
                provider: PROVIDER,
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TranslateResponse = response
            .json()
            .await
            .map_err(|e| TranslationError::InvalidResponse(e.to_string()))?;

        let translated = first_translation(parsed)?;
        debug!("Google: \"{}\" -> \"{}\"", text, translated);
        Ok(translated)
    }
}
