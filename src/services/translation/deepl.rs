use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::core::config::Config;
use crate::core::errors::{TranslationError, TranslationResult};
use crate::services::build_http_client;
use crate::services::translation::{TranslationProvider, AUTO_DETECT};

const PROVIDER: &str = "DeepL";

/// DeepL v2 translate endpoint (form-encoded)
pub struct DeepLClient {
    http_client: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct DeepLResponse {
    #[serde(default)]
    translations: Vec<DeepLTranslation>,
}

#[derive(Debug, Deserialize)]
struct DeepLTranslation {
    text: String,
}

impl DeepLClient {
    pub fn new(config: &Config) -> TranslationResult<Self> {
        Ok(Self {
            http_client: build_http_client(config.api_timeout())?,
            api_key: config.api.deepl_api_key.clone(),
            endpoint: config.api.deepl_api_url.clone(),
        })
    }
}

/// Form fields for one request. DeepL wants upper-case language codes and
/// detects the source itself when `source_lang` is absent.
fn form_params(text: &str, source_language: &str, target_language: &str) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("text", text.to_string()),
        ("target_lang", target_language.to_uppercase()),
    ];
    if !source_language.eq_ignore_ascii_case(AUTO_DETECT) {
        params.push(("source_lang", source_language.to_uppercase()));
    }
    params
}

fn first_translation(response: DeepLResponse) -> TranslationResult<String> {
    response
        .translations
        .into_iter()
        .next()
        .map(|t| t.text)
        .ok_or_else(|| TranslationError::InvalidResponse("DeepL returned no translations".to_string()))
}

#[async_trait]
impl TranslationProvider for DeepLClient {
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
            .header("Authorization", format!("DeepL-Auth-Key {api_key}"))
            .form(&form_params(text, source_language, target_language))
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

        let parsed: DeepLResponse = response
            .json()
            .await
            .map_err(|e| TranslationError::InvalidResponse(e.to_string()))?;

        let translated = first_translation(parsed)?;
        debug!("DeepL: \"{}\" -> \"{}\"", text, translated);
        Ok(translated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_params_auto_source() {
        let params = form_params("HELLO", "auto", "ko");
        assert_eq!(
            params,
            vec![("text", "HELLO".to_string()), ("target_lang", "KO".to_string())]
        );
    }

    #[test]
    fn test_form_params_explicit_source() {
        let params = form_params("HELLO", "en", "ja");
        assert!(params.contains(&("source_lang", "EN".to_string())));
        assert!(params.contains(&("target_lang", "JA".to_string())));
    }

    #[test]
    fn test_first_translation() {
        let parsed: DeepLResponse =
            serde_json::from_str(r#"{"translations":[{"detected_source_language":"EN","text":"안녕"}]}"#).unwrap();
        assert_eq!(first_translation(parsed).unwrap(), "안녕");

        let empty: DeepLResponse = serde_json::from_str(r#"{"translations":[]}"#).unwrap();
        assert!(matches!(first_translation(empty), Err(TranslationError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_missing_key() {
        let config = Config::from_lookup(|_| None).unwrap();
        let client = DeepLClient::new(&config).unwrap();
        assert!(matches!(
            client.translate("HELLO", "auto", "ko").await,
            Err(TranslationError::MissingApiKey { provider: "DeepL" })
        ));
    }
}
