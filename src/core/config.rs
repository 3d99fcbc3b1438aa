use crate::core::errors::{ConfigError, ConfigResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// Folder layout
#[derive(Debug, Clone)]
pub struct PathsConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub temp_dir: PathBuf,
}

/// Collaborator credentials and endpoints
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub google_vision_api_key: Option<String>,
    pub deepl_api_key: Option<String>,
    pub deepl_api_url: String,
    pub replicate_api_key: Option<String>,
    pub replicate_model_version: String,
    pub timeout: Duration,
}

/// Translation configuration
#[derive(Debug, Clone)]
pub struct TranslationConfig {
    pub target_language: String,
    /// Source language code, or "auto"
    pub source_language: String,
    /// Maximum in-flight translation calls per image
    pub concurrency: usize,
}

/// Batch processing configuration
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Maximum number of image pipelines in flight
    pub max_concurrent: usize,
}

/// Rendering configuration
#[derive(Debug, Clone)]
pub struct RenderingConfig {
    pub mask_padding: u32,
    /// Extra font directory loaded on top of system fonts
    pub font_dir: Option<PathBuf>,
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub paths: PathsConfig,
    pub api: ApiConfig,
    pub translation: TranslationConfig,
    pub batch: BatchConfig,
    pub rendering: RenderingConfig,
    pub log_level: Level,
}

pub const DEFAULT_DEEPL_API_URL: &str = "https://api-free.deepl.com/v2/translate";
pub const DEFAULT_REPLICATE_MODEL_VERSION: &str =
    "c8afe2ef4bb5b92cd89e807c3388cab423f9282b5802630eb1aa02b1d78e8b3a";

impl Config {
    /// Load from the process environment, reading `.env` first if present
    pub fn new() -> ConfigResult<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup and validate
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let log_level = match get("LOG_LEVEL") {
            Some(s) => match s.to_lowercase().as_str() {
                "trace" => Level::TRACE,
                "debug" => Level::DEBUG,
                "info" => Level::INFO,
                "warn" | "warning" => Level::WARN,
                "error" => Level::ERROR,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        name: "LOG_LEVEL",
                        value: s,
                    })
                }
            },
            None => Level::INFO,
        };

        let config = Self {
            paths: PathsConfig {
                input_dir: get("INPUT_FOLDER")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("./images/input")),
                output_dir: get("OUTPUT_FOLDER")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("./images/output")),
                temp_dir: get("TEMP_FOLDER")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("./images/temp")),
            },
            api: ApiConfig {
                google_vision_api_key: get("GOOGLE_VISION_API_KEY"),
                deepl_api_key: get("DEEPL_API_KEY"),
                deepl_api_url: get("DEEPL_API_URL")
                    .unwrap_or_else(|| DEFAULT_DEEPL_API_URL.to_string()),
                replicate_api_key: get("REPLICATE_API_KEY"),
                replicate_model_version: get("REPLICATE_MODEL_VERSION")
                    .unwrap_or_else(|| DEFAULT_REPLICATE_MODEL_VERSION.to_string()),
                timeout: Duration::from_secs(parse_or("API_TIMEOUT_SECONDS", get("API_TIMEOUT_SECONDS"), 120)?),
            },
            translation: TranslationConfig {
                target_language: get("TARGET_LANGUAGE").unwrap_or_else(|| "ko".to_string()),
                source_language: get("SOURCE_LANGUAGE").unwrap_or_else(|| "auto".to_string()),
                concurrency: parse_or("TRANSLATION_CONCURRENCY", get("TRANSLATION_CONCURRENCY"), 4)?,
            },
            batch: BatchConfig {
                max_concurrent: parse_or("MAX_CONCURRENT", get("MAX_CONCURRENT"), 5)?,
            },
            rendering: RenderingConfig {
                mask_padding: parse_or("MASK_PADDING", get("MASK_PADDING"), 5)?,
                font_dir: get("FONT_DIR").map(PathBuf::from),
            },
            log_level,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.batch.max_concurrent == 0 {
            return Err(ConfigError::NotPositive {
                name: "MAX_CONCURRENT",
                value: self.batch.max_concurrent,
            });
        }
        if self.translation.concurrency == 0 {
            return Err(ConfigError::NotPositive {
                name: "TRANSLATION_CONCURRENCY",
                value: self.translation.concurrency,
            });
        }
        if self.translation.target_language.is_empty() {
            return Err(ConfigError::EmptyTargetLanguage);
        }
        if self.api.timeout.is_zero() {
            return Err(ConfigError::NotPositive {
                name: "API_TIMEOUT_SECONDS",
                value: 0,
            });
        }
        Ok(())
    }

    pub fn input_dir(&self) -> &Path {
        &self.paths.input_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.paths.output_dir
    }

    pub fn temp_dir(&self) -> &Path {
        &self.paths.temp_dir
    }

    pub fn target_language(&self) -> &str {
        &self.translation.target_language
    }

    pub fn source_language(&self) -> &str {
        &self.translation.source_language
    }

    pub fn translation_concurrency(&self) -> usize {
        self.translation.concurrency
    }

    pub fn max_concurrent(&self) -> usize {
        self.batch.max_concurrent
    }

    pub fn mask_padding(&self) -> u32 {
        self.rendering.mask_padding
    }

    pub fn font_dir(&self) -> Option<&Path> {
        self.rendering.font_dir.as_deref()
    }

    pub fn api_timeout(&self) -> Duration {
        self.api.timeout
    }

    pub fn log_level(&self) -> Level {
        self.log_level
    }
}

fn parse_or<T: FromStr>(name: &'static str, raw: Option<String>, default: T) -> ConfigResult<T> {
    match raw {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> ConfigResult<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.target_language(), "ko");
        assert_eq!(config.source_language(), "auto");
        assert_eq!(config.max_concurrent(), 5);
        assert_eq!(config.mask_padding(), 5);
        assert_eq!(config.translation_concurrency(), 4);
        assert_eq!(config.input_dir(), Path::new("./images/input"));
        assert_eq!(config.api.deepl_api_url, DEFAULT_DEEPL_API_URL);
        assert!(config.api.google_vision_api_key.is_none());
        assert_eq!(config.log_level(), Level::INFO);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("MAX_CONCURRENT", "2"),
            ("TARGET_LANGUAGE", "ja"),
            ("OUTPUT_FOLDER", "/tmp/out"),
            ("DEEPL_API_KEY", " key "),
            ("LOG_LEVEL", "debug"),
        ])
        .unwrap();
        assert_eq!(config.max_concurrent(), 2);
        assert_eq!(config.target_language(), "ja");
        assert_eq!(config.output_dir(), Path::new("/tmp/out"));
        assert_eq!(config.api.deepl_api_key.as_deref(), Some("key"));
        assert_eq!(config.log_level(), Level::DEBUG);
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        assert!(matches!(
            config_from(&[("MAX_CONCURRENT", "0")]),
            Err(ConfigError::NotPositive { name: "MAX_CONCURRENT", .. })
        ));
    }

    #[test]
    fn test_rejects_garbage_numbers() {
        assert!(matches!(
            config_from(&[("MASK_PADDING", "-3")]),
            Err(ConfigError::InvalidValue { name: "MASK_PADDING", .. })
        ));
    }
}
