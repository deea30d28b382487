//! Connection settings for the generative AI service

use crate::ExplorerError;
use std::env;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-3-pro-preview";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Settings shared by every gateway request
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub text_model: String,
    pub image_model: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    /// Defaults for everything except the key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Read `GEMINI_API_KEY` (falling back to `API_KEY`) plus the optional
    /// `SKYWAY_*` overrides.
    pub fn from_env() -> Result<Self, ExplorerError> {
        let api_key = env::var("GEMINI_API_KEY")
            .or_else(|_| env::var("API_KEY"))
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ExplorerError::MissingApiKey)?;

        let mut config = Self::new(api_key);

        if let Ok(base_url) = env::var("SKYWAY_BASE_URL") {
            config.base_url = base_url;
        }
        if let Ok(model) = env::var("SKYWAY_TEXT_MODEL") {
            config.text_model = model;
        }
        if let Ok(model) = env::var("SKYWAY_IMAGE_MODEL") {
            config.image_model = model;
        }
        if let Ok(secs) = env::var("SKYWAY_TIMEOUT_SECS") {
            match secs.parse::<u64>() {
                Ok(secs) => config.timeout = Duration::from_secs(secs),
                Err(_) => warn!(value = %secs, "Ignoring invalid SKYWAY_TIMEOUT_SECS"),
            }
        }

        debug!(
            base_url = %config.base_url,
            text_model = %config.text_model,
            image_model = %config.image_model,
            timeout_secs = config.timeout.as_secs(),
            "Loaded configuration from environment"
        );
        Ok(config)
    }

    /// `{base}/v1beta/models/{model}:generateContent`
    pub fn generate_content_url(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model
        )
    }
}
