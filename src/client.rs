//! HTTP client for the generative AI service

use crate::config::GeminiConfig;
use crate::gemini::{
    build_edit_request, build_flights_request, build_image_request, build_metadata_request,
    data_uri_payload, ErrorEnvelope, GenerateContentRequest, GenerateContentResponse,
};
use crate::normalize::extract_image;
use crate::{ExplorerError, GroundingSource, IcaoCode};
use reqwest::Client;
use std::future::Future;
use tracing::{debug, error, info, instrument};

/// Raw output of the metadata request
#[derive(Debug, Clone, Default)]
pub struct MetadataResponse {
    pub text: String,
    pub sources: Vec<GroundingSource>,
}

/// The four exchanges the explorer needs from a generative model.
///
/// Stateless and independent: no retries, no caching. A failure is just
/// an error for the caller to classify.
pub trait AirportGateway: Send + Sync + 'static {
    /// Search-grounded briefing text plus its web citations
    fn fetch_metadata(
        &self,
        code: &IcaoCode,
    ) -> impl Future<Output = Result<MetadataResponse, ExplorerError>> + Send;

    /// Schema-constrained flight board, returned as raw (possibly fenced) JSON text
    fn fetch_flights(&self, code: &IcaoCode) -> impl Future<Output = Result<String, ExplorerError>> + Send;

    /// One widescreen image as a PNG data URI
    fn generate_image(&self, prompt: &str) -> impl Future<Output = Result<String, ExplorerError>> + Send;

    /// Regenerate `image` (a data URI) according to `instruction`
    fn edit_image(
        &self,
        image: &str,
        instruction: &str,
    ) -> impl Future<Output = Result<String, ExplorerError>> + Send;
}

/// Gateway backed by the Gemini `generateContent` REST endpoint
pub struct GeminiClient {
    http_client: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    /// Create a new client
    pub fn new(config: GeminiConfig) -> Result<Self, ExplorerError> {
        if config.api_key.trim().is_empty() {
            return Err(ExplorerError::MissingApiKey);
        }

        debug!(base_url = %config.base_url, "Creating new Gemini client");
        let http_client = Client::builder()
            .user_agent(concat!("skyway-explorer/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()?;

        Ok(Self { http_client, config })
    }

    pub fn from_env() -> Result<Self, ExplorerError> {
        Self::new(GeminiConfig::from_env()?)
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    /// POST one `generateContent` call and decode the reply
    async fn generate(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, ExplorerError> {
        let url = self.config.generate_content_url(model);
        debug!(url = %url, "Sending generateContent request");

        let start_time = std::time::Instant::now();
        let response = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(request)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        info!(
            model = model,
            status = %status,
            duration_ms = start_time.elapsed().as_millis(),
            body_length = body.len(),
            "AI request completed"
        );

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|envelope| envelope.error.message)
                .ok()
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());
            error!(status = %status, message = %message, "AI request failed");
            return Err(ExplorerError::ServiceError {
                status: status.as_u16(),
                message,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

impl AirportGateway for GeminiClient {
    #[instrument(level = "info", skip(self))]
    async fn fetch_metadata(&self, code: &IcaoCode) -> Result<MetadataResponse, ExplorerError> {
        let response = self
            .generate(&self.config.text_model, &build_metadata_request(code))
            .await?;

        let metadata = MetadataResponse {
            text: response.text(),
            sources: response.grounding_sources(),
        };
        info!(
            text_length = metadata.text.len(),
            sources = metadata.sources.len(),
            "Received airport metadata"
        );
        Ok(metadata)
    }

    #[instrument(level = "info", skip(self))]
    async fn fetch_flights(&self, code: &IcaoCode) -> Result<String, ExplorerError> {
        let response = self
            .generate(&self.config.text_model, &build_flights_request(code))
            .await?;
        Ok(response.text())
    }

    #[instrument(level = "info", skip(self, prompt))]
    async fn generate_image(&self, prompt: &str) -> Result<String, ExplorerError> {
        let response = self
            .generate(&self.config.image_model, &build_image_request(prompt))
            .await?;
        extract_image(&response)
    }

    #[instrument(level = "info", skip(self, image))]
    async fn edit_image(&self, image: &str, instruction: &str) -> Result<String, ExplorerError> {
        let request = build_edit_request(data_uri_payload(image), instruction);
        let response = self.generate(&self.config.image_model, &request).await?;
        extract_image(&response)
    }
}
