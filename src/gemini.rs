//! Wire types and request builders for the generative AI service
//!
//! Covers the subset of the `generateContent` REST surface the explorer
//! uses: text parts, inline image parts, the search tool, JSON-schema
//! constrained output, image aspect ratio, and grounding metadata.

use crate::{ExplorerError, GroundingSource, IcaoCode, ImageSlot};
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// MIME type attached to every image we send or label
pub const IMAGE_MIME_TYPE: &str = "image/png";
pub const IMAGE_ASPECT_RATIO: &str = "16:9";
const DATA_URI_PREFIX: &str = "data:image/png;base64,";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Some("user".to_string()),
            parts,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
    /// Set on reasoning parts, which never count as response text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn inline_png(data: impl Into<String>) -> Self {
        Self {
            inline_data: Some(InlineData {
                mime_type: IMAGE_MIME_TYPE.to_string(),
                data: data.into(),
            }),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    #[serde(default)]
    pub mime_type: String,
    /// Base64 payload
    pub data: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_search: Option<GoogleSearch>,
}

impl Tool {
    pub fn google_search() -> Self {
        Self {
            google_search: Some(GoogleSearch {}),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GoogleSearch {}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_config: Option<ImageConfig>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageConfig {
    pub aspect_ratio: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub grounding_metadata: Option<GroundingMetadata>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    #[serde(default)]
    pub grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroundingChunk {
    #[serde(default)]
    pub web: Option<WebChunk>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebChunk {
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub title: String,
}

/// Error body returned with non-2xx statuses
#[derive(Debug, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}

impl GenerateContentResponse {
    fn first_parts(&self) -> &[Part] {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
            .unwrap_or(&[])
    }

    /// Concatenated text of the first candidate; empty when there is none
    pub fn text(&self) -> String {
        self.first_parts()
            .iter()
            .filter(|part| part.thought != Some(true))
            .filter_map(|part| part.text.as_deref())
            .collect()
    }

    /// First inline binary payload of the first candidate
    pub fn first_inline_data(&self) -> Option<&InlineData> {
        self.first_parts().iter().find_map(|part| part.inline_data.as_ref())
    }

    /// Web citations of the first candidate, in response order
    pub fn grounding_sources(&self) -> Vec<GroundingSource> {
        self.candidates
            .first()
            .and_then(|c| c.grounding_metadata.as_ref())
            .map(|meta| {
                meta.grounding_chunks
                    .iter()
                    .filter_map(|chunk| chunk.web.as_ref())
                    .map(|web| GroundingSource {
                        uri: web.uri.clone(),
                        title: web.title.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

pub fn metadata_prompt(code: &IcaoCode) -> String {
    format!(
        "Provide detailed information for the airport with ICAO code: {code}. \n\
         Include: Full Name, Location, a brief Summary, Elevation, list of Runways, FBO information \
         (Fixed Base Operators), Fuel services (Gas), Restaurants on field or nearby, Rental car \
         availability, and a summary of recent pilot reviews.\n\
         Format the response clearly as requested."
    )
}

pub fn flights_prompt(code: &IcaoCode) -> String {
    format!(
        "Search for real-time flight information at airport {code}. \n\
         Provide a list of 10 recent or upcoming arrivals and departures. \n\
         For each flight, include: Flight Number, Airline, Origin, Destination, Status, Scheduled Time, \
         and Estimated Time.\n\
         Identify if it is an 'arrival' or 'departure' relative to {code}.\n\
         Return ONLY a valid JSON array of objects with keys: flightNumber, airline, origin, destination, \
         status, scheduledTime, estimatedTime, type."
    )
}

pub fn image_prompt(slot: ImageSlot, code: &IcaoCode, airport_name: &str) -> String {
    match slot {
        ImageSlot::Main => format!(
            "High-res realistic professional photo of terminal building and gates at {airport_name} ({code}). \
             Clear blue sky."
        ),
        ImageSlot::Fbo => format!(
            "Close up photo of an FBO general aviation hangar with private business jets parked at \
             {airport_name} ({code})."
        ),
        ImageSlot::Aerial => format!(
            "Clean vertical aerial satellite drone view of the runways and taxiways layout of \
             {airport_name} ({code})."
        ),
    }
}

/// Array-of-flights schema the flight request constrains output to
pub fn flight_response_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "flightNumber": { "type": "STRING" },
                "airline": { "type": "STRING" },
                "origin": { "type": "STRING" },
                "destination": { "type": "STRING" },
                "status": { "type": "STRING" },
                "scheduledTime": { "type": "STRING" },
                "estimatedTime": { "type": "STRING" },
                "type": { "type": "STRING", "enum": ["arrival", "departure"] }
            },
            "required": ["flightNumber", "airline", "origin", "destination", "status", "scheduledTime", "type"]
        }
    })
}

pub fn build_metadata_request(code: &IcaoCode) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content::user(vec![Part::text(metadata_prompt(code))])],
        tools: vec![Tool::google_search()],
        generation_config: None,
    }
}

pub fn build_flights_request(code: &IcaoCode) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content::user(vec![Part::text(flights_prompt(code))])],
        tools: vec![Tool::google_search()],
        generation_config: Some(GenerationConfig {
            response_mime_type: Some("application/json".to_string()),
            response_schema: Some(flight_response_schema()),
            ..Default::default()
        }),
    }
}

pub fn build_image_request(prompt: &str) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content::user(vec![Part::text(prompt)])],
        tools: Vec::new(),
        generation_config: Some(GenerationConfig {
            image_config: Some(ImageConfig {
                aspect_ratio: IMAGE_ASPECT_RATIO.to_string(),
            }),
            ..Default::default()
        }),
    }
}

/// Image first, instruction second
pub fn build_edit_request(image_base64: &str, instruction: &str) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content::user(vec![
            Part::inline_png(image_base64),
            Part::text(instruction),
        ])],
        tools: Vec::new(),
        generation_config: None,
    }
}

/// Wrap a base64 payload as a PNG data URI
pub fn to_data_uri(base64_payload: &str) -> String {
    format!("{}{}", DATA_URI_PREFIX, base64_payload)
}

/// Base64 payload of a data URI: everything after the first comma, or the
/// whole string when there is no comma
pub fn data_uri_payload(reference: &str) -> &str {
    match reference.split_once(',') {
        Some((_, payload)) if !payload.is_empty() => payload,
        _ => reference,
    }
}

pub fn decode_data_uri(reference: &str) -> Result<Vec<u8>, ExplorerError> {
    general_purpose::STANDARD
        .decode(data_uri_payload(reference).trim())
        .map_err(|e| ExplorerError::InvalidImage(format!("bad base64 payload: {}", e)))
}

pub fn encode_data_uri(bytes: &[u8]) -> String {
    to_data_uri(&general_purpose::STANDARD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code() -> IcaoCode {
        "KLAX".parse().unwrap()
    }

    #[test]
    fn test_metadata_request_enables_search() {
        let body = serde_json::to_value(build_metadata_request(&code())).unwrap();
        assert_eq!(body["tools"][0]["googleSearch"], json!({}));
        assert!(body.get("generationConfig").is_none());
        let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(prompt.contains("ICAO code: KLAX"));
    }

    #[test]
    fn test_flights_request_declares_schema() {
        let body = serde_json::to_value(build_flights_request(&code())).unwrap();
        let config = &body["generationConfig"];
        assert_eq!(config["responseMimeType"], "application/json");
        assert_eq!(config["responseSchema"]["type"], "ARRAY");

        let required = config["responseSchema"]["items"]["required"].as_array().unwrap();
        assert!(required.contains(&json!("type")));
        assert!(!required.contains(&json!("estimatedTime")));
    }

    #[test]
    fn test_image_and_edit_requests() {
        let body = serde_json::to_value(build_image_request("a hangar")).unwrap();
        assert_eq!(body["generationConfig"]["imageConfig"]["aspectRatio"], "16:9");
        assert!(body.get("tools").is_none());

        let body = serde_json::to_value(build_edit_request("QUJD", "Night time")).unwrap();
        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[0]["inlineData"]["data"], "QUJD");
        assert_eq!(parts[1]["text"], "Night time");
    }

    #[test]
    fn test_image_prompts_mention_airport() {
        for slot in ImageSlot::ALL {
            let prompt = image_prompt(slot, &code(), "Los Angeles International");
            assert!(prompt.contains("Los Angeles International (KLAX)"));
        }
    }

    #[test]
    fn test_response_helpers() {
        let raw = json!({
            "candidates": [{
                "content": { "parts": [
                    { "text": "thinking...", "thought": true },
                    { "text": "# KLAX" },
                    { "text": "\nmore" },
                    { "inlineData": { "mimeType": "image/png", "data": "AAAA" } }
                ]},
                "groundingMetadata": { "groundingChunks": [
                    { "web": { "uri": "https://a.example", "title": "A" } },
                    { "retrievedContext": { "uri": "x" } },
                    { "web": { "uri": "https://b.example", "title": "B" } }
                ]}
            }]
        });
        let response: GenerateContentResponse = serde_json::from_value(raw).unwrap();

        assert_eq!(response.text(), "# KLAX\nmore");
        assert_eq!(response.first_inline_data().unwrap().data, "AAAA");

        let sources = response.grounding_sources();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].title, "A");
        assert_eq!(sources[1].uri, "https://b.example");
    }

    #[test]
    fn test_empty_response() {
        let response: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(response.text(), "");
        assert!(response.first_inline_data().is_none());
        assert!(response.grounding_sources().is_empty());
    }

    #[test]
    fn test_data_uri_helpers() {
        assert_eq!(to_data_uri("AAAA"), "data:image/png;base64,AAAA");
        assert_eq!(data_uri_payload("data:image/jpeg;base64,QUJD"), "QUJD");
        assert_eq!(data_uri_payload("QUJD"), "QUJD");

        assert_eq!(decode_data_uri("data:image/png;base64,QUJD").unwrap(), b"ABC");
        assert_eq!(encode_data_uri(b"ABC"), "data:image/png;base64,QUJD");
        assert!(matches!(
            decode_data_uri("data:image/png;base64,@@@"),
            Err(ExplorerError::InvalidImage(_))
        ));
    }
}
