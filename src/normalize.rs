//! Turns raw model output into typed records
//!
//! Model output is only loosely formatted: the briefing is markdown-ish
//! free text and the flight board is JSON that may arrive wrapped in code
//! fences despite the requested MIME type. Parsing here is deliberately
//! shallow and never fails the caller for flights.

use crate::client::MetadataResponse;
use crate::gemini::{to_data_uri, GenerateContentResponse};
use crate::{AirportRecord, ExplorerError, FlightRecord, IcaoCode};
use chrono::Utc;
use regex::Regex;
use tracing::{debug, warn};

pub const PLACEHOLDER_LOCATION: &str = "Retrieved via Google Search Grounding";
pub const PLACEHOLDER_ELEVATION: &str = "Standard";
pub const PLACEHOLDER_RUNWAY: &str = "Main runway info in summary";
pub const PLACEHOLDER_FBO: &str = "Check services tab";
pub const PLACEHOLDER_AVAILABLE: &str = "Available";
pub const PLACEHOLDER_REVIEWS: &str = "See pilot feedback";

/// Normalizer for gateway responses
pub struct ResponseNormalizer {
    fence_open: Regex,  // leading ``` or ```json
    fence_close: Regex, // trailing ```
}

impl ResponseNormalizer {
    pub fn new() -> Result<Self, ExplorerError> {
        Ok(Self {
            fence_open: Regex::new(r"^```(?:json|JSON)?[ \t]*\r?\n?")
                .map_err(|e| ExplorerError::ParseError(format!("Invalid fence pattern: {}", e)))?,
            fence_close: Regex::new(r"\r?\n?```$")
                .map_err(|e| ExplorerError::ParseError(format!("Invalid fence pattern: {}", e)))?,
        })
    }

    /// First non-empty line with heading markers removed, or `<CODE> Airport`
    pub fn display_name(&self, code: &IcaoCode, text: &str) -> String {
        text.lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(|line| line.replace('#', "").trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| format!("{} Airport", code))
    }

    /// Build the airport record. Only the name is extracted; the full text
    /// goes to `summary` and every other field is a fixed placeholder.
    pub fn airport_record(&self, code: &IcaoCode, response: MetadataResponse) -> AirportRecord {
        let name = self.display_name(code, &response.text);
        debug!(
            icao = %code,
            name = %name,
            text_length = response.text.len(),
            sources = response.sources.len(),
            "Normalized airport metadata"
        );

        AirportRecord {
            icao: code.clone(),
            name,
            location: PLACEHOLDER_LOCATION.to_string(),
            summary: response.text,
            elevation: PLACEHOLDER_ELEVATION.to_string(),
            runways: vec![PLACEHOLDER_RUNWAY.to_string()],
            fbo_info: PLACEHOLDER_FBO.to_string(),
            fuel_services: PLACEHOLDER_AVAILABLE.to_string(),
            restaurants: PLACEHOLDER_AVAILABLE.to_string(),
            rentals: PLACEHOLDER_AVAILABLE.to_string(),
            reviews: PLACEHOLDER_REVIEWS.to_string(),
            grounding_sources: response.sources,
            retrieved_at: Utc::now(),
        }
    }

    /// Remove a surrounding markdown code fence, if any
    pub fn strip_code_fences(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        let opened = self.fence_open.replace(trimmed, "");
        let closed = self.fence_close.replace(&opened, "");
        closed.trim().to_string()
    }

    /// Strict flight parsing; empty input counts as an empty array
    pub fn try_flights(&self, raw: &str) -> Result<Vec<FlightRecord>, ExplorerError> {
        let json = self.strip_code_fences(raw);
        if json.is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&json)?)
    }

    /// Lenient flight parsing: any failure yields an empty board
    pub fn flights(&self, raw: &str) -> Vec<FlightRecord> {
        match self.try_flights(raw) {
            Ok(flights) => {
                debug!(flights = flights.len(), "Parsed flight board");
                flights
            }
            Err(e) => {
                warn!(error = %e, raw_length = raw.len(), "Failed to parse flight data JSON");
                Vec::new()
            }
        }
    }
}

/// First inline image payload of a response, as a PNG data URI
pub fn extract_image(response: &GenerateContentResponse) -> Result<String, ExplorerError> {
    response
        .first_inline_data()
        .map(|inline| to_data_uri(&inline.data))
        .ok_or(ExplorerError::NoImageData)
}
