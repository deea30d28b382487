//! # SkyWay Explorer
//!
//! Look up an airport by ICAO code and get back what a generative AI
//! service knows about it: a grounded text briefing, a live-ish flight
//! board, three generated images and an iterative image editor.
//!
//! The crate is split the same way the data flows:
//! [`client`] talks to the service, [`normalize`] turns its loosely
//! formatted output into typed records, [`orchestrator`] runs the
//! metadata → (images ‖ flights) fetch sequence, and [`render`] draws the
//! resulting state as text.

pub mod client;
pub mod config;
pub mod edit;
pub mod gemini;
pub mod normalize;
pub mod orchestrator;
pub mod render;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// Re-export main types for convenience
pub use client::{AirportGateway, GeminiClient, MetadataResponse};
pub use config::GeminiConfig;
pub use edit::{ImageEditSession, EDIT_SUGGESTIONS};
pub use normalize::ResponseNormalizer;
pub use orchestrator::{Effect, Event, Explorer, SearchState};

/// Error types for the explorer library
#[derive(Error, Debug)]
pub enum ExplorerError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("AI service returned {status}: {message}")]
    ServiceError { status: u16, message: String },

    #[error("JSON handling failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Response parsing failed: {0}")]
    ParseError(String),

    #[error("No image data returned")]
    NoImageData,

    #[error("Invalid image reference: {0}")]
    InvalidImage(String),

    #[error("Invalid ICAO code: {0:?}")]
    InvalidIcao(String),

    #[error("No API key configured (set GEMINI_API_KEY or API_KEY)")]
    MissingApiKey,
}

/// Airport identifier used as the search key.
///
/// Always stored uppercased; 3 or 4 ASCII alphanumeric characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IcaoCode(String);

impl IcaoCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for IcaoCode {
    type Err = ExplorerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();
        let valid_len = (3..=4).contains(&code.len());
        if !valid_len || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ExplorerError::InvalidIcao(s.to_string()));
        }
        Ok(Self(code))
    }
}

impl fmt::Display for IcaoCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A citation attached to a search-grounded response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingSource {
    pub uri: String,
    pub title: String,
}

/// Everything known about one airport after a successful metadata fetch.
///
/// Replaced wholesale by every new search, never merged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AirportRecord {
    pub icao: IcaoCode,
    pub name: String,
    pub location: String,
    pub summary: String,
    pub elevation: String,
    pub runways: Vec<String>,
    pub fbo_info: String,
    pub fuel_services: String,
    pub restaurants: String,
    pub rentals: String,
    pub reviews: String,
    pub grounding_sources: Vec<GroundingSource>,
    pub retrieved_at: DateTime<Utc>,
}

/// One of the three gallery positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageSlot {
    Main,
    Fbo,
    Aerial,
}

impl ImageSlot {
    pub const ALL: [ImageSlot; 3] = [ImageSlot::Main, ImageSlot::Fbo, ImageSlot::Aerial];

    pub fn label(self) -> &'static str {
        match self {
            ImageSlot::Main => "Main View",
            ImageSlot::Fbo => "FBO/Facilities",
            ImageSlot::Aerial => "Aerial View",
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            ImageSlot::Main => "main",
            ImageSlot::Fbo => "fbo",
            ImageSlot::Aerial => "aerial",
        }
    }
}

impl FromStr for ImageSlot {
    type Err = ExplorerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "main" => Ok(ImageSlot::Main),
            "fbo" | "facility" | "facilities" => Ok(ImageSlot::Fbo),
            "aerial" => Ok(ImageSlot::Aerial),
            _ => Err(ExplorerError::ParseError(format!("Invalid image slot: {}", s))),
        }
    }
}

/// Generated gallery images, each slot holding a data URI or nothing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSet {
    pub main: Option<String>,
    pub fbo: Option<String>,
    pub aerial: Option<String>,
}

impl ImageSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, slot: ImageSlot) -> Option<&str> {
        match slot {
            ImageSlot::Main => self.main.as_deref(),
            ImageSlot::Fbo => self.fbo.as_deref(),
            ImageSlot::Aerial => self.aerial.as_deref(),
        }
    }

    /// Replace exactly one slot
    pub fn set(&mut self, slot: ImageSlot, image: String) {
        let target = match slot {
            ImageSlot::Main => &mut self.main,
            ImageSlot::Fbo => &mut self.fbo,
            ImageSlot::Aerial => &mut self.aerial,
        };
        *target = Some(image);
    }

    pub fn is_empty(&self) -> bool {
        ImageSlot::ALL.iter().all(|slot| self.get(*slot).is_none())
    }
}

/// Direction of a flight relative to the searched airport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlightDirection {
    Arrival,
    Departure,
}

/// One row of the flight board, as the model reports it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightRecord {
    pub flight_number: String,
    pub airline: String,
    pub origin: String,
    pub destination: String,
    pub status: String,
    pub scheduled_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<String>,
    #[serde(rename = "type")]
    pub direction: FlightDirection,
}

impl FlightRecord {
    /// The airport on the other end of the flight
    pub fn counterpart(&self) -> &str {
        match self.direction {
            FlightDirection::Arrival => &self.origin,
            FlightDirection::Departure => &self.destination,
        }
    }
}

/// Client-side filter over the flight board
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FlightFilter {
    #[default]
    All,
    Arrival,
    Departure,
}

impl FlightFilter {
    pub const ALL: [FlightFilter; 3] = [FlightFilter::All, FlightFilter::Arrival, FlightFilter::Departure];

    pub fn matches(self, flight: &FlightRecord) -> bool {
        match self {
            FlightFilter::All => true,
            FlightFilter::Arrival => flight.direction == FlightDirection::Arrival,
            FlightFilter::Departure => flight.direction == FlightDirection::Departure,
        }
    }

    /// Filter preserving the original order
    pub fn apply<'a>(self, flights: &'a [FlightRecord]) -> Vec<&'a FlightRecord> {
        flights.iter().filter(|f| self.matches(f)).collect()
    }

    pub fn label(self) -> &'static str {
        match self {
            FlightFilter::All => "all",
            FlightFilter::Arrival => "arrivals",
            FlightFilter::Departure => "departures",
        }
    }
}

impl FromStr for FlightFilter {
    type Err = ExplorerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(FlightFilter::All),
            "arrival" | "arrivals" => Ok(FlightFilter::Arrival),
            "departure" | "departures" => Ok(FlightFilter::Departure),
            _ => Err(ExplorerError::ParseError(format!("Invalid flight filter: {}", s))),
        }
    }
}

/// Detail panel selected below the gallery
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Category {
    #[default]
    Flights,
    Services,
    Fuel,
    Restaurants,
    Rentals,
    Reviews,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Flights,
        Category::Services,
        Category::Fuel,
        Category::Restaurants,
        Category::Rentals,
        Category::Reviews,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Category::Flights => "Live Flights",
            Category::Services => "Services",
            Category::Fuel => "Gas/Fuel",
            Category::Restaurants => "Restaurants",
            Category::Rentals => "Rental Cars",
            Category::Reviews => "Reviews",
        }
    }
}

impl FromStr for Category {
    type Err = ExplorerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "flights" | "live-flights" => Ok(Category::Flights),
            "services" => Ok(Category::Services),
            "fuel" | "gas" => Ok(Category::Fuel),
            "restaurants" | "dining" => Ok(Category::Restaurants),
            "rentals" | "rental-cars" => Ok(Category::Rentals),
            "reviews" => Ok(Category::Reviews),
            _ => Err(ExplorerError::ParseError(format!("Invalid category: {}", s))),
        }
    }
}

/// Fetch and normalize the airport briefing using configuration from the
/// environment.
///
/// # Example
/// ```rust,no_run
/// use skyway_explorer::get_airport_overview;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let airport = get_airport_overview("KLAX").await?;
/// println!("{} ({} sources)", airport.name, airport.grounding_sources.len());
/// # Ok(())
/// # }
/// ```
pub async fn get_airport_overview(code: &str) -> Result<AirportRecord, ExplorerError> {
    let code = code.parse::<IcaoCode>()?;
    let client = GeminiClient::new(GeminiConfig::from_env()?)?;
    let normalizer = ResponseNormalizer::new()?;

    let response = client.fetch_metadata(&code).await?;
    Ok(normalizer.airport_record(&code, response))
}

/// Fetch the flight board for an airport. Unparseable model output
/// yields an empty board rather than an error.
pub async fn get_flight_board(code: &str) -> Result<Vec<FlightRecord>, ExplorerError> {
    let code = code.parse::<IcaoCode>()?;
    let client = GeminiClient::new(GeminiConfig::from_env()?)?;
    let normalizer = ResponseNormalizer::new()?;

    let raw = client.fetch_flights(&code).await?;
    Ok(normalizer.flights(&raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flight(number: &str, direction: FlightDirection) -> FlightRecord {
        FlightRecord {
            flight_number: number.to_string(),
            airline: "Test Air".to_string(),
            origin: "KSFO".to_string(),
            destination: "KJFK".to_string(),
            status: "On Time".to_string(),
            scheduled_time: "10:00".to_string(),
            estimated_time: None,
            direction,
        }
    }

    #[test]
    fn test_icao_code_parsing() {
        assert_eq!("klax".parse::<IcaoCode>().unwrap().as_str(), "KLAX");
        assert_eq!(" sfo ".parse::<IcaoCode>().unwrap().as_str(), "SFO");

        assert!("".parse::<IcaoCode>().is_err());
        assert!("KL".parse::<IcaoCode>().is_err());
        assert!("KLAXX".parse::<IcaoCode>().is_err());
        assert!("K-AX".parse::<IcaoCode>().is_err());
    }

    #[test]
    fn test_filter_preserves_order() {
        let flights = vec![
            flight("AA1", FlightDirection::Arrival),
            flight("DL2", FlightDirection::Departure),
        ];

        let arrivals = FlightFilter::Arrival.apply(&flights);
        assert_eq!(arrivals.len(), 1);
        assert_eq!(arrivals[0].flight_number, "AA1");

        let departures = FlightFilter::Departure.apply(&flights);
        assert_eq!(departures.len(), 1);
        assert_eq!(departures[0].flight_number, "DL2");

        let all = FlightFilter::All.apply(&flights);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].flight_number, "AA1");
        assert_eq!(all[1].flight_number, "DL2");
    }

    #[test]
    fn test_counterpart_follows_direction() {
        assert_eq!(flight("AA1", FlightDirection::Arrival).counterpart(), "KSFO");
        assert_eq!(flight("AA1", FlightDirection::Departure).counterpart(), "KJFK");
    }

    #[test]
    fn test_image_set_slots() {
        let mut images = ImageSet::empty();
        assert!(images.is_empty());

        images.set(ImageSlot::Fbo, "data:image/png;base64,AAAA".to_string());
        assert!(!images.is_empty());
        assert_eq!(images.get(ImageSlot::Fbo), Some("data:image/png;base64,AAAA"));
        assert_eq!(images.get(ImageSlot::Main), None);
        assert_eq!(images.get(ImageSlot::Aerial), None);
    }

    #[test]
    fn test_category_and_filter_parsing() {
        assert!(matches!("gas".parse::<Category>(), Ok(Category::Fuel)));
        assert!(matches!("Reviews".parse::<Category>(), Ok(Category::Reviews)));
        assert!("weather".parse::<Category>().is_err());

        assert!(matches!("arrivals".parse::<FlightFilter>(), Ok(FlightFilter::Arrival)));
        assert!(matches!("departure".parse::<FlightFilter>(), Ok(FlightFilter::Departure)));
        assert!("both".parse::<FlightFilter>().is_err());

        assert!(matches!("facilities".parse::<ImageSlot>(), Ok(ImageSlot::Fbo)));
    }

    #[test]
    fn test_defaults() {
        assert_eq!(Category::default(), Category::Flights);
        assert_eq!(FlightFilter::default(), FlightFilter::All);
    }
}
