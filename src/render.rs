//! Plain-text rendering of the explorer state
//!
//! Pure functions from [`SearchState`] to strings, so any front end
//! (the CLI shell, a log line, a test) can show the same view.

use crate::edit::{ImageEditSession, EDIT_SUGGESTIONS};
use crate::gemini::data_uri_payload;
use crate::orchestrator::SearchState;
use crate::{AirportRecord, Category, FlightDirection, FlightFilter, FlightRecord, GroundingSource, ImageSlot};

pub const FLIGHTS_LOADING: &str = "Syncing live flight data...";
pub const FLIGHTS_EMPTY: &str = "No live flight data found for this period.";
pub const IMAGE_PENDING: &str = "Generating view...";
pub const IMAGE_MISSING: &str = "(no image)";
pub const EMPTY_STATE: &str =
    "Ready for departure? Search for any ICAO code to pull up live traffic, services, and imagery.";

/// Visual weight of a flight status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTone {
    Delayed,
    Landed,
    Normal,
}

impl StatusTone {
    pub fn classify(status: &str) -> Self {
        let status = status.to_lowercase();
        if status.contains("delayed") {
            StatusTone::Delayed
        } else if status.contains("landed") {
            StatusTone::Landed
        } else {
            StatusTone::Normal
        }
    }

    fn marker(self) -> &'static str {
        match self {
            StatusTone::Delayed => "!",
            StatusTone::Landed => "v",
            StatusTone::Normal => " ",
        }
    }
}

/// Whole screen: header, gallery, tabs, active panel, sources, editor
pub fn render_state(state: &SearchState) -> String {
    let mut out = String::new();

    if let Some(alert) = &state.alert {
        out.push_str(&format!("!! {}\n\n", alert));
    }

    let airport = match &state.airport {
        Some(airport) => airport,
        None if state.metadata_loading => {
            let code = state.code.as_ref().map(|c| c.as_str()).unwrap_or("");
            out.push_str(&format!("Looking up {}...\n", code));
            return out;
        }
        None => {
            out.push_str(EMPTY_STATE);
            out.push('\n');
            return out;
        }
    };

    out.push_str(&render_header(airport));
    out.push('\n');
    out.push_str(&render_gallery(state));
    out.push('\n');
    out.push_str(&render_tabs(state.category));
    out.push('\n');
    out.push_str(&render_panel(state, airport));
    if !airport.grounding_sources.is_empty() {
        out.push('\n');
        out.push_str(&render_sources(&airport.grounding_sources));
    }
    if let Some(editor) = &state.editor {
        out.push('\n');
        out.push_str(&render_editor(editor));
    }
    out
}

pub fn render_header(airport: &AirportRecord) -> String {
    format!("[{}] {}\n    {}\n", airport.icao, airport.name, airport.location)
}

/// Short description of a data URI for terminals that can't show images
pub fn describe_image(reference: &str) -> String {
    let payload = data_uri_payload(reference).trim_end_matches('=');
    let bytes = payload.len() * 3 / 4;
    format!("image ready ({:.1} KB)", bytes as f64 / 1024.0)
}

pub fn render_gallery(state: &SearchState) -> String {
    let gallery = state.gallery();
    let mut out = String::new();
    for slot in ImageSlot::ALL {
        let status = match gallery.get(slot) {
            Some(reference) => describe_image(reference),
            None if state.images_loading => IMAGE_PENDING.to_string(),
            None => IMAGE_MISSING.to_string(),
        };
        out.push_str(&format!("  {:<16} {}\n", slot.label(), status));
    }
    out
}

pub fn render_tabs(active: Category) -> String {
    let tabs: Vec<String> = Category::ALL
        .iter()
        .map(|category| {
            if *category == active {
                format!("[{}]", category.label())
            } else {
                category.label().to_string()
            }
        })
        .collect();
    format!("{}\n", tabs.join(" | "))
}

pub fn render_panel(state: &SearchState, airport: &AirportRecord) -> String {
    match state.category {
        Category::Flights => render_flight_board(state),
        Category::Services => render_services(airport),
        Category::Fuel => section("Fuel & Technical Services", &airport.fuel_services),
        Category::Restaurants => section("On-Field Dining & Nearby Eateries", &airport.restaurants),
        Category::Rentals => section("Local Transportation & Rentals", &airport.rentals),
        Category::Reviews => section("The Pilot's Log: Feedback", &format!("\"{}\"", airport.reviews)),
    }
}

fn section(title: &str, body: &str) -> String {
    format!("== {} ==\n{}\n", title, body)
}

fn render_services(airport: &AirportRecord) -> String {
    let mut out = String::from("== Airport Overview & Services ==\n");
    out.push_str(&format!("-- FBO & Ground Services --\n{}\n", airport.fbo_info));
    out.push_str("-- Runways & Field Data --\n");
    for runway in &airport.runways {
        out.push_str(&format!("  * {}\n", runway));
    }
    out.push_str(&format!("-- Detailed Summary --\n{}\n", airport.summary));
    out
}

fn render_filter_bar(active: FlightFilter) -> String {
    FlightFilter::ALL
        .iter()
        .map(|filter| {
            if *filter == active {
                format!("[{}]", filter.label())
            } else {
                filter.label().to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn render_flight_board(state: &SearchState) -> String {
    let mut out = format!("== Live Flight Board ==  {}\n", render_filter_bar(state.filter));

    if state.flights_loading {
        out.push_str(FLIGHTS_LOADING);
        out.push('\n');
        return out;
    }

    let flights = state.visible_flights();
    if flights.is_empty() {
        out.push_str(FLIGHTS_EMPTY);
        out.push('\n');
        return out;
    }

    out.push_str(&render_flight_table(&flights));
    out
}

pub fn render_flight_table(flights: &[&FlightRecord]) -> String {
    let mut out = format!(
        "{:<10} {:<22} {:<12} {:<13} {:<16} {}\n",
        "FLIGHT", "AIRLINE", "ORIGIN/DEST", "TIME SCH/EST", "STATUS", "TYPE"
    );
    for flight in flights {
        let estimated = flight.estimated_time.as_deref().unwrap_or("--:--");
        let direction = match flight.direction {
            FlightDirection::Arrival => "ARR",
            FlightDirection::Departure => "DEP",
        };
        out.push_str(&format!(
            "{:<10} {:<22} {:<12} {:<13} {}{:<15} {}\n",
            truncate(&flight.flight_number, 10),
            truncate(&flight.airline, 22),
            truncate(flight.counterpart(), 12),
            format!("{}/{}", flight.scheduled_time, estimated),
            StatusTone::classify(&flight.status).marker(),
            truncate(&flight.status, 15),
            direction
        ));
    }
    out
}

pub fn render_sources(sources: &[GroundingSource]) -> String {
    let mut out = String::from("Real-Time Data Sources:\n");
    for source in sources {
        out.push_str(&format!("  - {} <{}>\n", source.title, source.uri));
    }
    out
}

pub fn render_editor(editor: &ImageEditSession) -> String {
    let mut out = format!("== AI Image Studio: {} ==\n", editor.slot().label());
    out.push_str(&format!("  preview: {}\n", describe_image(editor.preview())));
    if editor.is_editing() {
        out.push_str("  reimagining your image...\n");
    }
    if let Some(error) = editor.error() {
        out.push_str(&format!("  error: {}\n", error));
    }
    if !editor.draft().is_empty() {
        out.push_str(&format!("  instruction: {}\n", editor.draft()));
    }
    let suggestions: Vec<String> = EDIT_SUGGESTIONS
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}) {}", i + 1, s))
        .collect();
    out.push_str(&format!("  suggestions: {}\n", suggestions.join("  ")));
    out
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
    cut.push('~');
    cut
}
