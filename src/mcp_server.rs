// src/mcp_server.rs

use rmcp::{
    ServerHandler, ServiceExt,
    model::{ServerCapabilities, ServerInfo},
    schemars, tool,
    transport::stdio,
};
use skyway_explorer::{
    AirportGateway, FlightFilter, FlightRecord, GeminiClient, GroundingSource, IcaoCode, ResponseNormalizer,
};
use serde::{Deserialize, Serialize};
use anyhow::Result;
use tracing::{info, warn, error, debug};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use std::path::PathBuf;
use std::sync::Arc;

/// Airport explorer MCP server
#[derive(Clone)]
pub struct AirportServer {
    client: Arc<GeminiClient>,
    normalizer: Arc<ResponseNormalizer>,
}

impl AirportServer {
    pub fn new(client: GeminiClient) -> Result<Self> {
        Ok(Self {
            client: Arc::new(client),
            normalizer: Arc::new(ResponseNormalizer::new()?),
        })
    }

    /// Initialize logging to file; stdout carries the MCP transport
    fn init_logging() -> Result<()> {
        let log_dir = PathBuf::from("logs");
        std::fs::create_dir_all(&log_dir)?;

        let file_appender = tracing_appender::rolling::daily(&log_dir, "skyway-mcp.log");

        tracing_subscriber::registry()
            .with(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info"))
                    .add_directive("skyway_explorer=debug".parse()?)
                    .add_directive("skyway_mcp=debug".parse()?),
            )
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(file_appender)
                    .with_ansi(false)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .json(),
            )
            .init();

        info!("Logging initialized - logs will be written to logs/skyway-mcp.log.*");
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone, schemars::JsonSchema)]
pub struct AirportParams {
    #[schemars(description = "ICAO airport code (e.g., KLAX, EGLL)")]
    pub icao: String,
}

#[derive(Debug, Deserialize, Clone, schemars::JsonSchema)]
pub struct FlightBoardParams {
    #[schemars(description = "ICAO airport code (e.g., KLAX, EGLL)")]
    pub icao: String,
    #[schemars(description = "Direction filter: all, arrival or departure (default: all)")]
    pub direction: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AirportOverview {
    pub icao: String,
    pub name: String,
    pub briefing: String,
    pub sources: Vec<GroundingSource>,
}

#[derive(Debug, Serialize)]
pub struct FlightBoard<'a> {
    pub icao: String,
    pub direction: &'static str,
    pub total_flights: usize,
    pub flights: Vec<&'a FlightRecord>,
}

fn error_json(message: String) -> String {
    serde_json::json!({ "error": message }).to_string()
}

#[tool(tool_box)]
impl AirportServer {
    /// Search-grounded airport briefing
    #[tool(description = "Get a search-grounded briefing for an airport: name, full text briefing (location, runways, FBOs, fuel, dining, rentals, pilot reviews) and the web sources it was grounded on.")]
    async fn get_airport_overview(
        &self,
        #[tool(aggr)] params: AirportParams,
    ) -> String {
        info!(icao = %params.icao, "Airport overview request received");

        let code = match params.icao.parse::<IcaoCode>() {
            Ok(code) => code,
            Err(e) => {
                warn!(error = %e, "Rejected airport overview request");
                return error_json(e.to_string());
            }
        };

        match self.client.fetch_metadata(&code).await {
            Ok(raw) => {
                let airport = self.normalizer.airport_record(&code, raw);
                info!(name = %airport.name, sources = airport.grounding_sources.len(), "Airport overview completed");
                let overview = AirportOverview {
                    icao: airport.icao.to_string(),
                    name: airport.name,
                    briefing: airport.summary,
                    sources: airport.grounding_sources,
                };
                serde_json::to_string_pretty(&overview)
                    .unwrap_or_else(|e| error_json(format!("Failed to serialize results: {}", e)))
            }
            Err(e) => {
                error!("Airport overview failed: {}", e);
                error_json(format!("Error fetching airport details: {}", e))
            }
        }
    }

    /// Flight board for an airport, optionally filtered by direction
    #[tool(description = "Get about ten recent or upcoming arrivals and departures for an airport. Optionally filter by direction (arrival or departure).")]
    async fn get_flight_board(
        &self,
        #[tool(aggr)] params: FlightBoardParams,
    ) -> String {
        info!(icao = %params.icao, direction = params.direction.as_deref(), "Flight board request received");

        let code = match params.icao.parse::<IcaoCode>() {
            Ok(code) => code,
            Err(e) => {
                warn!(error = %e, "Rejected flight board request");
                return error_json(e.to_string());
            }
        };
        let filter = match params.direction.as_deref().map(str::parse::<FlightFilter>).transpose() {
            Ok(filter) => filter.unwrap_or_default(),
            Err(e) => return error_json(e.to_string()),
        };

        let flights = match self.client.fetch_flights(&code).await {
            Ok(raw) => self.normalizer.flights(&raw),
            Err(e) => {
                error!("Flight board failed: {}", e);
                return error_json(format!("Flight board failed: {}", e));
            }
        };
        debug!(flights = flights.len(), "Flight board parsed");

        let visible = filter.apply(&flights);
        let board = FlightBoard {
            icao: code.to_string(),
            direction: filter.label(),
            total_flights: visible.len(),
            flights: visible,
        };
        serde_json::to_string_pretty(&board)
            .unwrap_or_else(|e| error_json(format!("Failed to serialize results: {}", e)))
    }
}

#[tool(tool_box)]
impl ServerHandler for AirportServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some("An airport explorer backed by a generative AI service. Provides search-grounded airport briefings and flight boards by ICAO code, returned as JSON.".into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = AirportServer::init_logging() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    info!("Starting MCP Airport Server");

    let server = AirportServer::new(GeminiClient::from_env()?)?;
    let transport = stdio();

    let service = server.serve(transport).await?;
    info!("MCP service started, waiting for requests");

    service.waiting().await?;

    info!("MCP service shutting down");
    Ok(())
}
