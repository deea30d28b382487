//! CLI interface for skyway-explorer

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;
use skyway_explorer::gemini::{decode_data_uri, encode_data_uri};
use skyway_explorer::orchestrator::{EventReceiver, SearchState};
use skyway_explorer::render::{render_panel, render_state};
use skyway_explorer::{
    AirportGateway, AirportRecord, Category, Event, Explorer, FlightFilter, FlightRecord, GeminiClient,
    GeminiConfig, ImageSlot,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "skyway")]
#[command(about = "Explore airports with a generative AI service")]
#[command(version)]
pub struct Cli {
    /// API key for the AI service
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,
    /// Override the service base URL
    #[arg(long, global = true)]
    pub base_url: Option<String>,
    /// Model used for briefings and flight boards
    #[arg(long, global = true)]
    pub text_model: Option<String>,
    /// Model used for image generation and editing
    #[arg(long, global = true)]
    pub image_model: Option<String>,
    /// Request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Look up an airport and print everything once all fetches finish
    Explore {
        /// ICAO code (3-4 characters)
        code: String,
        /// Only print this panel (flights, services, fuel, restaurants, rentals, reviews)
        #[arg(short, long)]
        category: Option<String>,
        /// Flight board filter (all, arrival, departure)
        #[arg(short, long, default_value = "all")]
        filter: String,
        /// Directory to write the generated PNGs to
        #[arg(long)]
        save_images: Option<PathBuf>,
        /// Output file for JSON results
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Edit a PNG with a free-text instruction
    Edit {
        /// Input PNG
        #[arg(short, long)]
        input: PathBuf,
        /// What to change
        #[arg(short, long)]
        prompt: String,
        /// Where to write the result
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Interactive session
    Shell,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExploreOutput<'a> {
    airport: &'a AirportRecord,
    flights: &'a [FlightRecord],
    saved_images: Vec<PathBuf>,
}

/// One line of shell input
#[derive(Debug, PartialEq)]
enum ShellCommand {
    Search(String),
    Tab(Category),
    Filter(FlightFilter),
    Open(ImageSlot),
    Edit(Option<String>),
    Suggest(usize),
    Apply,
    Cancel,
    Dismiss,
    Show,
    Help,
    Quit,
}

const SHELL_HELP: &str = "\
commands:
  search <ICAO>        start a new search
  tab <category>       flights | services | fuel | restaurants | rentals | reviews
  filter <direction>   all | arrival | departure
  open <slot>          open the image editor on main | fbo | aerial
  edit [instruction]   send an edit (uses the current draft when empty)
  suggest <n>          use quick suggestion n as the draft
  apply | cancel       commit or discard the edited image
  dismiss              clear the alert
  show | help | quit";

fn parse_shell_command(line: &str) -> Result<ShellCommand, String> {
    let line = line.trim();
    let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();

    let command = match verb.to_lowercase().as_str() {
        "search" | "s" if !rest.is_empty() => ShellCommand::Search(rest.to_string()),
        "tab" | "t" => ShellCommand::Tab(rest.parse().map_err(|e| format!("{}", e))?),
        "filter" | "f" => ShellCommand::Filter(rest.parse().map_err(|e| format!("{}", e))?),
        "open" => ShellCommand::Open(rest.parse().map_err(|e| format!("{}", e))?),
        "edit" | "e" => ShellCommand::Edit(Some(rest.to_string()).filter(|s| !s.is_empty())),
        "suggest" => {
            let n: usize = rest.parse().map_err(|_| format!("Invalid suggestion number: {}", rest))?;
            if n == 0 {
                return Err("Suggestions are numbered from 1".to_string());
            }
            ShellCommand::Suggest(n - 1)
        }
        "apply" => ShellCommand::Apply,
        "cancel" => ShellCommand::Cancel,
        "dismiss" => ShellCommand::Dismiss,
        "show" | "" => ShellCommand::Show,
        "help" | "?" => ShellCommand::Help,
        "quit" | "exit" | "q" => ShellCommand::Quit,
        _ => return Err(format!("Unknown command: {}", line)),
    };
    Ok(command)
}

fn init_logging(verbose: bool) {
    let default_directive = if verbose { "skyway_explorer=debug" } else { "skyway_explorer=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn build_config(cli: &Cli) -> anyhow::Result<GeminiConfig> {
    let mut config = match &cli.api_key {
        Some(key) => GeminiConfig::new(key.clone()),
        None => GeminiConfig::from_env()?,
    };
    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url.clone();
    }
    if let Some(model) = &cli.text_model {
        config.text_model = model.clone();
    }
    if let Some(model) = &cli.image_model {
        config.image_model = model.clone();
    }
    if let Some(secs) = cli.timeout {
        config.timeout = Duration::from_secs(secs);
    }
    Ok(config)
}

fn save_images(state: &SearchState, dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let code = state.code.as_ref().map(|c| c.as_str()).unwrap_or("airport");
    let gallery = state.gallery();

    let mut saved = Vec::new();
    for slot in ImageSlot::ALL {
        if let Some(reference) = gallery.get(slot) {
            let path = dir.join(format!("{}_{}.png", code, slot.key()));
            fs::write(&path, decode_data_uri(reference)?)?;
            saved.push(path);
        }
    }
    Ok(saved)
}

async fn run_explore(
    client: GeminiClient,
    code: String,
    category: Option<String>,
    filter: String,
    save_dir: Option<PathBuf>,
    json: Option<PathBuf>,
) -> anyhow::Result<()> {
    let filter = filter.parse::<FlightFilter>()?;
    let category = category.map(|c| c.parse::<Category>()).transpose()?;

    let (mut explorer, mut events) = Explorer::new(client)?;
    explorer.dispatch(Event::FilterChanged(filter));

    eprintln!("Exploring {}...", code.to_uppercase());
    let state = explorer.search(&code, &mut events).await;

    if state.generation == 0 {
        bail!("Invalid ICAO code: {:?} (expected 3-4 letters or digits)", code);
    }
    if let Some(alert) = &state.alert {
        bail!("{}", alert);
    }
    let Some(airport) = &state.airport else {
        bail!("No airport data received");
    };

    match category {
        Some(category) => {
            let mut view = state.clone();
            view.category = category;
            println!("{}", render_panel(&view, airport));
        }
        None => {
            println!("{}", render_state(state));
            for category in Category::ALL.into_iter().skip(1) {
                let mut view = state.clone();
                view.category = category;
                println!("{}", render_panel(&view, airport));
            }
        }
    }

    let saved = match &save_dir {
        Some(dir) => save_images(state, dir)?,
        None => Vec::new(),
    };
    for path in &saved {
        eprintln!("Saved {}", path.display());
    }

    if let Some(output_file) = json {
        let output = ExploreOutput {
            airport,
            flights: &state.flights,
            saved_images: saved,
        };
        fs::write(&output_file, serde_json::to_string_pretty(&output)?)?;
        eprintln!("Results saved to {}", output_file.display());
    }
    Ok(())
}

async fn run_edit(client: GeminiClient, input: PathBuf, prompt: String, output: PathBuf) -> anyhow::Result<()> {
    let bytes = fs::read(&input).with_context(|| format!("reading {}", input.display()))?;
    eprintln!("Reimagining {}...", input.display());

    let edited = client.edit_image(&encode_data_uri(&bytes), &prompt).await?;
    fs::write(&output, decode_data_uri(&edited)?)?;
    println!("Edited image saved to {}", output.display());
    Ok(())
}

async fn run_shell(client: GeminiClient) -> anyhow::Result<()> {
    let (mut explorer, mut events): (Explorer<GeminiClient>, EventReceiver) = Explorer::new(client)?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("SkyWay Airport Explorer. Type 'help' for commands.");
    println!("{}", render_state(explorer.state()));

    loop {
        tokio::select! {
            Some(event) = events.recv() => {
                explorer.dispatch(event);
                println!("{}", render_state(explorer.state()));
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let event = match parse_shell_command(&line) {
                    Ok(ShellCommand::Quit) => break,
                    Ok(ShellCommand::Help) => {
                        println!("{}", SHELL_HELP);
                        continue;
                    }
                    Ok(ShellCommand::Show) => None,
                    Ok(ShellCommand::Search(code)) => Some(Event::Submit(code)),
                    Ok(ShellCommand::Tab(category)) => Some(Event::CategorySelected(category)),
                    Ok(ShellCommand::Filter(filter)) => Some(Event::FilterChanged(filter)),
                    Ok(ShellCommand::Open(slot)) => Some(Event::EditorOpened(slot)),
                    Ok(ShellCommand::Edit(text)) => {
                        if let Some(text) = text {
                            explorer.dispatch(Event::EditDraftChanged(text));
                        }
                        Some(Event::EditSubmitted)
                    }
                    Ok(ShellCommand::Suggest(index)) => {
                        match skyway_explorer::EDIT_SUGGESTIONS.get(index) {
                            Some(text) => Some(Event::EditDraftChanged(text.to_string())),
                            None => {
                                println!("No suggestion #{}", index + 1);
                                continue;
                            }
                        }
                    }
                    Ok(ShellCommand::Apply) => Some(Event::EditApplied),
                    Ok(ShellCommand::Cancel) => Some(Event::EditCancelled),
                    Ok(ShellCommand::Dismiss) => Some(Event::AlertDismissed),
                    Err(message) => {
                        println!("{}", message);
                        continue;
                    }
                };
                if let Some(event) = event {
                    explorer.dispatch(event);
                }
                println!("{}", render_state(explorer.state()));
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let client = GeminiClient::new(build_config(&cli)?)?;

    match cli.command {
        Commands::Explore {
            code,
            category,
            filter,
            save_images,
            json,
        } => run_explore(client, code, category, filter, save_images, json).await,
        Commands::Edit { input, prompt, output } => run_edit(client, input, prompt, output).await,
        Commands::Shell => run_shell(client).await,
    }
}
