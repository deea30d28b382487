//! Search orchestration
//!
//! A search runs in two stages. The metadata request is awaited first;
//! when it succeeds, the image and flight requests start together and
//! resolve in any order. Each stage has its own loading flag and its own
//! failure policy:
//!
//! - metadata failure aborts the search and raises an alert,
//! - image or flight failure just leaves that part of the view empty.
//!
//! [`SearchState::apply`] is the pure transition function; it returns the
//! [`Effect`]s to run. [`Explorer`] runs them on the tokio runtime and feeds
//! their results back as [`Event`]s. Every search bumps a generation
//! counter and results tagged with an older generation are dropped, so a
//! slow response from a superseded search never overwrites a newer one.

use crate::client::AirportGateway;
use crate::edit::ImageEditSession;
use crate::gemini::image_prompt;
use crate::normalize::ResponseNormalizer;
use crate::{
    AirportRecord, Category, ExplorerError, FlightFilter, FlightRecord, IcaoCode, ImageSet, ImageSlot,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Shown when the metadata stage fails
pub const METADATA_ALERT: &str = "Error fetching airport details. Please check the code and try again.";

/// Everything the presentation layer reads
#[derive(Debug, Clone, Default)]
pub struct SearchState {
    pub generation: u64,
    pub code: Option<IcaoCode>,
    pub airport: Option<AirportRecord>,
    pub images: Option<ImageSet>,
    pub flights: Vec<FlightRecord>,
    pub metadata_loading: bool,
    pub images_loading: bool,
    pub flights_loading: bool,
    pub category: Category,
    pub filter: FlightFilter,
    pub alert: Option<String>,
    pub editor: Option<ImageEditSession>,
    sessions_opened: u64,
}

/// Inputs to the state machine: user actions and fetch completions
#[derive(Debug)]
pub enum Event {
    Submit(String),
    MetadataResolved {
        generation: u64,
        result: Result<AirportRecord, ExplorerError>,
    },
    ImagesResolved {
        generation: u64,
        result: Result<ImageSet, ExplorerError>,
    },
    FlightsResolved {
        generation: u64,
        result: Result<Vec<FlightRecord>, ExplorerError>,
    },
    CategorySelected(Category),
    FilterChanged(FlightFilter),
    AlertDismissed,
    EditorOpened(ImageSlot),
    EditDraftChanged(String),
    EditSubmitted,
    ImageEdited {
        session: u64,
        result: Result<String, ExplorerError>,
    },
    EditApplied,
    EditCancelled,
}

/// Work requested by a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    FetchMetadata {
        generation: u64,
        code: IcaoCode,
    },
    FetchImages {
        generation: u64,
        code: IcaoCode,
        airport_name: String,
    },
    FetchFlights {
        generation: u64,
        code: IcaoCode,
    },
    EditImage {
        session: u64,
        image: String,
        instruction: String,
    },
}

impl SearchState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event and return the effects it asks for
    pub fn apply(&mut self, event: Event) -> Vec<Effect> {
        match event {
            Event::Submit(input) => self.submit(&input),
            Event::MetadataResolved { generation, result } => self.metadata_resolved(generation, result),
            Event::ImagesResolved { generation, result } => {
                if self.is_current(generation, self.images_loading, "images") {
                    self.images_loading = false;
                    match result {
                        Ok(images) => self.images = Some(images),
                        Err(e) => warn!(generation, error = %e, "Image generation failed"),
                    }
                }
                Vec::new()
            }
            Event::FlightsResolved { generation, result } => {
                if self.is_current(generation, self.flights_loading, "flights") {
                    self.flights_loading = false;
                    match result {
                        Ok(flights) => self.flights = flights,
                        Err(e) => warn!(generation, error = %e, "Flight fetch failed"),
                    }
                }
                Vec::new()
            }
            Event::CategorySelected(category) => {
                self.category = category;
                Vec::new()
            }
            Event::FilterChanged(filter) => {
                self.filter = filter;
                Vec::new()
            }
            Event::AlertDismissed => {
                self.alert = None;
                Vec::new()
            }
            Event::EditorOpened(slot) => {
                self.open_editor(slot);
                Vec::new()
            }
            Event::EditDraftChanged(text) => {
                if let Some(editor) = self.editor.as_mut() {
                    editor.set_draft(text);
                }
                Vec::new()
            }
            Event::EditSubmitted => self
                .editor
                .as_mut()
                .and_then(|editor| {
                    let session = editor.id();
                    editor.begin_edit().map(|request| Effect::EditImage {
                        session,
                        image: request.image,
                        instruction: request.instruction,
                    })
                })
                .into_iter()
                .collect(),
            Event::ImageEdited { session, result } => {
                match self.editor.as_mut() {
                    Some(editor) if editor.id() == session => editor.finish_edit(result),
                    _ => debug!(session, "Discarding edit result for closed session"),
                }
                Vec::new()
            }
            Event::EditApplied => {
                if let Some(editor) = self.editor.take() {
                    let (slot, image) = editor.commit();
                    if let Some(images) = self.images.as_mut() {
                        info!(slot = slot.key(), "Applying edited image to gallery");
                        images.set(slot, image);
                    }
                }
                Vec::new()
            }
            Event::EditCancelled => {
                self.editor = None;
                Vec::new()
            }
        }
    }

    fn submit(&mut self, input: &str) -> Vec<Effect> {
        let code = match input.parse::<IcaoCode>() {
            Ok(code) => code,
            Err(e) => {
                debug!(error = %e, "Ignoring search submit");
                return Vec::new();
            }
        };

        self.generation += 1;
        info!(icao = %code, generation = self.generation, "Starting airport search");

        self.code = Some(code.clone());
        self.airport = None;
        self.images = None;
        self.flights.clear();
        self.metadata_loading = true;
        self.images_loading = true;
        self.flights_loading = true;
        self.category = Category::default();
        self.alert = None;
        self.editor = None;

        vec![Effect::FetchMetadata {
            generation: self.generation,
            code,
        }]
    }

    fn metadata_resolved(&mut self, generation: u64, result: Result<AirportRecord, ExplorerError>) -> Vec<Effect> {
        if !self.is_current(generation, self.metadata_loading, "metadata") {
            return Vec::new();
        }
        self.metadata_loading = false;

        match result {
            Ok(airport) => {
                info!(generation, name = %airport.name, "Airport metadata ready");
                let code = airport.icao.clone();
                let airport_name = airport.name.clone();
                self.airport = Some(airport);
                vec![
                    Effect::FetchImages {
                        generation,
                        code: code.clone(),
                        airport_name,
                    },
                    Effect::FetchFlights { generation, code },
                ]
            }
            Err(e) => {
                warn!(generation, error = %e, "Airport search failed");
                self.alert = Some(METADATA_ALERT.to_string());
                self.images_loading = false;
                self.flights_loading = false;
                Vec::new()
            }
        }
    }

    fn is_current(&self, generation: u64, pending: bool, stage: &str) -> bool {
        if generation != self.generation || !pending {
            debug!(
                generation,
                current = self.generation,
                stage,
                "Discarding stale result"
            );
            return false;
        }
        true
    }

    fn open_editor(&mut self, slot: ImageSlot) {
        let Some(image) = self.images.as_ref().and_then(|images| images.get(slot)) else {
            debug!(slot = slot.key(), "No image to edit in slot");
            return;
        };
        let image = image.to_string();
        self.sessions_opened += 1;
        self.editor = Some(ImageEditSession::open(self.sessions_opened, slot, image));
    }

    /// Flights passing the current direction filter, in board order
    pub fn visible_flights(&self) -> Vec<&FlightRecord> {
        self.filter.apply(&self.flights)
    }

    /// Gallery contents; a failed or pending image stage shows as all empty
    pub fn gallery(&self) -> ImageSet {
        self.images.clone().unwrap_or_default()
    }

    pub fn is_loading(&self) -> bool {
        self.metadata_loading || self.images_loading || self.flights_loading
    }

    /// Nothing in flight for the current search or editor
    pub fn is_settled(&self) -> bool {
        !self.is_loading() && !self.editor.as_ref().is_some_and(|e| e.is_editing())
    }
}

/// Generate the three gallery images concurrently.
///
/// All or nothing: the first failure fails the whole set.
pub async fn generate_image_set<G: AirportGateway>(
    gateway: &G,
    code: &IcaoCode,
    airport_name: &str,
) -> Result<ImageSet, ExplorerError> {
    let [main, fbo, aerial] = ImageSlot::ALL.map(|slot| image_prompt(slot, code, airport_name));

    let (main, fbo, aerial) = tokio::try_join!(
        gateway.generate_image(&main),
        gateway.generate_image(&fbo),
        gateway.generate_image(&aerial),
    )?;

    Ok(ImageSet {
        main: Some(main),
        fbo: Some(fbo),
        aerial: Some(aerial),
    })
}

pub type EventReceiver = mpsc::UnboundedReceiver<Event>;

/// Async driver around [`SearchState`]
pub struct Explorer<G: AirportGateway> {
    gateway: Arc<G>,
    normalizer: Arc<ResponseNormalizer>,
    state: SearchState,
    events: mpsc::UnboundedSender<Event>,
}

impl<G: AirportGateway> Explorer<G> {
    /// Create the driver and the receiver its completions arrive on.
    ///
    /// Feed every received event back through [`Explorer::dispatch`].
    pub fn new(gateway: G) -> Result<(Self, EventReceiver), ExplorerError> {
        Self::with_shared(Arc::new(gateway))
    }

    pub fn with_shared(gateway: Arc<G>) -> Result<(Self, EventReceiver), ExplorerError> {
        let (events, receiver) = mpsc::unbounded_channel();
        let explorer = Self {
            gateway,
            normalizer: Arc::new(ResponseNormalizer::new()?),
            state: SearchState::new(),
            events,
        };
        Ok((explorer, receiver))
    }

    pub fn state(&self) -> &SearchState {
        &self.state
    }

    /// Apply an event and start whatever work it requests
    pub fn dispatch(&mut self, event: Event) {
        for effect in self.state.apply(event) {
            self.spawn(effect);
        }
    }

    /// Submit a search and drive it until every stage has resolved
    pub async fn search(&mut self, code: &str, receiver: &mut EventReceiver) -> &SearchState {
        self.dispatch(Event::Submit(code.to_string()));
        self.run_until_settled(receiver).await
    }

    pub async fn run_until_settled(&mut self, receiver: &mut EventReceiver) -> &SearchState {
        while !self.state.is_settled() {
            match receiver.recv().await {
                Some(event) => self.dispatch(event),
                None => break,
            }
        }
        &self.state
    }

    fn spawn(&self, effect: Effect) {
        let gateway = Arc::clone(&self.gateway);
        let normalizer = Arc::clone(&self.normalizer);
        let events = self.events.clone();
        debug!(?effect, "Spawning effect");

        tokio::spawn(async move {
            let event = match effect {
                Effect::FetchMetadata { generation, code } => {
                    let result = gateway
                        .fetch_metadata(&code)
                        .await
                        .map(|raw| normalizer.airport_record(&code, raw));
                    Event::MetadataResolved { generation, result }
                }
                Effect::FetchImages {
                    generation,
                    code,
                    airport_name,
                } => {
                    let result = generate_image_set(gateway.as_ref(), &code, &airport_name).await;
                    Event::ImagesResolved { generation, result }
                }
                Effect::FetchFlights { generation, code } => {
                    let result = gateway
                        .fetch_flights(&code)
                        .await
                        .map(|raw| normalizer.flights(&raw));
                    Event::FlightsResolved { generation, result }
                }
                Effect::EditImage {
                    session,
                    image,
                    instruction,
                } => {
                    let result = gateway.edit_image(&image, &instruction).await;
                    Event::ImageEdited { session, result }
                }
            };

            if events.send(event).is_err() {
                debug!("Event receiver dropped; discarding result");
            }
        });
    }
}
