//! Iterative image editing against a single gallery slot
//!
//! A session works on a private preview. Edits replace the preview only;
//! the gallery changes when the session is committed.

use crate::{ExplorerError, ImageSlot};
use tracing::{debug, warn};

/// Quick instructions offered next to the free-text prompt
pub const EDIT_SUGGESTIONS: [&str; 4] = ["Vintage look", "Night time", "Golden hour", "Summer vibe"];

/// Work item handed to the gateway for one edit round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditRequest {
    pub image: String,
    pub instruction: String,
}

#[derive(Debug, Clone)]
pub struct ImageEditSession {
    id: u64,
    slot: ImageSlot,
    original: String,
    preview: String,
    draft: String,
    editing: bool,
    error: Option<String>,
}

impl ImageEditSession {
    pub fn open(id: u64, slot: ImageSlot, image: String) -> Self {
        debug!(session = id, slot = slot.key(), "Opening image edit session");
        Self {
            id,
            slot,
            original: image.clone(),
            preview: image,
            draft: String::new(),
            editing: false,
            error: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn slot(&self) -> ImageSlot {
        self.slot
    }

    /// Image the session was opened with
    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn preview(&self) -> &str {
        &self.preview
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn is_editing(&self) -> bool {
        self.editing
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Copy one of [`EDIT_SUGGESTIONS`] into the draft
    pub fn pick_suggestion(&mut self, index: usize) -> bool {
        match EDIT_SUGGESTIONS.get(index) {
            Some(suggestion) => {
                self.draft = suggestion.to_string();
                true
            }
            None => false,
        }
    }

    /// Start an edit round from the current preview and draft.
    ///
    /// `None` when the draft is blank or a round is already in flight.
    pub fn begin_edit(&mut self) -> Option<EditRequest> {
        if self.editing || self.draft.trim().is_empty() {
            return None;
        }
        self.editing = true;
        self.error = None;
        Some(EditRequest {
            image: self.preview.clone(),
            instruction: self.draft.clone(),
        })
    }

    pub fn finish_edit(&mut self, result: Result<String, ExplorerError>) {
        self.editing = false;
        match result {
            Ok(image) => {
                debug!(session = self.id, "Image edit applied to preview");
                self.preview = image;
                self.draft.clear();
            }
            Err(e) => {
                warn!(session = self.id, error = %e, "Image edit failed");
                self.error = Some(e.to_string());
            }
        }
    }

    /// Close the session, yielding the slot and the image to store in it
    pub fn commit(self) -> (ImageSlot, String) {
        (self.slot, self.preview)
    }
}
