use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::history::HistoryStore;
use crate::images::{AspectRatio, GeneratedImage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestPhase {
    Idle,
    InFlight,
}

/// Everything the presentation layer renders. Lives for one session only.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    loading: bool,
    current_image: Option<String>,
    error: Option<String>,
    history: HistoryStore,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn phase(&self) -> RequestPhase {
        if self.loading {
            RequestPhase::InFlight
        } else {
            RequestPhase::Idle
        }
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn current_id(&self) -> Option<&str> {
        self.current_image.as_deref()
    }

    pub fn current(&self) -> Option<&GeneratedImage> {
        self.current_id().and_then(|id| self.history.get(id))
    }

    pub fn begin_request(&mut self) {
        self.loading = true;
        self.error = None;
    }

    /// Makes `image` current and prepends it to history in one step.
    pub fn record_success(&mut self, image: GeneratedImage) {
        self.current_image = Some(image.id.clone());
        self.history.push_front(image);
        self.error = None;
    }

    pub fn record_failure(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn finish_request(&mut self) {
        self.loading = false;
    }

    /// Leaves `error` and history untouched. Returns false for unknown ids.
    pub fn select(&mut self, id: &str) -> bool {
        if !self.history.contains(id) {
            return false;
        }
        self.current_image = Some(id.to_string());
        true
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase(),
            loading: self.loading,
            error: self.error.clone(),
            current_image: self.current().map(ImageSummary::from),
            history: self.history.iter().map(ImageSummary::from).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub phase: RequestPhase,
    pub loading: bool,
    pub error: Option<String>,
    pub current_image: Option<ImageSummary>,
    pub history: Vec<ImageSummary>,
}

/// Render-friendly view of a record; the payload is reduced to its size.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageSummary {
    pub id: String,
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
    pub bytes: usize,
    pub mime_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub file_name: String,
}

impl From<&GeneratedImage> for ImageSummary {
    fn from(image: &GeneratedImage) -> Self {
        Self {
            id: image.id.clone(),
            prompt: image.prompt.clone(),
            aspect_ratio: image.aspect_ratio,
            bytes: image.image_data.len(),
            mime_type: image.image_data.mime_type().map(str::to_string),
            created_at: image.created_at,
            file_name: image.download_file_name(),
        }
    }
}
