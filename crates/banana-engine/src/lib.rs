use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use banana_contracts::events::{EventPayload, EventWriter};
use banana_contracts::images::{AspectRatio, GeneratedImage, IdAllocator};
use banana_contracts::session::{SessionSnapshot, SessionState};
use chrono::Utc;
use serde_json::{json, Map, Value};

pub mod config;
#[cfg(test)]
mod http_stub;
pub mod providers;

use config::StudioConfig;
use providers::{default_provider_registry, ImageProvider, ProviderGenerateRequest};

pub const EMPTY_PAYLOAD_MESSAGE: &str = "No image data received from the model.";
pub const FALLBACK_FAILURE_MESSAGE: &str = "Failed to generate image. Please try again.";

/// Why a generate call never started. State is untouched in both cases.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerateRejected {
    #[error("prompt is empty")]
    EmptyPrompt,
    #[error("a generation request is already in flight")]
    Busy,
}

/// A finished request that produced no record. Surfaced through the session
/// error banner, never propagated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("No image data received from the model.")]
    EmptyPayload,
    #[error("{0}")]
    ClientFailure(String),
}

impl GenerationError {
    fn from_client(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");
        if message.trim().is_empty() {
            Self::ClientFailure(FALLBACK_FAILURE_MESSAGE.to_string())
        } else {
            Self::ClientFailure(message.trim().to_string())
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::EmptyPayload => "empty_payload",
            Self::ClientFailure(_) => "client_failure",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no image with id '{0}' in this session's history")]
pub struct UnknownImage(pub String);

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    Generated(GeneratedImage),
    Failed(GenerationError),
}

struct StudioInner {
    state: SessionState,
    ids: IdAllocator,
}

/// Ends the request if the provider call unwinds, so a panicking client
/// cannot leave the session stuck in flight.
struct RequestGuard<'a> {
    studio: &'a Studio,
    armed: bool,
}

impl RequestGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for RequestGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut inner = self.studio.lock();
        inner.state.record_failure(FALLBACK_FAILURE_MESSAGE);
        inner.state.finish_request();
    }
}

/// Owns one session: the request lifecycle, the history, and the event log.
///
/// At most one generation is in flight. The state lock is not held across the
/// provider call, so readers and re-entrant callers observe `loading == true`
/// for the whole call.
pub struct Studio {
    provider: Box<dyn ImageProvider>,
    model: String,
    events: EventWriter,
    inner: Mutex<StudioInner>,
}

impl Studio {
    pub fn new(
        provider: Box<dyn ImageProvider>,
        model: impl Into<String>,
        events: EventWriter,
    ) -> Self {
        let studio = Self {
            provider,
            model: model.into(),
            events,
            inner: Mutex::new(StudioInner {
                state: SessionState::new(),
                ids: IdAllocator::new(),
            }),
        };
        studio.emit(
            "session_started",
            json!({
                "provider": studio.provider.name(),
                "model": studio.model,
            }),
        );
        studio
    }

    pub fn from_config(config: &StudioConfig, events: EventWriter) -> Result<Self> {
        let mut registry = default_provider_registry(config)?;
        let available = registry.names().join(", ");
        let Some(provider) = registry.take(&config.provider) else {
            bail!(
                "image provider '{}' not registered (available: [{}])",
                config.provider,
                available
            );
        };
        Ok(Self::new(provider, config.model.clone(), events))
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn event_writer(&self) -> &EventWriter {
        &self.events
    }

    fn lock(&self) -> MutexGuard<'_, StudioInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Event log failures must not leave the session stuck in flight.
    fn emit(&self, event_type: &str, payload: Value) {
        let payload: EventPayload = match payload {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let _ = self.events.emit(event_type, payload);
    }

    /// Runs one generation request to completion.
    ///
    /// Rejections happen before any state change. Once started, the request
    /// always ends with `loading == false`; client failures and empty payloads
    /// land in the session error and come back as `GenerationOutcome::Failed`.
    pub fn generate(
        &self,
        prompt: &str,
        aspect_ratio: AspectRatio,
    ) -> Result<GenerationOutcome, GenerateRejected> {
        if prompt.trim().is_empty() {
            return Err(GenerateRejected::EmptyPrompt);
        }
        {
            let mut inner = self.lock();
            if inner.state.is_loading() {
                return Err(GenerateRejected::Busy);
            }
            inner.state.begin_request();
        }
        let in_flight = RequestGuard {
            studio: self,
            armed: true,
        };
        self.emit(
            "generation_started",
            json!({
                "provider": self.provider.name(),
                "model": self.model,
                "prompt": prompt,
                "aspect_ratio": aspect_ratio.as_str(),
            }),
        );

        let request = ProviderGenerateRequest {
            prompt: prompt.to_string(),
            aspect_ratio,
            model: self.model.clone(),
        };
        let started = Instant::now();
        let result = self.provider.generate(&request);
        in_flight.disarm();
        let latency_ms = started.elapsed().as_millis() as u64;

        let (outcome, warnings) = match result {
            Ok(response) => match response.image.filter(|image| !image.is_empty()) {
                Some(image_data) => {
                    let created_at = Utc::now();
                    let mut inner = self.lock();
                    let image = GeneratedImage {
                        id: inner.ids.next_id(created_at),
                        prompt: prompt.to_string(),
                        aspect_ratio,
                        image_data,
                        created_at,
                    };
                    inner.state.record_success(image.clone());
                    inner.state.finish_request();
                    (GenerationOutcome::Generated(image), response.warnings)
                }
                None => (
                    self.fail(GenerationError::EmptyPayload),
                    response.warnings,
                ),
            },
            Err(err) => (self.fail(GenerationError::from_client(&err)), Vec::new()),
        };

        match &outcome {
            GenerationOutcome::Generated(image) => self.emit(
                "image_generated",
                json!({
                    "image_id": image.id,
                    "aspect_ratio": image.aspect_ratio.as_str(),
                    "bytes": image.image_data.len(),
                    "mime_type": image.image_data.mime_type(),
                    "latency_ms": latency_ms,
                    "warnings": warnings,
                }),
            ),
            GenerationOutcome::Failed(error) => self.emit(
                "generation_failed",
                json!({
                    "kind": error.kind(),
                    "error": error.to_string(),
                    "latency_ms": latency_ms,
                    "warnings": warnings,
                }),
            ),
        }
        Ok(outcome)
    }

    fn fail(&self, error: GenerationError) -> GenerationOutcome {
        let mut inner = self.lock();
        inner.state.record_failure(error.to_string());
        inner.state.finish_request();
        GenerationOutcome::Failed(error)
    }

    /// Makes a history record current. History and the error banner are left
    /// as they are.
    pub fn select_from_history(&self, id: &str) -> Result<GeneratedImage, UnknownImage> {
        let selected = {
            let mut inner = self.lock();
            if !inner.state.select(id) {
                return Err(UnknownImage(id.to_string()));
            }
            inner.state.current().cloned()
        };
        let image = selected.ok_or_else(|| UnknownImage(id.to_string()))?;
        self.emit("history_selected", json!({ "image_id": image.id }));
        Ok(image)
    }

    pub fn dismiss_error(&self) {
        self.lock().state.clear_error();
    }

    /// Writes the record's payload unchanged to `dir/nano-banana-{id}.png`.
    pub fn download(&self, id: &str, dir: &Path) -> Result<PathBuf> {
        let image = self
            .image(id)
            .ok_or_else(|| UnknownImage(id.to_string()))?;
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        let path = dir.join(image.download_file_name());
        std::fs::write(&path, image.image_data.bytes())
            .with_context(|| format!("failed to write {}", path.display()))?;
        self.emit(
            "image_downloaded",
            json!({
                "image_id": image.id,
                "path": path.to_string_lossy().to_string(),
                "bytes": image.image_data.len(),
            }),
        );
        Ok(path)
    }

    pub fn image(&self, id: &str) -> Option<GeneratedImage> {
        self.lock().state.history().get(id).cloned()
    }

    /// `0` is the newest record.
    pub fn history_entry(&self, index: usize) -> Option<GeneratedImage> {
        self.lock().state.history().get_index(index).cloned()
    }

    pub fn history(&self) -> Vec<GeneratedImage> {
        self.lock().state.history().iter().cloned().collect()
    }

    pub fn history_len(&self) -> usize {
        self.lock().state.history().len()
    }

    pub fn current_image(&self) -> Option<GeneratedImage> {
        self.lock().state.current().cloned()
    }

    pub fn error(&self) -> Option<String> {
        self.lock().state.error().map(str::to_string)
    }

    pub fn is_loading(&self) -> bool {
        self.lock().state.is_loading()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock().state.snapshot()
    }

    pub fn finish(&self) -> Result<()> {
        let snapshot = self.snapshot();
        let mut payload = EventPayload::new();
        payload.insert(
            "total_images".to_string(),
            Value::Number((snapshot.history.len() as u64).into()),
        );
        payload.insert(
            "current_image_id".to_string(),
            snapshot
                .current_image
                .map(|image| Value::String(image.id))
                .unwrap_or(Value::Null),
        );
        self.events.emit("session_finished", payload)?;
        Ok(())
    }
}
