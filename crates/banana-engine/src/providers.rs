use std::collections::BTreeMap;
use std::io::Cursor;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use banana_contracts::images::{AspectRatio, ImagePayload};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use reqwest::header::HeaderName;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::config::{GeminiSettings, StudioConfig};

const GEMINI_API_KEY_HEADER: HeaderName = HeaderName::from_static("x-goog-api-key");

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderGenerateRequest {
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
    pub model: String,
}

#[derive(Debug, Clone, Default)]
pub struct ProviderGenerateResponse {
    /// `None` when the service answered without any image data.
    pub image: Option<ImagePayload>,
    pub warnings: Vec<String>,
}

/// Remote image generation behind one blocking call.
pub trait ImageProvider: Send + Sync {
    fn name(&self) -> &str;
    fn generate(&self, request: &ProviderGenerateRequest) -> Result<ProviderGenerateResponse>;
}

#[derive(Default)]
pub struct ImageProviderRegistry {
    providers: BTreeMap<String, Box<dyn ImageProvider>>,
}

impl ImageProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P: ImageProvider + 'static>(&mut self, provider: P) {
        self.providers
            .insert(provider.name().to_string(), Box::new(provider));
    }

    pub fn take(&mut self, name: &str) -> Option<Box<dyn ImageProvider>> {
        self.providers.remove(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }
}

pub fn default_provider_registry(config: &StudioConfig) -> Result<ImageProviderRegistry> {
    let mut providers = ImageProviderRegistry::new();
    providers.register(DryrunProvider);
    providers.register(GeminiProvider::new(&config.gemini)?);
    Ok(providers)
}

/// Offline provider: a solid PNG whose colour is derived from the prompt.
pub struct DryrunProvider;

impl DryrunProvider {
    const LONG_SIDE: u32 = 256;

    fn dims(aspect_ratio: AspectRatio) -> (u32, u32) {
        let (w, h) = aspect_ratio.terms();
        if w >= h {
            (Self::LONG_SIDE, Self::LONG_SIDE * h / w)
        } else {
            (Self::LONG_SIDE * w / h, Self::LONG_SIDE)
        }
    }
}

impl ImageProvider for DryrunProvider {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn generate(&self, request: &ProviderGenerateRequest) -> Result<ProviderGenerateResponse> {
        let (width, height) = Self::dims(request.aspect_ratio);
        let (r, g, b) = color_from_prompt(&request.prompt);
        let image = RgbImage::from_pixel(width, height, Rgb([r, g, b]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .context("dryrun png encode failed")?;
        Ok(ProviderGenerateResponse {
            image: Some(ImagePayload::new(bytes, Some("image/png".to_string()))),
            warnings: Vec::new(),
        })
    }
}

fn color_from_prompt(prompt: &str) -> (u8, u8, u8) {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    let digest = hasher.finalize();
    (digest[0], digest[1], digest[2])
}

pub struct GeminiProvider {
    api_base: String,
    api_key: Option<String>,
    http: HttpClient,
}

impl GeminiProvider {
    pub fn new(settings: &GeminiSettings) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs_f64(settings.request_timeout_s))
            .build()
            .context("failed to build Gemini HTTP client")?;
        Ok(Self {
            api_base: settings.api_base.clone(),
            api_key: settings.api_key.clone(),
            http,
        })
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }

    fn build_payload(request: &ProviderGenerateRequest) -> Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": request.prompt }],
            }],
            "generationConfig": {
                "responseModalities": ["IMAGE"],
                "imageConfig": {
                    "aspectRatio": request.aspect_ratio.as_str(),
                },
            },
        })
    }

    /// First inline image of the first candidate that carries one. Text parts
    /// and finish reasons are surfaced as warnings.
    fn extract_image(response_payload: &Value) -> Result<ProviderGenerateResponse> {
        let mut warnings = Vec::new();
        let candidates = response_payload
            .get("candidates")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        for candidate in &candidates {
            let parts = candidate
                .get("content")
                .and_then(|content| content.get("parts"))
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            for part in parts {
                if let Some(text) = part.get("text").and_then(Value::as_str) {
                    if !text.trim().is_empty() {
                        warnings.push(format!("Gemini text: {}", truncate_text(text.trim(), 256)));
                    }
                }
                let Some(inline) = part
                    .get("inlineData")
                    .or_else(|| part.get("inline_data"))
                    .and_then(Value::as_object)
                else {
                    continue;
                };
                let data = inline
                    .get("data")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                if data.is_empty() {
                    continue;
                }
                let bytes = BASE64
                    .decode(data.as_bytes())
                    .context("Gemini image base64 decode failed")?;
                let mime_type = inline
                    .get("mimeType")
                    .or_else(|| inline.get("mime_type"))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                return Ok(ProviderGenerateResponse {
                    image: Some(ImagePayload::new(bytes, mime_type)),
                    warnings,
                });
            }
            if let Some(reason) = candidate.get("finishReason").and_then(Value::as_str) {
                warnings.push(format!("Gemini finish reason: {reason}"));
            }
        }

        if let Some(reason) = response_payload
            .get("promptFeedback")
            .and_then(|feedback| feedback.get("blockReason"))
            .and_then(Value::as_str)
        {
            warnings.push(format!("Gemini blocked the prompt: {reason}"));
        }

        Ok(ProviderGenerateResponse {
            image: None,
            warnings,
        })
    }
}

impl ImageProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn generate(&self, request: &ProviderGenerateRequest) -> Result<ProviderGenerateResponse> {
        let Some(api_key) = self.api_key.as_deref() else {
            bail!("GEMINI_API_KEY or GOOGLE_API_KEY not set");
        };
        let endpoint = self.endpoint_for_model(&request.model);
        let payload = Self::build_payload(request);
        // Key rides in a header; transport errors drop their URL.
        let response = self
            .http
            .post(&endpoint)
            .header(GEMINI_API_KEY_HEADER, api_key)
            .json(&payload)
            .send()
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("Gemini request failed ({endpoint})"))?;
        let response_payload = response_json_or_error("Gemini", response)?;
        Self::extract_image(&response_payload)
    }
}

fn response_json_or_error(provider: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .map_err(reqwest::Error::without_url)
        .with_context(|| format!("{provider} response body read failed"))?;
    if !status.is_success() {
        bail!(
            "{provider} request failed ({code}): {}",
            error_message_from_body(&body).unwrap_or_else(|| truncate_text(&body, 512))
        );
    }
    let parsed: Value = serde_json::from_str(&body)
        .with_context(|| format!("{provider} returned invalid JSON payload"))?;
    Ok(parsed)
}

/// Google APIs wrap failures as `{"error": {"message": ...}}`.
fn error_message_from_body(body: &str) -> Option<String> {
    let parsed: Value = serde_json::from_str(body).ok()?;
    parsed
        .get("error")
        .and_then(|error| error.get("message"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|message| !message.is_empty())
        .map(|message| truncate_text(message, 512))
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
