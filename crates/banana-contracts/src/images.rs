use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DOWNLOAD_FILE_PREFIX: &str = "nano-banana";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "3:4")]
    Tall,
    #[serde(rename = "4:3")]
    Standard,
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "16:9")]
    Landscape,
}

impl AspectRatio {
    /// Picker order.
    pub const ALL: [AspectRatio; 5] = [
        AspectRatio::Square,
        AspectRatio::Landscape,
        AspectRatio::Portrait,
        AspectRatio::Standard,
        AspectRatio::Tall,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Tall => "3:4",
            AspectRatio::Standard => "4:3",
            AspectRatio::Portrait => "9:16",
            AspectRatio::Landscape => "16:9",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AspectRatio::Square => "Square",
            AspectRatio::Tall => "Tall",
            AspectRatio::Standard => "Standard",
            AspectRatio::Portrait => "Portrait",
            AspectRatio::Landscape => "Landscape",
        }
    }

    /// Width and height terms of the ratio, e.g. `(16, 9)`.
    pub fn terms(self) -> (u32, u32) {
        match self {
            AspectRatio::Square => (1, 1),
            AspectRatio::Tall => (3, 4),
            AspectRatio::Standard => (4, 3),
            AspectRatio::Portrait => (9, 16),
            AspectRatio::Landscape => (16, 9),
        }
    }

    /// Accepts the wire form (`16:9`) or the picker label (`landscape`).
    pub fn from_label_or_ratio(raw: &str) -> Result<Self, UnknownAspectRatio> {
        let trimmed = raw.trim();
        if let Ok(ratio) = trimmed.parse::<AspectRatio>() {
            return Ok(ratio);
        }
        AspectRatio::ALL
            .into_iter()
            .find(|ratio| ratio.label().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownAspectRatio(raw.to_string()))
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported aspect ratio '{0}' (expected one of 1:1, 3:4, 4:3, 9:16, 16:9)")]
pub struct UnknownAspectRatio(pub String);

impl FromStr for AspectRatio {
    type Err = UnknownAspectRatio;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        AspectRatio::ALL
            .into_iter()
            .find(|ratio| ratio.as_str() == trimmed)
            .ok_or_else(|| UnknownAspectRatio(raw.to_string()))
    }
}

/// Encoded image bytes exactly as the client handed them over.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct ImagePayload {
    bytes: Vec<u8>,
    mime_type: Option<String>,
}

impl ImagePayload {
    pub fn new(bytes: Vec<u8>, mime_type: Option<String>) -> Self {
        Self { bytes, mime_type }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImagePayload")
            .field("len", &self.bytes.len())
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub id: String,
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
    pub image_data: ImagePayload,
    pub created_at: DateTime<Utc>,
}

impl GeneratedImage {
    pub fn download_file_name(&self) -> String {
        download_file_name(&self.id)
    }
}

pub fn download_file_name(id: &str) -> String {
    format!("{DOWNLOAD_FILE_PREFIX}-{id}.png")
}

/// Hands out creation-timestamp ids (milliseconds since the epoch) that never
/// repeat within one allocator, even when two records land in the same
/// millisecond.
#[derive(Debug, Default)]
pub struct IdAllocator {
    last: Option<i64>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self, created_at: DateTime<Utc>) -> String {
        let stamp = created_at.timestamp_millis();
        let id = match self.last {
            Some(last) if stamp <= last => last + 1,
            _ => stamp,
        };
        self.last = Some(id);
        id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn aspect_ratio_parses_wire_form_and_labels() {
        assert_eq!("16:9".parse::<AspectRatio>(), Ok(AspectRatio::Landscape));
        assert_eq!(" 3:4 ".parse::<AspectRatio>(), Ok(AspectRatio::Tall));
        assert_eq!(
            AspectRatio::from_label_or_ratio("portrait"),
            Ok(AspectRatio::Portrait)
        );
        assert!("2:1".parse::<AspectRatio>().is_err());
        assert!(AspectRatio::from_label_or_ratio("wide").is_err());
    }

    #[test]
    fn aspect_ratio_serializes_as_wire_form() -> anyhow::Result<()> {
        assert_eq!(serde_json::to_string(&AspectRatio::Portrait)?, "\"9:16\"");
        let parsed: AspectRatio = serde_json::from_str("\"4:3\"")?;
        assert_eq!(parsed, AspectRatio::Standard);
        assert_eq!(AspectRatio::default(), AspectRatio::Square);
        Ok(())
    }

    #[test]
    fn picker_order_matches_generator_input() {
        let order: Vec<&str> = AspectRatio::ALL.iter().map(|r| r.as_str()).collect();
        assert_eq!(order, vec!["1:1", "16:9", "9:16", "4:3", "3:4"]);
    }

    #[test]
    fn id_allocator_stays_monotonic_within_one_millisecond() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let mut ids = IdAllocator::new();
        assert_eq!(ids.next_id(at), "1700000000000");
        assert_eq!(ids.next_id(at), "1700000000001");
        let later = Utc.timestamp_millis_opt(1_700_000_000_500).unwrap();
        assert_eq!(ids.next_id(later), "1700000000500");
    }

    #[test]
    fn download_name_derives_from_id() {
        let image = GeneratedImage {
            id: "1700000000000".to_string(),
            prompt: "a red cube".to_string(),
            aspect_ratio: AspectRatio::Square,
            image_data: ImagePayload::new(vec![1, 2, 3], None),
            created_at: Utc::now(),
        };
        assert_eq!(image.download_file_name(), "nano-banana-1700000000000.png");
    }
}
