use std::env;

pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_REQUEST_TIMEOUT_S: f64 = 90.0;

#[derive(Debug, Clone, PartialEq)]
pub struct GeminiSettings {
    pub api_base: String,
    pub api_key: Option<String>,
    pub request_timeout_s: f64,
}

/// Studio settings resolved from the environment; CLI flags override fields
/// afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct StudioConfig {
    pub provider: String,
    pub model: String,
    pub gemini: GeminiSettings,
}

impl StudioConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// `lookup` returns the raw value of an environment key.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let api_key = non_empty("GEMINI_API_KEY").or_else(|| non_empty("GOOGLE_API_KEY"));
        let api_base = non_empty("GEMINI_API_BASE")
            .map(|value| value.trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_GEMINI_API_BASE.to_string());
        let request_timeout_s = non_empty("BANANA_REQUEST_TIMEOUT")
            .and_then(|value| value.parse::<f64>().ok())
            .filter(|value| value.is_finite())
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_S)
            .clamp(5.0, 300.0);

        let provider = non_empty("BANANA_IMAGE_PROVIDER")
            .map(|value| value.to_ascii_lowercase())
            .unwrap_or_else(|| {
                if api_key.is_some() {
                    "gemini".to_string()
                } else {
                    "dryrun".to_string()
                }
            });
        let model =
            non_empty("BANANA_IMAGE_MODEL").unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string());

        Self {
            provider,
            model,
            gemini: GeminiSettings {
                api_base,
                api_key,
                request_timeout_s,
            },
        }
    }

    pub fn with_provider(mut self, provider: Option<String>) -> Self {
        if let Some(provider) = provider.filter(|value| !value.trim().is_empty()) {
            self.provider = provider.trim().to_ascii_lowercase();
        }
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        if let Some(model) = model.filter(|value| !value.trim().is_empty()) {
            self.model = model.trim().to_string();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> StudioConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        StudioConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_to_dryrun_without_a_key() {
        let config = config_from(&[]);
        assert_eq!(config.provider, "dryrun");
        assert_eq!(config.model, DEFAULT_IMAGE_MODEL);
        assert_eq!(config.gemini.api_base, DEFAULT_GEMINI_API_BASE);
        assert_eq!(config.gemini.request_timeout_s, DEFAULT_REQUEST_TIMEOUT_S);
        assert!(config.gemini.api_key.is_none());
    }

    #[test]
    fn api_key_selects_gemini_and_google_key_is_a_fallback() {
        let config = config_from(&[("GOOGLE_API_KEY", "g-key"), ("GEMINI_API_KEY", "  ")]);
        assert_eq!(config.provider, "gemini");
        assert_eq!(config.gemini.api_key.as_deref(), Some("g-key"));
    }

    #[test]
    fn env_overrides_are_normalized() {
        let config = config_from(&[
            ("GEMINI_API_BASE", "http://localhost:8080/v1beta/"),
            ("BANANA_IMAGE_PROVIDER", "DryRun"),
            ("BANANA_REQUEST_TIMEOUT", "1"),
        ]);
        assert_eq!(config.gemini.api_base, "http://localhost:8080/v1beta");
        assert_eq!(config.provider, "dryrun");
        assert_eq!(config.gemini.request_timeout_s, 5.0);
    }

    #[test]
    fn flags_override_environment() {
        let config = config_from(&[("BANANA_IMAGE_MODEL", "env-model")])
            .with_provider(Some(" Gemini ".to_string()))
            .with_model(Some("flag-model".to_string()))
            .with_model(Some("   ".to_string()));
        assert_eq!(config.provider, "gemini");
        assert_eq!(config.model, "flag-model");
    }
}
