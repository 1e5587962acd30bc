use std::collections::BTreeMap;

use serde_json::Value;

use super::command_registry::{
    CommandSpec, ASPECT_PRESET_COMMANDS, NO_ARG_COMMANDS, RATIO_COMMAND, TARGET_COMMANDS,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub action: String,
    pub raw: String,
    pub prompt: Option<String>,
    pub command_args: BTreeMap<String, Value>,
}

impl Intent {
    fn new(action: &str, raw: &str) -> Self {
        Self {
            action: action.to_string(),
            raw: raw.to_string(),
            prompt: None,
            command_args: BTreeMap::new(),
        }
    }

    fn with_arg(mut self, key: &str, value: impl Into<String>) -> Self {
        self.command_args
            .insert(key.to_string(), Value::String(value.into()));
        self
    }

    pub fn arg(&self, key: &str) -> Option<&str> {
        self.command_args
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

fn find_action(command: &str, specs: &[CommandSpec]) -> Option<&'static str> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.action)
}

fn split_args(arg: &str) -> Vec<String> {
    if arg.trim().is_empty() {
        return Vec::new();
    }
    match shell_words::split(arg) {
        Ok(parts) => parts
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect(),
        Err(_) => arg.split_whitespace().map(str::to_string).collect(),
    }
}

/// Parses one line of chat input.
///
/// Slash commands map to actions; anything else is a `generate` intent whose
/// prompt is the line as typed.
pub fn parse_intent(text: &str) -> Intent {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return Intent::new("noop", text);
    }

    if let Some(slash_tail) = raw_trimmed.strip_prefix('/') {
        let command_len = slash_tail
            .chars()
            .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
            .count();
        if command_len > 0 {
            let command = slash_tail[..command_len].to_ascii_lowercase();
            let arg = slash_tail[command_len..].trim();

            if command == RATIO_COMMAND.command {
                return Intent::new(RATIO_COMMAND.action, text).with_arg("aspect_ratio", arg);
            }

            if ASPECT_PRESET_COMMANDS.contains(&command.as_str()) {
                return Intent::new(RATIO_COMMAND.action, text).with_arg("aspect_ratio", command);
            }

            if let Some(action) = find_action(&command, TARGET_COMMANDS) {
                let mut parts = split_args(arg).into_iter();
                let mut intent =
                    Intent::new(action, text).with_arg("target", parts.next().unwrap_or_default());
                if action == "download" {
                    let dir = parts.collect::<Vec<String>>().join(" ");
                    intent = intent.with_arg("dir", dir);
                }
                return intent;
            }

            if let Some(action) = find_action(&command, NO_ARG_COMMANDS) {
                return Intent::new(action, text);
            }

            return Intent::new("unknown", text)
                .with_arg("command", command)
                .with_arg("arg", arg);
        }
    }

    let mut intent = Intent::new("generate", text);
    intent.prompt = Some(text.trim_end_matches(['\n', '\r']).to_string());
    intent
}
