//! Engine configuration (layered: code > env > file > defaults).

use std::path::Path;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{DeltaError, Result};
use crate::types::{ChatMessage, Role};

/// Default cap on provider round trips per run.
pub const DEFAULT_MAX_ROUND_TRIPS: usize = 20;
/// Default idle timeout between provider events.
pub const DEFAULT_STREAM_IDLE_TIMEOUT_MS: u64 = 120_000;
/// Result recorded for tools the provider runs itself.
pub const DEFAULT_NATIVE_TOOL_RESULT: &str = "[executed by provider]";

const ENV_MAX_ROUND_TRIPS: &str = "AGENTDELTA_MAX_ROUND_TRIPS";
const ENV_STREAM_IDLE_TIMEOUT_MS: &str = "AGENTDELTA_STREAM_IDLE_TIMEOUT_MS";
const ENV_NATIVE_TOOL_RESULT: &str = "AGENTDELTA_NATIVE_TOOL_RESULT";
const ENV_INSTRUCTION_ROLE: &str = "AGENTDELTA_INSTRUCTION_ROLE";

/// Role given to standing agent instructions prepended to history.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum InstructionRole {
    #[default]
    System,
    Developer,
}

impl InstructionRole {
    pub fn role(self) -> Role {
        match self {
            Self::System => Role::System,
            Self::Developer => Role::Developer,
        }
    }

    pub(crate) fn message(self, text: &str) -> ChatMessage {
        ChatMessage::with_role(self.role(), text)
    }
}

/// Runtime knobs of the run driver and translator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_round_trips: usize,
    /// `0` disables the idle timeout.
    pub stream_idle_timeout_ms: u64,
    pub native_tool_result: serde_json::Value,
    pub instruction_role: InstructionRole,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_round_trips: DEFAULT_MAX_ROUND_TRIPS,
            stream_idle_timeout_ms: DEFAULT_STREAM_IDLE_TIMEOUT_MS,
            native_tool_result: serde_json::Value::String(DEFAULT_NATIVE_TOOL_RESULT.to_string()),
            instruction_role: InstructionRole::default(),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `AGENTDELTA_*` environment variables.
    ///
    /// Loads `.env` first when present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        Self::default().merge_env(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, which maps an env var name to its value.
    pub fn merge_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(value) = lookup(ENV_MAX_ROUND_TRIPS) {
            self.max_round_trips = parse_env(ENV_MAX_ROUND_TRIPS, &value)?;
        }
        if let Some(value) = lookup(ENV_STREAM_IDLE_TIMEOUT_MS) {
            self.stream_idle_timeout_ms = parse_env(ENV_STREAM_IDLE_TIMEOUT_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_NATIVE_TOOL_RESULT) {
            // JSON when it parses, a plain string otherwise.
            self.native_tool_result = serde_json::from_str(&value)
                .unwrap_or(serde_json::Value::String(value));
        }
        if let Some(value) = lookup(ENV_INSTRUCTION_ROLE) {
            self.instruction_role = parse_env(ENV_INSTRUCTION_ROLE, &value)?;
        }
        self.validate()
    }

    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)
            .map_err(|err| DeltaError::Configuration(format!("invalid config: {err}")))?;
        config.validate()
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&source)
    }

    pub fn with_max_round_trips(mut self, max_round_trips: usize) -> Self {
        self.max_round_trips = max_round_trips;
        self
    }

    pub fn with_stream_idle_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.stream_idle_timeout_ms = timeout_ms;
        self
    }

    pub fn with_native_tool_result(mut self, result: impl Into<serde_json::Value>) -> Self {
        self.native_tool_result = result.into();
        self
    }

    pub fn with_instruction_role(mut self, role: InstructionRole) -> Self {
        self.instruction_role = role;
        self
    }

    /// Idle timeout, or `None` when disabled.
    pub fn stream_idle_timeout(&self) -> Option<std::time::Duration> {
        (self.stream_idle_timeout_ms > 0)
            .then(|| std::time::Duration::from_millis(self.stream_idle_timeout_ms))
    }

    pub fn validate(self) -> Result<Self> {
        self.check()?;
        Ok(self)
    }

    /// Reject settings no run can start with.
    pub fn check(&self) -> Result<()> {
        if self.max_round_trips == 0 {
            return Err(DeltaError::Configuration(
                "max_round_trips must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|err| DeltaError::Configuration(format!("{key}={value:?}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_round_trips, 20);
        assert_eq!(config.stream_idle_timeout_ms, 120_000);
        assert_eq!(config.native_tool_result, serde_json::json!("[executed by provider]"));
        assert_eq!(config.instruction_role, InstructionRole::System);
    }

    #[test]
    fn env_overrides_defaults() {
        let config = EngineConfig::default()
            .merge_env(lookup(&[
                ("AGENTDELTA_MAX_ROUND_TRIPS", "3"),
                ("AGENTDELTA_STREAM_IDLE_TIMEOUT_MS", "0"),
                ("AGENTDELTA_NATIVE_TOOL_RESULT", "{\"ok\":true}"),
                ("AGENTDELTA_INSTRUCTION_ROLE", "Developer"),
            ]))
            .unwrap();
        assert_eq!(config.max_round_trips, 3);
        assert_eq!(config.stream_idle_timeout(), None);
        assert_eq!(config.native_tool_result, serde_json::json!({"ok": true}));
        assert_eq!(config.instruction_role, InstructionRole::Developer);
    }

    #[test]
    fn plain_native_result_stays_a_string() {
        let config = EngineConfig::default()
            .merge_env(lookup(&[("AGENTDELTA_NATIVE_TOOL_RESULT", "done elsewhere")]))
            .unwrap();
        assert_eq!(config.native_tool_result, serde_json::json!("done elsewhere"));
    }

    #[test]
    fn invalid_env_values_are_configuration_errors() {
        let err = EngineConfig::default()
            .merge_env(lookup(&[("AGENTDELTA_MAX_ROUND_TRIPS", "many")]))
            .unwrap_err();
        assert!(matches!(err, DeltaError::Configuration(_)));

        let err = EngineConfig::default()
            .merge_env(lookup(&[("AGENTDELTA_MAX_ROUND_TRIPS", "0")]))
            .unwrap_err();
        assert!(matches!(err, DeltaError::Configuration(_)));
    }

    #[test]
    fn toml_fills_missing_fields_with_defaults() {
        let config = EngineConfig::from_toml_str(
            "max_round_trips = 4\ninstruction_role = \"developer\"\n",
        )
        .unwrap();
        assert_eq!(config.max_round_trips, 4);
        assert_eq!(config.instruction_role, InstructionRole::Developer);
        assert_eq!(config.stream_idle_timeout_ms, DEFAULT_STREAM_IDLE_TIMEOUT_MS);
    }

    #[test]
    fn malformed_toml_is_rejected() {
        let err = EngineConfig::from_toml_str("max_round_trips = \"x\"").unwrap_err();
        assert!(matches!(err, DeltaError::Configuration(_)));
    }
}
