//! Typed access to parsed tool-call arguments.

use serde_json::{Map, Value};

use crate::error::DeltaError;

/// Wrapper around a tool call's argument mapping providing typed extraction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArguments {
    values: Map<String, Value>,
}

impl ToolArguments {
    pub fn new(values: Map<String, Value>) -> Self {
        Self { values }
    }

    /// Parse accumulated argument text. Blank text is an empty mapping.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(trimmed).map(Self::new)
    }

    /// Get the raw mapping.
    pub fn raw(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.values
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Get a string argument by key.
    pub fn get_str(&self, key: &str) -> Result<&str, DeltaError> {
        self.values
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| DeltaError::InvalidArgument(format!("Missing string argument: {key}")))
    }

    /// Get an optional string argument.
    pub fn get_str_opt(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(|v| v.as_str())
    }

    /// Get an integer argument.
    pub fn get_i64(&self, key: &str) -> Result<i64, DeltaError> {
        self.values
            .get(key)
            .and_then(|v| v.as_i64())
            .ok_or_else(|| DeltaError::InvalidArgument(format!("Missing integer argument: {key}")))
    }

    /// Get a float argument.
    pub fn get_f64(&self, key: &str) -> Result<f64, DeltaError> {
        self.values
            .get(key)
            .and_then(|v| v.as_f64())
            .ok_or_else(|| DeltaError::InvalidArgument(format!("Missing float argument: {key}")))
    }

    /// Get a boolean argument.
    pub fn get_bool(&self, key: &str) -> Result<bool, DeltaError> {
        self.values
            .get(key)
            .and_then(|v| v.as_bool())
            .ok_or_else(|| DeltaError::InvalidArgument(format!("Missing boolean argument: {key}")))
    }

    /// Deserialize the whole mapping into a typed struct.
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T, DeltaError> {
        serde_json::from_value(Value::Object(self.values.clone())).map_err(|e| {
            DeltaError::InvalidArgument(format!("Failed to deserialize arguments: {e}"))
        })
    }
}

impl From<Map<String, Value>> for ToolArguments {
    fn from(values: Map<String, Value>) -> Self {
        Self::new(values)
    }
}
