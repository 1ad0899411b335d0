//! Typed access to tool call arguments.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{DeskError, Result};

/// Arguments for one tool call, already validated against the tool's schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolArguments {
    raw: Value,
}

impl ToolArguments {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Required, non-blank string field.
    pub fn get_str(&self, name: &str) -> Result<&str> {
        self.get_opt_str(name)
            .ok_or_else(|| DeskError::Validation(format!("'{name}' is required")))
    }

    /// Optional string field; blank strings count as absent.
    pub fn get_opt_str(&self, name: &str) -> Option<&str> {
        self.raw
            .get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn get_opt_f64(&self, name: &str) -> Option<f64> {
        self.raw.get(name).and_then(Value::as_f64)
    }

    /// Deserialize the whole argument object.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.raw.clone())
            .map_err(|e| DeskError::Validation(format!("invalid arguments: {e}")))
    }
}
