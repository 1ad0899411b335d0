//! Tool parameter schemas and tool outputs.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::quickbooks::Invoice;

/// JSON Schema-based parameter definition for a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentToolParameters {
    pub schema: Value,
}

impl AgentToolParameters {
    /// Builder: create an object schema with properties.
    pub fn object() -> ParameterBuilder {
        ParameterBuilder {
            properties: serde_json::Map::new(),
            required: Vec::new(),
        }
    }
}

/// Builder for constructing tool parameter schemas.
pub struct ParameterBuilder {
    properties: serde_json::Map<String, Value>,
    required: Vec<String>,
}

impl ParameterBuilder {
    fn property(mut self, name: &str, schema: Value, required: bool) -> Self {
        self.properties.insert(name.to_string(), schema);
        if required {
            self.required.push(name.to_string());
        }
        self
    }

    pub fn string(self, name: &str, description: &str, required: bool) -> Self {
        self.property(name, json!({ "type": "string", "description": description }), required)
    }

    pub fn number(self, name: &str, description: &str, required: bool) -> Self {
        self.property(name, json!({ "type": "number", "description": description }), required)
    }

    pub fn integer(self, name: &str, description: &str, required: bool) -> Self {
        self.property(name, json!({ "type": "integer", "description": description }), required)
    }

    /// String restricted to `values`.
    pub fn string_enum(self, name: &str, description: &str, values: &[&str], required: bool) -> Self {
        self.property(
            name,
            json!({ "type": "string", "description": description, "enum": values }),
            required,
        )
    }

    /// Array whose items follow `items`.
    pub fn array(self, name: &str, description: &str, items: Value, required: bool) -> Self {
        self.property(
            name,
            json!({ "type": "array", "description": description, "items": items }),
            required,
        )
    }

    pub fn build(self) -> AgentToolParameters {
        AgentToolParameters {
            schema: json!({
                "type": "object",
                "properties": self.properties,
                "required": self.required,
            }),
        }
    }
}

/// Instruction to the UI that accompanies a chat reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiDirective {
    /// Focus a single invoice.
    ShowInvoice { invoice: Box<Invoice> },
    /// Open the multi-invoice slider for a filtered list.
    OpenSlider { filter: String, invoices: Vec<Invoice> },
}

/// What a tool returns: a JSON result for the model, plus an optional UI directive.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub result: Value,
    pub directive: Option<UiDirective>,
}

impl ToolOutput {
    pub fn json(result: Value) -> Self {
        Self {
            result,
            directive: None,
        }
    }

    pub fn with_directive(mut self, directive: UiDirective) -> Self {
        self.directive = Some(directive);
        self
    }
}
