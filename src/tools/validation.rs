//! Validate tool call arguments against a tool's JSON Schema before execution.

use serde_json::Value;

/// Check `args` against `schema`.
///
/// Covers what the invoice tools declare: object shape, required fields,
/// property types, string enums and array item types. Returns the first
/// violation as a message suitable for feeding back to the model.
pub fn validate_arguments(args: &Value, schema: &Value) -> Result<(), String> {
    if schema.get("type").and_then(Value::as_str) == Some("object") && !args.is_object() {
        return Err(format!("expected object arguments, got {}", json_type_name(args)));
    }
    let Some(obj) = args.as_object() else {
        return Ok(());
    };

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for name in required.iter().filter_map(Value::as_str) {
            match obj.get(name) {
                None | Some(Value::Null) => return Err(format!("missing required field '{name}'")),
                _ => {}
            }
        }
    }

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(());
    };
    for (key, value) in obj {
        // Unknown keys are ignored; models often add extras.
        let Some(prop) = properties.get(key) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        check_property(key, value, prop)?;
    }
    Ok(())
}

fn check_property(key: &str, value: &Value, prop: &Value) -> Result<(), String> {
    if let Some(expected) = prop.get("type").and_then(Value::as_str) {
        if !value_matches_type(value, expected) {
            return Err(format!(
                "field '{key}' expected type '{expected}', got {}",
                json_type_name(value)
            ));
        }
    }
    if let Some(allowed) = prop.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            let options: Vec<String> = allowed.iter().map(Value::to_string).collect();
            return Err(format!("field '{key}' must be one of {}", options.join(", ")));
        }
    }
    if let (Some(items), Some(elements)) = (prop.get("items"), value.as_array()) {
        for (i, element) in elements.iter().enumerate() {
            if let Some(expected) = items.get("type").and_then(Value::as_str) {
                if !value_matches_type(element, expected) {
                    return Err(format!("field '{key}[{i}]' expected type '{expected}'"));
                }
            }
            if element.is_object() {
                validate_arguments(element, items).map_err(|e| format!("field '{key}[{i}]': {e}"))?;
            }
        }
    }
    Ok(())
}

fn value_matches_type(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
