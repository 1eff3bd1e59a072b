//! Argument binding
//!
//! Checks a request's parameters against a tool's declared parameters and
//! resolves defaults. Nothing is spawned until binding succeeds.

use super::protocol::{ParameterDef, ToolDefinition};
use crate::error::ValidationError;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// Parameters after defaults and omission rules are applied.
/// Absent optional parameters have no entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundArgs {
    values: HashMap<String, Value>,
}

impl BoundArgs {
    /// Get a bound string parameter
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(|v| v.as_str())
    }

    #[cfg(test)]
    pub fn is_present(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.values.len()
    }
}

/// Bind request parameters to a tool definition
pub fn bind(
    definition: &ToolDefinition,
    params: &HashMap<String, Value>,
) -> Result<BoundArgs, ValidationError> {
    for name in params.keys() {
        if !definition.parameters.iter().any(|p| &p.name == name) {
            debug!("Ignoring undeclared parameter '{}' for {}", name, definition.name);
        }
    }

    let mut values = HashMap::new();

    for param in &definition.parameters {
        let supplied = params.get(&param.name).filter(|v| !v.is_null());

        let value = match supplied {
            Some(value) => {
                check_type(param, value)?;
                if is_blank_optional(param, value) {
                    None
                } else {
                    Some(value.clone())
                }
            }
            None => param.default.clone(),
        };

        match value {
            Some(value) => {
                values.insert(param.name.clone(), value);
            }
            None if param.required => {
                return Err(ValidationError::MissingParameter(param.name.clone()));
            }
            None => {}
        }
    }

    Ok(BoundArgs { values })
}

/// An empty string for an optional parameter means "not given". The token is
/// omitted, not replaced by the default.
fn is_blank_optional(param: &ParameterDef, value: &Value) -> bool {
    !param.required && value.as_str() == Some("")
}

fn check_type(param: &ParameterDef, value: &Value) -> Result<(), ValidationError> {
    let ok = match param.param_type.as_str() {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        _ => true,
    };

    if ok {
        Ok(())
    } else {
        Err(ValidationError::InvalidType {
            name: param.name.clone(),
            expected: param.param_type.clone(),
            actual: json_type_name(value).to_string(),
        })
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
