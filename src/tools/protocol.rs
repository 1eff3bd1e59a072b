//! Tool protocol definitions
//!
//! Defines tool descriptors and the JSON request/response format the host
//! uses to drive them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tool descriptor shown to the invoking agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name (e.g., "getMRDiff")
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Parameter definitions, in positional order
    pub parameters: Vec<ParameterDef>,
}

/// Parameter definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterDef {
    /// Parameter name
    pub name: String,
    /// Parameter type (string, number, boolean)
    #[serde(rename = "type")]
    pub param_type: String,
    /// Description
    pub description: String,
    /// Whether parameter is required
    #[serde(default)]
    pub required: bool,
    /// Default value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

impl ParameterDef {
    /// A required string parameter
    pub fn required(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            param_type: "string".to_string(),
            description: description.to_string(),
            required: true,
            default: None,
        }
    }

    /// An optional string parameter
    pub fn optional(name: &str, description: &str) -> Self {
        Self {
            required: false,
            ..Self::required(name, description)
        }
    }

    /// Attach a default value; a defaulted parameter is never required
    pub fn with_default(mut self, value: serde_json::Value) -> Self {
        self.required = false;
        self.default = Some(value);
        self
    }
}

/// Manifest a host reads to discover the tools
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolManifest {
    pub name: String,
    pub version: String,
    pub description: String,
    pub tools: Vec<ToolDefinition>,
}

/// Request sent by the host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRequest {
    /// Request ID for correlation
    #[serde(default = "new_request_id")]
    pub id: String,
    /// Tool name to invoke
    pub tool: String,
    /// Parameters passed to the tool
    #[serde(default)]
    pub params: HashMap<String, serde_json::Value>,
}

fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl ToolRequest {
    /// Create a new request
    #[cfg(test)]
    pub fn new(tool: &str, params: HashMap<String, serde_json::Value>) -> Self {
        Self {
            id: new_request_id(),
            tool: tool.to_string(),
            params,
        }
    }
}

/// Outcome of one tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationResult {
    /// Captured standard output of the external command
    Output(String),
    /// Human-readable failure message
    Failure(String),
}

impl InvocationResult {
    /// Failure in the uniform `Error running <tool>: <detail>` form
    pub fn failure(tool: &str, detail: impl std::fmt::Display) -> Self {
        Self::Failure(format!("Error running {}: {}", tool, detail))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Output(_))
    }

    #[cfg(test)]
    pub fn text(&self) -> &str {
        match self {
            Self::Output(text) | Self::Failure(text) => text,
        }
    }

    /// Surface either branch as plain text
    pub fn into_text(self) -> String {
        match self {
            Self::Output(text) | Self::Failure(text) => text,
        }
    }
}

/// Response written back to the host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResponse {
    /// Request ID this responds to
    pub id: String,
    /// Whether the tool produced output
    pub success: bool,
    /// Tool output, or the failure message
    pub output: String,
}

impl ToolResponse {
    /// Create a response from an invocation result
    pub fn from_result(id: &str, result: InvocationResult) -> Self {
        Self {
            id: id.to_string(),
            success: result.is_success(),
            output: result.into_text(),
        }
    }

    /// Create an error response
    pub fn error(id: &str, message: &str) -> Self {
        Self {
            id: id.to_string(),
            success: false,
            output: message.to_string(),
        }
    }
}
