//! Tool calling definitions for session-registered callbacks

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Tool definition advertised to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: Option<String>,
    pub parameters: Option<serde_json::Value>, // JSON Schema
}

/// Tool result (fed back into the conversation)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: String,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResult {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

pub type ToolFn = Arc<dyn Fn(serde_json::Value) -> ToolResult + Send + Sync>;

/// A caller-supplied function the model may invoke mid-turn.
///
/// Any state the handler mutates belongs to the caller and is moved into the
/// closure (typically behind an `Arc`).
#[derive(Clone)]
pub struct Tool {
    pub definition: ToolDefinition,
    handler: ToolFn,
}

impl Tool {
    pub fn new<F>(name: impl Into<String>, description: impl Into<String>, handler: F) -> Self
    where
        F: Fn(serde_json::Value) -> ToolResult + Send + Sync + 'static,
    {
        Self {
            definition: ToolDefinition {
                name: name.into(),
                description: Some(description.into()),
                parameters: None,
            },
            handler: Arc::new(handler),
        }
    }

    /// Build a tool whose arguments are deserialized into `P`.
    ///
    /// Malformed arguments become an error result instead of reaching `handler`.
    pub fn typed<P, F>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
        handler: F,
    ) -> Self
    where
        P: DeserializeOwned,
        F: Fn(P) -> ToolResult + Send + Sync + 'static,
    {
        let name = name.into();
        let tool_name = name.clone();
        let mut tool = Self::new(name, description, move |args| {
            match serde_json::from_value::<P>(args) {
                Ok(params) => handler(params),
                Err(e) => ToolResult::error(format!("invalid arguments for {tool_name}: {e}")),
            }
        });
        tool.definition.parameters = Some(parameters);
        tool
    }

    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.definition.parameters = Some(parameters);
        self
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn invoke(&self, arguments: serde_json::Value) -> ToolResult {
        (self.handler)(arguments)
    }
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("definition", &self.definition)
            .finish_non_exhaustive()
    }
}
