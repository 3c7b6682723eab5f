//! Tool registry and built-in tools.
//!
//! Tools are plain closures. Any state a tool mutates is owned by the caller
//! and moved into the closure behind an `Arc`; see [`builtin::TaskBoard`] and
//! [`builtin::FindingsLog`]. The caller reads that state once the turn has gone
//! idle.

pub mod builtin;

use std::collections::HashMap;
use tracing::{debug, warn};

use crate::types::{Tool, ToolDefinition, ToolResult};

/// Name-indexed set of tools registered with a session.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Tool>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tools(tools: impl IntoIterator<Item = Tool>) -> Self {
        let mut registry = Self::new();
        for tool in tools {
            registry.register(tool);
        }
        registry
    }

    /// Register a tool, replacing any existing tool with the same name.
    pub fn register(&mut self, tool: Tool) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            warn!(tool = name.as_str(), "replacing previously registered tool");
        } else {
            self.order.push(name);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.get(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Definitions in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| t.definition.clone())
            .collect()
    }

    /// Dispatch an invocation. Unknown tools yield an error result.
    pub fn invoke(&self, name: &str, arguments: serde_json::Value) -> ToolResult {
        match self.tools.get(name) {
            Some(tool) => {
                let result = tool.invoke(arguments);
                debug!(tool = name, is_error = result.is_error, "tool invoked");
                result
            }
            None => {
                warn!(tool = name, "model invoked an unregistered tool");
                ToolResult::error(format!("unknown tool: {name}"))
            }
        }
    }
}
