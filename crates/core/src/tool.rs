//! Tool trait: the abstraction over assistant capabilities.
//!
//! Tools are what the reasoning step can ask for: search flights,
//! look up the weather, find attractions. The registry is built once
//! at startup and never mutated afterwards.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;

/// Tool description sent to the reasoning service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema of the arguments object
    pub parameters: serde_json::Value,
}

/// The core Tool trait.
///
/// Each tool (search_flights, get_weather, find_attractions) implements
/// this trait and is registered in the [`ToolRegistry`].
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "get_weather").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments object.
    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Immutable name → handler lookup.
///
/// Cheap to share behind an `Arc`; handlers are themselves `Arc`s so a
/// dispatcher can move them into spawned tasks.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    /// A registry with no tools.
    pub fn empty() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// All tool definitions, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<_> = self.tools.values().map(|t| t.to_definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Look up and run a tool.
    pub async fn invoke(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        tool.execute(arguments).await
    }

    /// Registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

/// Collects tools and validates them into a [`ToolRegistry`].
#[derive(Default)]
pub struct ToolRegistryBuilder {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistryBuilder {
    pub fn register(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.push(Arc::new(tool));
        self
    }

    pub fn register_arc(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    /// Build the registry. Empty or duplicate names are rejected.
    pub fn build(self) -> Result<ToolRegistry, ToolError> {
        let mut tools = HashMap::with_capacity(self.tools.len());
        for tool in self.tools {
            let name = tool.name().trim().to_string();
            if name.is_empty() {
                return Err(ToolError::InvalidRegistration("empty tool name".into()));
            }
            if tools.insert(name.clone(), tool).is_some() {
                return Err(ToolError::InvalidRegistration(format!(
                    "duplicate tool name: {name}"
                )));
            }
        }
        tracing::debug!(count = tools.len(), "Tool registry built");
        Ok(ToolRegistry { tools })
    }
}
