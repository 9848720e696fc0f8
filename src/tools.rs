//! Tool registry: the server-side capabilities the upstream model may call.
//!
//! The host application builds a [`ToolRegistry`] once at startup and hands it
//! to the relay behind an `Arc`. Sessions only ever read it.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::RelayError;
use crate::types::tools::{FunctionTool, Tool as ToolSchema};

/// Arguments of a function call, decoded from the upstream JSON string.
pub type ToolArgs = Map<String, Value>;

/// Where a tool's result goes once the handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolResultDirection {
    /// Fed back to the model as the function call output.
    ToServer,
    /// Sent to the client on the side channel; the model gets an empty output.
    ToClient,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    payload: Value,
    destination: ToolResultDirection,
}

impl ToolResult {
    pub fn new(payload: impl Into<Value>, destination: ToolResultDirection) -> Self {
        Self {
            payload: payload.into(),
            destination,
        }
    }

    pub fn to_server(payload: impl Into<Value>) -> Self {
        Self::new(payload, ToolResultDirection::ToServer)
    }

    pub fn to_client(payload: impl Into<Value>) -> Self {
        Self::new(payload, ToolResultDirection::ToClient)
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn destination(&self) -> ToolResultDirection {
        self.destination
    }

    /// Null becomes the empty string, strings pass through, everything else is JSON.
    pub fn to_text(&self) -> String {
        match &self.payload {
            Value::Null => String::new(),
            Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }
}

/// The executable half of a tool.
///
/// Handlers are expected to be fail-safe: internal failures should come back
/// as a [`ToolResult::to_server`] carrying a readable error message.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, args: ToolArgs) -> ToolResult;
}

#[async_trait]
impl<F, Fut> ToolHandler for F
where
    F: Fn(ToolArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ToolResult> + Send + 'static,
{
    async fn call(&self, args: ToolArgs) -> ToolResult {
        (self)(args).await
    }
}

#[derive(Clone)]
pub struct Tool {
    schema: ToolSchema,
    handler: Arc<dyn ToolHandler>,
}

impl Tool {
    pub fn new(schema: FunctionTool, handler: impl ToolHandler + 'static) -> Self {
        Self {
            schema: ToolSchema::Function(schema),
            handler: Arc::new(handler),
        }
    }

    pub fn name(&self) -> &str {
        self.schema.name()
    }

    pub fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    pub async fn invoke(&self, args: ToolArgs) -> ToolResult {
        self.handler.call(args).await
    }
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool").field("schema", &self.schema).finish_non_exhaustive()
    }
}

/// Name-keyed, insertion-ordered set of tools.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: Vec<Tool>,
    by_name: HashMap<String, usize>,
    schemas: Vec<Value>,
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.by_name.get(name).map(|&idx| &self.tools[idx])
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(Tool::name)
    }

    /// The schema list sent upstream in every `session.update`, in registration order.
    pub fn schemas(&self) -> &[Value] {
        &self.schemas
    }
}

#[derive(Default)]
pub struct ToolRegistryBuilder {
    tools: Vec<Tool>,
}

impl ToolRegistryBuilder {
    pub fn with_tool(mut self, tool: Tool) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn build(self) -> Result<ToolRegistry, RelayError> {
        let mut registry = ToolRegistry::default();
        for tool in self.tools {
            if registry.by_name.contains_key(tool.name()) {
                return Err(RelayError::DuplicateTool(tool.name().to_string()));
            }
            registry.schemas.push(serde_json::to_value(tool.schema())?);
            registry.by_name.insert(tool.name().to_string(), registry.tools.len());
            registry.tools.push(tool);
        }
        Ok(registry)
    }
}
