// Jaskier Shared Pattern -- mcp/registry
//! In-memory tool registry.
//!
//! Built once at startup through explicit `register` calls, then frozen behind
//! an `Arc` and only read. `list()` preserves registration order, which is the
//! order clients see in discovery.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::{Map, Value};

use super::types::{ToolDefinition, METHOD_CALL_TOOL, METHOD_LIST_TOOLS};

/// Failure raised by a tool handler.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ToolError {
    /// Arguments were missing or had the wrong shape.
    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("{0}")]
    Execution(String),
}

impl ToolError {
    pub fn missing(name: &str) -> Self {
        ToolError::InvalidParams(format!("missing required argument: {name}"))
    }
}

pub type HandlerFuture = BoxFuture<'static, Result<Value, ToolError>>;

/// Uniform handler interface. Handlers that finish immediately return a
/// ready future; the dispatcher awaits all of them the same way.
pub trait ToolHandler: Send + Sync {
    fn call(&self, params: Map<String, Value>) -> HandlerFuture;
}

impl<F, Fut> ToolHandler for F
where
    F: Fn(Map<String, Value>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
{
    fn call(&self, params: Map<String, Value>) -> HandlerFuture {
        Box::pin(self(params))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("tool id must not be empty")]
    EmptyId,

    #[error("tool '{0}' is already registered")]
    Duplicate(String),

    #[error("tool id '{0}' collides with a reserved method")]
    Reserved(String),
}

#[derive(Default)]
pub struct ToolRegistry {
    definitions: Vec<ToolDefinition>,
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.definitions.iter().map(|d| &d.id).collect::<Vec<_>>())
            .finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, definition: ToolDefinition, handler: H) -> Result<(), RegistryError>
    where
        H: ToolHandler + 'static,
    {
        let id = definition.id.clone();
        if id.trim().is_empty() {
            return Err(RegistryError::EmptyId);
        }
        if id == METHOD_LIST_TOOLS || id == METHOD_CALL_TOOL {
            return Err(RegistryError::Reserved(id));
        }
        if self.handlers.contains_key(&id) {
            return Err(RegistryError::Duplicate(id));
        }

        tracing::debug!(tool = %id, "registry: tool registered");
        self.handlers.insert(id, Arc::new(handler));
        self.definitions.push(definition);
        Ok(())
    }

    /// Exact-match lookup.
    pub fn lookup(&self, id: &str) -> Option<Arc<dyn ToolHandler>> {
        self.handlers.get(id).cloned()
    }

    pub fn definition(&self, id: &str) -> Option<&ToolDefinition> {
        self.definitions.iter().find(|d| d.id == id)
    }

    /// Definitions in registration order.
    pub fn list(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
