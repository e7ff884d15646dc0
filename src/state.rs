// Jaskier Shared Pattern -- state
// MCP gateway - Application state

use std::sync::Arc;
use std::time::Instant;

use crate::config::GatewayConfig;
use crate::mcp::registry::{RegistryError, ToolRegistry};
use crate::mcp::server::Dispatcher;
use crate::tools;

/// Shared by every handler. Everything behind the `Arc`s is written once at
/// startup and only read afterwards.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub config: Arc<GatewayConfig>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: GatewayConfig, registry: ToolRegistry) -> Self {
        let dispatcher = Dispatcher::new(Arc::new(registry)).with_tool_timeout(config.tool_timeout);
        Self {
            dispatcher: Arc::new(dispatcher),
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    /// State serving the built-in tool set.
    pub fn with_builtin_tools(config: GatewayConfig) -> Result<Self, RegistryError> {
        let mut registry = ToolRegistry::new();
        tools::register_builtin_tools(&mut registry, Instant::now())?;
        Ok(Self::new(config, registry))
    }

    pub fn tool_count(&self) -> usize {
        self.dispatcher.registry().len()
    }
}
