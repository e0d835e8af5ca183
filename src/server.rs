//! MCP server struct definition and initialization.

use crate::config::ConnectionConfig;
use crate::constants::{env, QUERY_TOOL_NAME};
use crate::database::QueryGate;
use rmcp::handler::server::router::tool::ToolRouter;
use std::sync::Arc;
use tracing::{info, warn};

/// The MSSQL MCP server instance.
///
/// Cloned by the transport per request; the configuration is shared and
/// immutable. The server provides:
///
/// - **Tools**: `list-tables`, `query-database`, `describe-table`
/// - **Resources**: one `mssql://<schema.table>/data` resource per base table
#[derive(Clone)]
pub struct MssqlMcpServer {
    /// Resolved connection configuration.
    pub(crate) config: Arc<ConnectionConfig>,

    /// Query gate used by every tool and resource.
    pub(crate) gate: QueryGate,

    /// Tool router for dispatching tool calls.
    pub(crate) tool_router: ToolRouter<Self>,
}

impl MssqlMcpServer {
    /// Create a server over a resolved configuration.
    ///
    /// No connection is opened here; configuration problems surface on the
    /// first tool call.
    pub fn new(config: ConnectionConfig) -> Self {
        let config = Arc::new(config);
        let gate = QueryGate::new(config.clone());

        Self {
            config,
            gate,
            tool_router: Self::tool_router(),
        }
    }

    /// Create a server from environment variables.
    ///
    /// `MSSQL_COMMAND`, when set, adds an alias for `query-database`.
    pub fn from_env() -> Self {
        let alias = std::env::var(env::COMMAND).ok();
        Self::new(ConnectionConfig::from_env()).with_query_alias(alias.as_deref())
    }

    /// Register `alias` as a second name for the `query-database` tool.
    ///
    /// Blank aliases and names of existing tools are ignored.
    pub fn with_query_alias(mut self, alias: Option<&str>) -> Self {
        let Some(alias) = alias.map(str::trim).filter(|a| !a.is_empty()) else {
            return self;
        };

        if self.tool_router.has_route(alias) {
            if alias != QUERY_TOOL_NAME {
                warn!("{}={} collides with an existing tool, ignoring", env::COMMAND, alias);
            }
            return self;
        }

        if let Some(mut route) = self.tool_router.map.get(QUERY_TOOL_NAME).cloned() {
            route.attr.name = alias.to_string().into();
            self.tool_router.add_route(route);
            info!("Registered {} as an alias of {}", alias, QUERY_TOOL_NAME);
        }

        self
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Get a reference to the query gate.
    pub fn gate(&self) -> &QueryGate {
        &self.gate
    }

    /// The configured database name, if any.
    pub fn current_database(&self) -> Option<&str> {
        self.config.database.as_deref()
    }
}
