//! MCP (Model Context Protocol) tool provider
//!
//! This crate connects the agent runtime to external MCP servers. Every run
//! opens its own connections, lists the tools, forwards at most one call and
//! shuts the connections down again.
//!
//! ## Architecture
//!
//! - `McpConnector`: [`SessionFactory`] over the configured servers
//! - `McpSession`: live connections plus the merged tool catalog
//!
//! When more than one server is configured, tool names are exposed as
//! `{server}_{tool}` so that servers cannot shadow each other.
//!
//! [`SessionFactory`]: paygate_agent::SessionFactory

mod connector;
mod session;

pub use connector::McpConnector;
pub use session::{exposed_name, output_from_result, McpSession};

use paygate_core::{CatalogError, ToolError};
use thiserror::Error;

/// Errors raised while talking to MCP servers
#[derive(Error, Debug)]
pub enum McpError {
    #[error("failed to start server `{server}`: {source}")]
    Spawn {
        server: String,
        #[source]
        source: std::io::Error,
    },

    #[error("handshake with server `{server}` failed: {message}")]
    Handshake { server: String, message: String },

    #[error("listing tools of server `{server}` failed: {message}")]
    Listing { server: String, message: String },

    #[error("invalid header for server `{server}`: {message}")]
    Header { server: String, message: String },

    #[error("merged tool catalog is invalid: {0}")]
    Catalog(#[from] CatalogError),
}

impl From<McpError> for ToolError {
    fn from(error: McpError) -> Self {
        ToolError::Connection(error.to_string())
    }
}
