//! Paygate core: the deterministic half of the purchase flow.
//!
//! Nothing in this crate performs I/O against the oracle or tool providers.
//! It owns the flow topology, the per-run state record, the tool catalog and
//! the configuration model; `paygate-agent` drives them asynchronously.

pub mod catalog;
pub mod config;
pub mod errors;
pub mod flows;
pub mod servers;

pub use catalog::{
    ArgIssue, ArgSchema, ArgValidator, CatalogError, ParamSpec, ParamType, ToolCatalog,
    ToolDescriptor,
};
pub use errors::{OracleError, RunError, ToolError};
pub use flows::{
    FailurePolicy, FlowGraph, FlowOutcome, GraphError, MessageKey, RunField, RunState, StepDef,
    StepId, TerminalAction,
};
pub use servers::{McpServerConfig, ServerTransport, ServersFile};
