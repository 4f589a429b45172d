pub mod ask;
pub mod chat;
pub mod config;
pub mod tools;

use std::sync::Arc;

use paygate_agent::{AgentRuntime, OpenAiCompatibleClient};
use paygate_core::config::{AppConfig, LoadOptions};
use paygate_core::RunError;
use paygate_mcp::McpConnector;
use serde::Serialize;

use crate::init_logging;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(&payload) }
    }

    fn from_run_error(command: &str, error: RunError) -> Self {
        let exit_code = if matches!(error, RunError::Configuration(_)) { 2 } else { 1 };
        Self::failure(command, error.error_class(), error.to_string(), exit_code)
    }
}

fn serialize_payload<T: Serialize>(payload: &T) -> String {
    serde_json::to_string(payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Loads config and installs logging; every command that talks to the
/// outside world starts here.
fn prepare(command: &str, options: LoadOptions) -> Result<AppConfig, CommandResult> {
    let config = AppConfig::load(options)
        .map_err(|error| CommandResult::from_run_error(command, error.into()))?;
    init_logging(&config.logging);
    Ok(config)
}

fn build_agent(command: &str, config: &AppConfig) -> Result<AgentRuntime, CommandResult> {
    let fail = |error: RunError| CommandResult::from_run_error(command, error);

    config.llm.require_credentials().map_err(|error| fail(error.into()))?;
    let connector = McpConnector::from_config(&config.mcp).map_err(|error| fail(error.into()))?;
    let llm = OpenAiCompatibleClient::from_config(&config.llm).map_err(|error| fail(error.into()))?;
    tracing::info!(
        event_name = "system.agent.ready",
        model = llm.model(),
        servers = connector.servers().len(),
        "agent runtime assembled"
    );

    AgentRuntime::new(Arc::new(llm), Arc::new(connector), config.messages.clone())
        .map_err(|error| fail(error.into()))
}

fn async_runtime(command: &str) -> Result<tokio::runtime::Runtime, CommandResult> {
    tokio::runtime::Builder::new_multi_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(command, "runtime_unavailable", error.to_string(), 1)
    })
}
