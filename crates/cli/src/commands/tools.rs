use paygate_agent::SessionFactory;
use paygate_core::config::LoadOptions;
use paygate_core::{RunError, ToolCatalog, ToolError};
use paygate_mcp::McpConnector;
use serde::Serialize;
use serde_json::Value;

use super::{async_runtime, prepare, serialize_payload, CommandResult};

#[derive(Debug, Serialize)]
struct ToolListing<'a> {
    name: &'a str,
    description: &'a str,
    input_schema: &'a Value,
}

pub fn run(options: LoadOptions, json: bool) -> CommandResult {
    let config = match prepare("tools", options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let connector = match McpConnector::from_config(&config.mcp) {
        Ok(connector) => connector,
        Err(error) => return CommandResult::from_run_error("tools", error.into()),
    };
    let runtime = match async_runtime("tools") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    match runtime.block_on(list(&connector)) {
        Ok(catalog) => render(&catalog, json),
        Err(error) => CommandResult::from_run_error("tools", RunError::from(error)),
    }
}

/// Opens a session only long enough to read its catalog.
pub async fn list(factory: &dyn SessionFactory) -> Result<ToolCatalog, ToolError> {
    let session = factory.open().await?;
    let catalog = session.catalog().clone();
    session.close().await;
    Ok(catalog)
}

pub fn render(catalog: &ToolCatalog, json: bool) -> CommandResult {
    if !json {
        return CommandResult { exit_code: 0, output: render_plain(catalog) };
    }

    let listings: Vec<ToolListing<'_>> = catalog
        .iter()
        .map(|tool| ToolListing {
            name: &tool.name,
            description: &tool.description,
            input_schema: &tool.input_schema,
        })
        .collect();
    CommandResult { exit_code: 0, output: serialize_payload(&listings) }
}

fn render_plain(catalog: &ToolCatalog) -> String {
    if catalog.is_empty() {
        return "(no tools)".to_string();
    }

    let mut lines = Vec::new();
    for tool in catalog.iter() {
        lines.push(format!("- {}: {}", tool.name, tool.description));
        for (name, spec) in tool.schema.params() {
            let mut line = format!("    {name}: {}", spec.kind.as_str());
            if spec.required {
                line.push_str(" (required)");
            }
            if let Some(description) = &spec.description {
                line.push_str(&format!(" - {description}"));
            }
            lines.push(line);
        }
    }
    lines.join("\n")
}
