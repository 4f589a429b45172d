use std::collections::HashMap;

use async_trait::async_trait;
use paygate_agent::{ToolOutput, ToolSession};
use paygate_core::{ToolCatalog, ToolDescriptor, ToolError};
use rmcp::model::{CallToolRequestParam, CallToolResult, Tool};
use rmcp::service::RunningService;
use rmcp::RoleClient;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::McpError;

pub(crate) struct ServerHandle {
    pub(crate) name: String,
    pub(crate) service: RunningService<RoleClient, ()>,
}

#[derive(Debug)]
struct Route {
    server: usize,
    tool: String,
}

/// Open connections to every configured server for the duration of one run.
pub struct McpSession {
    servers: Vec<ServerHandle>,
    routes: HashMap<String, Route>,
    catalog: ToolCatalog,
}

impl McpSession {
    /// Merges the listed tools in server order, then listing order.
    pub(crate) fn assemble(
        connected: Vec<(ServerHandle, Vec<Tool>)>,
        qualify: bool,
    ) -> Result<Self, McpError> {
        let mut servers = Vec::with_capacity(connected.len());
        let mut routes = HashMap::new();
        let mut descriptors = Vec::new();

        for (index, (handle, tools)) in connected.into_iter().enumerate() {
            for tool in &tools {
                let name = exposed_name(&handle.name, &tool.name, qualify);
                descriptors.push(descriptor_from_tool(tool, name.clone()));
                routes.insert(name, Route { server: index, tool: tool.name.to_string() });
            }
            servers.push(handle);
        }

        let catalog = ToolCatalog::new(descriptors)?;
        Ok(Self { servers, routes, catalog })
    }
}

pub fn exposed_name(server: &str, tool: &str, qualify: bool) -> String {
    if qualify {
        format!("{server}_{tool}")
    } else {
        tool.to_string()
    }
}

fn descriptor_from_tool(tool: &Tool, name: String) -> ToolDescriptor {
    ToolDescriptor::new(
        name,
        tool.description.as_deref().unwrap_or_default(),
        Value::Object(tool.input_schema.as_ref().clone()),
    )
}

/// Keeps the text parts of a tool result; other content kinds are dropped.
pub fn output_from_result(result: CallToolResult) -> ToolOutput {
    let fragments = result
        .content
        .iter()
        .filter_map(|content| content.as_text().map(|text| text.text.clone()))
        .collect();

    ToolOutput {
        fragments,
        structured: result.structured_content,
        is_error: result.is_error.unwrap_or(false),
    }
}

#[async_trait]
impl ToolSession for McpSession {
    fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    async fn call_tool(
        &self,
        name: &str,
        args: Map<String, Value>,
    ) -> Result<ToolOutput, ToolError> {
        let (route, handle) = self
            .routes
            .get(name)
            .and_then(|route| self.servers.get(route.server).map(|handle| (route, handle)))
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        debug!(
            event_name = "mcp.tool.call",
            server = %handle.name,
            tool = %route.tool,
            "forwarding tool call"
        );

        let result = handle
            .service
            .call_tool(CallToolRequestParam {
                name: route.tool.clone().into(),
                arguments: Some(args),
            })
            .await
            .map_err(|error| ToolError::Invocation {
                tool: name.to_string(),
                message: error.to_string(),
            })?;

        Ok(output_from_result(result))
    }

    async fn close(self: Box<Self>) {
        for handle in self.servers {
            match handle.service.cancel().await {
                Ok(reason) => debug!(
                    event_name = "mcp.server.closed",
                    server = %handle.name,
                    reason = ?reason,
                    "server connection closed"
                ),
                Err(error) => warn!(
                    event_name = "mcp.server.close_failed",
                    server = %handle.name,
                    error = %error,
                    "server connection did not shut down cleanly"
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rmcp::model::{CallToolResult, Content, Tool};
    use serde_json::{json, Value};

    use super::{descriptor_from_tool, exposed_name, output_from_result};

    fn schema(value: Value) -> Arc<serde_json::Map<String, Value>> {
        Arc::new(value.as_object().cloned().unwrap_or_default())
    }

    #[test]
    fn names_are_qualified_only_for_multiple_servers() {
        assert_eq!(exposed_name("shop", "pay", false), "pay");
        assert_eq!(exposed_name("shop", "pay", true), "shop_pay");
    }

    #[test]
    fn descriptors_keep_description_and_schema() {
        let tool = Tool::new(
            "pay",
            "Pay a given amount",
            schema(json!({
                "type": "object",
                "properties": { "amount": { "type": "integer" } },
                "required": ["amount"]
            })),
        );

        let descriptor = descriptor_from_tool(&tool, "shop_pay".to_string());

        assert_eq!(descriptor.name, "shop_pay");
        assert_eq!(descriptor.description, "Pay a given amount");
        assert_eq!(descriptor.input_schema["required"], json!(["amount"]));
        assert!(descriptor.schema.get("amount").is_some_and(|param| param.required));
    }

    #[test]
    fn text_content_is_collected_in_order() {
        let result = CallToolResult::success(vec![
            Content::text("주문 완료"),
            Content::text("금액: 10000"),
        ]);

        let output = output_from_result(result);

        assert_eq!(output.fragments, vec!["주문 완료".to_string(), "금액: 10000".to_string()]);
        assert!(!output.is_error);
        assert_eq!(output.render(), "주문 완료\n금액: 10000");
    }

    #[test]
    fn error_flag_and_structured_payload_survive() {
        let failed = output_from_result(CallToolResult::error(vec![Content::text("declined")]));
        assert!(failed.is_error);

        let mut structured = CallToolResult::success(Vec::new());
        structured.structured_content = Some(json!({ "order_id": 7 }));
        let output = output_from_result(structured);
        assert!(output.fragments.is_empty());
        assert_eq!(output.render(), r#"{"order_id":7}"#);
    }
}
