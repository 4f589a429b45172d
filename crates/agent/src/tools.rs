use async_trait::async_trait;
use paygate_core::{ArgValidator, ToolCatalog, ToolError};
use serde_json::{Map, Value};
use tracing::warn;

/// Raw result of a remote tool call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ToolOutput {
    pub fragments: Vec<String>,
    pub structured: Option<Value>,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self { fragments: vec![text.into()], ..Self::default() }
    }

    /// Text fragments joined by newlines, or the structured payload when the
    /// provider returned no text at all.
    pub fn render(&self) -> String {
        if !self.fragments.is_empty() {
            return self.fragments.join("\n");
        }
        self.structured.as_ref().map(Value::to_string).unwrap_or_default()
    }
}

/// A live connection to the tool providers, scoped to one run.
#[async_trait]
pub trait ToolSession: Send + Sync {
    fn catalog(&self) -> &ToolCatalog;

    async fn call_tool(&self, name: &str, args: Map<String, Value>)
        -> Result<ToolOutput, ToolError>;

    async fn close(self: Box<Self>);
}

#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn ToolSession>, ToolError>;
}

pub struct ActionInvoker<'a> {
    catalog: &'a ToolCatalog,
    session: &'a dyn ToolSession,
}

impl<'a> ActionInvoker<'a> {
    pub fn new(catalog: &'a ToolCatalog, session: &'a dyn ToolSession) -> Self {
        Self { catalog, session }
    }

    pub fn catalog(&self) -> &ToolCatalog {
        self.catalog
    }

    pub async fn invoke(
        &self,
        tool_name: &str,
        args: Map<String, Value>,
    ) -> Result<String, ToolError> {
        let descriptor = self
            .catalog
            .get(tool_name)
            .ok_or_else(|| ToolError::UnknownTool(tool_name.to_string()))?;

        let issues = ArgValidator::for_tool(descriptor).validate(&args);
        if !issues.is_empty() {
            let rendered: Vec<String> = issues.iter().map(ToString::to_string).collect();
            warn!(
                event_name = "tool.arguments.advisory_mismatch",
                tool = tool_name,
                issues = ?rendered,
                "arguments do not match the published schema; calling anyway"
            );
        }

        let output = self.session.call_tool(tool_name, args).await?;
        if output.is_error {
            return Err(ToolError::Invocation {
                tool: tool_name.to_string(),
                message: output.render(),
            });
        }
        Ok(output.render())
    }
}
