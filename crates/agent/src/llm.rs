use async_trait::async_trait;
use paygate_core::{OracleError, ToolCatalog};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Single-prompt completion used for the binary classifications.
    async fn complete(&self, prompt: &str) -> Result<String, OracleError>;

    /// Joint "answer or pick a tool" request over the whole catalog.
    async fn respond_or_call(
        &self,
        prompt: &str,
        tools: &ToolCatalog,
    ) -> Result<AgentReply, OracleError>;
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentReply {
    pub content: Option<String>,
    pub tool_calls: Vec<ProposedCall>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProposedCall {
    pub name: String,
    pub arguments: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum AgentDecision {
    FreeText(String),
    ToolCall { name: String, args: Map<String, Value> },
}

impl AgentReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self { content: Some(content.into()), tool_calls: Vec::new() }
    }

    pub fn call(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            content: None,
            tool_calls: vec![ProposedCall {
                name: name.into(),
                arguments: arguments.as_object().cloned().unwrap_or_default(),
            }],
        }
    }

    /// The first proposed call wins; any further proposals are dropped.
    pub fn into_decision(self) -> AgentDecision {
        match self.tool_calls.into_iter().next() {
            Some(call) => AgentDecision::ToolCall { name: call.name, args: call.arguments },
            None => AgentDecision::FreeText(self.content.unwrap_or_default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{AgentDecision, AgentReply, ProposedCall};

    #[test]
    fn first_tool_call_is_honored() {
        let reply = AgentReply {
            content: Some("ignored".to_string()),
            tool_calls: vec![
                ProposedCall {
                    name: "pay".to_string(),
                    arguments: json!({ "amount": 10000 }).as_object().cloned().unwrap_or_default(),
                },
                ProposedCall { name: "refund".to_string(), arguments: Default::default() },
            ],
        };

        match reply.into_decision() {
            AgentDecision::ToolCall { name, args } => {
                assert_eq!(name, "pay");
                assert_eq!(args.get("amount"), Some(&json!(10000)));
            }
            other => panic!("expected tool call, got {other:?}"),
        }
    }

    #[test]
    fn reply_without_calls_is_free_text() {
        assert_eq!(
            AgentReply::text("결제를 도와드릴게요").into_decision(),
            AgentDecision::FreeText("결제를 도와드릴게요".to_string())
        );
        assert_eq!(AgentReply::default().into_decision(), AgentDecision::FreeText(String::new()));
    }
}
