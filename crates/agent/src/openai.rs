//! Oracle adapter for OpenAI-compatible chat-completions endpoints
//! (OpenAI itself, or Ollama's `/v1` surface).

use std::time::Duration;

use async_trait::async_trait;
use paygate_core::config::LlmConfig;
use paygate_core::{OracleError, ToolCatalog};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::llm::{AgentReply, LlmClient, ProposedCall};

const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Clone)]
pub struct OpenAiCompatibleClient {
    http: Client,
    endpoint: String,
    model: String,
    temperature: f32,
    api_key: Option<SecretString>,
}

impl std::fmt::Debug for OpenAiCompatibleClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatibleClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish_non_exhaustive()
    }
}

impl OpenAiCompatibleClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, OracleError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| OracleError::Transport(error.to_string()))?;

        Ok(Self {
            http,
            endpoint: config.endpoint(),
            model: config.model.clone(),
            temperature: config.temperature,
            api_key: config.api_key.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn chat(&self, request: &ChatRequest<'_>) -> Result<String, OracleError> {
        let url = format!("{}/chat/completions", self.endpoint);
        let mut builder = self.http.post(&url).json(request);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key.expose_secret());
        }

        let response =
            builder.send().await.map_err(|error| OracleError::Transport(error.to_string()))?;
        let status = response.status();
        let body =
            response.text().await.map_err(|error| OracleError::Transport(error.to_string()))?;

        let body = check_status(status, body)?;

        debug!(
            event_name = "oracle.chat.completed",
            model = %self.model,
            status = status.as_u16(),
            "chat completion received"
        );
        Ok(body)
    }
}

/// Non-2xx replies become `OracleError::Status` with a truncated body.
fn check_status(status: StatusCode, body: String) -> Result<String, OracleError> {
    if status.is_success() {
        return Ok(body);
    }
    Err(OracleError::Status {
        status: status.as_u16(),
        body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
    })
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn complete(&self, prompt: &str) -> Result<String, OracleError> {
        let request = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: vec![ChatMessage { role: "user", content: prompt }],
            tools: None,
            tool_choice: None,
        };
        let body = self.chat(&request).await?;
        Ok(decode_reply(&body)?.content.unwrap_or_default())
    }

    async fn respond_or_call(
        &self,
        prompt: &str,
        tools: &ToolCatalog,
    ) -> Result<AgentReply, OracleError> {
        let specs = tool_specs(tools);
        let request = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: vec![ChatMessage { role: "user", content: prompt }],
            tool_choice: (!specs.is_empty()).then_some("auto"),
            tools: (!specs.is_empty()).then_some(specs),
        };
        let body = self.chat(&request).await?;
        decode_reply(&body)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolSpec<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ToolSpec<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: FunctionSpec<'a>,
}

#[derive(Debug, Serialize)]
struct FunctionSpec<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
}

fn tool_specs(catalog: &ToolCatalog) -> Vec<ToolSpec<'_>> {
    catalog
        .iter()
        .map(|tool| ToolSpec {
            kind: "function",
            function: FunctionSpec {
                name: &tool.name,
                description: &tool.description,
                parameters: &tool.input_schema,
            },
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ResponseToolCall {
    function: ResponseFunction,
}

#[derive(Debug, Deserialize)]
struct ResponseFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

fn decode_reply(body: &str) -> Result<AgentReply, OracleError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|error| OracleError::MalformedResponse(error.to_string()))?;
    let choice = response.choices.into_iter().next().ok_or_else(|| {
        OracleError::MalformedResponse("response contained no choices".to_string())
    })?;

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| {
            Ok(ProposedCall {
                arguments: decode_arguments(&call.function.name, &call.function.arguments)?,
                name: call.function.name,
            })
        })
        .collect::<Result<Vec<_>, OracleError>>()?;

    Ok(AgentReply { content: choice.message.content, tool_calls })
}

/// Function arguments arrive as a JSON-encoded string.
fn decode_arguments(tool: &str, raw: &str) -> Result<Map<String, Value>, OracleError> {
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(arguments)) => Ok(arguments),
        Ok(other) => Err(OracleError::MalformedResponse(format!(
            "arguments for `{tool}` must be a JSON object, got {other}"
        ))),
        Err(error) => Err(OracleError::MalformedResponse(format!(
            "arguments for `{tool}` are not valid JSON: {error}"
        ))),
    }
}
