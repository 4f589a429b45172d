use std::sync::Arc;

use paygate_core::config::MessagesConfig;
use paygate_core::{
    FailurePolicy, FlowGraph, FlowOutcome, GraphError, OracleError, RunError, RunField, RunState,
    StepDef, StepId, TerminalAction, ToolCatalog,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::classifier::{instruction_for, Classifier, LlmClassifier};
use crate::llm::{AgentDecision, LlmClient};
use crate::tools::{ActionInvoker, SessionFactory, ToolSession};

/// Drives the purchase flow for one utterance at a time.
///
/// Each call to [`AgentRuntime::run_once`] owns its own [`RunState`] and its
/// own tool session, so concurrent runs share nothing mutable.
pub struct AgentRuntime {
    llm: Arc<dyn LlmClient>,
    sessions: Arc<dyn SessionFactory>,
    messages: MessagesConfig,
    graph: FlowGraph,
}

impl AgentRuntime {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        sessions: Arc<dyn SessionFactory>,
        messages: MessagesConfig,
    ) -> Result<Self, GraphError> {
        Ok(Self { llm, sessions, messages, graph: FlowGraph::purchase()? })
    }

    pub fn graph(&self) -> &FlowGraph {
        &self.graph
    }

    pub fn messages(&self) -> &MessagesConfig {
        &self.messages
    }

    pub async fn run_once(&self, utterance: &str) -> Result<FlowOutcome, RunError> {
        let run_id = Uuid::new_v4().to_string();
        info!(
            event_name = "flow.run.start",
            correlation_id = %run_id,
            input_chars = utterance.chars().count(),
            "purchase flow started"
        );

        let session = self.sessions.open().await?;
        info!(
            event_name = "flow.run.session_opened",
            correlation_id = %run_id,
            tools = session.catalog().len(),
            "tool session opened"
        );

        let result = self.drive(&run_id, utterance, session.as_ref()).await;
        session.close().await;

        match &result {
            Ok(outcome) => info!(
                event_name = "flow.run.finished",
                correlation_id = %run_id,
                terminal = %outcome.terminal,
                "purchase flow finished"
            ),
            Err(run_error) => error!(
                event_name = "flow.run.failed",
                correlation_id = %run_id,
                error_class = run_error.error_class(),
                error = %run_error,
                "purchase flow failed"
            ),
        }
        result
    }

    async fn drive(
        &self,
        run_id: &str,
        utterance: &str,
        session: &dyn ToolSession,
    ) -> Result<FlowOutcome, RunError> {
        let catalog = session.catalog();
        let classifier = LlmClassifier::new(self.llm.as_ref());
        let invoker = ActionInvoker::new(catalog, session);

        let mut state = RunState::new(utterance);
        let mut current = self.graph.start();

        for _ in 0..self.graph.max_hops() {
            match *self.graph.step(current)? {
                StepDef::Decision { field, on_failure, .. } => {
                    let verdict = self
                        .decide(run_id, current, field, on_failure, &classifier, &state, catalog)
                        .await?;
                    state.record(field, verdict)?;
                    current = self.graph.next(current, &state)?;
                }
                StepDef::Terminal(action) => {
                    let output = match action {
                        TerminalAction::Message(key) => self.messages.text(key).to_string(),
                        TerminalAction::Agent => self.act(run_id, &state, &invoker).await?,
                    };
                    state.finish(output.clone())?;
                    return Ok(FlowOutcome {
                        run_id: run_id.to_string(),
                        terminal: current,
                        output,
                        state,
                    });
                }
            }
        }

        Err(GraphError::HopLimitExceeded { limit: self.graph.max_hops() }.into())
    }

    #[allow(clippy::too_many_arguments)]
    async fn decide(
        &self,
        run_id: &str,
        step: StepId,
        field: RunField,
        on_failure: FailurePolicy,
        classifier: &dyn Classifier,
        state: &RunState,
        catalog: &ToolCatalog,
    ) -> Result<bool, OracleError> {
        let instruction = instruction_for(field, catalog);
        match classifier.classify(&instruction, state.input()).await {
            Ok(verdict) => {
                info!(
                    event_name = "flow.step.decided",
                    correlation_id = %run_id,
                    step = %step,
                    field = field.as_str(),
                    verdict,
                    "decision step classified"
                );
                Ok(verdict)
            }
            Err(oracle_error) if on_failure == FailurePolicy::AssumeFalse => {
                warn!(
                    event_name = "flow.step.fail_open",
                    correlation_id = %run_id,
                    step = %step,
                    field = field.as_str(),
                    error = %oracle_error,
                    "classification failed; assuming a negative verdict"
                );
                Ok(false)
            }
            Err(oracle_error) => Err(oracle_error),
        }
    }

    /// Oracle failures propagate; tool failures become user-facing output.
    async fn act(
        &self,
        run_id: &str,
        state: &RunState,
        invoker: &ActionInvoker<'_>,
    ) -> Result<String, OracleError> {
        let reply = self.llm.respond_or_call(state.input(), invoker.catalog()).await?;
        if reply.tool_calls.len() > 1 {
            debug!(
                event_name = "flow.agent.extra_calls_dropped",
                correlation_id = %run_id,
                dropped = reply.tool_calls.len() - 1,
                "only the first proposed tool call is executed"
            );
        }

        let output = match reply.into_decision() {
            AgentDecision::FreeText(text) => {
                info!(
                    event_name = "flow.agent.free_text",
                    correlation_id = %run_id,
                    "oracle answered without a tool call"
                );
                text
            }
            AgentDecision::ToolCall { name, .. } if invoker.catalog().get(&name).is_none() => {
                warn!(
                    event_name = "flow.agent.unresolved_tool",
                    correlation_id = %run_id,
                    tool = %name,
                    "oracle proposed a tool that is not in the catalog"
                );
                self.messages.unresolved_tool.clone()
            }
            AgentDecision::ToolCall { name, args } => match invoker.invoke(&name, args).await {
                Ok(text) => {
                    info!(
                        event_name = "flow.agent.tool_invoked",
                        correlation_id = %run_id,
                        tool = %name,
                        "tool call completed"
                    );
                    text
                }
                Err(tool_error) => {
                    warn!(
                        event_name = "flow.agent.tool_failed",
                        correlation_id = %run_id,
                        tool = %name,
                        error = %tool_error,
                        "tool call failed"
                    );
                    format!("{}: {tool_error}", self.messages.tool_failure_prefix)
                }
            },
        };

        if output.trim().is_empty() {
            return Ok(self.messages.empty_reply.clone());
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use paygate_core::config::MessagesConfig;
    use paygate_core::{OracleError, StepId, ToolCatalog, ToolError};

    use super::AgentRuntime;
    use crate::llm::{AgentReply, LlmClient};
    use crate::tools::{SessionFactory, ToolSession};

    struct RefusingLlm;

    #[async_trait]
    impl LlmClient for RefusingLlm {
        async fn complete(&self, _prompt: &str) -> Result<String, OracleError> {
            Ok("NO".to_string())
        }

        async fn respond_or_call(
            &self,
            _prompt: &str,
            _tools: &ToolCatalog,
        ) -> Result<AgentReply, OracleError> {
            Ok(AgentReply::default())
        }
    }

    struct UnreachableProvider;

    #[async_trait]
    impl SessionFactory for UnreachableProvider {
        async fn open(&self) -> Result<Box<dyn ToolSession>, ToolError> {
            Err(ToolError::Connection("no provider".to_string()))
        }
    }

    #[test]
    fn runtime_uses_the_purchase_graph() {
        let runtime = AgentRuntime::new(
            Arc::new(RefusingLlm),
            Arc::new(UnreachableProvider),
            MessagesConfig::default(),
        )
        .expect("graph");

        assert_eq!(runtime.graph().start(), StepId::Politeness);
    }

    #[tokio::test]
    async fn session_failures_surface_before_any_step_runs() {
        let runtime = AgentRuntime::new(
            Arc::new(RefusingLlm),
            Arc::new(UnreachableProvider),
            MessagesConfig::default(),
        )
        .expect("graph");

        let error = runtime.run_once("사줘").await.expect_err("no session");
        assert_eq!(error.error_class(), "tool_provider_unavailable");
    }
}
