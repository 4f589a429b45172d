use paygate_core::config::{LoadOptions, MessagesConfig};
use paygate_core::{FlowOutcome, RunError, RunState, StepId};
use serde::Serialize;

use super::{async_runtime, build_agent, prepare, serialize_payload, CommandResult};

#[derive(Debug, Serialize)]
struct AskOutcome<'a> {
    command: &'static str,
    status: &'static str,
    run_id: &'a str,
    terminal: StepId,
    output: &'a str,
    state: &'a RunState,
}

pub fn run(options: LoadOptions, utterance: &str, json: bool) -> CommandResult {
    let config = match prepare("ask", options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let agent = match build_agent("ask", &config) {
        Ok(agent) => agent,
        Err(result) => return result,
    };
    let runtime = match async_runtime("ask") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    render(runtime.block_on(agent.run_once(utterance)), json, &config.messages)
}

/// Plain mode prints the reply alone; failures get the user-facing notice.
pub fn render(
    result: Result<FlowOutcome, RunError>,
    json: bool,
    messages: &MessagesConfig,
) -> CommandResult {
    match result {
        Ok(outcome) if json => {
            let payload = AskOutcome {
                command: "ask",
                status: "ok",
                run_id: &outcome.run_id,
                terminal: outcome.terminal,
                output: &outcome.output,
                state: &outcome.state,
            };
            CommandResult { exit_code: 0, output: serialize_payload(&payload) }
        }
        Ok(outcome) => CommandResult { exit_code: 0, output: outcome.output },
        Err(error) if json => CommandResult::from_run_error("ask", error),
        Err(error) => CommandResult { exit_code: 1, output: messages.failure_notice(&error) },
    }
}
