use anyhow::{Context, Result};
use paygate_agent::AgentRuntime;
use paygate_core::config::LoadOptions;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::info;

use super::{async_runtime, build_agent, prepare, CommandResult};

pub fn run(options: LoadOptions) -> CommandResult {
    let config = match prepare("chat", options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let agent = match build_agent("chat", &config) {
        Ok(agent) => agent,
        Err(result) => return result,
    };
    let runtime = match async_runtime("chat") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let session = converse(&agent, BufReader::new(tokio::io::stdin()), tokio::io::stdout());
    match runtime.block_on(session) {
        Ok(turns) => {
            info!(event_name = "system.chat.ended", turns, "chat session ended");
            CommandResult { exit_code: 0, output: String::new() }
        }
        Err(error) => CommandResult::failure("chat", "io", format!("{error:#}"), 1),
    }
}

/// One run per non-empty line. Failed runs are reported inline and the
/// session continues. Returns the number of runs executed.
pub async fn converse<R, W>(agent: &AgentRuntime, input: R, mut output: W) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let mut turns = 0;

    while let Some(line) = lines.next_line().await.context("failed to read input")? {
        let utterance = line.trim();
        if utterance.is_empty() {
            continue;
        }
        if matches!(utterance, "/quit" | "exit" | "quit") {
            break;
        }

        let reply = match agent.run_once(utterance).await {
            Ok(outcome) => outcome.output,
            Err(error) => agent.messages().failure_notice(&error),
        };
        output.write_all(format!("{reply}\n").as_bytes()).await.context("failed to write reply")?;
        output.flush().await.context("failed to flush output")?;
        turns += 1;
    }

    Ok(turns)
}
