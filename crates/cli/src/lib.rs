pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use paygate_core::config::{ConfigError, ConfigOverrides, LoadOptions, LogFormat, LoggingConfig};
use tracing::Level;

#[derive(Debug, Parser)]
#[command(
    name = "paygate",
    about = "Paygate purchase assistant CLI",
    long_about = "Route purchase requests through politeness, payment-intent and tool-eligibility checks before handing them to an MCP tool agent.",
    after_help = "Examples:\n  paygate ask 결제할게요 10000원\n  paygate ask --json 사줘\n  paygate tools\n  paygate config"
)]
pub struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Default, Args)]
pub struct GlobalArgs {
    #[arg(long, global = true, help = "Config file to load; it must exist when given")]
    pub config: Option<PathBuf>,
    #[arg(long, global = true, help = "Oracle provider (openai|ollama)")]
    pub provider: Option<String>,
    #[arg(long, global = true, help = "Oracle model name")]
    pub model: Option<String>,
    #[arg(long, global = true, help = "Base URL of an OpenAI-compatible endpoint")]
    pub base_url: Option<String>,
    #[arg(long, global = true, help = "MCP servers JSON file")]
    pub servers: Option<PathBuf>,
    #[arg(long, global = true, help = "Also connect to remote (URL) MCP servers")]
    pub enable_remote: bool,
    #[arg(long, global = true, help = "Log level (trace|debug|info|warn|error)")]
    pub log_level: Option<String>,
}

impl GlobalArgs {
    pub fn load_options(&self) -> Result<LoadOptions, ConfigError> {
        let llm_provider = self.provider.as_deref().map(str::parse).transpose()?;
        Ok(LoadOptions {
            config_path: self.config.clone(),
            require_file: self.config.is_some(),
            overrides: ConfigOverrides {
                llm_provider,
                llm_model: self.model.clone(),
                llm_api_key: None,
                llm_base_url: self.base_url.clone(),
                servers_config: self.servers.clone(),
                enable_remote: self.enable_remote.then_some(true),
                log_level: self.log_level.clone(),
            },
        })
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Run one utterance through the purchase flow and print the reply")]
    Ask {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
        #[arg(required = true, num_args = 1.., help = "The user's request")]
        utterance: Vec<String>,
    },
    #[command(about = "Read utterances from stdin, one per line, until EOF or `/quit`")]
    Chat,
    #[command(about = "Connect to the configured MCP servers and list their tools")]
    Tools {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let options = match cli.global.load_options() {
        Ok(options) => options,
        Err(error) => {
            let result = commands::CommandResult::failure(
                "paygate",
                "config_validation",
                error.to_string(),
                2,
            );
            println!("{}", result.output);
            return ExitCode::from(result.exit_code);
        }
    };

    let result = match cli.command {
        Command::Ask { json, utterance } => commands::ask::run(options, &utterance.join(" "), json),
        Command::Chat => commands::chat::run(options),
        Command::Tools { json } => commands::tools::run(options, json),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run(options) }
        }
    };

    if !result.output.is_empty() {
        println!("{}", result.output);
    }
    ExitCode::from(result.exit_code)
}

/// Installs the global subscriber. Logs go to stderr so stdout carries only
/// command output.
pub fn init_logging(logging: &LoggingConfig) {
    let log_level = logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    let installed = match logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if installed.is_err() {
        tracing::debug!(
            event_name = "system.logging.already_initialized",
            "global subscriber was already installed"
        );
    }
}
