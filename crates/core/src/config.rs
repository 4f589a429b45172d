use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::errors::RunError;
use crate::flows::MessageKey;

pub const DEFAULT_CONFIG_PATHS: [&str; 2] = ["paygate.toml", "config/paygate.toml"];

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub mcp: McpConfig,
    pub messages: MessagesConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct McpConfig {
    pub servers_config: PathBuf,
    pub enable_remote: bool,
}

/// User-facing texts written by the terminal steps.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessagesConfig {
    pub polite_warning: String,
    pub ask_product: String,
    pub no_tool: String,
    pub tool_failure_prefix: String,
    pub unresolved_tool: String,
    pub empty_reply: String,
    /// Shown before the notice of a failed run; may be empty.
    pub failure_marker: String,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    #[serde(rename = "openai", alias = "open_ai")]
    OpenAi,
    Ollama,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub servers_config: Option<PathBuf>,
    pub enable_remote: Option<bool>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("tool server config `{path}` was not found")]
    MissingServersFile { path: PathBuf },
    #[error("could not read tool server config `{path}`: {source}")]
    ReadServersFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse tool server config `{path}`: {source}")]
    ParseServersFile { path: PathBuf, source: serde_json::Error },
    #[error("tool server `{name}` is invalid: {reason}")]
    InvalidServer { name: String, reason: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                provider: LlmProvider::OpenAi,
                api_key: None,
                base_url: None,
                model: "gpt-4o-mini".to_string(),
                temperature: 0.0,
                timeout_secs: 60,
            },
            mcp: McpConfig {
                servers_config: PathBuf::from("mcp_servers.json"),
                enable_remote: false,
            },
            messages: MessagesConfig::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            polite_warning: "존대말을 써주세요".to_string(),
            ask_product: "어떤 상품을 구매하시나요? 구체적으로 알려주세요.".to_string(),
            no_tool: "적절한 tool 이 존재하지 않습니다.".to_string(),
            tool_failure_prefix: "툴 실행 중 오류".to_string(),
            unresolved_tool: "요청을 처리할 수 있는 도구를 찾지 못했습니다.".to_string(),
            empty_reply: "(출력 없음)".to_string(),
            failure_marker: "❌".to_string(),
        }
    }
}

impl MessagesConfig {
    pub fn failure_notice(&self, error: &RunError) -> String {
        let marker = self.failure_marker.trim();
        if marker.is_empty() {
            error.user_message()
        } else {
            format!("{marker} {}", error.user_message())
        }
    }

    pub fn text(&self, key: MessageKey) -> &str {
        match key {
            MessageKey::PoliteWarning => &self.polite_warning,
            MessageKey::AskProduct => &self.ask_product,
            MessageKey::NoTool => &self.no_tool,
        }
    }
}

impl LlmConfig {
    /// Chat-completions base URL, defaulted per provider.
    pub fn endpoint(&self) -> String {
        match (&self.base_url, self.provider) {
            (Some(base_url), _) => base_url.trim_end_matches('/').to_string(),
            (None, LlmProvider::OpenAi) => "https://api.openai.com/v1".to_string(),
            (None, LlmProvider::Ollama) => "http://localhost:11434/v1".to_string(),
        }
    }

    /// Checked when an oracle client is built; commands that never reach the
    /// oracle work without a key.
    pub fn require_credentials(&self) -> Result<(), ConfigError> {
        if self.provider != LlmProvider::OpenAi {
            return Ok(());
        }
        let missing = self
            .api_key
            .as_ref()
            .map(|value| value.expose_secret().trim().is_empty())
            .unwrap_or(true);
        if missing {
            return Err(ConfigError::Validation(
                "llm.api_key is required for the openai provider (set PAYGATE_LLM_API_KEY or OPENAI_API_KEY)"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" | "open_ai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATHS[0]));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(secret_value(api_key));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(temperature) = llm.temperature {
                self.llm.temperature = temperature;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(mcp) = patch.mcp {
            if let Some(servers_config) = mcp.servers_config {
                self.mcp.servers_config = servers_config;
            }
            if let Some(enable_remote) = mcp.enable_remote {
                self.mcp.enable_remote = enable_remote;
            }
        }

        if let Some(messages) = patch.messages {
            let target = &mut self.messages;
            for (value, slot) in [
                (messages.polite_warning, &mut target.polite_warning),
                (messages.ask_product, &mut target.ask_product),
                (messages.no_tool, &mut target.no_tool),
                (messages.tool_failure_prefix, &mut target.tool_failure_prefix),
                (messages.unresolved_tool, &mut target.unresolved_tool),
                (messages.empty_reply, &mut target.empty_reply),
                (messages.failure_marker, &mut target.failure_marker),
            ] {
                if let Some(value) = value {
                    *slot = value;
                }
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("PAYGATE_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        let api_key = read_env("PAYGATE_LLM_API_KEY").or_else(|| read_env("OPENAI_API_KEY"));
        if let Some(value) = api_key {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("PAYGATE_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("PAYGATE_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("PAYGATE_LLM_TEMPERATURE") {
            self.llm.temperature = parse_f32("PAYGATE_LLM_TEMPERATURE", &value)?;
        }
        if let Some(value) = read_env("PAYGATE_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("PAYGATE_LLM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("PAYGATE_MCP_SERVERS_CONFIG") {
            self.mcp.servers_config = PathBuf::from(value);
        }
        if let Some(value) = read_env("PAYGATE_MCP_ENABLE_REMOTE") {
            self.mcp.enable_remote = parse_flag("PAYGATE_MCP_ENABLE_REMOTE", &value)?;
        }

        let log_level =
            read_env("PAYGATE_LOGGING_LEVEL").or_else(|| read_env("PAYGATE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("PAYGATE_LOGGING_FORMAT").or_else(|| read_env("PAYGATE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(provider) = overrides.llm_provider {
            self.llm.provider = provider;
        }
        if let Some(model) = overrides.llm_model {
            self.llm.model = model;
        }
        if let Some(api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(api_key));
        }
        if let Some(base_url) = overrides.llm_base_url {
            self.llm.base_url = Some(base_url);
        }
        if let Some(servers_config) = overrides.servers_config {
            self.mcp.servers_config = servers_config;
        }
        if let Some(enable_remote) = overrides.enable_remote {
            self.mcp.enable_remote = enable_remote;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_llm(&self.llm)?;
        validate_mcp(&self.mcp)?;
        validate_messages(&self.messages)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    DEFAULT_CONFIG_PATHS.into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if !(0.0..=2.0).contains(&llm.temperature) {
        return Err(ConfigError::Validation(
            "llm.temperature must be in range 0.0..=2.0".to_string(),
        ));
    }

    if let Some(base_url) = &llm.base_url {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "llm.base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_mcp(mcp: &McpConfig) -> Result<(), ConfigError> {
    if mcp.servers_config.as_os_str().is_empty() {
        return Err(ConfigError::Validation("mcp.servers_config must not be empty".to_string()));
    }
    Ok(())
}

fn validate_messages(messages: &MessagesConfig) -> Result<(), ConfigError> {
    let fields = [
        ("messages.polite_warning", &messages.polite_warning),
        ("messages.ask_product", &messages.ask_product),
        ("messages.no_tool", &messages.no_tool),
        ("messages.tool_failure_prefix", &messages.tool_failure_prefix),
        ("messages.unresolved_tool", &messages.unresolved_tool),
        ("messages.empty_reply", &messages.empty_reply),
    ];
    if let Some((key, _)) = fields.iter().find(|(_, value)| value.trim().is_empty()) {
        return Err(ConfigError::Validation(format!("{key} must not be empty")));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f32(key: &str, value: &str) -> Result<f32, ConfigError> {
    value.parse::<f32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Accepts `1|true|yes` and `0|false|no`, case-insensitively.
fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }),
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    llm: Option<LlmPatch>,
    mcp: Option<McpPatch>,
    messages: Option<MessagesPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct McpPatch {
    servers_config: Option<PathBuf>,
    enable_remote: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct MessagesPatch {
    polite_warning: Option<String>,
    ask_product: Option<String>,
    no_tool: Option<String>,
    tool_failure_prefix: Option<String>,
    unresolved_tool: Option<String>,
    empty_reply: Option<String>,
    failure_marker: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
