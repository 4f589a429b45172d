use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use paygate_core::config::{AppConfig, LoadOptions, DEFAULT_CONFIG_PATHS};
use secrecy::ExposeSecret;
use toml::Value;

struct Field<'a> {
    key_path: &'static str,
    value: String,
    env_keys: &'a [&'static str],
    from_cli: bool,
}

pub fn run(options: LoadOptions) -> String {
    let config_file_path = detect_config_path(options.config_path.as_deref());
    let overrides = options.overrides.clone();
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let api_key = config
        .llm
        .api_key
        .as_ref()
        .map(|key| redact_token(key.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());

    let fields = [
        Field {
            key_path: "llm.provider",
            value: format!("{:?}", config.llm.provider),
            env_keys: &["PAYGATE_LLM_PROVIDER"],
            from_cli: overrides.llm_provider.is_some(),
        },
        Field {
            key_path: "llm.model",
            value: config.llm.model.clone(),
            env_keys: &["PAYGATE_LLM_MODEL"],
            from_cli: overrides.llm_model.is_some(),
        },
        Field {
            key_path: "llm.base_url",
            value: config.llm.base_url.clone().unwrap_or_else(|| {
                format!("<unset> (using {})", config.llm.endpoint())
            }),
            env_keys: &["PAYGATE_LLM_BASE_URL"],
            from_cli: overrides.llm_base_url.is_some(),
        },
        Field {
            key_path: "llm.api_key",
            value: api_key,
            env_keys: &["PAYGATE_LLM_API_KEY", "OPENAI_API_KEY"],
            from_cli: overrides.llm_api_key.is_some(),
        },
        Field {
            key_path: "llm.temperature",
            value: config.llm.temperature.to_string(),
            env_keys: &["PAYGATE_LLM_TEMPERATURE"],
            from_cli: false,
        },
        Field {
            key_path: "llm.timeout_secs",
            value: config.llm.timeout_secs.to_string(),
            env_keys: &["PAYGATE_LLM_TIMEOUT_SECS"],
            from_cli: false,
        },
        Field {
            key_path: "mcp.servers_config",
            value: config.mcp.servers_config.display().to_string(),
            env_keys: &["PAYGATE_MCP_SERVERS_CONFIG"],
            from_cli: overrides.servers_config.is_some(),
        },
        Field {
            key_path: "mcp.enable_remote",
            value: config.mcp.enable_remote.to_string(),
            env_keys: &["PAYGATE_MCP_ENABLE_REMOTE"],
            from_cli: overrides.enable_remote.is_some(),
        },
        Field {
            key_path: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["PAYGATE_LOGGING_LEVEL", "PAYGATE_LOG_LEVEL"],
            from_cli: overrides.log_level.is_some(),
        },
        Field {
            key_path: "logging.format",
            value: format!("{:?}", config.logging.format),
            env_keys: &["PAYGATE_LOGGING_FORMAT", "PAYGATE_LOG_FORMAT"],
            from_cli: false,
        },
    ];

    let mut lines =
        vec!["effective config (source precedence: cli > env > file > default):".to_string()];
    for field in &fields {
        let source = field_source(field, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(field.key_path, &field.value, source));
    }

    lines.join("\n")
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }
    DEFAULT_CONFIG_PATHS.into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    field: &Field<'_>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if field.from_cli {
        return "cli".to_string();
    }

    if let Some(env_key) = field.env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, field.key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
