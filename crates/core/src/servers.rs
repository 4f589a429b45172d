//! Tool-provider endpoints, read from an `mcpServers` JSON document.
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "shop": { "command": "python", "args": ["shop_server.py"] },
//!     "billing": { "url": "http://localhost:8000/mcp" }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::config::ConfigError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct McpServerConfig {
    pub name: String,
    pub transport: ServerTransport,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServerTransport {
    Stdio {
        command: String,
        args: Vec<String>,
        env: BTreeMap<String, String>,
        cwd: Option<PathBuf>,
    },
    Remote {
        url: String,
        headers: BTreeMap<String, String>,
    },
}

impl McpServerConfig {
    pub fn is_remote(&self) -> bool {
        matches!(self.transport, ServerTransport::Remote { .. })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServersDocument {
    mcp_servers: Option<BTreeMap<String, Value>>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerEntry {
    command: Option<String>,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: BTreeMap<String, String>,
    cwd: Option<PathBuf>,
    url: Option<String>,
    #[serde(default)]
    headers: BTreeMap<String, String>,
}

pub struct ServersFile;

impl ServersFile {
    pub fn load(path: &Path) -> Result<Vec<McpServerConfig>, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::MissingServersFile { path: path.to_path_buf() });
        }
        let raw = fs::read_to_string(path)
            .map_err(|source| ConfigError::ReadServersFile { path: path.to_path_buf(), source })?;
        Self::parse(&raw)
            .map_err(|error| match error {
                ParseFailure::Json(source) => {
                    ConfigError::ParseServersFile { path: path.to_path_buf(), source }
                }
                ParseFailure::Config(error) => error,
            })
    }

    pub fn parse(raw: &str) -> Result<Vec<McpServerConfig>, ParseFailure> {
        let document: ServersDocument = serde_json::from_str(raw).map_err(ParseFailure::Json)?;
        let entries = document.mcp_servers.ok_or_else(|| {
            ParseFailure::Config(ConfigError::Validation(
                "tool server config must contain an `mcpServers` object".to_string(),
            ))
        })?;

        entries
            .into_iter()
            .map(|(name, value)| parse_entry(name, value).map_err(ParseFailure::Config))
            .collect()
    }
}

#[derive(Debug)]
pub enum ParseFailure {
    Json(serde_json::Error),
    Config(ConfigError),
}

fn parse_entry(name: String, value: Value) -> Result<McpServerConfig, ConfigError> {
    if name.trim().is_empty() {
        return Err(ConfigError::InvalidServer {
            name,
            reason: "server names must not be empty".to_string(),
        });
    }
    let entry: ServerEntry = serde_json::from_value(value).map_err(|error| {
        ConfigError::InvalidServer { name: name.clone(), reason: error.to_string() }
    })?;

    let transport = match (entry.command, entry.url) {
        (Some(command), _) if !command.trim().is_empty() => ServerTransport::Stdio {
            command,
            args: entry.args,
            env: entry.env,
            cwd: entry.cwd,
        },
        (_, Some(url)) if url.starts_with("http://") || url.starts_with("https://") => {
            ServerTransport::Remote { url, headers: entry.headers }
        }
        (_, Some(url)) => {
            return Err(ConfigError::InvalidServer {
                name,
                reason: format!("url `{url}` must start with http:// or https://"),
            })
        }
        _ => {
            return Err(ConfigError::InvalidServer {
                name,
                reason: "entry needs either `command` or `url`".to_string(),
            })
        }
    };

    Ok(McpServerConfig { name, transport })
}

/// Drops URL-based servers unless remote providers are enabled.
pub fn prune_remote(servers: Vec<McpServerConfig>, enable_remote: bool) -> Vec<McpServerConfig> {
    if enable_remote {
        return servers;
    }
    servers.into_iter().filter(|server| !server.is_remote()).collect()
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use tempfile::TempDir;

    use super::{prune_remote, ParseFailure, ServerTransport, ServersFile};
    use crate::config::ConfigError;

    const DOCUMENT: &str = r#"{
        "mcpServers": {
            "shop": { "command": "python", "args": ["shop_server.py"], "env": { "SHOP_MODE": "test" } },
            "billing": { "url": "http://localhost:8000/mcp" }
        }
    }"#;

    #[test]
    fn parses_stdio_and_remote_entries_sorted_by_name() {
        let servers = ServersFile::parse(DOCUMENT).expect("valid document");

        assert_eq!(servers.len(), 2);
        assert_eq!(servers[0].name, "billing");
        assert!(servers[0].is_remote());
        match &servers[1].transport {
            ServerTransport::Stdio { command, args, env, cwd } => {
                assert_eq!(command, "python");
                assert_eq!(args, &vec!["shop_server.py".to_string()]);
                assert_eq!(env.get("SHOP_MODE").map(String::as_str), Some("test"));
                assert!(cwd.is_none());
            }
            other => panic!("expected stdio transport, got {other:?}"),
        }
    }

    #[test]
    fn remote_servers_are_pruned_unless_enabled() {
        let servers = ServersFile::parse(DOCUMENT).expect("valid document");

        let pruned = prune_remote(servers.clone(), false);
        assert_eq!(pruned.len(), 1);
        assert_eq!(pruned[0].name, "shop");

        assert_eq!(prune_remote(servers, true).len(), 2);
    }

    #[test]
    fn entries_without_command_or_url_are_rejected() {
        let error = ServersFile::parse(r#"{"mcpServers": {"broken": {"args": ["x"]}}}"#)
            .expect_err("neither command nor url");

        assert!(matches!(
            error,
            ParseFailure::Config(ConfigError::InvalidServer { ref name, .. }) if name == "broken"
        ));
    }

    #[test]
    fn missing_servers_object_and_bad_json_are_configuration_errors() {
        assert!(matches!(
            ServersFile::parse(r#"{"servers": {}}"#),
            Err(ParseFailure::Config(ConfigError::Validation(_)))
        ));
        assert!(matches!(ServersFile::parse("{not json"), Err(ParseFailure::Json(_))));
    }

    #[test]
    fn load_reports_missing_and_malformed_files() {
        let missing = ServersFile::load(Path::new("no/such/mcp_servers.json"))
            .expect_err("missing file");
        assert!(matches!(missing, ConfigError::MissingServersFile { .. }));

        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("mcp_servers.json");
        fs::write(&path, "[1, 2").expect("write");
        let malformed = ServersFile::load(&path).expect_err("malformed json");
        assert!(matches!(malformed, ConfigError::ParseServersFile { .. }));

        fs::write(&path, DOCUMENT).expect("write");
        assert_eq!(ServersFile::load(&path).expect("valid file").len(), 2);
    }
}
