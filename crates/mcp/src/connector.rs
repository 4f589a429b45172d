use std::collections::BTreeMap;

use async_trait::async_trait;
use paygate_agent::{SessionFactory, ToolSession};
use paygate_core::config::{ConfigError, McpConfig};
use paygate_core::servers::prune_remote;
use paygate_core::{McpServerConfig, ServerTransport, ServersFile, ToolError};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use rmcp::service::RunningService;
use rmcp::transport::streamable_http_client::StreamableHttpClientTransportConfig;
use rmcp::transport::{StreamableHttpClientTransport, TokioChildProcess};
use rmcp::{RoleClient, ServiceExt};
use tokio::process::Command;
use tracing::{info, warn};

use crate::session::{McpSession, ServerHandle};
use crate::McpError;

/// Opens a fresh set of MCP connections for every run.
#[derive(Clone, Debug)]
pub struct McpConnector {
    servers: Vec<McpServerConfig>,
}

impl McpConnector {
    pub fn new(servers: Vec<McpServerConfig>) -> Self {
        Self { servers }
    }

    /// Loads the servers file named in `config`, dropping remote servers
    /// unless they are explicitly enabled.
    pub fn from_config(config: &McpConfig) -> Result<Self, ConfigError> {
        let declared = ServersFile::load(&config.servers_config)?;
        let total = declared.len();
        let servers = prune_remote(declared, config.enable_remote);
        if servers.len() < total {
            info!(
                event_name = "mcp.servers.remote_pruned",
                pruned = total - servers.len(),
                "remote servers are disabled; skipping them"
            );
        }
        Ok(Self::new(servers))
    }

    pub fn servers(&self) -> &[McpServerConfig] {
        &self.servers
    }

    async fn connect(server: &McpServerConfig) -> Result<RunningService<RoleClient, ()>, McpError> {
        match &server.transport {
            ServerTransport::Stdio { command, args, env, cwd } => {
                let mut process = Command::new(command);
                process.args(args).envs(env);
                if let Some(cwd) = cwd {
                    process.current_dir(cwd);
                }
                let transport = TokioChildProcess::new(process)
                    .map_err(|source| McpError::Spawn { server: server.name.clone(), source })?;
                ().serve(transport).await.map_err(|error| handshake_error(&server.name, error))
            }
            ServerTransport::Remote { url, headers } => {
                let client = http_client(&server.name, headers)?;
                let transport = StreamableHttpClientTransport::with_client(
                    client,
                    StreamableHttpClientTransportConfig::with_uri(url.as_str()),
                );
                ().serve(transport).await.map_err(|error| handshake_error(&server.name, error))
            }
        }
    }
}

fn handshake_error(server: &str, error: impl std::fmt::Display) -> McpError {
    McpError::Handshake { server: server.to_string(), message: error.to_string() }
}

fn http_client(
    server: &str,
    headers: &BTreeMap<String, String>,
) -> Result<reqwest::Client, McpError> {
    let header_error =
        |message: String| McpError::Header { server: server.to_string(), message };

    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|error| header_error(format!("{name}: {error}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|error| header_error(format!("{name}: {error}")))?;
        map.insert(name, value);
    }

    reqwest::Client::builder()
        .default_headers(map)
        .build()
        .map_err(|error| header_error(error.to_string()))
}

#[async_trait]
impl SessionFactory for McpConnector {
    async fn open(&self) -> Result<Box<dyn ToolSession>, ToolError> {
        let qualify = self.servers.len() > 1;
        let mut connected = Vec::with_capacity(self.servers.len());

        for server in &self.servers {
            let service = match Self::connect(server).await {
                Ok(service) => service,
                Err(error) => {
                    warn!(
                        event_name = "mcp.server.connect_failed",
                        server = %server.name,
                        error = %error,
                        "could not connect to server"
                    );
                    return Err(error.into());
                }
            };

            let tools = service.list_all_tools().await.map_err(|error| McpError::Listing {
                server: server.name.clone(),
                message: error.to_string(),
            })?;
            info!(
                event_name = "mcp.server.connected",
                server = %server.name,
                remote = server.is_remote(),
                tools = tools.len(),
                "server connected"
            );
            connected.push((ServerHandle { name: server.name.clone(), service }, tools));
        }

        Ok(Box::new(McpSession::assemble(connected, qualify)?))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::io::Write;

    use paygate_agent::{SessionFactory, ToolSession};
    use paygate_core::config::McpConfig;
    use paygate_core::{McpServerConfig, ServerTransport, ToolError};

    use super::{http_client, McpConnector};
    use crate::McpError;

    fn servers_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(contents.as_bytes()).expect("write");
        file
    }

    const MIXED: &str = r#"{
        "mcpServers": {
            "shop": { "command": "shop-server", "args": ["--stdio"] },
            "remote": { "url": "https://tools.example.com/mcp" }
        }
    }"#;

    #[test]
    fn remote_servers_are_pruned_unless_enabled() {
        let file = servers_file(MIXED);

        let local_only = McpConnector::from_config(&McpConfig {
            servers_config: file.path().to_path_buf(),
            enable_remote: false,
        })
        .expect("load");
        let names: Vec<_> = local_only.servers().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["shop"]);

        let all = McpConnector::from_config(&McpConfig {
            servers_config: file.path().to_path_buf(),
            enable_remote: true,
        })
        .expect("load");
        assert_eq!(all.servers().len(), 2);
    }

    #[test]
    fn invalid_headers_are_reported_per_server() {
        let headers = BTreeMap::from([("bad header".to_string(), "x".to_string())]);
        let error = http_client("remote", &headers).expect_err("invalid header name");
        assert!(matches!(error, McpError::Header { ref server, .. } if server == "remote"));

        let ok = BTreeMap::from([("Authorization".to_string(), "Bearer token".to_string())]);
        assert!(http_client("remote", &ok).is_ok());
    }

    #[tokio::test]
    async fn no_servers_yields_an_empty_catalog() {
        let session = McpConnector::new(Vec::new()).open().await.expect("session");
        assert!(session.catalog().is_empty());
        session.close().await;
    }

    #[tokio::test]
    async fn missing_commands_fail_to_connect() {
        let connector = McpConnector::new(vec![McpServerConfig {
            name: "ghost".to_string(),
            transport: ServerTransport::Stdio {
                command: "paygate-test-command-that-does-not-exist".to_string(),
                args: Vec::new(),
                env: BTreeMap::new(),
                cwd: None,
            },
        }]);

        let error = connector.open().await.err().expect("spawn fails");
        assert!(matches!(
            error,
            ToolError::Connection(ref message) if message.contains("ghost")
        ));
    }
}
