use thiserror::Error;

use crate::{catalog::CatalogError, config::ConfigError, flows::GraphError};

/// The oracle could not produce a usable answer.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum OracleError {
    #[error("oracle transport failure: {0}")]
    Transport(String),
    #[error("oracle returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("oracle response could not be decoded: {0}")]
    MalformedResponse(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("tool `{0}` is not in the catalog")]
    UnknownTool(String),
    #[error("tool `{tool}` failed: {message}")]
    Invocation { tool: String, message: String },
    #[error("tool provider connection failed: {0}")]
    Connection(String),
}

/// Failures that end a run without producing output.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Oracle(#[from] OracleError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("tool provider unavailable: {0}")]
    Connection(String),
    #[error(transparent)]
    Configuration(#[from] ConfigError),
}

impl From<ToolError> for RunError {
    fn from(value: ToolError) -> Self {
        Self::Connection(value.to_string())
    }
}

impl RunError {
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Oracle(_) => "oracle_unavailable",
            Self::Graph(_) => "flow_invariant",
            Self::Catalog(_) => "catalog_invalid",
            Self::Connection(_) => "tool_provider_unavailable",
            Self::Configuration(_) => "config_validation",
        }
    }

    pub fn user_message(&self) -> String {
        let hint = match self {
            Self::Oracle(_) => "언어 모델 서비스에 연결할 수 없습니다. 잠시 후 다시 시도해 주세요.",
            Self::Connection(_) | Self::Catalog(_) => {
                "도구 제공 서버에 연결할 수 없습니다. 잠시 후 다시 시도해 주세요."
            }
            Self::Configuration(_) => "서비스 설정이 올바르지 않습니다.",
            Self::Graph(_) => "예기치 않은 내부 오류가 발생했습니다.",
        };
        format!("처리 중 오류가 발생했습니다: {hint}")
    }
}

#[cfg(test)]
mod tests {
    use crate::catalog::CatalogError;
    use crate::config::ConfigError;
    use crate::errors::{OracleError, RunError, ToolError};
    use crate::flows::GraphError;

    #[test]
    fn oracle_failures_map_to_service_unavailable_message() {
        let error = RunError::from(OracleError::Transport("connection refused".to_string()));

        assert_eq!(error.error_class(), "oracle_unavailable");
        assert_eq!(
            error.user_message(),
            "처리 중 오류가 발생했습니다: 언어 모델 서비스에 연결할 수 없습니다. 잠시 후 다시 시도해 주세요."
        );
        assert!(!error.user_message().contains("connection refused"));
    }

    #[test]
    fn tool_connection_errors_become_run_connection_failures() {
        let error = RunError::from(ToolError::Connection("spawn failed".to_string()));

        assert!(matches!(error, RunError::Connection(ref message) if message.contains("spawn failed")));
        assert_eq!(error.error_class(), "tool_provider_unavailable");
    }

    #[test]
    fn graph_and_catalog_errors_have_distinct_classes() {
        assert_eq!(RunError::from(GraphError::OutputAlreadySet).error_class(), "flow_invariant");
        assert_eq!(
            RunError::from(CatalogError::DuplicateTool("pay".to_string())).error_class(),
            "catalog_invalid"
        );
        assert_eq!(
            RunError::from(ConfigError::Validation("bad".to_string())).error_class(),
            "config_validation"
        );
    }
}
