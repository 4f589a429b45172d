//! Tool Catalog: the callable actions a tool provider exposes for one run.
//!
//! Argument schemas are advisory. They describe tools to the oracle and feed
//! [`ArgValidator`], but the remote endpoint stays authoritative for what it
//! accepts.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
}

impl ParamType {
    /// Anything the schema does not name explicitly is treated as a string.
    pub fn from_schema_type(raw: Option<&str>) -> Self {
        match raw {
            Some("integer") => Self::Integer,
            Some("number") => Self::Number,
            Some("boolean") => Self::Boolean,
            Some("object") => Self::Object,
            Some("array") => Self::Array,
            _ => Self::String,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }

    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub kind: ParamType,
    pub required: bool,
    pub description: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgSchema {
    params: Vec<(String, ParamSpec)>,
}

impl ArgSchema {
    /// Reads `properties` and `required` from a JSON-schema object. A missing
    /// or non-object schema yields an empty parameter list.
    pub fn from_json_schema(schema: &Value) -> Self {
        let required: Vec<&str> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let params = schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|properties| {
                properties
                    .iter()
                    .map(|(name, property)| {
                        let spec = ParamSpec {
                            kind: ParamType::from_schema_type(
                                property.get("type").and_then(Value::as_str),
                            ),
                            required: required.contains(&name.as_str()),
                            description: property
                                .get("description")
                                .and_then(Value::as_str)
                                .map(str::to_string),
                        };
                        (name.clone(), spec)
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self { params }
    }

    pub fn params(&self) -> &[(String, ParamSpec)] {
        &self.params
    }

    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|(param, _)| param == name).map(|(_, spec)| spec)
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub schema: ArgSchema,
    /// The schema exactly as the provider published it, forwarded to the oracle.
    pub input_schema: Value,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        let input_schema = if input_schema.is_object() {
            input_schema
        } else {
            serde_json::json!({ "type": "object", "properties": {} })
        };
        Self {
            name: name.into(),
            description: description.into(),
            schema: ArgSchema::from_json_schema(&input_schema),
            input_schema,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("tool `{0}` is published more than once")]
    DuplicateTool(String),
}

/// Immutable, ordered set of tools with unique names.
#[derive(Clone, Debug, Default)]
pub struct ToolCatalog {
    tools: Vec<ToolDescriptor>,
    index: HashMap<String, usize>,
}

impl ToolCatalog {
    pub fn new(tools: Vec<ToolDescriptor>) -> Result<Self, CatalogError> {
        let mut index = HashMap::with_capacity(tools.len());
        for (position, tool) in tools.iter().enumerate() {
            if index.insert(tool.name.clone(), position).is_some() {
                return Err(CatalogError::DuplicateTool(tool.name.clone()));
            }
        }
        Ok(Self { tools, index })
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.index.get(name).map(|position| &self.tools[*position])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|tool| tool.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn render_for_prompt(&self) -> String {
        if self.tools.is_empty() {
            return "(no tools)".to_string();
        }
        self.tools
            .iter()
            .map(|tool| format!("- {}: {}", tool.name, tool.description))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArgIssue {
    MissingRequired { param: String },
    TypeMismatch { param: String, expected: ParamType },
}

impl std::fmt::Display for ArgIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingRequired { param } => write!(f, "missing required argument `{param}`"),
            Self::TypeMismatch { param, expected } => {
                write!(f, "argument `{param}` should be of type {}", expected.as_str())
            }
        }
    }
}

/// Structural check of call arguments: required presence and primitive type.
#[derive(Clone, Debug)]
pub struct ArgValidator {
    schema: ArgSchema,
}

impl ArgValidator {
    pub fn for_tool(tool: &ToolDescriptor) -> Self {
        Self { schema: tool.schema.clone() }
    }

    pub fn validate(&self, args: &Map<String, Value>) -> Vec<ArgIssue> {
        let mut issues = Vec::new();
        for (name, spec) in self.schema.params() {
            match args.get(name) {
                None | Some(Value::Null) if spec.required => {
                    issues.push(ArgIssue::MissingRequired { param: name.clone() });
                }
                None | Some(Value::Null) => {}
                Some(value) if !spec.kind.accepts(value) => {
                    issues.push(ArgIssue::TypeMismatch { param: name.clone(), expected: spec.kind });
                }
                Some(_) => {}
            }
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map, Value};

    use super::{ArgIssue, ArgValidator, CatalogError, ParamType, ToolCatalog, ToolDescriptor};

    fn pay_tool() -> ToolDescriptor {
        ToolDescriptor::new(
            "pay",
            "Pay a given amount for an order",
            json!({
                "type": "object",
                "properties": {
                    "amount": { "type": "integer", "description": "amount in KRW" },
                    "memo": { "type": "string" },
                    "express": { "type": "boolean" }
                },
                "required": ["amount"]
            }),
        )
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn schema_parsing_reads_types_and_required_flags() {
        let tool = pay_tool();
        let amount = tool.schema.get("amount").expect("amount param");

        assert_eq!(amount.kind, ParamType::Integer);
        assert!(amount.required);
        assert_eq!(amount.description.as_deref(), Some("amount in KRW"));
        assert!(!tool.schema.get("memo").expect("memo param").required);
        assert_eq!(tool.schema.params().len(), 3);
    }

    #[test]
    fn missing_schema_becomes_empty_object_schema() {
        let tool = ToolDescriptor::new("ping", "", Value::Null);

        assert!(tool.schema.is_empty());
        assert_eq!(tool.input_schema["type"], "object");
    }

    #[test]
    fn unknown_schema_types_fall_back_to_string() {
        assert_eq!(ParamType::from_schema_type(Some("date-time")), ParamType::String);
        assert_eq!(ParamType::from_schema_type(None), ParamType::String);
    }

    #[test]
    fn validator_reports_missing_and_mistyped_arguments() {
        let validator = ArgValidator::for_tool(&pay_tool());

        assert!(validator.validate(&args(json!({ "amount": 10000 }))).is_empty());

        let issues = validator.validate(&args(json!({ "memo": 3, "express": "yes" })));
        assert_eq!(
            issues,
            vec![
                ArgIssue::MissingRequired { param: "amount".to_string() },
                ArgIssue::TypeMismatch { param: "memo".to_string(), expected: ParamType::String },
                ArgIssue::TypeMismatch {
                    param: "express".to_string(),
                    expected: ParamType::Boolean
                },
            ]
        );
    }

    #[test]
    fn integers_satisfy_number_params() {
        let tool = ToolDescriptor::new(
            "tip",
            "",
            json!({ "properties": { "ratio": { "type": "number" } }, "required": ["ratio"] }),
        );
        let validator = ArgValidator::for_tool(&tool);

        assert!(validator.validate(&args(json!({ "ratio": 1 }))).is_empty());
        assert!(validator.validate(&args(json!({ "ratio": 0.15 }))).is_empty());
    }

    #[test]
    fn catalog_rejects_duplicate_names_and_renders_prompt_lines() {
        let duplicate = ToolCatalog::new(vec![pay_tool(), pay_tool()]).expect_err("duplicate");
        assert_eq!(duplicate, CatalogError::DuplicateTool("pay".to_string()));

        let catalog = ToolCatalog::new(vec![pay_tool()]).expect("catalog");
        assert_eq!(catalog.render_for_prompt(), "- pay: Pay a given amount for an order");
        assert_eq!(catalog.names(), vec!["pay"]);
        assert!(catalog.get("refund").is_none());

        assert_eq!(ToolCatalog::default().render_for_prompt(), "(no tools)");
    }
}
