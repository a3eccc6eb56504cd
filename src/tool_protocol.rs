//! Tool description types shared between the LLM request builder and the
//! tool executor, narrowed to the fixed three-tool surface this runtime
//! declares.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The result of one tool invocation, handed back to the agent as a
/// `tool_result` turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub output: serde_json::Value,
    pub error: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ToolResult {
    pub fn success(output: serde_json::Value) -> Self {
        Self { success: true, output, error: None, metadata: HashMap::new() }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self { success: false, output: serde_json::Value::Null, error: Some(error.into()), metadata: HashMap::new() }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ToolParameterType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ToolParameterType,
    pub description: Option<String>,
    pub required: bool,
    pub default: Option<serde_json::Value>,
    pub items: Option<Box<ToolParameterType>>,
    pub properties: Option<HashMap<String, ToolParameter>>,
}

impl ToolParameter {
    pub fn new(name: impl Into<String>, param_type: ToolParameterType) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: None,
            required: false,
            default: None,
            items: None,
            properties: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Declared shape of one tool, sent to the LLM alongside the request as
/// part of the optional `tools` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolMetadata {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ToolParameter>,
}

impl ToolMetadata {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self { name: name.into(), description: description.into(), parameters: Vec::new() }
    }

    pub fn with_parameter(mut self, param: ToolParameter) -> Self {
        self.parameters.push(param);
        self
    }
}

/// The three tools an agent may declare and invoke. Shared by
/// the LLM request builder (to advertise the surface) and the tool executor
/// dispatch (to validate the name).
pub fn builtin_tools() -> Vec<ToolMetadata> {
    vec![
        ToolMetadata::new("bash", "Run a shell command in the agent's workspace.")
            .with_parameter(
                ToolParameter::new("command", ToolParameterType::String)
                    .with_description("Shell command to execute.")
                    .required(),
            ),
        ToolMetadata::new(
            "str_replace_based_edit_tool",
            "View and edit files in the agent's workspace. Commands: view, create, str_replace, insert.",
        )
        .with_parameter(
            ToolParameter::new("command", ToolParameterType::String)
                .with_description("One of view, create, str_replace, insert.")
                .required(),
        )
        .with_parameter(ToolParameter::new("path", ToolParameterType::String).required())
        .with_parameter(ToolParameter::new("file_text", ToolParameterType::String))
        .with_parameter(ToolParameter::new("old_str", ToolParameterType::String))
        .with_parameter(ToolParameter::new("new_str", ToolParameterType::String))
        .with_parameter(ToolParameter::new("insert_line", ToolParameterType::Integer)),
        ToolMetadata::new(
            "memory",
            "Persistent key-value file store scoped to this agent or shared room-wide. Commands: view, create, str_replace, insert, delete, rename.",
        )
        .with_parameter(
            ToolParameter::new("command", ToolParameterType::String)
                .with_description("One of view, create, str_replace, insert, delete, rename.")
                .required(),
        )
        .with_parameter(ToolParameter::new("path", ToolParameterType::String).required())
        .with_parameter(ToolParameter::new("file_text", ToolParameterType::String))
        .with_parameter(ToolParameter::new("old_str", ToolParameterType::String))
        .with_parameter(ToolParameter::new("new_str", ToolParameterType::String))
        .with_parameter(ToolParameter::new("insert_line", ToolParameterType::Integer))
        .with_parameter(ToolParameter::new("new_path", ToolParameterType::String)),
    ]
}

fn parameter_type_to_json(param_type: &ToolParameterType) -> &'static str {
    match param_type {
        ToolParameterType::String => "string",
        ToolParameterType::Number => "number",
        ToolParameterType::Integer => "integer",
        ToolParameterType::Boolean => "boolean",
        ToolParameterType::Array => "array",
        ToolParameterType::Object => "object",
    }
}

/// Renders a tool's declared parameters as a JSON Schema `input_schema`
/// object, the shape the Anthropic Messages API expects per tool.
pub fn parameters_to_json_schema(parameters: &[ToolParameter]) -> serde_json::Value {
    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();
    for param in parameters {
        let mut schema = serde_json::json!({ "type": parameter_type_to_json(&param.param_type) });
        if let Some(description) = &param.description {
            schema["description"] = serde_json::Value::String(description.clone());
        }
        if let Some(items) = &param.items {
            schema["items"] = serde_json::json!({ "type": parameter_type_to_json(items) });
        }
        properties.insert(param.name.clone(), schema);
        if param.required {
            required.push(serde_json::Value::String(param.name.clone()));
        }
    }
    serde_json::json!({
        "type": "object",
        "properties": serde_json::Value::Object(properties),
        "required": required,
    })
}
