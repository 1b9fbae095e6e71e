//! Tool call payloads.

use serde::Deserialize;
use serde_json::Value;

/// Names of every tool the bridge executes, in definition order.
pub const TOOL_NAMES: &[&str] = &[
    "create_ai_node",
    "update_node_settings",
    "analyze_canvas",
    "generate_content",
    "delete_node",
];

/// A parsed tool call: `{"name": "...", "arguments": {...}}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "name", content = "arguments", rename_all = "snake_case")]
pub enum ToolCall {
    CreateAiNode(CreateAiNodeArgs),
    UpdateNodeSettings(UpdateNodeSettingsArgs),
    AnalyzeCanvas(AnalyzeCanvasArgs),
    GenerateContent(NodeArgs),
    DeleteNode(NodeArgs),
}

/// Arguments of `create_ai_node`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreateAiNodeArgs {
    /// `image` or `video`, parsed leniently by the bridge.
    #[serde(rename = "type")]
    pub kind: String,
    pub prompt: String,
    /// Falls back to the default model for the kind.
    #[serde(default)]
    pub model_id: Option<String>,
    /// Checked against the model's schema before anything is created.
    #[serde(default)]
    pub parameters: Option<Value>,
    /// Placed next to the rightmost node when absent.
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
}

/// Arguments of `update_node_settings`. Absent fields are left unchanged.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UpdateNodeSettingsArgs {
    pub node_id: String,
    /// Replaces the prompt.
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub model_id: Option<String>,
    /// Merged into the current parameters.
    #[serde(default)]
    pub parameters: Option<Value>,
}

/// Arguments of `analyze_canvas`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AnalyzeCanvasArgs {
    /// Only report selected nodes.
    #[serde(default)]
    pub include_selected: bool,
}

/// Arguments of the tools that address a single node.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NodeArgs {
    pub node_id: String,
}

impl ToolCall {
    /// Parse a call from its tool name and raw JSON arguments. Missing or
    /// `null` arguments are treated as `{}`.
    pub fn parse(name: &str, arguments: Value) -> Result<Self, String> {
        if !TOOL_NAMES.contains(&name) {
            return Err(format!(
                "Error: Unknown tool '{name}'. Available tools: {}",
                TOOL_NAMES.join(", ")
            ));
        }
        let arguments = match arguments {
            Value::Null => Value::Object(Default::default()),
            // Some runtimes deliver arguments as a JSON-encoded string.
            Value::String(text) => serde_json::from_str(&text)
                .map_err(|e| format!("Error: Invalid arguments for {name}: {e}"))?,
            other => other,
        };

        serde_json::from_value(serde_json::json!({ "name": name, "arguments": arguments }))
            .map_err(|e| format!("Error: Invalid arguments for {name}: {e}"))
    }

    /// Wire name of the tool.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateAiNode(_) => "create_ai_node",
            Self::UpdateNodeSettings(_) => "update_node_settings",
            Self::AnalyzeCanvas(_) => "analyze_canvas",
            Self::GenerateContent(_) => "generate_content",
            Self::DeleteNode(_) => "delete_node",
        }
    }
}
