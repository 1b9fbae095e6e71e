//! Function-calling schemas handed to the agent runtime.

use serde_json::{json, Value};

/// Wrap a JSON schema as an OpenAI `function` tool entry.
fn function(name: &str, description: &str, parameters: Value) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": name,
            "description": description,
            "parameters": parameters,
        }
    })
}

/// Parameters object for tools that take nothing but a `node_id`.
fn node_id_only(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "node_id": { "type": "string", "description": description }
        },
        "required": ["node_id"]
    })
}

/// Function-calling definitions for every tool, in the order the agent
/// is shown them.
pub fn tool_definitions() -> Vec<Value> {
    vec![
        function(
            "create_ai_node",
            "Create a new AI generation node (image or video) on the canvas. Use this when the user wants to generate new content.",
            json!({
                "type": "object",
                "properties": {
                    "type": {
                        "type": "string",
                        "enum": ["image", "video"],
                        "description": "The type of generation node to create"
                    },
                    "prompt": { "type": "string", "description": "The generation prompt for the AI model" },
                    "model_id": { "type": "string", "description": "Optional: specific model ID. Defaults to the first model of the node type" },
                    "parameters": { "type": "object", "description": "Optional: model-specific parameters (e.g. aspect_ratio, duration)" },
                    "x": { "type": "number", "description": "Optional: X position on canvas" },
                    "y": { "type": "number", "description": "Optional: Y position on canvas" }
                },
                "required": ["type", "prompt"]
            }),
        ),
        function(
            "update_node_settings",
            "Update the prompt, model or parameters of an existing AI generation node. Parameters are merged into the current ones.",
            json!({
                "type": "object",
                "properties": {
                    "node_id": { "type": "string", "description": "The ID of the node to update (see analyze_canvas)" },
                    "prompt": { "type": "string", "description": "Optional: new prompt" },
                    "model_id": { "type": "string", "description": "Optional: new model ID" },
                    "parameters": { "type": "object", "description": "Optional: parameters to change" }
                },
                "required": ["node_id"]
            }),
        ),
        function(
            "analyze_canvas",
            "Analyze the current canvas. Returns every AI node with its prompt, model, status and position. Use this before changing existing nodes.",
            json!({
                "type": "object",
                "properties": {
                    "include_selected": { "type": "boolean", "description": "If true, only analyze selected nodes" }
                }
            }),
        ),
        function(
            "generate_content",
            "Start generation for an existing AI node using its stored prompt, model and parameters. Only one node can generate at a time.",
            node_id_only("The ID of the node to generate content for"),
        ),
        function(
            "delete_node",
            "Delete an AI node from the canvas.",
            node_id_only("The ID of the node to delete"),
        ),
    ]
}
