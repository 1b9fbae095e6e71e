//! Tool execution against a canvas session.

use std::sync::Arc;

use canvasgen_core::catalog::AiModel;
use canvasgen_core::error::CoreError;
use canvasgen_core::node::{NewNode, NodeKind};
use canvasgen_core::parameters::{params_from_json, validate_values, ParamMap};
use canvasgen_core::types::CanvasId;
use canvasgen_engine::{CanvasSession, Engine};
use serde_json::Value;

use crate::tools::{AnalyzeCanvasArgs, CreateAiNodeArgs, NodeArgs, ToolCall, UpdateNodeSettingsArgs};

/// `Ok` carries the confirmation shown to the agent, `Err` the reason the
/// call failed. Both are plain text.
pub type ToolResult = Result<String, String>;

/// Render a core error as the string an agent sees.
fn tool_error(err: CoreError) -> String {
    match err {
        CoreError::StaleNodeReference(id) => {
            format!("Error: Node with ID {id} not found or is not an AI node")
        }
        other => format!("Error: {other}"),
    }
}

/// Tool arguments carry parameters as a loose JSON object.
fn parse_parameters(value: Option<&Value>) -> Result<ParamMap, String> {
    match value {
        None | Some(Value::Null) => Ok(ParamMap::new()),
        Some(value) => params_from_json(value).map_err(tool_error),
    }
}

/// Validate parameter values against the model's schema. Without a model
/// there is nothing to check against yet.
fn check_parameters(model: Option<&AiModel>, params: &ParamMap) -> Result<(), String> {
    match model {
        Some(model) => validate_values(&model.parameter_schema, params).map_err(tool_error),
        None => Ok(()),
    }
}

/// Executes agent tool calls against the canvas engine.
///
/// Every call resolves to a [`ToolResult`]; failures are reported in the
/// result text so the agent can read and react to them.
pub struct ToolBridge {
    engine: Arc<Engine>,
}

impl ToolBridge {
    /// Bridge backed by `engine`.
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }

    /// Parse and execute a raw call.
    pub async fn execute_raw(&self, canvas_id: CanvasId, name: &str, arguments: Value) -> ToolResult {
        let call = ToolCall::parse(name, arguments)?;
        self.execute(canvas_id, call).await
    }

    /// Run one tool call on `canvas_id`.
    pub async fn execute(&self, canvas_id: CanvasId, call: ToolCall) -> ToolResult {
        let tool = call.name();
        tracing::info!(%canvas_id, tool, "Executing agent tool");

        let session = self.engine.session(canvas_id).await.map_err(tool_error)?;
        let result = match call {
            ToolCall::CreateAiNode(args) => self.create_ai_node(&session, args).await,
            ToolCall::UpdateNodeSettings(args) => self.update_node_settings(&session, args).await,
            ToolCall::AnalyzeCanvas(args) => analyze_canvas(&session, args).await,
            ToolCall::GenerateContent(args) => self.generate_content(&session, args).await,
            ToolCall::DeleteNode(args) => delete_node(&session, args).await,
        };

        if let Err(message) = &result {
            tracing::warn!(%canvas_id, tool, error = %message, "Agent tool failed");
        }
        result
    }

    /// Create a node, apply the requested model and parameters, and run it
    /// right away when the arguments ask for that.
    async fn create_ai_node(&self, session: &CanvasSession, args: CreateAiNodeArgs) -> ToolResult {
        let kind: NodeKind = args.kind.parse().map_err(|e: String| format!("Error: {e}"))?;
        let catalog = self.engine.catalog();
        let model = match args.model_id.as_deref().filter(|id| !id.is_empty()) {
            Some(id) => Some(catalog.find_for(kind, id).ok_or_else(|| {
                format!("Error: Model '{id}' is not available for {} nodes", kind.as_str())
            })?),
            None => catalog.default_for(kind),
        };
        let parameters = parse_parameters(args.parameters.as_ref())?;
        check_parameters(model, &parameters)?;

        let node = session
            .create_node(
                kind,
                NewNode {
                    prompt: args.prompt.clone(),
                    model_id: model.map(|m| m.id.clone()).unwrap_or_default(),
                    parameters,
                    mode: None,
                    x: args.x,
                    y: args.y,
                },
            )
            .await
            .map_err(tool_error)?;

        Ok(format!(
            "Successfully created {} generation node {} with prompt: \"{}\"",
            kind.as_str(),
            node.id,
            args.prompt
        ))
    }

    /// Everything is validated before the first change is applied.
    async fn update_node_settings(
        &self,
        session: &CanvasSession,
        args: UpdateNodeSettingsArgs,
    ) -> ToolResult {
        let node = session
            .node(&args.node_id)
            .await
            .ok_or_else(|| tool_error(CoreError::StaleNodeReference(args.node_id.clone())))?;

        let catalog = self.engine.catalog();
        let model = match args.model_id.as_deref() {
            Some(id) => Some(catalog.find_for(node.kind, id).ok_or_else(|| {
                format!("Error: Model '{id}' is not available for {} nodes", node.kind.as_str())
            })?),
            None => catalog.find_for(node.kind, &node.model_id),
        };
        let parameters = match args.parameters.as_ref() {
            Some(value) => {
                let params = parse_parameters(Some(value))?;
                check_parameters(model, &params)?;
                Some(params)
            }
            None => None,
        };

        if let Some(prompt) = args.prompt {
            session
                .update_prompt(&node.id, prompt)
                .await
                .map_err(tool_error)?;
        }
        if let (Some(_), Some(model)) = (&args.model_id, model) {
            session
                .select_model(&node.id, &model.id)
                .await
                .map_err(tool_error)?;
        }
        if let Some(parameters) = parameters {
            session
                .update_parameters(&node.id, parameters)
                .await
                .map_err(tool_error)?;
        }

        Ok(format!("Successfully updated node {}", node.id))
    }

    /// Start a run with the node's stored prompt, model and parameters.
    async fn generate_content(&self, session: &CanvasSession, args: NodeArgs) -> ToolResult {
        let node = session
            .node(&args.node_id)
            .await
            .ok_or_else(|| tool_error(CoreError::StaleNodeReference(args.node_id.clone())))?;

        if node.prompt.trim().is_empty() {
            return Err(format!(
                "Error: Node {} does not have a prompt. Please set a prompt first using update_node_settings.",
                node.id
            ));
        }
        if node.model_id.is_empty() {
            return Err(format!(
                "Error: Node {} does not have a model selected. Please select a model first using update_node_settings.",
                node.id
            ));
        }

        self.engine
            .dispatch(session.id(), &node.id, None)
            .await
            .map_err(tool_error)?;

        Ok(format!(
            "Generation started for node {}. The node will generate content using model {} with prompt: \"{}\"",
            node.id, node.model_id, node.prompt
        ))
    }
}

/// Summaries of all nodes, or of the selected ones only.
async fn analyze_canvas(session: &CanvasSession, args: AnalyzeCanvasArgs) -> ToolResult {
    let summaries = session.analyze(args.include_selected).await;
    if summaries.is_empty() {
        return Ok("No AI nodes found on the canvas.".to_string());
    }
    let json = serde_json::to_string_pretty(&summaries)
        .map_err(|e| format!("Error: Failed to serialize canvas: {e}"))?;
    Ok(format!(
        "Found {} AI node(s) on canvas:\n{json}",
        summaries.len()
    ))
}

/// Remove a node; a running job on it is no longer tracked.
async fn delete_node(session: &CanvasSession, args: NodeArgs) -> ToolResult {
    let removed = session.delete_node(&args.node_id).await.map_err(tool_error)?;
    Ok(format!("Successfully deleted node {}", removed.id))
}
