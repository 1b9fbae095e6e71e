//! Model catalog: the capability-filtered list of AI models.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::node::NodeKind;
use crate::parameters::{validate_schema, ParameterSchema};

/// Default cost charged by the backend when a model does not declare one.
pub const DEFAULT_COST_PER_RUN: u32 = 4;

/// Capability class of a model. Catalogs of different kinds are disjoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ModelKind {
    Image,
    Video,
    Chat,
}

impl ModelKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelKind::Image => "IMAGE",
            ModelKind::Video => "VIDEO",
            ModelKind::Chat => "CHAT",
        }
    }
}

impl std::str::FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "IMAGE" => Ok(ModelKind::Image),
            "VIDEO" => Ok(ModelKind::Video),
            "CHAT" => Ok(ModelKind::Chat),
            other => Err(format!("Unknown model type '{other}'. Must be one of: IMAGE, VIDEO, CHAT")),
        }
    }
}

impl From<NodeKind> for ModelKind {
    fn from(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Image => ModelKind::Image,
            NodeKind::Video => ModelKind::Video,
        }
    }
}

fn default_cost() -> u32 {
    DEFAULT_COST_PER_RUN
}

fn default_active() -> bool {
    true
}

/// A generation model offered by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiModel {
    /// Identifier sent back on submit.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Node kind this model produces.
    #[serde(rename = "type")]
    pub kind: ModelKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Credits charged for one run.
    #[serde(rename = "cost_per_gen", default = "default_cost")]
    pub cost_per_run: u32,
    /// Inactive models stay listed but are never picked as a default.
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// Form fields the model accepts. Defaults seed a node's parameters
    /// when the model is selected.
    #[serde(
        rename = "parameters_schema",
        default,
        deserialize_with = "crate::types::null_as_default"
    )]
    /// Parameters the model accepts, in display order.
    pub parameter_schema: ParameterSchema,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

/// In-memory catalog. Order is preserved; the first active model of a
/// kind is that kind's default.
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    models: Vec<AiModel>,
}

impl ModelCatalog {
    pub fn new(models: Vec<AiModel>) -> Self {
        Self { models }
    }

    /// Every model, inactive ones included.
    pub fn all(&self) -> &[AiModel] {
        &self.models
    }

    /// Active models of `kind`.
    pub fn for_kind(&self, kind: ModelKind) -> impl Iterator<Item = &AiModel> {
        self.models
            .iter()
            .filter(move |m| m.kind == kind && m.is_active)
    }

    /// Any model by id, regardless of kind or active flag.
    pub fn find(&self, id: &str) -> Option<&AiModel> {
        self.models.iter().find(|m| m.id == id)
    }

    /// An active model usable by nodes of `kind`.
    pub fn find_for(&self, kind: NodeKind, id: &str) -> Option<&AiModel> {
        self.for_kind(kind.into()).find(|m| m.id == id)
    }

    /// First active model for the kind.
    pub fn default_for(&self, kind: NodeKind) -> Option<&AiModel> {
        self.for_kind(kind.into()).next()
    }

    /// Validate every model's parameter schema.
    pub fn validate(&self) -> Result<(), CoreError> {
        for model in &self.models {
            validate_schema(&model.parameter_schema).map_err(|e| {
                CoreError::Validation(format!("model '{}': {e}", model.id))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(id: &str, kind: ModelKind, active: bool) -> AiModel {
        AiModel {
            id: id.into(),
            name: id.into(),
            kind,
            provider: None,
            cost_per_run: 4,
            is_active: active,
            parameter_schema: Vec::new(),
            icon_url: None,
        }
    }

    fn catalog() -> ModelCatalog {
        ModelCatalog::new(vec![
            model("chat-1", ModelKind::Chat, true),
            model("img-off", ModelKind::Image, false),
            model("img-1", ModelKind::Image, true),
            model("img-2", ModelKind::Image, true),
            model("vid-1", ModelKind::Video, true),
        ])
    }

    #[test]
    fn default_is_first_active_of_kind() {
        let c = catalog();
        assert_eq!(c.default_for(NodeKind::Image).map(|m| m.id.as_str()), Some("img-1"));
        assert_eq!(c.default_for(NodeKind::Video).map(|m| m.id.as_str()), Some("vid-1"));
    }

    #[test]
    fn model_kind_parses_any_case() {
        assert_eq!("video".parse::<ModelKind>(), Ok(ModelKind::Video));
        assert_eq!("Chat".parse::<ModelKind>(), Ok(ModelKind::Chat));
        assert!("audio".parse::<ModelKind>().is_err());
    }

    #[test]
    fn find_for_respects_kind() {
        let c = catalog();
        assert!(c.find_for(NodeKind::Image, "img-2").is_some());
        assert!(c.find_for(NodeKind::Video, "img-2").is_none());
        assert!(c.find_for(NodeKind::Image, "chat-1").is_none());
        assert!(c.find_for(NodeKind::Image, "img-off").is_none());
    }

    #[test]
    fn wire_format_parses_with_defaults() {
        let json = r#"{"id":"m","name":"M","type":"VIDEO","parameters_schema":null}"#;
        let m: AiModel = serde_json::from_str(json).unwrap();
        assert_eq!(m.kind, ModelKind::Video);
        assert_eq!(m.cost_per_run, DEFAULT_COST_PER_RUN);
        assert!(m.is_active);
        assert!(m.parameter_schema.is_empty());
    }

    #[test]
    fn validate_reports_model_id() {
        let mut bad = model("broken", ModelKind::Image, true);
        bad.parameter_schema = vec![crate::parameters::ParamDescriptor::new(
            "style",
            "Style",
            crate::parameters::ParamType::Select,
        )];
        let err = ModelCatalog::new(vec![bad]).validate().unwrap_err();
        assert!(err.to_string().contains("broken"));
    }
}
