//! Generation node: the unit of work placed on a canvas.

use serde::{Deserialize, Serialize};

use crate::parameters::{parse_aspect_ratio, ParamMap, ASPECT_RATIO_KEY};
use crate::references::ReferenceSet;
use crate::types::{null_as_default, NodeId};

// ---------------------------------------------------------------------------
// Geometry constants
// ---------------------------------------------------------------------------

/// Fixed width of image nodes.
pub const IMAGE_NODE_WIDTH: f64 = 400.0;
/// Fixed width of video nodes.
pub const VIDEO_NODE_WIDTH: f64 = 500.0;
/// Height of the node chrome (prompt, controls) without media.
pub const BASE_HEIGHT: f64 = 450.0;
/// Initial height of freshly created video nodes.
pub const VIDEO_INITIAL_HEIGHT: f64 = 500.0;
/// Spacing below the rendered media.
pub const MEDIA_MARGIN: f64 = 20.0;
/// Horizontal gap used when placing a node next to the rightmost one.
pub const NODE_SPACING: f64 = 50.0;

/// Aspect ratio assumed for images without an `aspect_ratio` parameter.
pub const DEFAULT_IMAGE_ASPECT: (f64, f64) = (1.0, 1.0);
/// Aspect ratio assumed for videos without an `aspect_ratio` parameter.
pub const DEFAULT_VIDEO_ASPECT: (f64, f64) = (16.0, 9.0);

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// What a node produces. Immutable after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Image,
    Video,
}

impl NodeKind {
    /// Fixed node width per kind.
    pub fn width(self) -> f64 {
        match self {
            NodeKind::Image => IMAGE_NODE_WIDTH,
            NodeKind::Video => VIDEO_NODE_WIDTH,
        }
    }

    /// Height before any result is shown.
    pub fn initial_height(self) -> f64 {
        match self {
            NodeKind::Image => BASE_HEIGHT,
            NodeKind::Video => VIDEO_INITIAL_HEIGHT,
        }
    }

    /// Aspect ratio assumed when the node has none set, as `(w, h)`.
    pub fn default_aspect(self) -> (f64, f64) {
        match self {
            NodeKind::Image => DEFAULT_IMAGE_ASPECT,
            NodeKind::Video => DEFAULT_VIDEO_ASPECT,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Image => "image",
            NodeKind::Video => "video",
        }
    }
}

impl std::str::FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "image" => Ok(NodeKind::Image),
            "video" => Ok(NodeKind::Video),
            other => Err(format!("Unknown node type '{other}'. Must be one of: image, video")),
        }
    }
}

/// How a video node interprets its references.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoMode {
    #[default]
    FirstLastFrame,
    MultiReference,
}

/// Lifecycle status of a node.
///
/// `Idle -> Generating -> {Completed, Failed}`; a terminal node may
/// re-enter `Generating`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    #[default]
    Idle,
    Generating,
    Completed,
    Failed,
}

impl NodeStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, NodeStatus::Completed | NodeStatus::Failed)
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// Position and size on the canvas, in canvas units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

/// A generation node as stored in the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationNode {
    /// Stable for the node's lifetime; also the job correlation key.
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub prompt: String,
    /// Selected model. Empty until one is chosen or a default exists.
    #[serde(default)]
    pub model_id: String,
    /// Model parameter values, merged key by key on update.
    #[serde(default, deserialize_with = "null_as_default")]
    pub parameters: ParamMap,
    /// Uploaded assets attached as generation inputs.
    #[serde(default, deserialize_with = "null_as_default")]
    pub references: ReferenceSet,
    /// Reference interpretation. Always set for video nodes, never for images.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<VideoMode>,
    /// At most one node per canvas is `Generating`.
    #[serde(default)]
    pub status: NodeStatus,
    /// Output of the last completed run. Cleared when a run starts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    /// Height follows the selected aspect ratio.
    pub geometry: Geometry,
}

impl GenerationNode {
    /// Re-establish invariants after loading from an external source.
    pub fn normalize(&mut self) {
        self.geometry.w = self.kind.width();
        match self.kind {
            NodeKind::Video => {
                self.mode.get_or_insert_with(VideoMode::default);
            }
            NodeKind::Image => self.mode = None,
        }
        if self.status != NodeStatus::Completed {
            self.result_url = None;
        }
        self.references.dedup_frames();
    }

    /// Height the node takes once its media is shown.
    pub fn completed_height(&self) -> f64 {
        let (w, h) = self
            .parameters
            .get(ASPECT_RATIO_KEY)
            .and_then(|v| v.as_str())
            .and_then(parse_aspect_ratio)
            .unwrap_or_else(|| self.kind.default_aspect());
        BASE_HEIGHT + self.kind.width() * h / w + MEDIA_MARGIN
    }

    /// Submission URLs for the node's current kind and mode.
    pub fn submission_references(&self) -> Vec<String> {
        self.references.submission_urls(self.kind, self.mode)
    }
}

/// Caller-supplied fields for node creation. Everything else is derived.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewNode {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub model_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub parameters: ParamMap,
    #[serde(default)]
    pub mode: Option<VideoMode>,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::ParamValue;

    fn node(kind: NodeKind) -> GenerationNode {
        GenerationNode {
            id: "node:1".into(),
            kind,
            prompt: String::new(),
            model_id: String::new(),
            parameters: ParamMap::new(),
            references: ReferenceSet::new(),
            mode: None,
            status: NodeStatus::Idle,
            result_url: None,
            geometry: Geometry { x: 0.0, y: 0.0, w: 0.0, h: kind.initial_height() },
        }
    }

    #[test]
    fn image_height_defaults_to_square() {
        assert_eq!(node(NodeKind::Image).completed_height(), 450.0 + 400.0 + 20.0);
    }

    #[test]
    fn video_height_defaults_to_sixteen_by_nine() {
        let expected = 450.0 + 500.0 * 9.0 / 16.0 + 20.0;
        assert_eq!(node(NodeKind::Video).completed_height(), expected);
    }

    #[test]
    fn height_follows_aspect_parameter() {
        let mut n = node(NodeKind::Image);
        n.parameters.insert(ASPECT_RATIO_KEY.into(), ParamValue::from("16:9"));
        assert_eq!(n.completed_height(), 450.0 + 225.0 + 20.0);
    }

    #[test]
    fn malformed_aspect_falls_back() {
        let mut n = node(NodeKind::Image);
        n.parameters.insert(ASPECT_RATIO_KEY.into(), ParamValue::from("wide"));
        assert_eq!(n.completed_height(), 870.0);
    }

    #[test]
    fn normalize_establishes_mode_and_width() {
        let mut n = node(NodeKind::Video);
        n.result_url = Some("stale".into());
        n.normalize();
        assert_eq!(n.mode, Some(VideoMode::FirstLastFrame));
        assert_eq!(n.geometry.w, VIDEO_NODE_WIDTH);
        assert_eq!(n.result_url, None);

        let mut img = node(NodeKind::Image);
        img.mode = Some(VideoMode::MultiReference);
        img.normalize();
        assert_eq!(img.mode, None);
    }

    #[test]
    fn null_collections_deserialize_empty() {
        let json = r#"{
            "id":"node:1","type":"image","parameters":null,"references":null,
            "geometry":{"x":0,"y":0,"w":400,"h":450}
        }"#;
        let n: GenerationNode = serde_json::from_str(json).unwrap();
        assert!(n.parameters.is_empty());
        assert!(n.references.is_empty());
        assert_eq!(n.status, NodeStatus::Idle);
    }

    #[test]
    fn kind_parses_case_insensitively() {
        assert_eq!("VIDEO".parse::<NodeKind>(), Ok(NodeKind::Video));
        assert!("audio".parse::<NodeKind>().is_err());
    }
}
