//! Reference assets attached to a generation node.
//!
//! Image nodes submit generic references in insertion order. Video nodes in
//! first/last-frame mode submit `[start, end]` in that fixed order; in
//! multi-reference mode they submit the generic assets. The provider is
//! order-sensitive, so [`ReferenceSet::reorder_for_submission`] is the only
//! place that decides submission order.

use serde::{Deserialize, Serialize};

use crate::node::{NodeKind, VideoMode};

/// Role of a reference asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    #[serde(rename = "reference")]
    Generic,
    StartFrame,
    EndFrame,
}

impl ReferenceKind {
    /// Frame kinds are unique per node; generic references are not.
    pub fn is_frame(self) -> bool {
        matches!(self, ReferenceKind::StartFrame | ReferenceKind::EndFrame)
    }
}

/// An uploaded asset used as generation input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceAsset {
    /// Handle used to remove the asset.
    pub id: String,
    /// Sent to the backend as is.
    pub url: String,
    #[serde(rename = "type")]
    pub kind: ReferenceKind,
}

impl ReferenceAsset {
    /// New asset with a fresh id.
    pub fn new(url: impl Into<String>, kind: ReferenceKind) -> Self {
        Self {
            id: format!("ref-{}", uuid::Uuid::new_v4()),
            url: url.into(),
            kind,
        }
    }
}

/// Ordered references owned by one node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceSet(Vec<ReferenceAsset>);

impl ReferenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an asset. A start or end frame replaces an existing frame of
    /// the same kind in place.
    pub fn add(&mut self, asset: ReferenceAsset) {
        if asset.kind.is_frame() {
            if let Some(existing) = self.0.iter_mut().find(|a| a.kind == asset.kind) {
                *existing = asset;
                return;
            }
        }
        self.0.push(asset);
    }

    /// Remove by asset id, keeping the order of the rest.
    pub fn remove(&mut self, id: &str) -> Option<ReferenceAsset> {
        let index = self.0.iter().position(|a| a.id == id)?;
        Some(self.0.remove(index))
    }

    /// Collapse duplicate start or end frames, as [`add`](Self::add) would
    /// have. The first frame's position is kept with the last frame's asset.
    pub fn dedup_frames(&mut self) {
        for asset in std::mem::take(&mut self.0) {
            self.add(asset);
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReferenceAsset> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[ReferenceAsset] {
        &self.0
    }

    /// Assets a video node submits in `mode`, in submission order.
    pub fn reorder_for_submission(&self, mode: VideoMode) -> Vec<&ReferenceAsset> {
        match mode {
            VideoMode::FirstLastFrame => {
                let start = self.0.iter().find(|a| a.kind == ReferenceKind::StartFrame);
                let end = self.0.iter().find(|a| a.kind == ReferenceKind::EndFrame);
                start.into_iter().chain(end).collect()
            }
            VideoMode::MultiReference => self.generic().collect(),
        }
    }

    /// URLs submitted for a node of `kind`. Image nodes ignore the mode.
    pub fn submission_urls(&self, kind: NodeKind, mode: Option<VideoMode>) -> Vec<String> {
        match (kind, mode) {
            (NodeKind::Video, Some(mode)) => self
                .reorder_for_submission(mode)
                .into_iter()
                .map(|a| a.url.clone())
                .collect(),
            _ => self.generic().map(|a| a.url.clone()).collect(),
        }
    }

    fn generic(&self) -> impl Iterator<Item = &ReferenceAsset> {
        self.0.iter().filter(|a| a.kind == ReferenceKind::Generic)
    }
}

impl From<Vec<ReferenceAsset>> for ReferenceSet {
    fn from(assets: Vec<ReferenceAsset>) -> Self {
        let mut set = ReferenceSet::new();
        for asset in assets {
            set.add(asset);
        }
        set
    }
}
