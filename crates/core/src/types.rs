/// Canvas node identifiers are opaque strings (`node:<uuid>`), stable for
/// the node's lifetime and used as the join key to backend jobs.
pub type NodeId = String;

/// Canvases (projects) are keyed by UUID.
pub type CanvasId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Allocate a fresh node identifier.
pub fn new_node_id() -> NodeId {
    format!("node:{}", uuid::Uuid::new_v4())
}

/// Deserialize a field that may be `null` or missing as its default value.
///
/// Snapshots written by older clients carry `"parameters": null` and
/// `"references": null`; readers must never observe those as absent.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + serde::Deserialize<'de>,
{
    use serde::Deserialize;
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
