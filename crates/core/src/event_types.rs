//! Canvas event names published on the event bus and forwarded to browsers.

/// A node was added to the canvas.
pub const NODE_CREATED: &str = "node.created";
/// Prompt, model, parameters, references or geometry changed.
pub const NODE_UPDATED: &str = "node.updated";
/// A node was removed.
pub const NODE_DELETED: &str = "node.deleted";

/// A job was submitted and the node entered `Generating`.
pub const GENERATION_STARTED: &str = "generation.started";
/// The node received its result URL.
pub const GENERATION_COMPLETED: &str = "generation.completed";
/// Submission or the job itself failed; the payload carries the reason.
pub const GENERATION_FAILED: &str = "generation.failed";

/// A snapshot was written to the store.
pub const CANVAS_SAVED: &str = "canvas.saved";

/// First message on a canvas WebSocket: the full snapshot.
pub const CANVAS_SNAPSHOT: &str = "canvas.snapshot";
