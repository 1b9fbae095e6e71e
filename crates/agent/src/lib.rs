//! Agent tool bridge.
//!
//! A closed set of canvas tools an agent runtime may call. Every tool goes
//! through the same [`CanvasSession`](canvasgen_engine::CanvasSession) and
//! dispatcher entry points as the HTTP handlers and reports failure as a
//! string the agent can read and recover from.

pub mod bridge;
pub mod definitions;
pub mod tools;

pub use bridge::ToolBridge;
pub use definitions::tool_definitions;
pub use tools::ToolCall;
