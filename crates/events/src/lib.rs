//! Canvas event bus.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`CanvasEvent`]: the event envelope; names live in
//!   `canvasgen_core::event_types`.
//! - [`EventLogger`]: background task writing every event to the log.

pub mod bus;
pub mod logger;

pub use bus::{CanvasEvent, EventBus};
pub use logger::EventLogger;
