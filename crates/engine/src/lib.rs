//! Canvas generation engine.
//!
//! Owns the per-canvas node state, dispatches generations under the
//! single-flight rule, reconciles results from the push feed and the
//! status poll, and autosaves canvases through a [`CanvasStore`].
//!
//! [`CanvasStore`]: canvasgen_core::backend::CanvasStore

pub mod autosave;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod persistence;
pub mod reconcile;
pub mod registry;
pub mod session;

pub use config::{AutosaveConfig, ConfigError, EngineConfig};
pub use engine::{Engine, EngineDeps};
pub use persistence::MemoryCanvasStore;
pub use registry::SessionLease;
pub use session::CanvasSession;
