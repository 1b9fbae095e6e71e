//! Domain model of the AI canvas: generation nodes, their state machine,
//! parameter schemas, reference assets and the model catalog.
//!
//! This crate performs no I/O. Collaborators (generation backend, job feed,
//! credit ledger, canvas store) are expressed as traits in [`backend`].

pub mod backend;
pub mod canvas;
pub mod catalog;
pub mod error;
pub mod event_types;
pub mod job;
pub mod node;
pub mod parameters;
pub mod references;
pub mod snapshot;
pub mod types;
