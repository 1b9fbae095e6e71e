//! Row models.

pub mod canvas_snapshot;
