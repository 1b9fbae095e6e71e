//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod canvas_snapshot_repo;

pub use canvas_snapshot_repo::CanvasSnapshotRepo;
