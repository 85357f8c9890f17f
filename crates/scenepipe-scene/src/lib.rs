//! Scene-graph seam for the scenepipe export engine.
//!
//! The pipeline never talks to a host application directly. Everything it
//! needs from the scene goes through the [`SceneGraph`] trait, and everything
//! it writes to disk goes through [`InterchangeWriter`]. `MemoryScene` is a
//! complete in-memory implementation used by tests and headless runs.

pub mod graph;
pub mod memory;
pub mod writer;

pub use graph::SceneGraph;
pub use memory::MemoryScene;
pub use writer::{InterchangeWriter, JsonSnapshotWriter, RecordingWriter};
