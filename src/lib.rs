//! dirscope: a headless directory-size explorer engine.
//!
//! Lazily expands directory nodes, computes subtree sizes in the background
//! with bounded concurrency, propagates results up the tree, keeps children
//! sorted while sizes are still arriving, and runs cancellable filename
//! searches. The engine is UI-agnostic: callers issue commands and pump
//! events from a single consumer context.

pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod fs;
pub mod tree;

pub use engine::{Engine, EngineOptions, SearchMatch};
pub use error::{Error, Result};
pub use event::Event;
pub use tree::{format_size, Node, NodeId, NodeKind, SizeState, SortMode, Tree};
