//! Engine events and the worker→consumer message channel.
//!
//! Background tasks never touch the tree; they report over an unbounded
//! channel and the engine applies their results from the single consumer
//! context, then surfaces the public [`Event`]s below.

use std::path::PathBuf;

use tokio::sync::mpsc;

use crate::tree::NodeId;

/// Caller-facing engine events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A node's children were materialized, in display order.
    ChildrenLoaded { node: NodeId, children: Vec<NodeId> },
    /// A node's size resolved or was re-derived during propagation.
    SizeUpdated { node: NodeId, size: u64 },
    /// Every background sizing task for one operation finished.
    /// Fired exactly once per `expand`/`compute_size` call.
    SizesSettled { node: NodeId },
    /// A search hit, streamed as soon as it is found.
    SearchMatch { path: PathBuf, is_dir: bool },
    /// The search finished; `cancelled` distinguishes an early stop from an
    /// exhausted walk.
    SearchEnded { cancelled: bool },
}

/// Internal messages from background workers to the engine.
#[derive(Debug)]
pub(crate) enum WorkerMsg {
    /// A subtree's total size is known.
    SubtreeSized { node: NodeId, size: u64 },
    /// The last outstanding sizing task of an operation finished.
    OpSettled { node: NodeId },
    /// A search task found a match.
    SearchFound {
        generation: u64,
        path: PathBuf,
        is_dir: bool,
    },
    /// A search task finished.
    SearchDone { generation: u64, cancelled: bool },
}

pub(crate) type WorkerSender = mpsc::UnboundedSender<WorkerMsg>;
pub(crate) type WorkerReceiver = mpsc::UnboundedReceiver<WorkerMsg>;

/// The engine's internal worker channel.
pub(crate) fn worker_channel() -> (WorkerSender, WorkerReceiver) {
    mpsc::unbounded_channel()
}
