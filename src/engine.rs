//! The explorer engine: a single-consumer orchestrator over the node tree.
//!
//! Callers issue commands (`expand`, `compute_size`, `set_sort_mode`, the
//! search family) and pump [`Engine::next_event`]. All tree mutation happens
//! either inside a command or while applying one worker message inside
//! `next_event`, so ancestor size updates from concurrently completing
//! sibling subtrees are serialized by construction. Background tasks only
//! walk the filesystem and report over the worker channel.
//!
//! Engine methods that start background work must run inside a tokio
//! runtime.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::debug;

use crate::config::{DEFAULT_ENTRY_TIMEOUT_MS, DEFAULT_FAN_OUT, DEFAULT_SUBTREE_TIMEOUT_MS};
use crate::error::{Error, Result};
use crate::event::{worker_channel, Event, WorkerMsg, WorkerReceiver, WorkerSender};
use crate::fs::aggregator::{aggregate_dir_size, AggregateLimits};
use crate::fs::lister;
use crate::fs::policy::ScanPolicy;
use crate::fs::search::{spawn_search, SearchHandle};
use crate::tree::{NodeId, NodeKind, SizeState, SortMode, Tree};

/// Tunables for one engine instance.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Fan-out limit: concurrent filesystem work per sizing operation.
    pub fan_out: usize,
    pub limits: AggregateLimits,
    pub policy: ScanPolicy,
    pub sort_mode: SortMode,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            fan_out: DEFAULT_FAN_OUT,
            limits: AggregateLimits {
                entry_timeout: Duration::from_millis(DEFAULT_ENTRY_TIMEOUT_MS),
                subtree_timeout: Duration::from_millis(DEFAULT_SUBTREE_TIMEOUT_MS),
            },
            policy: ScanPolicy::platform_defaults(),
            sort_mode: SortMode::NameAscending,
        }
    }
}

/// One search hit, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchMatch {
    pub path: PathBuf,
    pub is_dir: bool,
}

/// Headless directory-explorer engine.
pub struct Engine {
    tree: Tree,
    policy: Arc<ScanPolicy>,
    limits: AggregateLimits,
    fan_out: usize,
    sort_mode: SortMode,
    tx: WorkerSender,
    rx: WorkerReceiver,
    /// Events produced but not yet pulled by the consumer.
    pending: VecDeque<Event>,
    /// In-flight sizing operations.
    calculating: usize,
    search: Option<SearchHandle>,
    search_generation: u64,
    matches: Vec<SearchMatch>,
    match_cursor: Option<usize>,
}

impl Engine {
    /// Create an engine rooted at `root`, which must be an existing
    /// directory.
    pub fn new(root: &Path, options: EngineOptions) -> Result<Self> {
        let meta = std::fs::metadata(root)
            .map_err(|_| Error::InvalidRoot(root.display().to_string()))?;
        if !meta.is_dir() {
            return Err(Error::InvalidRoot(root.display().to_string()));
        }
        let (tx, rx) = worker_channel();
        Ok(Self {
            tree: Tree::new(root),
            policy: Arc::new(options.policy),
            limits: options.limits,
            fan_out: options.fan_out,
            sort_mode: options.sort_mode,
            tx,
            rx,
            pending: VecDeque::new(),
            calculating: 0,
            search: None,
            search_generation: 0,
            matches: Vec::new(),
            match_cursor: None,
        })
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn root(&self) -> NodeId {
        self.tree.root()
    }

    pub fn sort_mode(&self) -> SortMode {
        self.sort_mode
    }

    /// Whether any sizing operation is still in flight.
    pub fn is_calculating(&self) -> bool {
        self.calculating > 0
    }

    pub fn matches(&self) -> &[SearchMatch] {
        &self.matches
    }

    pub fn current_match(&self) -> Option<&SearchMatch> {
        self.match_cursor.and_then(|i| self.matches.get(i))
    }

    /// Materialize the immediate children of a directory node and start
    /// sizing its subdirectories in the background.
    ///
    /// No-op on files and on already-expanded nodes: the children list is
    /// untouched and no duplicate background work is launched. An unreadable
    /// directory is marked expanded with zero children.
    pub fn expand(&mut self, id: NodeId) {
        {
            let node = self.tree.get(id);
            if !node.is_dir() || node.expanded {
                return;
            }
        }
        let path = self.tree.get(id).path.clone();
        let entries = lister::list_dir(&path, &self.policy);

        self.tree.clear_children(id);
        let mut dir_children = Vec::new();
        for entry in entries {
            let size = match entry.size {
                Some(n) => SizeState::Known(n),
                None => SizeState::Unknown,
            };
            let child = self
                .tree
                .add_child(id, entry.name, entry.path, entry.kind, size);
            if entry.kind == NodeKind::Directory {
                self.tree.attach_placeholder(child);
                dir_children.push(child);
            }
        }
        self.tree.get_mut(id).expanded = true;
        self.tree.sort_direct_children(id, self.sort_mode);

        let children = self.tree.get(id).children.clone();
        self.pending.push_back(Event::ChildrenLoaded { node: id, children });

        // The node's own size is derived from what is known so far (file
        // children); it is refined as subdirectory totals arrive.
        let total = self.tree.sum_children(id);
        self.tree.get_mut(id).size = SizeState::Known(total);
        self.pending.push_back(Event::SizeUpdated { node: id, size: total });
        for (ancestor, size) in self.tree.propagate_size(id) {
            self.pending.push_back(Event::SizeUpdated { node: ancestor, size });
        }

        self.start_sizing(id, dir_children);
    }

    /// Compute the full recursive size of a directory node, whether or not
    /// it is expanded. Results arrive as `SizeUpdated` then `SizesSettled`.
    pub fn compute_size(&mut self, id: NodeId) {
        if !self.tree.get(id).is_dir() {
            return;
        }
        self.start_sizing(id, vec![id]);
    }

    /// Launch one sizing operation: a bounded-concurrency aggregation per
    /// directory in `targets`, with a settled signal once the last finishes.
    fn start_sizing(&mut self, origin: NodeId, targets: Vec<NodeId>) {
        if targets.is_empty() {
            // Nothing to size, but expand→settled must still pair up.
            self.pending.push_back(Event::SizesSettled { node: origin });
            return;
        }
        self.calculating += 1;
        let semaphore = Arc::new(Semaphore::new(self.fan_out));
        let outstanding = Arc::new(AtomicUsize::new(targets.len()));
        debug!(targets = targets.len(), "sizing operation started");

        for target in targets {
            let path = self.tree.get(target).path.clone();
            let tx = self.tx.clone();
            let policy = self.policy.clone();
            let limits = self.limits;
            let semaphore = semaphore.clone();
            let outstanding = outstanding.clone();
            tokio::spawn(async move {
                let size = aggregate_dir_size(path, policy, limits, semaphore).await;
                let _ = tx.send(WorkerMsg::SubtreeSized { node: target, size });
                if outstanding.fetch_sub(1, Ordering::AcqRel) == 1 {
                    let _ = tx.send(WorkerMsg::OpSettled { node: origin });
                }
            });
        }
    }

    /// Change the active sort order and re-sort the whole materialized tree.
    pub fn set_sort_mode(&mut self, mode: SortMode) {
        if self.sort_mode == mode {
            return;
        }
        self.sort_mode = mode;
        let root = self.tree.root();
        self.tree.sort_children(root, mode);
    }

    /// Start a search, cancelling any search already in flight.
    pub fn start_search(&mut self, query: &str, roots: Vec<PathBuf>) {
        if let Some(old) = self.search.take() {
            old.cancel();
        }
        // Bumping the generation drops every late message from the old task,
        // including its terminal SearchDone.
        self.search_generation += 1;
        self.matches.clear();
        self.match_cursor = None;
        let handle = spawn_search(
            query.to_string(),
            roots,
            self.policy.clone(),
            self.search_generation,
            self.tx.clone(),
        );
        self.search = Some(handle);
    }

    /// Cancel the in-flight search, if any. The search still reports
    /// `SearchEnded { cancelled: true }` once it stops.
    pub fn cancel_search(&mut self) {
        if let Some(handle) = &self.search {
            handle.cancel();
        }
    }

    /// Step forward through the matches found so far, wrapping to the first.
    pub fn next_match(&mut self) -> Option<&SearchMatch> {
        if self.matches.is_empty() {
            return None;
        }
        let next = match self.match_cursor {
            None => 0,
            Some(i) => (i + 1) % self.matches.len(),
        };
        self.match_cursor = Some(next);
        self.matches.get(next)
    }

    /// Step backward through the matches found so far, wrapping to the last.
    pub fn previous_match(&mut self) -> Option<&SearchMatch> {
        if self.matches.is_empty() {
            return None;
        }
        let prev = match self.match_cursor {
            None | Some(0) => self.matches.len() - 1,
            Some(i) => i - 1,
        };
        self.match_cursor = Some(prev);
        self.matches.get(prev)
    }

    /// Pull the next engine event, applying worker results to the tree as
    /// they arrive.
    pub async fn next_event(&mut self) -> Result<Event> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(event);
            }
            let msg = self.rx.recv().await.ok_or(Error::ChannelClosed)?;
            self.apply(msg);
        }
    }

    /// Apply one worker message, queueing the events it produces.
    fn apply(&mut self, msg: WorkerMsg) {
        match msg {
            WorkerMsg::SubtreeSized { node, size } => {
                self.tree.get_mut(node).size = SizeState::Known(size);
                self.pending.push_back(Event::SizeUpdated { node, size });
                let updated = self.tree.propagate_size(node);
                for (ancestor, total) in &updated {
                    self.pending.push_back(Event::SizeUpdated {
                        node: *ancestor,
                        size: *total,
                    });
                }
                if self.sort_mode == SortMode::SizeDescending {
                    self.resort_siblings_of(node, &updated);
                }
            }
            WorkerMsg::OpSettled { node } => {
                self.calculating = self.calculating.saturating_sub(1);
                debug!(?node, "sizing operation settled");
                self.pending.push_back(Event::SizesSettled { node });
            }
            WorkerMsg::SearchFound {
                generation,
                path,
                is_dir,
            } => {
                if generation != self.search_generation {
                    return;
                }
                self.matches.push(SearchMatch {
                    path: path.clone(),
                    is_dir,
                });
                self.pending.push_back(Event::SearchMatch { path, is_dir });
            }
            WorkerMsg::SearchDone {
                generation,
                cancelled,
            } => {
                if generation != self.search_generation {
                    return;
                }
                self.search = None;
                self.pending.push_back(Event::SearchEnded { cancelled });
            }
        }
    }

    /// Re-sort the sibling lists containing the sized node and each updated
    /// ancestor; only those orderings can have changed.
    fn resort_siblings_of(&mut self, node: NodeId, updated: &[(NodeId, u64)]) {
        let mut parents: Vec<NodeId> = Vec::new();
        let mut consider = |tree: &Tree, id: NodeId, parents: &mut Vec<NodeId>| {
            if let Some(parent) = tree.get(id).parent {
                if !parents.contains(&parent) {
                    parents.push(parent);
                }
            }
        };
        consider(&self.tree, node, &mut parents);
        for (ancestor, _) in updated {
            consider(&self.tree, *ancestor, &mut parents);
        }
        for parent in parents {
            self.tree.sort_direct_children(parent, self.sort_mode);
        }
    }
}
