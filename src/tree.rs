//! In-memory tree of filesystem entries: arena-allocated nodes, three-state
//! sizes, bottom-up size propagation, and mode-driven sorting.
//!
//! The tree itself never touches the filesystem; the lister and aggregator
//! (`crate::fs`) feed it. Ownership flows root→children through the arena;
//! parent links are plain indices, so upward traversal never creates cycles.

use std::path::{Path, PathBuf};

/// Name given to the synthetic child under a not-yet-expanded directory.
pub const LOADING_PLACEHOLDER: &str = "Loading...";

/// Kind of filesystem node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Directory,
}

/// Three-state size of a node.
///
/// Files are `Known` from creation; directories start `Unknown` and resolve
/// when a background aggregation completes. Unknown contributes zero to any
/// sum or size comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeState {
    Unknown,
    Known(u64),
}

impl SizeState {
    /// Byte count with unknown clamped to zero.
    ///
    /// This is the single comparison/summation semantic: unresolved entries
    /// sort last under `SizeDescending` and add nothing to ancestor totals.
    pub fn bytes_or_zero(&self) -> u64 {
        match self {
            SizeState::Unknown => 0,
            SizeState::Known(n) => *n,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, SizeState::Known(_))
    }
}

/// Index of a node in its owning [`Tree`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// A node in the explorer tree.
#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub path: PathBuf,
    pub kind: NodeKind,
    pub size: SizeState,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
    /// Whether real children have been materialized (vs. the placeholder).
    pub expanded: bool,
    /// Synthetic "loading" child marking its parent as expandable.
    pub placeholder: bool,
}

impl Node {
    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }
}

/// Sort order for a node's children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortMode {
    /// Alphabetical by name, case-insensitive.
    NameAscending,
    /// Largest first; unknown sizes compare as zero.
    SizeDescending,
}

impl SortMode {
    /// Parse a sort mode from a config string.
    pub fn from_str(s: &str) -> Self {
        match s {
            "size" => SortMode::SizeDescending,
            _ => SortMode::NameAscending,
        }
    }

    /// Display label for the current mode.
    pub fn label(&self) -> &'static str {
        match self {
            SortMode::NameAscending => "Name",
            SortMode::SizeDescending => "Size",
        }
    }

    /// Cycle to the other mode.
    pub fn next(&self) -> Self {
        match self {
            SortMode::NameAscending => SortMode::SizeDescending,
            SortMode::SizeDescending => SortMode::NameAscending,
        }
    }
}

/// Arena-backed tree with a single root directory.
///
/// Nodes are only ever appended; detached nodes (cleared placeholders) stay
/// in the arena until the tree is dropped, which is bounded by the session.
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Tree {
    /// Create a tree whose root is a directory at `path`, unexpanded, with
    /// the synthetic placeholder child attached.
    pub fn new(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        let root_node = Node {
            name,
            path: path.to_path_buf(),
            kind: NodeKind::Directory,
            size: SizeState::Unknown,
            children: Vec::new(),
            parent: None,
            expanded: false,
            placeholder: false,
        };
        let mut tree = Self {
            nodes: vec![root_node],
            root: NodeId(0),
        };
        tree.attach_placeholder(tree.root);
        tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Number of nodes ever allocated, including detached placeholders.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Append a child node under `parent` and return its id.
    pub fn add_child(
        &mut self,
        parent: NodeId,
        name: String,
        path: PathBuf,
        kind: NodeKind,
        size: SizeState,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            name,
            path,
            kind,
            size,
            children: Vec::new(),
            parent: Some(parent),
            expanded: false,
            placeholder: false,
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Attach the synthetic "loading" child under a directory node so a
    /// consumer can render it as expandable before it is descended into.
    pub fn attach_placeholder(&mut self, dir: NodeId) -> NodeId {
        let path = self.nodes[dir.0].path.join(LOADING_PLACEHOLDER);
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            name: LOADING_PLACEHOLDER.to_string(),
            path,
            kind: NodeKind::File,
            size: SizeState::Unknown,
            children: Vec::new(),
            parent: Some(dir),
            expanded: false,
            placeholder: true,
        });
        self.nodes[dir.0].children.push(id);
        id
    }

    /// Detach all children of `id` (used to drop the placeholder on expand).
    pub fn clear_children(&mut self, id: NodeId) {
        let children = std::mem::take(&mut self.nodes[id.0].children);
        for child in children {
            self.nodes[child.0].parent = None;
        }
    }

    /// Sum of the known sizes of `id`'s direct children.
    ///
    /// Unknown children contribute zero; the value is re-derived on every
    /// call, never cached separately from the node's own `size`.
    pub fn sum_children(&self, id: NodeId) -> u64 {
        self.nodes[id.0]
            .children
            .iter()
            .map(|c| self.nodes[c.0].size.bytes_or_zero())
            .sum()
    }

    /// Re-derive every ancestor's size after `from`'s own size changed,
    /// walking up to the root. Returns the ancestors whose size changed, in
    /// bottom-up order, so the caller can report them.
    pub fn propagate_size(&mut self, from: NodeId) -> Vec<(NodeId, u64)> {
        let mut updated = Vec::new();
        let mut cursor = self.nodes[from.0].parent;
        while let Some(id) = cursor {
            let total = self.sum_children(id);
            if self.nodes[id.0].size != SizeState::Known(total) {
                self.nodes[id.0].size = SizeState::Known(total);
                updated.push((id, total));
            }
            cursor = self.nodes[id.0].parent;
        }
        updated
    }

    /// Sort `id`'s direct children in place and recurse into directory
    /// children. Stable: equal keys keep their current relative order, so
    /// nodes whose size is still unknown are not shuffled among themselves.
    pub fn sort_children(&mut self, id: NodeId, mode: SortMode) {
        self.sort_direct_children(id, mode);
        let dirs: Vec<NodeId> = self.nodes[id.0]
            .children
            .iter()
            .copied()
            .filter(|c| self.nodes[c.0].is_dir())
            .collect();
        for dir in dirs {
            self.sort_children(dir, mode);
        }
    }

    /// Sort only `id`'s direct children (no recursion).
    pub fn sort_direct_children(&mut self, id: NodeId, mode: SortMode) {
        let mut children = std::mem::take(&mut self.nodes[id.0].children);
        children.sort_by(|&a, &b| {
            let (na, nb) = (&self.nodes[a.0], &self.nodes[b.0]);
            match mode {
                SortMode::NameAscending => {
                    na.name.to_lowercase().cmp(&nb.name.to_lowercase())
                }
                SortMode::SizeDescending => {
                    nb.size.bytes_or_zero().cmp(&na.size.bytes_or_zero())
                }
            }
        });
        self.nodes[id.0].children = children;
    }

    /// Find a node by its path, depth-first from the root.
    pub fn find(&self, path: &Path) -> Option<NodeId> {
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            if self.nodes[id.0].path == path {
                return Some(id);
            }
            stack.extend(self.nodes[id.0].children.iter().copied());
        }
        None
    }
}

/// Human-readable size: bytes up to 1 KB, one decimal for KB/MB, two for GB.
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let kb = bytes as f64 / 1024.0;
    if kb < 1024.0 {
        return format!("{:.1} KB", kb);
    }
    let mb = kb / 1024.0;
    if mb < 1024.0 {
        return format!("{:.1} MB", mb);
    }
    format!("{:.2} GB", mb / 1024.0)
}
