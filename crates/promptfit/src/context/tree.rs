//! Budget-aware directory trees.
//!
//! [`TreeBuilder`] grows a truncated, indented listing of a directory under a
//! [`TokenBudget`]. With a focus path set, the chain from the root down to the
//! focus is materialized first, the focus subtree is expanded breadth-first,
//! and only then does the build climb back up to reveal siblings.
//!
//! Every node gets a strictly decreasing `priority` in visitation order. The
//! render ignores it (children are always sorted by name) but a pruning step
//! layered on top can use it to drop the latest-visited entries first.
//!
//! [`FileTree::parse_text`] reverses [`FileTree::render`].

use std::collections::VecDeque;
use std::path::{Component, Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::budget::TokenBudget;
use super::fs::{DirEntry, DirectoryLister, EntryKind, IgnorePredicate};
use super::tokens::TokenCounter;
use super::{ContextFragment, PromptReference};
use crate::error::TreeError;

const TREE_FENCE: &str = "```";
const INDENT: &str = "  ";

// ── Nodes ──────────────────────────────────────────────────────────

/// Index of a node in its [`FileTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// One filesystem entry in a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub path: PathBuf,
    pub name: String,
    /// Back-pointer into the arena. `None` only for the root.
    pub parent: Option<NodeId>,
    /// 0 for the root, 1 for its entries, and so on.
    pub depth: usize,
    pub kind: EntryKind,
    /// Visitation order, highest first.
    pub priority: i64,
    /// Sorted by name.
    pub children: Vec<NodeId>,
}

/// One rendered line of a tree, produced by [`FileTree::entries`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Indentation level; 0 for entries directly under the root.
    pub depth: usize,
    /// Entry name, with a trailing `/` for directories.
    pub label: String,
    pub priority: i64,
}

/// An arena of [`TreeNode`]s rooted at node 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTree {
    nodes: Vec<TreeNode>,
    /// Whether the delimiters were paid for. An unframed tree renders to
    /// nothing.
    framed: bool,
}

impl FileTree {
    fn new(root: PathBuf) -> Self {
        let name = root.display().to_string();
        Self {
            nodes: vec![TreeNode {
                path: root,
                name,
                parent: None,
                depth: 0,
                kind: EntryKind::Directory,
                priority: i64::MAX,
                children: Vec::new(),
            }],
            framed: false,
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id.0]
    }

    /// Nodes in visitation order, root first.
    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// Number of entries, not counting the root.
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find the node at `path`.
    pub fn find(&self, path: &Path) -> Option<NodeId> {
        self.nodes.iter().position(|n| n.path == path).map(NodeId)
    }

    fn child_named(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        let children = &self.nodes[parent.0].children;
        children
            .binary_search_by(|c| self.nodes[c.0].name.as_str().cmp(name))
            .ok()
            .map(|i| children[i])
    }

    fn insert(&mut self, parent: NodeId, name: String, kind: EntryKind, priority: i64) -> NodeId {
        let id = NodeId(self.nodes.len());
        let (path, depth) = {
            let p = &self.nodes[parent.0];
            (p.path.join(&name), p.depth + 1)
        };
        let position = self.nodes[parent.0]
            .children
            .binary_search_by(|c| self.nodes[c.0].name.as_str().cmp(&name))
            .unwrap_or_else(|i| i);
        self.nodes.push(TreeNode {
            path,
            name,
            parent: Some(parent),
            depth,
            kind,
            priority,
            children: Vec::new(),
        });
        self.nodes[parent.0].children.insert(position, id);
        id
    }

    /// Depth-first walk in render order.
    pub fn entries(&self) -> Entries<'_> {
        let mut stack: Vec<NodeId> = self.nodes[0].children.clone();
        stack.reverse();
        Entries { tree: self, stack }
    }

    /// Fenced, indented listing. Directories carry a trailing `/`.
    pub fn render(&self) -> String {
        if !self.framed {
            return String::new();
        }
        let mut out = format!("{TREE_FENCE}\n");
        for entry in self.entries() {
            out.push_str(&INDENT.repeat(entry.depth));
            out.push_str(&entry.label);
            out.push('\n');
        }
        out.push_str(TREE_FENCE);
        out
    }

    /// Package the rendered tree for a prompt renderer.
    pub fn to_fragment(&self) -> Option<ContextFragment> {
        if !self.framed {
            return None;
        }
        Some(
            ContextFragment::new(self.render()).with_reference(PromptReference {
                name: self.nodes[0].name.clone(),
                range: None,
            }),
        )
    }

    /// Rebuild a tree from rendered text.
    ///
    /// Fence and blank lines are skipped. Indentation may be tabs or any
    /// number of spaces as long as it is consistent, and lines may end in
    /// either `\n` or `\r\n`. Priorities are reassigned in line order.
    pub fn parse_text(text: &str, root: impl Into<PathBuf>) -> Self {
        let mut tree = Self::new(root.into());
        tree.framed = true;
        let mut priority = i64::MAX;
        // Open directories and the indentation width they were found at.
        let mut open: Vec<(NodeId, usize)> = Vec::new();

        for raw in text.lines() {
            let line = raw.trim_end();
            let trimmed = line.trim_start();
            if trimmed.is_empty() || trimmed.starts_with(TREE_FENCE) {
                continue;
            }
            let indent = line.len() - trimmed.len();
            while open.last().is_some_and(|&(_, width)| indent <= width) {
                open.pop();
            }
            let parent = open.last().map_or(tree.root(), |&(id, _)| id);
            let (name, kind) = match trimmed.strip_suffix('/') {
                Some(dir) => (dir, EntryKind::Directory),
                None => (trimmed, EntryKind::File),
            };
            priority -= 1;
            let id = tree.insert(parent, name.to_string(), kind, priority);
            if kind == EntryKind::Directory {
                open.push((id, indent));
            }
        }
        tree
    }
}

/// Iterator returned by [`FileTree::entries`].
pub struct Entries<'a> {
    tree: &'a FileTree,
    stack: Vec<NodeId>,
}

impl Iterator for Entries<'_> {
    type Item = TreeEntry;

    fn next(&mut self) -> Option<TreeEntry> {
        let id = self.stack.pop()?;
        let node = &self.tree.nodes[id.0];
        self.stack.extend(node.children.iter().rev().copied());
        Some(TreeEntry {
            depth: node.depth - 1,
            label: label(&node.name, node.kind),
            priority: node.priority,
        })
    }
}

fn label(name: &str, kind: EntryKind) -> String {
    match kind {
        EntryKind::Directory => format!("{name}/"),
        EntryKind::File => name.to_string(),
    }
}

/// The rendered line for an entry at `indent`, as the builder charges it.
fn entry_line(indent: usize, name: &str, kind: EntryKind) -> String {
    format!("{}{}\n", INDENT.repeat(indent), label(name, kind))
}

// ── Builder ────────────────────────────────────────────────────────

/// Builds a [`FileTree`] that fits a token budget.
///
/// # Example
///
/// ```ignore
/// let counter = CharRatioCounter::default();
/// let tree = TreeBuilder::new("/repo", &FsLister, &counter)
///     .with_focus("src/context")
///     .build(&mut TokenBudget::new(2_000))
///     .await?;
/// println!("{}", tree.render());
/// ```
pub struct TreeBuilder<'a> {
    root: PathBuf,
    lister: &'a dyn DirectoryLister,
    counter: &'a dyn TokenCounter,
    focus: Option<PathBuf>,
    ignore: Option<&'a dyn IgnorePredicate>,
    cancel: CancellationToken,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(
        root: impl Into<PathBuf>,
        lister: &'a dyn DirectoryLister,
        counter: &'a dyn TokenCounter,
    ) -> Self {
        Self {
            root: root.into(),
            lister,
            counter,
            focus: None,
            ignore: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Directory to expand first. Relative paths are taken from the root;
    /// absolute ones must lie under it.
    pub fn with_focus(mut self, focus: impl Into<PathBuf>) -> Self {
        self.focus = Some(focus.into());
        self
    }

    pub fn with_ignore(mut self, ignore: &'a dyn IgnorePredicate) -> Self {
        self.ignore = Some(ignore);
        self
    }

    /// Token checked once per directory visited; also handed to the lister.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Grow the tree until the budget, the directories, or the caller's
    /// patience runs out.
    ///
    /// The only error is an invalid focus, reported before anything is
    /// listed. Cancellation returns the tree built so far.
    pub async fn build(&self, budget: &mut TokenBudget) -> Result<FileTree, TreeError> {
        let segments = self.focus_segments()?;
        let mut tree = FileTree::new(self.root.clone());
        let mut priority = i64::MAX;

        let head = self.counter.count_tokens(&format!("{TREE_FENCE}\n")).await;
        let tail = self.counter.count_tokens(TREE_FENCE).await;
        if !budget.try_charge(head + tail) {
            debug!(
                "Tree {} not admitted: delimiters need {} tokens, {} left",
                self.root.display(),
                head + tail,
                budget.remaining()
            );
            return Ok(tree);
        }
        tree.framed = true;

        let mut deepest = tree.root();
        for segment in segments {
            let depth = tree.node(deepest).depth;
            let line = entry_line(depth, &segment, EntryKind::Directory);
            let cost = self.counter.count_tokens(&line).await;
            if !budget.try_charge(cost) {
                debug!("Budget exhausted while materializing focus at {segment}");
                return Ok(tree);
            }
            priority -= 1;
            deepest = tree.insert(deepest, segment, EntryKind::Directory, priority);
        }

        let mut queue = VecDeque::from([(deepest, true)]);
        'build: while let Some((id, ascend)) = queue.pop_front() {
            if self.cancel.is_cancelled() {
                debug!("Tree build cancelled with {} entries", tree.len());
                break;
            }

            let fresh = self.list_new_children(&mut tree, id).await;
            let indent = tree.node(id).depth;
            let mut costs = Vec::with_capacity(fresh.len());
            for entry in &fresh {
                let line = entry_line(indent, &entry.name, entry.kind);
                costs.push(self.counter.count_tokens(&line).await);
            }

            for (entry, cost) in fresh.into_iter().zip(costs) {
                if !budget.try_charge(cost) {
                    debug!(
                        "Tree budget exhausted at {} ({cost} tokens, {} left)",
                        tree.node(id).path.join(&entry.name).display(),
                        budget.remaining()
                    );
                    break 'build;
                }
                priority -= 1;
                let child = tree.insert(id, entry.name, entry.kind, priority);
                if entry.kind == EntryKind::Directory {
                    queue.push_back((child, false));
                }
            }

            if ascend && let Some(parent) = tree.node(id).parent {
                queue.push_back((parent, true));
            }
        }

        trace!("Built tree {} with {} entries", self.root.display(), tree.len());
        Ok(tree)
    }

    /// List `id`, dropping ignored entries and entries already in the tree.
    async fn list_new_children(&self, tree: &mut FileTree, id: NodeId) -> Vec<DirEntry> {
        let path = tree.node(id).path.clone();
        let listing = match self.lister.read_directory(&path, &self.cancel).await {
            Ok(listing) => listing,
            Err(_) if self.cancel.is_cancelled() => Vec::new(),
            Err(e) => {
                warn!("Cannot list {}: {e}; treating as empty", path.display());
                Vec::new()
            }
        };

        let mut fresh = Vec::with_capacity(listing.len());
        for entry in listing {
            match tree.child_named(id, &entry.name) {
                // A focus segment is assumed to be a directory until its
                // parent is listed.
                Some(existing) => tree.nodes[existing.0].kind = entry.kind,
                None => fresh.push(entry),
            }
        }

        let Some(ignore) = self.ignore else {
            return fresh;
        };
        let paths: Vec<PathBuf> = fresh.iter().map(|e| path.join(&e.name)).collect();
        let flags = ignore.ignored(&paths).await;
        fresh
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !flags.get(*i).copied().unwrap_or(false))
            .map(|(_, entry)| entry)
            .collect()
    }

    /// Focus path as names below the root.
    ///
    /// `..` is resolved lexically; the focus is invalid only when it climbs
    /// above the root. An absolute focus is compared against the root made
    /// absolute.
    fn focus_segments(&self) -> Result<Vec<String>, TreeError> {
        let Some(focus) = &self.focus else {
            return Ok(Vec::new());
        };
        let invalid = || TreeError::InvalidFocus {
            focus: focus.clone(),
            root: self.root.clone(),
        };
        let relative = if focus.is_absolute() {
            let root = std::path::absolute(&self.root).map_err(|_| invalid())?;
            let (focus, root) = (normalize(focus), normalize(&root));
            focus.strip_prefix(&root).map_err(|_| invalid())?.to_path_buf()
        } else {
            focus.clone()
        };

        let mut segments = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(name) => segments.push(name.to_string_lossy().into_owned()),
                Component::CurDir => {}
                Component::ParentDir => {
                    segments.pop().ok_or_else(invalid)?;
                }
                Component::RootDir | Component::Prefix(_) => return Err(invalid()),
            }
        }
        Ok(segments)
    }
}

/// Resolve `.` and `..` without touching the filesystem. `..` at the top of
/// an absolute path stays there.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}
