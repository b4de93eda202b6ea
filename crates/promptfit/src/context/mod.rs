//! Context assembly under a token budget.
//!
//! Prompt space is the scarcest resource a request has. The pieces in this
//! module grow context until they fill, but never exceed, a budget measured
//! by an external [`TokenCounter`]:
//!
//! 1. **[`window`]** — [`DocumentWindow`] grows a fenced excerpt of one
//!    document around a focus line; [`fill_windows`] drives many of them
//!    round-robin against one shared budget.
//!
//! 2. **[`tree`]** — [`TreeBuilder`] grows a truncated directory listing,
//!    expanding a focus subtree before revealing its siblings, and
//!    [`FileTree::parse_text`] recovers the structure from rendered text.
//!
//! 3. **[`budget`]** / **[`tokens`]** — the check-before-commit counter and
//!    the counting capability both of the above charge against.
//!
//! Their output is handed to a prompt renderer as [`ContextFragment`]s.

pub mod budget;
pub mod fs;
pub mod tokens;
pub mod tree;
pub mod window;

use serde::{Deserialize, Serialize};

// Re-export commonly used items at the module level.
pub use budget::TokenBudget;
pub use fs::{DirEntry, DirectoryLister, EntryKind, FnIgnore, FsLister, IgnorePredicate};
pub use tokens::{CharRatioCounter, DEFAULT_CHARS_PER_TOKEN, FnCounter, TokenCounter};
pub use tree::{Entries, FileTree, NodeId, TreeBuilder, TreeEntry, TreeNode};
pub use window::{
    DocumentSource, DocumentWindow, FillReport, LineRange, WindowDirection, WindowOptions,
    WindowReference, fill_windows,
};

/// A location a prompt cites, forwarded to the response sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptReference {
    /// Document or directory name.
    pub name: String,
    /// Cited lines, when the reference is to part of a document.
    pub range: Option<LineRange>,
}

impl PromptReference {
    /// A reference to a whole document or directory.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            range: None,
        }
    }

    pub fn with_range(mut self, range: LineRange) -> Self {
        self.range = Some(range);
        self
    }
}

/// A rendered piece of context ready to be placed in a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextFragment {
    pub text: String,
    pub reference: Option<PromptReference>,
}

impl ContextFragment {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            reference: None,
        }
    }

    pub fn with_reference(mut self, reference: PromptReference) -> Self {
        self.reference = Some(reference);
        self
    }
}
