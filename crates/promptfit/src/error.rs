//! Error types for prompt assembly and the tool-calling loop.
//!
//! Each failure domain gets its own enum. Only two of them are fatal to a
//! caller: [`TreeError`] rejects a tree build before traversal starts, and
//! [`HarnessError`] ends a tool-calling run. The others are recovered close
//! to where they happen and folded into placeholder content.

use std::path::PathBuf;
use thiserror::Error;

/// Failure to build a directory tree.
#[derive(Debug, Error)]
pub enum TreeError {
    /// The focus path does not lie at or below the tree root.
    #[error("focus path {focus} is not inside tree root {root}")]
    InvalidFocus { focus: PathBuf, root: PathBuf },
}

/// Failure to read a document for a text window.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("could not read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("reading {path} was cancelled")]
    Cancelled { path: PathBuf },
}

/// Failure to invoke a tool.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// No tool with this name is registered.
    #[error("tool '{0}' is not registered")]
    NotFound(String),
    /// The call's input does not match the tool's parameter schema.
    #[error("invalid input for tool '{name}': {reason}")]
    InvalidInput { name: String, reason: String },
}

/// Failure reported by the model capability.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// The request could not be issued or was rejected.
    #[error("model request failed: {0}")]
    Request(String),
    /// The response stream broke off.
    #[error("model response stream failed: {0}")]
    Stream(String),
    #[error("model request cancelled")]
    Cancelled,
}

/// Failure reported by a prompt renderer.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error("prompt rendering cancelled")]
    Cancelled,
}

/// Failure that ends a tool-calling run.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Render(#[from] RenderError),
}
