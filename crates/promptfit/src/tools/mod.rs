//! Tool abstractions for function-calling models.
//!
//! Every capability the model can call is a [`Tool`] implementor. Tools are
//! collected into a [`ToolSet`], which handles dispatch, validation, and
//! truncation, and which the default prompt renderer calls through the
//! [`ToolInvoker`] trait.
//!
//! # Defining tools
//!
//! - **[`FnTool`]**: closure-based, auto-parses input. Best for simple tools.
//! - **`impl Tool`**: full struct with manual [`Tool::definition()`] and
//!   [`Tool::invoke()`]. Best for tools with state, or that honour the
//!   budget hint themselves.
//!
//! # Submodules
//!
//! - [`core`]: [`Tool`] trait, [`ToolSet`], [`FnTool`], [`ToolResult`].
//! - [`cache`]: [`ToolResultCache`], results keyed by call id.

pub mod cache;
pub mod core;

// Re-export commonly used items at the module level.
pub use cache::ToolResultCache;
pub use core::{
    DEFAULT_MAX_RESULT_BYTES, FnTool, InvokeFuture, Tool, ToolFuture, ToolInvoker, ToolResult,
    ToolSet, truncate_result, validate_tool_input,
};
