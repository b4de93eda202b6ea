//! Tool-calling runtime: the [`Harness`] loop and the capabilities it drives.
//!
//! - [`harness::Harness`]: the multi-round request loop. Start here.
//! - [`model`]: the [`LanguageModel`] capability and its response parts.
//! - [`render`]: the [`PromptRenderer`] capability and the default
//!   [`ToolCallingPrompt`], which also executes pending tool calls.
//! - [`config::HarnessConfig`]: round limit, output reserve, sink forwarding.
//! - [`events`]: [`EventHandler`] and [`HarnessEvent`] for observing a run,
//!   and the [`ResponseSink`] it forwards text and references to.

pub mod config;
pub mod events;
pub mod harness;
pub mod model;
pub mod render;

// Re-export commonly used items at the module level.
pub use config::HarnessConfig;
pub use events::{
    CompositeEventHandler, EventHandler, FnEventHandler, HarnessEvent, LoggingHandler,
    NoopHandler, ResponseSink,
};
pub use harness::{
    Harness, HistoryTurn, OutputPart, OutputStream, RunFuture, ToolCallRound,
    ToolCallingMetadata, ToolCallingResult, Turn,
};
pub use model::{
    LanguageModel, RequestFuture, RequestOptions, ResponsePart, ResponseStream, ToolCallPart,
    ToolMode,
};
pub use render::{PromptProps, PromptRenderer, RenderFuture, RenderedPrompt, ToolCallingPrompt};
