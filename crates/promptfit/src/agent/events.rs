//! Events and sinks for the [`Harness`](super::harness::Harness).
//!
//! The harness reports its progress through [`HarnessEvent`] variants, from
//! round start through tool results to completion. Callers implement
//! [`EventHandler`] to observe them for logging, UI rendering or metrics.
//!
//! A [`ResponseSink`] is different: it is the caller's outward-facing
//! response surface. When [`HarnessConfig::emit_to_sink`] is set the harness
//! forwards streamed text and prompt references to it as they arrive.
//!
//! # Choosing an event handler
//!
//! | Handler | Use case |
//! |---------|----------|
//! | [`NoopHandler`] | Tests or fire-and-forget runs |
//! | [`LoggingHandler`] | Structured logging via `tracing` |
//! | [`FnEventHandler`] | Quick closures for simple callbacks |
//! | [`CompositeEventHandler`] | Compose multiple handlers in order |
//!
//! [`HarnessConfig::emit_to_sink`]: super::config::HarnessConfig::emit_to_sink

use tracing::{debug, info, trace};

use crate::context::PromptReference;
use crate::tools::ToolResult;

// ── Events ─────────────────────────────────────────────────────────

/// Events emitted by the harness during a run.
#[derive(Debug)]
pub enum HarnessEvent<'a> {
    /// A new round is starting. Rounds are numbered from 1.
    RoundStart { round: usize, max_rounds: usize },
    /// The prompt for this round was rendered.
    PromptRendered {
        round: usize,
        token_count: usize,
        budget: usize,
        messages: usize,
    },
    /// This request forces a call to one queued tool.
    ToolForced { name: &'a str },
    /// The model streamed a text part.
    Text(&'a str),
    /// The model requested tool calls this round.
    ToolCallsReceived { round: usize, count: usize },
    /// A tool result was added to the run's cache.
    ToolResult {
        call_id: &'a str,
        result: &'a ToolResult,
    },
    /// The model answered without calling any tool.
    Finished { rounds: usize },
    /// The run hit the round limit without finishing.
    RoundLimitReached { max_rounds: usize },
}

/// Handler for harness events.
///
/// The default implementation ignores every event.
///
/// # Example
///
/// ```ignore
/// struct Printer;
///
/// impl EventHandler for Printer {
///     fn on_event(&self, event: &HarnessEvent<'_>) {
///         if let HarnessEvent::Text(text) = event {
///             print!("{text}");
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &HarnessEvent<'_>) {
        let _ = event;
    }
}

/// An event handler that does nothing.
pub struct NoopHandler;
impl EventHandler for NoopHandler {}

/// An event handler backed by a closure.
///
/// ```ignore
/// let handler = FnEventHandler::new(|event| {
///     if let HarnessEvent::Text(text) = event {
///         print!("{text}");
///     }
/// });
/// ```
pub struct FnEventHandler<F>(F)
where
    F: Fn(&HarnessEvent<'_>) + Send + Sync;

impl<F> FnEventHandler<F>
where
    F: Fn(&HarnessEvent<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventHandler for FnEventHandler<F>
where
    F: Fn(&HarnessEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &HarnessEvent<'_>) {
        (self.0)(event)
    }
}

/// An event handler that delegates to several inner handlers, in
/// registration order.
///
/// ```ignore
/// let handler = CompositeEventHandler::new()
///     .with(LoggingHandler)
///     .with(my_ui_handler);
/// ```
pub struct CompositeEventHandler {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl CompositeEventHandler {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Add a handler to the chain.
    pub fn with(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Conditionally add a handler to the chain.
    pub fn with_if(self, condition: bool, handler: impl EventHandler + 'static) -> Self {
        if condition { self.with(handler) } else { self }
    }
}

impl Default for CompositeEventHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler for CompositeEventHandler {
    fn on_event(&self, event: &HarnessEvent<'_>) {
        for handler in &self.handlers {
            handler.on_event(event);
        }
    }
}

/// An event handler that logs every event through `tracing`.
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &HarnessEvent<'_>) {
        match event {
            HarnessEvent::RoundStart { round, max_rounds } => {
                info!("[round {round}/{max_rounds}]");
            }
            HarnessEvent::PromptRendered {
                round,
                token_count,
                budget,
                messages,
            } => {
                debug!("Round {round} prompt: {messages} message(s), {token_count}/{budget} tokens");
            }
            HarnessEvent::ToolForced { name } => {
                debug!("Forcing tool call: {name}");
            }
            HarnessEvent::Text(text) => {
                let preview: String = text.chars().take(200).collect();
                trace!(
                    "LLM text: {preview}{}",
                    if text.chars().count() > 200 { "..." } else { "" }
                );
            }
            HarnessEvent::ToolCallsReceived { round, count } => {
                debug!("{count} tool call(s) in round {round}");
            }
            HarnessEvent::ToolResult { call_id, result } => {
                debug!(
                    "Tool result for {call_id}: {} bytes{}",
                    result.content.len(),
                    if result.is_error { " (error)" } else { "" }
                );
            }
            HarnessEvent::Finished { rounds } => {
                info!("Run finished after {rounds} round(s)");
            }
            HarnessEvent::RoundLimitReached { max_rounds } => {
                info!("Run hit round limit ({max_rounds})");
            }
        }
    }
}

// ── Response sink ──────────────────────────────────────────────────

/// The caller's response surface.
///
/// Text arrives in the order the model produced it. References are
/// forwarded once per round, after the prompt is rendered.
pub trait ResponseSink: Send + Sync {
    fn emit_text(&self, text: &str);

    fn emit_reference(&self, reference: &PromptReference) {
        let _ = reference;
    }
}
