//! Prompt rendering: the step that turns conversation state into messages.
//!
//! A [`PromptRenderer`] receives everything the harness knows about the
//! turn and a budget, and returns the messages for one request. Rendering
//! is also where pending tool calls get executed: a call that has no
//! cached result is invoked while its result is being laid out, and the
//! fresh result is handed back so the harness can cache it.
//!
//! [`ToolCallingPrompt`] is the default renderer. It lays out, in order:
//!
//! 1. the instructions, as a system message (pinned)
//! 2. earlier history turns, including tool rounds stored in their metadata
//! 3. context fragments, one user message each
//! 4. the user prompt (pinned)
//! 5. this turn's tool rounds with their results (pinned)
//!
//! When the whole layout does not fit, history goes first (oldest turn
//! first), then context fragments from the last one backwards. Pinned parts
//! are always kept.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::harness::{HistoryTurn, ToolCallRound};
use crate::context::{ContextFragment, PromptReference, TokenBudget, TokenCounter};
use crate::error::RenderError;
use crate::tools::{ToolInvoker, ToolResult, ToolResultCache};
use crate::{Message, ToolCallPart};

/// Content laid out for a recorded call whose result was never stored.
const MISSING_RESULT: &str = "Error: no result was recorded for this tool call";

/// Everything a renderer may draw on for one request.
#[derive(Debug, Clone, Copy)]
pub struct PromptProps<'a> {
    pub instructions: &'a str,
    pub history: &'a [HistoryTurn],
    pub context: &'a [ContextFragment],
    pub prompt: &'a str,
    /// Tool rounds of the current turn, oldest first.
    pub rounds: &'a [ToolCallRound],
    /// Results already produced in this run.
    pub tool_results: &'a ToolResultCache,
}

/// Output of one render.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedPrompt {
    pub messages: Vec<Message>,
    /// References carried by the context that made it into the prompt.
    pub references: Vec<PromptReference>,
    /// Tokens the messages cost, as measured by the renderer's counter.
    pub token_count: usize,
    /// Results of calls invoked during this render, in invocation order.
    pub tool_results: Vec<(String, ToolResult)>,
}

/// Boxed future returned by [`PromptRenderer::render`].
pub type RenderFuture<'a> =
    Pin<Box<dyn Future<Output = Result<RenderedPrompt, RenderError>> + Send + 'a>>;

/// Renders conversation state into a prompt that fits `budget`.
///
/// Implementations must not invoke a tool for a call id that already has a
/// result in `props.tool_results`.
pub trait PromptRenderer: Send + Sync {
    fn render<'a>(
        &'a self,
        props: PromptProps<'a>,
        budget: TokenBudget,
        cancel: &'a CancellationToken,
    ) -> RenderFuture<'a>;
}

// ── Default renderer ───────────────────────────────────────────────

/// The default [`PromptRenderer`], executing calls through a
/// [`ToolInvoker`] and measuring with a [`TokenCounter`].
pub struct ToolCallingPrompt<'a> {
    tools: &'a dyn ToolInvoker,
    counter: &'a dyn TokenCounter,
}

/// A droppable piece of the layout and its cost.
struct Optional {
    messages: Vec<Message>,
    cost: usize,
    reference: Option<PromptReference>,
}

impl<'a> ToolCallingPrompt<'a> {
    pub fn new(tools: &'a dyn ToolInvoker, counter: &'a dyn TokenCounter) -> Self {
        Self { tools, counter }
    }

    async fn cost(&self, messages: &[Message]) -> usize {
        let mut total = 0;
        for message in messages {
            total += self.counter.count_tokens(&message.countable_text()).await;
        }
        total
    }

    async fn compose(
        &self,
        props: PromptProps<'_>,
        budget: TokenBudget,
        cancel: &CancellationToken,
    ) -> Result<RenderedPrompt, RenderError> {
        let system = Message::system(props.instructions);
        let user = Message::user(props.prompt);
        let head_cost = self.cost(std::slice::from_ref(&system)).await
            + self.cost(std::slice::from_ref(&user)).await;
        let mut committed = head_cost;

        // Charge what is already known about the rounds, then split what is
        // left evenly between the calls still to run.
        let pending = pending_calls(props.rounds, props.tool_results);
        for round in props.rounds {
            committed += self
                .cost(&[Message::assistant_tool_calls(
                    &round.response,
                    round.tool_calls.clone(),
                )])
                .await;
            for call in &round.tool_calls {
                if let Some(result) = props.tool_results.get(&call.id) {
                    committed += self
                        .cost(&[Message::tool_result(&call.id, &result.content)])
                        .await;
                }
            }
        }
        debug!(
            "{} tool call(s) to invoke, {} answered from cache",
            pending.len(),
            props
                .rounds
                .iter()
                .map(|r| r.tool_calls.len())
                .sum::<usize>()
                .saturating_sub(pending.len())
        );

        let mut fresh: Vec<(String, ToolResult)> = Vec::with_capacity(pending.len());
        if !pending.is_empty() {
            let hint = budget.remaining().saturating_sub(committed) / pending.len();
            for call in pending {
                if cancel.is_cancelled() {
                    return Err(RenderError::Cancelled);
                }
                let result = match self
                    .tools
                    .invoke_tool(&call.name, &call.input, Some(hint))
                    .await
                {
                    Ok(result) => result,
                    Err(e) => {
                        warn!("Tool call {} ({}) failed: {e}", call.id, call.name);
                        ToolResult::error(format!("Error: {e}"))
                    }
                };
                fresh.push((call.id.clone(), result));
            }
        }

        let mut round_messages = Vec::new();
        for round in props.rounds {
            push_round(&mut round_messages, round, |id| {
                fresh
                    .iter()
                    .find(|(k, _)| k == id)
                    .map(|(_, r)| r)
                    .or_else(|| props.tool_results.get(id))
            });
        }
        let pinned = head_cost + self.cost(&round_messages).await;

        // ── Optional parts ──
        let mut history = Vec::with_capacity(props.history.len());
        for turn in props.history {
            let messages = history_messages(turn, props.tool_results);
            let cost = self.cost(&messages).await;
            history.push(Optional {
                messages,
                cost,
                reference: None,
            });
        }
        let mut fragments = Vec::with_capacity(props.context.len());
        for fragment in props.context {
            let messages = vec![Message::user(fragment.text.as_str())];
            let cost = self.cost(&messages).await;
            fragments.push(Optional {
                messages,
                cost,
                reference: fragment.reference.clone(),
            });
        }

        let available = budget.remaining().saturating_sub(pinned);
        if pinned > budget.remaining() {
            warn!(
                "Pinned prompt parts need {pinned} tokens but only {} are available",
                budget.remaining()
            );
        }
        let mut optional: usize =
            history.iter().map(|h| h.cost).sum::<usize>() + fragments.iter().map(|f| f.cost).sum::<usize>();
        let mut history_start = 0;
        while optional > available && history_start < history.len() {
            optional -= history[history_start].cost;
            history_start += 1;
        }
        let mut fragment_end = fragments.len();
        while optional > available && fragment_end > 0 {
            fragment_end -= 1;
            optional -= fragments[fragment_end].cost;
        }
        if history_start > 0 || fragment_end < fragments.len() {
            debug!(
                "Dropped {history_start} history turn(s) and {} context fragment(s) to fit {} tokens",
                fragments.len() - fragment_end,
                budget.remaining()
            );
        }

        let kept_fragments = &fragments[..fragment_end];
        let mut messages = vec![system];
        for part in &history[history_start..] {
            messages.extend(part.messages.iter().cloned());
        }
        for part in kept_fragments {
            messages.extend(part.messages.iter().cloned());
        }
        messages.push(user);
        messages.extend(round_messages);

        let token_count = pinned + optional;
        trace!("Rendered {} message(s), {token_count} tokens", messages.len());
        Ok(RenderedPrompt {
            messages,
            references: kept_fragments
                .iter()
                .filter_map(|f| f.reference.clone())
                .collect(),
            token_count,
            tool_results: fresh,
        })
    }
}

impl PromptRenderer for ToolCallingPrompt<'_> {
    fn render<'a>(
        &'a self,
        props: PromptProps<'a>,
        budget: TokenBudget,
        cancel: &'a CancellationToken,
    ) -> RenderFuture<'a> {
        Box::pin(self.compose(props, budget, cancel))
    }
}

/// Calls in `rounds` with no cached result, first occurrence of each id only.
fn pending_calls<'p>(rounds: &'p [ToolCallRound], cache: &ToolResultCache) -> Vec<&'p ToolCallPart> {
    let mut seen = HashSet::new();
    rounds
        .iter()
        .flat_map(|round| &round.tool_calls)
        .filter(|&call| !cache.contains(&call.id) && seen.insert(call.id.as_str()))
        .collect()
}

fn push_round<'r>(
    out: &mut Vec<Message>,
    round: &ToolCallRound,
    lookup: impl Fn(&str) -> Option<&'r ToolResult>,
) {
    out.push(Message::assistant_tool_calls(
        &round.response,
        round.tool_calls.clone(),
    ));
    for call in &round.tool_calls {
        let content = lookup(&call.id).map_or(MISSING_RESULT, |r| r.content.as_str());
        out.push(Message::tool_result(&call.id, content));
    }
}

fn history_messages(turn: &HistoryTurn, cache: &ToolResultCache) -> Vec<Message> {
    match turn {
        HistoryTurn::Request { prompt } => vec![Message::user(prompt.as_str())],
        HistoryTurn::Response { text, metadata } => {
            let mut out = Vec::new();
            if let Some(metadata) = metadata {
                for round in &metadata.rounds {
                    push_round(&mut out, round, |id| {
                        metadata.tool_results.get(id).or_else(|| cache.get(id))
                    });
                }
            }
            if !text.is_empty() {
                out.push(Message::assistant_text(text.as_str()));
            }
            out
        }
    }
}
