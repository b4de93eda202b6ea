//! Tool-calling harness: the request loop between a model and its tools.
//!
//! Each round the [`Harness`] renders the prompt, issues one request, and
//! streams the response. Text is forwarded as it arrives; tool calls are
//! buffered until the stream ends. A response without tool calls finishes
//! the run. Otherwise the calls are recorded as a [`ToolCallRound`] and the
//! next render executes them, so every call id is invoked at most once per
//! run: results are cached and supplied back into later renders.
//!
//! [`Harness::run`] returns the output stream and the run future
//! separately. The stream yields [`OutputPart`]s while the future makes
//! progress and closes when the future resolves, whether it succeeded or
//! not.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;

use futures::StreamExt;
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::HarnessConfig;
use super::events::{EventHandler, HarnessEvent, NoopHandler, ResponseSink};
use super::model::{LanguageModel, RequestOptions, ResponsePart};
use super::render::{PromptProps, PromptRenderer, RenderedPrompt};
use crate::context::{ContextFragment, TokenBudget};
use crate::error::{HarnessError, RenderError};
use crate::tools::{ToolResult, ToolResultCache};
use crate::{ToolCallPart, ToolDef};

// ── Conversation state ─────────────────────────────────────────────

/// One model response that ended in tool calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRound {
    /// Text the model streamed before its calls, concatenated.
    pub response: String,
    pub tool_calls: Vec<ToolCallPart>,
}

/// Tool-calling state of a finished turn, kept with the turn's response so
/// later requests can replay it without re-invoking anything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallingMetadata {
    pub rounds: Vec<ToolCallRound>,
    pub tool_results: ToolResultCache,
}

/// An earlier turn of the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HistoryTurn {
    Request {
        prompt: String,
    },
    Response {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<ToolCallingMetadata>,
    },
}

/// Input to one run.
#[derive(Debug, Clone, Default)]
pub struct Turn {
    pub instructions: String,
    pub prompt: String,
    pub history: Vec<HistoryTurn>,
    pub context: Vec<ContextFragment>,
    /// Tools offered to the model, in order.
    pub tools: Vec<ToolDef>,
    /// Tool names the caller pre-selected. Each request consumes the front
    /// one and forces the model to call that tool.
    pub tool_references: VecDeque<String>,
}

impl Turn {
    pub fn new(instructions: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            instructions: instructions.into(),
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_history(mut self, history: Vec<HistoryTurn>) -> Self {
        self.history = history;
        self
    }

    pub fn with_context(mut self, context: Vec<ContextFragment>) -> Self {
        self.context = context;
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDef>) -> Self {
        self.tools = tools;
        self
    }

    /// Queue a tool the model must call on the next unforced request.
    pub fn with_tool_reference(mut self, name: impl Into<String>) -> Self {
        self.tool_references.push_back(name.into());
        self
    }
}

/// An element of the run's output stream.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputPart {
    Text(String),
    /// A tool result that was just added to the run's cache.
    ToolResult { call_id: String, result: ToolResult },
}

/// Outcome of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolCallingResult {
    /// Rounds that ended in tool calls, oldest first.
    pub rounds: Vec<ToolCallRound>,
    pub tool_results: ToolResultCache,
    /// Text of the final response. Empty when the run did not finish.
    pub response: String,
    pub rounds_used: usize,
    /// `false` when the round limit ended the run.
    pub finished: bool,
}

impl ToolCallingResult {
    /// The state to persist with this turn.
    pub fn metadata(&self) -> ToolCallingMetadata {
        ToolCallingMetadata {
            rounds: self.rounds.clone(),
            tool_results: self.tool_results.clone(),
        }
    }

    /// This run as a history entry for the next turn.
    pub fn into_history_turn(self) -> HistoryTurn {
        HistoryTurn::Response {
            metadata: Some(ToolCallingMetadata {
                rounds: self.rounds,
                tool_results: self.tool_results,
            }),
            text: self.response,
        }
    }
}

/// Receiving end of a run's output.
pub type OutputStream = UnboundedReceiver<OutputPart>;

/// The run itself, returned by [`Harness::run`].
pub type RunFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ToolCallingResult, HarnessError>> + Send + 'a>>;

// ── Harness ────────────────────────────────────────────────────────

/// The tool-calling loop.
///
/// ```ignore
/// let tools = ToolSet::new().with(MyTool);
/// let counter = CharRatioCounter::default();
/// let renderer = ToolCallingPrompt::new(&tools, &counter);
/// let turn = Turn::new("You are helpful.", "What changed?").with_tools(tools.definitions());
///
/// let (output, done) = Harness::new(&model, &renderer, HarnessConfig::default()).run(turn);
/// let (parts, result) = futures::join!(output.collect::<Vec<_>>(), done);
/// ```
///
/// # Lifetimes
///
/// `Harness<'a>` borrows the model, renderer, handler and sink. Bind them
/// before building the harness so they outlive the run future.
pub struct Harness<'a> {
    model: &'a dyn LanguageModel,
    renderer: &'a dyn PromptRenderer,
    config: HarnessConfig,
    event_handler: &'a dyn EventHandler,
    sink: Option<&'a dyn ResponseSink>,
    cancel: CancellationToken,
}

/// Values accumulated across rounds.
#[derive(Default)]
struct RunAccumulator {
    rounds: Vec<ToolCallRound>,
    tool_results: ToolResultCache,
    response: String,
    rounds_used: usize,
    finished: bool,
}

impl<'a> Harness<'a> {
    pub fn new(
        model: &'a dyn LanguageModel,
        renderer: &'a dyn PromptRenderer,
        config: HarnessConfig,
    ) -> Self {
        Self {
            model,
            renderer,
            config,
            event_handler: &NoopHandler,
            sink: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Attach an event handler.
    pub fn with_event_handler(mut self, handler: &'a dyn EventHandler) -> Self {
        self.event_handler = handler;
        self
    }

    /// Attach the response sink that receives text and references when
    /// [`HarnessConfig::emit_to_sink`] is set.
    pub fn with_sink(mut self, sink: &'a dyn ResponseSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Share a cancellation token with the model and renderer.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Start a run. The returned stream closes once the future resolves.
    pub fn run(self, turn: Turn) -> (OutputStream, RunFuture<'a>) {
        let (tx, rx) = mpsc::unbounded();
        (rx, Box::pin(self.drive(turn, tx)))
    }

    async fn drive(
        self,
        turn: Turn,
        output: UnboundedSender<OutputPart>,
    ) -> Result<ToolCallingResult, HarnessError> {
        let mut acc = RunAccumulator::default();
        let mut queued = turn.tool_references.clone();
        info!(
            "Tool-calling run started: {} tool(s), {} queued reference(s)",
            turn.tools.len(),
            queued.len()
        );

        while acc.rounds_used < self.config.max_rounds {
            acc.rounds_used += 1;
            let round = acc.rounds_used;
            self.event_handler.on_event(&HarnessEvent::RoundStart {
                round,
                max_rounds: self.config.max_rounds,
            });

            // ── Render ──
            let rendered = self.render(&turn, &acc).await?;
            self.event_handler.on_event(&HarnessEvent::PromptRendered {
                round,
                token_count: rendered.token_count,
                budget: self.budget().limit(),
                messages: rendered.messages.len(),
            });
            self.absorb(&rendered.tool_results, &mut acc, &output);
            if let Some(sink) = self.sink
                && self.config.emit_to_sink
            {
                for reference in &rendered.references {
                    sink.emit_reference(reference);
                }
            }

            // ── Request ──
            let options = self.request_options(&turn.tools, &mut queued);
            debug!(
                "Round {round}: sending {} message(s), {} tool(s) offered ({:?})",
                rendered.messages.len(),
                options.tools.len(),
                options.tool_mode
            );
            let mut stream = self
                .model
                .send_request(&rendered.messages, &options, &self.cancel)
                .await?;

            // ── Stream ──
            let mut text = String::new();
            let mut calls = Vec::new();
            while let Some(part) = stream.next().await {
                match part? {
                    ResponsePart::Text(fragment) => {
                        self.event_handler.on_event(&HarnessEvent::Text(&fragment));
                        if let Some(sink) = self.sink
                            && self.config.emit_to_sink
                        {
                            sink.emit_text(&fragment);
                        }
                        text.push_str(&fragment);
                        let _ = output.unbounded_send(OutputPart::Text(fragment));
                    }
                    ResponsePart::ToolCall(call) => calls.push(call),
                }
            }
            debug!(
                "Round {round}: response complete, {} chars, {} tool call(s)",
                text.len(),
                calls.len()
            );

            if calls.is_empty() {
                acc.response = text;
                acc.finished = true;
                self.event_handler
                    .on_event(&HarnessEvent::Finished { rounds: round });
                break;
            }
            self.event_handler.on_event(&HarnessEvent::ToolCallsReceived {
                round,
                count: calls.len(),
            });
            acc.rounds.push(ToolCallRound {
                response: text,
                tool_calls: calls,
            });
        }

        if !acc.finished {
            // The last round's calls still have to run so the result
            // carries an answer for every recorded call.
            if !acc.rounds.is_empty() {
                let rendered = self.render(&turn, &acc).await?;
                self.absorb(&rendered.tool_results, &mut acc, &output);
            }
            warn!(
                "Tool-calling run stopped at the round limit ({})",
                self.config.max_rounds
            );
            self.event_handler.on_event(&HarnessEvent::RoundLimitReached {
                max_rounds: self.config.max_rounds,
            });
        }

        info!(
            "Tool-calling run completed: rounds={}, tool results={}, finished={}",
            acc.rounds_used,
            acc.tool_results.len(),
            acc.finished
        );
        Ok(ToolCallingResult {
            rounds: acc.rounds,
            tool_results: acc.tool_results,
            response: acc.response,
            rounds_used: acc.rounds_used,
            finished: acc.finished,
        })
    }

    fn budget(&self) -> TokenBudget {
        TokenBudget::for_model(self.model.max_input_tokens(), self.config.output_reserve)
    }

    async fn render(
        &self,
        turn: &Turn,
        acc: &RunAccumulator,
    ) -> Result<RenderedPrompt, RenderError> {
        let props = PromptProps {
            instructions: &turn.instructions,
            history: &turn.history,
            context: &turn.context,
            prompt: &turn.prompt,
            rounds: &acc.rounds,
            tool_results: &acc.tool_results,
        };
        self.renderer.render(props, self.budget(), &self.cancel).await
    }

    /// Cache fresh results and announce the ones that were new.
    fn absorb(
        &self,
        results: &[(String, ToolResult)],
        acc: &mut RunAccumulator,
        output: &UnboundedSender<OutputPart>,
    ) {
        for (call_id, result) in results {
            if !acc.tool_results.insert(call_id.as_str(), result.clone()) {
                debug!("Ignoring repeated result for tool call {call_id}");
                continue;
            }
            self.event_handler
                .on_event(&HarnessEvent::ToolResult {
                    call_id: call_id.as_str(),
                    result,
                });
            let _ = output.unbounded_send(OutputPart::ToolResult {
                call_id: call_id.clone(),
                result: result.clone(),
            });
        }
    }

    /// Force the next queued tool, if any, else offer every tool.
    fn request_options(&self, tools: &[ToolDef], queued: &mut VecDeque<String>) -> RequestOptions {
        if let Some(name) = queued.pop_front() {
            match tools.iter().find(|def| def.name() == name) {
                Some(def) => {
                    self.event_handler
                        .on_event(&HarnessEvent::ToolForced { name: &name });
                    return RequestOptions::forced(def.clone());
                }
                None => warn!(
                    "Queued tool reference {name} is not among the offered tools; \
                     letting the model choose"
                ),
            }
        }
        RequestOptions::auto(tools.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Message;
    use crate::agent::events::FnEventHandler;
    use crate::agent::model::ToolMode;
    use crate::agent::render::ToolCallingPrompt;
    use crate::context::{CharRatioCounter, PromptReference};
    use crate::error::ModelError;
    use crate::testing::{ScriptedModel, call, counting_tool, text};
    use crate::tools::ToolSet;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn echo_tools(calls: &Arc<AtomicUsize>) -> ToolSet {
        ToolSet::new()
            .with(counting_tool("echo", calls.clone()))
            .with(counting_tool("other", calls.clone()))
    }

    #[tokio::test]
    async fn answers_without_tools_in_one_round() {
        let model = ScriptedModel::new(100_000).reply(vec![text("Hello, "), text("world")]);
        let tools = ToolSet::new();
        let counter = CharRatioCounter::default();
        let renderer = ToolCallingPrompt::new(&tools, &counter);

        let (output, done) = Harness::new(&model, &renderer, HarnessConfig::default())
            .run(Turn::new("Be brief.", "Greet me"));
        let result = done.await.unwrap();
        let parts: Vec<_> = output.collect().await;

        assert!(result.finished);
        assert_eq!(result.rounds_used, 1);
        assert_eq!(result.response, "Hello, world");
        assert!(result.rounds.is_empty());
        assert!(result.tool_results.is_empty());
        assert_eq!(
            parts,
            vec![
                OutputPart::Text("Hello, ".into()),
                OutputPart::Text("world".into())
            ]
        );

        let requests = model.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].0,
            vec![Message::system("Be brief."), Message::user("Greet me")]
        );
    }

    #[tokio::test]
    async fn each_call_id_is_invoked_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let tools = echo_tools(&calls);
        let model = ScriptedModel::new(100_000)
            .reply(vec![text("looking"), call("c1", "echo", json!({}))])
            .reply(vec![
                call("c1", "echo", json!({})),
                call("c2", "echo", json!({})),
            ])
            .reply(vec![text("answer")]);
        let counter = CharRatioCounter::default();
        let renderer = ToolCallingPrompt::new(&tools, &counter);
        let turn = Turn::new("sys", "go").with_tools(tools.definitions());

        let (output, done) = Harness::new(&model, &renderer, HarnessConfig::default()).run(turn);
        let result = done.await.unwrap();
        let parts: Vec<_> = output.collect().await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(result.finished);
        assert_eq!(result.rounds_used, 3);
        assert_eq!(result.rounds.len(), 2);
        assert_eq!(result.response, "answer");
        assert_eq!(result.tool_results.len(), 2);
        assert_eq!(
            parts,
            vec![
                OutputPart::Text("looking".into()),
                OutputPart::ToolResult {
                    call_id: "c1".into(),
                    result: ToolResult::ok("echo: {}"),
                },
                OutputPart::ToolResult {
                    call_id: "c2".into(),
                    result: ToolResult::ok("echo: {}"),
                },
                OutputPart::Text("answer".into()),
            ]
        );

        // sys, user, round one (call + result), round two (call + 2 results)
        let requests = model.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[2].0.len(), 7);
    }

    #[tokio::test]
    async fn queued_reference_forces_one_request() {
        let calls = Arc::new(AtomicUsize::new(0));
        let tools = echo_tools(&calls);
        let model = ScriptedModel::new(100_000)
            .reply(vec![call("c1", "echo", json!({"q": "x"}))])
            .reply(vec![text("done")]);
        let counter = CharRatioCounter::default();
        let renderer = ToolCallingPrompt::new(&tools, &counter);
        let turn = Turn::new("sys", "go")
            .with_tools(tools.definitions())
            .with_tool_reference("echo");

        let (_output, done) = Harness::new(&model, &renderer, HarnessConfig::default()).run(turn);
        done.await.unwrap();

        let requests = model.requests();
        let echo = tools.get("echo").unwrap().definition();
        assert_eq!(requests[0].1, RequestOptions::forced(echo));
        assert_eq!(requests[1].1.tool_mode, ToolMode::Auto);
        assert_eq!(requests[1].1.tools.len(), 2);
    }

    #[tokio::test]
    async fn unknown_reference_falls_back_to_auto() {
        let calls = Arc::new(AtomicUsize::new(0));
        let tools = echo_tools(&calls);
        let model = ScriptedModel::new(100_000).reply(vec![text("ok")]);
        let counter = CharRatioCounter::default();
        let renderer = ToolCallingPrompt::new(&tools, &counter);
        let turn = Turn::new("sys", "go")
            .with_tools(tools.definitions())
            .with_tool_reference("ghost");

        let (_output, done) = Harness::new(&model, &renderer, HarnessConfig::default()).run(turn);
        assert!(done.await.unwrap().finished);
        assert_eq!(
            model.requests()[0].1,
            RequestOptions::auto(tools.definitions())
        );
    }

    #[tokio::test]
    async fn request_failure_closes_the_stream() {
        let model = ScriptedModel::new(100_000).fail(ModelError::Request("503".into()));
        let tools = ToolSet::new();
        let counter = CharRatioCounter::default();
        let renderer = ToolCallingPrompt::new(&tools, &counter);

        let (output, done) =
            Harness::new(&model, &renderer, HarnessConfig::default()).run(Turn::new("sys", "go"));
        let error = done.await.unwrap_err();
        let parts: Vec<_> = output.collect().await;

        assert!(matches!(
            error,
            HarnessError::Model(ModelError::Request(ref msg)) if msg == "503"
        ));
        assert!(parts.is_empty());
    }

    #[tokio::test]
    async fn broken_stream_keeps_text_already_sent() {
        let model = ScriptedModel::new(100_000)
            .break_after(vec![text("partial")], ModelError::Stream("reset".into()));
        let tools = ToolSet::new();
        let counter = CharRatioCounter::default();
        let renderer = ToolCallingPrompt::new(&tools, &counter);

        let (output, done) =
            Harness::new(&model, &renderer, HarnessConfig::default()).run(Turn::new("sys", "go"));
        let (parts, result) = futures::join!(output.collect::<Vec<_>>(), done);

        assert!(matches!(result, Err(HarnessError::Model(ModelError::Stream(_)))));
        assert_eq!(parts, vec![OutputPart::Text("partial".into())]);
    }

    #[tokio::test]
    async fn round_limit_ends_unfinished_with_results() {
        let calls = Arc::new(AtomicUsize::new(0));
        let tools = echo_tools(&calls);
        let model = ScriptedModel::new(100_000)
            .reply(vec![call("a", "echo", json!({}))])
            .reply(vec![call("b", "other", json!({}))]);
        let counter = CharRatioCounter::default();
        let renderer = ToolCallingPrompt::new(&tools, &counter);
        let limit_hit = AtomicBool::new(false);
        let handler = FnEventHandler::new(|event| {
            if matches!(event, HarnessEvent::RoundLimitReached { max_rounds: 2 }) {
                limit_hit.store(true, Ordering::SeqCst);
            }
        });
        let turn = Turn::new("sys", "go").with_tools(tools.definitions());

        let (_output, done) = Harness::new(&model, &renderer, HarnessConfig::new().with_max_rounds(2))
            .with_event_handler(&handler)
            .run(turn);
        let result = done.await.unwrap();

        assert!(!result.finished);
        assert_eq!(result.rounds_used, 2);
        assert_eq!(result.rounds.len(), 2);
        assert!(result.response.is_empty());
        assert_eq!(result.tool_results.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(model.requests().len(), 2);
        assert!(limit_hit.load(Ordering::SeqCst));
    }

    struct Collect {
        text: Mutex<String>,
        references: Mutex<Vec<PromptReference>>,
    }

    impl ResponseSink for Collect {
        fn emit_text(&self, text: &str) {
            self.text.lock().unwrap().push_str(text);
        }

        fn emit_reference(&self, reference: &PromptReference) {
            self.references.lock().unwrap().push(reference.clone());
        }
    }

    fn sink_run_turn() -> Turn {
        Turn::new("sys", "go").with_context(vec![
            ContextFragment::new("```\nfn main() {}\n```")
                .with_reference(PromptReference::new("main.rs")),
        ])
    }

    #[tokio::test]
    async fn sink_receives_text_and_references() {
        let model = ScriptedModel::new(100_000).reply(vec![text("a"), text("b")]);
        let tools = ToolSet::new();
        let counter = CharRatioCounter::default();
        let renderer = ToolCallingPrompt::new(&tools, &counter);
        let sink = Collect {
            text: Mutex::new(String::new()),
            references: Mutex::new(Vec::new()),
        };

        let (_output, done) = Harness::new(&model, &renderer, HarnessConfig::default())
            .with_sink(&sink)
            .run(sink_run_turn());
        done.await.unwrap();

        assert_eq!(*sink.text.lock().unwrap(), "ab");
        assert_eq!(
            *sink.references.lock().unwrap(),
            vec![PromptReference::new("main.rs")]
        );
    }

    #[tokio::test]
    async fn sink_is_skipped_when_disabled() {
        let model = ScriptedModel::new(100_000).reply(vec![text("a")]);
        let tools = ToolSet::new();
        let counter = CharRatioCounter::default();
        let renderer = ToolCallingPrompt::new(&tools, &counter);
        let sink = Collect {
            text: Mutex::new(String::new()),
            references: Mutex::new(Vec::new()),
        };

        let (output, done) =
            Harness::new(&model, &renderer, HarnessConfig::new().with_emit_to_sink(false))
                .with_sink(&sink)
                .run(sink_run_turn());
        done.await.unwrap();

        assert!(sink.text.lock().unwrap().is_empty());
        assert!(sink.references.lock().unwrap().is_empty());
        assert_eq!(output.collect::<Vec<_>>().await, vec![OutputPart::Text("a".into())]);
    }

    #[tokio::test]
    async fn metadata_replays_on_the_next_turn() {
        let calls = Arc::new(AtomicUsize::new(0));
        let tools = echo_tools(&calls);
        let counter = CharRatioCounter::default();
        let renderer = ToolCallingPrompt::new(&tools, &counter);

        let first = ScriptedModel::new(100_000)
            .reply(vec![call("c1", "echo", json!({"n": 1}))])
            .reply(vec![text("found it")]);
        let turn = Turn::new("sys", "look").with_tools(tools.definitions());
        let (_output, done) = Harness::new(&first, &renderer, HarnessConfig::default()).run(turn);
        let result = done.await.unwrap();
        assert_eq!(result.metadata().tool_results.len(), 1);

        let second = ScriptedModel::new(100_000).reply(vec![text("again")]);
        let history = vec![
            HistoryTurn::Request {
                prompt: "look".into(),
            },
            result.into_history_turn(),
        ];
        let turn = Turn::new("sys", "and now?")
            .with_history(history)
            .with_tools(tools.definitions());
        let (_output, done) = Harness::new(&second, &renderer, HarnessConfig::default()).run(turn);
        done.await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let messages = &second.requests()[0].0;
        assert!(
            messages
                .iter()
                .any(|m| m.content.as_deref() == Some(r#"echo: {"n":1}"#))
        );
        assert_eq!(
            messages.last().unwrap().content.as_deref(),
            Some("and now?")
        );
    }

    #[test]
    fn history_turn_serializes_with_kind_tag() {
        let turn = HistoryTurn::Response {
            text: "hi".into(),
            metadata: None,
        };
        assert_eq!(
            serde_json::to_value(&turn).unwrap(),
            json!({"kind": "response", "text": "hi"})
        );
    }
}
