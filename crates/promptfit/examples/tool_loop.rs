//! Tool loop example: typed tools, a budgeted context window, and a canned
//! model standing in for a real one.
//!
//! Demonstrates:
//! - Typed argument structs with `Deserialize` + `JsonSchema`
//! - A `ToolSet` with schema validation
//! - Excerpting a document with `fill_windows` and passing it as context
//! - Consuming the output stream while the run future makes progress
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=debug cargo run --example tool_loop
//! ```

use futures::StreamExt;
use promptfit::agent::{
    CompositeEventHandler, FnEventHandler, Harness, HarnessConfig, HarnessEvent, LanguageModel,
    LoggingHandler, OutputPart, RequestFuture, RequestOptions, ResponsePart, ResponseStream,
    ToolCallingPrompt, ToolMode, Turn,
};
use promptfit::context::{
    CharRatioCounter, DocumentWindow, LineRange, TokenBudget, WindowOptions, fill_windows,
};
use promptfit::tools::{FnTool, ToolSet};
use promptfit::{Message, MessageRole, ToolCallPart, ToolDef, json_schema_for};
use schemars::JsonSchema;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

const NOTES: &str = "\
# Glossary

ephemeral: lasting for a very short time.
idempotent: producing the same result however many times it is applied.
monotonic: never decreasing.
";

/// Arguments for the `lookup_word` tool.
#[derive(Deserialize, JsonSchema)]
struct LookupWordArgs {
    /// The word to look up.
    word: String,
}

fn lookup_word_tool() -> FnTool {
    let def = ToolDef::new(
        "lookup_word",
        "Look up the definition of a word in the glossary",
        json_schema_for::<LookupWordArgs>(),
    );
    FnTool::new(def, |args: LookupWordArgs| async move {
        match NOTES
            .lines()
            .find(|line| line.starts_with(&format!("{}:", args.word)))
        {
            Some(line) => Ok(line.to_string()),
            None => Err(format!("'{}' is not in the glossary", args.word)),
        }
    })
}

/// Calls `lookup_word` once when it is forced to, then answers with
/// whatever the last tool message said.
struct CannedModel;

impl LanguageModel for CannedModel {
    fn max_input_tokens(&self) -> usize {
        8_192
    }

    fn send_request<'a>(
        &'a self,
        messages: &'a [Message],
        options: &'a RequestOptions,
        _cancel: &'a CancellationToken,
    ) -> RequestFuture<'a> {
        let parts = if options.tool_mode == ToolMode::Required {
            vec![
                ResponsePart::Text("Checking the glossary. ".into()),
                ResponsePart::ToolCall(ToolCallPart::new(
                    "call-1",
                    "lookup_word",
                    serde_json::json!({"word": "ephemeral"}),
                )),
            ]
        } else {
            let found = messages
                .iter()
                .rev()
                .find(|m| m.role == MessageRole::Tool)
                .and_then(|m| m.content.clone())
                .unwrap_or_else(|| "nothing".into());
            vec![ResponsePart::Text(format!("The glossary says: {found}"))]
        };
        Box::pin(async move {
            let stream: ResponseStream<'a> = Box::pin(futures::stream::iter(parts.into_iter().map(Ok)));
            Ok(stream)
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), String> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let counter = CharRatioCounter::default();
    let tools = ToolSet::new()
        .with(lookup_word_tool())
        .with_arg_validation(true);

    // Excerpt the glossary around its first entry.
    let mut windows = vec![DocumentWindow::new(
        "glossary.md",
        NOTES,
        WindowOptions::default().with_focus(LineRange::line(2)),
    )];
    fill_windows(&mut windows, &counter, &mut TokenBudget::new(40)).await;
    let context = windows.iter().filter_map(|w| w.to_fragment()).collect();

    let handler = CompositeEventHandler::new()
        .with(LoggingHandler)
        .with(FnEventHandler::new(|event| {
            if let HarnessEvent::ToolResult { call_id, result } = event {
                eprintln!("[callback] {call_id} -> {} bytes", result.content.len());
            }
        }));

    let renderer = ToolCallingPrompt::new(&tools, &counter);
    let model = CannedModel;
    let turn = Turn::new("You answer from the glossary.", "What does ephemeral mean?")
        .with_context(context)
        .with_tools(tools.definitions())
        .with_tool_reference("lookup_word");

    let (output, done) = Harness::new(&model, &renderer, HarnessConfig::new().with_max_rounds(4))
        .with_event_handler(&handler)
        .run(turn);
    let printer = output.for_each(|part| async move {
        match part {
            OutputPart::Text(text) => print!("{text}"),
            OutputPart::ToolResult { call_id, result } => {
                println!("\n[{call_id}] {}", result.content);
            }
        }
    });
    let ((), result) = futures::join!(printer, done);
    let result = result.map_err(|e| e.to_string())?;

    println!(
        "\n--- {} round(s) | {} tool result(s) | finished: {} ---",
        result.rounds_used,
        result.tool_results.len(),
        result.finished
    );
    Ok(())
}
