//! Token-budgeted prompt assembly and a multi-round tool-calling loop.
//!
//! `promptfit` builds prompts for a conversational model under a hard token
//! budget, then drives the loop in which the model may call tools before it
//! answers. Every size check runs against an external
//! [`TokenCounter`](context::TokenCounter); nothing here ships a tokenizer.
//!
//! # Getting started
//!
//! ```ignore
//! use promptfit::agent::{Harness, HarnessConfig, HistoryTurn, ToolCallingPrompt, Turn};
//! use promptfit::context::{CharRatioCounter, DocumentWindow, LineRange, TokenBudget, WindowOptions, fill_windows};
//! use promptfit::tools::ToolSet;
//!
//! let counter = CharRatioCounter::default();
//!
//! // Excerpt a file around the lines the user is asking about.
//! let mut windows = vec![DocumentWindow::new(
//!     "src/main.rs",
//!     &source,
//!     WindowOptions::default().with_focus(LineRange::new(40, 52)),
//! )];
//! fill_windows(&mut windows, &counter, &mut TokenBudget::new(2_000)).await;
//! let context = windows.iter().filter_map(|w| w.to_fragment()).collect();
//!
//! // Run the tool-calling loop.
//! let tools = ToolSet::new().with(my_tool);
//! let renderer = ToolCallingPrompt::new(&tools, &counter);
//! let turn = Turn::new("You are a careful reviewer.", "Why does this panic?")
//!     .with_context(context)
//!     .with_tools(tools.definitions());
//! let (mut output, done) = Harness::new(&model, &renderer, HarnessConfig::default()).run(turn);
//! // Consume `output` while `done` makes progress, e.g. with `futures::join!`.
//! ```
//!
//! # Where to find things
//!
//! - **Grow a file excerpt to fit:** [`DocumentWindow`](context::DocumentWindow)
//!   and [`fill_windows`](context::fill_windows).
//! - **Grow a directory listing to fit:** [`TreeBuilder`](context::TreeBuilder),
//!   and [`FileTree::parse_text`](context::FileTree::parse_text) to read one back.
//! - **Define tools:** the [`Tool`](tools::Tool) trait, [`FnTool`](tools::FnTool)
//!   for closures, and [`ToolSet`](tools::ToolSet) for dispatch.
//! - **Run the loop:** [`Harness`](agent::Harness), fed by a
//!   [`LanguageModel`](agent::LanguageModel) and a
//!   [`PromptRenderer`](agent::PromptRenderer).
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`context`] | Token budgets, text windows, directory trees |
//! | [`tools`] | [`Tool`](tools::Tool) trait, [`ToolSet`](tools::ToolSet), result cache |
//! | [`agent`] | [`Harness`](agent::Harness) loop, model and renderer capabilities, events |
//! | [`error`] | Error taxonomy |

pub mod agent;
pub mod context;
pub mod error;
pub mod tools;

#[cfg(test)]
pub(crate) mod testing;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub use agent::model::ToolCallPart;

// Re-export schemars for downstream crates.
pub use schemars;

// ── Schema generation ──────────────────────────────────────────────

/// Generate a JSON Schema `serde_json::Value` from a type that implements
/// `schemars::JsonSchema`. This is the bridge between strong Rust types
/// and the `serde_json::Value` a function-calling model expects.
///
/// # Example
///
/// ```
/// use promptfit::json_schema_for;
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonSchema)]
/// struct GrepArgs {
///     pattern: String,
///     #[serde(default)]
///     path: Option<String>,
/// }
///
/// let schema = json_schema_for::<GrepArgs>();
/// assert_eq!(schema["type"], "object");
/// assert!(schema["required"].as_array().unwrap().contains(&"pattern".into()));
/// ```
pub fn json_schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::Tool => write!(f, "tool"),
        }
    }
}

/// A message in a rendered prompt.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Message {
    pub role: MessageRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallPart>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn assistant_text(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// An assistant turn that ended in tool calls. Empty `text` is omitted.
    pub fn assistant_tool_calls(text: &str, calls: Vec<ToolCallPart>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: (!text.is_empty()).then(|| text.to_string()),
            tool_calls: Some(calls),
            tool_call_id: None,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(call_id.into()),
        }
    }

    /// The text a token counter should be charged for: the content followed
    /// by each tool call as JSON.
    pub fn countable_text(&self) -> String {
        let mut text = self.content.clone().unwrap_or_default();
        for call in self.tool_calls.iter().flatten() {
            text.push('\n');
            text.push_str(&serde_json::to_string(call).unwrap_or_default());
        }
        text
    }
}

// ── Tool types ─────────────────────────────────────────────────────

/// The type of a tool definition. Currently always `Function`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum ToolType {
    #[serde(rename = "function")]
    Function,
}

/// Tool definition offered to the model (function-calling format).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ToolDef {
    #[serde(rename = "type")]
    pub tool_type: ToolType,
    pub function: FunctionDef,
}

impl ToolDef {
    /// Create a function-calling tool definition.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            tool_type: ToolType::Function,
            function: FunctionDef {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_constructors() {
        let sys = Message::system("hello");
        assert_eq!(sys.role, MessageRole::System);
        assert_eq!(sys.content.as_deref(), Some("hello"));

        let user = Message::user("world");
        assert_eq!(user.role, MessageRole::User);

        let assist = Message::assistant_text("prefill");
        assert_eq!(assist.role, MessageRole::Assistant);
        assert_eq!(assist.content.as_deref(), Some("prefill"));

        let tool = Message::tool_result("call-1", "result");
        assert_eq!(tool.role, MessageRole::Tool);
        assert_eq!(tool.tool_call_id.as_deref(), Some("call-1"));
    }

    #[test]
    fn assistant_tool_calls_omits_empty_text() {
        let call = ToolCallPart::new("c1", "search", serde_json::json!({"q": "x"}));
        let msg = Message::assistant_tool_calls("", vec![call]);
        assert!(msg.content.is_none());
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json.get("content").is_none());
        assert_eq!(json["tool_calls"][0]["name"], "search");
    }

    #[test]
    fn countable_text_includes_tool_calls() {
        let call = ToolCallPart::new("c1", "search", serde_json::json!({}));
        let msg = Message::assistant_tool_calls("looking", vec![call]);
        let text = msg.countable_text();
        assert!(text.starts_with("looking\n"));
        assert!(text.contains("\"search\""));
    }

    #[test]
    fn tool_def_serializes_as_function() {
        let def = ToolDef::new("echo", "Echo", serde_json::json!({"type": "object"}));
        let json = serde_json::to_value(&def).unwrap();
        assert_eq!(json["type"], "function");
        assert_eq!(def.name(), "echo");
    }
}
