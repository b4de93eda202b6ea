//! Tool abstraction for function-calling models.
//!
//! The [`Tool`] trait defines the interface that every tool must implement:
//! a static definition (name, description, JSON schema) and an async
//! `invoke` method. Tools are collected into a [`ToolSet`], which handles
//! dispatch, argument validation, and result truncation, and which serves
//! as the [`ToolInvoker`] the prompt renderer calls.

use crate::ToolDef;
use crate::context::DEFAULT_CHARS_PER_TOKEN;
use crate::error::ToolError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, info, trace};

/// Maximum size (in bytes) for tool output before truncation.
pub const DEFAULT_MAX_RESULT_BYTES: usize = 30_000;

/// Boxed future returned by [`Tool::invoke`].
///
/// Type alias to keep trait signatures and implementations readable.
pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = ToolResult> + Send + 'a>>;

/// Boxed future returned by [`ToolInvoker::invoke_tool`].
pub type InvokeFuture<'a> = Pin<Box<dyn Future<Output = Result<ToolResult, ToolError>> + Send + 'a>>;

// ── ToolResult ─────────────────────────────────────────────────────

/// Output of one tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: String,
    /// Set when the content describes a failure rather than an answer.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolResult {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

impl From<String> for ToolResult {
    fn from(content: String) -> Self {
        Self::ok(content)
    }
}

impl From<&str> for ToolResult {
    fn from(content: &str) -> Self {
        Self::ok(content)
    }
}

impl From<Result<String, String>> for ToolResult {
    fn from(result: Result<String, String>) -> Self {
        match result {
            Ok(content) => Self::ok(content),
            Err(content) => Self::error(content),
        }
    }
}

// ── Tool trait ─────────────────────────────────────────────────────

/// A tool a model can call.
///
/// Implementors provide:
/// - A static definition ([`Tool::definition`]) describing the tool's name,
///   description, and JSON Schema parameters.
/// - An async [`Tool::invoke`] method that receives the parsed JSON input
///   and an optional token budget hint, and returns a [`ToolResult`].
///
/// # Example
///
/// ```ignore
/// struct ReadFile { workdir: PathBuf }
///
/// impl Tool for ReadFile {
///     fn definition(&self) -> ToolDef { /* ... */ }
///
///     fn invoke<'a>(&'a self, input: &'a Value, budget_hint: Option<usize>) -> ToolFuture<'a> {
///         Box::pin(async move {
///             // read the file, cut it to the hint, return it
///             todo!()
///         })
///     }
/// }
/// ```
pub trait Tool: Send + Sync {
    /// The tool definition offered to the model.
    fn definition(&self) -> ToolDef;

    /// Invoke the tool.
    ///
    /// `budget_hint` is the number of tokens the caller expects to have room
    /// for; tools that can shorten their output should aim for it. Failures
    /// are returned as [`ToolResult::error`] rather than panicking.
    ///
    /// Uses a boxed future so that the trait is dyn-compatible (object-safe).
    fn invoke<'a>(
        &'a self,
        input: &'a serde_json::Value,
        budget_hint: Option<usize>,
    ) -> ToolFuture<'a>;

    /// The tool's name (convenience — delegates to definition).
    fn name(&self) -> String {
        self.definition().function.name
    }
}

/// Calls tools by name on behalf of a prompt renderer.
pub trait ToolInvoker: Send + Sync {
    fn invoke_tool<'a>(
        &'a self,
        name: &'a str,
        input: &'a serde_json::Value,
        budget_hint: Option<usize>,
    ) -> InvokeFuture<'a>;
}

// ── ToolSet ────────────────────────────────────────────────────────

/// An ordered collection of tools that can be dispatched by name.
///
/// # Example
///
/// ```ignore
/// let tools = ToolSet::new()
///     .with_max_result_bytes(15_000)
///     .with_arg_validation(true)
///     .with(SearchTool::new(index))
///     .with(read_file_tool());
///
/// // Offer them to the model.
/// let defs = tools.definitions();
/// ```
pub struct ToolSet {
    tools: Vec<Box<dyn Tool>>,
    by_name: HashMap<String, usize>,
    max_result_bytes: usize,
    /// Whether to validate tool input against JSON Schema before invoking.
    validate_args: bool,
}

impl fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolSet")
            .field("tools", &self.names())
            .field("max_result_bytes", &self.max_result_bytes)
            .field("validate_args", &self.validate_args)
            .finish()
    }
}

impl ToolSet {
    /// Create an empty tool set.
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            by_name: HashMap::new(),
            max_result_bytes: DEFAULT_MAX_RESULT_BYTES,
            validate_args: false,
        }
    }

    /// Set the maximum result size in bytes before truncation.
    pub fn with_max_result_bytes(mut self, max: usize) -> Self {
        self.max_result_bytes = max;
        self
    }

    /// Enable JSON Schema input validation before invocation.
    pub fn with_arg_validation(mut self, enabled: bool) -> Self {
        self.validate_args = enabled;
        self
    }

    /// Register a tool. Replaces any existing tool with the same name in
    /// place, keeping its position.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name();
        match self.by_name.get(&name) {
            Some(&index) => self.tools[index] = Box::new(tool),
            None => {
                self.by_name.insert(name, self.tools.len());
                self.tools.push(Box::new(tool));
            }
        }
    }

    /// Register a tool (builder pattern).
    pub fn with(mut self, tool: impl Tool + 'static) -> Self {
        self.register(tool);
        self
    }

    /// All tool definitions, in registration order.
    pub fn definitions(&self) -> Vec<ToolDef> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    /// Tool names, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.by_name.get(name).map(|&i| self.tools[i].as_ref())
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Invoke a tool by name, with optional validation, timing, and truncation.
    ///
    /// The result is cut to the smaller of the set's byte limit and the
    /// byte equivalent of `budget_hint`.
    pub async fn invoke(
        &self,
        name: &str,
        input: &serde_json::Value,
        budget_hint: Option<usize>,
    ) -> Result<ToolResult, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        if self.validate_args {
            validate_tool_input(tool, input)?;
        }

        log_tool_call(name, input);
        let start = std::time::Instant::now();
        let mut result = tool.invoke(input, budget_hint).await;

        let elapsed = start.elapsed();
        debug!(
            "Tool {name} completed in {:.0}ms ({} bytes{})",
            elapsed.as_secs_f64() * 1000.0,
            result.content.len(),
            if result.is_error { ", error" } else { "" }
        );
        trace!(
            "Tool {name} result preview: {}",
            result.content.chars().take(300).collect::<String>()
        );

        let limit = match budget_hint {
            Some(tokens) => self.max_result_bytes.min(hint_bytes(tokens)),
            None => self.max_result_bytes,
        };
        result.content = truncate_result(result.content, limit);
        Ok(result)
    }
}

impl Default for ToolSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolInvoker for ToolSet {
    fn invoke_tool<'a>(
        &'a self,
        name: &'a str,
        input: &'a serde_json::Value,
        budget_hint: Option<usize>,
    ) -> InvokeFuture<'a> {
        Box::pin(self.invoke(name, input, budget_hint))
    }
}

// ── FnTool ────────────────────────────────────────────────────────

/// Type-erased async handler for [`FnTool`].
type ErasedToolHandler =
    Box<dyn Fn(serde_json::Value) -> Pin<Box<dyn Future<Output = ToolResult> + Send>> + Send + Sync>;

/// A closure-based tool that auto-parses its input and delegates to a handler.
///
/// Eliminates the boilerplate of defining a struct + `impl Tool` for simple
/// tools whose logic is a pure async function. Use a struct implementing
/// [`Tool`] directly for tools that hold state or honour the budget hint.
///
/// # Example
///
/// ```ignore
/// #[derive(Deserialize, JsonSchema)]
/// struct SearchArgs {
///     /// The search query.
///     query: String,
/// }
///
/// let tool = FnTool::new(
///     ToolDef::new("search", "Search the knowledge base", json_schema_for::<SearchArgs>()),
///     |args: SearchArgs| async move { format!("No results for: {}", args.query) },
/// );
/// ```
pub struct FnTool {
    def: ToolDef,
    handler: ErasedToolHandler,
}

impl FnTool {
    /// Create a new closure-based tool.
    ///
    /// The handler receives input deserialized into `A` and returns anything
    /// convertible into a [`ToolResult`]: a `String` for success, or a
    /// `Result<String, String>` to report failures. Input that does not
    /// deserialize becomes an error result without calling the handler.
    pub fn new<A, F, Fut, R>(def: ToolDef, handler: F) -> Self
    where
        A: serde::de::DeserializeOwned + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: Into<ToolResult> + 'static,
    {
        let erased = move |raw: serde_json::Value| -> Pin<Box<dyn Future<Output = ToolResult> + Send>> {
            let args: A = match serde_json::from_value(raw) {
                Ok(a) => a,
                Err(e) => {
                    return Box::pin(async move {
                        ToolResult::error(format!(
                            "Error: invalid tool input: {e}. \
                             Please provide JSON matching the tool's parameter schema."
                        ))
                    });
                }
            };
            let fut = handler(args);
            Box::pin(async move { fut.await.into() })
        };

        Self {
            def,
            handler: Box::new(erased),
        }
    }
}

impl Tool for FnTool {
    fn definition(&self) -> ToolDef {
        self.def.clone()
    }

    fn invoke<'a>(
        &'a self,
        input: &'a serde_json::Value,
        _budget_hint: Option<usize>,
    ) -> ToolFuture<'a> {
        (self.handler)(input.clone())
    }
}

impl fmt::Debug for FnTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.def.function.name)
            .finish()
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Validate tool input against the tool's declared JSON Schema.
///
/// A schema that does not compile is not enforced.
pub fn validate_tool_input(tool: &dyn Tool, input: &serde_json::Value) -> Result<(), ToolError> {
    let schema = tool.definition().function.parameters;

    let validator = match jsonschema::validator_for(&schema) {
        Ok(v) => v,
        Err(_) => return Ok(()),
    };

    let errors: Vec<String> = validator
        .iter_errors(input)
        .map(|e| format!("{}: {e}", e.instance_path()))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ToolError::InvalidInput {
            name: tool.name(),
            reason: errors.join("; "),
        })
    }
}

/// Log a tool call at INFO level with a truncated preview of its input.
pub fn log_tool_call(name: &str, input: &serde_json::Value) {
    let arguments = input.to_string();
    let args_preview: String = arguments.chars().take(120).collect();
    info!(
        "[tool] {}({args_preview}{})",
        name,
        if arguments.len() > 120 { "..." } else { "" }
    );
    debug!("[tool] {name} full input ({} bytes)", arguments.len());
    trace!("[tool] {name} input: {arguments}");
}

/// Truncate a string to at most `max` bytes (backing off to a character
/// boundary), appending a notice if trimmed.
pub fn truncate_result(mut s: String, max: usize) -> String {
    if s.len() <= max {
        return s;
    }
    let total = s.len();
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
    format!("{s}...\n[truncated: {total} bytes total]")
}

/// Rough byte allowance for a token budget hint.
fn hint_bytes(tokens: usize) -> usize {
    (tokens as f64 * DEFAULT_CHARS_PER_TOKEN) as usize
}

// ── Tests ──────────────────────────────────────────────────────────
