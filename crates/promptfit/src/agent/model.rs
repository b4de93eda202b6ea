//! The model capability the [`Harness`](super::harness::Harness) drives.
//!
//! Transport is the implementor's business. The harness only needs the
//! model's input window and a way to issue one request and read back its
//! response as an ordered stream of [`ResponsePart`]s.

use std::future::Future;
use std::pin::Pin;

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::ModelError;
use crate::{Message, ToolDef};

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallPart {
    /// Model-assigned id, unique within a run.
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

impl ToolCallPart {
    pub fn new(id: impl Into<String>, name: impl Into<String>, input: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input,
        }
    }
}

/// One element of a streamed response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePart {
    Text(String),
    ToolCall(ToolCallPart),
}

/// How the model may use the offered tools.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ToolMode {
    /// The model decides whether to call any tool.
    #[default]
    Auto,
    /// The model must call one of the offered tools.
    Required,
}

/// Per-request options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    pub tools: Vec<ToolDef>,
    pub tool_mode: ToolMode,
}

impl RequestOptions {
    /// Offer `tools` with free choice.
    pub fn auto(tools: Vec<ToolDef>) -> Self {
        Self {
            tools,
            tool_mode: ToolMode::Auto,
        }
    }

    /// Force a call to exactly this tool.
    pub fn forced(tool: ToolDef) -> Self {
        Self {
            tools: vec![tool],
            tool_mode: ToolMode::Required,
        }
    }
}

/// Stream of response parts for one request.
pub type ResponseStream<'a> = BoxStream<'a, Result<ResponsePart, ModelError>>;

/// Boxed future returned by [`LanguageModel::send_request`].
pub type RequestFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ResponseStream<'a>, ModelError>> + Send + 'a>>;

/// A conversational model.
///
/// Implementations should stop producing parts and return
/// [`ModelError::Cancelled`] once `cancel` fires.
pub trait LanguageModel: Send + Sync {
    /// Size of the model's input window, in tokens.
    fn max_input_tokens(&self) -> usize;

    /// Issue one request.
    fn send_request<'a>(
        &'a self,
        messages: &'a [Message],
        options: &'a RequestOptions,
        cancel: &'a CancellationToken,
    ) -> RequestFuture<'a>;
}
