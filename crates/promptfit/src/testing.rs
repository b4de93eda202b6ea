//! In-memory fakes shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio_util::sync::CancellationToken;

use crate::agent::model::{
    LanguageModel, RequestFuture, RequestOptions, ResponsePart, ResponseStream, ToolCallPart,
};
use crate::context::fs::{DirEntry, DirectoryLister, ListFuture};
use crate::context::tokens::{CountFuture, TokenCounter};
use crate::error::ModelError;
use crate::tools::FnTool;
use crate::{Message, ToolDef};

/// Charges one token per line; a trailing newline does not start a new one.
pub(crate) struct LineCounter;

impl TokenCounter for LineCounter {
    fn count_tokens<'a>(&'a self, text: &'a str) -> CountFuture<'a> {
        let n = text.split_terminator('\n').count();
        Box::pin(async move { n })
    }
}

/// A directory lister over a fixed set of paths.
pub(crate) struct MapLister {
    dirs: HashMap<PathBuf, Vec<DirEntry>>,
    calls: AtomicUsize,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl MapLister {
    /// Build a workspace under `root` from relative file paths. Parent
    /// directories are implied; listings keep first-seen order.
    pub(crate) fn from_paths(root: &str, files: &[&str]) -> Self {
        let root = PathBuf::from(root);
        let mut dirs: HashMap<PathBuf, Vec<DirEntry>> = HashMap::new();
        dirs.entry(root.clone()).or_default();
        for file in files {
            let names: Vec<&str> = file.split('/').collect();
            let mut dir = root.clone();
            for (i, name) in names.iter().enumerate() {
                let entry = if i + 1 == names.len() {
                    DirEntry::file(*name)
                } else {
                    DirEntry::dir(*name)
                };
                let listing = dirs.entry(dir.clone()).or_default();
                if !listing.iter().any(|e| e.name == *name) {
                    listing.push(entry);
                }
                dir = dir.join(name);
            }
        }
        Self {
            dirs,
            calls: AtomicUsize::new(0),
            cancel_after: None,
        }
    }

    /// Cancel `token` once `n` listings have been served.
    pub(crate) fn cancel_after(mut self, n: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((n, token));
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DirectoryLister for MapLister {
    fn read_directory<'a>(
        &'a self,
        path: &'a Path,
        _cancel: &'a CancellationToken,
    ) -> ListFuture<'a> {
        let served = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((n, token)) = &self.cancel_after
            && served >= *n
        {
            token.cancel();
        }
        let listing = self.dirs.get(path).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("{} not listed", path.display()))
        });
        Box::pin(async move { listing })
    }
}

// ── Model ──────────────────────────────────────────────────────────

type ScriptedResponse = Result<Vec<Result<ResponsePart, ModelError>>, ModelError>;

/// A model that plays back canned responses, one per request, and records
/// what it was sent. Once the script runs out it answers with nothing.
pub(crate) struct ScriptedModel {
    max_input_tokens: usize,
    script: Mutex<VecDeque<ScriptedResponse>>,
    requests: Mutex<Vec<(Vec<Message>, RequestOptions)>>,
}

impl ScriptedModel {
    pub(crate) fn new(max_input_tokens: usize) -> Self {
        Self {
            max_input_tokens,
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn reply(self, parts: Vec<ResponsePart>) -> Self {
        self.push(Ok(parts.into_iter().map(Ok).collect()))
    }

    /// Fail the request itself.
    pub(crate) fn fail(self, error: ModelError) -> Self {
        self.push(Err(error))
    }

    /// Stream `parts`, then break off with `error`.
    pub(crate) fn break_after(self, parts: Vec<ResponsePart>, error: ModelError) -> Self {
        let mut stream: Vec<_> = parts.into_iter().map(Ok).collect();
        stream.push(Err(error));
        self.push(Ok(stream))
    }

    fn push(self, response: ScriptedResponse) -> Self {
        self.script.lock().unwrap().push_back(response);
        self
    }

    pub(crate) fn requests(&self) -> Vec<(Vec<Message>, RequestOptions)> {
        self.requests.lock().unwrap().clone()
    }
}

impl LanguageModel for ScriptedModel {
    fn max_input_tokens(&self) -> usize {
        self.max_input_tokens
    }

    fn send_request<'a>(
        &'a self,
        messages: &'a [Message],
        options: &'a RequestOptions,
        _cancel: &'a CancellationToken,
    ) -> RequestFuture<'a> {
        self.requests
            .lock()
            .unwrap()
            .push((messages.to_vec(), options.clone()));
        let next = self.script.lock().unwrap().pop_front().unwrap_or(Ok(Vec::new()));
        Box::pin(async move {
            let parts = next?;
            let stream: ResponseStream<'a> = Box::pin(futures::stream::iter(parts));
            Ok(stream)
        })
    }
}

pub(crate) fn text(s: &str) -> ResponsePart {
    ResponsePart::Text(s.to_string())
}

pub(crate) fn call(id: &str, name: &str, input: serde_json::Value) -> ResponsePart {
    ResponsePart::ToolCall(ToolCallPart::new(id, name, input))
}

/// A tool that answers `"{name}: {input}"` and counts its invocations.
pub(crate) fn counting_tool(name: &str, calls: Arc<AtomicUsize>) -> FnTool {
    let label = name.to_string();
    FnTool::new(
        ToolDef::new(name, "Counts calls", serde_json::json!({"type": "object"})),
        move |input: serde_json::Value| {
            calls.fetch_add(1, Ordering::SeqCst);
            let answer = format!("{label}: {input}");
            async move { answer }
        },
    )
}
