//! Budget-aware text windows over single documents.
//!
//! A [`DocumentWindow`] grows a contiguous excerpt outward from a focus line,
//! alternating between the line above and the line below so the excerpt stays
//! centred. It never decides on its own whether a line fits; that is the job
//! of [`fill_windows`], which drives any number of windows round-robin against
//! one shared [`TokenBudget`].
//!
//! Growth is split into a pure peek ([`DocumentWindow::next_line`]) and a
//! commit ([`DocumentWindow::expand`]) so the caller can price a line before
//! taking it.

use std::collections::VecDeque;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::budget::TokenBudget;
use super::tokens::TokenCounter;
use super::{ContextFragment, PromptReference};
use crate::error::DocumentError;

/// An inclusive, 0-based range of lines. `start <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawLineRange")]
pub struct LineRange {
    start: usize,
    end: usize,
}

/// Wire shape of [`LineRange`]; reversed bounds are swapped on the way in.
#[derive(Deserialize)]
struct RawLineRange {
    start: usize,
    end: usize,
}

impl From<RawLineRange> for LineRange {
    fn from(raw: RawLineRange) -> Self {
        Self::new(raw.start, raw.end)
    }
}

impl LineRange {
    /// Create a range. The bounds are swapped if given in reverse.
    pub fn new(start: usize, end: usize) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// A range covering one line.
    pub fn line(line: usize) -> Self {
        Self::new(line, line)
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    /// The line at `start + (end - start) / 2`.
    pub fn midpoint(&self) -> usize {
        self.start + (self.end - self.start) / 2
    }

    /// Number of lines in the range.
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// Always `false`: a range holds at least one line.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, line: usize) -> bool {
        (self.start..=self.end).contains(&line)
    }
}

/// Displays 1-based, the way editors number lines.
impl fmt::Display for LineRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "line {}", self.start + 1)
        } else {
            write!(f, "lines {}-{}", self.start + 1, self.end + 1)
        }
    }
}

/// Where a window's text comes from.
#[derive(Debug, Clone)]
pub enum DocumentSource {
    /// Literal text with a display name.
    Text { name: String, text: String },
    /// A file read at load time.
    Path(PathBuf),
}

impl DocumentSource {
    pub fn text(name: impl Into<String>, text: impl Into<String>) -> Self {
        DocumentSource::Text {
            name: name.into(),
            text: text.into(),
        }
    }

    pub fn path(path: impl Into<PathBuf>) -> Self {
        DocumentSource::Path(path.into())
    }

    /// Display name used for labels and citations.
    pub fn name(&self) -> String {
        match self {
            DocumentSource::Text { name, .. } => name.clone(),
            DocumentSource::Path(path) => path.display().to_string(),
        }
    }

    /// Read the document's full text, giving up when `cancel` fires.
    pub async fn load(&self, cancel: &CancellationToken) -> Result<String, DocumentError> {
        match self {
            DocumentSource::Text { text, .. } => Ok(text.clone()),
            DocumentSource::Path(path) => tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(DocumentError::Cancelled { path: path.clone() }),
                read = tokio::fs::read_to_string(path) => {
                    read.map_err(|source| DocumentError::Unreadable {
                        path: path.clone(),
                        source,
                    })
                }
            },
        }
    }
}

/// Options for a single window.
#[derive(Debug, Clone)]
pub struct WindowOptions {
    /// Lines to centre the excerpt on. `None` starts at the first line.
    pub focus: Option<LineRange>,
    /// When `false`, growth is confined to the focus range.
    pub expand: bool,
    /// Label line placed above the fenced excerpt. Defaults to the
    /// document name followed by a colon.
    pub label: Option<String>,
}

impl Default for WindowOptions {
    fn default() -> Self {
        Self {
            focus: None,
            expand: true,
            label: None,
        }
    }
}

impl WindowOptions {
    pub fn with_focus(mut self, focus: LineRange) -> Self {
        self.focus = Some(focus);
        self
    }

    pub fn with_expand(mut self, expand: bool) -> Self {
        self.expand = expand;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Which side the next committed line comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowDirection {
    ExpandAbove,
    ExpandBelow,
    Done,
}

/// Citation location for the lines a window ended up including.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowReference {
    pub name: String,
    pub range: LineRange,
}

/// A growing excerpt of one document.
///
/// Invariant: `min_line <= anchor_above <= anchor_below <= max_line`, and
/// once the seed line is committed the included lines are exactly
/// `anchor_above..=anchor_below`.
#[derive(Debug, Clone)]
pub struct DocumentWindow {
    name: String,
    label: String,
    lines: Vec<String>,
    included: VecDeque<usize>,
    anchor_above: usize,
    anchor_below: usize,
    min_line: usize,
    max_line: usize,
    direction: WindowDirection,
    fence: String,
    /// Set once the fill pass has paid for the label and fences.
    admitted: bool,
}

impl DocumentWindow {
    /// Create a window over already-loaded text.
    pub fn new(name: impl Into<String>, text: &str, options: WindowOptions) -> Self {
        let name = name.into();
        let lines: Vec<String> = text.lines().map(str::to_owned).collect();
        let label = options.label.unwrap_or_else(|| format!("{name}:"));
        let fence = fence_for(&lines);

        let last = lines.len().saturating_sub(1);
        let focus = options
            .focus
            .map(|r| LineRange::new(r.start.min(last), r.end.min(last)));
        let anchor = focus.map_or(0, |r| r.midpoint());
        let (min_line, max_line) = match focus {
            Some(r) if !options.expand => (r.start, r.end),
            _ => (0, last),
        };
        let direction = if lines.is_empty() {
            WindowDirection::Done
        } else {
            WindowDirection::ExpandAbove
        };

        Self {
            name,
            label,
            lines,
            included: VecDeque::new(),
            anchor_above: anchor,
            anchor_below: anchor,
            min_line,
            max_line,
            direction,
            fence,
            admitted: false,
        }
    }

    /// Load `source` and create a window over it.
    ///
    /// An unreadable source does not fail the pass: the window is built over
    /// a one-line placeholder naming the problem. Cancellation yields the
    /// same placeholder.
    pub async fn load(
        source: &DocumentSource,
        options: WindowOptions,
        cancel: &CancellationToken,
    ) -> Self {
        let name = source.name();
        let text = match source.load(cancel).await {
            Ok(text) => text,
            Err(e @ DocumentError::Cancelled { .. }) => {
                debug!("{e}");
                format!("(contents unavailable: {e})")
            }
            Err(e) => {
                warn!("{e}; substituting placeholder content");
                format!("(contents unavailable: {e})")
            }
        };
        Self::new(name, &text, options)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn direction(&self) -> WindowDirection {
        self.direction
    }

    /// Number of lines committed so far.
    pub fn included_len(&self) -> usize {
        self.included.len()
    }

    /// Whether the fill pass has paid for this window's frame.
    pub fn is_admitted(&self) -> bool {
        self.admitted
    }

    /// The line the next [`expand`](Self::expand) would commit, without
    /// changing any state. `None` once the window is done.
    pub fn next_line(&self) -> Option<&str> {
        let index = match self.direction {
            WindowDirection::Done => return None,
            _ if self.included.is_empty() => Some(self.anchor_above),
            WindowDirection::ExpandAbove => self.anchor_above.checked_sub(1),
            WindowDirection::ExpandBelow => Some(self.anchor_below + 1),
        }?;
        self.lines.get(index).map(String::as_str)
    }

    /// Commit the line last returned by [`next_line`](Self::next_line) and
    /// pick the next direction. Returns `false` if the window was done.
    pub fn expand(&mut self) -> bool {
        let grew_above = match self.direction {
            WindowDirection::Done => return false,
            _ if self.included.is_empty() => {
                self.included.push_back(self.anchor_above);
                true
            }
            WindowDirection::ExpandAbove => {
                self.anchor_above -= 1;
                self.included.push_front(self.anchor_above);
                true
            }
            WindowDirection::ExpandBelow => {
                self.anchor_below += 1;
                self.included.push_back(self.anchor_below);
                false
            }
        };
        self.direction = self.next_direction(grew_above);
        true
    }

    /// Prefer the opposite side of the one just grown.
    fn next_direction(&self, grew_above: bool) -> WindowDirection {
        let room_above = self.anchor_above > self.min_line;
        let room_below = self.anchor_below < self.max_line;
        match (grew_above, room_above, room_below) {
            (true, _, true) => WindowDirection::ExpandBelow,
            (true, true, false) => WindowDirection::ExpandAbove,
            (false, true, _) => WindowDirection::ExpandAbove,
            (false, false, true) => WindowDirection::ExpandBelow,
            _ => WindowDirection::Done,
        }
    }

    /// The label line plus the opening fence, as charged by the fill pass.
    fn frame_head(&self) -> String {
        format!("{}\n{}\n", self.label, self.fence)
    }

    /// Render the label and the fenced excerpt. Empty if the window was
    /// never admitted by a fill pass.
    pub fn render(&self) -> String {
        if !self.admitted {
            return String::new();
        }
        let mut out = self.frame_head();
        for &index in &self.included {
            out.push_str(&self.lines[index]);
            out.push('\n');
        }
        out.push_str(&self.fence);
        out
    }

    /// The span of included lines, for citation.
    pub fn reference(&self) -> Option<WindowReference> {
        if self.included.is_empty() {
            return None;
        }
        Some(WindowReference {
            name: self.name.clone(),
            range: LineRange::new(self.anchor_above, self.anchor_below),
        })
    }

    /// Package the rendered window for a prompt renderer. `None` if nothing
    /// was admitted.
    pub fn to_fragment(&self) -> Option<ContextFragment> {
        if !self.admitted {
            return None;
        }
        let reference = self.reference().map(|r| PromptReference {
            name: r.name,
            range: Some(r.range),
        });
        Some(ContextFragment {
            text: self.render(),
            reference,
        })
    }
}

/// Outcome of one [`fill_windows`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FillReport {
    /// Lines committed across all windows.
    pub lines_added: usize,
    /// Rounds that committed at least one line.
    pub rounds: usize,
    /// Tokens charged by the pass, frames included.
    pub tokens_used: usize,
}

/// Grow `windows` round-robin until the shared budget or the documents run
/// out.
///
/// Each window's frame is charged first, in input order; a window whose
/// frame does not fit stays unadmitted and renders to nothing. Then every
/// round offers each admitted window one line, again in input order, and
/// commits it only if its cost fits what is left. A window skipped in one
/// round is offered its line again in the next. The pass ends after the
/// first round that commits nothing.
pub async fn fill_windows(
    windows: &mut [DocumentWindow],
    counter: &dyn TokenCounter,
    budget: &mut TokenBudget,
) -> FillReport {
    let start_used = budget.used();

    for window in windows.iter_mut().filter(|w| !w.admitted) {
        let head = counter.count_tokens(&window.frame_head()).await;
        let tail = counter.count_tokens(&window.fence).await;
        if budget.try_charge(head + tail) {
            window.admitted = true;
        } else {
            debug!(
                "Window {} not admitted: frame needs {} tokens, {} left",
                window.name,
                head + tail,
                budget.remaining()
            );
        }
    }

    let mut report = FillReport::default();
    loop {
        let mut added = false;
        for window in windows.iter_mut().filter(|w| w.admitted) {
            let piece = match window.next_line() {
                Some(line) => format!("{line}\n"),
                None => continue,
            };
            let cost = counter.count_tokens(&piece).await;
            if budget.try_charge(cost) {
                window.expand();
                report.lines_added += 1;
                added = true;
            } else {
                trace!(
                    "Window {}: next line costs {cost}, {} left",
                    window.name,
                    budget.remaining()
                );
            }
        }
        if !added {
            break;
        }
        report.rounds += 1;
    }

    report.tokens_used = budget.used() - start_used;
    debug!(
        "Filled {} window(s): {} line(s) in {} round(s), {} tokens",
        windows.len(),
        report.lines_added,
        report.rounds,
        report.tokens_used
    );
    report
}

/// A backtick fence longer than any backtick run in the document.
fn fence_for(lines: &[String]) -> String {
    let longest = lines
        .iter()
        .map(|line| {
            line.split(|c: char| c != '`')
                .map(str::len)
                .max()
                .unwrap_or(0)
        })
        .max()
        .unwrap_or(0);
    "`".repeat(longest.max(2) + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tokens::CharRatioCounter;
    use crate::testing::LineCounter;

    fn numbered(n: usize) -> String {
        (1..=n)
            .map(|i| format!("line {i}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    async fn fill_one(window: &mut DocumentWindow, counter: &dyn TokenCounter, limit: usize) {
        let mut budget = TokenBudget::new(limit);
        fill_windows(std::slice::from_mut(window), counter, &mut budget).await;
    }

    #[test]
    fn next_line_is_a_pure_peek() {
        let window = DocumentWindow::new(
            "a.txt",
            &numbered(5),
            WindowOptions::default().with_focus(LineRange::line(2)),
        );
        assert_eq!(window.next_line(), Some("line 3"));
        assert_eq!(window.next_line(), Some("line 3"));
        assert_eq!(window.included_len(), 0);
    }

    #[test]
    fn growth_alternates_starting_below_the_seed() {
        let mut window = DocumentWindow::new(
            "a.txt",
            &numbered(9),
            WindowOptions::default().with_focus(LineRange::line(4)),
        );
        let mut order = Vec::new();
        while let Some(line) = window.next_line() {
            order.push(line.to_string());
            window.expand();
        }
        assert_eq!(
            order,
            [
                "line 5", "line 6", "line 4", "line 7", "line 3", "line 8", "line 2", "line 9",
                "line 1"
            ]
        );
        assert_eq!(window.direction(), WindowDirection::Done);
        assert!(!window.expand());
    }

    #[test]
    fn one_side_exhausted_keeps_growing_the_other() {
        let mut window = DocumentWindow::new("a.txt", &numbered(4), WindowOptions::default());
        let mut order = Vec::new();
        while let Some(line) = window.next_line() {
            order.push(line.to_string());
            window.expand();
        }
        assert_eq!(order, ["line 1", "line 2", "line 3", "line 4"]);
    }

    #[tokio::test]
    async fn unlimited_budget_includes_every_line_once_in_order() {
        let text = numbered(25);
        let mut window = DocumentWindow::new(
            "doc.txt",
            &text,
            WindowOptions::default().with_focus(LineRange::new(10, 14)),
        );
        fill_one(&mut window, &CharRatioCounter::default(), usize::MAX).await;

        let rendered = window.render();
        let body: Vec<&str> = rendered.lines().skip(2).collect();
        let expected: Vec<&str> = text.lines().chain(["```"]).collect();
        assert_eq!(body, expected);
        assert_eq!(window.reference().unwrap().range, LineRange::new(0, 24));
    }

    #[tokio::test]
    async fn disabled_expansion_stays_inside_focus() {
        let mut window = DocumentWindow::new(
            "doc.txt",
            &numbered(30),
            WindowOptions::default()
                .with_focus(LineRange::new(9, 11))
                .with_expand(false),
        );
        fill_one(&mut window, &LineCounter, usize::MAX).await;
        assert_eq!(
            window.render(),
            "doc.txt:\n```\nline 10\nline 11\nline 12\n```"
        );
    }

    #[tokio::test]
    async fn focus_window_grows_evenly_around_midpoint() {
        // Frame costs three lines (label, two fences); ten more lines fit.
        let mut window = DocumentWindow::new(
            "doc.txt",
            &numbered(30),
            WindowOptions::default().with_focus(LineRange::new(9, 11)),
        );
        fill_one(&mut window, &LineCounter, 13).await;

        let expected_body: Vec<String> = (7..=16).map(|i| format!("line {i}")).collect();
        let expected = format!("doc.txt:\n```\n{}\n```", expected_body.join("\n"));
        assert_eq!(window.render(), expected);
        assert_eq!(
            window.reference().map(|r| r.range.to_string()),
            Some("lines 7-16".to_string())
        );
    }

    #[tokio::test]
    async fn zero_budget_renders_nothing() {
        let mut windows = vec![DocumentWindow::new(
            "doc.txt",
            &numbered(3),
            WindowOptions::default(),
        )];
        let mut budget = TokenBudget::new(0);
        let report = fill_windows(&mut windows, &CharRatioCounter::default(), &mut budget).await;
        assert_eq!(report, FillReport::default());
        assert_eq!(windows[0].render(), "");
        assert!(windows[0].to_fragment().is_none());
    }

    #[tokio::test]
    async fn rendered_cost_never_exceeds_budget() {
        let counter = CharRatioCounter::new(3.0);
        let text = "fn main() {\n    let x = 1;\n\n    println!(\"{x}\");\n}\n// trailing comment\n";
        for limit in 0..60 {
            let mut windows = vec![
                DocumentWindow::new(
                    "main.rs",
                    text,
                    WindowOptions::default().with_focus(LineRange::line(3)),
                ),
                DocumentWindow::new("notes.md", &numbered(6), WindowOptions::default()),
            ];
            let mut budget = TokenBudget::new(limit);
            fill_windows(&mut windows, &counter, &mut budget).await;
            let mut measured = 0;
            for window in &windows {
                measured += counter.count_tokens(&window.render()).await;
            }
            assert!(measured <= limit, "budget {limit}: measured {measured}");
        }
    }

    #[tokio::test]
    async fn round_robin_visits_windows_in_input_order() {
        // Two frames cost 6; three lines remain, so the first window gets two.
        let mut windows = vec![
            DocumentWindow::new("a", &numbered(5), WindowOptions::default()),
            DocumentWindow::new("b", &numbered(5), WindowOptions::default()),
        ];
        let mut budget = TokenBudget::new(9);
        let report = fill_windows(&mut windows, &LineCounter, &mut budget).await;
        assert_eq!(report.lines_added, 3);
        assert_eq!(report.rounds, 2);
        assert_eq!(windows[0].included_len(), 2);
        assert_eq!(windows[1].included_len(), 1);
        assert_eq!(budget.remaining(), 0);
    }

    #[tokio::test]
    async fn skipped_window_is_retried_while_others_finish() {
        let counter = crate::context::tokens::FnCounter::new(|t: &str| {
            if t.starts_with("long") { 5 } else { 1 }
        });
        let mut windows = vec![
            DocumentWindow::new("a", "long line\nshort", WindowOptions::default()),
            DocumentWindow::new("b", "x\ny\nz", WindowOptions::default()),
        ];
        // Each frame costs two tokens under this counter.
        let mut budget = TokenBudget::new(4 + 3);
        fill_windows(&mut windows, &counter, &mut budget).await;
        assert_eq!(windows[0].included_len(), 0);
        assert_eq!(windows[1].included_len(), 3);
    }

    #[tokio::test]
    async fn unreadable_path_becomes_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.rs");
        let mut window =
            DocumentWindow::load(
                &DocumentSource::path(&missing),
                WindowOptions::default(),
                &CancellationToken::new(),
            )
            .await;
        fill_one(&mut window, &CharRatioCounter::default(), usize::MAX).await;
        assert!(window.render().contains("contents unavailable"));
    }

    #[tokio::test]
    async fn loads_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lib.rs");
        std::fs::write(&path, "pub mod a;\r\npub mod b;\r\n").unwrap();
        let mut window = DocumentWindow::load(
            &DocumentSource::path(&path),
            WindowOptions::default().with_label("lib.rs"),
            &CancellationToken::new(),
        )
        .await;
        fill_one(&mut window, &CharRatioCounter::default(), usize::MAX).await;
        assert_eq!(window.render(), "lib.rs\n```\npub mod a;\npub mod b;\n```");
    }

    #[tokio::test]
    async fn cancelled_load_reports_cancellation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lib.rs");
        std::fs::write(&path, "pub mod a;\n").unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = DocumentSource::path(&path).load(&cancel).await.unwrap_err();
        assert!(matches!(err, DocumentError::Cancelled { .. }));

        let text = DocumentSource::text("notes", "kept").load(&cancel).await.unwrap();
        assert_eq!(text, "kept");

        let mut window =
            DocumentWindow::load(&DocumentSource::path(&path), WindowOptions::default(), &cancel)
                .await;
        fill_one(&mut window, &CharRatioCounter::default(), usize::MAX).await;
        assert!(window.render().contains("cancelled"));
    }

    #[test]
    fn reversed_bounds_are_normalized_on_deserialize() {
        let range: LineRange = serde_json::from_str(r#"{"start": 9, "end": 2}"#).unwrap();
        assert_eq!(range, LineRange::new(2, 9));
        assert_eq!((range.start(), range.end()), (2, 9));
        assert_eq!(range.len(), 8);
        assert_eq!(range.midpoint(), 5);
        assert_eq!(
            serde_json::to_value(range).unwrap(),
            serde_json::json!({"start": 2, "end": 9})
        );
    }

    #[test]
    fn fence_outgrows_embedded_backticks() {
        let window = DocumentWindow::new(
            "README.md",
            "intro\n````rust\nfn x() {}\n````",
            WindowOptions::default(),
        );
        assert_eq!(window.fence, "`````");
    }

    #[test]
    fn empty_document_is_done_immediately() {
        let window = DocumentWindow::new("empty", "", WindowOptions::default());
        assert_eq!(window.direction(), WindowDirection::Done);
        assert_eq!(window.next_line(), None);
        assert!(window.reference().is_none());
    }

    #[test]
    fn focus_is_clamped_to_the_document() {
        let window = DocumentWindow::new(
            "short",
            &numbered(3),
            WindowOptions::default().with_focus(LineRange::new(10, 20)),
        );
        assert_eq!(window.next_line(), Some("line 3"));
    }
}
