//! Render budget-limited context from the command line.
//!
//! Token counts use the character-ratio heuristic; `--chars-per-token`
//! calibrates it. Set `RUST_LOG=debug` to see what each pass charged.
//!
//! # Examples
//!
//! ```sh
//! # Excerpt lines 40-52 of a file, grown to fit 300 tokens
//! promptfit window src/main.rs --focus 40:52 --budget 300
//!
//! # Directory listing that expands src/agent first
//! promptfit tree . --focus src/agent --budget 500
//!
//! # Read a rendered listing back
//! promptfit tree . --budget 500 | promptfit parse
//! ```

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use promptfit::context::{
    CharRatioCounter, DEFAULT_CHARS_PER_TOKEN, DocumentSource, DocumentWindow, EntryKind,
    FileTree, FnIgnore, FsLister, LineRange, TokenBudget, TreeBuilder, WindowOptions,
    fill_windows,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Render budget-limited context from the command line.
#[derive(Parser)]
#[command(name = "promptfit")]
struct Cli {
    /// Characters per token for the counting heuristic
    #[arg(long, global = true, default_value_t = DEFAULT_CHARS_PER_TOKEN)]
    chars_per_token: f64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print a fenced excerpt of a file that fits the budget
    Window {
        file: PathBuf,

        /// Lines to centre on, 1-based and inclusive: `12` or `40:52`
        #[arg(long, value_parser = parse_line_range)]
        focus: Option<LineRange>,

        /// Stay inside the focus lines
        #[arg(long)]
        no_expand: bool,

        /// Label line above the excerpt (default: the file name)
        #[arg(long)]
        label: Option<String>,

        /// Token budget
        #[arg(long)]
        budget: usize,
    },
    /// Print a directory listing that fits the budget
    Tree {
        root: PathBuf,

        /// Directory to expand first
        #[arg(long)]
        focus: Option<PathBuf>,

        /// Token budget
        #[arg(long)]
        budget: usize,

        /// Include `.git` and `target` directories
        #[arg(long)]
        all: bool,
    },
    /// Read a rendered listing on stdin and print the entries it contains
    Parse {
        /// Root the listing's paths are relative to
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
}

// ── Helpers ────────────────────────────────────────────────────────

/// Parse a 1-based `start:end` or single-line focus into a 0-based range.
fn parse_line_range(s: &str) -> Result<LineRange, String> {
    let line = |part: &str| -> Result<usize, String> {
        match part.trim().parse::<usize>() {
            Ok(0) | Err(_) => Err(format!("'{part}' is not a line number (lines start at 1)")),
            Ok(n) => Ok(n - 1),
        }
    };
    match s.split_once(':') {
        Some((start, end)) => {
            let (start, end) = (line(start)?, line(end)?);
            if start > end {
                return Err(format!("focus {s} ends before it starts"));
            }
            Ok(LineRange::new(start, end))
        }
        None => line(s).map(LineRange::line),
    }
}

fn read_stdin_content() -> Result<String, String> {
    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .map_err(|e| format!("failed to read stdin: {e}"))?;
    Ok(buf)
}

fn is_build_noise(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name == ".git" || name == "target")
}

/// Cancel `token` on Ctrl-C so a slow read or listing still prints what it has.
fn cancel_on_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });
}

// ── Commands ───────────────────────────────────────────────────────

async fn run(cli: Cli) -> Result<String, String> {
    let counter = CharRatioCounter::new(cli.chars_per_token);

    match cli.command {
        Command::Window {
            file,
            focus,
            no_expand,
            label,
            budget,
        } => {
            let mut options = WindowOptions::default().with_expand(!no_expand);
            if let Some(focus) = focus {
                options = options.with_focus(focus);
            }
            if let Some(label) = label {
                options = options.with_label(label);
            }
            let cancel = CancellationToken::new();
            cancel_on_interrupt(cancel.clone());
            let window = DocumentWindow::load(&DocumentSource::path(file), options, &cancel).await;
            let mut windows = [window];
            let mut budget = TokenBudget::new(budget);
            let report = fill_windows(&mut windows, &counter, &mut budget).await;
            info!(
                "Window: {} line(s), {} of {} tokens",
                report.lines_added,
                report.tokens_used,
                budget.limit()
            );
            Ok(windows[0].render())
        }
        Command::Tree {
            root,
            focus,
            budget,
            all,
        } => {
            let cancel = CancellationToken::new();
            cancel_on_interrupt(cancel.clone());
            let ignore = FnIgnore::new(is_build_noise);
            let mut builder =
                TreeBuilder::new(&root, &FsLister, &counter).with_cancellation(cancel);
            if !all {
                builder = builder.with_ignore(&ignore);
            }
            if let Some(focus) = focus {
                builder = builder.with_focus(focus);
            }
            let mut budget = TokenBudget::new(budget);
            let tree = builder.build(&mut budget).await.map_err(|e| e.to_string())?;
            info!(
                "Tree: {} entries, {} of {} tokens",
                tree.len(),
                budget.used(),
                budget.limit()
            );
            Ok(tree.render())
        }
        Command::Parse { root } => {
            let text = read_stdin_content()?;
            let tree = FileTree::parse_text(&text, &root);
            debug!("Parsed {} entries", tree.len());
            let mut out = String::new();
            for node in tree.nodes().iter().skip(1) {
                let path = node.path.strip_prefix(&root).unwrap_or(&node.path);
                let kind = match node.kind {
                    EntryKind::Directory => "dir ",
                    EntryKind::File => "file",
                };
                out.push_str(&format!("{kind} {}\n", path.display()));
            }
            Ok(out)
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(output) if output.is_empty() => {}
        Ok(output) if output.ends_with('\n') => print!("{output}"),
        Ok(output) => println!("{output}"),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
