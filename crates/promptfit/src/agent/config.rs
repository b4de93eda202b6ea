//! Configuration for the [`Harness`](super::harness::Harness).
//!
//! ```ignore
//! let config = HarnessConfig::new()
//!     .with_max_rounds(8)
//!     .with_output_reserve(2048)
//!     .with_emit_to_sink(false);
//! ```

/// Default bound on request rounds per run.
pub const DEFAULT_MAX_ROUNDS: usize = 20;

/// Default number of input tokens held back for the model's reply.
pub const DEFAULT_OUTPUT_RESERVE: usize = 4096;

/// Harness settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Maximum model requests in one run. Reaching it ends the run
    /// unfinished.
    pub max_rounds: usize,
    /// Tokens subtracted from the model's input window before rendering.
    pub output_reserve: usize,
    /// Forward streamed text and prompt references to the response sink.
    pub emit_to_sink: bool,
}

impl HarnessConfig {
    pub fn new() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            output_reserve: DEFAULT_OUTPUT_RESERVE,
            emit_to_sink: true,
        }
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn with_output_reserve(mut self, tokens: usize) -> Self {
        self.output_reserve = tokens;
        self
    }

    pub fn with_emit_to_sink(mut self, emit: bool) -> Self {
        self.emit_to_sink = emit;
        self
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self::new()
    }
}
