//! Token counting capability.
//!
//! Budget checks in this crate are only as sound as the counter behind them.
//! Every algorithm here assumes the counter is monotonic and subadditive:
//! `count(a + b) <= count(a) + count(b)`. Under that assumption, charging
//! pieces one at a time never admits more than the budget allows. A counter
//! that violates it can make rendered output exceed the budget.

use std::future::Future;
use std::pin::Pin;

use tracing::warn;

/// Default characters per token (conservative estimate for English text).
/// Most tokenizers average 3-4 chars per token; we use 3.5 as a middle ground.
pub const DEFAULT_CHARS_PER_TOKEN: f64 = 3.5;

/// Boxed future returned by [`TokenCounter::count_tokens`].
pub type CountFuture<'a> = Pin<Box<dyn Future<Output = usize> + Send + 'a>>;

/// Measures the size of a piece of text in model tokens.
///
/// Counting is expected to be cheap and free of side effects. Results are
/// never cached, so the same text may be counted many times.
pub trait TokenCounter: Send + Sync {
    fn count_tokens<'a>(&'a self, text: &'a str) -> CountFuture<'a>;
}

/// Heuristic counter: `ceil(chars / chars_per_token)`.
///
/// Rounding up keeps the estimate subadditive, so it is safe to drive the
/// incremental budget checks with it.
#[derive(Debug, Clone, Copy)]
pub struct CharRatioCounter {
    chars_per_token: f64,
}

impl CharRatioCounter {
    /// Create a counter with a calibrated chars-per-token ratio. Ratios that
    /// are not finite and strictly positive fall back to
    /// [`DEFAULT_CHARS_PER_TOKEN`].
    pub fn new(chars_per_token: f64) -> Self {
        let chars_per_token = if chars_per_token.is_finite() && chars_per_token > 0.0 {
            chars_per_token
        } else {
            warn!(
                "Unusable chars-per-token ratio {chars_per_token}; using {DEFAULT_CHARS_PER_TOKEN}"
            );
            DEFAULT_CHARS_PER_TOKEN
        };
        Self { chars_per_token }
    }

    /// Synchronous estimate used by the async impl.
    pub fn estimate(&self, text: &str) -> usize {
        let chars = text.chars().count();
        (chars as f64 / self.chars_per_token).ceil() as usize
    }
}

impl Default for CharRatioCounter {
    fn default() -> Self {
        Self::new(DEFAULT_CHARS_PER_TOKEN)
    }
}

impl TokenCounter for CharRatioCounter {
    fn count_tokens<'a>(&'a self, text: &'a str) -> CountFuture<'a> {
        let n = self.estimate(text);
        Box::pin(async move { n })
    }
}

/// A counter backed by a synchronous closure.
///
/// ```ignore
/// let words = FnCounter::new(|text: &str| text.split_whitespace().count());
/// ```
pub struct FnCounter<F>(F)
where
    F: Fn(&str) -> usize + Send + Sync;

impl<F> FnCounter<F>
where
    F: Fn(&str) -> usize + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> TokenCounter for FnCounter<F>
where
    F: Fn(&str) -> usize + Send + Sync,
{
    fn count_tokens<'a>(&'a self, text: &'a str) -> CountFuture<'a> {
        let n = (self.0)(text);
        Box::pin(async move { n })
    }
}
