//! Token budget accounting.
//!
//! A [`TokenBudget`] is a decrementing counter. Costs are checked before
//! they are committed, so the remaining balance can never go below zero.

/// Remaining token allowance for one assembly pass or one prompt render.
///
/// # Example
///
/// ```ignore
/// let mut budget = TokenBudget::for_model(128_000, 4096);
/// if budget.try_charge(cost) {
///     // commit the piece
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBudget {
    limit: usize,
    remaining: usize,
}

impl TokenBudget {
    /// Create a budget with `limit` tokens available.
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            remaining: limit,
        }
    }

    /// A budget that never runs out.
    pub fn unlimited() -> Self {
        Self::new(usize::MAX)
    }

    /// Budget for a prompt: the model's input window minus the tokens held
    /// back for its response.
    pub fn for_model(max_input_tokens: usize, output_reserve: usize) -> Self {
        Self::new(max_input_tokens.saturating_sub(output_reserve))
    }

    /// Total allowance this budget started with.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Tokens still available.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Tokens committed so far.
    pub fn used(&self) -> usize {
        self.limit - self.remaining
    }

    /// Whether `cost` would fit without committing it.
    pub fn fits(&self, cost: usize) -> bool {
        cost <= self.remaining
    }

    /// Commit `cost` if it fits. Returns `false` and leaves the balance
    /// untouched otherwise.
    pub fn try_charge(&mut self, cost: usize) -> bool {
        if self.fits(cost) {
            self.remaining -= cost;
            true
        } else {
            false
        }
    }

    /// Whether nothing is left.
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}
