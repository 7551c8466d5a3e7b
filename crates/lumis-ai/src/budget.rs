//! Estimated-token budget for one run

/// Characters per estimated token.
const CHARS_PER_TOKEN: usize = 4;
/// Flat cost added to every request for the system prompt and the reply.
const REQUEST_OVERHEAD: usize = 500;

/// How much of the budget is spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BudgetLevel {
    /// Under half spent.
    Plenty,
    /// Half or more spent.
    Low,
    /// Nine tenths or more spent.
    Exhausted,
}

/// Outcome of charging one prompt against the budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charge {
    Granted { cost: usize, level: BudgetLevel },
    Refused { cost: usize, remaining: usize },
}

#[derive(Debug, Clone)]
pub struct TokenBudget {
    limit: usize,
    spent: usize,
}

impl TokenBudget {
    pub fn new(limit: usize) -> Self {
        Self { limit, spent: 0 }
    }

    /// Estimated cost of a prompt of `prompt_len` characters.
    pub fn estimate(prompt_len: usize) -> usize {
        (prompt_len / CHARS_PER_TOKEN).saturating_add(REQUEST_OVERHEAD)
    }

    pub fn spent(&self) -> usize {
        self.spent
    }

    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.spent)
    }

    pub fn level(&self) -> BudgetLevel {
        if self.limit == 0 || self.spent.saturating_mul(10) >= self.limit.saturating_mul(9) {
            BudgetLevel::Exhausted
        } else if self.spent.saturating_mul(2) >= self.limit {
            BudgetLevel::Low
        } else {
            BudgetLevel::Plenty
        }
    }

    /// Reserve the cost of a prompt; nothing is spent when it does not fit.
    pub fn charge(&mut self, prompt_len: usize) -> Charge {
        let cost = Self::estimate(prompt_len);
        if cost > self.remaining() {
            return Charge::Refused {
                cost,
                remaining: self.remaining(),
            };
        }
        self.spent += cost;
        Charge::Granted {
            cost,
            level: self.level(),
        }
    }
}
