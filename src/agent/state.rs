//! Retry loop states and the per-call retry budget.

use crate::agent::Answer;
use crate::error::AgentError;
use crate::tools::sql_validator::GeneratedQuery;

/// One step of the generate/validate/execute loop.
#[derive(Debug)]
pub enum AgentState {
    /// Ask the generator for the next candidate.
    Generating,
    /// Run the structural table check on a candidate.
    Validating(GeneratedQuery),
    /// Submit a validated statement to the warehouse.
    Executing(GeneratedQuery),
    /// A candidate was rejected with a recoverable error.
    Retrying {
        /// Text of the rejected candidate as the generator wrote it
        candidate: String,
        error: AgentError,
    },
    Succeeded(Answer),
    Failed(AgentError),
}

impl AgentState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Generating => "generating",
            Self::Validating(_) => "validating",
            Self::Executing(_) => "executing",
            Self::Retrying { .. } => "retrying",
            Self::Succeeded(_) => "succeeded",
            Self::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded(_) | Self::Failed(_))
    }
}

/// Bounded number of regenerations allowed after a rejected candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    remaining: u32,
}

impl RetryBudget {
    pub fn new(retries: u32) -> Self {
        Self { remaining: retries }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Take one retry. Returns `false` once the budget is spent.
    pub fn try_consume(&mut self) -> bool {
        match self.remaining.checked_sub(1) {
            Some(left) => {
                self.remaining = left;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_consumes_down_to_zero() {
        let mut budget = RetryBudget::new(2);
        assert!(budget.try_consume());
        assert_eq!(budget.remaining(), 1);
        assert!(budget.try_consume());
        assert_eq!(budget.remaining(), 0);
        assert!(!budget.try_consume());
        assert_eq!(budget.remaining(), 0);
    }

    #[test]
    fn test_zero_budget_never_retries() {
        let mut budget = RetryBudget::new(0);
        assert!(!budget.try_consume());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!AgentState::Generating.is_terminal());
        assert!(AgentState::Failed(AgentError::internal("boom")).is_terminal());
        assert_eq!(AgentState::Generating.name(), "generating");
    }
}
