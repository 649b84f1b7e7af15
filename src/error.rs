use thiserror::Error;

/// Why a `(v, k, λ)` triple cannot describe a block design.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Infeasibility {
    #[error("block size must satisfy 2 <= k <= v")]
    BlockSizeOutOfRange,

    #[error("lambda must be at least 1")]
    ZeroLambda,

    #[error("b = λ·v·(v-1) / (k·(k-1)) is not an integer")]
    NonIntegerBlockCount,

    #[error("r = λ·(v-1) / (k-1) is not an integer")]
    NonIntegerReplication,

    #[error("b·k = v·r does not hold")]
    BalanceIdentity,

    #[error("parameters are too large to evaluate")]
    Overflow,
}

/// Errors produced while validating, searching for, or tabulating a design.
#[derive(Error, Debug)]
pub enum BibdError {
    #[error("infeasible parameters (v={v}, k={k}, λ={lambda}): {reason}")]
    InfeasibleParameters {
        v: usize,
        k: usize,
        lambda: usize,
        reason: Infeasibility,
    },

    /// Every branch was explored without reaching a balanced selection.
    #[error("no design exists for these parameters (exhausted after {iterations} iterations)")]
    NoDesignFound { iterations: usize },

    /// The iteration budget ran out before the search could finish.
    #[error("search budget of {max_iterations} iterations exceeded after {iterations} iterations")]
    SearchBudgetExceeded {
        iterations: usize,
        max_iterations: usize,
    },

    #[error("C({v},{k}) candidate blocks exceeds the limit of {limit}")]
    CandidateLimitExceeded { v: usize, k: usize, limit: usize },

    #[error("no label for treatment index {index} ({len} labels supplied)")]
    LabelIndexOutOfRange { index: usize, len: usize },

    #[error("no column named {0:?} in label file")]
    MissingColumn(String),

    #[error("malformed design table at row {row}: {reason}")]
    MalformedTable { row: usize, reason: String },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BibdError {
    /// Final iteration count for search failures, `None` for every other kind.
    pub fn iterations(&self) -> Option<usize> {
        match self {
            BibdError::NoDesignFound { iterations }
            | BibdError::SearchBudgetExceeded { iterations, .. } => Some(*iterations),
            _ => None,
        }
    }
}

pub type Result<T, E = BibdError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_failures_expose_iterations() {
        let exhausted = BibdError::NoDesignFound { iterations: 12 };
        let budget = BibdError::SearchBudgetExceeded { iterations: 101, max_iterations: 100 };
        let labels = BibdError::LabelIndexOutOfRange { index: 4, len: 3 };

        assert_eq!(exhausted.iterations(), Some(12));
        assert_eq!(budget.iterations(), Some(101));
        assert_eq!(labels.iterations(), None);
    }

    #[test]
    fn test_infeasible_message_names_reason() {
        let err = BibdError::InfeasibleParameters {
            v: 6,
            k: 4,
            lambda: 1,
            reason: Infeasibility::NonIntegerReplication,
        };
        let message = err.to_string();
        assert!(message.contains("v=6"));
        assert!(message.contains("r = λ·(v-1) / (k-1) is not an integer"));
    }
}
