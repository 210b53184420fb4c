use num_bigint::BigUint;
use thiserror::Error;

/// Errors raised while checking a time-bounded Until formula.
///
/// Every error is fatal to the evaluation in progress; no partial results are
/// produced and nothing is retried.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CheckError {
    #[error("Invalid {what}: {value}")]
    InvalidParameter { what: &'static str, value: f64 },

    #[error("Variable mismatch: {rows} row variables, {columns} column variables, {levels} ODD levels")]
    VariableMismatch {
        rows: usize,
        columns: usize,
        levels: usize,
    },

    #[error("Fox-Glynn underflow: cannot represent Poisson weights for lambda={lambda} at epsilon={epsilon}")]
    Underflow { lambda: f64, epsilon: f64 },

    #[error("Fox-Glynn overflow: cannot reach precision epsilon={epsilon} for lambda={lambda}")]
    Overflow { lambda: f64, epsilon: f64 },

    #[error("Unsupported: {0}")]
    Unsupported(&'static str),

    #[error("Hybrid matrix does not fit into {0} nodes")]
    TooManyNodes(usize),

    #[error("State space of {0} states does not fit into machine indices")]
    StateSpaceTooLarge(BigUint),
}

impl CheckError {
    pub(crate) fn invalid(what: &'static str, value: impl Into<f64>) -> Self {
        CheckError::InvalidParameter {
            what,
            value: value.into(),
        }
    }
}
