//! Expression syntax errors

use thiserror::Error;

/// Malformed trigger expression. Always fatal: a syntax error is an
/// authoring mistake in the input data, never a transient condition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyntaxError {
    #[error("empty expression")]
    Empty,

    #[error("unbalanced parentheses in expression: {0}")]
    UnbalancedParens(String),

    #[error("operand/operator mismatch in expression: {0}")]
    OperandMismatch(String),

    #[error("operator {operator} is missing an operand in expression: {expr}")]
    MissingOperand { operator: char, expr: String },

    #[error("unrecognized token {token:?} in expression: {expr}")]
    InvalidToken { token: String, expr: String },

    #[error("reference {token:?} has no name")]
    EmptyReference { token: String },

    #[error("unknown hook {hook:?} in reference {token:?} (expected start, end or duration)")]
    UnknownHook { hook: String, token: String },
}
