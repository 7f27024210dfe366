//! Resolution error taxonomy
//!
//! Three classes of failure, with different recovery policies:
//! - authoring errors (validation, expression syntax) are always fatal,
//! - resolution errors (circular references, bad expression usage) can be
//!   downgraded to a recorded error via `dont_throw_on_error`,
//! - internal consistency violations are always fatal; they signal a bug
//!   in the engine, not bad input.

use thiserror::Error;

use cueflow_expr::SyntaxError;

/// Malformed input shape, rejected before resolution starts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    EmptyName { field: &'static str },

    #[error("duplicate object id {0:?}")]
    DuplicateId(String),

    #[error("{field} {value:?} contains reserved character {found:?}")]
    ReservedCharacter {
        field: &'static str,
        value: String,
        found: char,
    },

    #[error("object {id}: `while` cannot be combined with `end` or `duration`")]
    WhileWithBounds { id: String },

    #[error("object {id}: `end` and `duration` require `start`")]
    MissingStart { id: String },

    #[error("object {id}: `end` and `duration` are mutually exclusive")]
    EndAndDuration { id: String },

    #[error("object {id}: enable entry has neither `start` nor `while`")]
    EmptyEnable { id: String },
}

/// Errors raised while resolving a timeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    /// A cluster of objects whose triggers mutually depend on each other.
    #[error("circular reference among objects: {0:?}")]
    CircularReference(Vec<String>),

    /// A well-formed expression used in a way that cannot be evaluated,
    /// e.g. a logical operator inside a time expression.
    #[error("object {obj}: {reason}")]
    InvalidExpression { obj: String, reason: String },

    /// A broken engine invariant. Never downgraded.
    #[error("internal consistency error: {0}")]
    Internal(String),
}

impl ResolveError {
    /// May this error be recorded on the result instead of returned, when
    /// the caller opted into `dont_throw_on_error`?
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ResolveError::CircularReference(_) | ResolveError::InvalidExpression { .. }
        )
    }
}

/// Result type for resolver operations.
pub type ResolveResult<T> = Result<T, ResolveError>;
