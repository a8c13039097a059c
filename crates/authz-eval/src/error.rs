//! Evaluation errors.

use authz_types::{EntityUid, Var};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EvalError {
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("attribute '{0}' not found")]
    AttributeNotFound(String),

    #[error("entity {0} not found")]
    EntityNotFound(EntityUid),

    #[error("integer overflow")]
    Overflow,

    #[error("value still contains variable '{0}'")]
    UnresolvedVariable(String),

    /// Raised by the partial evaluator when an expression reads a slot
    /// holding the ignore sentinel.
    #[error("{0} is ignored")]
    IgnoredSlot(Var),
}

impl EvalError {
    pub(crate) fn mismatch(expected: &'static str, found: &authz_types::Value) -> Self {
        EvalError::TypeMismatch {
            expected,
            found: found.type_name(),
        }
    }
}
