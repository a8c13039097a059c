//! Strict conversion of slot values into concrete request form.

use authz_types::{EntityUid, Record, Value};

use crate::error::EvalError;
use crate::placeholder::{first_variable, to_variable};

/// The entity reference held by a principal, action or resource slot.
///
/// Fails on non-entities and on leftover placeholders.
pub fn to_entity(value: &Value) -> Result<EntityUid, EvalError> {
    if let Some(name) = to_variable(value) {
        return Err(EvalError::UnresolvedVariable(name.to_string()));
    }
    match value {
        Value::Entity(uid) => Ok(uid.clone()),
        other => Err(EvalError::mismatch("entity", other)),
    }
}

/// The record held by a context slot. Shares the underlying map.
pub fn to_record(value: &Value) -> Result<Record, EvalError> {
    match value {
        Value::Record(record) => {
            if let Some(name) = first_variable(value) {
                return Err(EvalError::UnresolvedVariable(name.to_string()));
            }
            Ok(record.clone())
        }
        other => Err(EvalError::mismatch("record", other)),
    }
}
