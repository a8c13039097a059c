//! Placeholder substitution inside request values.
//!
//! Only containers on the path to a placeholder are rebuilt. Everything else
//! in the result is the original allocation.

use authz_eval::placeholder::to_variable;
use authz_types::Value;

/// Replace every placeholder for `name` in `value` with `replacement`.
///
/// Returns `None` when `value` does not mention `name`.
pub fn substitute(value: &Value, name: &str, replacement: &Value) -> Option<Value> {
    match value {
        Value::Entity(_) => (to_variable(value) == Some(name)).then(|| replacement.clone()),
        Value::Record(record) => {
            let mut rebuilt = None;
            for (key, entry) in record.iter() {
                if let Some(new) = substitute(entry, name, replacement) {
                    rebuilt
                        .get_or_insert_with(|| record.clone())
                        .make_mut()
                        .insert(key.clone(), new);
                }
            }
            rebuilt.map(Value::Record)
        }
        Value::Set(set) => {
            let mut rebuilt = None;
            for (i, element) in set.iter().enumerate() {
                if let Some(new) = substitute(element, name, replacement) {
                    rebuilt.get_or_insert_with(|| set.clone()).make_mut()[i] = new;
                }
            }
            rebuilt.map(Value::Set)
        }
        _ => None,
    }
}

/// Whether `value` contains a placeholder for `name`
pub fn mentions_variable(value: &Value, name: &str) -> bool {
    match value {
        Value::Entity(_) => to_variable(value) == Some(name),
        Value::Record(record) => record.iter().any(|(_, v)| mentions_variable(v, name)),
        Value::Set(set) => set.iter().any(|v| mentions_variable(v, name)),
        _ => false,
    }
}
