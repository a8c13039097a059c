//! Placeholder and ignore-sentinel recognition.
//!
//! A variable placeholder is an entity reference of the reserved type
//! [`VARIABLE_TYPE`] whose id is the variable name. The ignore sentinel is an
//! entity reference of type [`IGNORE_TYPE`] with an empty id, valid only as a
//! whole request slot. Nothing outside this module inspects those types.

use authz_types::{EntityUid, Value};

pub const VARIABLE_TYPE: &str = "__cedar::variable";
pub const IGNORE_TYPE: &str = "__cedar::ignore";
pub const UNKNOWN_TYPE: &str = "__cedar::unknown";

/// Placeholder value for the variable `name`
pub fn variable(name: impl Into<String>) -> Value {
    Value::Entity(EntityUid::new(VARIABLE_TYPE, name))
}

/// The variable name if `value` is a placeholder
pub fn to_variable(value: &Value) -> Option<&str> {
    match value {
        Value::Entity(uid) if uid.entity_type == VARIABLE_TYPE => Some(&uid.id),
        _ => None,
    }
}

pub fn is_placeholder(value: &Value) -> bool {
    to_variable(value).is_some()
}

/// The "don't care" sentinel for a whole request slot
pub fn ignore() -> Value {
    Value::Entity(EntityUid::new(IGNORE_TYPE, ""))
}

pub fn is_ignore(value: &Value) -> bool {
    matches!(value, Value::Entity(uid) if uid.entity_type == IGNORE_TYPE && uid.id.is_empty())
}

/// Neutral stand-in for an ignored principal, action or resource
pub fn unknown_entity() -> EntityUid {
    EntityUid::new(UNKNOWN_TYPE, "")
}

/// First placeholder found in a depth-first walk of `value`
pub fn first_variable(value: &Value) -> Option<&str> {
    match value {
        Value::Entity(_) => to_variable(value),
        Value::Record(record) => record.iter().find_map(|(_, v)| first_variable(v)),
        Value::Set(set) => set.iter().find_map(first_variable),
        _ => None,
    }
}

pub fn contains_placeholder(value: &Value) -> bool {
    first_variable(value).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use authz_types::{Record, Set};

    #[test]
    fn recognizes_placeholders_by_type() {
        assert_eq!(to_variable(&variable("who")), Some("who"));
        assert_eq!(to_variable(&Value::Entity(EntityUid::new("User", "who"))), None);
        assert_eq!(to_variable(&Value::from("who")), None);
    }

    #[test]
    fn ignore_is_not_a_placeholder() {
        assert!(is_ignore(&ignore()));
        assert!(!is_placeholder(&ignore()));
        assert!(!is_ignore(&Value::Entity(unknown_entity())));
        assert!(!is_ignore(&Value::Entity(EntityUid::new(IGNORE_TYPE, "x"))));
    }

    #[test]
    fn finds_nested_placeholders() {
        let nested: Record = [(
            "outer",
            Value::Set(Set::from(vec![Value::Long(1), variable("inner")])),
        )]
        .into_iter()
        .collect();
        let value = Value::Record(nested);

        assert_eq!(first_variable(&value), Some("inner"));
        assert!(!contains_placeholder(&Value::Record(Record::new())));
    }
}
