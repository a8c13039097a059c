//! Values - the closed set of data a request, entity attribute or policy
//! literal can hold.
//!
//! `Record` and `Set` keep their contents behind an `Arc`, so cloning a
//! `Value` never deep-copies a container. Code that needs to modify a
//! container builds a new one (`make_mut` copies one level, sharing every
//! nested container with the original).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// ENTITY REFERENCES
// ============================================================================

/// Reference to an entity: `Type::"id"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityUid {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub id: String,
}

impl EntityUid {
    pub fn new(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{:?}", self.entity_type, self.id)
    }
}

/// Opaque extension value (decimal, ip address, ...). Compared by equality only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtensionValue {
    #[serde(rename = "fn")]
    pub name: String,
    pub arg: String,
}

impl ExtensionValue {
    pub fn new(name: impl Into<String>, arg: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arg: arg.into(),
        }
    }
}

// ============================================================================
// RECORD
// ============================================================================

/// String-keyed mapping of values. Keys are unique.
#[derive(Clone, Default)]
pub struct Record(Arc<BTreeMap<String, Value>>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn as_map(&self) -> &BTreeMap<String, Value> {
        &self.0
    }

    /// Mutable access to the entries, copying the top level first if the
    /// record is shared. Nested containers stay shared.
    pub fn make_mut(&mut self) -> &mut BTreeMap<String, Value> {
        Arc::make_mut(&mut self.0)
    }

    /// True when both records are the same allocation.
    pub fn ptr_eq(a: &Record, b: &Record) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }
}

impl From<BTreeMap<String, Value>> for Record {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(Arc::new(map))
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        iter.into_iter()
            .map(|(k, v)| (k.into(), v))
            .collect::<BTreeMap<_, _>>()
            .into()
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        Record::ptr_eq(self, other) || self.0 == other.0
    }
}

impl Eq for Record {}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.0.iter()).finish()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        BTreeMap::<String, Value>::deserialize(deserializer).map(Record::from)
    }
}

// ============================================================================
// SET
// ============================================================================

/// Sequence of values. Iteration keeps insertion order; equality ignores it.
#[derive(Clone, Default)]
pub struct Set(Arc<Vec<Value>>);

impl Set {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.0
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.0.iter().any(|v| v == value)
    }

    /// Mutable access to the elements, copying the top level first if the
    /// set is shared.
    pub fn make_mut(&mut self) -> &mut Vec<Value> {
        Arc::make_mut(&mut self.0)
    }

    pub fn ptr_eq(a: &Set, b: &Set) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }
}

impl From<Vec<Value>> for Set {
    fn from(values: Vec<Value>) -> Self {
        Self(Arc::new(values))
    }
}

impl FromIterator<Value> for Set {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        iter.into_iter().collect::<Vec<_>>().into()
    }
}

impl PartialEq for Set {
    fn eq(&self, other: &Self) -> bool {
        Set::ptr_eq(self, other)
            || (self.iter().all(|v| other.contains(v)) && other.iter().all(|v| self.contains(v)))
    }
}

impl Eq for Set {}

impl fmt::Debug for Set {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.iter()).finish()
    }
}

impl Serialize for Set {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Set {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<Value>::deserialize(deserializer).map(Set::from)
    }
}

// ============================================================================
// VALUE
// ============================================================================

/// A policy-language value.
///
/// JSON form: booleans, integers and strings map directly, arrays are sets,
/// objects are records, `{"__entity": {"type": T, "id": I}}` is an entity
/// reference and `{"__extn": {"fn": F, "arg": A}}` an extension value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "serde_json::Value", into = "serde_json::Value")]
pub enum Value {
    Bool(bool),
    Long(i64),
    String(String),
    Entity(EntityUid),
    Record(Record),
    Set(Set),
    Extension(ExtensionValue),
}

impl Value {
    /// Type name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Long(_) => "long",
            Value::String(_) => "string",
            Value::Entity(_) => "entity",
            Value::Record(_) => "record",
            Value::Set(_) => "set",
            Value::Extension(_) => "extension",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_entity(&self) -> Option<&EntityUid> {
        match self {
            Value::Entity(uid) => Some(uid),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Long(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<EntityUid> for Value {
    fn from(uid: EntityUid) -> Self {
        Value::Entity(uid)
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Record(r)
    }
}

impl From<Set> for Value {
    fn from(s: Set) -> Self {
        Value::Set(s)
    }
}

/// Errors decoding a `Value` from JSON
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValueError {
    #[error("null is not a value")]
    Null,

    #[error("number {0} is not a 64-bit integer")]
    NotAnInteger(String),

    #[error("malformed {marker} object: {message}")]
    Malformed {
        marker: &'static str,
        message: String,
    },
}

const ENTITY_MARKER: &str = "__entity";
const EXTENSION_MARKER: &str = "__extn";

impl TryFrom<serde_json::Value> for Value {
    type Error = ValueError;

    fn try_from(json: serde_json::Value) -> Result<Self, Self::Error> {
        use serde_json::Value as Json;

        match json {
            Json::Null => Err(ValueError::Null),
            Json::Bool(b) => Ok(Value::Bool(b)),
            Json::Number(n) => n
                .as_i64()
                .map(Value::Long)
                .ok_or_else(|| ValueError::NotAnInteger(n.to_string())),
            Json::String(s) => Ok(Value::String(s)),
            Json::Array(items) => items
                .into_iter()
                .map(Value::try_from)
                .collect::<Result<Set, _>>()
                .map(Value::Set),
            Json::Object(mut map) => {
                if map.len() == 1 {
                    if let Some(inner) = map.remove(ENTITY_MARKER) {
                        return serde_json::from_value(inner).map(Value::Entity).map_err(|e| {
                            ValueError::Malformed {
                                marker: ENTITY_MARKER,
                                message: e.to_string(),
                            }
                        });
                    }
                    if let Some(inner) = map.remove(EXTENSION_MARKER) {
                        return serde_json::from_value(inner)
                            .map(Value::Extension)
                            .map_err(|e| ValueError::Malformed {
                                marker: EXTENSION_MARKER,
                                message: e.to_string(),
                            });
                    }
                }
                map.into_iter()
                    .map(|(k, v)| Ok((k, Value::try_from(v)?)))
                    .collect::<Result<Record, _>>()
                    .map(Value::Record)
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Bool(b) => json!(b),
            Value::Long(n) => json!(n),
            Value::String(s) => json!(s),
            Value::Entity(uid) => json!({ ENTITY_MARKER: { "type": uid.entity_type, "id": uid.id } }),
            Value::Extension(ext) => json!({ EXTENSION_MARKER: { "fn": ext.name, "arg": ext.arg } }),
            Value::Record(r) => serde_json::Value::Object(
                r.iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::from(v.clone())))
                    .collect(),
            ),
            Value::Set(s) => {
                serde_json::Value::Array(s.iter().cloned().map(serde_json::Value::from).collect())
            }
        }
    }
}
