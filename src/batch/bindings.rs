//! Variable bindings accumulated down one path of the expansion tree.

use std::rc::Rc;

use authz_types::Value;

use super::Values;

struct Binding {
    name: Rc<str>,
    value: Value,
    rest: Bindings,
}

/// Persistent list of `(name, value)` pairs.
///
/// `bind` never touches the receiver, so siblings in the expansion tree
/// share the bindings of their common ancestors.
#[derive(Clone, Default)]
pub struct Bindings(Option<Rc<Binding>>);

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&self, name: Rc<str>, value: Value) -> Self {
        Self(Some(Rc::new(Binding {
            name,
            value,
            rest: self.clone(),
        })))
    }

    /// Most recent binding first
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        std::iter::successors(self.0.as_deref(), |b| b.rest.0.as_deref())
            .map(|b| (&*b.name, &b.value))
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    pub fn to_values(&self) -> Values {
        self.iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }
}

impl std::fmt::Debug for Bindings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
