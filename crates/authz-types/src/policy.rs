//! Policies and policy sets.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use thiserror::Error;

use crate::expr::Expr;
use crate::value::EntityUid;

/// Stable identifier of a policy within one policy set
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyId(String);

impl PolicyId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PolicyId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for PolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    Permit,
    Forbid,
}

/// Scope constraint on principal, action or resource
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Scope {
    /// Matches anything
    #[default]
    All,
    Eq {
        entity: EntityUid,
    },
    In {
        entity: EntityUid,
    },
    /// Action scopes only: `action in [A, B]`
    InSet {
        entities: Vec<EntityUid>,
    },
    Is {
        entity_type: String,
    },
    IsIn {
        entity_type: String,
        entity: EntityUid,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    When,
    Unless,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub kind: ConditionKind,
    pub body: Expr,
}

impl Condition {
    pub fn when(body: Expr) -> Self {
        Self {
            kind: ConditionKind::When,
            body,
        }
    }

    pub fn unless(body: Expr) -> Self {
        Self {
            kind: ConditionKind::Unless,
            body,
        }
    }

    /// Whether a body evaluating to `value` satisfies this condition
    pub fn satisfied_by(&self, value: bool) -> bool {
        match self.kind {
            ConditionKind::When => value,
            ConditionKind::Unless => !value,
        }
    }
}

/// A permit or forbid rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub effect: Effect,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub principal: Scope,
    #[serde(default)]
    pub action: Scope,
    #[serde(default)]
    pub resource: Scope,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl Policy {
    fn with_effect(effect: Effect) -> Self {
        Self {
            effect,
            annotations: BTreeMap::new(),
            principal: Scope::All,
            action: Scope::All,
            resource: Scope::All,
            conditions: Vec::new(),
        }
    }

    /// Unconstrained permit
    pub fn permit() -> Self {
        Self::with_effect(Effect::Permit)
    }

    /// Unconstrained forbid
    pub fn forbid() -> Self {
        Self::with_effect(Effect::Forbid)
    }

    pub fn annotate(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    pub fn principal_eq(mut self, entity: EntityUid) -> Self {
        self.principal = Scope::Eq { entity };
        self
    }

    pub fn principal_in(mut self, entity: EntityUid) -> Self {
        self.principal = Scope::In { entity };
        self
    }

    pub fn principal_is(mut self, entity_type: impl Into<String>) -> Self {
        self.principal = Scope::Is {
            entity_type: entity_type.into(),
        };
        self
    }

    pub fn principal_is_in(mut self, entity_type: impl Into<String>, entity: EntityUid) -> Self {
        self.principal = Scope::IsIn {
            entity_type: entity_type.into(),
            entity,
        };
        self
    }

    pub fn action_eq(mut self, entity: EntityUid) -> Self {
        self.action = Scope::Eq { entity };
        self
    }

    pub fn action_in(mut self, entity: EntityUid) -> Self {
        self.action = Scope::In { entity };
        self
    }

    pub fn action_in_set(mut self, entities: impl IntoIterator<Item = EntityUid>) -> Self {
        self.action = Scope::InSet {
            entities: entities.into_iter().collect(),
        };
        self
    }

    pub fn resource_eq(mut self, entity: EntityUid) -> Self {
        self.resource = Scope::Eq { entity };
        self
    }

    pub fn resource_in(mut self, entity: EntityUid) -> Self {
        self.resource = Scope::In { entity };
        self
    }

    pub fn resource_is(mut self, entity_type: impl Into<String>) -> Self {
        self.resource = Scope::Is {
            entity_type: entity_type.into(),
        };
        self
    }

    pub fn resource_is_in(mut self, entity_type: impl Into<String>, entity: EntityUid) -> Self {
        self.resource = Scope::IsIn {
            entity_type: entity_type.into(),
            entity,
        };
        self
    }

    pub fn when(mut self, body: Expr) -> Self {
        self.conditions.push(Condition::when(body));
        self
    }

    pub fn unless(mut self, body: Expr) -> Self {
        self.conditions.push(Condition::unless(body));
        self
    }
}

// =============================================================================
// POLICY SET
// =============================================================================

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicySetError {
    #[error("duplicate policy id '{0}'")]
    DuplicateId(PolicyId),
}

/// JSON form of one policy set member. `id` defaults to the entry's position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<PolicyId>,
    #[serde(flatten)]
    pub policy: Policy,
}

/// Ordered policies with unique ids. Order is the diagnostic order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<PolicyEntry>", into = "Vec<PolicyEntry>")]
pub struct PolicySet {
    policies: Vec<(PolicyId, Policy)>,
}

impl PolicySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set whose ids are the sequence positions "0", "1", ...
    pub fn from_policies(policies: impl IntoIterator<Item = Policy>) -> Self {
        Self {
            policies: policies
                .into_iter()
                .enumerate()
                .map(|(i, p)| (PolicyId::new(i.to_string()), p))
                .collect(),
        }
    }

    pub fn add(&mut self, id: PolicyId, policy: Policy) -> Result<(), PolicySetError> {
        if self.get(&id).is_some() {
            return Err(PolicySetError::DuplicateId(id));
        }
        self.policies.push((id, policy));
        Ok(())
    }

    pub fn get(&self, id: &PolicyId) -> Option<&Policy> {
        self.policies.iter().find(|(pid, _)| pid == id).map(|(_, p)| p)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PolicyId, &Policy)> {
        self.policies.iter().map(|(id, p)| (id, p))
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

impl TryFrom<Vec<PolicyEntry>> for PolicySet {
    type Error = PolicySetError;

    fn try_from(entries: Vec<PolicyEntry>) -> Result<Self, Self::Error> {
        let mut seen = HashSet::new();
        let mut policies = Vec::with_capacity(entries.len());
        for (i, entry) in entries.into_iter().enumerate() {
            let id = entry.id.unwrap_or_else(|| PolicyId::new(i.to_string()));
            if !seen.insert(id.clone()) {
                return Err(PolicySetError::DuplicateId(id));
            }
            policies.push((id, entry.policy));
        }
        Ok(Self { policies })
    }
}

impl From<PolicySet> for Vec<PolicyEntry> {
    fn from(set: PolicySet) -> Self {
        set.policies
            .into_iter()
            .map(|(id, policy)| PolicyEntry {
                id: Some(id),
                policy,
            })
            .collect()
    }
}
