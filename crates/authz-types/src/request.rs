//! Concrete requests and their authorization outcome.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::policy::PolicyId;
use crate::value::{EntityUid, Record};

/// A fully concrete authorization request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub principal: EntityUid,
    pub action: EntityUid,
    pub resource: EntityUid,
    pub context: Record,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allow(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

impl From<bool> for Decision {
    fn from(allow: bool) -> Self {
        if allow {
            Decision::Allow
        } else {
            Decision::Deny
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Allow => write!(f, "allow"),
            Decision::Deny => write!(f, "deny"),
        }
    }
}

/// A policy that contributed to a decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticReason {
    pub policy_id: PolicyId,
}

/// Policies that determined a decision, in policy-set order
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Diagnostic {
    pub reasons: Vec<DiagnosticReason>,
}

impl Diagnostic {
    pub fn push(&mut self, policy_id: PolicyId) {
        self.reasons.push(DiagnosticReason { policy_id });
    }

    pub fn is_empty(&self) -> bool {
        self.reasons.is_empty()
    }

    pub fn policy_ids(&self) -> impl Iterator<Item = &PolicyId> {
        self.reasons.iter().map(|r| &r.policy_id)
    }
}
