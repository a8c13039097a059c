//! Condition expression tree.
//!
//! Built either from JSON (externally tagged, e.g. `{"and": [l, r]}`) or with
//! the chaining builders:
//!
//! ```
//! use authz_types::Expr;
//!
//! let cond = Expr::principal()
//!     .access("tags")
//!     .has("a")
//!     .and(Expr::principal().access("tags").access("a").equal(Expr::string("a")));
//! # let _ = cond;
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::value::{EntityUid, Value};

/// The four request slots an expression can reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Var {
    Principal,
    Action,
    Resource,
    Context,
}

impl Var {
    pub fn all() -> &'static [Var] {
        &[Var::Principal, Var::Action, Var::Resource, Var::Context]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Var::Principal => "principal",
            Var::Action => "action",
            Var::Resource => "resource",
            Var::Context => "context",
        }
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    Add,
    Sub,
    Mul,
    In,
    Contains,
    ContainsAll,
    ContainsAny,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEq => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEq => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::In => "in",
            BinaryOp::Contains => "contains",
            BinaryOp::ContainsAll => "containsAll",
            BinaryOp::ContainsAny => "containsAny",
        }
    }
}

/// Expression node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Value(Value),
    Var(Var),
    Not(Box<Expr>),
    Neg(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    If {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    GetAttr {
        expr: Box<Expr>,
        attr: String,
    },
    HasAttr {
        expr: Box<Expr>,
        attr: String,
    },
    Is {
        expr: Box<Expr>,
        entity_type: String,
    },
    Record(Vec<(String, Expr)>),
    Set(Vec<Expr>),
}

// =============================================================================
// BUILDERS
// =============================================================================

impl Expr {
    pub fn principal() -> Self {
        Expr::Var(Var::Principal)
    }

    pub fn action() -> Self {
        Expr::Var(Var::Action)
    }

    pub fn resource() -> Self {
        Expr::Var(Var::Resource)
    }

    pub fn context() -> Self {
        Expr::Var(Var::Context)
    }

    pub fn value(v: impl Into<Value>) -> Self {
        Expr::Value(v.into())
    }

    pub fn boolean(b: bool) -> Self {
        Expr::Value(Value::Bool(b))
    }

    pub fn long(n: i64) -> Self {
        Expr::Value(Value::Long(n))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Expr::Value(Value::String(s.into()))
    }

    pub fn entity(uid: EntityUid) -> Self {
        Expr::Value(Value::Entity(uid))
    }

    pub fn record<K: Into<String>>(fields: impl IntoIterator<Item = (K, Expr)>) -> Self {
        Expr::Record(fields.into_iter().map(|(k, e)| (k.into(), e)).collect())
    }

    pub fn set(elements: impl IntoIterator<Item = Expr>) -> Self {
        Expr::Set(elements.into_iter().collect())
    }

    pub fn if_then_else(cond: Expr, then: Expr, otherwise: Expr) -> Self {
        Expr::If {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    pub fn access(self, attr: impl Into<String>) -> Self {
        Expr::GetAttr {
            expr: Box::new(self),
            attr: attr.into(),
        }
    }

    pub fn has(self, attr: impl Into<String>) -> Self {
        Expr::HasAttr {
            expr: Box::new(self),
            attr: attr.into(),
        }
    }

    pub fn is_type(self, entity_type: impl Into<String>) -> Self {
        Expr::Is {
            expr: Box::new(self),
            entity_type: entity_type.into(),
        }
    }

    pub fn and(self, rhs: Expr) -> Self {
        Expr::And(Box::new(self), Box::new(rhs))
    }

    pub fn or(self, rhs: Expr) -> Self {
        Expr::Or(Box::new(self), Box::new(rhs))
    }

    pub fn negate(self) -> Self {
        Expr::Neg(Box::new(self))
    }

    pub fn binary(self, op: BinaryOp, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(self),
            right: Box::new(rhs),
        }
    }

    pub fn equal(self, rhs: Expr) -> Self {
        self.binary(BinaryOp::Eq, rhs)
    }

    pub fn not_equal(self, rhs: Expr) -> Self {
        self.binary(BinaryOp::NotEq, rhs)
    }

    pub fn less_than(self, rhs: Expr) -> Self {
        self.binary(BinaryOp::Less, rhs)
    }

    pub fn less_than_or_equal(self, rhs: Expr) -> Self {
        self.binary(BinaryOp::LessEq, rhs)
    }

    pub fn greater_than(self, rhs: Expr) -> Self {
        self.binary(BinaryOp::Greater, rhs)
    }

    pub fn greater_than_or_equal(self, rhs: Expr) -> Self {
        self.binary(BinaryOp::GreaterEq, rhs)
    }

    pub fn plus(self, rhs: Expr) -> Self {
        self.binary(BinaryOp::Add, rhs)
    }

    pub fn minus(self, rhs: Expr) -> Self {
        self.binary(BinaryOp::Sub, rhs)
    }

    pub fn times(self, rhs: Expr) -> Self {
        self.binary(BinaryOp::Mul, rhs)
    }

    /// Entity hierarchy membership: `self in rhs`
    pub fn within(self, rhs: Expr) -> Self {
        self.binary(BinaryOp::In, rhs)
    }

    pub fn contains(self, rhs: Expr) -> Self {
        self.binary(BinaryOp::Contains, rhs)
    }

    pub fn contains_all(self, rhs: Expr) -> Self {
        self.binary(BinaryOp::ContainsAll, rhs)
    }

    pub fn contains_any(self, rhs: Expr) -> Self {
        self.binary(BinaryOp::ContainsAny, rhs)
    }

    /// The value if this node is a literal
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Expr::Value(v) => Some(v),
            _ => None,
        }
    }
}

impl std::ops::Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        Expr::Not(Box::new(self))
    }
}

impl From<Value> for Expr {
    fn from(v: Value) -> Self {
        Expr::Value(v)
    }
}
