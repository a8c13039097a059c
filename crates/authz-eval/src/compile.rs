//! Policies compiled into reusable evaluators.

use authz_types::{Condition, Effect, Expr, Policy, Scope, Value, Var};

use crate::env::Env;
use crate::error::EvalError;
use crate::eval::{evaluate, expect_bool, scope_matches};

/// Anything that decides a boolean against an environment
pub trait BoolEvaler {
    fn eval(&self, env: &Env<'_>) -> Result<bool, EvalError>;
}

#[derive(Debug, Clone)]
enum Clause {
    Scope(Var, Scope),
    Condition(Condition),
    /// A literal condition that can never hold
    Never,
}

/// A policy flattened into the clauses that still need checking.
///
/// Unconstrained scopes and literal conditions are resolved at compile time.
#[derive(Debug, Clone)]
pub struct CompiledPolicy {
    effect: Effect,
    clauses: Vec<Clause>,
}

impl CompiledPolicy {
    pub fn effect(&self) -> Effect {
        self.effect
    }

    /// Number of clauses left to evaluate per request
    pub fn clause_count(&self) -> usize {
        self.clauses.len()
    }
}

pub fn compile(policy: &Policy) -> CompiledPolicy {
    let mut clauses = Vec::new();

    for (var, scope) in [
        (Var::Principal, &policy.principal),
        (Var::Action, &policy.action),
        (Var::Resource, &policy.resource),
    ] {
        if !matches!(scope, Scope::All) {
            clauses.push(Clause::Scope(var, scope.clone()));
        }
    }

    for condition in &policy.conditions {
        match &condition.body {
            Expr::Value(Value::Bool(b)) if condition.satisfied_by(*b) => {}
            Expr::Value(Value::Bool(_)) => {
                clauses.clear();
                clauses.push(Clause::Never);
                break;
            }
            _ => clauses.push(Clause::Condition(condition.clone())),
        }
    }

    CompiledPolicy {
        effect: policy.effect,
        clauses,
    }
}

impl BoolEvaler for CompiledPolicy {
    fn eval(&self, env: &Env<'_>) -> Result<bool, EvalError> {
        for clause in &self.clauses {
            let holds = match clause {
                Clause::Scope(var, scope) => scope_matches(env.entities, scope, env.slot(*var))?,
                Clause::Condition(condition) => {
                    condition.satisfied_by(expect_bool(&evaluate(env, &condition.body)?)?)
                }
                Clause::Never => false,
            };
            if !holds {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use authz_types::{Entities, EntityUid, Record};

    fn env(entities: &Entities) -> Env<'_> {
        Env::new(
            entities,
            Value::Entity(EntityUid::new("User", "alice")),
            Value::Entity(EntityUid::new("Action", "view")),
            Value::Entity(EntityUid::new("Doc", "1")),
            Value::Record(Record::new()),
        )
    }

    #[test]
    fn unconstrained_policy_compiles_to_nothing() {
        let compiled = compile(&Policy::permit().when(Expr::boolean(true)));
        assert_eq!(compiled.clause_count(), 0);
        assert_eq!(compiled.effect(), Effect::Permit);
        assert_eq!(compiled.eval(&env(&Entities::new())), Ok(true));
    }

    #[test]
    fn literal_false_condition_never_holds() {
        let compiled = compile(
            &Policy::forbid()
                .principal_eq(EntityUid::new("User", "alice"))
                .unless(Expr::boolean(true)),
        );
        assert_eq!(compiled.clause_count(), 1);
        assert_eq!(compiled.eval(&env(&Entities::new())), Ok(false));
    }

    #[test]
    fn clauses_short_circuit_in_order() {
        // the failing scope stops evaluation before the erroring condition
        let compiled = compile(
            &Policy::permit()
                .resource_eq(EntityUid::new("Doc", "2"))
                .when(Expr::long(1)),
        );
        assert_eq!(compiled.eval(&env(&Entities::new())), Ok(false));
    }
}
