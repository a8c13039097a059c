//! Full evaluator.
//!
//! Operates on concrete values only. Placeholder entities get no special
//! treatment here: by the time a request reaches this evaluator every
//! variable has been substituted.

use authz_types::{BinaryOp, Entities, EntityUid, Expr, Policy, Record, Scope, Set, Value, Var};

use crate::env::Env;
use crate::error::EvalError;

/// Evaluate `expr` against a concrete environment.
pub fn evaluate(env: &Env<'_>, expr: &Expr) -> Result<Value, EvalError> {
    match expr {
        Expr::Value(v) => Ok(v.clone()),
        Expr::Var(var) => Ok(env.slot(*var).clone()),
        Expr::Not(inner) => Ok(Value::Bool(!expect_bool(&evaluate(env, inner)?)?)),
        Expr::Neg(inner) => negate(&evaluate(env, inner)?),
        Expr::And(left, right) => {
            if !expect_bool(&evaluate(env, left)?)? {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(expect_bool(&evaluate(env, right)?)?))
        }
        Expr::Or(left, right) => {
            if expect_bool(&evaluate(env, left)?)? {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(expect_bool(&evaluate(env, right)?)?))
        }
        Expr::If {
            cond,
            then,
            otherwise,
        } => {
            if expect_bool(&evaluate(env, cond)?)? {
                evaluate(env, then)
            } else {
                evaluate(env, otherwise)
            }
        }
        Expr::Binary { op, left, right } => {
            let l = evaluate(env, left)?;
            let r = evaluate(env, right)?;
            apply_binary(env.entities, *op, &l, &r)
        }
        Expr::GetAttr { expr, attr } => get_attr(env.entities, &evaluate(env, expr)?, attr),
        Expr::HasAttr { expr, attr } => {
            has_attr(env.entities, &evaluate(env, expr)?, attr).map(Value::Bool)
        }
        Expr::Is { expr, entity_type } => {
            is_type(&evaluate(env, expr)?, entity_type).map(Value::Bool)
        }
        Expr::Record(fields) => fields
            .iter()
            .map(|(k, e)| Ok((k.clone(), evaluate(env, e)?)))
            .collect::<Result<Record, EvalError>>()
            .map(Value::Record),
        Expr::Set(elements) => elements
            .iter()
            .map(|e| evaluate(env, e))
            .collect::<Result<Set, EvalError>>()
            .map(Value::Set),
    }
}

/// Whether every scope and condition of `policy` holds for `env`.
pub fn evaluate_policy(env: &Env<'_>, policy: &Policy) -> Result<bool, EvalError> {
    for (var, scope) in [
        (Var::Principal, &policy.principal),
        (Var::Action, &policy.action),
        (Var::Resource, &policy.resource),
    ] {
        if !scope_matches(env.entities, scope, env.slot(var))? {
            return Ok(false);
        }
    }
    for condition in &policy.conditions {
        let value = expect_bool(&evaluate(env, &condition.body)?)?;
        if !condition.satisfied_by(value) {
            return Ok(false);
        }
    }
    Ok(true)
}

pub(crate) fn expect_bool(value: &Value) -> Result<bool, EvalError> {
    value.as_bool().ok_or_else(|| EvalError::mismatch("bool", value))
}

fn expect_long(value: &Value) -> Result<i64, EvalError> {
    match value {
        Value::Long(n) => Ok(*n),
        other => Err(EvalError::mismatch("long", other)),
    }
}

fn expect_entity(value: &Value) -> Result<&EntityUid, EvalError> {
    value.as_entity().ok_or_else(|| EvalError::mismatch("entity", value))
}

fn expect_set(value: &Value) -> Result<&Set, EvalError> {
    match value {
        Value::Set(s) => Ok(s),
        other => Err(EvalError::mismatch("set", other)),
    }
}

pub(crate) fn negate(value: &Value) -> Result<Value, EvalError> {
    expect_long(value)?
        .checked_neg()
        .map(Value::Long)
        .ok_or(EvalError::Overflow)
}

fn arithmetic(l: &Value, r: &Value, op: fn(i64, i64) -> Option<i64>) -> Result<Value, EvalError> {
    op(expect_long(l)?, expect_long(r)?)
        .map(Value::Long)
        .ok_or(EvalError::Overflow)
}

fn compare(l: &Value, r: &Value, op: fn(&i64, &i64) -> bool) -> Result<Value, EvalError> {
    Ok(Value::Bool(op(&expect_long(l)?, &expect_long(r)?)))
}

/// `uid == target` or `target` is an ancestor of `uid`
fn entity_in(entities: &Entities, uid: &EntityUid, target: &EntityUid) -> bool {
    uid == target || entities.is_ancestor(uid, target)
}

pub(crate) fn apply_binary(
    entities: &Entities,
    op: BinaryOp,
    l: &Value,
    r: &Value,
) -> Result<Value, EvalError> {
    match op {
        BinaryOp::Eq => Ok(Value::Bool(l == r)),
        BinaryOp::NotEq => Ok(Value::Bool(l != r)),
        BinaryOp::Less => compare(l, r, i64::lt),
        BinaryOp::LessEq => compare(l, r, i64::le),
        BinaryOp::Greater => compare(l, r, i64::gt),
        BinaryOp::GreaterEq => compare(l, r, i64::ge),
        BinaryOp::Add => arithmetic(l, r, i64::checked_add),
        BinaryOp::Sub => arithmetic(l, r, i64::checked_sub),
        BinaryOp::Mul => arithmetic(l, r, i64::checked_mul),
        BinaryOp::In => {
            let uid = expect_entity(l)?;
            match r {
                Value::Entity(target) => Ok(Value::Bool(entity_in(entities, uid, target))),
                Value::Set(targets) => {
                    for target in targets.iter() {
                        if entity_in(entities, uid, expect_entity(target)?) {
                            return Ok(Value::Bool(true));
                        }
                    }
                    Ok(Value::Bool(false))
                }
                other => Err(EvalError::mismatch("entity or set", other)),
            }
        }
        BinaryOp::Contains => Ok(Value::Bool(expect_set(l)?.contains(r))),
        BinaryOp::ContainsAll => {
            let haystack = expect_set(l)?;
            Ok(Value::Bool(expect_set(r)?.iter().all(|v| haystack.contains(v))))
        }
        BinaryOp::ContainsAny => {
            let haystack = expect_set(l)?;
            Ok(Value::Bool(expect_set(r)?.iter().any(|v| haystack.contains(v))))
        }
    }
}

pub(crate) fn get_attr(entities: &Entities, value: &Value, attr: &str) -> Result<Value, EvalError> {
    let record = match value {
        Value::Record(record) => record,
        Value::Entity(uid) => {
            &entities
                .get(uid)
                .ok_or_else(|| EvalError::EntityNotFound(uid.clone()))?
                .attrs
        }
        other => return Err(EvalError::mismatch("record or entity", other)),
    };
    record
        .get(attr)
        .cloned()
        .ok_or_else(|| EvalError::AttributeNotFound(attr.to_string()))
}

/// Attribute presence. An entity missing from the store has no attributes.
pub(crate) fn has_attr(entities: &Entities, value: &Value, attr: &str) -> Result<bool, EvalError> {
    match value {
        Value::Record(record) => Ok(record.contains_key(attr)),
        Value::Entity(uid) => Ok(entities
            .get(uid)
            .is_some_and(|entity| entity.attrs.contains_key(attr))),
        other => Err(EvalError::mismatch("record or entity", other)),
    }
}

pub(crate) fn is_type(value: &Value, entity_type: &str) -> Result<bool, EvalError> {
    Ok(expect_entity(value)?.entity_type == entity_type)
}

pub(crate) fn scope_matches(
    entities: &Entities,
    scope: &Scope,
    value: &Value,
) -> Result<bool, EvalError> {
    if matches!(scope, Scope::All) {
        return Ok(true);
    }
    let uid = expect_entity(value)?;
    Ok(match scope {
        Scope::All => true,
        Scope::Eq { entity } => uid == entity,
        Scope::In { entity } => entity_in(entities, uid, entity),
        Scope::InSet { entities: targets } => {
            targets.iter().any(|target| entity_in(entities, uid, target))
        }
        Scope::Is { entity_type } => &uid.entity_type == entity_type,
        Scope::IsIn {
            entity_type,
            entity,
        } => &uid.entity_type == entity_type && entity_in(entities, uid, entity),
    })
}
