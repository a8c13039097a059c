//! Partial evaluation of policies against templated requests.
//!
//! A slot that still contains a placeholder is unknown; everything that
//! depends only on known slots is folded. A policy is split into clauses
//! (its three scopes and each condition) and every clause ends up in one of
//! four states:
//!
//! | clause                         | outcome                        |
//! |--------------------------------|--------------------------------|
//! | concrete and satisfied         | removed                        |
//! | concrete and unsatisfied       | policy dropped (`Ok(None)`)    |
//! | reads an ignored slot          | removed                        |
//! | depends on a placeholder       | kept, simplified               |
//!
//! A clause that errors for every completion of the template fails the whole
//! policy with `Err`.

use authz_types::{Condition, Expr, Policy, Record, Scope, Set, Value, Var};

use crate::env::Env;
use crate::error::EvalError;
use crate::eval::{apply_binary, expect_bool, get_attr, has_attr, is_type, negate, scope_matches};
use crate::placeholder::{contains_placeholder, is_ignore};

/// Result of partially evaluating an expression
#[derive(Debug, Clone, PartialEq)]
enum Partial {
    Known(Value),
    Residual(Expr),
}

impl Partial {
    fn known(&self) -> Option<Value> {
        match self {
            Partial::Known(v) => Some(v.clone()),
            Partial::Residual(_) => None,
        }
    }

    fn into_expr(self) -> Expr {
        match self {
            Partial::Known(v) => Expr::Value(v),
            Partial::Residual(e) => e,
        }
    }
}

/// Simplify `policy` for the templated request in `env`.
///
/// `Ok(Some(p))` keeps the policy as `p`, `Ok(None)` drops it because it can
/// never be satisfied, and `Err` means it errors for every completion.
pub fn partial_policy(env: &Env<'_>, policy: &Policy) -> Result<Option<Policy>, EvalError> {
    let mut simplified = Policy {
        effect: policy.effect,
        annotations: policy.annotations.clone(),
        principal: Scope::All,
        action: Scope::All,
        resource: Scope::All,
        conditions: Vec::with_capacity(policy.conditions.len()),
    };

    for (var, scope) in [
        (Var::Principal, &policy.principal),
        (Var::Action, &policy.action),
        (Var::Resource, &policy.resource),
    ] {
        let slot = env.slot(var);
        if matches!(scope, Scope::All) || is_ignore(slot) {
            continue;
        }
        if contains_placeholder(slot) {
            let residual = match var {
                Var::Principal => &mut simplified.principal,
                Var::Action => &mut simplified.action,
                _ => &mut simplified.resource,
            };
            *residual = scope.clone();
            continue;
        }
        if !scope_matches(env.entities, scope, slot)? {
            return Ok(None);
        }
    }

    for condition in &policy.conditions {
        match partial_expr(env, &condition.body) {
            Err(EvalError::IgnoredSlot(_)) => {}
            Err(e) => return Err(e),
            Ok(Partial::Known(v)) => {
                if !condition.satisfied_by(expect_bool(&v)?) {
                    return Ok(None);
                }
            }
            Ok(Partial::Residual(body)) => simplified.conditions.push(Condition {
                kind: condition.kind,
                body,
            }),
        }
    }

    Ok(Some(simplified))
}

fn partial_expr(env: &Env<'_>, expr: &Expr) -> Result<Partial, EvalError> {
    match expr {
        Expr::Value(v) => Ok(Partial::Known(v.clone())),
        Expr::Var(var) => {
            let slot = env.slot(*var);
            if is_ignore(slot) {
                Err(EvalError::IgnoredSlot(*var))
            } else if contains_placeholder(slot) {
                Ok(Partial::Residual(expr.clone()))
            } else {
                Ok(Partial::Known(slot.clone()))
            }
        }
        Expr::Not(inner) => match partial_expr(env, inner)? {
            Partial::Known(v) => Ok(Partial::Known(Value::Bool(!expect_bool(&v)?))),
            Partial::Residual(e) => Ok(Partial::Residual(!e)),
        },
        Expr::Neg(inner) => match partial_expr(env, inner)? {
            Partial::Known(v) => negate(&v).map(Partial::Known),
            Partial::Residual(e) => Ok(Partial::Residual(e.negate())),
        },
        Expr::And(left, right) => match partial_expr(env, left)? {
            Partial::Known(v) => {
                if !expect_bool(&v)? {
                    return Ok(Partial::Known(Value::Bool(false)));
                }
                bool_operand(env, right, |r| Expr::boolean(true).and(r))
            }
            Partial::Residual(l) => {
                let r = guarded(env, right)?;
                Ok(Partial::Residual(l.and(r)))
            }
        },
        Expr::Or(left, right) => match partial_expr(env, left)? {
            Partial::Known(v) => {
                if expect_bool(&v)? {
                    return Ok(Partial::Known(Value::Bool(true)));
                }
                bool_operand(env, right, |r| Expr::boolean(false).or(r))
            }
            Partial::Residual(l) => {
                let r = guarded(env, right)?;
                Ok(Partial::Residual(l.or(r)))
            }
        },
        Expr::If {
            cond,
            then,
            otherwise,
        } => match partial_expr(env, cond)? {
            Partial::Known(v) => {
                if expect_bool(&v)? {
                    partial_expr(env, then)
                } else {
                    partial_expr(env, otherwise)
                }
            }
            Partial::Residual(c) => Ok(Partial::Residual(Expr::if_then_else(
                c,
                guarded(env, then)?,
                guarded(env, otherwise)?,
            ))),
        },
        Expr::Binary { op, left, right } => {
            let l = partial_expr(env, left)?;
            let r = partial_expr(env, right)?;
            match (l, r) {
                (Partial::Known(l), Partial::Known(r)) => {
                    apply_binary(env.entities, *op, &l, &r).map(Partial::Known)
                }
                (l, r) => Ok(Partial::Residual(l.into_expr().binary(*op, r.into_expr()))),
            }
        }
        Expr::GetAttr { expr: inner, attr } => match partial_expr(env, inner)? {
            Partial::Known(v) => get_attr(env.entities, &v, attr).map(Partial::Known),
            Partial::Residual(e) => match known_shape(env, inner) {
                Some(Value::Record(record)) => match record.get(attr) {
                    Some(field) if !contains_placeholder(field) => {
                        Ok(Partial::Known(field.clone()))
                    }
                    Some(_) => Ok(Partial::Residual(e.access(attr.clone()))),
                    None => Err(EvalError::AttributeNotFound(attr.clone())),
                },
                _ => Ok(Partial::Residual(e.access(attr.clone()))),
            },
        },
        Expr::HasAttr { expr: inner, attr } => match partial_expr(env, inner)? {
            Partial::Known(v) => has_attr(env.entities, &v, attr)
                .map(|b| Partial::Known(Value::Bool(b))),
            Partial::Residual(e) => match known_shape(env, inner) {
                Some(Value::Record(record)) => {
                    Ok(Partial::Known(Value::Bool(record.contains_key(attr))))
                }
                _ => Ok(Partial::Residual(e.has(attr.clone()))),
            },
        },
        Expr::Is {
            expr: inner,
            entity_type,
        } => match partial_expr(env, inner)? {
            Partial::Known(v) => is_type(&v, entity_type).map(|b| Partial::Known(Value::Bool(b))),
            Partial::Residual(e) => Ok(Partial::Residual(e.is_type(entity_type.clone()))),
        },
        Expr::Record(fields) => {
            let parts = fields
                .iter()
                .map(|(k, e)| Ok((k.clone(), partial_expr(env, e)?)))
                .collect::<Result<Vec<_>, EvalError>>()?;
            let known = parts
                .iter()
                .map(|(k, p)| Some((k.clone(), p.known()?)))
                .collect::<Option<Record>>();
            Ok(match known {
                Some(record) => Partial::Known(Value::Record(record)),
                None => Partial::Residual(Expr::Record(
                    parts.into_iter().map(|(k, p)| (k, p.into_expr())).collect(),
                )),
            })
        }
        Expr::Set(elements) => {
            let parts = elements
                .iter()
                .map(|e| partial_expr(env, e))
                .collect::<Result<Vec<_>, EvalError>>()?;
            let known = parts.iter().map(Partial::known).collect::<Option<Set>>();
            Ok(match known {
                Some(set) => Partial::Known(Value::Set(set)),
                None => Partial::Residual(Expr::Set(
                    parts.into_iter().map(Partial::into_expr).collect(),
                )),
            })
        }
    }
}

/// Right operand of `&&`/`||` after a known left operand that did not
/// short-circuit. A residual operand stays wrapped so the result is still
/// checked to be a boolean.
fn bool_operand(
    env: &Env<'_>,
    right: &Expr,
    wrap: impl FnOnce(Expr) -> Expr,
) -> Result<Partial, EvalError> {
    match partial_expr(env, right)? {
        Partial::Known(v) => Ok(Partial::Known(Value::Bool(expect_bool(&v)?))),
        Partial::Residual(r) => Ok(Partial::Residual(wrap(r))),
    }
}

/// Operand that is only evaluated depending on a residual. An error here is
/// not certain, so the operand is kept as written. Ignored slots still
/// propagate.
fn guarded(env: &Env<'_>, expr: &Expr) -> Result<Expr, EvalError> {
    match partial_expr(env, expr) {
        Ok(p) => Ok(p.into_expr()),
        Err(e @ EvalError::IgnoredSlot(_)) => Err(e),
        Err(_) => Ok(expr.clone()),
    }
}

/// The partially known value of a slot or a record path into a slot
fn known_shape<'e>(env: &'e Env<'_>, expr: &Expr) -> Option<&'e Value> {
    match expr {
        Expr::Var(var) => Some(env.slot(*var)),
        Expr::GetAttr { expr, attr } => known_shape(env, expr)?.as_record()?.get(attr),
        _ => None,
    }
}
