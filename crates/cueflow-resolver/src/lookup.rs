//! Expression evaluation against a partially resolved timeline
//!
//! Two evaluation modes share the same reference lookup:
//! - scalar (time) evaluation for `start`/`end`/`duration`/`repeating`,
//!   producing one value per referenced instance,
//! - logical evaluation for `while`, producing an instance set.
//!
//! A reference to a dependency that is not resolved yet yields
//! "unresolved" rather than an error; the orchestrator retries the object
//! in a later sweep. Every reference touched is recorded for the cache
//! handler.

use std::collections::{BTreeSet, HashMap};

use cueflow_core::{Instance, Reference, Time, TimeExpr};
use cueflow_expr::{parse, Expr, Hook, Op, RefExpr, RefKind, SyntaxError};

use crate::algebra;
use crate::error::{ResolveError, ResolveResult};
use crate::resolve::{Arena, ObjStatus};

/// References touched and the self-referencing flag, accumulated while
/// evaluating one object's triggers.
#[derive(Debug, Default)]
pub(crate) struct RefLog {
    pub references: BTreeSet<Reference>,
    pub is_self_referencing: bool,
}

/// Evaluation context for one object.
pub(crate) struct EvalCtx<'a> {
    pub arena: &'a Arena,
    pub statuses: &'a HashMap<String, ObjStatus>,
    pub obj_id: &'a str,
}

/// Scalar evaluation result.
#[derive(Debug, PartialEq)]
pub(crate) enum ScalarValue {
    /// A dependency is not resolved yet; retry in a later sweep.
    Unresolved,
    /// One value per referenced instance (a singleton for literals).
    /// `None` entries are null: an open end or a division by zero.
    Values(Vec<Option<i64>>),
}

/// Logical evaluation result.
#[derive(Debug, PartialEq)]
pub(crate) enum SetValue {
    Unresolved,
    Instances(Vec<Instance>),
}

/// Turn a trigger value into an expression tree.
pub(crate) fn interpret(expr: &TimeExpr) -> Result<Expr, SyntaxError> {
    match expr {
        TimeExpr::Number(n) => Ok(Expr::Number(*n)),
        TimeExpr::Expr(s) => parse(s),
    }
}

/// Evaluate a time expression to scalar values.
pub(crate) fn eval_scalar(
    ctx: &EvalCtx<'_>,
    expr: &Expr,
    log: &mut RefLog,
) -> ResolveResult<ScalarValue> {
    match expr {
        Expr::Number(n) => Ok(ScalarValue::Values(vec![Some(*n)])),
        Expr::Ref(r) => match lookup_reference(ctx, r, log)? {
            None => Ok(ScalarValue::Unresolved),
            Some(instances) => Ok(ScalarValue::Values(apply_hook(
                &instances,
                r.hook.unwrap_or(Hook::End),
            ))),
        },
        Expr::Not(_) => Err(ResolveError::InvalidExpression {
            obj: ctx.obj_id.to_string(),
            reason: "`!` is not valid in a time expression".to_string(),
        }),
        Expr::Binary { lhs, op, rhs } => {
            if op.is_logical() {
                return Err(ResolveError::InvalidExpression {
                    obj: ctx.obj_id.to_string(),
                    reason: format!("`{}` is not valid in a time expression", op.symbol()),
                });
            }
            let left = eval_scalar(ctx, lhs, log)?;
            let right = eval_scalar(ctx, rhs, log)?;
            match (left, right) {
                (ScalarValue::Values(a), ScalarValue::Values(b)) => {
                    Ok(ScalarValue::Values(combine(&a, &b, *op)))
                }
                _ => Ok(ScalarValue::Unresolved),
            }
        }
    }
}

/// Evaluate a `while` expression to an instance set.
pub(crate) fn eval_set(
    ctx: &EvalCtx<'_>,
    expr: &Expr,
    log: &mut RefLog,
) -> ResolveResult<SetValue> {
    match expr {
        Expr::Number(n) => Ok(SetValue::Instances(constant_set(*n))),
        Expr::Ref(r) => match lookup_reference(ctx, r, log)? {
            None => Ok(SetValue::Unresolved),
            Some(instances) => {
                let merged = algebra::union_all(instances);
                match r.hook {
                    None => Ok(SetValue::Instances(merged)),
                    Some(Hook::Start) => Ok(SetValue::Instances(
                        merged
                            .iter()
                            .map(|i| point_of(i, i.start))
                            .collect(),
                    )),
                    Some(Hook::End) => Ok(SetValue::Instances(
                        merged
                            .iter()
                            .filter_map(|i| i.end.map(|e| point_of(i, e)))
                            .collect(),
                    )),
                    Some(Hook::Duration) => Err(ResolveError::InvalidExpression {
                        obj: ctx.obj_id.to_string(),
                        reason: "the duration hook is not valid in a while expression"
                            .to_string(),
                    }),
                }
            }
        },
        Expr::Not(inner) => match eval_set(ctx, inner, log)? {
            SetValue::Unresolved => Ok(SetValue::Unresolved),
            SetValue::Instances(set) => Ok(SetValue::Instances(algebra::invert(&set))),
        },
        Expr::Binary { lhs, op, rhs } => match op {
            Op::And | Op::Or => {
                let left = eval_set(ctx, lhs, log)?;
                let right = eval_set(ctx, rhs, log)?;
                match (left, right) {
                    (SetValue::Instances(a), SetValue::Instances(b)) => {
                        let combined = match op {
                            Op::And => algebra::intersect_all(&a, &b),
                            _ => {
                                let mut all = a;
                                all.extend(b);
                                algebra::union_all(all)
                            }
                        };
                        Ok(SetValue::Instances(combined))
                    }
                    _ => Ok(SetValue::Unresolved),
                }
            }
            Op::Add | Op::Sub if !expr.is_constant() => {
                // Shift an instance set by a scalar offset.
                let left = eval_set(ctx, lhs, log)?;
                let right = eval_scalar(ctx, rhs, log)?;
                match (left, right) {
                    (SetValue::Instances(set), ScalarValue::Values(values)) => {
                        let offset = values.first().copied().flatten();
                        match offset {
                            Some(mut delta) => {
                                if *op == Op::Sub {
                                    delta = -delta;
                                }
                                Ok(SetValue::Instances(algebra::shift(&set, delta)))
                            }
                            // null offset: the set never applies
                            None => Ok(SetValue::Instances(Vec::new())),
                        }
                    }
                    _ => Ok(SetValue::Unresolved),
                }
            }
            _ => {
                if expr.is_constant() {
                    // Pure arithmetic folds to a constant truth value.
                    match eval_scalar(ctx, expr, log)? {
                        ScalarValue::Values(values) => Ok(SetValue::Instances(constant_set(
                            values.first().copied().flatten().unwrap_or(0),
                        ))),
                        ScalarValue::Unresolved => Ok(SetValue::Unresolved),
                    }
                } else {
                    Err(ResolveError::InvalidExpression {
                        obj: ctx.obj_id.to_string(),
                        reason: format!(
                            "`{}` cannot scale an instance set in a while expression",
                            op.symbol()
                        ),
                    })
                }
            }
        },
    }
}

/// Look up the instances a reference points at. `Ok(None)` means the
/// dependency is not resolved yet.
fn lookup_reference(
    ctx: &EvalCtx<'_>,
    r: &RefExpr,
    log: &mut RefLog,
) -> ResolveResult<Option<Vec<Instance>>> {
    match r.kind {
        RefKind::Object => {
            log.references.insert(Reference::Object(r.name.clone()));
            if r.name == ctx.obj_id {
                // Evaluation revisits the object before it resolved.
                return Err(ResolveError::CircularReference(vec![ctx.obj_id.to_string()]));
            }
            match ctx.statuses.get(&r.name) {
                // Unknown target: an empty set, the object never triggers.
                None => Ok(Some(Vec::new())),
                Some(ObjStatus::Resolved) => Ok(Some(
                    ctx.arena.objects[&r.name].resolved.instances.clone(),
                )),
                Some(_) => Ok(None),
            }
        }
        RefKind::Class => {
            log.references.insert(Reference::Class(r.name.clone()));
            let members = ctx.arena.class_members.get(&r.name);
            member_instances(ctx, members.map(Vec::as_slice).unwrap_or(&[]), log)
        }
        RefKind::Layer => {
            log.references.insert(Reference::Layer(r.name.clone()));
            let members = ctx.arena.layer_members.get(&r.name);
            member_instances(ctx, members.map(Vec::as_slice).unwrap_or(&[]), log)
        }
    }
}

/// Union of member instances. A self-referencing lookup (the evaluating
/// object is itself a member) resolves against the nearest preceding
/// member in input order, which is what chains object N onto object N-1.
fn member_instances(
    ctx: &EvalCtx<'_>,
    members: &[String],
    log: &mut RefLog,
) -> ResolveResult<Option<Vec<Instance>>> {
    let selected: &[String] = match members.iter().position(|m| m == ctx.obj_id) {
        Some(pos) => {
            log.is_self_referencing = true;
            if pos == 0 {
                &[]
            } else {
                std::slice::from_ref(&members[pos - 1])
            }
        }
        None => members,
    };

    let mut all = Vec::new();
    for id in selected {
        match ctx.statuses.get(id) {
            Some(ObjStatus::Resolved) => {
                all.extend(ctx.arena.objects[id].resolved.instances.iter().cloned())
            }
            Some(_) => return Ok(None),
            None => {}
        }
    }
    Ok(Some(all))
}

/// Extract one scalar per instance for a hook.
fn apply_hook(instances: &[Instance], hook: Hook) -> Vec<Option<i64>> {
    match hook {
        Hook::Start => instances.iter().map(|i| Some(i.start.0)).collect(),
        Hook::End => instances.iter().map(|i| i.end.map(|e| e.0)).collect(),
        Hook::Duration => match instances.first() {
            Some(first) => vec![first.duration()],
            None => Vec::new(),
        },
    }
}

/// Pairwise/broadcast arithmetic over value lists. Null operands
/// propagate; division by zero is null.
fn combine(a: &[Option<i64>], b: &[Option<i64>], op: Op) -> Vec<Option<i64>> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    if a.len() == 1 {
        return b.iter().map(|rhs| apply(op, a[0], *rhs)).collect();
    }
    if b.len() == 1 {
        return a.iter().map(|lhs| apply(op, *lhs, b[0])).collect();
    }
    a.iter()
        .zip(b.iter())
        .map(|(lhs, rhs)| apply(op, *lhs, *rhs))
        .collect()
}

fn apply(op: Op, a: Option<i64>, b: Option<i64>) -> Option<i64> {
    let (a, b) = (a?, b?);
    match op {
        Op::Add => Some(a + b),
        Op::Sub => Some(a - b),
        Op::Mul => Some(a * b),
        Op::Div => {
            if b == 0 {
                None
            } else {
                Some(a / b)
            }
        }
        Op::And | Op::Or => None,
    }
}

/// Constant truth value as an instance set: non-zero is `[0, ∞)`.
pub(crate) fn constant_set(value: i64) -> Vec<Instance> {
    if value == 0 {
        Vec::new()
    } else {
        vec![Instance::new("", Time::ZERO, None)]
    }
}

/// A zero-length instance at a bound, keeping the source's references.
fn point_of(instance: &Instance, at: Time) -> Instance {
    Instance::new("", at, Some(at)).with_references(instance.references.clone())
}
