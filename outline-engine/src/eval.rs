//! Expression evaluation
//!
//! Every part of a bullet and every argument of a call is evaluated
//! concurrently. Failures stay inside the expression that produced them:
//! an unknown function yields `Null`, a failing or panicking function
//! yields `Undefined`, and nothing is ever returned as an error.

use crate::registry::CallArgs;
use crate::scope::ScopeHandle;
use futures_util::future::{join, join_all, BoxFuture};
use futures_util::FutureExt;
use outline_core::{classify_text, Value};
use outline_dsl::{Bullet, Expr, ExprKind};
use std::panic::AssertUnwindSafe;

/// Evaluate every part of a bullet, returning one value per part in
/// source order regardless of completion order.
pub async fn eval_bullet(scope: &ScopeHandle, bullet: &Bullet) -> Vec<Value> {
    join_all(bullet.parts.iter().map(|part| async move {
        match &part.kind {
            ExprKind::StringLiteral(text) => classify_text(text),
            _ => eval_expr(scope, part).await,
        }
    }))
    .await
}

/// Evaluate one expression in the context of `scope`.
pub fn eval_expr<'a>(scope: &'a ScopeHandle, expr: &'a Expr) -> BoxFuture<'a, Value> {
    async move {
        match &expr.kind {
            ExprKind::StringLiteral(s) => Value::Text(s.clone()),
            ExprKind::NumberLiteral(n) => Value::Number(*n),
            ExprKind::Undefined => Value::Undefined,
            ExprKind::IdentifierRef(id) => match scope.transcluded_scope(id) {
                Some(target) => Value::Scope(target.id()),
                None => {
                    tracing::debug!(node = %id, "Unresolved transclusion");
                    Value::Undefined
                }
            },
            ExprKind::NameRef(name) => match scope.lookup(name) {
                Some(target) => target.value_async().await,
                None => {
                    tracing::trace!(scope = %scope.id(), name = %name, "Name not in scope");
                    Value::Undefined
                }
            },
            ExprKind::FieldAccess { object, field } => {
                let (object, field) = join(eval_expr(scope, object), eval_expr(scope, field)).await;
                call_function(scope, "Get", CallArgs::from_positional(vec![object, field])).await
            }
            ExprKind::FunctionCall { name, args } => {
                let values = join_all(args.iter().map(|arg| eval_expr(scope, &arg.value))).await;
                let mut call_args = CallArgs::new();
                for (arg, value) in args.iter().zip(values) {
                    match &arg.name {
                        Some(key) => call_args.insert_named(key.clone(), value),
                        None => call_args.push(value),
                    }
                }
                call_function(scope, name, call_args).await
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let (lhs, rhs) = join(eval_expr(scope, lhs), eval_expr(scope, rhs)).await;
                let (lhs, rhs) = join(scope.resolve(&lhs), scope.resolve(&rhs)).await;
                lhs.binary(*op, &rhs)
            }
            ExprKind::InlineExpr(inner) => eval_expr(scope, inner).await,
        }
    }
    .boxed()
}

async fn call_function(scope: &ScopeHandle, name: &str, args: CallArgs) -> Value {
    let Some(function) = scope.tree().registry().get(name) else {
        tracing::debug!(function = name, "Unknown function");
        return Value::Null;
    };

    match AssertUnwindSafe(function.call(args, scope)).catch_unwind().await {
        Ok(Ok(value)) => value,
        Ok(Err(e)) => {
            tracing::debug!(function = name, error = %e, "Function failed");
            Value::Undefined
        }
        Err(_) => {
            tracing::warn!(function = name, scope = %scope.id(), "Function panicked");
            Value::Undefined
        }
    }
}
