//! Cooperative asynchronous tree walk.
//!
//! Children are awaited strictly left then right. The cancellation token is
//! checked on entry to every node, so a cancellation that fires while a host
//! function or provider is suspended surfaces as [`ExprError::Cancelled`] at
//! the next node.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::context::EvalConfiguration;
use crate::error::{ExprError, Result};
use crate::types::ExprNode;
use crate::value::Value;

use super::args::{AsyncArgs, AsyncLazyArg, FunctionArgs, LazyArg};
use super::{apply_operator, check_depth, resolve_constant, resolve_function, short_circuits};

/// Evaluates a compiled tree asynchronously.
///
/// Identifiers consult the asynchronous constant provider before the
/// synchronous one. Functions run their asynchronous body when they have
/// one; a synchronous-only function gets synchronous thunks when lazy and
/// awaited values otherwise.
pub fn evaluate_async<'a>(
    node: &'a ExprNode,
    configuration: &'a Arc<EvalConfiguration>,
    cancel: &'a CancellationToken,
) -> BoxFuture<'a, Result<Value>> {
    eval_node_async(node, configuration, cancel, 0)
}

pub(crate) fn eval_node_async<'a>(
    node: &'a ExprNode,
    configuration: &'a Arc<EvalConfiguration>,
    cancel: &'a CancellationToken,
    depth: usize,
) -> BoxFuture<'a, Result<Value>> {
    async move {
        if cancel.is_cancelled() {
            debug!(position = node.position(), "evaluation cancelled");
            return Err(ExprError::Cancelled);
        }
        check_depth(depth, configuration)?;

        match node {
            ExprNode::Number { text, .. } => configuration.operators.convert_to_number(text, configuration),
            ExprNode::String { value, .. } => Ok(Value::String(value.clone())),
            ExprNode::Identifier { name, .. } => resolve_identifier(name, configuration, cancel).await,
            ExprNode::Call { name, args, .. } => eval_function(name, args, configuration, cancel, depth + 1).await,
            ExprNode::Operator { op, left, right, .. } => {
                let left = match left {
                    Some(node) => Some(eval_node_async(node, configuration, cancel, depth + 1).await?),
                    None => None,
                };
                match left {
                    Some(value) if short_circuits(op, &value, configuration) => Ok(value),
                    left => {
                        let right = match right {
                            Some(node) => Some(eval_node_async(node, configuration, cancel, depth + 1).await?),
                            None => None,
                        };
                        apply_operator(op, left, right, configuration)
                    }
                }
            }
        }
    }
    .boxed()
}

async fn resolve_identifier(
    name: &str,
    configuration: &Arc<EvalConfiguration>,
    cancel: &CancellationToken,
) -> Result<Value> {
    if let Some(provider) = &configuration.async_const_provider {
        if let Some(value) = provider(cancel.clone(), name.to_string()).await? {
            return Ok(value);
        }
    }
    Ok(resolve_constant(name, configuration))
}

async fn eval_function(
    name: &str,
    args: &[Option<Arc<ExprNode>>],
    configuration: &Arc<EvalConfiguration>,
    cancel: &CancellationToken,
    depth: usize,
) -> Result<Value> {
    let function = resolve_function(name, configuration)?;

    if let Some(body) = function.async_body() {
        let args = if function.is_lazy() {
            AsyncArgs::Lazy(
                args.iter()
                    .map(|arg| AsyncLazyArg::new(arg.clone(), Arc::clone(configuration), cancel.clone(), depth))
                    .collect(),
            )
        } else {
            AsyncArgs::Eager(eager_values(args, configuration, cancel, depth).await?)
        };
        return body(cancel.clone(), Arc::clone(configuration), args).await;
    }

    let Some(body) = function.sync_body() else {
        return Err(ExprError::function(format!("function '{}' has no body", name)));
    };
    if function.is_lazy() {
        let thunks = args
            .iter()
            .map(|arg| LazyArg::new(arg.as_deref(), configuration, depth))
            .collect();
        return body(configuration.as_ref(), &FunctionArgs::Lazy(thunks));
    }
    let values = eager_values(args, configuration, cancel, depth).await?;
    body(configuration.as_ref(), &FunctionArgs::Eager(values))
}

async fn eager_values(
    args: &[Option<Arc<ExprNode>>],
    configuration: &Arc<EvalConfiguration>,
    cancel: &CancellationToken,
    depth: usize,
) -> Result<Vec<Value>> {
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        let value = match arg {
            Some(node) => eval_node_async(node, configuration, cancel, depth).await?,
            None => Value::Null,
        };
        values.push(value);
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::EvalFunction;
    use crate::engine::compile;
    use futures::executor::block_on;

    fn run(text: &str, cfg: EvalConfiguration, cancel: &CancellationToken) -> Result<Value> {
        let cfg = Arc::new(cfg);
        let expr = compile(text, &cfg)?;
        block_on(evaluate_async(expr.root(), &cfg, cancel))
    }

    #[test]
    fn test_matches_sync_path() {
        let cancel = CancellationToken::new();
        let cfg = EvalConfiguration::double();
        assert_eq!(run("12+45*10", cfg.clone(), &cancel).unwrap(), Value::from(462.0));
        assert_eq!(run("max(1,5,8.7)", cfg.clone(), &cancel).unwrap(), Value::from(8.7));
        assert_eq!(run("'5' + 5", cfg, &cancel).unwrap(), Value::from("55"));
    }

    #[test]
    fn test_cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_eq!(
            run("1 + 2", EvalConfiguration::double(), &cancel).unwrap_err(),
            ExprError::Cancelled
        );
    }

    #[test]
    fn test_cancelled_by_function() {
        let mut cfg = EvalConfiguration::double();
        cfg.set_function(
            "stop",
            EvalFunction::new_async(|cancel, _, _| async move {
                cancel.cancel();
                Ok(Value::from(1.0))
            }),
        );
        let cancel = CancellationToken::new();
        assert_eq!(run("stop() + 1", cfg, &cancel).unwrap_err(), ExprError::Cancelled);
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn test_async_provider_first() {
        let cfg = EvalConfiguration::double()
            .with_const_provider(|name| (name == "x").then(|| Value::from(1.0)))
            .with_async_const_provider(|_, name| async move {
                Ok((name == "x").then(|| Value::from(2.0)))
            });
        let cancel = CancellationToken::new();
        assert_eq!(run("x * 10", cfg, &cancel).unwrap(), Value::from(20.0));
    }

    #[test]
    fn test_async_lazy_function() {
        let mut cfg = EvalConfiguration::int32();
        cfg.set_function(
            "pick",
            EvalFunction::lazy_async(|_, _, args| async move {
                let flag = args.get(0).await?;
                if flag.as_bool().unwrap_or(false) {
                    args.get(1).await
                } else {
                    args.get(2).await
                }
            }),
        );
        let cancel = CancellationToken::new();
        let result = run("pick(1 < 2, 7, 1/0)", cfg, &cancel).unwrap();
        assert_eq!(result.as_f64(), Some(7.0));
    }

    #[test]
    fn test_async_function_inside_sync_lazy_argument() {
        let mut cfg = EvalConfiguration::double();
        cfg.set_function("first", EvalFunction::lazy(|_, args| args.get(0)));
        cfg.set_function(
            "later",
            EvalFunction::new_async(|_, _, args| async move {
                let x = args.get(0).await?.as_f64().unwrap_or(0.0);
                Ok(Value::from(x + 1.0))
            }),
        );
        let cancel = CancellationToken::new();
        assert_eq!(run("first(later(41))", cfg, &cancel).unwrap(), Value::from(42.0));
    }

    #[test]
    fn test_depth_limit() {
        let cfg = EvalConfiguration::double().with_max_depth(4);
        let shallow = Arc::new(EvalConfiguration::double());
        let expr = compile("1+1+1+1+1+1", &shallow).unwrap();
        let cancel = CancellationToken::new();
        assert_eq!(
            block_on(evaluate_async(expr.root(), &Arc::new(cfg), &cancel)).unwrap_err(),
            ExprError::RecursionLimit { limit: 4 }
        );
        assert_eq!(
            block_on(evaluate_async(expr.root(), &shallow, &cancel)).unwrap(),
            Value::from(6.0)
        );
    }

    #[test]
    fn test_sync_lazy_function_on_async_path() {
        let mut cfg = EvalConfiguration::int32();
        cfg.set_function("DoNothing", EvalFunction::lazy(|_, _| Ok(Value::Null)));
        let cancel = CancellationToken::new();
        assert_eq!(run("DoNothing(1/0)", cfg, &cancel).unwrap(), Value::Null);
    }
}
