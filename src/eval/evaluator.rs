//! Synchronous tree walk.

use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::thread::{self, Thread};

use futures::task::{ArcWake, waker};
use tokio_util::sync::CancellationToken;

use crate::context::EvalConfiguration;
use crate::error::{ExprError, Result};
use crate::types::ExprNode;
use crate::value::Value;

use super::args::{AsyncArgs, AsyncLazyArg, FunctionArgs, LazyArg};
use super::{apply_operator, check_depth, resolve_constant, resolve_function, short_circuits};

/// Evaluates a compiled tree.
///
/// Number literals go through the configuration's
/// [`convert_to_number`](crate::ops::Operators::convert_to_number), string
/// literals evaluate to themselves and identifiers resolve through the
/// constant provider and the constant tables, ending in [`Value::Null`].
/// A tree deeper than the configuration's `max_depth` fails with
/// [`ExprError::RecursionLimit`].
pub fn evaluate(node: &ExprNode, configuration: &Arc<EvalConfiguration>) -> Result<Value> {
    eval_node(node, configuration, 0)
}

pub(crate) fn eval_node(node: &ExprNode, configuration: &Arc<EvalConfiguration>, depth: usize) -> Result<Value> {
    check_depth(depth, configuration)?;

    match node {
        ExprNode::Number { text, .. } => configuration.operators.convert_to_number(text, configuration),
        ExprNode::String { value, .. } => Ok(Value::String(value.clone())),
        ExprNode::Identifier { name, .. } => Ok(resolve_constant(name, configuration)),
        ExprNode::Call { name, args, .. } => eval_function(name, args, configuration, depth + 1),
        ExprNode::Operator { op, left, right, .. } => {
            let left = match left {
                Some(node) => Some(eval_node(node, configuration, depth + 1)?),
                None => None,
            };
            match left {
                Some(value) if short_circuits(op, &value, configuration) => Ok(value),
                left => {
                    let right = match right {
                        Some(node) => Some(eval_node(node, configuration, depth + 1)?),
                        None => None,
                    };
                    apply_operator(op, left, right, configuration)
                }
            }
        }
    }
}

/// Calls a function whose arguments sit at `depth`.
fn eval_function(
    name: &str,
    args: &[Option<Arc<ExprNode>>],
    configuration: &Arc<EvalConfiguration>,
    depth: usize,
) -> Result<Value> {
    let function = resolve_function(name, configuration)?;

    if let Some(body) = function.sync_body() {
        let args = if function.is_lazy() {
            FunctionArgs::Lazy(
                args.iter()
                    .map(|arg| LazyArg::new(arg.as_deref(), configuration, depth))
                    .collect(),
            )
        } else {
            FunctionArgs::Eager(eager_values(args, configuration, depth)?)
        };
        return body(configuration.as_ref(), &args);
    }

    let Some(body) = function.async_body() else {
        return Err(ExprError::function(format!("function '{}' has no body", name)));
    };

    let cancel = CancellationToken::new();
    let args = if function.is_lazy() {
        AsyncArgs::Lazy(
            args.iter()
                .map(|arg| AsyncLazyArg::new(arg.clone(), Arc::clone(configuration), cancel.clone(), depth))
                .collect(),
        )
    } else {
        AsyncArgs::Eager(eager_values(args, configuration, depth)?)
    };
    run_to_completion(body(cancel, Arc::clone(configuration), args))
}

fn eager_values(
    args: &[Option<Arc<ExprNode>>],
    configuration: &Arc<EvalConfiguration>,
    depth: usize,
) -> Result<Vec<Value>> {
    args.iter()
        .map(|arg| match arg {
            Some(node) => eval_node(node, configuration, depth),
            None => Ok(Value::Null),
        })
        .collect()
}

struct ThreadWaker(Thread);

impl ArcWake for ThreadWaker {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.0.unpark();
    }
}

/// Polls an async-only function body on the calling thread, parking between polls.
///
/// Unlike `futures::executor::block_on` this may run inside another executor,
/// which happens when a synchronous lazy function forces a thunk during
/// asynchronous evaluation.
fn run_to_completion<F: Future>(future: F) -> F::Output {
    let mut future = pin!(future);
    let waker = waker(Arc::new(ThreadWaker(thread::current())));
    let mut cx = Context::from_waker(&waker);
    loop {
        if let Poll::Ready(output) = future.as_mut().poll(&mut cx) {
            return output;
        }
        thread::park();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::EvalFunction;
    use crate::engine::compile;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn run(text: &str, cfg: EvalConfiguration) -> Result<Value> {
        let cfg = Arc::new(cfg);
        let expr = compile(text, &cfg)?;
        evaluate(expr.root(), &cfg)
    }

    #[test]
    fn test_short_circuit_skips_right() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut cfg = EvalConfiguration::double();
        let counter = Arc::clone(&calls);
        cfg.register_function("touch", move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Bool(true))
        });
        let cfg = Arc::new(cfg);

        let expr = compile("0 && touch()", &cfg).unwrap();
        assert_eq!(evaluate(expr.root(), &cfg).unwrap(), Value::from(0.0));
        let expr = compile("'x' || touch()", &cfg).unwrap();
        assert_eq!(evaluate(expr.root(), &cfg).unwrap(), Value::from("x"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let expr = compile("1 && touch()", &cfg).unwrap();
        assert_eq!(evaluate(expr.root(), &cfg).unwrap(), Value::Bool(true));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_lazy_arguments_are_forced_on_demand() {
        let mut cfg = EvalConfiguration::int32();
        cfg.set_function("DoNothing", EvalFunction::lazy(|_, _| Ok(Value::Null)));
        cfg.set_function("first", EvalFunction::lazy(|_, args| args.get(0)));
        assert_eq!(run("DoNothing(1/0)", cfg.clone()).unwrap(), Value::Null);
        assert_eq!(run("first(1/0)", cfg).unwrap_err(), ExprError::DivideByZero);
    }

    #[test]
    fn test_lazy_argument_re_evaluates() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let mut cfg = EvalConfiguration::double().with_const_provider(move |name| {
            (name == "tick").then(|| Value::from(counter.fetch_add(1, Ordering::SeqCst) as f64))
        });
        cfg.set_function(
            "twice",
            EvalFunction::lazy(|_, args| {
                args.get(0)?;
                args.get(0)
            }),
        );
        assert_eq!(run("twice(tick)", cfg).unwrap(), Value::from(1.0));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_empty_argument_is_null() {
        let mut cfg = EvalConfiguration::double();
        cfg.register_function("third", |_, args| args.get(2));
        assert_eq!(run("third(1, 2, )", cfg.clone()).unwrap(), Value::Null);
        assert!(matches!(
            run("third(1)", cfg),
            Err(ExprError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_async_only_function_on_sync_path() {
        let mut cfg = EvalConfiguration::double();
        cfg.set_function(
            "later",
            EvalFunction::new_async(|_, _, args| async move {
                let x = args.get(0).await?.as_f64().unwrap_or(0.0);
                Ok(Value::from(x + 1.0))
            }),
        );
        assert_eq!(run("later(41)", cfg).unwrap(), Value::from(42.0));
    }

    #[test]
    fn test_async_only_function_waits_for_wake() {
        let mut cfg = EvalConfiguration::double();
        cfg.set_function(
            "slow",
            EvalFunction::new_async(|_, _, _| async move {
                let (tx, rx) = futures::channel::oneshot::channel();
                std::thread::spawn(move || {
                    std::thread::sleep(std::time::Duration::from_millis(5));
                    let _ = tx.send(7.0);
                });
                let value = rx.await.map_err(|e| ExprError::function(e.to_string()))?;
                Ok(Value::from(value))
            }),
        );
        assert_eq!(run("slow() * 2", cfg).unwrap(), Value::from(14.0));
    }

    #[test]
    fn test_depth_limit_on_hand_built_tree() {
        let mut node = Arc::new(ExprNode::Number {
            text: "1".to_string(),
            position: 0,
        });
        for _ in 0..100 {
            node = Arc::new(ExprNode::Operator {
                op: "-".to_string(),
                position: 0,
                left: None,
                right: Some(node),
            });
        }
        let cfg = Arc::new(EvalConfiguration::double().with_max_depth(50));
        assert_eq!(
            evaluate(&node, &cfg).unwrap_err(),
            ExprError::RecursionLimit { limit: 50 }
        );
        let cfg = Arc::new(EvalConfiguration::double());
        assert_eq!(evaluate(&node, &cfg).unwrap(), Value::from(1.0));
    }

    #[test]
    fn test_unknown_function() {
        assert_eq!(
            run("nothing(1)", EvalConfiguration::double()).unwrap_err(),
            ExprError::UnknownFunction { name: "nothing".to_string() }
        );
    }
}
