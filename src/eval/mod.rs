//! Expression evaluation.
//!
//! The synchronous walk lives in [`evaluator`], the cooperative asynchronous
//! walk in [`async_eval`] and the argument thunks handed to lazy functions
//! in [`args`]. Both walks share the operator dispatch and name resolution
//! in this module, so they agree on every result.

pub mod args;
pub mod async_eval;
pub mod evaluator;

pub use args::{AsyncArgs, AsyncLazyArg, FunctionArgs, LazyArg};
pub use async_eval::evaluate_async;
pub use evaluator::evaluate;

use tracing::trace;

use crate::context::{EvalConfiguration, EvalFunction};
use crate::error::{ExprError, Result};
use crate::value::Value;

/// Rejects a node nested deeper than the configuration allows.
pub(crate) fn check_depth(depth: usize, cfg: &EvalConfiguration) -> Result<()> {
    if depth > cfg.max_depth {
        return Err(ExprError::RecursionLimit { limit: cfg.max_depth });
    }
    Ok(())
}

/// Whether the left operand alone decides a short-circuit operator.
///
/// `&&` stops at a falsy left operand and `||` at a truthy one; either way
/// the left operand is the result.
pub(crate) fn short_circuits(op: &str, left: &Value, cfg: &EvalConfiguration) -> bool {
    match op {
        "&&" => !cfg.operators.is_truthy(left, cfg),
        "||" => cfg.operators.is_truthy(left, cfg),
        _ => false,
    }
}

/// Applies an operator to its evaluated operands.
///
/// `left` is absent for prefix and `right` for suffix applications.
pub(crate) fn apply_operator(
    op: &str,
    left: Option<Value>,
    right: Option<Value>,
    cfg: &EvalConfiguration,
) -> Result<Value> {
    let ops = cfg.operators.as_ref();
    match (left, right) {
        (Some(a), Some(b)) => apply_binary(op, a, b, cfg),
        (None, Some(a)) => match op {
            "!" => ops.logical_not(a, cfg),
            "-" => ops.subtract(Value::Number(cfg.zero()), a, cfg),
            "+" => Ok(a),
            _ => ops.apply_custom(op, None, Some(a), cfg),
        },
        (Some(a), None) => match op {
            "!" => ops.factorial(a, cfg),
            _ => ops.apply_custom(op, Some(a), None, cfg),
        },
        (None, None) => Err(ExprError::InvalidArgument {
            message: format!("missing operand for operator '{}'", op),
        }),
    }
}

fn apply_binary(op: &str, a: Value, b: Value, cfg: &EvalConfiguration) -> Result<Value> {
    let ops = cfg.operators.as_ref();
    match op {
        "+" => ops.add(a, b, cfg),
        "-" => ops.subtract(a, b, cfg),
        "*" => ops.multiply(a, b, cfg),
        "/" | "\\" => ops.divide(a, b, cfg),
        "%" => ops.modulo(a, b, cfg),
        "**" => ops.pow(a, b, cfg),
        "<<" => ops.shift_left(a, b, cfg),
        ">>" => ops.shift_right(a, b, cfg),
        "&" => ops.bit_and(a, b, cfg),
        "^" => ops.bit_xor(a, b, cfg),
        "|" => ops.bit_or(a, b, cfg),
        "<" => ops.less_than(a, b, cfg),
        "<=" => ops.less_than_or_equal(a, b, cfg),
        ">" => ops.greater_than(a, b, cfg),
        ">=" => ops.greater_than_or_equal(a, b, cfg),
        "==" | "=" => ops.equals(a, b, cfg),
        "!=" | "<>" => ops.not_equals(a, b, cfg),
        // reached only when the left operand did not decide
        "&&" | "||" => Ok(b),
        _ => ops.apply_custom(op, Some(a), Some(b), cfg),
    }
}

/// Resolves an identifier through the synchronous provider and the constant
/// tables; unknown names are null.
pub(crate) fn resolve_constant(name: &str, cfg: &EvalConfiguration) -> Value {
    if let Some(value) = cfg.const_provider.as_ref().and_then(|provider| provider(name)) {
        return value;
    }
    cfg.constant(name).cloned().unwrap_or(Value::Null)
}

pub(crate) fn resolve_function<'c>(name: &str, cfg: &'c EvalConfiguration) -> Result<&'c EvalFunction> {
    match cfg.function(name) {
        Some(function) => {
            trace!(function = name, lazy = function.is_lazy(), "resolved function");
            Ok(function)
        }
        None => Err(ExprError::UnknownFunction {
            name: name.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Number;

    #[test]
    fn test_short_circuit_decision() {
        let cfg = EvalConfiguration::double();
        assert!(short_circuits("&&", &Value::from(0.0), &cfg));
        assert!(!short_circuits("&&", &Value::from(2.0), &cfg));
        assert!(short_circuits("||", &Value::from("x"), &cfg));
        assert!(!short_circuits("||", &Value::Null, &cfg));
        assert!(!short_circuits("+", &Value::from(0.0), &cfg));
    }

    #[test]
    fn test_apply_operator_dispatch() {
        let cfg = EvalConfiguration::double();
        let two = || Some(Value::from(2.0));
        let three = || Some(Value::from(3.0));
        assert_eq!(apply_operator("\\", Some(Value::from(6.0)), three(), &cfg).unwrap(), Value::from(2.0));
        assert_eq!(apply_operator("**", two(), three(), &cfg).unwrap(), Value::from(8.0));
        assert_eq!(apply_operator("<>", two(), three(), &cfg).unwrap(), Value::Bool(true));
        assert_eq!(apply_operator("=", two(), two(), &cfg).unwrap(), Value::Bool(true));
        assert_eq!(apply_operator("!", None, Some(Value::from(0.0)), &cfg).unwrap(), Value::Bool(true));
        assert_eq!(apply_operator("!", three(), None, &cfg).unwrap(), Value::from(6.0));
        assert_eq!(apply_operator("-", None, three(), &cfg).unwrap(), Value::from(-3.0));
        assert_eq!(apply_operator("&&", two(), three(), &cfg).unwrap(), Value::from(3.0));
    }

    #[test]
    fn test_unknown_and_missing_operands() {
        let cfg = EvalConfiguration::int32();
        assert_eq!(
            apply_operator("~~", Some(Value::Number(Number::I32(1))), None, &cfg).unwrap_err(),
            ExprError::UnknownOperator { op: "~~".to_string() }
        );
        assert!(matches!(
            apply_operator("*", None, None, &cfg),
            Err(ExprError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_resolution_order() {
        let mut cfg = EvalConfiguration::double()
            .with_const_provider(|name| (name == "pi").then(|| Value::from(3.0)));
        cfg.set_constant("answer", 42.0);
        assert_eq!(resolve_constant("pi", &cfg), Value::from(3.0));
        assert_eq!(resolve_constant("PI", &cfg), Value::from(core::f64::consts::PI));
        assert_eq!(resolve_constant("ANSWER", &cfg), Value::Null);
        assert_eq!(resolve_constant("answer", &cfg), Value::from(42.0));
        assert_eq!(resolve_constant("missing", &cfg), Value::Null);

        assert!(resolve_function("sqrt", &cfg).is_ok());
        assert_eq!(
            resolve_function("nope", &cfg).unwrap_err(),
            ExprError::UnknownFunction { name: "nope".to_string() }
        );
    }
}
