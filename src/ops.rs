//! Named operations applied by the evaluator to operator nodes.
//!
//! Every operator spelling in the default grammar maps to one method of
//! [`Operators`]. All methods have default bodies, so a host replaces single
//! operations by implementing the trait on its own type and overriding only
//! those methods, then installs it with
//! [`EvalConfiguration::with_operators`](crate::context::EvalConfiguration::with_operators).
//!
//! The defaults are dynamically typed:
//!
//! * `+` concatenates as soon as either operand is a string.
//! * Other arithmetic first runs string operands through
//!   [`optionally_convert_string`]; a string that is still not a number is a
//!   [`ExprError::TypeMismatch`].
//! * A null operand makes arithmetic, bitwise and shift results null.
//! * Bitwise and shift operators truncate both operands to `i64` and convert
//!   the result back to the configured numeric type.

use core::cmp::Ordering;

use rust_decimal::Decimal;

use crate::context::EvalConfiguration;
use crate::conversion::{optionally_convert_string, parse_literal};
use crate::error::{ExprError, Result};
use crate::value::{Number, Value};

/// Semantic actions for operator nodes.
///
/// # Examples
///
/// Overriding a single operation:
///
/// ```
/// use std::sync::Arc;
/// use exp_eval::context::EvalConfiguration;
/// use exp_eval::engine::execute;
/// use exp_eval::error::Result;
/// use exp_eval::ops::Operators;
/// use exp_eval::value::Value;
///
/// struct NoStringConcat;
///
/// impl Operators for NoStringConcat {
///     fn add(&self, a: Value, b: Value, cfg: &EvalConfiguration) -> Result<Value> {
///         let a = exp_eval::conversion::optionally_convert_string(a, cfg);
///         let b = exp_eval::conversion::optionally_convert_string(b, cfg);
///         exp_eval::ops::DefaultOperators.add(a, b, cfg)
///     }
/// }
///
/// let cfg = Arc::new(EvalConfiguration::double().with_operators(NoStringConcat));
/// assert_eq!(execute("'5' + 5", &cfg).unwrap(), Value::from(10.0));
/// ```
pub trait Operators: Send + Sync {
    /// Converts a numeric literal's text to a value.
    fn convert_to_number(&self, text: &str, cfg: &EvalConfiguration) -> Result<Value> {
        parse_literal(text, cfg).map(Value::Number)
    }

    fn add(&self, a: Value, b: Value, cfg: &EvalConfiguration) -> Result<Value> {
        match (&a, &b) {
            (Value::String(_), _) | (_, Value::String(_)) => Ok(Value::String(format!("{}{}", a, b))),
            _ => arithmetic("+", a, b, cfg, Number::checked_add),
        }
    }

    fn subtract(&self, a: Value, b: Value, cfg: &EvalConfiguration) -> Result<Value> {
        arithmetic("-", a, b, cfg, Number::checked_sub)
    }

    fn multiply(&self, a: Value, b: Value, cfg: &EvalConfiguration) -> Result<Value> {
        arithmetic("*", a, b, cfg, Number::checked_mul)
    }

    fn divide(&self, a: Value, b: Value, cfg: &EvalConfiguration) -> Result<Value> {
        arithmetic("/", a, b, cfg, Number::checked_div)
    }

    fn modulo(&self, a: Value, b: Value, cfg: &EvalConfiguration) -> Result<Value> {
        arithmetic("%", a, b, cfg, Number::checked_rem)
    }

    /// Raises `a` to `b` in double precision and converts back to the configured type.
    fn pow(&self, a: Value, b: Value, cfg: &EvalConfiguration) -> Result<Value> {
        arithmetic("**", a, b, cfg, |x, y| {
            Number::from_f64(cfg.numeric_type, libm::pow(x.to_f64(), y.to_f64()))
        })
    }

    fn shift_left(&self, a: Value, b: Value, cfg: &EvalConfiguration) -> Result<Value> {
        integer_op("<<", a, b, cfg, |x, y| x.wrapping_shl(y as i32 as u32))
    }

    fn shift_right(&self, a: Value, b: Value, cfg: &EvalConfiguration) -> Result<Value> {
        integer_op(">>", a, b, cfg, |x, y| x.wrapping_shr(y as i32 as u32))
    }

    fn bit_and(&self, a: Value, b: Value, cfg: &EvalConfiguration) -> Result<Value> {
        integer_op("&", a, b, cfg, |x, y| x & y)
    }

    fn bit_xor(&self, a: Value, b: Value, cfg: &EvalConfiguration) -> Result<Value> {
        integer_op("^", a, b, cfg, |x, y| x ^ y)
    }

    fn bit_or(&self, a: Value, b: Value, cfg: &EvalConfiguration) -> Result<Value> {
        integer_op("|", a, b, cfg, |x, y| x | y)
    }

    fn less_than(&self, a: Value, b: Value, cfg: &EvalConfiguration) -> Result<Value> {
        compare("<", a, b, cfg).map(|o| Value::Bool(o == Ordering::Less))
    }

    fn less_than_or_equal(&self, a: Value, b: Value, cfg: &EvalConfiguration) -> Result<Value> {
        compare("<=", a, b, cfg).map(|o| Value::Bool(o != Ordering::Greater))
    }

    fn greater_than(&self, a: Value, b: Value, cfg: &EvalConfiguration) -> Result<Value> {
        compare(">", a, b, cfg).map(|o| Value::Bool(o == Ordering::Greater))
    }

    fn greater_than_or_equal(&self, a: Value, b: Value, cfg: &EvalConfiguration) -> Result<Value> {
        compare(">=", a, b, cfg).map(|o| Value::Bool(o != Ordering::Less))
    }

    fn equals(&self, a: Value, b: Value, cfg: &EvalConfiguration) -> Result<Value> {
        Ok(Value::Bool(values_equal(a, b, cfg)))
    }

    fn not_equals(&self, a: Value, b: Value, cfg: &EvalConfiguration) -> Result<Value> {
        Ok(Value::Bool(!values_equal(a, b, cfg)))
    }

    /// Truthiness used by `&&`, `||` and prefix `!`.
    ///
    /// Null is false, strings and arrays are true when non-empty, booleans are
    /// themselves and numbers are true unless equal to zero.
    fn is_truthy(&self, a: &Value, _cfg: &EvalConfiguration) -> bool {
        match a {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::String(s) => !s.is_empty(),
            Value::Array(items) => !items.is_empty(),
            Value::Number(n) => n.compare(&Number::I32(0)) != Ordering::Equal,
        }
    }

    fn logical_not(&self, a: Value, cfg: &EvalConfiguration) -> Result<Value> {
        Ok(Value::Bool(!self.is_truthy(&a, cfg)))
    }

    /// Product of `2..=n` in the operand's own numeric type.
    fn factorial(&self, n: Value, cfg: &EvalConfiguration) -> Result<Value> {
        let n = match optionally_convert_string(n, cfg) {
            Value::Null => return Ok(Value::Null),
            Value::Number(n) => n,
            other => {
                return Err(ExprError::TypeMismatch {
                    op: "!".to_string(),
                    left: other.type_name(),
                    right: "null",
                });
            }
        };
        factorial(n).map(Value::Number)
    }

    /// Applies an operator spelling the default table has no method for.
    ///
    /// `left` is absent for prefix and `right` for suffix applications.
    fn apply_custom(
        &self,
        op: &str,
        _left: Option<Value>,
        _right: Option<Value>,
        _cfg: &EvalConfiguration,
    ) -> Result<Value> {
        Err(ExprError::UnknownOperator { op: op.to_string() })
    }
}

/// The default operation table.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultOperators;

impl Operators for DefaultOperators {}

/// Resolves both operands to numbers, or `None` when either is null.
fn numeric_operands(
    op: &str,
    a: Value,
    b: Value,
    cfg: &EvalConfiguration,
) -> Result<Option<(Number, Number)>> {
    let a = optionally_convert_string(a, cfg);
    let b = optionally_convert_string(b, cfg);
    match (&a, &b) {
        (Value::Number(x), Value::Number(y)) => Ok(Some((*x, *y))),
        (Value::Null, _) | (_, Value::Null) => Ok(None),
        _ => Err(ExprError::TypeMismatch {
            op: op.to_string(),
            left: a.type_name(),
            right: b.type_name(),
        }),
    }
}

fn arithmetic<F>(op: &str, a: Value, b: Value, cfg: &EvalConfiguration, f: F) -> Result<Value>
where
    F: FnOnce(Number, Number) -> Result<Number>,
{
    match numeric_operands(op, a, b, cfg)? {
        Some((x, y)) => f(x, y).map(Value::Number),
        None => Ok(Value::Null),
    }
}

fn integer_op<F>(op: &str, a: Value, b: Value, cfg: &EvalConfiguration, f: F) -> Result<Value>
where
    F: FnOnce(i64, i64) -> i64,
{
    match numeric_operands(op, a, b, cfg)? {
        Some((x, y)) => {
            let result = f(x.to_i64(), y.to_i64());
            Ok(Value::Number(Number::from_i64(cfg.numeric_type, result)))
        }
        None => Ok(Value::Null),
    }
}

/// Numeric strings are parsed when compared against a number.
fn coerce_against_number(a: Value, b: Value, cfg: &EvalConfiguration) -> (Value, Value) {
    match (&a, &b) {
        (Value::String(_), Value::Number(_)) => (optionally_convert_string(a, cfg), b),
        (Value::Number(_), Value::String(_)) => (a, optionally_convert_string(b, cfg)),
        _ => (a, b),
    }
}

fn compare(op: &str, a: Value, b: Value, cfg: &EvalConfiguration) -> Result<Ordering> {
    let (a, b) = coerce_against_number(a, b, cfg);
    match (&a, &b) {
        (Value::Number(x), Value::Number(y)) => Ok(x.compare(y)),
        (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Ok(x.cmp(y)),
        _ => Err(ExprError::TypeMismatch {
            op: op.to_string(),
            left: a.type_name(),
            right: b.type_name(),
        }),
    }
}

fn values_equal(a: Value, b: Value, cfg: &EvalConfiguration) -> bool {
    let (a, b) = coerce_against_number(a, b, cfg);
    match (&a, &b) {
        (Value::Number(x), Value::Number(y)) => x.compare(y) == Ordering::Equal,
        _ => a == b,
    }
}

fn factorial(n: Number) -> Result<Number> {
    let overflow = || ExprError::Overflow {
        op: "!".to_string(),
    };
    match n {
        Number::F32(v) => Ok(Number::F32(float_factorial(v as f64) as f32)),
        Number::F64(v) => Ok(Number::F64(float_factorial(v))),
        Number::I32(v) => {
            let mut acc: i32 = 1;
            for i in 2..=v {
                acc = acc.checked_mul(i).ok_or_else(overflow)?;
            }
            Ok(Number::I32(acc))
        }
        Number::I64(v) => {
            let mut acc: i64 = 1;
            for i in 2..=v {
                acc = acc.checked_mul(i).ok_or_else(overflow)?;
            }
            Ok(Number::I64(acc))
        }
        Number::Decimal(v) => {
            let mut acc = Decimal::ONE;
            let mut i = Decimal::TWO;
            while i <= v {
                acc = acc.checked_mul(i).ok_or_else(overflow)?;
                i += Decimal::ONE;
            }
            Ok(Number::Decimal(acc))
        }
    }
}

/// Products past 170! no longer fit in an `f64`.
fn float_factorial(n: f64) -> f64 {
    if n > 170.0 {
        return f64::INFINITY;
    }
    let mut acc = 1.0;
    let mut i = 2.0;
    while i <= n {
        acc *= i;
        i += 1.0;
    }
    acc
}
