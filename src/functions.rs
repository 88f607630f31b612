//! Built-in constants and mathematical functions.
//!
//! These tables become a configuration's generic constants and functions.
//! Instance constants and functions of the same name shadow them.
//!
//! The transcendental functions use the `libm` crate, computing in double
//! precision and converting the result to the configured numeric type.
//! `ABS`, `SIGN` and the rounding family keep decimal arguments exact.
//! String arguments are parsed with
//! [`optionally_convert_string`], so `SQRT('2,25')` is `1.5`.

use core::cmp::Ordering;
use core::f64::consts;
use std::collections::HashMap;

use crate::context::{EvalConfiguration, EvalFunction};
use crate::conversion::optionally_convert_string;
use crate::error::{ExprError, Result};
use crate::eval::args::FunctionArgs;
use crate::value::{Number, NumericType, Value};

/// Default generic constants for a numeric type.
///
/// Float configurations get every constant in their own type. Decimal
/// configurations get the finite ones as decimals. Integer configurations
/// keep them as `f64` so that `2 * PI` still promotes to a float.
///
/// # Parameters
///
/// * `numeric_type` - The representation of the configuration the table is for
pub fn default_constants(numeric_type: NumericType) -> HashMap<String, Value> {
    let numbers = [
        ("PI", consts::PI),
        ("PI_2", consts::FRAC_PI_2),
        ("LOG2E", consts::LOG2_E),
        ("DEG", consts::PI / 180.0),
        ("E", consts::E),
        ("INFINITY", f64::INFINITY),
        ("NAN", f64::NAN),
    ];

    let mut table = HashMap::new();
    for (name, value) in numbers {
        let number = match numeric_type {
            NumericType::I32 | NumericType::I64 => Some(Number::F64(value)),
            other => Number::from_f64(other, value).ok(),
        };
        if let Some(number) = number {
            table.insert(name.to_string(), Value::Number(number));
        }
    }
    table.insert("TRUE".to_string(), Value::Bool(true));
    table.insert("FALSE".to_string(), Value::Bool(false));
    table
}

/// Default generic functions.
pub fn default_functions() -> HashMap<String, EvalFunction> {
    let mut table = HashMap::new();
    let mut add = |name: &str, function: EvalFunction| {
        table.insert(name.to_string(), function);
    };

    add("ABS", EvalFunction::new(abs));
    add("ACOS", unary(libm::acos));
    add("ASIN", unary(libm::asin));
    add("ATAN", unary(libm::atan));
    add("ATAN2", binary(libm::atan2));
    add("CEILING", rounding(libm::ceil, |d| d.ceil()));
    add("COS", unary(libm::cos));
    add("COSH", unary(libm::cosh));
    add("EXP", unary(libm::exp));
    add("FLOOR", rounding(libm::floor, |d| d.floor()));
    add("LOG", EvalFunction::new(log));
    add("LOG2", unary(libm::log2));
    add("LOG10", unary(libm::log10));
    add("MAX", EvalFunction::new(|cfg, args| extremum(cfg, args, Ordering::Greater)));
    add("MIN", EvalFunction::new(|cfg, args| extremum(cfg, args, Ordering::Less)));
    add("POW", binary(libm::pow));
    add("ROUND", rounding(libm::rint, |d| d.round()));
    add("SIGN", EvalFunction::new(sign));
    add("SIN", unary(libm::sin));
    add("SINH", unary(libm::sinh));
    add("SQRT", unary(libm::sqrt));
    add("TAN", unary(libm::tan));
    add("TANH", unary(libm::tanh));
    add("TRUNCATE", rounding(libm::trunc, |d| d.trunc()));

    table
}

/// Reads argument `index` as a number.
///
/// Null reads as zero and booleans as one or zero.
fn number_arg(cfg: &EvalConfiguration, args: &FunctionArgs<'_>, index: usize) -> Result<Number> {
    match optionally_convert_string(args.get(index)?, cfg) {
        Value::Number(n) => Ok(n),
        Value::Null => Ok(cfg.zero()),
        Value::Bool(b) => Ok(Number::from_i64(cfg.numeric_type, b as i64)),
        other => Err(ExprError::InvalidArgument {
            message: format!("argument {} is a {}, expected a number", index + 1, other.type_name()),
        }),
    }
}

fn float_result(cfg: &EvalConfiguration, value: f64) -> Result<Value> {
    Number::from_f64(cfg.numeric_type, value).map(Value::Number)
}

fn unary(f: fn(f64) -> f64) -> EvalFunction {
    EvalFunction::new(move |cfg, args| {
        let x = number_arg(cfg, args, 0)?.to_f64();
        float_result(cfg, f(x))
    })
}

fn binary(f: fn(f64, f64) -> f64) -> EvalFunction {
    EvalFunction::new(move |cfg, args| {
        let x = number_arg(cfg, args, 0)?.to_f64();
        let y = number_arg(cfg, args, 1)?.to_f64();
        float_result(cfg, f(x, y))
    })
}

/// Rounding-family function: decimals stay exact, integers are already whole.
fn rounding(
    float: fn(f64) -> f64,
    decimal: fn(&rust_decimal::Decimal) -> rust_decimal::Decimal,
) -> EvalFunction {
    EvalFunction::new(move |cfg, args| {
        let rounded = match number_arg(cfg, args, 0)? {
            Number::Decimal(d) => Number::Decimal(decimal(&d)),
            n @ (Number::I32(_) | Number::I64(_)) => n,
            n => Number::F64(float(n.to_f64())),
        };
        rounded.cast(cfg.numeric_type).map(Value::Number)
    })
}

fn abs(cfg: &EvalConfiguration, args: &FunctionArgs<'_>) -> Result<Value> {
    number_arg(cfg, args, 0)?
        .abs()
        .cast(cfg.numeric_type)
        .map(Value::Number)
}

fn sign(cfg: &EvalConfiguration, args: &FunctionArgs<'_>) -> Result<Value> {
    let n = number_arg(cfg, args, 0)?;
    if n.is_nan() {
        return Err(ExprError::InvalidArgument {
            message: "SIGN of NaN".to_string(),
        });
    }
    Ok(Value::Number(Number::from_i64(cfg.numeric_type, n.signum())))
}

/// Natural logarithm, or logarithm in the base given as second argument.
fn log(cfg: &EvalConfiguration, args: &FunctionArgs<'_>) -> Result<Value> {
    let x = number_arg(cfg, args, 0)?.to_f64();
    if args.len() == 2 {
        let base = number_arg(cfg, args, 1)?.to_f64();
        return float_result(cfg, libm::log(x) / libm::log(base));
    }
    float_result(cfg, libm::log(x))
}

/// Shared body of `MAX` and `MIN`: null when called without arguments or
/// when any argument is null.
fn extremum(cfg: &EvalConfiguration, args: &FunctionArgs<'_>, keep: Ordering) -> Result<Value> {
    let mut best: Option<Value> = None;
    for value in args.values()? {
        let value = optionally_convert_string(value, cfg);
        if value.is_null() {
            return Ok(Value::Null);
        }
        best = match best {
            None => Some(value),
            Some(current) => {
                let ordering = match (&value, &current) {
                    (Value::Number(a), Value::Number(b)) => a.compare(b),
                    (Value::String(a), Value::String(b)) => a.cmp(b),
                    (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
                    _ => {
                        return Err(ExprError::InvalidArgument {
                            message: format!(
                                "cannot compare {} with {}",
                                value.type_name(),
                                current.type_name()
                            ),
                        });
                    }
                };
                Some(if ordering == keep { value } else { current })
            }
        };
    }
    Ok(best.unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_approx_eq;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn call(cfg: &EvalConfiguration, name: &str, args: Vec<Value>) -> Result<Value> {
        let function = cfg.function(name).expect("function should exist");
        let body = function.sync_body().expect("sync body");
        body(cfg, &FunctionArgs::Eager(args))
    }

    #[test]
    fn test_default_constants_per_type() {
        let doubles = default_constants(NumericType::F64);
        assert_eq!(doubles["PI"], Value::from(consts::PI));
        assert_eq!(doubles["TRUE"], Value::Bool(true));
        assert!(doubles["NAN"].as_f64().unwrap().is_nan());

        let decimals = default_constants(NumericType::Decimal);
        assert!(matches!(decimals["E"], Value::Number(Number::Decimal(_))));
        assert!(!decimals.contains_key("INFINITY"));

        let ints = default_constants(NumericType::I32);
        assert!(matches!(ints["PI"], Value::Number(Number::F64(_))));
    }

    #[test]
    fn test_math_functions() {
        let cfg = EvalConfiguration::double();
        let v = call(&cfg, "SQRT", vec![Value::from(16.0)]).unwrap();
        assert_eq!(v, Value::from(4.0));
        let v = call(&cfg, "LOG", vec![Value::from(8.0), Value::from(2.0)]).unwrap();
        assert_approx_eq!(v.as_f64().unwrap(), 3.0, 1e-12);
        let v = call(&cfg, "ATAN2", vec![Value::from(1.0), Value::from(1.0)]).unwrap();
        assert_approx_eq!(v.as_f64().unwrap(), consts::FRAC_PI_4, 1e-12);
        let v = call(&cfg, "SQRT", vec![Value::from("2,25")]).unwrap();
        assert_eq!(v, Value::from(1.5));
        assert!(call(&cfg, "SQRT", vec![]).is_err());
        assert!(call(&cfg, "COS", vec![Value::from("abc")]).is_err());
    }

    #[test]
    fn test_round_is_bankers() {
        let cfg = EvalConfiguration::double();
        assert_eq!(call(&cfg, "ROUND", vec![Value::from(2.5)]).unwrap(), Value::from(2.0));
        assert_eq!(call(&cfg, "ROUND", vec![Value::from(3.5)]).unwrap(), Value::from(4.0));
        assert_eq!(call(&cfg, "TRUNCATE", vec![Value::from(-3.7)]).unwrap(), Value::from(-3.0));

        let cfg = EvalConfiguration::decimal();
        let d = Value::from(Decimal::from_str("2.5").unwrap());
        assert_eq!(call(&cfg, "ROUND", vec![d.clone()]).unwrap(), Value::from(Decimal::TWO));
        assert_eq!(call(&cfg, "CEILING", vec![d.clone()]).unwrap(), Value::from(Decimal::from(3)));
        assert_eq!(call(&cfg, "FLOOR", vec![d]).unwrap(), Value::from(Decimal::TWO));
    }

    #[test]
    fn test_max_min() {
        let cfg = EvalConfiguration::double();
        let args = vec![Value::from(1.0), Value::from(5.0), Value::from(8.7)];
        assert_eq!(call(&cfg, "MAX", args.clone()).unwrap(), Value::from(8.7));
        assert_eq!(call(&cfg, "MIN", args).unwrap(), Value::from(1.0));
        assert_eq!(call(&cfg, "MAX", vec![]).unwrap(), Value::Null);
        assert_eq!(
            call(&cfg, "MIN", vec![Value::from(1.0), Value::Null]).unwrap(),
            Value::Null
        );
        assert_eq!(
            call(&cfg, "MAX", vec![Value::from("3"), Value::from(2.0)]).unwrap(),
            Value::from(3.0)
        );
    }

    #[test]
    fn test_abs_and_sign_keep_type() {
        let cfg = EvalConfiguration::int64();
        assert_eq!(call(&cfg, "ABS", vec![Value::from(-7i64)]).unwrap(), Value::from(7i64));
        assert!(matches!(
            call(&cfg, "SIGN", vec![Value::from(-7i64)]).unwrap(),
            Value::Number(Number::I64(-1))
        ));
        let cfg = EvalConfiguration::double();
        assert!(call(&cfg, "SIGN", vec![Value::from(f64::NAN)]).is_err());
    }
}
