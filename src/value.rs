//! Runtime values produced and consumed by the evaluator.
//!
//! Expressions are dynamically typed: a node evaluates to a [`Value`], which is
//! null, a boolean, a string, an array handed back by a host function, or a
//! [`Number`]. Numbers are a closed set of representations selected by the
//! configuration's [`NumericType`]; every arithmetic and comparison routine is
//! implemented once per representation below, and mixed operands are promoted to
//! a common representation first.

use core::cmp::Ordering;
use core::fmt;

use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};

use crate::error::{ExprError, Result};

/// The numeric representation a configuration evaluates with.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumericType {
    /// 32-bit IEEE float.
    F32,
    /// 64-bit IEEE float (the default).
    F64,
    /// 96-bit fixed-point decimal.
    Decimal,
    /// 32-bit signed integer.
    I32,
    /// 64-bit signed integer.
    I64,
}

impl NumericType {
    /// Whether values of this type can hold fractions, infinities and NaN.
    pub fn is_float(self) -> bool {
        matches!(self, NumericType::F32 | NumericType::F64)
    }

    /// Whether values of this type are whole numbers.
    pub fn is_integer(self) -> bool {
        matches!(self, NumericType::I32 | NumericType::I64)
    }

    /// Promotion rank used when two operands of different types meet.
    fn rank(self) -> u8 {
        match self {
            NumericType::I32 => 0,
            NumericType::I64 => 1,
            NumericType::F32 => 2,
            NumericType::F64 => 3,
            NumericType::Decimal => 4,
        }
    }
}

impl fmt::Display for NumericType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NumericType::F32 => "f32",
            NumericType::F64 => "f64",
            NumericType::Decimal => "decimal",
            NumericType::I32 => "i32",
            NumericType::I64 => "i64",
        };
        f.write_str(name)
    }
}

/// A number in one of the supported representations.
#[derive(Copy, Clone, Debug)]
pub enum Number {
    F32(f32),
    F64(f64),
    Decimal(Decimal),
    I32(i32),
    I64(i64),
}

impl Number {
    /// The representation of this number.
    pub fn numeric_type(&self) -> NumericType {
        match self {
            Number::F32(_) => NumericType::F32,
            Number::F64(_) => NumericType::F64,
            Number::Decimal(_) => NumericType::Decimal,
            Number::I32(_) => NumericType::I32,
            Number::I64(_) => NumericType::I64,
        }
    }

    /// Zero of the given type.
    pub fn zero(target: NumericType) -> Number {
        Number::from_i64(target, 0)
    }

    /// Builds a number of the given type from an integer, wrapping on `i32` overflow.
    pub fn from_i64(target: NumericType, value: i64) -> Number {
        match target {
            NumericType::F32 => Number::F32(value as f32),
            NumericType::F64 => Number::F64(value as f64),
            NumericType::Decimal => Number::Decimal(Decimal::from(value)),
            NumericType::I32 => Number::I32(value as i32),
            NumericType::I64 => Number::I64(value),
        }
    }

    /// Builds a number of the given type from a float.
    ///
    /// Conversions to integer types round half to even; non-finite values have no
    /// integer or decimal representation and fail.
    pub fn from_f64(target: NumericType, value: f64) -> Result<Number> {
        let overflow = || ExprError::NumberFormat {
            text: value.to_string(),
            target,
        };
        match target {
            NumericType::F32 => Ok(Number::F32(value as f32)),
            NumericType::F64 => Ok(Number::F64(value)),
            NumericType::Decimal => Decimal::from_f64(value).map(Number::Decimal).ok_or_else(overflow),
            NumericType::I32 => {
                let rounded = libm::rint(value);
                if rounded.is_finite() && rounded >= i32::MIN as f64 && rounded <= i32::MAX as f64 {
                    Ok(Number::I32(rounded as i32))
                } else {
                    Err(overflow())
                }
            }
            NumericType::I64 => {
                let rounded = libm::rint(value);
                if rounded.is_finite() && rounded >= i64::MIN as f64 && rounded <= i64::MAX as f64 {
                    Ok(Number::I64(rounded as i64))
                } else {
                    Err(overflow())
                }
            }
        }
    }

    /// Lossy conversion to `f64`.
    pub fn to_f64(&self) -> f64 {
        match *self {
            Number::F32(v) => v as f64,
            Number::F64(v) => v,
            Number::Decimal(v) => v.to_f64().unwrap_or(f64::NAN),
            Number::I32(v) => v as f64,
            Number::I64(v) => v as f64,
        }
    }

    /// Truncating conversion to `i64`, as used by the shift and bitwise operators.
    ///
    /// Fractions are dropped toward zero, out-of-range floats saturate and NaN is zero.
    pub fn to_i64(&self) -> i64 {
        match *self {
            Number::F32(v) => v as i64,
            Number::F64(v) => v as i64,
            Number::Decimal(v) => v.trunc().to_i64().unwrap_or(if v.is_sign_negative() {
                i64::MIN
            } else {
                i64::MAX
            }),
            Number::I32(v) => v as i64,
            Number::I64(v) => v,
        }
    }

    /// Converts this number to another representation.
    pub fn cast(&self, target: NumericType) -> Result<Number> {
        if self.numeric_type() == target {
            return Ok(*self);
        }
        match (*self, target) {
            (Number::I32(v), _) => Ok(Number::from_i64(target, v as i64)),
            (Number::I64(v), NumericType::I32) => i32::try_from(v).map(Number::I32).map_err(|_| {
                ExprError::NumberFormat {
                    text: v.to_string(),
                    target,
                }
            }),
            (Number::I64(v), _) => Ok(Number::from_i64(target, v)),
            (Number::Decimal(v), NumericType::I32 | NumericType::I64) => {
                let rounded = v.round();
                let converted = match target {
                    NumericType::I32 => rounded.to_i32().map(Number::I32),
                    _ => rounded.to_i64().map(Number::I64),
                };
                converted.ok_or_else(|| ExprError::NumberFormat {
                    text: v.to_string(),
                    target,
                })
            }
            _ => Number::from_f64(target, self.to_f64()),
        }
    }

    /// Whether this number equals zero of its own type.
    pub fn is_zero(&self) -> bool {
        match *self {
            Number::F32(v) => v == 0.0,
            Number::F64(v) => v == 0.0,
            Number::Decimal(v) => v.is_zero(),
            Number::I32(v) => v == 0,
            Number::I64(v) => v == 0,
        }
    }

    /// Whether this number is NaN.
    pub fn is_nan(&self) -> bool {
        match *self {
            Number::F32(v) => v.is_nan(),
            Number::F64(v) => v.is_nan(),
            _ => false,
        }
    }

    /// Promotes two numbers to a shared representation.
    fn unify(self, other: Number) -> Result<(Number, Number)> {
        let (a, b) = (self.numeric_type(), other.numeric_type());
        if a == b {
            return Ok((self, other));
        }
        let target = if a.rank() >= b.rank() { a } else { b };
        Ok((self.cast(target)?, other.cast(target)?))
    }

    pub fn checked_add(self, other: Number) -> Result<Number> {
        match self.unify(other)? {
            (Number::F32(a), Number::F32(b)) => Ok(Number::F32(a + b)),
            (Number::F64(a), Number::F64(b)) => Ok(Number::F64(a + b)),
            (Number::Decimal(a), Number::Decimal(b)) => a
                .checked_add(b)
                .map(Number::Decimal)
                .ok_or_else(|| overflow("+")),
            (Number::I32(a), Number::I32(b)) => Ok(Number::I32(a.wrapping_add(b))),
            (Number::I64(a), Number::I64(b)) => Ok(Number::I64(a.wrapping_add(b))),
            _ => unreachable!("unify returns matching representations"),
        }
    }

    pub fn checked_sub(self, other: Number) -> Result<Number> {
        match self.unify(other)? {
            (Number::F32(a), Number::F32(b)) => Ok(Number::F32(a - b)),
            (Number::F64(a), Number::F64(b)) => Ok(Number::F64(a - b)),
            (Number::Decimal(a), Number::Decimal(b)) => a
                .checked_sub(b)
                .map(Number::Decimal)
                .ok_or_else(|| overflow("-")),
            (Number::I32(a), Number::I32(b)) => Ok(Number::I32(a.wrapping_sub(b))),
            (Number::I64(a), Number::I64(b)) => Ok(Number::I64(a.wrapping_sub(b))),
            _ => unreachable!("unify returns matching representations"),
        }
    }

    pub fn checked_mul(self, other: Number) -> Result<Number> {
        match self.unify(other)? {
            (Number::F32(a), Number::F32(b)) => Ok(Number::F32(a * b)),
            (Number::F64(a), Number::F64(b)) => Ok(Number::F64(a * b)),
            (Number::Decimal(a), Number::Decimal(b)) => a
                .checked_mul(b)
                .map(Number::Decimal)
                .ok_or_else(|| overflow("*")),
            (Number::I32(a), Number::I32(b)) => Ok(Number::I32(a.wrapping_mul(b))),
            (Number::I64(a), Number::I64(b)) => Ok(Number::I64(a.wrapping_mul(b))),
            _ => unreachable!("unify returns matching representations"),
        }
    }

    pub fn checked_div(self, other: Number) -> Result<Number> {
        match self.unify(other)? {
            (Number::F32(a), Number::F32(b)) => Ok(Number::F32(a / b)),
            (Number::F64(a), Number::F64(b)) => Ok(Number::F64(a / b)),
            (Number::Decimal(a), Number::Decimal(b)) => {
                if b.is_zero() {
                    return Err(ExprError::DivideByZero);
                }
                a.checked_div(b).map(Number::Decimal).ok_or_else(|| overflow("/"))
            }
            (Number::I32(a), Number::I32(b)) => match b {
                0 => Err(ExprError::DivideByZero),
                _ => Ok(Number::I32(a.wrapping_div(b))),
            },
            (Number::I64(a), Number::I64(b)) => match b {
                0 => Err(ExprError::DivideByZero),
                _ => Ok(Number::I64(a.wrapping_div(b))),
            },
            _ => unreachable!("unify returns matching representations"),
        }
    }

    pub fn checked_rem(self, other: Number) -> Result<Number> {
        match self.unify(other)? {
            (Number::F32(a), Number::F32(b)) => Ok(Number::F32(a % b)),
            (Number::F64(a), Number::F64(b)) => Ok(Number::F64(a % b)),
            (Number::Decimal(a), Number::Decimal(b)) => {
                if b.is_zero() {
                    return Err(ExprError::DivideByZero);
                }
                a.checked_rem(b).map(Number::Decimal).ok_or_else(|| overflow("%"))
            }
            (Number::I32(a), Number::I32(b)) => match b {
                0 => Err(ExprError::DivideByZero),
                _ => Ok(Number::I32(a.wrapping_rem(b))),
            },
            (Number::I64(a), Number::I64(b)) => match b {
                0 => Err(ExprError::DivideByZero),
                _ => Ok(Number::I64(a.wrapping_rem(b))),
            },
            _ => unreachable!("unify returns matching representations"),
        }
    }

    /// Absolute value, keeping the representation.
    pub fn abs(self) -> Number {
        match self {
            Number::F32(v) => Number::F32(v.abs()),
            Number::F64(v) => Number::F64(v.abs()),
            Number::Decimal(v) => Number::Decimal(v.abs()),
            Number::I32(v) => Number::I32(v.wrapping_abs()),
            Number::I64(v) => Number::I64(v.wrapping_abs()),
        }
    }

    /// -1, 0 or 1 as an integer.
    pub fn signum(self) -> i64 {
        match self.compare(&Number::I32(0)) {
            Ordering::Less => -1,
            Ordering::Equal => 0,
            Ordering::Greater => 1,
        }
    }

    /// Total ordering across representations.
    ///
    /// NaN sorts below every other number and equal to itself.
    pub fn compare(&self, other: &Number) -> Ordering {
        match self.unify(*other) {
            Ok((Number::Decimal(a), Number::Decimal(b))) => a.cmp(&b),
            Ok((Number::I32(a), Number::I32(b))) => a.cmp(&b),
            Ok((Number::I64(a), Number::I64(b))) => a.cmp(&b),
            _ => compare_floats(self.to_f64(), other.to_f64()),
        }
    }
}

fn compare_floats(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

fn overflow(op: &str) -> ExprError {
    ExprError::Overflow { op: op.to_string() }
}

impl PartialEq for Number {
    fn eq(&self, other: &Number) -> bool {
        if self.is_nan() || other.is_nan() {
            return false;
        }
        self.compare(other) == Ordering::Equal
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::F32(v) => write!(f, "{}", v),
            Number::F64(v) => write!(f, "{}", v),
            Number::Decimal(v) => write!(f, "{}", v.normalize()),
            Number::I32(v) => write!(f, "{}", v),
            Number::I64(v) => write!(f, "{}", v),
        }
    }
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Number::F64(value)
    }
}

impl From<f32> for Number {
    fn from(value: f32) -> Self {
        Number::F32(value)
    }
}

impl From<i32> for Number {
    fn from(value: i32) -> Self {
        Number::I32(value)
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Number::I64(value)
    }
}

impl From<Decimal> for Number {
    fn from(value: Decimal) -> Self {
        Number::Decimal(value)
    }
}

/// A dynamically typed expression value.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Value {
    /// Absent value: unresolved identifiers and empty call arguments.
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    /// A collection returned by a host function.
    Array(Vec<Value>),
}

impl Value {
    /// Short type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The number as `f64`, if this is a number.
    pub fn as_f64(&self) -> Option<f64> {
        self.as_number().map(|n| n.to_f64())
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => f.write_str(s),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Number> for Value {
    fn from(value: Number) -> Self {
        Value::Number(value)
    }
}

macro_rules! value_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::Number(Number::from(value))
                }
            }
        )*
    };
}

value_from_number!(f32, f64, i32, i64, Decimal);

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::Array(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    #[test]
    fn test_mixed_promotion() {
        let sum = Number::I32(2).checked_add(Number::F64(0.5)).unwrap();
        assert_eq!(sum.numeric_type(), NumericType::F64);
        assert_eq!(sum.to_f64(), 2.5);

        let sum = Number::I32(2).checked_add(Number::I64(3)).unwrap();
        assert!(matches!(sum, Number::I64(5)));

        let d = Decimal::from_str("0.1").unwrap();
        let sum = Number::Decimal(d).checked_add(Number::I64(1)).unwrap();
        assert_eq!(sum, Number::Decimal(Decimal::from_str("1.1").unwrap()));
    }

    #[test]
    fn test_integer_division() {
        assert!(matches!(
            Number::I32(7).checked_div(Number::I32(2)).unwrap(),
            Number::I32(3)
        ));
        assert_eq!(
            Number::I64(1).checked_div(Number::I64(0)).unwrap_err(),
            ExprError::DivideByZero
        );
        assert_eq!(
            Number::I32(1).checked_rem(Number::I32(0)).unwrap_err(),
            ExprError::DivideByZero
        );
        assert!(
            Number::F64(1.0)
                .checked_div(Number::F64(0.0))
                .unwrap()
                .to_f64()
                .is_infinite()
        );
    }

    #[test]
    fn test_nan_ordering() {
        let nan = Number::F64(f64::NAN);
        assert_eq!(nan.compare(&Number::F64(1.0)), Ordering::Less);
        assert_eq!(Number::F64(1.0).compare(&nan), Ordering::Greater);
        assert_ne!(nan, nan);
    }

    #[test]
    fn test_float_to_integer_rounds_half_even() {
        assert!(matches!(
            Number::from_f64(NumericType::I32, 2.5).unwrap(),
            Number::I32(2)
        ));
        assert!(matches!(
            Number::from_f64(NumericType::I64, 3.5).unwrap(),
            Number::I64(4)
        ));
        assert!(Number::from_f64(NumericType::I32, f64::INFINITY).is_err());
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::from(58.3).to_string(), "58.3");
        assert_eq!(Value::from(5.0).to_string(), "5");
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(
            Value::Array(vec![Value::from(1i32), Value::from("a")]).to_string(),
            "[1, a]"
        );
    }
}
