//! Text to number conversion.
//!
//! Strings reaching arithmetic may come from hosts in any locale. When the
//! configuration carries no explicit [`NumberFormat`], the decimal separator is
//! guessed from the position and count of commas and periods in the text.

use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::context::EvalConfiguration;
use crate::error::{ExprError, Result};
use crate::value::{Number, NumericType, Value};

/// Which character separates the integer part from the fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecimalSeparator {
    Period,
    Comma,
}

/// Decimal and digit-group separators used to read numeric text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NumberFormat {
    pub decimal_separator: char,
    pub group_separator: char,
}

impl NumberFormat {
    /// `1,234.5`
    pub const INVARIANT: NumberFormat = NumberFormat {
        decimal_separator: '.',
        group_separator: ',',
    };

    /// `1.234,5`
    pub const COMMA_DECIMAL: NumberFormat = NumberFormat {
        decimal_separator: ',',
        group_separator: '.',
    };
}

impl Default for NumberFormat {
    fn default() -> Self {
        NumberFormat::INVARIANT
    }
}

impl From<DecimalSeparator> for NumberFormat {
    fn from(separator: DecimalSeparator) -> Self {
        match separator {
            DecimalSeparator::Period => NumberFormat::INVARIANT,
            DecimalSeparator::Comma => NumberFormat::COMMA_DECIMAL,
        }
    }
}

/// Guesses the decimal separator of a numeric string.
///
/// The rules are tried in order on the trimmed text:
///
/// 1. Both `,` and `.` present: the later one is the decimal separator.
/// 2. More than one `,`: commas group thousands, period is decimal.
/// 3. More than one `.`: periods group thousands, comma is decimal.
/// 4. A single `,` in text whose unsigned length is below 5 or above 7: comma.
/// 5. A single `.` under the same length test: period.
/// 6. A single `,` not exactly four characters from the end: comma.
/// 7. A single `.` not exactly four characters from the end: period.
/// 8. Otherwise period, unless `ambiguous_as_thousands` is set, in which case
///    the remaining separator is read as digit grouping.
///
/// # Examples
///
/// ```
/// use exp_eval::conversion::{guess_decimal_separator, DecimalSeparator};
///
/// assert_eq!(guess_decimal_separator("1.234,5", false), DecimalSeparator::Comma);
/// assert_eq!(guess_decimal_separator("12,5", false), DecimalSeparator::Comma);
/// assert_eq!(guess_decimal_separator("1,234", false), DecimalSeparator::Period);
/// assert_eq!(guess_decimal_separator("1.234", true), DecimalSeparator::Comma);
/// ```
pub fn guess_decimal_separator(text: &str, ambiguous_as_thousands: bool) -> DecimalSeparator {
    let s = text.trim();
    let first_comma = s.find(',');
    let last_comma = s.rfind(',');
    let first_period = s.find('.');
    let last_period = s.rfind('.');

    let unsigned_len = if s.starts_with(['-', '+']) {
        s.len() - 1
    } else {
        s.len()
    };
    let implausible_grouping = !(5..=7).contains(&unsigned_len);
    let thousands_slot = s.len().checked_sub(4);

    match (last_comma, last_period) {
        (Some(comma), Some(period)) => {
            if comma > period {
                DecimalSeparator::Comma
            } else {
                DecimalSeparator::Period
            }
        }
        _ if first_comma != last_comma => DecimalSeparator::Period,
        _ if first_period != last_period => DecimalSeparator::Comma,
        (Some(_), None) if implausible_grouping => DecimalSeparator::Comma,
        (None, Some(_)) if implausible_grouping => DecimalSeparator::Period,
        (Some(comma), None) if Some(comma) != thousands_slot => DecimalSeparator::Comma,
        (None, Some(period)) if Some(period) != thousands_slot => DecimalSeparator::Period,
        (None, Some(_)) if ambiguous_as_thousands => DecimalSeparator::Comma,
        _ => DecimalSeparator::Period,
    }
}

struct NumberParts {
    negative: bool,
    integer: String,
    fraction: String,
    exponent: Option<i64>,
}

impl NumberParts {
    fn canonical(&self) -> String {
        let mut out = String::new();
        if self.negative {
            out.push('-');
        }
        if self.integer.is_empty() {
            out.push('0');
        } else {
            out.push_str(&self.integer);
        }
        if !self.fraction.is_empty() {
            out.push('.');
            out.push_str(&self.fraction);
        }
        if let Some(exp) = self.exponent {
            out.push('e');
            out.push_str(&exp.to_string());
        }
        out
    }
}

/// Splits numeric text into sign, digits and exponent.
///
/// Group separators are accepted anywhere in the integer part. At least one
/// mantissa digit is required, and an exponent marker must be followed by digits.
fn split_number(text: &str, format: NumberFormat) -> Option<NumberParts> {
    let s = text.trim();
    let mut chars = s.chars().peekable();
    let mut negative = false;
    if let Some(&sign @ ('-' | '+')) = chars.peek() {
        negative = sign == '-';
        chars.next();
    }

    let mut integer = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_ascii_digit() {
            integer.push(c);
        } else if c == format.group_separator && !integer.is_empty() {
            // grouping
        } else {
            break;
        }
        chars.next();
    }

    let mut fraction = String::new();
    if chars.peek() == Some(&format.decimal_separator) {
        chars.next();
        while let Some(&c) = chars.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            fraction.push(c);
            chars.next();
        }
    }
    if integer.is_empty() && fraction.is_empty() {
        return None;
    }

    let mut exponent = None;
    if matches!(chars.peek(), Some('e' | 'E')) {
        chars.next();
        let mut exp_text = String::new();
        if let Some(&sign @ ('-' | '+')) = chars.peek() {
            exp_text.push(sign);
            chars.next();
        }
        let mut digits = 0;
        while let Some(&c) = chars.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            exp_text.push(c);
            digits += 1;
            chars.next();
        }
        if digits == 0 {
            return None;
        }
        exponent = Some(exp_text.parse::<i64>().ok()?);
    }

    if chars.next().is_some() {
        return None;
    }
    Some(NumberParts {
        negative,
        integer,
        fraction,
        exponent,
    })
}

fn parse_decimal(parts: &NumberParts) -> Option<Decimal> {
    let canonical = parts.canonical();
    match parts.exponent {
        Some(_) => Decimal::from_scientific(&canonical).ok(),
        None => Decimal::from_str(&canonical).ok(),
    }
}

/// Parses numeric text into a number of the requested type.
///
/// Integer targets accept fractional or exponent notation only when the value
/// is whole. Returns `None` for anything that is not a number in `format`.
///
/// ```
/// use exp_eval::conversion::{parse_number_text, NumberFormat};
/// use exp_eval::value::{Number, NumericType};
///
/// let n = parse_number_text("1.234,5", NumberFormat::COMMA_DECIMAL, NumericType::F64);
/// assert_eq!(n, Some(Number::F64(1234.5)));
/// assert_eq!(parse_number_text("abc", NumberFormat::INVARIANT, NumericType::F64), None);
/// ```
pub fn parse_number_text(text: &str, format: NumberFormat, target: NumericType) -> Option<Number> {
    let parts = split_number(text, format)?;
    let canonical = parts.canonical();
    match target {
        NumericType::F64 => canonical.parse::<f64>().ok().map(Number::F64),
        NumericType::F32 => canonical.parse::<f32>().ok().map(Number::F32),
        NumericType::Decimal => parse_decimal(&parts).map(Number::Decimal),
        NumericType::I32 | NumericType::I64 => {
            let whole = if parts.fraction.is_empty() && parts.exponent.is_none() {
                canonical.parse::<i64>().ok()
            } else {
                let d = parse_decimal(&parts)?;
                if d.fract().is_zero() { d.to_i64() } else { None }
            }?;
            match target {
                NumericType::I32 => i32::try_from(whole).ok().map(Number::I32),
                _ => Some(Number::I64(whole)),
            }
        }
    }
}

/// Converts a numeric literal from the expression source.
///
/// Literals always use `.` as the decimal point, whatever number format the
/// configuration applies to strings.
pub fn parse_literal(text: &str, cfg: &EvalConfiguration) -> Result<Number> {
    parse_number_text(text, NumberFormat::INVARIANT, cfg.numeric_type).ok_or_else(|| {
        ExprError::NumberFormat {
            text: text.to_string(),
            target: cfg.numeric_type,
        }
    })
}

/// Turns a numeric string into a number, leaving everything else untouched.
///
/// Only engages when the configuration's `auto_parse_numeric_strings` flag is
/// on. Strings are parsed with the explicit number format if one is set,
/// otherwise with the guessed separator. Integer configurations fall back to
/// `f64` for strings holding a fraction.
pub fn optionally_convert_string(value: Value, cfg: &EvalConfiguration) -> Value {
    let Value::String(text) = &value else {
        return value;
    };
    if !cfg.auto_parse_numeric_strings {
        return value;
    }
    let format = cfg.number_format.unwrap_or_else(|| {
        guess_decimal_separator(text, cfg.ambiguous_separator_as_thousands).into()
    });
    let parsed = parse_number_text(text, format, cfg.numeric_type).or_else(|| {
        if cfg.numeric_type.is_integer() {
            parse_number_text(text, format, NumericType::F64)
        } else {
            None
        }
    });
    match parsed {
        Some(number) => Value::Number(number),
        None => value,
    }
}
