#![doc = r#"
# exp-eval

A configurable expression compiler and evaluator.

## Overview

exp-eval turns text such as `x * 27 + (8>>2) / x` into an immutable tree once
and evaluates it as often as needed, synchronously or asynchronously, under a
runtime configuration that supplies constants, functions and the semantics of
every operator.

Key features:
- Operator grammar as data: precedence tiers, right-associative, prefix and
  suffix spellings, identifier characters, loadable with serde
- Numeric type chosen per configuration: `f32`, `f64`, decimal, `i32`, `i64`
- Dynamically typed values: numbers, strings, booleans, null
- Host functions with eager or lazy arguments, sync or async bodies
- Constant providers consulted before the constant tables
- Cooperative cancellation of asynchronous evaluation
- Locale-tolerant parsing of numeric strings (`'1.234,5'`, `'2,25'`)

## Quick Start

```rust
use std::sync::Arc;
use exp_eval::context::EvalConfiguration;
use exp_eval::engine::execute;
use exp_eval::value::Value;

let cfg = Arc::new(EvalConfiguration::double());

assert_eq!(execute("12+45*10", &cfg).unwrap(), Value::from(462.0));
assert_eq!(execute("max(1, 5, 8.7)", &cfg).unwrap(), Value::from(8.7));
assert_eq!(execute("'5' + 5", &cfg).unwrap(), Value::from("55"));
assert_eq!(execute("'5' * 5", &cfg).unwrap(), Value::from(25.0));
```

## Compile Once, Execute Many Times

```rust
use std::sync::Arc;
use exp_eval::context::EvalConfiguration;
use exp_eval::engine::compile;
use exp_eval::value::Value;

let cfg = Arc::new(EvalConfiguration::double());
let mut expr = compile("rate * hours", &cfg).unwrap();

for hours in 1..=3 {
    expr.set_constant("rate", 12.5);
    expr.set_constant("hours", hours as f64);
    assert_eq!(expr.execute().unwrap(), Value::from(12.5 * hours as f64));
}

let names: Vec<_> = expr.variables().into_iter().map(|v| v.name).collect();
assert_eq!(names, ["rate", "hours"]);
```

## Lazy Functions

A lazy function receives thunks and decides which arguments to evaluate:

```rust
use std::sync::Arc;
use exp_eval::context::{EvalConfiguration, EvalFunction};
use exp_eval::engine::execute;
use exp_eval::value::Value;

let mut cfg = EvalConfiguration::int32();
cfg.set_function("IF", EvalFunction::lazy(|cfg, args| {
    let condition = args.get(0)?;
    if cfg.operators.is_truthy(&condition, cfg) { args.get(1) } else { args.get(2) }
}));

// the division by zero is never evaluated
let result = execute("IF(1 < 2, 7, 1/0)", &Arc::new(cfg)).unwrap();
assert_eq!(result.as_f64(), Some(7.0));
```

## Asynchronous Evaluation

```rust
use std::sync::Arc;
use exp_eval::context::{EvalConfiguration, EvalFunction};
use exp_eval::engine::compile;
use exp_eval::value::Value;
use futures::executor::block_on;
use tokio_util::sync::CancellationToken;

let mut cfg = EvalConfiguration::double();
cfg.set_function("fetch", EvalFunction::new_async(|_cancel, _cfg, args| async move {
    let id = args.get(0).await?.as_f64().unwrap_or(0.0);
    Ok(Value::from(id * 100.0))
}));

let expr = compile("fetch(3) + 1", &Arc::new(cfg)).unwrap();
let cancel = CancellationToken::new();
assert_eq!(block_on(expr.execute_async(&cancel)).unwrap(), Value::from(301.0));
```

## Error Handling

```rust
use std::sync::Arc;
use exp_eval::context::EvalConfiguration;
use exp_eval::engine::execute;
use exp_eval::error::ExprError;

let cfg = Arc::new(EvalConfiguration::int32());

match execute("2 + * 3", &cfg) {
    Err(ExprError::Syntax { position, .. }) => assert_eq!(position, Some(4)),
    other => panic!("unexpected: {:?}", other),
}
assert_eq!(execute("(1 + 2", &cfg), Err(ExprError::UnmatchedParenthesis { position: 0 }));
assert_eq!(execute("1 / 0", &cfg), Err(ExprError::DivideByZero));
assert_eq!(
    execute("nothing(1)", &cfg),
    Err(ExprError::UnknownFunction { name: "nothing".to_string() })
);
```

## Default Grammar

From lowest to highest precedence:

| Tier | Operators                   | Notes                              |
|------|-----------------------------|------------------------------------|
| 1    | `\|\|`                      | returns the deciding operand       |
| 2    | `&&`                        | returns the deciding operand       |
| 3    | `\|`                        | bitwise or                         |
| 4    | `^`                         | bitwise xor                        |
| 5    | `&`                         | bitwise and                        |
| 6    | `==` `=` `!=` `<>`          | equality                           |
| 7    | `<` `<=` `>` `>=`           | ordering                           |
| 8    | `<<` `>>`                   | shifts                             |
| 9    | `+` `-`                     | `+` concatenates strings           |
| 10   | `\` `/` `*` `%`             |                                    |
| 11   | `**`                        | power, right-associative           |
| 12   | `!`                         | prefix not, suffix factorial       |

### Built-in Functions

`ABS ACOS ASIN ATAN ATAN2 CEILING COS COSH EXP FLOOR LOG LOG2 LOG10 MAX MIN
POW ROUND SIGN SIN SINH SQRT TAN TANH TRUNCATE`, looked up by exact name and
then upper-cased, so `max` and `Max` work too.

### Built-in Constants

`PI PI_2 LOG2E DEG E INFINITY NAN TRUE FALSE`

## Logging

The crate emits `tracing` events (compilation outcome at `debug`, function
resolution and lazy argument forcing at `trace`, observed cancellation at
`debug`) and never installs a subscriber.
"#]

pub mod context;
pub mod conversion;
pub mod engine;
pub mod error;
pub mod eval;
pub mod expression;
pub mod functions;
pub mod grammar;
pub mod lexer;
pub mod ops;
pub mod transform;
pub mod types;
pub mod value;

pub use context::{EvalConfiguration, EvalFunction};
pub use engine::{compile, execute, execute_async};
pub use error::{ExprError, Result};
pub use expression::CompiledExpression;
pub use grammar::OperatorGrammar;
pub use ops::{DefaultOperators, Operators};
pub use types::VariableInfo;
pub use value::{Number, NumericType, Value};

pub mod constants {
    /// Default tolerance of [`assert_approx_eq!`](crate::assert_approx_eq).
    pub const TEST_PRECISION: f64 = 1e-10;
}

/// Asserts that two `f64` values are equal within a tolerance.
///
/// NaN equals NaN and same-signed infinities are equal. The tolerance
/// defaults to [`constants::TEST_PRECISION`].
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr $(,)?) => {
        $crate::assert_approx_eq!($left, $right, $crate::constants::TEST_PRECISION)
    };
    ($left:expr, $right:expr, $epsilon:expr $(,)?) => {{
        let (left, right, eps): (f64, f64, f64) = ($left, $right, $epsilon);
        $crate::assert_approx_eq!(
            left,
            right,
            eps,
            "assertion failed: `(left ≈ right)` (left: `{}`, right: `{}`, epsilon: `{}`)",
            left,
            right,
            eps
        )
    }};
    ($left:expr, $right:expr, $epsilon:expr, $($msg:tt)+) => {{
        let (left, right, eps): (f64, f64, f64) = ($left, $right, $epsilon);
        let same_special = (left.is_nan() && right.is_nan())
            || (left.is_infinite() && right.is_infinite() && left.signum() == right.signum());
        if !same_special {
            assert!((left - right).abs() < eps, $($msg)+);
        }
    }};
}
