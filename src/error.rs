//! Error types and handling for the exp-eval crate.
//!
//! This module defines the error types used throughout the crate for expression
//! compilation and evaluation. Compilation errors (`Lex`, `UnmatchedParenthesis`,
//! `Syntax`, `InvalidGrammar`) always abort compilation. `RecursionLimit` may
//! come from either stage. Every other variant is raised by a single
//! evaluation call and leaves the compiled tree reusable.

use crate::value::NumericType;

/// Result type used throughout the crate.
///
/// This is a convenience type alias that uses the `ExprError` type for the error variant.
pub type Result<T> = core::result::Result<T, ExprError>;

/// Error type for expression compilation and evaluation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExprError {
    /// Error during lexical analysis (tokenization).
    ///
    /// Raised for a character that starts no number, identifier, string, paren,
    /// comma or configured operator, for a malformed number such as `12e`, and
    /// for unterminated strings or broken escape sequences.
    #[error("Tokenizer error at position {position}: {message}")]
    Lex { position: usize, message: String },

    /// An opening parenthesis without its closing partner.
    ///
    /// The position is the byte offset of the opening parenthesis.
    #[error("Unmatched parenthesis for parenthesis at position {position}")]
    UnmatchedParenthesis { position: usize },

    /// Error during tree building.
    ///
    /// Missing operands, dangling operators, stray commas and leftover tokens
    /// all end up here. The position is absent when the token sequence is empty.
    #[error("Syntax error: {message}{}", at_position(.position))]
    Syntax {
        position: Option<usize>,
        message: String,
    },

    /// The operator grammar handed to the compiler is unusable.
    #[error("Invalid operator grammar: {message}")]
    InvalidGrammar { message: String },

    /// Nesting deeper than the configuration's `max_depth`.
    ///
    /// Grouping and tree building raise it for deeply parenthesised input and
    /// for long operator chains, which build equally deep trees. Evaluation
    /// raises it for trees assembled by hand.
    #[error("Expression too complex: exceeded maximum nesting depth of {limit}")]
    RecursionLimit { limit: usize },

    /// Unknown function error
    ///
    /// This error is returned when a call names a function that is registered
    /// neither in the instance functions nor in the generic functions, under its
    /// exact or upper-cased name. Registering the function and executing the same
    /// compiled expression again resolves it.
    #[error("Function named \"{name}\" was not found")]
    UnknownFunction { name: String },

    /// An operator spelling from a custom grammar with no semantic action.
    #[error("Operator '{op}' has no semantic action in this configuration")]
    UnknownOperator { op: String },

    /// A named operation rejected the types of its operands.
    #[error("Operator '{op}' cannot be applied to {left} and {right}")]
    TypeMismatch {
        op: String,
        left: &'static str,
        right: &'static str,
    },

    /// A function received an argument it cannot work with, or too few arguments.
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Error when division by zero is attempted on integer or decimal numbers.
    ///
    /// Floating-point division follows IEEE semantics and yields infinity or NaN instead.
    #[error("Division by zero")]
    DivideByZero,

    /// Integer or decimal arithmetic left the representable range.
    #[error("Numeric overflow in '{op}'")]
    Overflow { op: String },

    /// Text could not be converted to the configured numeric type.
    #[error("Cannot convert '{text}' to {target}")]
    NumberFormat { text: String, target: NumericType },

    /// Failure reported by a host-registered function or constant provider.
    #[error("{message}")]
    Function { message: String },

    /// The cancellation token passed to an asynchronous evaluation fired.
    #[error("Evaluation was cancelled")]
    Cancelled,
}

fn at_position(position: &Option<usize>) -> String {
    match position {
        Some(position) => format!(" at position {}", position),
        None => String::new(),
    }
}

impl ExprError {
    /// Shorthand for a syntax error at a known position.
    pub fn syntax(position: usize, message: impl Into<String>) -> Self {
        ExprError::Syntax {
            position: Some(position),
            message: message.into(),
        }
    }

    /// Shorthand for a host function failure.
    pub fn function(message: impl Into<String>) -> Self {
        ExprError::Function {
            message: message.into(),
        }
    }

    /// Whether this error can only come out of compilation.
    pub fn is_compile_error(&self) -> bool {
        matches!(
            self,
            ExprError::Lex { .. }
                | ExprError::UnmatchedParenthesis { .. }
                | ExprError::Syntax { .. }
                | ExprError::InvalidGrammar { .. }
        )
    }

    /// Source offset carried by the error, if any.
    pub fn position(&self) -> Option<usize> {
        match self {
            ExprError::Lex { position, .. } | ExprError::UnmatchedParenthesis { position } => {
                Some(*position)
            }
            ExprError::Syntax { position, .. } => *position,
            _ => None,
        }
    }
}
