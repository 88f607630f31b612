//! Operator grammar: the data-driven part of the parser.
//!
//! The set of operators, their precedence, associativity and unary
//! classification are plain data. The lexer reads the flattened spelling list
//! for longest-match tokenization and the tree builder walks the precedence
//! tiers from the outermost (lowest precedence) split inward.
//!
//! Grammars are serializable so hosts can ship them in configuration files:
//!
//! ```
//! use exp_eval::grammar::OperatorGrammar;
//!
//! let grammar = OperatorGrammar::default();
//! assert_eq!(grammar.precedence_tiers[0], vec!["||".to_string()]);
//! assert!(grammar.is_right_associative("**"));
//! ```

use std::collections::BTreeSet;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::{ExprError, Result};

bitflags! {
    /// Unary and associativity classification of a single operator spelling.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OperatorFlags: u32 {
        /// May appear with no left operand (`!x`).
        const PREFIX = 0b00000001;
        /// May appear with no right operand (`5!`).
        const SUFFIX = 0b00000010;
        /// Splits on the leftmost occurrence within its tier.
        const RIGHT_ASSOCIATIVE = 0b00000100;
    }
}

/// Operator table consumed by the lexer and the tree builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatorGrammar {
    /// Tiers of operator spellings, lowest precedence first.
    pub precedence_tiers: Vec<Vec<String>>,
    pub right_associative: BTreeSet<String>,
    pub prefix_operators: BTreeSet<String>,
    pub suffix_operators: BTreeSet<String>,
    /// Characters that may form an identifier.
    pub variable_name_characters: BTreeSet<char>,
}

impl Default for OperatorGrammar {
    fn default() -> Self {
        let tiers: &[&[&str]] = &[
            &["||"],
            &["&&"],
            &["|"],
            &["^"],
            &["&"],
            &["==", "=", "!=", "<>"],
            &["<", "<=", ">", ">="],
            &["<<", ">>"],
            &["+", "-"],
            &["\\", "/", "*", "%"],
            &["**"],
            &["!"],
        ];
        let set = |ops: &[&str]| ops.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>();

        Self {
            precedence_tiers: tiers
                .iter()
                .map(|tier| tier.iter().map(|s| s.to_string()).collect())
                .collect(),
            right_associative: set(&["**"]),
            prefix_operators: set(&["!"]),
            suffix_operators: set(&["!"]),
            variable_name_characters: default_identifier_characters(),
        }
    }
}

/// ASCII letters, digits, `_` and `$`.
pub fn default_identifier_characters() -> BTreeSet<char> {
    ('a'..='z')
        .chain('A'..='Z')
        .chain('0'..='9')
        .chain(['_', '$'])
        .collect()
}

impl OperatorGrammar {
    /// Classification of `op` in this grammar.
    pub fn flags_of(&self, op: &str) -> OperatorFlags {
        let mut flags = OperatorFlags::empty();
        if self.prefix_operators.contains(op) {
            flags |= OperatorFlags::PREFIX;
        }
        if self.suffix_operators.contains(op) {
            flags |= OperatorFlags::SUFFIX;
        }
        if self.right_associative.contains(op) {
            flags |= OperatorFlags::RIGHT_ASSOCIATIVE;
        }
        flags
    }

    pub fn is_right_associative(&self, op: &str) -> bool {
        self.right_associative.contains(op)
    }

    pub fn is_suffix(&self, op: &str) -> bool {
        self.suffix_operators.contains(op)
    }

    pub fn is_identifier_char(&self, c: char) -> bool {
        self.variable_name_characters.contains(&c)
    }

    /// Every operator spelling in the tiers, deduplicated, longest first.
    ///
    /// The lexer tries spellings in this order so `>=` wins over `>`.
    pub fn all_operators(&self) -> Vec<&str> {
        let mut ops: Vec<&str> = self
            .precedence_tiers
            .iter()
            .flatten()
            .map(String::as_str)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        ops.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        ops
    }

    /// Checks that every spelling can be produced by the lexer.
    ///
    /// A spelling must be non-empty and must not contain whitespace, quotes,
    /// parentheses or commas, nor start with a digit or `.`, since those
    /// characters are claimed by other token kinds.
    pub fn validate(&self) -> Result<()> {
        for op in self.precedence_tiers.iter().flatten() {
            let Some(first) = op.chars().next() else {
                return Err(ExprError::InvalidGrammar {
                    message: "empty operator spelling".to_string(),
                });
            };
            if first.is_ascii_digit() || first == '.' {
                return Err(ExprError::InvalidGrammar {
                    message: format!("operator '{}' starts like a number", op),
                });
            }
            if op
                .chars()
                .any(|c| c.is_whitespace() || matches!(c, '(' | ')' | ',' | '"' | '\''))
            {
                return Err(ExprError::InvalidGrammar {
                    message: format!("operator '{}' contains a reserved character", op),
                });
            }
        }
        Ok(())
    }
}
