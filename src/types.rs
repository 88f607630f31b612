//! Type definitions for the compilation pipeline.
//!
//! This module contains the data structures passed between the pipeline
//! stages: flat [`Token`]s from the lexer, the nested [`TokenTree`] produced by
//! grouping, and the final [`ExprNode`] tree that the evaluator walks.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Token kinds produced by the lexer and the grouping pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// A numeric literal, possibly signed after sign folding.
    Number,
    /// A quoted string literal; the text holds the unescaped content.
    StringLiteral,
    /// A name made of identifier characters.
    Identifier,
    /// A spelling from the operator grammar.
    Operator,
    LeftParen,
    RightParen,
    Comma,
    /// A parenthesized sub-expression (grouping output only).
    Group,
    /// A function call (grouping output only).
    Call,
}

/// A token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Raw lexeme; absent for parentheses and commas.
    pub text: Option<String>,
    /// Byte offset of the lexeme in the source text.
    pub position: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: Option<String>, position: usize) -> Self {
        Self {
            kind,
            text,
            position,
        }
    }

    /// The lexeme, or an empty string for punctuation.
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    /// Whether this is an operator token with the given spelling.
    pub fn is_operator(&self, spelling: &str) -> bool {
        self.kind == TokenKind::Operator && self.text() == spelling
    }
}

/// Token sequence after grouping.
///
/// Parentheses have been matched: every `(`…`)` pair became either a
/// [`TokenTree::Group`] or, when an identifier preceded it, a
/// [`TokenTree::Call`] whose arguments are split on top-level commas.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenTree {
    Leaf(Token),
    Group {
        position: usize,
        tokens: Vec<TokenTree>,
    },
    Call {
        name: String,
        position: usize,
        /// One token sequence per argument; an empty sequence is an empty argument.
        args: Vec<Vec<TokenTree>>,
    },
}

impl TokenTree {
    pub fn kind(&self) -> TokenKind {
        match self {
            TokenTree::Leaf(token) => token.kind,
            TokenTree::Group { .. } => TokenKind::Group,
            TokenTree::Call { .. } => TokenKind::Call,
        }
    }

    pub fn position(&self) -> usize {
        match self {
            TokenTree::Leaf(token) => token.position,
            TokenTree::Group { position, .. } | TokenTree::Call { position, .. } => *position,
        }
    }

    /// The operator spelling if this is an operator leaf.
    pub fn operator(&self) -> Option<&str> {
        match self {
            TokenTree::Leaf(token) if token.kind == TokenKind::Operator => Some(token.text()),
            _ => None,
        }
    }
}

/// A node of a compiled expression tree.
///
/// The tree is immutable once built. Children sit behind [`Arc`] so that lazy
/// asynchronous argument thunks can keep a subtree alive past a borrow; no
/// subtree is ever shared between two parents.
///
/// # Examples
///
/// ```
/// use exp_eval::engine::build_tree;
/// use exp_eval::grammar::OperatorGrammar;
/// use exp_eval::lexer::tokenize;
/// use exp_eval::transform::{fold_signs, group};
/// use exp_eval::types::ExprNode;
///
/// let grammar = OperatorGrammar::default();
/// let tokens = fold_signs(tokenize("1 + 2", &grammar).unwrap(), &grammar);
/// let root = build_tree(&group(tokens, 64).unwrap(), &grammar, 64).unwrap();
/// assert!(matches!(&*root, ExprNode::Operator { op, .. } if op == "+"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum ExprNode {
    /// Numeric literal text, converted at evaluation time.
    Number { text: String, position: usize },
    /// String literal content after unescaping.
    String { value: String, position: usize },
    /// A free identifier used as a value.
    Identifier { name: String, position: usize },
    /// A function call; `None` marks an empty argument.
    Call {
        name: String,
        position: usize,
        args: Vec<Option<Arc<ExprNode>>>,
    },
    /// A unary or binary operator application.
    ///
    /// Prefix applications have no left child and suffix applications no right child.
    Operator {
        op: String,
        position: usize,
        left: Option<Arc<ExprNode>>,
        right: Option<Arc<ExprNode>>,
    },
}

impl ExprNode {
    pub fn position(&self) -> usize {
        match self {
            ExprNode::Number { position, .. }
            | ExprNode::String { position, .. }
            | ExprNode::Identifier { position, .. }
            | ExprNode::Call { position, .. }
            | ExprNode::Operator { position, .. } => *position,
        }
    }

    /// Appends every identifier used as a value in this subtree, in source order.
    pub fn collect_variables(&self, out: &mut Vec<VariableInfo>) {
        match self {
            ExprNode::Identifier { name, position } => out.push(VariableInfo {
                name: name.clone(),
                position: *position,
            }),
            ExprNode::Call { args, .. } => {
                for arg in args.iter().flatten() {
                    arg.collect_variables(out);
                }
            }
            ExprNode::Operator { left, right, .. } => {
                if let Some(left) = left {
                    left.collect_variables(out);
                }
                if let Some(right) = right {
                    right.collect_variables(out);
                }
            }
            ExprNode::Number { .. } | ExprNode::String { .. } => {}
        }
    }
}

/// A free identifier reference in a compiled expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariableInfo {
    pub name: String,
    pub position: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str, position: usize) -> Option<Arc<ExprNode>> {
        Some(Arc::new(ExprNode::Identifier {
            name: name.to_string(),
            position,
        }))
    }

    #[test]
    fn test_collect_variables_in_source_order() {
        let call = ExprNode::Call {
            name: "CALL".to_string(),
            position: 0,
            args: vec![ident("a", 5), ident("b", 7), None],
        };
        let root = ExprNode::Operator {
            op: "+".to_string(),
            position: 3,
            left: ident("x", 1),
            right: Some(Arc::new(call)),
        };

        let mut vars = Vec::new();
        root.collect_variables(&mut vars);
        let names: Vec<_> = vars.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["x", "a", "b"]);
        assert_eq!(vars[1].position, 5);
    }

    #[test]
    fn test_token_tree_kind() {
        let leaf = TokenTree::Leaf(Token::new(TokenKind::Operator, Some("+".into()), 2));
        assert_eq!(leaf.kind(), TokenKind::Operator);
        assert_eq!(leaf.operator(), Some("+"));

        let group = TokenTree::Group {
            position: 4,
            tokens: vec![],
        };
        assert_eq!(group.kind(), TokenKind::Group);
        assert_eq!(group.position(), 4);
        assert_eq!(group.operator(), None);
    }
}
