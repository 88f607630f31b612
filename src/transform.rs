//! Token passes run between lexing and tree building.
//!
//! [`fold_signs`] settles whether a `+`/`-` is a sign or a binary operator
//! where that can be decided from the flat token list, and [`group`] matches
//! parentheses into nested groups and calls. Both build new sequences rather
//! than editing the input in place.

use std::vec;

use crate::error::{ExprError, Result};
use crate::grammar::OperatorGrammar;
use crate::types::{Token, TokenKind, TokenTree};

fn is_sign(token: &Token) -> bool {
    token.is_operator("+") || token.is_operator("-")
}

/// Collapses runs of `+`/`-` and attaches signs to numeric literals.
///
/// Two adjacent sign operators become one by sign multiplication, keeping the
/// later token's position. A sign directly before a number is folded into the
/// number's text when it is the first token or follows an operator that is not
/// a suffix operator, so `5*-1` carries the literal `-1` while `5!-1` and
/// `(-1)` keep the operator.
///
/// ```
/// use exp_eval::grammar::OperatorGrammar;
/// use exp_eval::lexer::tokenize;
/// use exp_eval::transform::fold_signs;
///
/// let grammar = OperatorGrammar::default();
/// let folded = fold_signs(tokenize("5*--+-1", &grammar).unwrap(), &grammar);
/// let texts: Vec<_> = folded.iter().map(|t| t.text()).collect();
/// assert_eq!(texts, vec!["5", "*", "-1"]);
/// ```
pub fn fold_signs(tokens: Vec<Token>, grammar: &OperatorGrammar) -> Vec<Token> {
    let mut out: Vec<Token> = Vec::with_capacity(tokens.len());

    for mut token in tokens {
        if is_sign(&token) && out.last().is_some_and(is_sign) {
            if out.pop().is_some_and(|prev| prev.is_operator("-")) {
                let flipped = if token.is_operator("-") { "+" } else { "-" };
                token.text = Some(flipped.to_string());
            }
            out.push(token);
            continue;
        }

        if token.kind == TokenKind::Number && out.last().is_some_and(is_sign) {
            let sign_index = out.len() - 1;
            let foldable = match sign_index.checked_sub(1).map(|i| &out[i]) {
                None => true,
                Some(before) => {
                    before.kind == TokenKind::Operator && !grammar.is_suffix(before.text())
                }
            };
            if foldable && out.pop().is_some_and(|sign| sign.is_operator("-")) {
                token.text = Some(format!("-{}", token.text()));
            }
        }
        out.push(token);
    }

    out
}

/// Matches parentheses into [`TokenTree::Group`] and [`TokenTree::Call`] nodes.
///
/// A `(` directly after an identifier makes a call; its contents are split on
/// top-level commas, `f()` having no arguments and `n` commas giving `n + 1`
/// possibly empty arguments. Any other `(` makes a group. A `(` without its
/// `)` fails with [`ExprError::UnmatchedParenthesis`]. A stray `)` is kept as
/// a leaf for the tree builder to reject. Nesting more than `max_depth`
/// parentheses fails with [`ExprError::RecursionLimit`].
pub fn group(tokens: Vec<Token>, max_depth: usize) -> Result<Vec<TokenTree>> {
    let mut iter = tokens.into_iter();
    group_level(&mut iter, None, 0, max_depth)
}

fn group_level(
    iter: &mut vec::IntoIter<Token>,
    open: Option<usize>,
    depth: usize,
    max_depth: usize,
) -> Result<Vec<TokenTree>> {
    let mut out: Vec<TokenTree> = Vec::new();

    while let Some(token) = iter.next() {
        match token.kind {
            TokenKind::RightParen if open.is_some() => return Ok(out),
            TokenKind::LeftParen => {
                if depth >= max_depth {
                    return Err(ExprError::RecursionLimit { limit: max_depth });
                }
                let inner = group_level(iter, Some(token.position), depth + 1, max_depth)?;
                let callee = match out.last() {
                    Some(TokenTree::Leaf(prev)) if prev.kind == TokenKind::Identifier => {
                        Some((prev.text().to_string(), prev.position))
                    }
                    _ => None,
                };
                match callee {
                    Some((name, position)) => {
                        out.pop();
                        out.push(TokenTree::Call {
                            name,
                            position,
                            args: split_arguments(inner),
                        });
                    }
                    None => out.push(TokenTree::Group {
                        position: token.position,
                        tokens: inner,
                    }),
                }
            }
            _ => out.push(TokenTree::Leaf(token)),
        }
    }

    match open {
        Some(position) => Err(ExprError::UnmatchedParenthesis { position }),
        None => Ok(out),
    }
}

fn split_arguments(inner: Vec<TokenTree>) -> Vec<Vec<TokenTree>> {
    if inner.is_empty() {
        return Vec::new();
    }
    let mut args = vec![Vec::new()];
    for tree in inner {
        if tree.kind() == TokenKind::Comma {
            args.push(Vec::new());
        } else if let Some(current) = args.last_mut() {
            current.push(tree);
        }
    }
    args
}
