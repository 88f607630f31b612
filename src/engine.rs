//! Compilation pipeline and one-shot entry points.
//!
//! Text goes through [`tokenize`], [`fold_signs`] and [`group`] and the
//! resulting token trees are split recursively by [`build_tree`] into an
//! [`ExprNode`] tree.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::context::EvalConfiguration;
use crate::error::{ExprError, Result};
use crate::expression::CompiledExpression;
use crate::grammar::{OperatorFlags, OperatorGrammar};
use crate::lexer::tokenize;
use crate::transform::{fold_signs, group};
use crate::types::{ExprNode, TokenKind, TokenTree};
use crate::value::Value;

/// Compiles an expression against the configuration's operator grammar.
///
/// The returned expression keeps a reference to the configuration; only the
/// grammar is fixed at this point, while constants, functions and named
/// operations are looked up again on every execution.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use exp_eval::context::EvalConfiguration;
/// use exp_eval::engine::compile;
///
/// let cfg = Arc::new(EvalConfiguration::double());
/// let expr = compile("12+45*10", &cfg).unwrap();
/// assert_eq!(expr.execute().unwrap().as_f64(), Some(462.0));
/// ```
///
/// Compile errors carry the offending position:
///
/// ```
/// use std::sync::Arc;
/// use exp_eval::context::EvalConfiguration;
/// use exp_eval::engine::compile;
/// use exp_eval::error::ExprError;
///
/// let cfg = Arc::new(EvalConfiguration::double());
/// match compile("2 + * 3", &cfg) {
///     Err(ExprError::Syntax { .. }) => {}
///     other => panic!("unexpected result: {:?}", other.map(|_| ())),
/// }
/// ```
pub fn compile(text: &str, configuration: &Arc<EvalConfiguration>) -> Result<CompiledExpression> {
    let grammar = &configuration.grammar;
    let compiled = grammar
        .validate()
        .and_then(|()| tokenize(text, grammar))
        .map(|tokens| fold_signs(tokens, grammar))
        .and_then(|tokens| group(tokens, configuration.max_depth))
        .and_then(|trees| build_tree(&trees, grammar, configuration.max_depth));

    match compiled {
        Ok(root) => {
            debug!(expression = text, "compiled expression");
            Ok(CompiledExpression::new(root, Arc::clone(configuration)))
        }
        Err(err) => {
            debug!(expression = text, error = %err, "expression failed to compile");
            Err(err)
        }
    }
}

/// Compiles and evaluates an expression in one call.
pub fn execute(text: &str, configuration: &Arc<EvalConfiguration>) -> Result<Value> {
    compile(text, configuration)?.execute()
}

/// Compiles an expression and evaluates it asynchronously.
pub fn execute_async<'a>(
    text: &'a str,
    configuration: &'a Arc<EvalConfiguration>,
    cancel: &'a CancellationToken,
) -> BoxFuture<'a, Result<Value>> {
    async move { compile(text, configuration)?.execute_async(cancel).await }.boxed()
}

/// Finds the operator a token sequence splits on within one tier.
///
/// Each spelling contributes its rightmost top-level occurrence, or its
/// leftmost when right-associative; the greatest index across the tier wins.
fn find_split<'t>(
    tokens: &'t [TokenTree],
    tier: &[String],
    grammar: &OperatorGrammar,
) -> Option<(usize, &'t str)> {
    let mut split: Option<(usize, &str)> = None;
    for spelling in tier {
        let matches = |tree: &TokenTree| tree.operator() == Some(spelling.as_str());
        let index = if grammar.is_right_associative(spelling) {
            tokens.iter().position(matches)
        } else {
            tokens.iter().rposition(matches)
        };
        match (index, split) {
            (Some(index), Some((best, _))) if index <= best => {}
            (Some(index), _) => split = tokens[index].operator().map(|op| (index, op)),
            (None, _) => {}
        }
    }
    split
}

/// Builds an expression tree from grouped tokens.
///
/// Tiers are tried from the lowest precedence inward; the first tier holding
/// a top-level operator splits the sequence into left and right operands that
/// are built recursively. A sequence with no operator must be a single
/// operand: a literal, an identifier, a group or a call.
///
/// Every operand and group is one level deeper than its parent, so a chain
/// like `1+1+...+1` is as deep as it has terms. A tree deeper than `max_depth`
/// fails with [`ExprError::RecursionLimit`].
pub fn build_tree(tokens: &[TokenTree], grammar: &OperatorGrammar, max_depth: usize) -> Result<Arc<ExprNode>> {
    TreeBuilder { grammar, max_depth }.build(tokens, 0)
}

struct TreeBuilder<'g> {
    grammar: &'g OperatorGrammar,
    max_depth: usize,
}

impl TreeBuilder<'_> {
    fn build(&self, tokens: &[TokenTree], depth: usize) -> Result<Arc<ExprNode>> {
        if depth > self.max_depth {
            return Err(ExprError::RecursionLimit {
                limit: self.max_depth,
            });
        }

        for tier in &self.grammar.precedence_tiers {
            if let Some((index, op)) = find_split(tokens, tier, self.grammar) {
                return self.build_operator(tokens, index, op, depth);
            }
        }

        match tokens {
            [] => Err(ExprError::Syntax {
                position: None,
                message: "Missing operand or operator".to_string(),
            }),
            [single] => self.build_operand(single, depth),
            [_, second, ..] => Err(ExprError::syntax(
                second.position(),
                "Missing operand or operator",
            )),
        }
    }

    fn build_operator(
        &self,
        tokens: &[TokenTree],
        index: usize,
        op: &str,
        depth: usize,
    ) -> Result<Arc<ExprNode>> {
        let position = tokens[index].position();
        let flags = self.grammar.flags_of(op);
        let before = &tokens[..index];
        let after = &tokens[index + 1..];

        let (left, right) = if flags.intersects(OperatorFlags::PREFIX | OperatorFlags::SUFFIX) {
            if flags.contains(OperatorFlags::PREFIX) && index == 0 {
                (None, Some(after))
            } else if flags.contains(OperatorFlags::SUFFIX) && index > 0 {
                if let Some(extra) = after.first() {
                    return Err(ExprError::syntax(
                        extra.position(),
                        format!("Unexpected token after operator '{}'", op),
                    ));
                }
                (Some(before), None)
            } else {
                return Err(ExprError::syntax(
                    position,
                    format!("Operator '{}' is unexpected", op),
                ));
            }
        } else if before.is_empty() && (op == "-" || op == "+") {
            (None, Some(after))
        } else {
            (Some(before), Some(after))
        };

        if left.is_some_and(<[TokenTree]>::is_empty) || right.is_some_and(<[TokenTree]>::is_empty) {
            return Err(ExprError::syntax(
                position,
                format!("Missing operand for operator '{}'", op),
            ));
        }

        let left = match left {
            Some(left) => Some(self.build(left, depth + 1)?),
            None if op == "-" && !flags.contains(OperatorFlags::PREFIX) => {
                Some(Arc::new(ExprNode::Number {
                    text: "0".to_string(),
                    position,
                }))
            }
            None if op == "+" && !flags.contains(OperatorFlags::PREFIX) => {
                return self.build(right.unwrap_or_default(), depth + 1);
            }
            None => None,
        };
        let right = match right {
            Some(right) => Some(self.build(right, depth + 1)?),
            None => None,
        };

        Ok(Arc::new(ExprNode::Operator {
            op: op.to_string(),
            position,
            left,
            right,
        }))
    }

    fn build_operand(&self, tree: &TokenTree, depth: usize) -> Result<Arc<ExprNode>> {
        let node = match tree {
            TokenTree::Group { tokens, .. } => return self.build(tokens, depth + 1),
            TokenTree::Call {
                name,
                position,
                args,
            } => {
                let args = args
                    .iter()
                    .map(|arg| match arg.is_empty() {
                        true => Ok(None),
                        false => self.build(arg, depth + 1).map(Some),
                    })
                    .collect::<Result<Vec<_>>>()?;
                ExprNode::Call {
                    name: name.clone(),
                    position: *position,
                    args,
                }
            }
            TokenTree::Leaf(token) => {
                let text = token.text().to_string();
                let position = token.position;
                match token.kind {
                    TokenKind::Number => ExprNode::Number { text, position },
                    TokenKind::StringLiteral => ExprNode::String {
                        value: text,
                        position,
                    },
                    TokenKind::Identifier => ExprNode::Identifier {
                        name: text,
                        position,
                    },
                    TokenKind::Comma => return Err(ExprError::syntax(position, "Unexpected ','")),
                    TokenKind::RightParen => {
                        return Err(ExprError::syntax(position, "Unexpected ')'"));
                    }
                    _ => {
                        return Err(ExprError::syntax(
                            position,
                            format!("Unexpected token '{}'", text),
                        ));
                    }
                }
            }
        };
        Ok(Arc::new(node))
    }
}
