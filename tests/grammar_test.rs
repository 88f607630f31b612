use std::sync::Arc;

use exp_eval::context::EvalConfiguration;
use exp_eval::engine::{compile, execute};
use exp_eval::error::{ExprError, Result};
use exp_eval::grammar::OperatorGrammar;
use exp_eval::ops::{DefaultOperators, Operators};
use exp_eval::value::Value;

use test_helpers::eval_both;

#[test]
fn test_grammar_json_round_trip() {
    let grammar = OperatorGrammar::default();
    let json = serde_json::to_string_pretty(&grammar).unwrap();
    let back: OperatorGrammar = serde_json::from_str(&json).unwrap();
    assert_eq!(back, grammar);
}

#[test]
fn test_partial_grammar_document() {
    let json = r#"{
        "precedence_tiers": [["+", "-"], ["*", "/"], ["**"]],
        "right_associative": []
    }"#;
    let grammar: OperatorGrammar = serde_json::from_str(json).unwrap();
    assert!(grammar.prefix_operators.contains("!"));
    assert!(grammar.is_identifier_char('x'));

    let cfg = Arc::new(EvalConfiguration::double().with_grammar(grammar));
    // `**` is left-associative in this grammar
    assert_eq!(eval_both("2 ** 3 ** 2", &cfg).unwrap(), Value::from(64.0));
    // `<` is not an operator any more
    assert!(matches!(compile("1 < 2", &cfg), Err(ExprError::Lex { position: 2, .. })));
}

#[test]
fn test_invalid_grammar_is_rejected_at_compile() {
    let mut grammar = OperatorGrammar::default();
    grammar.precedence_tiers.push(vec!["1x".to_string()]);
    let cfg = Arc::new(EvalConfiguration::double().with_grammar(grammar));
    assert!(matches!(compile("1 + 1", &cfg), Err(ExprError::InvalidGrammar { .. })));
}

/// Adds a three-way comparison `<=>` and a prefix `~` bitwise not.
struct Spaceship;

impl Operators for Spaceship {
    fn apply_custom(
        &self,
        op: &str,
        left: Option<Value>,
        right: Option<Value>,
        cfg: &EvalConfiguration,
    ) -> Result<Value> {
        match (op, left, right) {
            ("<=>", Some(a), Some(b)) => {
                let less = DefaultOperators.less_than(a.clone(), b.clone(), cfg)?;
                let greater = DefaultOperators.greater_than(a, b, cfg)?;
                let n = match (less, greater) {
                    (Value::Bool(true), _) => -1,
                    (_, Value::Bool(true)) => 1,
                    _ => 0,
                };
                Ok(Value::Number(exp_eval::value::Number::from_i64(cfg.numeric_type, n)))
            }
            ("~", None, Some(a)) => {
                let n = a.as_number().map(|n| n.to_i64()).unwrap_or(0);
                Ok(Value::Number(exp_eval::value::Number::from_i64(cfg.numeric_type, !n)))
            }
            (op, _, _) => Err(ExprError::UnknownOperator { op: op.to_string() }),
        }
    }
}

fn spaceship_config() -> Arc<EvalConfiguration> {
    let mut grammar = OperatorGrammar::default();
    // between equality and ordering
    grammar.precedence_tiers.insert(6, vec!["<=>".to_string()]);
    grammar.precedence_tiers.push(vec!["~".to_string()]);
    grammar.prefix_operators.insert("~".to_string());
    Arc::new(
        EvalConfiguration::int64()
            .with_grammar(grammar)
            .with_operators(Spaceship),
    )
}

#[test]
fn test_custom_operators_through_apply_custom() {
    let cfg = spaceship_config();
    assert_eq!(eval_both("1 <=> 2", &cfg).unwrap().as_f64(), Some(-1.0));
    assert_eq!(eval_both("'b' <=> 'a'", &cfg).unwrap().as_f64(), Some(1.0));
    assert_eq!(eval_both("2 + 1 <=> 3", &cfg).unwrap().as_f64(), Some(0.0));
    assert_eq!(eval_both("~5", &cfg).unwrap().as_f64(), Some(-6.0));
    // `<=` still lexes as `<=` because longer spellings win
    assert_eq!(eval_both("1 <= 2", &cfg).unwrap(), Value::Bool(true));
    // default operations still apply
    assert_eq!(eval_both("7 / 2", &cfg).unwrap().as_f64(), Some(3.0));
}

#[test]
fn test_unmapped_operator_is_an_evaluation_error() {
    let mut grammar = OperatorGrammar::default();
    grammar.precedence_tiers.push(vec!["@".to_string()]);
    let cfg = Arc::new(EvalConfiguration::double().with_grammar(grammar));
    let expr = compile("1 @ 2", &cfg).unwrap();
    assert_eq!(
        expr.execute().unwrap_err(),
        ExprError::UnknownOperator { op: "@".to_string() }
    );
}

#[test]
fn test_custom_identifier_characters() {
    let mut grammar = OperatorGrammar::default();
    grammar.variable_name_characters.insert('.');
    grammar.variable_name_characters.insert(':');
    let mut cfg = EvalConfiguration::double().with_grammar(grammar);
    cfg.set_constant("order.total", 40.0);
    cfg.set_constant("tax:rate", 0.5);
    let cfg = Arc::new(cfg);

    assert_eq!(execute("order.total * tax:rate", &cfg).unwrap(), Value::from(20.0));
    let names: Vec<_> = compile("order.total + other", &cfg)
        .unwrap()
        .variables()
        .into_iter()
        .map(|v| v.name)
        .collect();
    assert_eq!(names, ["order.total", "other"]);
}

#[test]
fn test_right_associative_spelling_in_custom_tier() {
    let mut grammar = OperatorGrammar::default();
    grammar.right_associative.insert("-".to_string());
    let cfg = Arc::new(EvalConfiguration::double().with_grammar(grammar));
    assert_eq!(eval_both("10 - 4 - 3", &cfg).unwrap(), Value::from(9.0));
}
