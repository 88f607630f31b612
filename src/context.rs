//! Runtime configuration for compiling and evaluating expressions.
//!
//! An [`EvalConfiguration`] bundles the operator grammar used at compile time
//! with everything the evaluator consults at run time: the numeric type, the
//! named-operation table, constants, functions and constant providers.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use tokio_util::sync::CancellationToken;

use crate::conversion::NumberFormat;
use crate::error::Result;
use crate::eval::args::{AsyncArgs, FunctionArgs};
use crate::functions;
use crate::grammar::OperatorGrammar;
use crate::ops::{DefaultOperators, Operators};
use crate::value::{Number, NumericType, Value};

/// Default limit on nesting depth for compilation and evaluation.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Synchronous function body.
pub type SyncFn = Arc<dyn Fn(&EvalConfiguration, &FunctionArgs<'_>) -> Result<Value> + Send + Sync>;

/// Asynchronous function body.
pub type AsyncFn = Arc<
    dyn Fn(CancellationToken, Arc<EvalConfiguration>, AsyncArgs) -> BoxFuture<'static, Result<Value>>
        + Send
        + Sync,
>;

/// Host callback resolving identifiers before the constant tables.
///
/// Returning `None` means "not found" and lets the lookup continue.
pub type ConstProvider = Arc<dyn Fn(&str) -> Option<Value> + Send + Sync>;

/// Asynchronous counterpart of [`ConstProvider`], consulted first on the async path.
pub type AsyncConstProvider = Arc<
    dyn Fn(CancellationToken, String) -> BoxFuture<'static, Result<Option<Value>>> + Send + Sync,
>;

/// A host function registered by name.
///
/// A function may carry a synchronous body, an asynchronous body or both.
/// Lazy functions receive their arguments as thunks instead of values.
#[derive(Clone)]
pub struct EvalFunction {
    sync: Option<SyncFn>,
    asynchronous: Option<AsyncFn>,
    lazy: bool,
}

impl EvalFunction {
    /// An eager function with a synchronous body.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use exp_eval::context::{EvalConfiguration, EvalFunction};
    /// use exp_eval::engine::execute;
    /// use exp_eval::value::Value;
    ///
    /// let mut cfg = EvalConfiguration::double();
    /// cfg.set_function("twice", EvalFunction::new(|_, args| {
    ///     let x = args.get(0)?.as_f64().unwrap_or(0.0);
    ///     Ok(Value::from(x * 2.0))
    /// }));
    ///
    /// let result = execute("twice(21)", &Arc::new(cfg)).unwrap();
    /// assert_eq!(result, Value::from(42.0));
    /// ```
    pub fn new<F>(body: F) -> Self
    where
        F: Fn(&EvalConfiguration, &FunctionArgs<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            sync: Some(Arc::new(body)),
            asynchronous: None,
            lazy: false,
        }
    }

    /// A lazy function with a synchronous body.
    ///
    /// Arguments arrive as [`FunctionArgs::Lazy`]; an argument is evaluated only
    /// when the body forces it, and again on every force.
    pub fn lazy<F>(body: F) -> Self
    where
        F: Fn(&EvalConfiguration, &FunctionArgs<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            lazy: true,
            ..Self::new(body)
        }
    }

    /// An eager function with an asynchronous body.
    pub fn new_async<F, Fut>(body: F) -> Self
    where
        F: Fn(CancellationToken, Arc<EvalConfiguration>, AsyncArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self {
            sync: None,
            asynchronous: Some(Arc::new(move |cancel, cfg, args| body(cancel, cfg, args).boxed())),
            lazy: false,
        }
    }

    /// A lazy function with an asynchronous body.
    pub fn lazy_async<F, Fut>(body: F) -> Self
    where
        F: Fn(CancellationToken, Arc<EvalConfiguration>, AsyncArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self {
            lazy: true,
            ..Self::new_async(body)
        }
    }

    /// Adds an asynchronous body to a function built with [`EvalFunction::new`].
    pub fn with_async<F, Fut>(mut self, body: F) -> Self
    where
        F: Fn(CancellationToken, Arc<EvalConfiguration>, AsyncArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        self.asynchronous = Self::new_async(body).asynchronous;
        self
    }

    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    pub fn sync_body(&self) -> Option<&SyncFn> {
        self.sync.as_ref()
    }

    pub fn async_body(&self) -> Option<&AsyncFn> {
        self.asynchronous.as_ref()
    }
}

impl fmt::Debug for EvalFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvalFunction")
            .field("sync", &self.sync.is_some())
            .field("async", &self.asynchronous.is_some())
            .field("lazy", &self.lazy)
            .finish()
    }
}

/// Evaluation configuration.
///
/// Instance constants and functions belong to this configuration; the
/// generic tables hold the defaults shared by every clone. Name lookups try
/// the exact name and then the upper-cased name, instance tables before
/// generic ones.
///
/// Compiled expressions hold the configuration behind an [`Arc`], so it is
/// never mutated while shared: changes go through
/// [`CompiledExpression::configuration_mut`](crate::expression::CompiledExpression::configuration_mut),
/// which clones it first if anyone else holds it.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use exp_eval::context::EvalConfiguration;
/// use exp_eval::engine::execute;
/// use exp_eval::value::Value;
///
/// let mut cfg = EvalConfiguration::double();
/// cfg.set_constant("x", 5.9);
///
/// let result = execute("x * 27 + (8>>2) / x", &Arc::new(cfg)).unwrap();
/// assert!((result.as_f64().unwrap() - (5.9 * 27.0 + 2.0 / 5.9)).abs() < 1e-9);
/// ```
#[derive(Clone)]
pub struct EvalConfiguration {
    /// Representation every literal and numeric string is converted to.
    pub numeric_type: NumericType,
    /// Grammar used by [`compile`](crate::engine::compile).
    pub grammar: Arc<OperatorGrammar>,
    /// Named operations consulted for every operator application.
    pub operators: Arc<dyn Operators>,
    pub constants: HashMap<String, Value>,
    pub functions: HashMap<String, EvalFunction>,
    pub generic_constants: Arc<HashMap<String, Value>>,
    pub generic_functions: Arc<HashMap<String, EvalFunction>>,
    pub const_provider: Option<ConstProvider>,
    pub async_const_provider: Option<AsyncConstProvider>,
    /// Explicit separators for numeric text; guessed per string when absent.
    pub number_format: Option<NumberFormat>,
    /// Whether numeric strings are parsed before arithmetic.
    pub auto_parse_numeric_strings: bool,
    /// Reads a lone separator in the thousands slot (`1.234`) as grouping.
    pub ambiguous_separator_as_thousands: bool,
    /// Deepest parenthesis nesting, tree depth and evaluation recursion
    /// accepted before [`ExprError::RecursionLimit`](crate::error::ExprError::RecursionLimit).
    pub max_depth: usize,
}

impl EvalConfiguration {
    /// Creates a configuration with the default grammar, operations, constants
    /// and math functions for the given numeric type.
    pub fn new(numeric_type: NumericType) -> Self {
        Self {
            numeric_type,
            grammar: Arc::new(OperatorGrammar::default()),
            operators: Arc::new(DefaultOperators),
            constants: HashMap::new(),
            functions: HashMap::new(),
            generic_constants: Arc::new(functions::default_constants(numeric_type)),
            generic_functions: Arc::new(functions::default_functions()),
            const_provider: None,
            async_const_provider: None,
            number_format: None,
            auto_parse_numeric_strings: true,
            ambiguous_separator_as_thousands: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn float() -> Self {
        Self::new(NumericType::F32)
    }

    pub fn double() -> Self {
        Self::new(NumericType::F64)
    }

    pub fn decimal() -> Self {
        Self::new(NumericType::Decimal)
    }

    pub fn int32() -> Self {
        Self::new(NumericType::I32)
    }

    pub fn int64() -> Self {
        Self::new(NumericType::I64)
    }

    /// Replaces the operator grammar.
    ///
    /// Only expressions compiled afterwards see the new grammar.
    pub fn with_grammar(mut self, grammar: OperatorGrammar) -> Self {
        self.grammar = Arc::new(grammar);
        self
    }

    /// Replaces the named-operation table.
    pub fn with_operators(mut self, operators: impl Operators + 'static) -> Self {
        self.operators = Arc::new(operators);
        self
    }

    pub fn with_const_provider<F>(mut self, provider: F) -> Self
    where
        F: Fn(&str) -> Option<Value> + Send + Sync + 'static,
    {
        self.const_provider = Some(Arc::new(provider));
        self
    }

    pub fn with_async_const_provider<F, Fut>(mut self, provider: F) -> Self
    where
        F: Fn(CancellationToken, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<Value>>> + Send + 'static,
    {
        self.async_const_provider = Some(Arc::new(move |cancel, name| provider(cancel, name).boxed()));
        self
    }

    pub fn with_number_format(mut self, format: Option<NumberFormat>) -> Self {
        self.number_format = format;
        self
    }

    pub fn with_auto_parse_numeric_strings(mut self, enabled: bool) -> Self {
        self.auto_parse_numeric_strings = enabled;
        self
    }

    pub fn with_ambiguous_separator_as_thousands(mut self, enabled: bool) -> Self {
        self.ambiguous_separator_as_thousands = enabled;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Zero of the configured numeric type.
    pub fn zero(&self) -> Number {
        Number::zero(self.numeric_type)
    }

    /// Sets an instance constant, returning the previous value.
    pub fn set_constant(&mut self, name: &str, value: impl Into<Value>) -> Option<Value> {
        self.constants.insert(name.to_string(), value.into())
    }

    pub fn remove_constant(&mut self, name: &str) -> Option<Value> {
        self.constants.remove(name)
    }

    pub fn clear_constants(&mut self) {
        self.constants.clear();
    }

    /// Registers an instance function, replacing any previous one of that name.
    pub fn set_function(&mut self, name: &str, function: EvalFunction) -> Option<EvalFunction> {
        self.functions.insert(name.to_string(), function)
    }

    /// Registers an eager synchronous function.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use exp_eval::context::EvalConfiguration;
    /// use exp_eval::engine::execute;
    /// use exp_eval::value::Value;
    ///
    /// let mut cfg = EvalConfiguration::double();
    /// cfg.register_function("count", |_, args| Ok(Value::from(args.len() as f64)));
    ///
    /// let result = execute("count(1, 'a', x)", &Arc::new(cfg)).unwrap();
    /// assert_eq!(result, Value::from(3.0));
    /// ```
    pub fn register_function<F>(&mut self, name: &str, body: F)
    where
        F: Fn(&EvalConfiguration, &FunctionArgs<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        self.set_function(name, EvalFunction::new(body));
    }

    pub fn remove_function(&mut self, name: &str) -> Option<EvalFunction> {
        self.functions.remove(name)
    }

    pub fn clear_functions(&mut self) {
        self.functions.clear();
    }

    /// Mutable access to the generic constants, cloning the shared table first.
    pub fn generic_constants_mut(&mut self) -> &mut HashMap<String, Value> {
        Arc::make_mut(&mut self.generic_constants)
    }

    /// Mutable access to the generic functions, cloning the shared table first.
    pub fn generic_functions_mut(&mut self) -> &mut HashMap<String, EvalFunction> {
        Arc::make_mut(&mut self.generic_functions)
    }

    /// Looks up a constant: instance table then generic table, exact name then upper-cased.
    pub fn constant(&self, name: &str) -> Option<&Value> {
        lookup(&self.constants, name).or_else(|| lookup(&self.generic_constants, name))
    }

    /// Looks up a function: instance table then generic table, exact name then upper-cased.
    pub fn function(&self, name: &str) -> Option<&EvalFunction> {
        lookup(&self.functions, name).or_else(|| lookup(&self.generic_functions, name))
    }
}

fn lookup<'m, T>(map: &'m HashMap<String, T>, name: &str) -> Option<&'m T> {
    map.get(name).or_else(|| {
        let upper = name.to_uppercase();
        if upper == name { None } else { map.get(&upper) }
    })
}

impl Default for EvalConfiguration {
    fn default() -> Self {
        Self::double()
    }
}

impl fmt::Debug for EvalConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut functions: Vec<_> = self.functions.keys().collect();
        functions.sort();
        f.debug_struct("EvalConfiguration")
            .field("numeric_type", &self.numeric_type)
            .field("grammar", &self.grammar)
            .field("constants", &self.constants)
            .field("functions", &functions)
            .field("generic_constants", &self.generic_constants.len())
            .field("generic_functions", &self.generic_functions.len())
            .field("const_provider", &self.const_provider.is_some())
            .field("async_const_provider", &self.async_const_provider.is_some())
            .field("number_format", &self.number_format)
            .field("auto_parse_numeric_strings", &self.auto_parse_numeric_strings)
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_prefers_exact_then_upper() {
        let mut cfg = EvalConfiguration::double();
        cfg.set_constant("X", 1.0);
        cfg.set_constant("x", 2.0);
        assert_eq!(cfg.constant("x"), Some(&Value::from(2.0)));
        assert_eq!(cfg.constant("X"), Some(&Value::from(1.0)));

        cfg.remove_constant("x");
        assert_eq!(cfg.constant("x"), Some(&Value::from(1.0)));
        assert!(cfg.constant("Y").is_none());
    }

    #[test]
    fn test_instance_constants_shadow_generic() {
        let mut cfg = EvalConfiguration::double();
        assert_eq!(cfg.constant("pi"), Some(&Value::from(core::f64::consts::PI)));
        cfg.set_constant("PI", 3.0);
        assert_eq!(cfg.constant("pi"), Some(&Value::from(3.0)));
        cfg.clear_constants();
        assert_eq!(cfg.constant("Pi"), Some(&Value::from(core::f64::consts::PI)));
    }

    #[test]
    fn test_function_lookup() {
        let mut cfg = EvalConfiguration::double();
        assert!(cfg.function("max").is_some());
        assert!(cfg.function("nope").is_none());

        cfg.set_function("nope", EvalFunction::lazy(|_, _| Ok(Value::Null)));
        assert!(cfg.function("nope").is_some_and(EvalFunction::is_lazy));
        cfg.clear_functions();
        assert!(cfg.function("nope").is_none());
    }

    #[test]
    fn test_generic_tables_copy_on_write() {
        let base = EvalConfiguration::double();
        let mut changed = base.clone();
        changed.generic_constants_mut().insert("ANSWER".into(), Value::from(42.0));
        changed.generic_functions_mut().remove("MAX");

        assert!(base.constant("answer").is_none());
        assert!(changed.constant("answer").is_some());
        assert!(base.function("max").is_some());
        assert!(changed.function("max").is_none());
    }

    #[test]
    fn test_debug_output() {
        let cfg = EvalConfiguration::int64().with_number_format(Some(NumberFormat::COMMA_DECIMAL));
        let text = format!("{:?}", cfg);
        assert!(text.contains("I64"));
        assert!(text.contains("COMMA") || text.contains("','"));
    }
}
