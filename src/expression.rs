//! Compiled expressions.
//!
//! A [`CompiledExpression`] pairs an immutable tree with the configuration it
//! was compiled against. It can be executed any number of times, from any
//! number of threads, and against other configurations that share its
//! grammar.

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::context::{EvalConfiguration, EvalFunction};
use crate::error::Result;
use crate::eval::{evaluate, evaluate_async};
use crate::types::{ExprNode, VariableInfo};
use crate::value::Value;

/// An expression tree ready for evaluation.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use exp_eval::context::EvalConfiguration;
/// use exp_eval::engine::compile;
/// use exp_eval::value::Value;
///
/// let cfg = Arc::new(EvalConfiguration::double());
/// let mut expr = compile("x * 2", &cfg).unwrap();
///
/// expr.set_constant("x", 4.0);
/// assert_eq!(expr.execute().unwrap(), Value::from(8.0));
///
/// expr.set_constant("x", 5.0);
/// assert_eq!(expr.execute().unwrap(), Value::from(10.0));
/// ```
#[derive(Debug, Clone)]
pub struct CompiledExpression {
    root: Arc<ExprNode>,
    configuration: Arc<EvalConfiguration>,
}

impl CompiledExpression {
    pub fn new(root: Arc<ExprNode>, configuration: Arc<EvalConfiguration>) -> Self {
        Self {
            root,
            configuration,
        }
    }

    pub fn root(&self) -> &ExprNode {
        &self.root
    }

    /// Evaluates against the configuration the expression was compiled with.
    pub fn execute(&self) -> Result<Value> {
        evaluate(&self.root, &self.configuration)
    }

    /// Evaluates against another configuration.
    ///
    /// The tree keeps the grammar it was compiled with; only constants,
    /// functions and named operations come from `configuration`.
    pub fn execute_with(&self, configuration: &Arc<EvalConfiguration>) -> Result<Value> {
        evaluate(&self.root, configuration)
    }

    /// Evaluates asynchronously, observing `cancel` at every node.
    ///
    /// ```
    /// use std::sync::Arc;
    /// use exp_eval::context::EvalConfiguration;
    /// use exp_eval::engine::compile;
    /// use exp_eval::error::ExprError;
    /// use futures::executor::block_on;
    /// use tokio_util::sync::CancellationToken;
    ///
    /// let cfg = Arc::new(EvalConfiguration::double());
    /// let expr = compile("1 + 2", &cfg).unwrap();
    ///
    /// let cancel = CancellationToken::new();
    /// assert_eq!(block_on(expr.execute_async(&cancel)).unwrap().as_f64(), Some(3.0));
    ///
    /// cancel.cancel();
    /// assert_eq!(block_on(expr.execute_async(&cancel)), Err(ExprError::Cancelled));
    /// ```
    pub fn execute_async<'a>(&'a self, cancel: &'a CancellationToken) -> BoxFuture<'a, Result<Value>> {
        evaluate_async(&self.root, &self.configuration, cancel)
    }

    pub fn execute_async_with<'a>(
        &'a self,
        configuration: &'a Arc<EvalConfiguration>,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<Value>> {
        evaluate_async(&self.root, configuration, cancel)
    }

    pub fn configuration(&self) -> &Arc<EvalConfiguration> {
        &self.configuration
    }

    /// Mutable access to the configuration.
    ///
    /// Clones the configuration first when it is shared, so other expressions
    /// and threads holding it never observe the change.
    pub fn configuration_mut(&mut self) -> &mut EvalConfiguration {
        Arc::make_mut(&mut self.configuration)
    }

    pub fn set_constant(&mut self, name: &str, value: impl Into<Value>) -> Option<Value> {
        self.configuration_mut().set_constant(name, value)
    }

    pub fn remove_constant(&mut self, name: &str) -> Option<Value> {
        self.configuration_mut().remove_constant(name)
    }

    pub fn clear_constants(&mut self) {
        self.configuration_mut().clear_constants();
    }

    pub fn set_function(&mut self, name: &str, function: EvalFunction) -> Option<EvalFunction> {
        self.configuration_mut().set_function(name, function)
    }

    pub fn remove_function(&mut self, name: &str) -> Option<EvalFunction> {
        self.configuration_mut().remove_function(name)
    }

    pub fn clear_functions(&mut self) {
        self.configuration_mut().clear_functions();
    }

    /// Identifiers used as values, in source order, duplicates included.
    ///
    /// Function names are not listed; identifiers inside call arguments are.
    pub fn variables(&self) -> Vec<VariableInfo> {
        let mut out = Vec::new();
        self.root.collect_variables(&mut out);
        out
    }
}
