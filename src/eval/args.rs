//! Arguments handed to host functions.
//!
//! Eager functions receive values computed left to right before the call.
//! Lazy functions receive thunks: each one holds an argument subtree and
//! evaluates it on [`force`](LazyArg::force), again on every force, and not
//! at all when the body never asks for it.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::context::EvalConfiguration;
use crate::error::{ExprError, Result};
use crate::types::ExprNode;
use crate::value::Value;

use super::async_eval::eval_node_async;
use super::evaluator::eval_node;

fn missing(index: usize, len: usize) -> ExprError {
    ExprError::InvalidArgument {
        message: format!("argument {} requested but only {} supplied", index + 1, len),
    }
}

/// Arguments of a synchronous function body.
#[derive(Debug)]
pub enum FunctionArgs<'a> {
    Eager(Vec<Value>),
    Lazy(Vec<LazyArg<'a>>),
}

impl FunctionArgs<'_> {
    pub fn len(&self) -> usize {
        match self {
            FunctionArgs::Eager(values) => values.len(),
            FunctionArgs::Lazy(thunks) => thunks.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value of argument `index`, forcing it when lazy.
    ///
    /// An index past the end is an [`ExprError::InvalidArgument`]; an empty
    /// argument such as the last one in `f(a,)` is [`Value::Null`].
    pub fn get(&self, index: usize) -> Result<Value> {
        match self {
            FunctionArgs::Eager(values) => values
                .get(index)
                .cloned()
                .ok_or_else(|| missing(index, values.len())),
            FunctionArgs::Lazy(thunks) => thunks
                .get(index)
                .ok_or_else(|| missing(index, thunks.len()))?
                .force(),
        }
    }

    /// Every argument value in order, forcing all thunks.
    pub fn values(&self) -> Result<Vec<Value>> {
        (0..self.len()).map(|i| self.get(i)).collect()
    }
}

/// A deferred synchronous argument.
#[derive(Debug, Clone, Copy)]
pub struct LazyArg<'a> {
    node: Option<&'a ExprNode>,
    configuration: &'a Arc<EvalConfiguration>,
    depth: usize,
}

impl<'a> LazyArg<'a> {
    pub(crate) fn new(node: Option<&'a ExprNode>, configuration: &'a Arc<EvalConfiguration>, depth: usize) -> Self {
        Self {
            node,
            configuration,
            depth,
        }
    }

    /// True for an empty argument slot.
    pub fn is_empty(&self) -> bool {
        self.node.is_none()
    }

    pub fn force(&self) -> Result<Value> {
        match self.node {
            Some(node) => {
                trace!(position = node.position(), "forcing lazy argument");
                eval_node(node, self.configuration, self.depth)
            }
            None => Ok(Value::Null),
        }
    }
}

/// Arguments of an asynchronous function body.
///
/// Owned, so the body's future can be `'static`.
#[derive(Debug, Clone)]
pub enum AsyncArgs {
    Eager(Vec<Value>),
    Lazy(Vec<AsyncLazyArg>),
}

impl AsyncArgs {
    pub fn len(&self) -> usize {
        match self {
            AsyncArgs::Eager(values) => values.len(),
            AsyncArgs::Lazy(thunks) => thunks.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value of argument `index`, awaiting it when lazy.
    pub async fn get(&self, index: usize) -> Result<Value> {
        match self {
            AsyncArgs::Eager(values) => values
                .get(index)
                .cloned()
                .ok_or_else(|| missing(index, values.len())),
            AsyncArgs::Lazy(thunks) => {
                let thunk = thunks.get(index).ok_or_else(|| missing(index, thunks.len()))?;
                thunk.force().await
            }
        }
    }

    /// Every argument value, forced one after the other.
    pub async fn values(&self) -> Result<Vec<Value>> {
        let mut values = Vec::with_capacity(self.len());
        for index in 0..self.len() {
            values.push(self.get(index).await?);
        }
        Ok(values)
    }
}

/// A deferred asynchronous argument.
///
/// Holds its subtree, the configuration, the cancellation token and the
/// nesting depth of the call that created it.
#[derive(Debug, Clone)]
pub struct AsyncLazyArg {
    node: Option<Arc<ExprNode>>,
    configuration: Arc<EvalConfiguration>,
    cancel: CancellationToken,
    depth: usize,
}

impl AsyncLazyArg {
    pub(crate) fn new(
        node: Option<Arc<ExprNode>>,
        configuration: Arc<EvalConfiguration>,
        cancel: CancellationToken,
        depth: usize,
    ) -> Self {
        Self {
            node,
            configuration,
            cancel,
            depth,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.node.is_none()
    }

    pub async fn force(&self) -> Result<Value> {
        match &self.node {
            Some(node) => {
                trace!(position = node.position(), "forcing async lazy argument");
                eval_node_async(node, &self.configuration, &self.cancel, self.depth).await
            }
            None => Ok(Value::Null),
        }
    }
}
