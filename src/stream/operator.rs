//! Stream operators.
//!
//! An [`Operator`] is configuration. Building it consumes the configuration
//! and produces a [`Step`]: a single-owner object that receives every
//! environment of one traversal and keeps whatever state that traversal
//! needs (counters, accumulators). Operators that are `Clone` can be cloned
//! before building to drive another traversal with fresh state.

use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

use serde_json::Value;

use crate::environment::Environment;
use crate::error::{StreamError, StreamResult};
use crate::expr::Expr;
use crate::path::Path;
use crate::value;

use super::source::Once;
use super::Stream;

/// Binding that holds the group key computed by [`GroupBy`].
///
/// The NUL prefix keeps it out of the namespace of document fields.
pub const GROUP_KEY_VAR: &str = "\u{0}group";

/// Binding that holds the running accumulator of [`Reduce`].
pub const ACCUMULATOR_VAR: &str = "\u{0}acc";

/// What a step decided for one incoming environment.
#[derive(Debug, Clone)]
pub enum Flow {
    /// Pass this environment to the rest of the pipeline.
    Emit(Arc<Environment>),
    /// Pass this environment on, then stop the traversal.
    Last(Arc<Environment>),
    /// Drop the incoming environment and continue with the next one.
    Skip,
    /// Stop the traversal gracefully. The incoming environment is dropped.
    Close,
}

/// Per-traversal state built by an [`Operator`].
pub trait Step: Send {
    fn call(&mut self, env: Arc<Environment>) -> StreamResult<Flow>;

    /// Whether the step would close on its very next call. Checked once
    /// every step of the pipeline is built, before the source is pulled.
    fn exhausted(&self) -> bool {
        false
    }
}

/// A configured stream transformer.
pub trait Operator: fmt::Display + Send {
    /// Build the step for one traversal. May evaluate expressions or, for
    /// [`Reduce`], drain a whole sub-stream.
    fn build(self: Box<Self>) -> StreamResult<Box<dyn Step>>;

    /// Attach this operator to the end of `stream`.
    fn attach(self, stream: Stream) -> Stream
    where
        Self: Sized + 'static,
    {
        stream.append(Box::new(self))
    }
}

/// Evaluate a count expression against an empty environment.
fn eval_count(expr: &dyn Expr) -> StreamResult<i64> {
    let v = expr.eval(&Environment::new())?;
    value::cast_to_integer(&v)
}

/// Applies an expression to each row and outputs the result.
#[derive(Debug, Clone)]
pub struct Map {
    expr: Arc<dyn Expr>,
}

impl Map {
    pub fn new(expr: impl Expr + 'static) -> Self {
        Self {
            expr: Arc::new(expr),
        }
    }
}

impl Operator for Map {
    fn build(self: Box<Self>) -> StreamResult<Box<dyn Step>> {
        Ok(Box::new(MapStep { expr: self.expr }))
    }
}

impl fmt::Display for Map {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "map({})", self.expr)
    }
}

struct MapStep {
    expr: Arc<dyn Expr>,
}

impl Step for MapStep {
    fn call(&mut self, env: Arc<Environment>) -> StreamResult<Flow> {
        let v = self.expr.eval(&env)?;
        let mut out = Environment::derived(env);
        out.set_current_value(v);
        Ok(Flow::Emit(Arc::new(out)))
    }
}

/// Drops every row whose predicate is not truthy.
#[derive(Debug, Clone)]
pub struct Filter {
    expr: Arc<dyn Expr>,
}

impl Filter {
    pub fn new(expr: impl Expr + 'static) -> Self {
        Self {
            expr: Arc::new(expr),
        }
    }
}

impl Operator for Filter {
    fn build(self: Box<Self>) -> StreamResult<Box<dyn Step>> {
        Ok(Box::new(FilterStep { expr: self.expr }))
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "filter({})", self.expr)
    }
}

struct FilterStep {
    expr: Arc<dyn Expr>,
}

impl Step for FilterStep {
    fn call(&mut self, env: Arc<Environment>) -> StreamResult<Flow> {
        let v = self.expr.eval(&env)?;
        if value::is_truthy(&v) {
            Ok(Flow::Emit(env))
        } else {
            tracing::trace!("filter: {} is not truthy, dropping row", self.expr);
            Ok(Flow::Skip)
        }
    }
}

/// Closes the stream once `n` rows went through.
///
/// `n` is evaluated once, when the step is built, and must be convertible
/// to an integer.
#[derive(Debug, Clone)]
pub struct Take {
    count: Arc<dyn Expr>,
}

impl Take {
    pub fn new(count: impl Expr + 'static) -> Self {
        Self {
            count: Arc::new(count),
        }
    }
}

impl Operator for Take {
    fn build(self: Box<Self>) -> StreamResult<Box<dyn Step>> {
        let limit = eval_count(self.count.as_ref())?;
        Ok(Box::new(TakeStep { limit, taken: 0 }))
    }
}

impl fmt::Display for Take {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "take({})", self.count)
    }
}

/// Step built by [`Take`].
///
/// The row that reaches the limit is emitted as [`Flow::Last`] so the
/// source is never asked for one more row. Calling the step again after
/// that keeps returning [`Flow::Close`].
struct TakeStep {
    limit: i64,
    taken: i64,
}

impl Step for TakeStep {
    fn call(&mut self, env: Arc<Environment>) -> StreamResult<Flow> {
        if self.taken >= self.limit {
            return Ok(Flow::Close);
        }

        self.taken += 1;
        if self.taken == self.limit {
            tracing::trace!("take: reached limit of {}", self.limit);
            Ok(Flow::Last(env))
        } else {
            Ok(Flow::Emit(env))
        }
    }

    fn exhausted(&self) -> bool {
        self.taken >= self.limit
    }
}

/// Ignores the first `n` rows of the stream.
#[derive(Debug, Clone)]
pub struct Skip {
    count: Arc<dyn Expr>,
}

impl Skip {
    pub fn new(count: impl Expr + 'static) -> Self {
        Self {
            count: Arc::new(count),
        }
    }
}

impl Operator for Skip {
    fn build(self: Box<Self>) -> StreamResult<Box<dyn Step>> {
        let limit = eval_count(self.count.as_ref())?;
        Ok(Box::new(SkipStep { limit, skipped: 0 }))
    }
}

impl fmt::Display for Skip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "skip({})", self.count)
    }
}

struct SkipStep {
    limit: i64,
    skipped: i64,
}

impl Step for SkipStep {
    fn call(&mut self, env: Arc<Environment>) -> StreamResult<Flow> {
        if self.skipped < self.limit {
            self.skipped += 1;
            return Ok(Flow::Skip);
        }
        Ok(Flow::Emit(env))
    }
}

/// Evaluates an expression on each row and binds the result as the group
/// key of a new frame.
///
/// Rows are neither filtered nor aggregated here; a downstream stage reads
/// the key through `Expression::GroupKey`.
#[derive(Debug, Clone)]
pub struct GroupBy {
    expr: Arc<dyn Expr>,
}

impl GroupBy {
    pub fn new(expr: impl Expr + 'static) -> Self {
        Self {
            expr: Arc::new(expr),
        }
    }
}

impl Operator for GroupBy {
    fn build(self: Box<Self>) -> StreamResult<Box<dyn Step>> {
        Ok(Box::new(GroupByStep { expr: self.expr }))
    }
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "groupBy({})", self.expr)
    }
}

struct GroupByStep {
    expr: Arc<dyn Expr>,
}

impl Step for GroupByStep {
    fn call(&mut self, env: Arc<Environment>) -> StreamResult<Flow> {
        let key = self.expr.eval(&env)?;
        let mut out = Environment::derived(env);
        out.set(GROUP_KEY_VAR, key);
        Ok(Flow::Emit(Arc::new(out)))
    }
}

/// Folds a whole stream into a single value.
///
/// The seed is evaluated against an empty frame and bound as the
/// accumulator. For every row of the input stream the accumulator
/// expression is evaluated in a frame whose outer scope is that row, and
/// its result replaces the accumulator.
///
/// Piping a `Reduce` onto a stream moves that stream inside the operator;
/// the resulting stream yields exactly one row holding the final value.
/// Group keys are not taken into account: every row folds into the same
/// accumulator.
#[derive(Debug)]
pub struct Reduce {
    seed: Arc<dyn Expr>,
    accumulator: Arc<dyn Expr>,
    input: Option<Stream>,
}

impl Reduce {
    pub fn new(seed: impl Expr + 'static, accumulator: impl Expr + 'static) -> Self {
        Self {
            seed: Arc::new(seed),
            accumulator: Arc::new(accumulator),
            input: None,
        }
    }

    /// Drain `input` completely and return the frame holding the final
    /// accumulator.
    ///
    /// This runs a full traversal of the input, at build time.
    fn fold_input(&self, input: Stream) -> StreamResult<Environment> {
        let mut frame = Environment::new();
        let seed = self.seed.eval(&frame)?;
        frame.set(ACCUMULATOR_VAR, seed);

        let mut folded = 0usize;
        input.iterate(|env| {
            frame.set_outer(Some(env));
            let acc = self.accumulator.eval(&frame)?;
            frame.set(ACCUMULATOR_VAR, acc);
            folded += 1;
            Ok(ControlFlow::Continue(()))
        })?;

        tracing::debug!("{}: folded {} rows", self, folded);
        frame.set_outer(None);
        Ok(frame)
    }
}

impl Operator for Reduce {
    fn build(mut self: Box<Self>) -> StreamResult<Box<dyn Step>> {
        let input = self.input.take().ok_or_else(|| {
            StreamError::InvalidPipeline(format!("{} is not attached to a stream", self))
        })?;

        let frame = self.fold_input(input)?;
        let result = frame.get(&Path::field(ACCUMULATOR_VAR))?.clone();

        Ok(Box::new(ReduceStep { frame, result }))
    }

    fn attach(mut self, stream: Stream) -> Stream
    where
        Self: Sized + 'static,
    {
        self.input = Some(stream);
        Stream::from_source(Once).append(Box::new(self))
    }
}

impl fmt::Display for Reduce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(input) = &self.input {
            write!(f, "{} | ", input)?;
        }
        write!(f, "reduce({}, {})", self.seed, self.accumulator)
    }
}

struct ReduceStep {
    frame: Environment,
    result: Value,
}

impl Step for ReduceStep {
    fn call(&mut self, env: Arc<Environment>) -> StreamResult<Flow> {
        let mut out = self.frame.clone();
        out.set_current_value(self.result.clone());
        out.set_outer(Some(env));
        Ok(Flow::Emit(Arc::new(out)))
    }
}
