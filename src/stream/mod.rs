//! Lazy stream pipelines.
//!
//! A [`Stream`] is a source followed by operators. Nothing runs until
//! [`Stream::iterate`] is called; each row is then pulled from the source and
//! threaded through every operator, left to right, before the next one is
//! pulled.
//!
//! ```rust
//! use docstream::{Expression, Map, Skip, Stream, Take};
//! use serde_json::json;
//!
//! let stream = Stream::from_values((1..=5).map(|i| json!(i)))
//!     .pipe(Skip::new(Expression::lit(1)))
//!     .pipe(Take::new(Expression::lit(2)))
//!     .pipe(Map::new(Expression::Current * Expression::lit(10)));
//!
//! assert_eq!(stream.to_string(), "rows | skip(1) | take(2) | map(_ * 10)");
//! assert_eq!(stream.collect_values().unwrap(), vec![json!(20), json!(30)]);
//! ```
//!
//! Iterating consumes the stream, so a traversal cannot be replayed:
//!
//! ```rust,compile_fail
//! use docstream::{Expression, Stream, Take};
//! use serde_json::json;
//! use std::ops::ControlFlow;
//!
//! let stream = Stream::from_values(vec![json!(1)]).pipe(Take::new(Expression::lit(1)));
//! stream.iterate(|_| Ok(ControlFlow::Continue(()))).unwrap();
//! stream.iterate(|_| Ok(ControlFlow::Continue(()))).unwrap();
//! ```

mod operator;
mod source;

use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

use serde_json::Value;

use crate::config::StreamConfig;
use crate::environment::Environment;
use crate::error::{StreamError, StreamResult};

pub use operator::{
    Filter, Flow, GroupBy, Map, Operator, Reduce, Skip, Step, Take, ACCUMULATOR_VAR,
    GROUP_KEY_VAR,
};
pub use source::{Limited, Once, Rows, Source, Visit};

/// A source plus an optional operator applied to everything it produces.
///
/// Piping an operator wraps the receiver: the new stream's input is the
/// old stream.
pub struct Stream {
    input: Input,
    operator: Option<Box<dyn Operator>>,
}

enum Input {
    Source(Box<dyn Source>),
    Stream(Box<Stream>),
}

/// A stream whose operators have all been built, innermost first.
struct Pipeline {
    source: Box<dyn Source>,
    steps: Vec<Box<dyn Step>>,
}

impl Stream {
    pub fn from_source(source: impl Source + 'static) -> Self {
        Self {
            input: Input::Source(Box::new(source)),
            operator: None,
        }
    }

    /// Stream over plain values, one row per value.
    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: Send + 'static,
    {
        Self::from_source(Rows::new(values))
    }

    /// Stream over `source`, enforcing the scan limit of `config`.
    pub fn scan(source: impl Source + 'static, config: &StreamConfig) -> Self {
        match config.limits.max_scan_items {
            Some(max) => Self::from_source(Limited::new(Box::new(source), max)),
            None => Self::from_source(source),
        }
    }

    /// Return a new stream applying `op` to everything this one produces.
    pub fn pipe<O: Operator + 'static>(self, op: O) -> Stream {
        op.attach(self)
    }

    pub(crate) fn append(self, op: Box<dyn Operator>) -> Stream {
        Stream {
            input: Input::Stream(Box::new(self)),
            operator: Some(op),
        }
    }

    /// Run the pipeline, calling `f` with every environment that makes it
    /// through all operators.
    ///
    /// Every operator is built before the first row is pulled, so a build
    /// error anywhere in the chain fails the traversal even when a later
    /// `take(0)` would have produced nothing.
    ///
    /// Returns `Ok(())` when the source is exhausted, when an operator
    /// closes the stream, or when `f` breaks. Any error from an operator,
    /// from the source or from `f` stops the traversal and is returned;
    /// rows already handed to `f` stay delivered.
    pub fn iterate<F>(self, mut f: F) -> StreamResult<()>
    where
        F: FnMut(Arc<Environment>) -> StreamResult<ControlFlow<()>>,
    {
        let rendered = tracing::enabled!(tracing::Level::DEBUG).then(|| self.to_string());
        let rendered = rendered.as_deref().unwrap_or_default();
        tracing::debug!("Stream: iterating {}", rendered);

        let mut delivered = 0usize;
        let result = self.open().and_then(|pipeline| {
            pipeline.run(&mut |env| {
                delivered += 1;
                f(env)
            })
        });

        match &result {
            Ok(()) => tracing::debug!("Stream: {} delivered {} rows", rendered, delivered),
            Err(e) => tracing::debug!(
                "Stream: {} failed after {} rows: {}",
                rendered,
                delivered,
                e
            ),
        }
        result
    }

    /// Build the step of every operator without pulling any row.
    fn open(self) -> StreamResult<Pipeline> {
        let mut pipeline = match self.input {
            Input::Source(source) => Pipeline {
                source,
                steps: Vec::new(),
            },
            Input::Stream(inner) => inner.open()?,
        };
        if let Some(operator) = self.operator {
            pipeline.steps.push(operator.build()?);
        }
        Ok(pipeline)
    }

    /// Run the pipeline and collect the current value of every output row.
    pub fn collect_values(self) -> StreamResult<Vec<Value>> {
        let mut values = Vec::new();
        self.iterate(|env| {
            let value = env
                .current_value()
                .ok_or_else(|| StreamError::NotFound("current value".to_string()))?;
            values.push(value.clone());
            Ok(ControlFlow::Continue(()))
        })?;
        Ok(values)
    }
}

impl Pipeline {
    fn run(self, visit: Visit<'_>) -> StreamResult<()> {
        let Pipeline { source, mut steps } = self;
        if steps.iter().any(|step| step.exhausted()) {
            return Ok(());
        }

        source.iterate(&mut |mut env| {
            // Set once a step has let through its final row.
            let mut last = false;
            for step in steps.iter_mut() {
                env = match step.call(env)? {
                    Flow::Emit(next) => next,
                    Flow::Last(next) => {
                        last = true;
                        next
                    }
                    Flow::Skip if last => return Ok(ControlFlow::Break(())),
                    Flow::Skip => return Ok(ControlFlow::Continue(())),
                    Flow::Close => return Ok(ControlFlow::Break(())),
                };
            }

            let flow = visit(env)?;
            Ok(if last { ControlFlow::Break(()) } else { flow })
        })
    }
}

impl fmt::Display for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Input::Source(source) => write!(f, "{}", source),
            Input::Stream(stream) => write!(f, "{}", stream),
        }
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(operator) = &self.operator else {
            return write!(f, "{}", self.input);
        };

        let input = self.input.to_string();
        if input.is_empty() {
            write!(f, "{}", operator)
        } else {
            write!(f, "{} | {}", input, operator)
        }
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Stream").field(&self.to_string()).finish()
    }
}
