//! Sources feeding a stream.
//!
//! A source pushes environments into a callback until it runs out or the
//! callback asks it to stop. Sources are forward-only: iterating consumes
//! them.

use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

use serde_json::Value;

use crate::environment::Environment;
use crate::error::{StreamError, StreamResult};

/// Callback receiving each environment produced by a source.
pub type Visit<'a> = &'a mut dyn FnMut(Arc<Environment>) -> StreamResult<ControlFlow<()>>;

/// Producer of the environments a stream processes.
pub trait Source: fmt::Display + Send {
    /// Push every environment to `visit`, stopping early when it breaks.
    /// Errors returned by `visit` are passed through unchanged.
    fn iterate(self: Box<Self>, visit: Visit<'_>) -> StreamResult<()>;
}

/// Source producing one root environment per value, with the value as its
/// current value.
pub struct Rows<I> {
    rows: I,
}

impl<I> Rows<I>
where
    I: Iterator<Item = Value>,
{
    pub fn new(rows: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            rows: rows.into_iter(),
        }
    }
}

impl<I> Source for Rows<I>
where
    I: Iterator<Item = Value> + Send,
{
    fn iterate(self: Box<Self>, visit: Visit<'_>) -> StreamResult<()> {
        for value in self.rows {
            let env = Arc::new(Environment::with_current_value(value));
            if visit(env)?.is_break() {
                break;
            }
        }
        Ok(())
    }
}

impl<I> fmt::Display for Rows<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("rows")
    }
}

/// Source producing a single empty environment.
///
/// Used as the input of streams whose operator already owns its data, such
/// as a piped `Reduce`. It renders as nothing in pipeline descriptions.
pub struct Once;

impl Source for Once {
    fn iterate(self: Box<Self>, visit: Visit<'_>) -> StreamResult<()> {
        visit(Arc::new(Environment::new()))?;
        Ok(())
    }
}

impl fmt::Display for Once {
    fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Ok(())
    }
}

/// Fails the traversal once the inner source produced more than `max`
/// environments.
pub struct Limited {
    inner: Box<dyn Source>,
    max: u64,
}

impl Limited {
    pub fn new(inner: Box<dyn Source>, max: u64) -> Self {
        Self { inner, max }
    }
}

impl Source for Limited {
    fn iterate(self: Box<Self>, visit: Visit<'_>) -> StreamResult<()> {
        let max = self.max;
        let mut scanned = 0u64;

        self.inner.iterate(&mut |env| {
            scanned += 1;
            if scanned > max {
                tracing::warn!("Scan limit of {} items exceeded", max);
                return Err(StreamError::LimitExceeded(format!(
                    "source produced more than {} items",
                    max
                )));
            }
            visit(env)
        })
    }
}

impl fmt::Display for Limited {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[max_scan_items={}]", self.inner, self.max)
    }
}
