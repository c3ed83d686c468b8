//! Hierarchical variable scopes.
//!
//! An [`Environment`] is one frame of bindings plus a "current value" slot
//! holding the row being processed. Frames link to the frame they were
//! derived from, so lookups fall through to enclosing query scopes unless a
//! closer frame shadows the name.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{StreamError, StreamResult};
use crate::path::Path;

/// A single scope frame.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: HashMap<String, Value>,
    current: Option<Value>,
    outer: Option<Arc<Environment>>,
}

impl Environment {
    /// Create an empty root frame.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a root frame whose current value is `value`.
    pub fn with_current_value(value: Value) -> Self {
        Self {
            current: Some(value),
            ..Self::default()
        }
    }

    /// Create an empty frame whose lookups fall through to `outer`.
    pub fn derived(outer: Arc<Environment>) -> Self {
        Self {
            outer: Some(outer),
            ..Self::default()
        }
    }

    /// Look up `path`, searching local bindings first and then each outer
    /// frame in turn.
    ///
    /// The head of the path names the binding; the rest walks into the bound
    /// value. A frame that binds the head but cannot resolve the rest does
    /// not stop the search.
    pub fn get(&self, path: &Path) -> StreamResult<&Value> {
        let mut frame = self;
        loop {
            if let Some(value) = frame.get_local(path) {
                return Ok(value);
            }
            match frame.outer.as_deref() {
                Some(outer) => frame = outer,
                None => return Err(StreamError::NotFound(path.to_string())),
            }
        }
    }

    fn get_local(&self, path: &Path) -> Option<&Value> {
        let bound = self.vars.get(path.head()?)?;
        path.resolve_tail(bound)
    }

    /// Bind `name` in this frame, replacing any previous local binding.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    /// The row being processed: this frame's slot, or the nearest outer
    /// frame's when this one has none.
    pub fn current_value(&self) -> Option<&Value> {
        let mut frame = self;
        loop {
            if let Some(value) = &frame.current {
                return Some(value);
            }
            frame = frame.outer.as_deref()?;
        }
    }

    pub fn set_current_value(&mut self, value: Value) {
        self.current = Some(value);
    }

    pub fn outer(&self) -> Option<&Arc<Environment>> {
        self.outer.as_ref()
    }

    pub fn set_outer(&mut self, outer: Option<Arc<Environment>>) {
        self.outer = outer;
    }
}
