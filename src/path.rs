//! Field paths used to address bindings and nested document values.
//!
//! A path is written `a.b[0].c`: dot-separated field names with optional
//! bracketed array indexes.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::{StreamError, StreamResult};

/// One step of a [`Path`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathFragment {
    Field(String),
    Index(usize),
}

/// A field-name path such as `address.city` or `tags[1]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Path(Vec<PathFragment>);

impl Path {
    /// Path made of a single field name.
    pub fn field(name: impl Into<String>) -> Self {
        Path(vec![PathFragment::Field(name.into())])
    }

    pub fn fragments(&self) -> &[PathFragment] {
        &self.0
    }

    /// The leading field name, which names the binding in an environment.
    pub fn head(&self) -> Option<&str> {
        match self.0.first() {
            Some(PathFragment::Field(name)) => Some(name),
            _ => None,
        }
    }

    /// Walk the path into `value`, returning `None` on the first miss.
    pub fn resolve<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        resolve_fragments(&self.0, value)
    }

    /// Walk everything after the head into `value`.
    pub(crate) fn resolve_tail<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        resolve_fragments(self.0.get(1..).unwrap_or_default(), value)
    }
}

fn resolve_fragments<'a>(fragments: &[PathFragment], value: &'a Value) -> Option<&'a Value> {
    let mut current = value;

    for fragment in fragments {
        current = match (fragment, current) {
            (PathFragment::Field(name), Value::Object(obj)) => obj.get(name)?,
            (PathFragment::Index(idx), Value::Array(arr)) => arr.get(*idx)?,
            _ => return None,
        };
    }

    Some(current)
}

impl FromStr for Path {
    type Err = StreamError;

    fn from_str(s: &str) -> StreamResult<Self> {
        let invalid = || StreamError::ParseError(format!("invalid path '{}'", s));
        let mut fragments = Vec::new();

        for part in s.split('.') {
            let (name, mut rest) = match part.find('[') {
                Some(pos) => part.split_at(pos),
                None => (part, ""),
            };

            if name.is_empty() {
                // Only the very first segment may be a bare index, e.g. `[0].a`.
                if !(fragments.is_empty() && !rest.is_empty()) {
                    return Err(invalid());
                }
            } else {
                fragments.push(PathFragment::Field(name.to_string()));
            }

            while !rest.is_empty() {
                let close = rest.find(']').ok_or_else(invalid)?;
                if !rest.starts_with('[') {
                    return Err(invalid());
                }
                let idx = rest[1..close].parse::<usize>().map_err(|_| invalid())?;
                fragments.push(PathFragment::Index(idx));
                rest = &rest[close + 1..];
            }
        }

        if fragments.is_empty() {
            return Err(invalid());
        }

        Ok(Path(fragments))
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, fragment) in self.0.iter().enumerate() {
            match fragment {
                PathFragment::Field(name) => {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(name)?;
                }
                PathFragment::Index(idx) => write!(f, "[{}]", idx)?,
            }
        }
        Ok(())
    }
}
