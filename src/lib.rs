//! docstream - lazy stream operators for document query execution.
//!
//! A query plan is executed as a chain of operators pulling rows one at a
//! time from a source. Each row travels inside an [`Environment`], a scope
//! frame that can see the frames of enclosing query stages.
//!
//! # Main Components
//!
//! - **Environment**: hierarchical variable scope plus the current row
//! - **Expr / Expression**: expressions evaluated against an environment
//! - **Operators**: Map, Filter, Take, Skip, GroupBy, Reduce
//! - **Stream**: a source plus operators, driven by [`Stream::iterate`]
//! - **StreamConfig**: execution limits loaded from TOML
//!
//! # Example
//!
//! ```rust
//! use docstream::{Expression, Filter, Reduce, Stream};
//! use serde_json::json;
//!
//! let total = Stream::from_values(vec![json!(1), json!(2), json!(3), json!(4), json!(5)])
//!     .pipe(Filter::new(Expression::Current.gt(Expression::lit(3))))
//!     .pipe(Reduce::new(
//!         Expression::lit(0),
//!         Expression::Accumulator + Expression::Current,
//!     ))
//!     .collect_values()
//!     .unwrap();
//!
//! assert_eq!(total, vec![json!(9)]);
//! ```

pub mod config;
pub mod environment;
pub mod error;
pub mod expr;
pub mod path;
pub mod stream;
pub mod value;

// Re-export main types for convenience
pub use config::{ExecutionLimits, StreamConfig};
pub use environment::Environment;
pub use error::{StreamError, StreamResult};
pub use expr::{BinaryOperator, Expr, Expression, UnaryOperator};
pub use path::{Path, PathFragment};
pub use stream::{
    Filter, Flow, GroupBy, Map, Operator, Reduce, Rows, Skip, Source, Step, Stream, Take,
    ACCUMULATOR_VAR, GROUP_KEY_VAR,
};
