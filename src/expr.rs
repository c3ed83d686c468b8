//! Expression evaluation against an [`Environment`].
//!
//! Operators only depend on the [`Expr`] trait, so a query planner can plug
//! in its own expression tree. [`Expression`] is the tree this crate ships
//! with: enough to express projections, predicates, counts and accumulators.

use std::fmt;
use std::ops;

use serde_json::Value;

use crate::environment::Environment;
use crate::error::{StreamError, StreamResult};
use crate::path::Path;
use crate::stream::{ACCUMULATOR_VAR, GROUP_KEY_VAR};
use crate::value::{self, ArithmeticOp};

/// Anything that can be evaluated against an environment.
///
/// Evaluation must not mutate the environment.
pub trait Expr: fmt::Debug + fmt::Display + Send + Sync {
    fn eval(&self, env: &Environment) -> StreamResult<Value>;
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    In,
    Like,
    And,
    Or,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulus,
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOperator::Equal => "=",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessThanOrEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterThanOrEqual => ">=",
            BinaryOperator::In => "IN",
            BinaryOperator::Like => "LIKE",
            BinaryOperator::And => "AND",
            BinaryOperator::Or => "OR",
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulus => "%",
        };
        f.write_str(s)
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Negate,
}

/// Expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// A constant value.
    Literal(Value),
    /// The row being processed.
    Current,
    /// A path into the current row. Missing fields evaluate to null.
    Field(Path),
    /// A binding looked up through the environment chain.
    Variable(Path),
    /// The group key bound by GroupBy.
    GroupKey,
    /// The running accumulator bound by Reduce.
    Accumulator,
    Unary(UnaryOperator, Box<Expression>),
    Binary(Box<Expression>, BinaryOperator, Box<Expression>),
}

impl Expression {
    pub fn lit(value: impl Into<Value>) -> Self {
        Expression::Literal(value.into())
    }

    /// Top-level field of the current row.
    pub fn field(name: &str) -> Self {
        Expression::Field(Path::field(name))
    }

    /// Variable bound in the environment chain.
    pub fn var(name: &str) -> Self {
        Expression::Variable(Path::field(name))
    }

    pub fn binary(left: Expression, op: BinaryOperator, right: Expression) -> Self {
        Expression::Binary(Box::new(left), op, Box::new(right))
    }

    pub fn equals(self, rhs: Expression) -> Self {
        Self::binary(self, BinaryOperator::Equal, rhs)
    }

    pub fn lt(self, rhs: Expression) -> Self {
        Self::binary(self, BinaryOperator::LessThan, rhs)
    }

    pub fn lte(self, rhs: Expression) -> Self {
        Self::binary(self, BinaryOperator::LessThanOrEqual, rhs)
    }

    pub fn gt(self, rhs: Expression) -> Self {
        Self::binary(self, BinaryOperator::GreaterThan, rhs)
    }

    pub fn gte(self, rhs: Expression) -> Self {
        Self::binary(self, BinaryOperator::GreaterThanOrEqual, rhs)
    }

    pub fn and(self, rhs: Expression) -> Self {
        Self::binary(self, BinaryOperator::And, rhs)
    }

    pub fn or(self, rhs: Expression) -> Self {
        Self::binary(self, BinaryOperator::Or, rhs)
    }

    fn current_value(env: &Environment) -> StreamResult<&Value> {
        env.current_value()
            .ok_or_else(|| StreamError::NotFound("current value".to_string()))
    }

    // Reserved names are reported by their display name.
    fn reserved(env: &Environment, name: &str, display: &str) -> StreamResult<Value> {
        env.get(&Path::field(name))
            .cloned()
            .map_err(|_| StreamError::NotFound(display.to_string()))
    }

    fn eval_binary(
        left: &Expression,
        op: BinaryOperator,
        right: &Expression,
        env: &Environment,
    ) -> StreamResult<Value> {
        let lhs = left.eval(env)?;

        // AND / OR short-circuit
        match op {
            BinaryOperator::And if !value::is_truthy(&lhs) => return Ok(Value::Bool(false)),
            BinaryOperator::Or if value::is_truthy(&lhs) => return Ok(Value::Bool(true)),
            _ => {}
        }

        let rhs = right.eval(env)?;
        let arithmetic = |op| value::arithmetic(&lhs, op, &rhs);

        match op {
            BinaryOperator::Equal => Ok(Value::Bool(value::values_equal(&lhs, &rhs))),
            BinaryOperator::NotEqual => Ok(Value::Bool(!value::values_equal(&lhs, &rhs))),
            BinaryOperator::LessThan => Ok(Value::Bool(value::compare_values(&lhs, &rhs).is_lt())),
            BinaryOperator::LessThanOrEqual => {
                Ok(Value::Bool(value::compare_values(&lhs, &rhs).is_le()))
            }
            BinaryOperator::GreaterThan => {
                Ok(Value::Bool(value::compare_values(&lhs, &rhs).is_gt()))
            }
            BinaryOperator::GreaterThanOrEqual => {
                Ok(Value::Bool(value::compare_values(&lhs, &rhs).is_ge()))
            }
            BinaryOperator::In => match &rhs {
                Value::Array(arr) => Ok(Value::Bool(
                    arr.iter().any(|v| value::values_equal(&lhs, v)),
                )),
                Value::Object(obj) => Ok(Value::Bool(
                    lhs.as_str().is_some_and(|key| obj.contains_key(key)),
                )),
                _ => Ok(Value::Bool(false)),
            },
            BinaryOperator::Like => match (lhs.as_str(), rhs.as_str()) {
                (Some(text), Some(pattern)) => Ok(Value::Bool(value::like(text, pattern)?)),
                _ => Ok(Value::Bool(false)),
            },
            BinaryOperator::And | BinaryOperator::Or => Ok(Value::Bool(value::is_truthy(&rhs))),
            BinaryOperator::Add => arithmetic(ArithmeticOp::Add),
            BinaryOperator::Subtract => arithmetic(ArithmeticOp::Subtract),
            BinaryOperator::Multiply => arithmetic(ArithmeticOp::Multiply),
            BinaryOperator::Divide => arithmetic(ArithmeticOp::Divide),
            BinaryOperator::Modulus => arithmetic(ArithmeticOp::Modulus),
        }
    }
}

impl Expr for Expression {
    fn eval(&self, env: &Environment) -> StreamResult<Value> {
        match self {
            Expression::Literal(v) => Ok(v.clone()),

            Expression::Current => Self::current_value(env).cloned(),

            Expression::Field(path) => {
                let row = Self::current_value(env)?;
                Ok(path.resolve(row).cloned().unwrap_or(Value::Null))
            }

            Expression::Variable(path) => env.get(path).cloned(),

            Expression::GroupKey => Self::reserved(env, GROUP_KEY_VAR, "_group"),

            Expression::Accumulator => Self::reserved(env, ACCUMULATOR_VAR, "_acc"),

            Expression::Unary(op, operand) => {
                let v = operand.eval(env)?;
                match op {
                    UnaryOperator::Not => Ok(Value::Bool(!value::is_truthy(&v))),
                    UnaryOperator::Negate => {
                        value::arithmetic(&Value::from(0), ArithmeticOp::Subtract, &v)
                    }
                }
            }

            Expression::Binary(left, op, right) => Self::eval_binary(left, *op, right, env),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(v) => f.write_str(&value::format_value(v)),
            Expression::Current => f.write_str("_"),
            Expression::Field(path) => write!(f, "{}", path),
            Expression::Variable(path) => write!(f, "@{}", path),
            Expression::GroupKey => f.write_str("_group"),
            Expression::Accumulator => f.write_str("_acc"),
            Expression::Unary(UnaryOperator::Not, operand) => write!(f, "NOT {}", Operand(operand)),
            Expression::Unary(UnaryOperator::Negate, operand) => write!(f, "-{}", Operand(operand)),
            Expression::Binary(left, op, right) => {
                write!(f, "{} {} {}", Operand(left), op, Operand(right))
            }
        }
    }
}

// Parenthesizes nested operator expressions.
struct Operand<'a>(&'a Expression);

impl fmt::Display for Operand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Expression::Binary(..) | Expression::Unary(..) => write!(f, "({})", self.0),
            other => write!(f, "{}", other),
        }
    }
}

macro_rules! impl_arithmetic {
    ($trait:ident, $method:ident, $op:expr) => {
        impl ops::$trait for Expression {
            type Output = Expression;

            fn $method(self, rhs: Expression) -> Expression {
                Expression::binary(self, $op, rhs)
            }
        }
    };
}

impl_arithmetic!(Add, add, BinaryOperator::Add);
impl_arithmetic!(Sub, sub, BinaryOperator::Subtract);
impl_arithmetic!(Mul, mul, BinaryOperator::Multiply);
impl_arithmetic!(Div, div, BinaryOperator::Divide);
impl_arithmetic!(Rem, rem, BinaryOperator::Modulus);

impl ops::Not for Expression {
    type Output = Expression;

    fn not(self) -> Expression {
        Expression::Unary(UnaryOperator::Not, Box::new(self))
    }
}

impl ops::Neg for Expression {
    type Output = Expression;

    fn neg(self) -> Expression {
        Expression::Unary(UnaryOperator::Negate, Box::new(self))
    }
}
