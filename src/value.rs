//! Value helpers used by operators and the reference evaluator.
//!
//! Values are plain `serde_json::Value`s. This module provides the
//! coercions the stream operators rely on:
//! - is_truthy: boolean interpretation used by Filter
//! - cast_to_integer: integer coercion used by Take and Skip
//! - values_equal / compare_values: equality and ordering
//! - arithmetic: integer-preserving numeric operators
//! - format_value: SQL-like rendering used when displaying plans

use std::cmp::Ordering;

use regex::Regex;
use serde_json::{Number, Value};

use crate::error::{StreamError, StreamResult};

/// Convert a value to its boolean interpretation.
///
/// - Bool: returns the value
/// - Null: false
/// - Number: false if 0
/// - String, Array, Object: false if empty
#[inline]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().unwrap_or(0.0) != 0.0,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Coerce a value to an `i64`.
///
/// Doubles are truncated, booleans map to 0/1 and text is parsed.
/// Anything else is a `TypeError`.
pub fn cast_to_integer(value: &Value) -> StreamResult<i64> {
    let cast_error = || {
        StreamError::TypeError(format!("cannot cast {} as integer", format_value(value)))
    };

    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(i);
            }
            match n.as_f64() {
                Some(f) if f.is_finite() && f >= i64::MIN as f64 && f <= i64::MAX as f64 => {
                    Ok(f as i64)
                }
                _ => Err(cast_error()),
            }
        }
        Value::Bool(b) => Ok(i64::from(*b)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .or_else(|_| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite())
                        .map(|f| f as i64)
                        .ok_or(())
                })
                .map_err(|_| cast_error())
        }
        _ => Err(cast_error()),
    }
}

/// Compare two values for equality.
///
/// Numbers are compared by their f64 representation so `1` equals `1.0`.
#[inline]
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => a == b,
            _ => a.as_f64() == b.as_f64(),
        },
        _ => left == right,
    }
}

/// Compare two values for ordering.
///
/// Null < Bool < Number < String; mismatched other types compare equal.
#[inline]
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Bool(_), _) => Ordering::Less,
        (_, Value::Bool(_)) => Ordering::Greater,
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => {
                let a = a.as_f64().unwrap_or(0.0);
                let b = b.as_f64().unwrap_or(0.0);
                a.partial_cmp(&b).unwrap_or(Ordering::Equal)
            }
        },
        (Value::Number(_), Value::String(_)) => Ordering::Less,
        (Value::String(_), Value::Number(_)) => Ordering::Greater,
        (Value::String(a), Value::String(b)) => a.cmp(b),
        _ => Ordering::Equal,
    }
}

/// Create a Number from an f64, mapping non-finite results to 0.
#[inline]
pub fn number_from_f64(n: f64) -> Number {
    Number::from_f64(n).unwrap_or_else(|| Number::from(0))
}

/// Arithmetic operators supported by [`arithmetic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulus,
}

impl ArithmeticOp {
    fn verb(self) -> &'static str {
        match self {
            ArithmeticOp::Add => "add",
            ArithmeticOp::Subtract => "subtract",
            ArithmeticOp::Multiply => "multiply",
            ArithmeticOp::Divide => "divide",
            ArithmeticOp::Modulus => "modulus",
        }
    }
}

/// Apply an arithmetic operator.
///
/// Two integers produce an integer unless the operation overflows, in which
/// case the result is computed as a double. Text concatenates with `Add`.
pub fn arithmetic(left: &Value, op: ArithmeticOp, right: &Value) -> StreamResult<Value> {
    if let (Some(a), Some(b)) = (left.as_i64(), right.as_i64()) {
        if matches!(op, ArithmeticOp::Divide | ArithmeticOp::Modulus) && b == 0 {
            return Err(StreamError::EvaluationError("Division by zero".to_string()));
        }
        let exact = match op {
            ArithmeticOp::Add => a.checked_add(b),
            ArithmeticOp::Subtract => a.checked_sub(b),
            ArithmeticOp::Multiply => a.checked_mul(b),
            ArithmeticOp::Divide => a.checked_div(b),
            ArithmeticOp::Modulus => a.checked_rem(b),
        };
        if let Some(n) = exact {
            return Ok(Value::Number(Number::from(n)));
        }
    }

    if let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) {
        let result = match op {
            ArithmeticOp::Add => a + b,
            ArithmeticOp::Subtract => a - b,
            ArithmeticOp::Multiply => a * b,
            ArithmeticOp::Divide | ArithmeticOp::Modulus if b == 0.0 => {
                return Err(StreamError::EvaluationError("Division by zero".to_string()));
            }
            ArithmeticOp::Divide => a / b,
            ArithmeticOp::Modulus => a % b,
        };
        return Ok(Value::Number(number_from_f64(result)));
    }

    if let (ArithmeticOp::Add, Some(a), Some(b)) = (op, left.as_str(), right.as_str()) {
        return Ok(Value::String(format!("{}{}", a, b)));
    }

    Err(StreamError::EvaluationError(format!(
        "Cannot {} {} and {}",
        op.verb(),
        format_value(left),
        format_value(right)
    )))
}

/// Match `text` against a SQL LIKE pattern (`%` any sequence, `_` one char).
pub fn like(text: &str, pattern: &str) -> StreamResult<bool> {
    let mut regex_pattern = String::with_capacity(pattern.len() + 2);
    regex_pattern.push('^');
    for c in pattern.chars() {
        match c {
            '%' => regex_pattern.push_str(".*"),
            '_' => regex_pattern.push('.'),
            c => regex_pattern.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    regex_pattern.push('$');

    let re = Regex::new(&regex_pattern)
        .map_err(|e| StreamError::EvaluationError(format!("Invalid LIKE pattern: {}", e)))?;
    Ok(re.is_match(text))
}

/// Render a value the way query plans print literals.
///
/// Null prints as `NULL`, text is single-quoted, documents and arrays use
/// JSON notation with a space after separators.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i.to_string(),
            (None, Some(f)) => format_double(f),
            _ => n.to_string(),
        },
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(format_nested).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Object(obj) => {
            let fields: Vec<String> = obj
                .iter()
                .map(|(k, v)| format!("{}: {}", Value::String(k.clone()), format_nested(v)))
                .collect();
            format!("{{{}}}", fields.join(", "))
        }
    }
}

// Inside documents and arrays text uses JSON quoting.
fn format_nested(value: &Value) -> String {
    match value {
        Value::String(_) => value.to_string(),
        _ => format_value(value),
    }
}

fn format_double(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else if f.abs() >= 1e15 {
        let s = format!("{:e}", f);
        // Rust prints `1e15`; plans print `1e+15`.
        match s.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{}e+{}", mantissa, exp),
            _ => s,
        }
    } else {
        f.to_string()
    }
}
