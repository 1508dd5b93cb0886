//! Scalar and array values

use crate::error::ExcelError;
use crate::reference::Reference;
use std::fmt;

/// A value produced while evaluating a formula.
///
/// `Blank` represents an empty cell. It is *not* zero or the empty string:
/// arithmetic treats it as 0 while concatenation treats it as `""`, so the
/// coercion must happen at the operator, not here.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Blank,
    Number(f64),
    Bool(bool),
    Text(String),
    /// Two-dimensional grid, rows of equal length.
    Array(Vec<Vec<Value>>),
    Error(ExcelError),
}

impl Value {
    pub fn text<S: Into<String>>(s: S) -> Self {
        Value::Text(s.into())
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Value::Blank)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    /// The error code if this is an error value.
    pub fn as_error(&self) -> Option<ExcelError> {
        match self {
            Value::Error(e) => Some(*e),
            _ => None,
        }
    }

    /// The top-left element of an array, or the value itself for scalars.
    pub fn first_element(&self) -> Option<&Value> {
        match self {
            Value::Array(rows) => rows.first().and_then(|row| row.first()),
            other => Some(other),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<ExcelError> for Value {
    fn from(e: ExcelError) -> Self {
        Value::Error(e)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Blank => Ok(()),
            Value::Number(n) => {
                // Integral numbers print without a decimal point
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::Bool(true) => write!(f, "TRUE"),
            Value::Bool(false) => write!(f, "FALSE"),
            Value::Text(s) => write!(f, "{}", s),
            Value::Array(_) => write!(f, "{}", ExcelError::Value),
            Value::Error(e) => write!(f, "{}", e),
        }
    }
}

/// An ordered union of references and their resolved values, produced by a
/// parenthesized comma list such as `(A1, A2:B3)`.
///
/// Members are (value, source) pairs so that reference-aware consumers can
/// re-inspect where each value came from; the two sides are added together,
/// which keeps the lengths equal by construction. A member whose operand was
/// a plain value (e.g. `(1, A1)`) has no source reference.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collection {
    items: Vec<(Value, Option<Reference>)>,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, value: Value, source: Option<Reference>) {
        self.items.push((value, source));
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Value, Option<Reference>)> {
        self.items.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.items.iter().map(|(v, _)| v)
    }

    pub fn references(&self) -> impl Iterator<Item = &Reference> {
        self.items.iter().filter_map(|(_, r)| r.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_display() {
        assert_eq!(Value::Number(3.0).to_string(), "3");
        assert_eq!(Value::Number(3.5).to_string(), "3.5");
        assert_eq!(Value::Bool(true).to_string(), "TRUE");
        assert_eq!(Value::text("hi").to_string(), "hi");
        assert_eq!(Value::Error(ExcelError::Div0).to_string(), "#DIV/0!");
        assert_eq!(Value::Blank.to_string(), "");
    }

    #[test]
    fn test_first_element() {
        let arr = Value::Array(vec![vec![Value::Number(1.0), Value::Number(2.0)]]);
        assert_eq!(arr.first_element(), Some(&Value::Number(1.0)));
        assert_eq!(Value::Number(9.0).first_element(), Some(&Value::Number(9.0)));
        assert_eq!(Value::Array(vec![]).first_element(), None);
    }

    #[test]
    fn test_collection_pairs() {
        let mut c = Collection::new();
        c.add(Value::Number(1.0), None);
        c.add(
            Value::Number(2.0),
            Some(Reference::Cell(crate::reference::CellRef::new(1, 1))),
        );
        assert_eq!(c.len(), 2);
        assert_eq!(c.values().count(), 2);
        assert_eq!(c.references().count(), 1);
    }
}
