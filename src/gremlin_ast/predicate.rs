//! Literal values and comparison predicates carried by step descriptors.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A literal argument of a step (ids, property values, constants).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => write!(f, "'{}'", s),
        }
    }
}

/// Comparison kind of a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PredicateOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    Within,
    Without,
    Inside,
    Outside,
    Between,
}

impl PredicateOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredicateOp::Eq => "eq",
            PredicateOp::Neq => "neq",
            PredicateOp::Lt => "lt",
            PredicateOp::Lte => "lte",
            PredicateOp::Gt => "gt",
            PredicateOp::Gte => "gte",
            PredicateOp::Within => "within",
            PredicateOp::Without => "without",
            PredicateOp::Inside => "inside",
            PredicateOp::Outside => "outside",
            PredicateOp::Between => "between",
        }
    }
}

/// A comparison predicate such as `P.gt(3)` or `P.within('a', 'b')`.
///
/// `within`/`without` take any number of operands; the ordering
/// comparisons take exactly one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub op: PredicateOp,
    pub values: Vec<Value>,
}

impl Predicate {
    fn single(op: PredicateOp, value: impl Into<Value>) -> Self {
        Self {
            op,
            values: vec![value.into()],
        }
    }

    pub fn eq(value: impl Into<Value>) -> Self {
        Self::single(PredicateOp::Eq, value)
    }

    pub fn neq(value: impl Into<Value>) -> Self {
        Self::single(PredicateOp::Neq, value)
    }

    pub fn lt(value: impl Into<Value>) -> Self {
        Self::single(PredicateOp::Lt, value)
    }

    pub fn lte(value: impl Into<Value>) -> Self {
        Self::single(PredicateOp::Lte, value)
    }

    pub fn gt(value: impl Into<Value>) -> Self {
        Self::single(PredicateOp::Gt, value)
    }

    pub fn gte(value: impl Into<Value>) -> Self {
        Self::single(PredicateOp::Gte, value)
    }

    pub fn within<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        Self {
            op: PredicateOp::Within,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn without<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        Self {
            op: PredicateOp::Without,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn inside(low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Self {
            op: PredicateOp::Inside,
            values: vec![low.into(), high.into()],
        }
    }

    pub fn outside(low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Self {
            op: PredicateOp::Outside,
            values: vec![low.into(), high.into()],
        }
    }

    pub fn between(low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Self {
            op: PredicateOp::Between,
            values: vec![low.into(), high.into()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_deserializes_untagged() {
        let values: Vec<Value> = serde_json::from_str(r#"[null, true, 3, 1.5, "x"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Boolean(true),
                Value::Integer(3),
                Value::Float(1.5),
                Value::String("x".to_string()),
            ]
        );
    }

    #[test]
    fn test_within_collects_operands() {
        let p = Predicate::within(["a", "b"]);
        assert_eq!(p.op, PredicateOp::Within);
        assert_eq!(p.values.len(), 2);
    }
}
