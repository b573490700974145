//! Scalar and boolean expressions of the emitted relational plan.

use serde::{Deserialize, Serialize};

use super::{QueryBlock, QueryExpr};
use crate::gremlin_ast::Value;

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl From<&Value> for Literal {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Literal::Null,
            Value::Boolean(b) => Literal::Boolean(*b),
            Value::Integer(i) => Literal::Integer(*i),
            Value::Float(f) => Literal::Float(*f),
            Value::String(s) => Literal::String(s.clone()),
        }
    }
}

/// `source_alias.column`
#[derive(Debug, PartialEq, Eq, Hash, Clone, Serialize, Deserialize)]
pub struct ColumnRef {
    pub table_alias: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(table_alias: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table_alias: table_alias.into(),
            column: column.into(),
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub args: Vec<ScalarExpr>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub enum ScalarExpr {
    Column(ColumnRef),
    Literal(Literal),
    FunctionCall(FunctionCall),
    /// Scalar subquery returning the first column of its single row
    Subquery(Box<QueryExpr>),
}

impl ScalarExpr {
    pub fn column(table_alias: impl Into<String>, column: impl Into<String>) -> Self {
        ScalarExpr::Column(ColumnRef::new(table_alias, column))
    }

    pub fn null() -> Self {
        ScalarExpr::Literal(Literal::Null)
    }

    pub fn as_column(&self) -> Option<&ColumnRef> {
        match self {
            ScalarExpr::Column(c) => Some(c),
            _ => None,
        }
    }

    pub fn is_null_literal(&self) -> bool {
        matches!(self, ScalarExpr::Literal(Literal::Null))
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum ComparisonOp {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl ComparisonOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ComparisonOp::Equal => "=",
            ComparisonOp::NotEqual => "<>",
            ComparisonOp::LessThan => "<",
            ComparisonOp::LessThanOrEqual => "<=",
            ComparisonOp::GreaterThan => ">",
            ComparisonOp::GreaterThanOrEqual => ">=",
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Comparison {
    pub op: ComparisonOp,
    pub left: ScalarExpr,
    pub right: ScalarExpr,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub enum BooleanExpr {
    Literal(bool),
    Comparison(Box<Comparison>),
    And(Vec<BooleanExpr>),
    Or(Vec<BooleanExpr>),
    Not(Box<BooleanExpr>),
    Exists(Box<QueryBlock>),
    IsNull { expr: ScalarExpr, negated: bool },
    /// Boolean-valued function such as `IsSimplePath(path)`
    Function(FunctionCall),
}

impl BooleanExpr {
    pub fn compare(op: ComparisonOp, left: ScalarExpr, right: ScalarExpr) -> Self {
        BooleanExpr::Comparison(Box::new(Comparison { op, left, right }))
    }
}

/// Combine predicates with AND.
///
/// - Empty vec → None
/// - Single predicate → Some(predicate)
/// - Multiple → Some(AND(...)), with nested ANDs flattened
pub fn and(predicates: Vec<BooleanExpr>) -> Option<BooleanExpr> {
    let mut flat = Vec::with_capacity(predicates.len());
    for p in predicates {
        match p {
            BooleanExpr::And(inner) => flat.extend(inner),
            other => flat.push(other),
        }
    }
    match flat.len() {
        0 => None,
        1 => flat.into_iter().next(),
        _ => Some(BooleanExpr::And(flat)),
    }
}

/// Combine predicates with OR (same shape rules as [`and`]).
pub fn or(predicates: Vec<BooleanExpr>) -> Option<BooleanExpr> {
    let mut flat = Vec::with_capacity(predicates.len());
    for p in predicates {
        match p {
            BooleanExpr::Or(inner) => flat.extend(inner),
            other => flat.push(other),
        }
    }
    match flat.len() {
        0 => None,
        1 => flat.into_iter().next(),
        _ => Some(BooleanExpr::Or(flat)),
    }
}

/// Conjoin `predicate` onto an optional accumulator.
pub fn conjoin(existing: Option<BooleanExpr>, predicate: BooleanExpr) -> BooleanExpr {
    match existing {
        None => predicate,
        Some(prev) => and(vec![prev, predicate]).unwrap_or(BooleanExpr::Literal(true)),
    }
}

pub fn not(expr: BooleanExpr) -> BooleanExpr {
    match expr {
        BooleanExpr::Not(inner) => *inner,
        other => BooleanExpr::Not(Box::new(other)),
    }
}
