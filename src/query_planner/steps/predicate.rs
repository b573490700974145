//! Lowering of comparison predicates to boolean expressions.

use crate::{
    gremlin_ast::{Predicate, PredicateOp},
    query_planner::{errors::TranslationError, TranslationResult},
    render_plan::render_expr::{and, or, BooleanExpr, ComparisonOp, Literal, ScalarExpr},
};

/// `lhs <op> values` with literal operands.
pub fn lower(predicate: &Predicate, lhs: ScalarExpr) -> TranslationResult<BooleanExpr> {
    let operands = predicate
        .values
        .iter()
        .map(|v| ScalarExpr::Literal(Literal::from(v)))
        .collect();
    lower_operands(predicate.op, lhs, operands)
}

/// `lhs <op> operands` where operands are arbitrary expressions, e.g. the
/// columns of label bindings in `where(eq('a'))`.
pub fn lower_operands(
    op: PredicateOp,
    lhs: ScalarExpr,
    mut operands: Vec<ScalarExpr>,
) -> TranslationResult<BooleanExpr> {
    let comparison = match op {
        PredicateOp::Eq => ComparisonOp::Equal,
        PredicateOp::Neq => ComparisonOp::NotEqual,
        PredicateOp::Lt => ComparisonOp::LessThan,
        PredicateOp::Lte => ComparisonOp::LessThanOrEqual,
        PredicateOp::Gt => ComparisonOp::GreaterThan,
        PredicateOp::Gte => ComparisonOp::GreaterThanOrEqual,
        PredicateOp::Within => {
            let terms = operands
                .into_iter()
                .map(|rhs| BooleanExpr::compare(ComparisonOp::Equal, lhs.clone(), rhs))
                .collect();
            return Ok(or(terms).unwrap_or(BooleanExpr::Literal(false)));
        }
        PredicateOp::Without => {
            let terms = operands
                .into_iter()
                .map(|rhs| BooleanExpr::compare(ComparisonOp::NotEqual, lhs.clone(), rhs))
                .collect();
            return Ok(and(terms).unwrap_or(BooleanExpr::Literal(true)));
        }
        PredicateOp::Inside | PredicateOp::Outside | PredicateOp::Between => {
            return Err(TranslationError::UnsupportedConstruct(format!(
                "`{}` predicate",
                op.as_str()
            )))
        }
    };

    if operands.len() != 1 {
        return Err(TranslationError::InvalidArgument(format!(
            "`{}` takes exactly one operand, got {}",
            op.as_str(),
            operands.len()
        )));
    }
    let rhs = operands.remove(0);
    Ok(BooleanExpr::compare(comparison, lhs, rhs))
}
