//! Read-only traversal of emitted plan trees.
//!
//! The visitor separates the recursive walk (into nested query blocks,
//! table-valued function parameters, EXISTS subqueries) from what is done at
//! each node. The loop compiler uses it to find every column reference a
//! termination/emit predicate makes.
//!
//! # Example
//!
//! ```ignore
//! struct Aliases(Vec<String>);
//!
//! impl PlanVisitor for Aliases {
//!     fn visit_column(&mut self, column: &ColumnRef) {
//!         self.0.push(column.table_alias.clone());
//!     }
//! }
//!
//! let mut v = Aliases(vec![]);
//! walk_boolean(&predicate, &mut v);
//! ```

use super::{
    render_expr::{BooleanExpr, ColumnRef, ScalarExpr},
    FromItem, FunctionParam, QueryBlock, QueryExpr,
};

pub trait PlanVisitor {
    /// Called for each column reference
    fn visit_column(&mut self, _column: &ColumnRef) {}

    /// Called before descending into a nested query block
    fn visit_block(&mut self, _block: &QueryBlock) {}
}

pub fn walk_scalar<V: PlanVisitor>(expr: &ScalarExpr, visitor: &mut V) {
    match expr {
        ScalarExpr::Column(c) => visitor.visit_column(c),
        ScalarExpr::Literal(_) => {}
        ScalarExpr::FunctionCall(call) => {
            for arg in &call.args {
                walk_scalar(arg, visitor);
            }
        }
        ScalarExpr::Subquery(q) => walk_query_expr(q, visitor),
    }
}

pub fn walk_boolean<V: PlanVisitor>(expr: &BooleanExpr, visitor: &mut V) {
    match expr {
        BooleanExpr::Literal(_) => {}
        BooleanExpr::Comparison(cmp) => {
            walk_scalar(&cmp.left, visitor);
            walk_scalar(&cmp.right, visitor);
        }
        BooleanExpr::And(items) | BooleanExpr::Or(items) => {
            for item in items {
                walk_boolean(item, visitor);
            }
        }
        BooleanExpr::Not(inner) => walk_boolean(inner, visitor),
        BooleanExpr::Exists(block) => walk_block(block, visitor),
        BooleanExpr::IsNull { expr, .. } => walk_scalar(expr, visitor),
        BooleanExpr::Function(call) => {
            for arg in &call.args {
                walk_scalar(arg, visitor);
            }
        }
    }
}

pub fn walk_query_expr<V: PlanVisitor>(expr: &QueryExpr, visitor: &mut V) {
    for block in expr.blocks() {
        walk_block(block, visitor);
    }
}

pub fn walk_block<V: PlanVisitor>(block: &QueryBlock, visitor: &mut V) {
    visitor.visit_block(block);
    for item in &block.select {
        walk_scalar(&item.expr, visitor);
    }
    for from in &block.from {
        if let FromItem::TableFunction(f) = from {
            for param in &f.params {
                match param {
                    FunctionParam::Scalar(s) => walk_scalar(s, visitor),
                    FunctionParam::Query(q) => walk_query_expr(q, visitor),
                    FunctionParam::Predicate(p) => walk_boolean(p, visitor),
                }
            }
        }
    }
    if let Some(predicate) = &block.where_clause {
        walk_boolean(predicate, visitor);
    }
}

/// Collects every column reference, in visit order.
#[derive(Debug, Default)]
pub struct ColumnCollector {
    pub columns: Vec<ColumnRef>,
}

impl PlanVisitor for ColumnCollector {
    fn visit_column(&mut self, column: &ColumnRef) {
        if !self.columns.contains(column) {
            self.columns.push(column.clone());
        }
    }
}

/// Collects the aliases a block introduces (its own from-items and those of
/// every nested block), i.e. aliases that are local rather than correlated.
#[derive(Debug, Default)]
pub struct LocalAliasCollector {
    pub aliases: Vec<String>,
}

impl PlanVisitor for LocalAliasCollector {
    fn visit_block(&mut self, block: &QueryBlock) {
        for from in &block.from {
            self.aliases.push(from.alias().to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_plan::{
        render_expr::{ComparisonOp, Literal},
        NamedSource, SelectItem,
    };

    #[test]
    fn test_collects_columns_inside_exists() {
        let inner = QueryBlock {
            select: vec![SelectItem::new(ScalarExpr::column("N_4", "id"), "_default")],
            from: vec![FromItem::Named(NamedSource {
                name: "Node".to_string(),
                alias: "N_4".to_string(),
            })],
            match_clause: None,
            where_clause: Some(BooleanExpr::compare(
                ComparisonOp::Equal,
                ScalarExpr::column("N_4", "id"),
                ScalarExpr::column("N_0", "id"),
            )),
        };
        let outer = BooleanExpr::And(vec![
            BooleanExpr::Exists(Box::new(inner)),
            BooleanExpr::compare(
                ComparisonOp::GreaterThan,
                ScalarExpr::column("N_0", "age"),
                ScalarExpr::Literal(Literal::Integer(3)),
            ),
        ]);

        let mut columns = ColumnCollector::default();
        walk_boolean(&outer, &mut columns);
        assert_eq!(columns.columns.len(), 3);

        let mut locals = LocalAliasCollector::default();
        walk_boolean(&outer, &mut locals);
        assert_eq!(locals.aliases, vec!["N_4".to_string()]);
    }
}
