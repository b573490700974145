//! Functional column substitution over emitted plan trees.
//!
//! The loop compiler decides, after a loop body is fully compiled, that some
//! `(alias, column)` pairs must be read from synthetic columns of the
//! recursive construct instead. Expression trees are never mutated in place:
//! a [`ColumnSubstitution`] is applied once and produces new trees, so a
//! sub-expression shared between the termination and emit predicates is
//! rewritten independently in each.

use std::collections::HashMap;

use super::{
    render_expr::{BooleanExpr, ColumnRef, Comparison, FunctionCall, ScalarExpr},
    FromItem, FunctionParam, MatchClause, QueryBlock, QueryExpr, SelectItem, TableValuedFunction,
};

/// Map from `(alias, column)` to its replacement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnSubstitution {
    map: HashMap<ColumnRef, ColumnRef>,
}

impl ColumnSubstitution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, from: ColumnRef, to: ColumnRef) {
        if from != to {
            self.map.insert(from, to);
        }
    }

    pub fn get(&self, column: &ColumnRef) -> Option<&ColumnRef> {
        self.map.get(column)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn column(&self, column: &ColumnRef) -> ColumnRef {
        self.map.get(column).cloned().unwrap_or_else(|| column.clone())
    }

    pub fn scalar(&self, expr: &ScalarExpr) -> ScalarExpr {
        match expr {
            ScalarExpr::Column(c) => ScalarExpr::Column(self.column(c)),
            ScalarExpr::Literal(l) => ScalarExpr::Literal(l.clone()),
            ScalarExpr::FunctionCall(call) => ScalarExpr::FunctionCall(self.function(call)),
            ScalarExpr::Subquery(q) => ScalarExpr::Subquery(Box::new(self.query_expr(q))),
        }
    }

    fn function(&self, call: &FunctionCall) -> FunctionCall {
        FunctionCall {
            name: call.name.clone(),
            args: call.args.iter().map(|a| self.scalar(a)).collect(),
        }
    }

    pub fn boolean(&self, expr: &BooleanExpr) -> BooleanExpr {
        match expr {
            BooleanExpr::Literal(b) => BooleanExpr::Literal(*b),
            BooleanExpr::Comparison(cmp) => BooleanExpr::Comparison(Box::new(Comparison {
                op: cmp.op,
                left: self.scalar(&cmp.left),
                right: self.scalar(&cmp.right),
            })),
            BooleanExpr::And(items) => BooleanExpr::And(items.iter().map(|i| self.boolean(i)).collect()),
            BooleanExpr::Or(items) => BooleanExpr::Or(items.iter().map(|i| self.boolean(i)).collect()),
            BooleanExpr::Not(inner) => BooleanExpr::Not(Box::new(self.boolean(inner))),
            BooleanExpr::Exists(block) => BooleanExpr::Exists(Box::new(self.block(block))),
            BooleanExpr::IsNull { expr, negated } => BooleanExpr::IsNull {
                expr: self.scalar(expr),
                negated: *negated,
            },
            BooleanExpr::Function(call) => BooleanExpr::Function(self.function(call)),
        }
    }

    pub fn query_expr(&self, expr: &QueryExpr) -> QueryExpr {
        match expr {
            QueryExpr::Block(b) => QueryExpr::Block(Box::new(self.block(b))),
            QueryExpr::UnionAll(l, r) => {
                QueryExpr::UnionAll(Box::new(self.query_expr(l)), Box::new(self.query_expr(r)))
            }
        }
    }

    pub fn block(&self, block: &QueryBlock) -> QueryBlock {
        QueryBlock {
            select: block
                .select
                .iter()
                .map(|s| SelectItem::new(self.scalar(&s.expr), s.alias.clone()))
                .collect(),
            from: block.from.iter().map(|f| self.from_item(f)).collect(),
            match_clause: block.match_clause.as_ref().map(|m| MatchClause {
                paths: m.paths.clone(),
            }),
            where_clause: block.where_clause.as_ref().map(|w| self.boolean(w)),
        }
    }

    fn from_item(&self, item: &FromItem) -> FromItem {
        match item {
            FromItem::Named(n) => FromItem::Named(n.clone()),
            FromItem::TableFunction(f) => FromItem::TableFunction(TableValuedFunction {
                name: f.name.clone(),
                params: f
                    .params
                    .iter()
                    .map(|p| match p {
                        FunctionParam::Scalar(s) => FunctionParam::Scalar(self.scalar(s)),
                        FunctionParam::Query(q) => FunctionParam::Query(self.query_expr(q)),
                        FunctionParam::Predicate(b) => FunctionParam::Predicate(self.boolean(b)),
                    })
                    .collect(),
                alias: f.alias.clone(),
            }),
        }
    }
}
