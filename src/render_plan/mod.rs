//! Relational plan emitted by the translator.
//!
//! This is the minimal AST contract the downstream serialization layer
//! consumes: query blocks with select/from/match/where, named sources,
//! table-valued function calls (possibly wrapping nested query blocks),
//! UNION ALL set-combination, and graph pattern-match fragments.
//!
//! A traversal such as `g.V().out('knows').values('name')` renders (via
//! [`ToSql`]) roughly as:
//!
//! ```text
//! SELECT R_3.value AS _default
//! FROM Node AS N_0, Edge AS E_1, Node AS N_2
//!   CROSS APPLY Values(N_2.name) AS R_3
//! MATCH N_0-(E_1)->N_2
//! WHERE E_1.label = 'knows'
//! ```

use serde::{Deserialize, Serialize};

pub mod errors;
pub mod plan_builder;
pub mod render_expr;
pub mod rewriter;
pub mod to_sql;
pub mod visitors;

pub use render_expr::{BooleanExpr, ColumnRef, ComparisonOp, FunctionCall, Literal, ScalarExpr};
pub use to_sql::ToSql;

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SelectItem {
    pub expr: ScalarExpr,
    pub alias: String,
}

impl SelectItem {
    pub fn new(expr: ScalarExpr, alias: impl Into<String>) -> Self {
        Self {
            expr,
            alias: alias.into(),
        }
    }
}

/// A named relation (`Node AS N_0`) or the recursive self-reference of a loop.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct NamedSource {
    pub name: String,
    pub alias: String,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub enum FunctionParam {
    Scalar(ScalarExpr),
    Query(QueryExpr),
    Predicate(BooleanExpr),
}

/// A table-valued function call, cross-applied after the preceding sources.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct TableValuedFunction {
    pub name: String,
    pub params: Vec<FunctionParam>,
    pub alias: String,
}

impl TableValuedFunction {
    /// Nested query expressions passed as parameters, in parameter order.
    pub fn queries(&self) -> impl Iterator<Item = &QueryExpr> {
        self.params.iter().filter_map(|p| match p {
            FunctionParam::Query(q) => Some(q),
            _ => None,
        })
    }

    pub fn predicates(&self) -> impl Iterator<Item = &BooleanExpr> {
        self.params.iter().filter_map(|p| match p {
            FunctionParam::Predicate(b) => Some(b),
            _ => None,
        })
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub enum FromItem {
    Named(NamedSource),
    TableFunction(TableValuedFunction),
}

impl FromItem {
    pub fn alias(&self) -> &str {
        match self {
            FromItem::Named(n) => &n.alias,
            FromItem::TableFunction(f) => &f.alias,
        }
    }

    pub fn as_table_function(&self) -> Option<&TableValuedFunction> {
        match self {
            FromItem::TableFunction(f) => Some(f),
            _ => None,
        }
    }
}

/// `(source)-[edge*min..max]->(sink)`; a `None` endpoint is unconstrained.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct MatchPathFragment {
    pub source: Option<String>,
    pub edge: String,
    pub sink: Option<String>,
    pub min_hops: u32,
    pub max_hops: u32,
}

#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
pub struct MatchClause {
    pub paths: Vec<MatchPathFragment>,
}

#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
pub struct QueryBlock {
    pub select: Vec<SelectItem>,
    pub from: Vec<FromItem>,
    pub match_clause: Option<MatchClause>,
    pub where_clause: Option<BooleanExpr>,
}

impl QueryBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Output column names in select-list order.
    pub fn column_names(&self) -> Vec<&str> {
        self.select.iter().map(|s| s.alias.as_str()).collect()
    }

    pub fn select_item(&self, alias: &str) -> Option<&SelectItem> {
        self.select.iter().find(|s| s.alias == alias)
    }

    pub fn table_functions(&self) -> impl Iterator<Item = &TableValuedFunction> {
        self.from.iter().filter_map(FromItem::as_table_function)
    }

    /// First table-valued function with the given name (non-recursive).
    pub fn find_table_function(&self, name: &str) -> Option<&TableValuedFunction> {
        self.table_functions().find(|f| f.name == name)
    }

    pub fn named_sources(&self) -> impl Iterator<Item = &NamedSource> {
        self.from.iter().filter_map(|f| match f {
            FromItem::Named(n) => Some(n),
            _ => None,
        })
    }
}

/// A query block or a UNION ALL of two query expressions.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub enum QueryExpr {
    Block(Box<QueryBlock>),
    UnionAll(Box<QueryExpr>, Box<QueryExpr>),
}

impl QueryExpr {
    pub fn block(block: QueryBlock) -> Self {
        QueryExpr::Block(Box::new(block))
    }

    /// Left-deep UNION ALL of every block; `None` when `blocks` is empty.
    pub fn union_all(blocks: Vec<QueryBlock>) -> Option<Self> {
        let mut iter = blocks.into_iter();
        let first = QueryExpr::block(iter.next()?);
        Some(iter.fold(first, |acc, b| {
            QueryExpr::UnionAll(Box::new(acc), Box::new(QueryExpr::block(b)))
        }))
    }

    /// Every block in left-to-right order.
    pub fn blocks(&self) -> Vec<&QueryBlock> {
        match self {
            QueryExpr::Block(b) => vec![b.as_ref()],
            QueryExpr::UnionAll(l, r) => {
                let mut out = l.blocks();
                out.extend(r.blocks());
                out
            }
        }
    }
}
