//! Text rendering of emitted plans, for the CLI and for debugging.
//!
//! Production serialization belongs to the downstream layer; this renderer
//! only needs to be faithful enough to read a plan at a glance.

use super::{
    render_expr::{BooleanExpr, ColumnRef, Literal, ScalarExpr},
    FromItem, FunctionParam, MatchPathFragment, QueryBlock, QueryExpr,
};

pub trait ToSql {
    fn to_sql(&self) -> String;
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

impl ToSql for Literal {
    fn to_sql(&self) -> String {
        match self {
            Literal::Null => "NULL".to_string(),
            Literal::Boolean(b) => b.to_string(),
            Literal::Integer(i) => i.to_string(),
            Literal::Float(f) => f.to_string(),
            Literal::String(s) => quote(s),
        }
    }
}

impl ToSql for ColumnRef {
    fn to_sql(&self) -> String {
        if self.column.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            format!("{}.{}", self.table_alias, self.column)
        } else {
            format!("{}.[{}]", self.table_alias, self.column)
        }
    }
}

impl ToSql for ScalarExpr {
    fn to_sql(&self) -> String {
        match self {
            ScalarExpr::Column(c) => c.to_sql(),
            ScalarExpr::Literal(l) => l.to_sql(),
            ScalarExpr::FunctionCall(call) => {
                let args: Vec<String> = call.args.iter().map(|a| a.to_sql()).collect();
                format!("{}({})", call.name, args.join(", "))
            }
            ScalarExpr::Subquery(q) => format!("({})", q.to_sql()),
        }
    }
}

impl ToSql for BooleanExpr {
    fn to_sql(&self) -> String {
        match self {
            BooleanExpr::Literal(true) => "1 = 1".to_string(),
            BooleanExpr::Literal(false) => "1 = 0".to_string(),
            BooleanExpr::Comparison(cmp) => format!(
                "{} {} {}",
                cmp.left.to_sql(),
                cmp.op.as_sql(),
                cmp.right.to_sql()
            ),
            BooleanExpr::And(items) => {
                let parts: Vec<String> = items.iter().map(|i| format!("({})", i.to_sql())).collect();
                parts.join(" AND ")
            }
            BooleanExpr::Or(items) => {
                let parts: Vec<String> = items.iter().map(|i| format!("({})", i.to_sql())).collect();
                parts.join(" OR ")
            }
            BooleanExpr::Not(inner) => format!("NOT ({})", inner.to_sql()),
            BooleanExpr::Exists(block) => format!("EXISTS ({})", block.to_sql()),
            BooleanExpr::IsNull { expr, negated } => {
                if *negated {
                    format!("{} IS NOT NULL", expr.to_sql())
                } else {
                    format!("{} IS NULL", expr.to_sql())
                }
            }
            BooleanExpr::Function(call) => {
                let args: Vec<String> = call.args.iter().map(|a| a.to_sql()).collect();
                format!("{}({})", call.name, args.join(", "))
            }
        }
    }
}

impl ToSql for MatchPathFragment {
    fn to_sql(&self) -> String {
        let hops = if self.min_hops == 1 && self.max_hops == 1 {
            String::new()
        } else {
            format!("*{}..{}", self.min_hops, self.max_hops)
        };
        format!(
            "{}-({}{})->{}",
            self.source.as_deref().unwrap_or("()"),
            self.edge,
            hops,
            self.sink.as_deref().unwrap_or("()")
        )
    }
}

impl ToSql for FunctionParam {
    fn to_sql(&self) -> String {
        match self {
            FunctionParam::Scalar(s) => s.to_sql(),
            FunctionParam::Query(q) => format!("({})", q.to_sql()),
            FunctionParam::Predicate(p) => p.to_sql(),
        }
    }
}

impl ToSql for QueryExpr {
    fn to_sql(&self) -> String {
        match self {
            QueryExpr::Block(b) => b.to_sql(),
            QueryExpr::UnionAll(l, r) => format!("{}\nUNION ALL\n{}", l.to_sql(), r.to_sql()),
        }
    }
}

impl ToSql for QueryBlock {
    fn to_sql(&self) -> String {
        let mut sql = String::from("SELECT ");
        if self.select.is_empty() {
            sql.push('1');
        } else {
            let items: Vec<String> = self
                .select
                .iter()
                .map(|s| format!("{} AS {}", s.expr.to_sql(), s.alias))
                .collect();
            sql.push_str(&items.join(", "));
        }

        let mut named = Vec::new();
        let mut applied = Vec::new();
        for item in &self.from {
            match item {
                FromItem::Named(n) => named.push(format!("{} AS {}", n.name, n.alias)),
                FromItem::TableFunction(f) => {
                    let params: Vec<String> = f.params.iter().map(|p| p.to_sql()).collect();
                    applied.push(format!(
                        "CROSS APPLY {}({}) AS {}",
                        f.name,
                        params.join(", "),
                        f.alias
                    ));
                }
            }
        }
        if !named.is_empty() || !applied.is_empty() {
            sql.push_str("\nFROM ");
            if named.is_empty() {
                // a leading cross apply needs something to apply to
                sql.push_str("(SELECT 1) AS _unit");
            } else {
                sql.push_str(&named.join(", "));
            }
            for a in applied {
                sql.push_str("\n  ");
                sql.push_str(&a);
            }
        }

        if let Some(m) = &self.match_clause {
            if !m.paths.is_empty() {
                let paths: Vec<String> = m.paths.iter().map(|p| p.to_sql()).collect();
                sql.push_str("\nMATCH ");
                sql.push_str(&paths.join(" AND "));
            }
        }
        if let Some(w) = &self.where_clause {
            sql.push_str("\nWHERE ");
            sql.push_str(&w.to_sql());
        }
        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_plan::{MatchClause, NamedSource, SelectItem, TableValuedFunction};

    #[test]
    fn test_block_renders_match_and_apply() {
        let block = QueryBlock {
            select: vec![SelectItem::new(ScalarExpr::column("R_3", "value"), "_default")],
            from: vec![
                FromItem::Named(NamedSource {
                    name: "Node".to_string(),
                    alias: "N_0".to_string(),
                }),
                FromItem::Named(NamedSource {
                    name: "Edge".to_string(),
                    alias: "E_1".to_string(),
                }),
                FromItem::Named(NamedSource {
                    name: "Node".to_string(),
                    alias: "N_2".to_string(),
                }),
                FromItem::TableFunction(TableValuedFunction {
                    name: "Values".to_string(),
                    params: vec![FunctionParam::Scalar(ScalarExpr::column("N_2", "name"))],
                    alias: "R_3".to_string(),
                }),
            ],
            match_clause: Some(MatchClause {
                paths: vec![MatchPathFragment {
                    source: Some("N_0".to_string()),
                    edge: "E_1".to_string(),
                    sink: Some("N_2".to_string()),
                    min_hops: 1,
                    max_hops: 1,
                }],
            }),
            where_clause: None,
        };
        let sql = block.to_sql();
        assert!(sql.starts_with("SELECT R_3.value AS _default"));
        assert!(sql.contains("FROM Node AS N_0, Edge AS E_1, Node AS N_2"));
        assert!(sql.contains("CROSS APPLY Values(N_2.name) AS R_3"));
        assert!(sql.contains("MATCH N_0-(E_1)->N_2"));
    }

    #[test]
    fn test_string_literal_is_escaped() {
        assert_eq!(Literal::String("o'neil".to_string()).to_sql(), "'o''neil'");
    }
}
