//! Filtering steps.
//!
//! Every filter produces one boolean expression over the pivot and hands it
//! to [`TraversalCompiler::merge_predicate`], which decides between
//! conjoining it onto the scope and wrapping the pivot in a filter source.

use crate::{
    gremlin_ast::{HasStep, Pop, Predicate, Traversal, Value},
    query_planner::{
        errors::TranslationError,
        plan_ctx::CtxId,
        steps::predicate::{lower, lower_operands},
        types::{StepName, VariableType},
        variable::{Construct, VarId, VariableKind},
        TranslationResult, TraversalCompiler,
    },
    render_plan::render_expr::{
        and, not, or, BooleanExpr, ComparisonOp, FunctionCall, Literal, ScalarExpr,
    },
};

fn string_literals(values: &[String]) -> Vec<ScalarExpr> {
    values
        .iter()
        .map(|v| ScalarExpr::Literal(Literal::String(v.clone())))
        .collect()
}

impl TraversalCompiler {
    pub(crate) fn has(&mut self, ctx: CtxId, has: &HasStep) -> TranslationResult<()> {
        let pivot = self.require_pivot(ctx, StepName::Has)?;
        let mut terms = Vec::with_capacity(2);
        if let Some(label) = &has.label {
            let column = self.property_expr(pivot, "label")?;
            terms.push(BooleanExpr::compare(
                ComparisonOp::Equal,
                column,
                ScalarExpr::Literal(Literal::String(label.clone())),
            ));
        }

        let column = self.property_expr(pivot, &has.key)?;
        terms.push(match &has.predicate {
            Some(predicate) => lower(predicate, column)?,
            None => BooleanExpr::IsNull {
                expr: column,
                negated: true,
            },
        });

        let predicate = and(terms).unwrap_or(BooleanExpr::Literal(true));
        self.merge_predicate(ctx, predicate)
    }

    pub(crate) fn has_label(&mut self, ctx: CtxId, labels: &[String]) -> TranslationResult<()> {
        let pivot = self.require_pivot(ctx, StepName::HasLabel)?;
        let column = self.property_expr(pivot, "label")?;
        let predicate = lower_operands(
            crate::gremlin_ast::PredicateOp::Within,
            column,
            string_literals(labels),
        )?;
        self.merge_predicate(ctx, predicate)
    }

    pub(crate) fn has_id(&mut self, ctx: CtxId, ids: &[Value]) -> TranslationResult<()> {
        let pivot = self.require_pivot(ctx, StepName::HasId)?;
        let column = self.property_expr(pivot, "id")?;
        let predicate = lower(&Predicate::within(ids.iter().cloned()), column)?;
        self.merge_predicate(ctx, predicate)
    }

    pub(crate) fn has_key(&mut self, ctx: CtxId, keys: &[String]) -> TranslationResult<()> {
        let pivot = self.require_pivot(ctx, StepName::HasKey)?;
        let column = self.property_expr(pivot, "key")?;
        let predicate = lower_operands(
            crate::gremlin_ast::PredicateOp::Within,
            column,
            string_literals(keys),
        )?;
        self.merge_predicate(ctx, predicate)
    }

    pub(crate) fn has_not(&mut self, ctx: CtxId, key: &str) -> TranslationResult<()> {
        let pivot = self.require_pivot(ctx, StepName::HasNot)?;
        let column = self.property_expr(pivot, key)?;
        self.merge_predicate(
            ctx,
            BooleanExpr::IsNull {
                expr: column,
                negated: false,
            },
        )
    }

    pub(crate) fn is(&mut self, ctx: CtxId, predicate: &Predicate) -> TranslationResult<()> {
        let pivot = self.require_pivot(ctx, StepName::Is)?;
        let column = self.builder().expr(pivot, None)?;
        let predicate = lower(predicate, column)?;
        self.merge_predicate(ctx, predicate)
    }

    pub(crate) fn where_traversal(&mut self, ctx: CtxId, condition: &Traversal) -> TranslationResult<()> {
        let pivot = self.require_pivot(ctx, StepName::Where)?;
        let predicate = self.condition(ctx, pivot, condition)?;
        self.merge_predicate(ctx, predicate)
    }

    /// `where([start,] P(label...))`: compares label bindings instead of literals.
    pub(crate) fn where_label(
        &mut self,
        ctx: CtxId,
        start: Option<&str>,
        predicate: &Predicate,
    ) -> TranslationResult<()> {
        let pivot = self.require_pivot(ctx, StepName::Where)?;
        let lhs_var = match start {
            Some(label) => self.resolve_label(ctx, label, Pop::Last)?,
            None => pivot,
        };
        let lhs = self.builder().expr(lhs_var, None)?;

        let mut operands = Vec::with_capacity(predicate.values.len());
        for value in &predicate.values {
            let Value::String(label) = value else {
                return Err(TranslationError::InvalidArgument(format!(
                    "where() compares against labels, got {}",
                    value
                )));
            };
            let bound = self.resolve_label(ctx, label, Pop::Last)?;
            operands.push(self.builder().expr(bound, None)?);
        }

        let predicate = lower_operands(predicate.op, lhs, operands)?;
        self.merge_predicate(ctx, predicate)
    }

    pub(crate) fn not(&mut self, ctx: CtxId, condition: &Traversal) -> TranslationResult<()> {
        let pivot = self.require_pivot(ctx, StepName::Not)?;
        let predicate = self.condition(ctx, pivot, condition)?;
        self.merge_predicate(ctx, not(predicate))
    }

    pub(crate) fn and_or(
        &mut self,
        ctx: CtxId,
        conditions: &[Traversal],
        conjunctive: bool,
    ) -> TranslationResult<()> {
        let step = if conjunctive { StepName::And } else { StepName::Or };
        let pivot = self.require_pivot(ctx, step)?;
        if conditions.is_empty() {
            return Err(TranslationError::InvalidArgument(format!(
                "{}() needs at least one traversal",
                step
            )));
        }

        let mut terms = Vec::with_capacity(conditions.len());
        for condition in conditions {
            terms.push(self.condition(ctx, pivot, condition)?);
        }
        let combined = if conjunctive { and(terms) } else { or(terms) };
        self.merge_predicate(ctx, combined.unwrap_or(BooleanExpr::Literal(true)))
    }

    /// The scope's path variable, created on first use.
    pub(crate) fn ensure_path(&mut self, ctx: CtxId) -> TranslationResult<VarId> {
        if let Some(path) = self.arena.ctx(ctx)?.path_variable {
            return Ok(path);
        }
        let path = self.new_var(
            ctx,
            VariableType::Path,
            VariableKind::Path {
                steps: Vec::new(),
                by: Vec::new(),
                live: true,
            },
        )?;
        let scope = self.arena.ctx_mut(ctx)?;
        scope.path_variable = Some(path);
        scope.path_tracking = true;
        self.arena.track_path(ctx)?;
        Ok(path)
    }

    pub(crate) fn path_filter(&mut self, ctx: CtxId, simple: bool) -> TranslationResult<()> {
        let path = self.ensure_path(ctx)?;
        let check = BooleanExpr::Function(FunctionCall {
            name: "IsSimplePath".to_string(),
            args: vec![self.builder().expr(path, None)?],
        });
        self.merge_predicate(ctx, if simple { check } else { not(check) })
    }

    /// `range`, `limit` and `skip`; a `high` of -1 means unbounded.
    pub(crate) fn range(&mut self, ctx: CtxId, low: i64, high: i64) -> TranslationResult<()> {
        if low < 0 || (high != -1 && high < low) {
            return Err(TranslationError::InvalidArgument(format!(
                "invalid range [{}, {})",
                low, high
            )));
        }
        self.wrap_scope(ctx, Construct::Range { low, high })
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        config::CompilerConfig,
        gremlin_ast::{Predicate, Step, Traversal},
        query_planner::{compile_traversal, errors::TranslationError},
        render_plan::{
            render_expr::{BooleanExpr, ComparisonOp, ScalarExpr},
            FunctionParam, Literal,
        },
    };

    fn compile(t: Traversal) -> Result<crate::render_plan::QueryBlock, TranslationError> {
        compile_traversal(&t, &CompilerConfig::default())
    }

    #[test]
    fn test_has_projects_the_filtered_property() {
        let block = compile(Traversal::new().v().has_predicate("age", Predicate::gt(30))).unwrap();
        assert_eq!(
            block.where_clause,
            Some(BooleanExpr::compare(
                ComparisonOp::GreaterThan,
                ScalarExpr::column("N_0", "age"),
                ScalarExpr::Literal(Literal::Integer(30))
            ))
        );
        assert!(block.select_item("age").is_some());
    }

    #[test]
    fn test_has_key_only_checks_presence() {
        let block = compile(Traversal::new().v().has_key_present("email")).unwrap();
        assert_eq!(
            block.where_clause,
            Some(BooleanExpr::IsNull {
                expr: ScalarExpr::column("N_0", "email"),
                negated: true
            })
        );
    }

    #[test]
    fn test_has_label_does_not_project_intrinsic_column() {
        let block = compile(Traversal::new().v().has_label(&["person"])).unwrap();
        assert!(block.where_clause.is_some());
        assert!(block.select_item("label").is_none());
    }

    #[test]
    fn test_where_traversal_becomes_exists() {
        let block = compile(Traversal::new().v().where_(Traversal::new().out(&["knows"]))).unwrap();
        match block.where_clause {
            Some(BooleanExpr::Exists(inner)) => {
                assert!(inner.find_table_function("VertexToForwardEdge").is_some());
            }
            other => panic!("Expected EXISTS, got {:?}", other),
        }
    }

    #[test]
    fn test_not_without_sources_is_plain_negation() {
        let block = compile(Traversal::new().v().not(Traversal::new().has("name", "josh"))).unwrap();
        match block.where_clause {
            Some(BooleanExpr::Not(inner)) => {
                assert!(matches!(*inner, BooleanExpr::Comparison(_)));
            }
            other => panic!("Expected NOT, got {:?}", other),
        }
    }

    #[test]
    fn test_where_compares_label_bindings() {
        let t = Traversal::new()
            .v()
            .as_("a")
            .out(&[])
            .push(Step::WhereLabel {
                start: None,
                predicate: Predicate::neq("a"),
            });
        let block = compile(t).unwrap();
        assert_eq!(
            block.where_clause,
            Some(BooleanExpr::compare(
                ComparisonOp::NotEqual,
                ScalarExpr::column("N_2", "id"),
                ScalarExpr::column("N_0", "id")
            ))
        );
    }

    #[test]
    fn test_where_on_unbound_label_fails() {
        let t = Traversal::new().v().push(Step::WhereLabel {
            start: None,
            predicate: Predicate::eq("missing"),
        });
        assert_eq!(
            compile(t).unwrap_err(),
            TranslationError::UndefinedTag {
                label: "missing".to_string()
            }
        );
    }

    #[test]
    fn test_simple_path_activates_path_tracking() {
        let block = compile(Traversal::new().v().out(&[]).push(Step::SimplePath)).unwrap();
        assert!(matches!(block.where_clause, Some(BooleanExpr::Function(ref f)) if f.name == "IsSimplePath"));
        assert!(block.select_item("_path").is_some());
    }

    #[test]
    fn test_limit_wraps_scope() {
        let block = compile(Traversal::new().v().limit(5)).unwrap();
        let range = block.find_table_function("Range").unwrap();
        assert_eq!(
            range.params.last(),
            Some(&FunctionParam::Scalar(ScalarExpr::Literal(Literal::Integer(5))))
        );
        assert_eq!(range.queries().count(), 1);
    }

    #[test]
    fn test_empty_and_is_rejected() {
        let err = compile(Traversal::new().v().push(Step::And(vec![]))).unwrap_err();
        assert!(matches!(err, TranslationError::InvalidArgument(_)));
    }
}
