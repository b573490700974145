//! `repeat(...).until(...).emit(...).times(n)`.
//!
//! A loop compiles to one recursive construct with two aligned halves:
//!
//! ```text
//! seed  the entering row, padded to the loop's layout
//! step  one application of the body to a row of the loop relation
//! ```
//!
//! The body is compiled once, never unrolled. Its first variable reads the
//! previous iteration's row from the loop relation itself.
//!
//! Termination and emission predicates are compiled against the body and
//! then rewritten to read only columns of the loop relation: the body
//! pivot's value and properties map onto the loop's own columns, and any
//! other body value is pulled out under a synthetic column carried through
//! every iteration. The rewrite is computed over both predicates first and
//! applied once, functionally.

use log::debug;

use crate::{
    gremlin_ast::{EmitCondition, RepeatStep, Traversal},
    query_planner::{
        errors::TranslationError,
        plan_ctx::{ContextKind, CtxId, RepeatCondition},
        types::{StepName, VariableType},
        variable::{PulledColumn, RepeatLoop, VarId, VariableKind},
        TranslationResult, TraversalCompiler,
    },
    render_plan::{
        render_expr::{BooleanExpr, ColumnRef, ScalarExpr},
        rewriter::ColumnSubstitution,
        visitors::{walk_boolean, ColumnCollector, LocalAliasCollector},
    },
};

impl TraversalCompiler {
    pub(crate) fn repeat(&mut self, ctx: CtxId, repeat: &RepeatStep) -> TranslationResult<()> {
        let input = self.require_pivot(ctx, StepName::Repeat)?;
        let input_type = self.var_type(input)?;

        let body = self.arena.new_context(Some(ctx), ContextKind::LoopBody);
        let var = self.arena.allocate(
            ctx,
            input_type,
            VariableKind::Repeat(RepeatLoop {
                input,
                body,
                loop_input: None,
                condition: RepeatCondition::default(),
                ghost_outputs: Vec::new(),
                pulled: Vec::new(),
            }),
        )?;
        self.arena.ctx_mut(body)?.owner_var = Some(var);

        let loop_input = self.new_source(body, input_type, VariableKind::LoopInput { repeat: var })?;
        self.set_pivot(body, loop_input)?;
        if let VariableKind::Repeat(r) = &mut self.arena.var_mut(var)?.kind {
            r.loop_input = Some(loop_input);
        }

        self.compile_steps(body, &repeat.body)?;
        let body_pivot = self.require_pivot(body, StepName::Repeat)?;

        let until = match &repeat.until {
            Some(t) => Some(self.loop_condition(body, body_pivot, t)?),
            None => None,
        };
        let emit = match &repeat.emit {
            None => None,
            Some(EmitCondition::Always) => Some(BooleanExpr::Literal(true)),
            Some(EmitCondition::Traversal(t)) => Some(self.loop_condition(body, body_pivot, t)?),
        };

        let mut env = ColumnSubstitution::new();
        for condition in until.iter().chain(emit.iter()) {
            self.collect_loop_columns(ctx, var, body, body_pivot, condition, &mut env)?;
        }

        let cap = match (repeat.times, &until) {
            (Some(times), _) => Some(times),
            (None, None) => Some(self.config.max_repeat_depth),
            (None, Some(_)) => None,
        };
        let condition = RepeatCondition {
            until: until.map(|u| env.boolean(&u)),
            emit: emit.map(|e| env.boolean(&e)),
            cap,
            until_first: repeat.until_first,
            emit_first: repeat.emit_first,
        };

        // properties requested while the body was still compiling reached
        // whatever was the pivot then
        let projected: Vec<String> = self.arena.var(var)?.projected.iter().cloned().collect();
        for property in &projected {
            self.arena.populate(body_pivot, property, None)?;
        }

        let var_type = VariableType::unify(&[input_type, self.var_type(body_pivot)?]);
        {
            let v = self.arena.var_mut(var)?;
            v.var_type = var_type;
            if let VariableKind::Repeat(r) = &mut v.kind {
                r.condition = condition;
            }
        }
        self.arena.attach(ctx, var)?;
        self.arena.add_table_ref(ctx, var)?;
        debug!("loop {} over {} compiled as {}", var, body, var_type);
        self.set_pivot(ctx, var)
    }

    /// Compile an `until`/`emit` traversal against the body's final row.
    fn loop_condition(
        &mut self,
        body: CtxId,
        body_pivot: VarId,
        traversal: &Traversal,
    ) -> TranslationResult<BooleanExpr> {
        let sub = match self.compile_subtraversal(body, ContextKind::LoopCondition, body_pivot, traversal) {
            Err(TranslationError::UndefinedTag { label }) if self.bound_within(body, &label)? => {
                return Err(TranslationError::UnboundLoopReference { reference: label })
            }
            other => other?,
        };
        Ok(self.builder().condition(sub)?)
    }

    /// Whether some scope nested in `body` binds `label` out of reach.
    fn bound_within(&self, body: CtxId, label: &str) -> TranslationResult<bool> {
        for scope in self.arena.contexts() {
            if scope.tags.contains_key(label) && self.arena.is_within(scope.id, body)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn collect_loop_columns(
        &mut self,
        ctx: CtxId,
        repeat: VarId,
        body: CtxId,
        body_pivot: VarId,
        condition: &BooleanExpr,
        env: &mut ColumnSubstitution,
    ) -> TranslationResult<()> {
        let mut columns = ColumnCollector::default();
        walk_boolean(condition, &mut columns);
        let mut locals = LocalAliasCollector::default();
        walk_boolean(condition, &mut locals);

        let repeat_alias = self.arena.var(repeat)?.alias.clone();
        for column in columns.columns {
            if locals.aliases.contains(&column.table_alias) || env.get(&column).is_some() {
                continue;
            }
            let owner = self.arena.var_by_alias(&column.table_alias)?.owner;
            if !self.arena.is_within(owner, body)? {
                if self.arena.is_within(ctx, owner)? {
                    continue;
                }
                return Err(unbound(&column));
            }
            let target = self.loop_column(repeat, body, body_pivot, owner, &column)?;
            env.insert(column, ColumnRef::new(repeat_alias.clone(), target));
        }
        Ok(())
    }

    /// Column of the loop relation that carries `column` of a body variable.
    fn loop_column(
        &mut self,
        repeat: VarId,
        body: CtxId,
        body_pivot: VarId,
        owner: CtxId,
        column: &ColumnRef,
    ) -> TranslationResult<String> {
        let as_expr = ScalarExpr::Column(column.clone());
        if self.builder().expr(body_pivot, None)? == as_expr {
            return Ok(self.config.default_column.clone());
        }
        if self.builder().expr(body_pivot, Some(&column.column))? == as_expr {
            self.arena.populate(repeat, &column.column, None)?;
            return Ok(column.column.clone());
        }
        if owner != body {
            return Err(unbound(column));
        }

        if let VariableKind::Repeat(r) = &self.arena.var(repeat)?.kind {
            if let Some(existing) = r.pulled.iter().find(|p| &p.source == column) {
                return Ok(existing.column.clone());
            }
        }
        let name = self.arena.names_mut().column("loop");
        if let VariableKind::Repeat(r) = &mut self.arena.var_mut(repeat)?.kind {
            r.pulled.push(PulledColumn {
                column: name.clone(),
                source: column.clone(),
            });
        }
        debug!("pulled {}.{} out of loop body as {}", column.table_alias, column.column, name);
        Ok(name)
    }
}

fn unbound(column: &ColumnRef) -> TranslationError {
    TranslationError::UnboundLoopReference {
        reference: format!("{}.{}", column.table_alias, column.column),
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        config::CompilerConfig,
        gremlin_ast::{RepeatStep, Traversal},
        query_planner::{
            compile_traversal,
            errors::TranslationError,
            types::VariableType,
            TraversalCompiler,
        },
        render_plan::{
            BooleanExpr, ComparisonOp, FunctionParam, Literal, QueryBlock, QueryExpr, ScalarExpr,
            TableValuedFunction,
        },
    };

    fn compile(t: Traversal) -> Result<QueryBlock, TranslationError> {
        compile_traversal(&t, &CompilerConfig::default())
    }

    fn halves(repeat: &TableValuedFunction) -> (&QueryBlock, &QueryBlock) {
        match &repeat.params[0] {
            FunctionParam::Query(QueryExpr::UnionAll(seed, step)) => match (seed.as_ref(), step.as_ref()) {
                (QueryExpr::Block(seed), QueryExpr::Block(step)) => (seed, step),
                other => panic!("Expected two blocks, got {:?}", other),
            },
            other => panic!("Expected UNION ALL, got {:?}", other),
        }
    }

    #[test]
    fn test_loop_binding_is_carried_through_both_halves() {
        let block = compile(
            Traversal::new()
                .v()
                .repeat(
                    RepeatStep::new(Traversal::new().in_(&[]).as_("a"))
                        .until(Traversal::new().has("name", "marko")),
                )
                .select(&["a"]),
        )
        .unwrap();

        let repeat = block.find_table_function("Repeat").unwrap();
        let (seed, step) = halves(repeat);
        assert_eq!(seed.column_names(), step.column_names());
        assert_eq!(seed.column_names(), vec!["_default", "name", "a_0"]);
        assert!(seed.select_item("a_0").unwrap().expr.is_null_literal());
        assert_eq!(step.select_item("a_0").unwrap().expr, ScalarExpr::column("N_4", "id"));
        assert_eq!(block.select[0].expr, ScalarExpr::column("R_1", "a_0"));

        assert_eq!(
            repeat.params[1],
            FunctionParam::Predicate(BooleanExpr::compare(
                ComparisonOp::Equal,
                ScalarExpr::column("R_1", "name"),
                ScalarExpr::Literal(Literal::String("marko".to_string())),
            ))
        );
        assert_eq!(
            repeat.params[3],
            FunctionParam::Scalar(ScalarExpr::Literal(Literal::Null))
        );
    }

    #[test]
    fn test_step_half_reads_previous_row_from_default_column() {
        let block = compile(Traversal::new().v().repeat(RepeatStep::new(Traversal::new().out(&[])).times(2)))
            .unwrap();
        let repeat = block.find_table_function("Repeat").unwrap();
        let (seed, step) = halves(repeat);
        assert_eq!(seed.select[0].expr, ScalarExpr::column("N_0", "id"));
        assert!(seed.from.is_empty());

        let edges = step.find_table_function("VertexToForwardEdge").unwrap();
        assert_eq!(
            edges.params,
            vec![FunctionParam::Scalar(ScalarExpr::column("R_2", "_default"))]
        );
        assert_eq!(
            repeat.params[3],
            FunctionParam::Scalar(ScalarExpr::Literal(Literal::Integer(2)))
        );
    }

    #[test]
    fn test_unconditioned_loop_is_capped() {
        let config = CompilerConfig {
            max_repeat_depth: 7,
            ..CompilerConfig::default()
        };
        let block = compile_traversal(
            &Traversal::new()
                .v()
                .repeat(RepeatStep::new(Traversal::new().out(&[])).emit()),
            &config,
        )
        .unwrap();
        let repeat = block.find_table_function("Repeat").unwrap();
        assert_eq!(repeat.params[2], FunctionParam::Predicate(BooleanExpr::Literal(true)));
        assert_eq!(
            repeat.params[3],
            FunctionParam::Scalar(ScalarExpr::Literal(Literal::Integer(7)))
        );
    }

    #[test]
    fn test_condition_on_earlier_body_value_is_pulled_out() {
        let block = compile(
            Traversal::new().v().repeat(
                RepeatStep::new(Traversal::new().out(&[]).as_("x").out(&[]))
                    .until(Traversal::new().select(&["x"]).has("age", 30)),
            ),
        )
        .unwrap();

        let repeat = block.find_table_function("Repeat").unwrap();
        let (seed, step) = halves(repeat);
        assert!(seed.select_item("loop_0").unwrap().expr.is_null_literal());
        assert_eq!(step.select_item("loop_0").unwrap().expr, ScalarExpr::column("N_4", "age"));
        assert_eq!(
            repeat.params[1],
            FunctionParam::Predicate(BooleanExpr::compare(
                ComparisonOp::Equal,
                ScalarExpr::column("R_1", "loop_0"),
                ScalarExpr::Literal(Literal::Integer(30)),
            ))
        );
    }

    #[test]
    fn test_label_hidden_in_body_aggregate_is_unbound() {
        let err = compile(
            Traversal::new().v().repeat(
                RepeatStep::new(Traversal::new().out(&[]).as_("b").count())
                    .until(Traversal::new().select(&["b"])),
            ),
        )
        .unwrap_err();
        assert_eq!(
            err,
            TranslationError::UnboundLoopReference {
                reference: "b".to_string()
            }
        );
    }

    #[test]
    fn test_select_first_keeps_earliest_iteration() {
        let block = compile(
            Traversal::new()
                .v()
                .repeat(RepeatStep::new(Traversal::new().out(&[]).as_("a")).times(3))
                .select_pop(crate::gremlin_ast::Pop::First, "a"),
        )
        .unwrap();
        let repeat = block.find_table_function("Repeat").unwrap();
        let (_, step) = halves(repeat);
        let column = step.select.last().unwrap();
        assert!(matches!(
            &column.expr,
            ScalarExpr::FunctionCall(call) if call.name == "Coalesce"
        ));
    }

    #[test]
    fn test_loop_type_follows_body() {
        let mut compiler = TraversalCompiler::new(CompilerConfig::default());
        compiler
            .compile(&Traversal::new().v().repeat(RepeatStep::new(Traversal::new().out_e(&[]).in_v()).times(2)))
            .unwrap();
        let root = compiler.arena().ctx(compiler.root()).unwrap();
        assert_eq!(
            compiler.arena().var(root.pivot.unwrap()).unwrap().var_type,
            VariableType::Vertex
        );
        assert!(compile(
            Traversal::new()
                .v()
                .repeat(RepeatStep::new(Traversal::new().out(&[])).times(2))
                .out(&[])
        )
        .is_ok());
    }
}
