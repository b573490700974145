//! Multi-branch constructs.
//!
//! Each branch compiles in its own sub-context seeded with a reference to
//! the input row. The construct's type is the unification of the branch
//! pivots' types; its column layout is computed at emission time from the
//! properties populated on it, so branches line up regardless of which of
//! them can actually supply a column.

use log::{debug, warn};

use crate::{
    gremlin_ast::{ChooseStep, Traversal},
    query_planner::{
        errors::TranslationError,
        plan_ctx::{ContextKind, CtxId},
        types::{StepName, VariableType},
        variable::{ChooseForm, Composite, Construct, VarId, VariableKind},
        TranslationResult, TraversalCompiler,
    },
    render_plan::render_expr::Literal,
};

fn construct_step(construct: &Construct) -> StepName {
    match construct {
        Construct::Map => StepName::Map,
        Construct::FlatMap => StepName::FlatMap,
        Construct::Local => StepName::Local,
        Construct::Coalesce => StepName::Coalesce,
        Construct::Optional => StepName::Optional,
        Construct::Choose(_) => StepName::Choose,
        _ => StepName::Union,
    }
}

impl TraversalCompiler {
    fn compile_branches(
        &mut self,
        ctx: CtxId,
        input: VarId,
        branches: &[Traversal],
    ) -> TranslationResult<Vec<CtxId>> {
        let mut compiled = Vec::with_capacity(branches.len());
        for branch in branches {
            compiled.push(self.compile_subtraversal(ctx, ContextKind::Branch, input, branch)?);
        }
        Ok(compiled)
    }

    /// Unified type of the branch pivots.
    fn branch_type(&self, construct: &Construct, branches: &[CtxId]) -> TranslationResult<VariableType> {
        let mut types = Vec::with_capacity(branches.len());
        for branch in branches {
            if let Some(pivot) = self.arena.pivot(*branch)? {
                types.push(self.var_type(pivot)?);
            }
        }
        let unified = VariableType::unify(&types);
        if unified == VariableType::Mixed {
            warn!(
                "{} branches produce {:?}; only steps valid on any value may follow",
                construct.function_name(),
                types
            );
        }
        Ok(unified)
    }

    fn finish_branches(
        &mut self,
        ctx: CtxId,
        construct: Construct,
        input: VarId,
        branches: Vec<CtxId>,
    ) -> TranslationResult<()> {
        let var_type = self.branch_type(&construct, &branches)?;
        let var = self.new_source(
            ctx,
            var_type,
            VariableKind::Composite(Composite::new(construct, Some(input), branches.clone())),
        )?;
        for branch in branches {
            self.arena.ctx_mut(branch)?.owner_var = Some(var);
        }
        debug!("{} unified to {}", var, var_type);
        self.set_pivot(ctx, var)
    }

    /// `map`, `flatMap`, `local`.
    pub(crate) fn single_branch(
        &mut self,
        ctx: CtxId,
        construct: Construct,
        body: &Traversal,
    ) -> TranslationResult<()> {
        let input = self.require_pivot(ctx, construct_step(&construct))?;
        let branches = self.compile_branches(ctx, input, std::slice::from_ref(body))?;
        self.finish_branches(ctx, construct, input, branches)
    }

    pub(crate) fn union(&mut self, ctx: CtxId, branches: &[Traversal]) -> TranslationResult<()> {
        self.multi_branch(ctx, Construct::Union, branches)
    }

    pub(crate) fn coalesce(&mut self, ctx: CtxId, branches: &[Traversal]) -> TranslationResult<()> {
        self.multi_branch(ctx, Construct::Coalesce, branches)
    }

    fn multi_branch(
        &mut self,
        ctx: CtxId,
        construct: Construct,
        branches: &[Traversal],
    ) -> TranslationResult<()> {
        let input = self.require_pivot(ctx, construct_step(&construct))?;
        if branches.is_empty() {
            return Err(TranslationError::InvalidArgument(format!(
                "{}() needs at least one branch",
                construct.function_name().to_lowercase()
            )));
        }
        let compiled = self.compile_branches(ctx, input, branches)?;
        self.finish_branches(ctx, construct, input, compiled)
    }

    /// `optional(t)`: an identity branch for rows where `t` yields nothing,
    /// then `t` itself.
    pub(crate) fn optional(&mut self, ctx: CtxId, body: &Traversal) -> TranslationResult<()> {
        let input = self.require_pivot(ctx, StepName::Optional)?;
        let branches = self.compile_branches(ctx, input, &[Traversal::new(), body.clone()])?;
        self.finish_branches(ctx, Construct::Optional, input, branches)
    }

    pub(crate) fn choose(&mut self, ctx: CtxId, choose: &ChooseStep) -> TranslationResult<()> {
        let input = self.require_pivot(ctx, StepName::Choose)?;
        match choose {
            ChooseStep::Predicate {
                predicate,
                true_branch,
                false_branch,
            } => {
                let condition = self.condition(ctx, input, predicate)?;
                let branches = self.compile_branches(
                    ctx,
                    input,
                    &[true_branch.clone(), false_branch.clone()],
                )?;
                self.finish_branches(
                    ctx,
                    Construct::Choose(ChooseForm::Predicate(condition)),
                    input,
                    branches,
                )
            }
            ChooseStep::Options {
                selector,
                options,
                default,
            } => {
                if options.is_empty() && default.is_none() {
                    return Err(TranslationError::InvalidArgument(
                        "choose() needs at least one option".to_string(),
                    ));
                }
                let selector = self.scalar_subquery(ctx, input, selector)?;
                let keys = options.iter().map(|(key, _)| Literal::from(key)).collect();
                let mut traversals: Vec<Traversal> =
                    options.iter().map(|(_, branch)| branch.clone()).collect();
                if let Some(default) = default {
                    traversals.push(default.clone());
                }
                let branches = self.compile_branches(ctx, input, &traversals)?;
                self.finish_branches(
                    ctx,
                    Construct::Choose(ChooseForm::Options { selector, keys }),
                    input,
                    branches,
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        config::CompilerConfig,
        gremlin_ast::{ChooseStep, Step, Traversal},
        query_planner::{
            compile_traversal,
            errors::TranslationError,
            types::{StepName, VariableType},
            variable::VariableKind,
            TraversalCompiler,
        },
        render_plan::{FunctionParam, QueryBlock, QueryExpr, ScalarExpr},
    };

    fn branch_blocks<'a>(block: &'a QueryBlock, construct: &str) -> Vec<&'a QueryBlock> {
        block
            .find_table_function(construct)
            .unwrap()
            .queries()
            .flat_map(|q| q.blocks())
            .collect()
    }

    /// Which columns of each branch are padded with NULL.
    fn null_columns<'a>(blocks: &[&'a QueryBlock]) -> Vec<Vec<&'a str>> {
        blocks
            .iter()
            .map(|b| {
                b.select
                    .iter()
                    .filter(|s| s.expr.is_null_literal())
                    .map(|s| s.alias.as_str())
                    .collect()
            })
            .collect()
    }

    fn pivot_type(t: Traversal) -> VariableType {
        let mut compiler = TraversalCompiler::new(CompilerConfig::default());
        compiler.compile(&t).unwrap();
        let root = compiler.arena().ctx(compiler.root()).unwrap();
        compiler.arena().var(root.pivot.unwrap()).unwrap().var_type
    }

    #[test]
    fn test_coalesce_of_vertices_stays_vertex() {
        let t = Traversal::new()
            .v()
            .coalesce(vec![Traversal::new().out(&[]), Traversal::new().in_(&[])]);
        assert_eq!(pivot_type(t.clone()), VariableType::Vertex);
        assert!(compile_traversal(&t.out(&[]), &CompilerConfig::default()).is_ok());
    }

    #[test]
    fn test_coalesce_of_vertex_and_scalar_is_mixed() {
        let t = Traversal::new().v().coalesce(vec![
            Traversal::new().out(&[]),
            Traversal::new().values(&["name"]),
        ]);
        assert_eq!(pivot_type(t.clone()), VariableType::Mixed);
        assert_eq!(
            compile_traversal(&t.out(&[]), &CompilerConfig::default()).unwrap_err(),
            TranslationError::InvalidStep {
                step: StepName::Out,
                var_type: VariableType::Mixed
            }
        );
    }

    #[test]
    fn test_vertex_and_edge_branches() {
        let t = Traversal::new()
            .v()
            .union(vec![Traversal::new().out(&[]), Traversal::new().out_e(&[])]);
        assert_eq!(pivot_type(t), VariableType::VertexAndEdge);
    }

    #[test]
    fn test_union_branches_align_on_populated_property() {
        let block = compile_traversal(
            &Traversal::new()
                .v()
                .union(vec![
                    Traversal::new().out(&[]),
                    Traversal::new().values(&["age"]),
                ])
                .values(&["name"]),
            &CompilerConfig::default(),
        )
        .unwrap();

        let union = block.find_table_function("Union").unwrap();
        let blocks = union.queries().next().unwrap().blocks();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].column_names(), vec!["_default", "name"]);
        assert_eq!(blocks[1].column_names(), vec!["_default", "name"]);
        assert!(!blocks[0].select[1].expr.is_null_literal());
        assert!(blocks[1].select[1].expr.is_null_literal());
    }

    #[test]
    fn test_empty_union_is_rejected() {
        let err = compile_traversal(&Traversal::new().v().union(vec![]), &CompilerConfig::default())
            .unwrap_err();
        assert!(matches!(err, TranslationError::InvalidArgument(_)));
    }

    #[test]
    fn test_optional_has_identity_branch_first() {
        let block = compile_traversal(
            &Traversal::new().v().optional(Traversal::new().out(&[])),
            &CompilerConfig::default(),
        )
        .unwrap();
        let optional = block.find_table_function("Optional").unwrap();
        let blocks = match optional.queries().next().unwrap() {
            q @ QueryExpr::UnionAll(..) => q.blocks(),
            other => panic!("Expected UNION ALL, got {:?}", other),
        };
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].from.is_empty());
        assert_eq!(blocks[0].select[0].expr, ScalarExpr::column("N_0", "id"));
    }

    #[test]
    fn test_choose_keeps_branches_separate() {
        let block = compile_traversal(
            &Traversal::new().v().choose(
                Traversal::new().has("age", 29),
                Traversal::new().out(&[]),
                Traversal::new().in_(&[]),
            ),
            &CompilerConfig::default(),
        )
        .unwrap();
        let choose = block.find_table_function("Choose").unwrap();
        assert!(matches!(choose.params[0], FunctionParam::Predicate(_)));
        assert_eq!(choose.queries().count(), 2);
    }

    #[test]
    fn test_choose_options_pair_keys_with_branches() {
        let block = compile_traversal(
            &Traversal::new().v().push(Step::Choose(ChooseStep::Options {
                selector: Traversal::new().values(&["lang"]),
                options: vec![
                    ("java".into(), Traversal::new().out(&[])),
                    ("python".into(), Traversal::new().in_(&[])),
                ],
                default: Some(Traversal::new()),
            })),
            &CompilerConfig::default(),
        )
        .unwrap();
        let choose = block.find_table_function("Choose").unwrap();
        assert!(matches!(choose.params[0], FunctionParam::Scalar(ScalarExpr::Subquery(_))));
        assert_eq!(choose.params.len(), 1 + 2 * 2 + 1);
        assert_eq!(choose.queries().count(), 3);
    }

    #[test]
    fn test_branches_record_their_owner() {
        let mut compiler = TraversalCompiler::new(CompilerConfig::default());
        compiler
            .compile(&Traversal::new().v().local(Traversal::new().out(&[]).count()))
            .unwrap();
        let root = compiler.arena().ctx(compiler.root()).unwrap();
        let local = root.pivot.unwrap();
        assert!(matches!(
            compiler.arena().var(local).unwrap().kind,
            VariableKind::Composite(_)
        ));
        let owned = compiler
            .arena()
            .contexts()
            .filter(|c| c.owner_var == Some(local))
            .count();
        assert_eq!(owned, 1);
    }

    #[test]
    fn test_coalesce_branches_align_on_properties_requested_later() {
        let block = compile_traversal(
            &Traversal::new()
                .v()
                .coalesce(vec![
                    Traversal::new().out(&[]),
                    Traversal::new().values(&["age"]),
                ])
                .has("age", 30)
                .values(&["name"]),
            &CompilerConfig::default(),
        )
        .unwrap();

        let blocks = branch_blocks(&block, "Coalesce");
        assert_eq!(blocks.len(), 2);
        for branch in &blocks {
            assert_eq!(branch.column_names(), vec!["_default", "age", "name"]);
        }
        assert_eq!(
            null_columns(&blocks),
            vec![Vec::<&str>::new(), vec!["age", "name"]]
        );
    }

    #[test]
    fn test_optional_branches_align_on_properties_requested_later() {
        let block = compile_traversal(
            &Traversal::new()
                .v()
                .optional(Traversal::new().out(&["knows"]))
                .values(&["name"]),
            &CompilerConfig::default(),
        )
        .unwrap();

        let blocks = branch_blocks(&block, "Optional");
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].column_names(), vec!["_default", "name"]);
        assert_eq!(blocks[1].column_names(), vec!["_default", "name"]);
        // the identity branch reads the input row's property
        assert_eq!(blocks[0].select[1].expr, ScalarExpr::column("N_0", "name"));
        assert!(!blocks[1].select[1].expr.is_null_literal());
    }

    #[test]
    fn test_choose_branches_align_on_properties_requested_later() {
        let block = compile_traversal(
            &Traversal::new()
                .v()
                .choose(
                    Traversal::new().has("age", 29),
                    Traversal::new().values(&["age"]),
                    Traversal::new().in_(&[]),
                )
                .values(&["name"]),
            &CompilerConfig::default(),
        )
        .unwrap();

        let blocks = branch_blocks(&block, "Choose");
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].column_names(), blocks[1].column_names());
        assert_eq!(blocks[0].column_names(), vec!["_default", "name"]);
        assert_eq!(null_columns(&blocks), vec![vec!["name"], Vec::<&str>::new()]);
    }
}
