//! Side-effect steps: the pivot passes through unchanged.
//!
//! The side-effect construct is still cross-applied so it runs once per row,
//! and its key is bound like a label so `select(key)` and `cap(key)` read it.

use crate::query_planner::{
    plan_ctx::{ContextKind, CtxId},
    types::{StepName, VariableType},
    variable::{Composite, Construct, VariableKind},
    TranslationResult, TraversalCompiler,
};
use crate::gremlin_ast::Traversal;

impl TraversalCompiler {
    /// `aggregate(key)`, `store(key)`, `subgraph(key)`.
    pub(crate) fn collect_side_effect(
        &mut self,
        ctx: CtxId,
        construct: Construct,
        key: &str,
    ) -> TranslationResult<()> {
        let (step, var_type) = match construct {
            Construct::Subgraph { .. } => (StepName::Subgraph, VariableType::Subgraph),
            Construct::Store { .. } => (StepName::Store, VariableType::List),
            _ => (StepName::Aggregate, VariableType::List),
        };
        let pivot = self.require_pivot(ctx, step)?;

        let var = self.new_source(
            ctx,
            var_type,
            VariableKind::Composite(Composite::new(construct, Some(pivot), Vec::new())),
        )?;
        self.mark_needs_filter(var)?;
        self.mark_needs_filter(pivot)?;
        self.arena.var_mut(var)?.labels.insert(key.to_string());
        self.arena.ctx_mut(ctx)?.tag(key, var);
        Ok(())
    }

    pub(crate) fn side_effect(&mut self, ctx: CtxId, body: &Traversal) -> TranslationResult<()> {
        let pivot = self.require_pivot(ctx, StepName::SideEffect)?;
        let var_type = self.var_type(pivot)?;
        let branch = self.compile_subtraversal(ctx, ContextKind::Branch, pivot, body)?;

        let var = self.new_source(
            ctx,
            var_type,
            VariableKind::Composite(Composite::new(
                Construct::SideEffect,
                Some(pivot),
                vec![branch],
            )),
        )?;
        self.arena.ctx_mut(branch)?.owner_var = Some(var);
        self.mark_needs_filter(var)?;
        self.mark_needs_filter(pivot)
    }
}
