//! Steps that subsume the whole prior scope.
//!
//! Aggregations (`count`, `fold`, `group`, ...) and barriers (`order`,
//! `dedup`, `range`) move the scope's state into a snapshot sub-context and
//! replace it with one composite variable reading that snapshot. Barriers
//! keep the snapshot's labels visible; aggregations do not.

use crate::{
    gremlin_ast::{By, OrderBy},
    query_planner::{
        plan_ctx::CtxId,
        types::{StepName, VariableType},
        variable::{Composite, Construct, SortKey, VarId, VariableKind},
        TranslationResult, TraversalCompiler,
    },
    render_plan::render_expr::ScalarExpr,
};

fn construct_step(construct: &Construct) -> StepName {
    match construct {
        Construct::Count => StepName::Count,
        Construct::Fold => StepName::Fold,
        Construct::Max => StepName::Max,
        Construct::Min => StepName::Min,
        Construct::Sum => StepName::Sum,
        Construct::Mean => StepName::Mean,
        Construct::Tree => StepName::Tree,
        Construct::Dedup => StepName::Dedup,
        Construct::Range { .. } => StepName::Range,
        Construct::Order { .. } => StepName::Order,
        Construct::Group => StepName::Group,
        _ => StepName::GroupCount,
    }
}

impl TraversalCompiler {
    fn take_snapshot(&mut self, ctx: CtxId, step: StepName) -> TranslationResult<(CtxId, VarId)> {
        let input = self.require_pivot(ctx, step)?;
        let snapshot = self.arena.snapshot(ctx)?;
        Ok((snapshot, input))
    }

    fn finish_snapshot(
        &mut self,
        ctx: CtxId,
        construct: Construct,
        snapshot: CtxId,
        input: VarId,
        var_type: VariableType,
        branch_columns: Vec<(String, ScalarExpr)>,
    ) -> TranslationResult<VarId> {
        let mut composite = Composite::new(construct, Some(input), vec![snapshot]);
        composite.branch_columns = branch_columns;
        let var = self.new_source(ctx, var_type, VariableKind::Composite(composite))?;
        self.arena.ctx_mut(snapshot)?.owner_var = Some(var);
        self.set_pivot(ctx, var)?;
        Ok(var)
    }

    /// Barrier keeping the pivot's type: `dedup`, `range`.
    pub(crate) fn wrap_scope(&mut self, ctx: CtxId, construct: Construct) -> TranslationResult<()> {
        let (snapshot, input) = self.take_snapshot(ctx, construct_step(&construct))?;
        let var_type = self.var_type(input)?;
        self.finish_snapshot(ctx, construct, snapshot, input, var_type, Vec::new())?;
        Ok(())
    }

    pub(crate) fn aggregate_scope(&mut self, ctx: CtxId, construct: Construct) -> TranslationResult<()> {
        let var_type = match construct {
            Construct::Fold => VariableType::List,
            Construct::Tree => VariableType::Tree,
            _ => VariableType::Scalar,
        };
        let (snapshot, input) = self.take_snapshot(ctx, construct_step(&construct))?;
        let needs_filter = construct == Construct::Tree;
        let var = self.finish_snapshot(ctx, construct, snapshot, input, var_type, Vec::new())?;
        if needs_filter {
            self.mark_needs_filter(var)?;
        }
        Ok(())
    }

    /// `group().by(key).by(value)`; the snapshot's layout is fixed afterwards.
    pub(crate) fn group(&mut self, ctx: CtxId, by: &[By]) -> TranslationResult<()> {
        let (snapshot, input) = self.take_snapshot(ctx, StepName::Group)?;
        let key = match by.first() {
            Some(key_by) => self.by_expr(snapshot, input, key_by)?,
            None => self.builder().expr(input, None)?,
        };
        let value = match by.get(1) {
            Some(value_by) => self.by_expr(snapshot, input, value_by)?,
            None => self.builder().expr(input, None)?,
        };
        self.arena.ctx_mut(snapshot)?.frozen_by_group = true;

        let columns = vec![("_key".to_string(), key), ("_value".to_string(), value)];
        let var = self.finish_snapshot(
            ctx,
            Construct::Group,
            snapshot,
            input,
            VariableType::Map,
            columns,
        )?;
        self.mark_needs_filter(var)
    }

    pub(crate) fn group_count(&mut self, ctx: CtxId, by: Option<&By>) -> TranslationResult<()> {
        let (snapshot, input) = self.take_snapshot(ctx, StepName::GroupCount)?;
        let key = match by {
            Some(key_by) => self.by_expr(snapshot, input, key_by)?,
            None => self.builder().expr(input, None)?,
        };
        self.arena.ctx_mut(snapshot)?.frozen_by_group = true;

        let var = self.finish_snapshot(
            ctx,
            Construct::GroupCount,
            snapshot,
            input,
            VariableType::Map,
            vec![("_key".to_string(), key)],
        )?;
        self.mark_needs_filter(var)
    }

    /// `order().by(...)`: each sort key becomes a branch-only column.
    pub(crate) fn order(&mut self, ctx: CtxId, keys: &[OrderBy]) -> TranslationResult<()> {
        let (snapshot, input) = self.take_snapshot(ctx, StepName::Order)?;
        let var_type = self.var_type(input)?;

        let identity = [OrderBy {
            by: By::Identity,
            descending: false,
        }];
        let keys = if keys.is_empty() { &identity[..] } else { keys };

        let mut sort_keys = Vec::with_capacity(keys.len());
        let mut columns = Vec::with_capacity(keys.len());
        for key in keys {
            let expr = self.by_expr(snapshot, input, &key.by)?;
            let column = self.arena.names_mut().column("sort");
            columns.push((column.clone(), expr));
            sort_keys.push(SortKey {
                column,
                descending: key.descending,
            });
        }

        self.finish_snapshot(
            ctx,
            Construct::Order { keys: sort_keys },
            snapshot,
            input,
            var_type,
            columns,
        )?;
        Ok(())
    }
}
