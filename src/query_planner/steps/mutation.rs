//! Graph-mutating steps and `inject`.
//!
//! Every variable produced here needs later predicates wrapped: the row it
//! stands for only exists after the mutation ran.

use crate::{
    gremlin_ast::{EdgeEndpoint, Pop, Value},
    query_planner::{
        plan_ctx::CtxId,
        types::{StepName, VariableType},
        variable::{VarId, VariableKind},
        TranslationResult, TraversalCompiler,
    },
    render_plan::render_expr::{Literal, ScalarExpr},
};

impl TraversalCompiler {
    pub(crate) fn inject(&mut self, ctx: CtxId, values: &[Value]) -> TranslationResult<()> {
        let var = self.new_source(
            ctx,
            VariableType::Scalar,
            VariableKind::Inject {
                values: values.iter().map(Literal::from).collect(),
            },
        )?;
        self.mark_needs_filter(var)?;
        self.set_pivot(ctx, var)
    }

    pub(crate) fn add_vertex(&mut self, ctx: CtxId, label: Option<&str>) -> TranslationResult<()> {
        let var = self.new_source(
            ctx,
            VariableType::Vertex,
            VariableKind::AddVertex {
                label: label.map(str::to_string),
            },
        )?;
        self.mark_needs_filter(var)?;
        self.set_pivot(ctx, var)
    }

    /// `addE(label)`; a missing endpoint is the current vertex.
    pub(crate) fn add_edge(
        &mut self,
        ctx: CtxId,
        label: &str,
        from: Option<&EdgeEndpoint>,
        to: Option<&EdgeEndpoint>,
    ) -> TranslationResult<()> {
        let pivot = self.require_pivot(ctx, StepName::AddE)?;
        let from = self.endpoint_expr(ctx, pivot, from)?;
        let to = self.endpoint_expr(ctx, pivot, to)?;
        let var = self.new_source(
            ctx,
            VariableType::Edge,
            VariableKind::AddEdge {
                label: label.to_string(),
                from,
                to,
            },
        )?;
        self.mark_needs_filter(var)?;
        self.set_pivot(ctx, var)
    }

    fn endpoint_expr(
        &mut self,
        ctx: CtxId,
        pivot: VarId,
        endpoint: Option<&EdgeEndpoint>,
    ) -> TranslationResult<ScalarExpr> {
        match endpoint {
            None => Ok(self.builder().expr(pivot, None)?),
            Some(EdgeEndpoint::Label(label)) => {
                let bound = self.resolve_label(ctx, label, Pop::Last)?;
                Ok(self.builder().expr(bound, None)?)
            }
            Some(EdgeEndpoint::Traversal(t)) => self.scalar_subquery(ctx, pivot, t),
        }
    }

    pub(crate) fn write_property(&mut self, ctx: CtxId, key: &str, value: &Value) -> TranslationResult<()> {
        let pivot = self.require_pivot(ctx, StepName::Property)?;
        let var_type = self.var_type(pivot)?;
        let var = self.new_source(
            ctx,
            var_type,
            VariableKind::PropertyWrite {
                target: pivot,
                key: key.to_string(),
                value: Literal::from(value),
            },
        )?;
        self.mark_needs_filter(var)?;
        self.replace_pivot(ctx, var)
    }

    pub(crate) fn drop_element(&mut self, ctx: CtxId) -> TranslationResult<()> {
        let pivot = self.require_pivot(ctx, StepName::Drop)?;
        let var = self.new_source(ctx, VariableType::Null, VariableKind::Drop { target: pivot })?;
        self.mark_needs_filter(var)?;
        self.replace_pivot(ctx, var)
    }
}
