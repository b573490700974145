//! Traversal compilation.
//!
//! [`TraversalCompiler`] threads a step sequence left to right through the
//! root [`TranslationContext`](plan_ctx::TranslationContext). Each step is
//! checked against the pivot's capability set, then compiled by the family
//! module under [`steps`]; nested traversals get their own sub-context and are
//! compiled to completion before the construct owning them is created.
//!
//! ```text
//! Traversal ──► compile_step (per step) ──► CompilationArena ──► PlanBuilder ──► QueryBlock
//!                    │                          (contexts,
//!                    ├─ steps::*                  variables)
//!                    ├─ label_resolver
//!                    ├─ branch_unifier
//!                    └─ loop_compiler
//! ```

pub mod branch_unifier;
pub mod errors;
pub mod label_resolver;
pub mod loop_compiler;
pub mod path_tracking;
pub mod plan_ctx;
pub mod population;
pub mod steps;
pub mod types;
pub mod variable;

use log::debug;

pub use errors::TranslationError;

use crate::{
    config::CompilerConfig,
    gremlin_ast::{By, Traversal},
    render_plan::{
        plan_builder::PlanBuilder,
        render_expr::{conjoin, BooleanExpr, ScalarExpr},
        QueryBlock, QueryExpr,
    },
};
use plan_ctx::{CompilationArena, ContextKind, CtxId};
use types::{StepName, VariableType};
use variable::{VarId, VariableKind};

pub type TranslationResult<T> = Result<T, TranslationError>;

/// Compile `traversal` and emit its query block.
pub fn compile_traversal(
    traversal: &Traversal,
    config: &CompilerConfig,
) -> TranslationResult<QueryBlock> {
    let mut compiler = TraversalCompiler::new(config.clone());
    compiler.compile(traversal)?;
    compiler.emit()
}

/// One compilation: the arena of contexts and variables plus the config.
///
/// Not re-entrant: a compiler instance handles one traversal.
pub struct TraversalCompiler {
    arena: CompilationArena,
    config: CompilerConfig,
    root: CtxId,
}

impl TraversalCompiler {
    pub fn new(config: CompilerConfig) -> Self {
        let mut arena = CompilationArena::new();
        let root = arena.new_context(None, ContextKind::Root);
        Self {
            arena,
            config,
            root,
        }
    }

    pub fn arena(&self) -> &CompilationArena {
        &self.arena
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn root(&self) -> CtxId {
        self.root
    }

    pub fn compile(&mut self, traversal: &Traversal) -> TranslationResult<()> {
        if traversal.is_empty() {
            return Err(TranslationError::InvalidArgument(
                "traversal has no steps".to_string(),
            ));
        }
        self.compile_steps(self.root, traversal)
    }

    pub fn emit(&self) -> TranslationResult<QueryBlock> {
        Ok(self.builder().build_query(self.root)?)
    }

    pub(crate) fn builder(&self) -> PlanBuilder<'_> {
        PlanBuilder::new(&self.arena, &self.config)
    }

    pub(crate) fn compile_steps(&mut self, ctx: CtxId, traversal: &Traversal) -> TranslationResult<()> {
        for step in &traversal.steps {
            self.compile_step(ctx, step)?;
        }
        Ok(())
    }

    pub(crate) fn require_pivot(&self, ctx: CtxId, step: StepName) -> TranslationResult<VarId> {
        self.arena
            .pivot(ctx)?
            .ok_or(TranslationError::MissingPivot { step })
    }

    pub(crate) fn var_type(&self, var: VarId) -> TranslationResult<VariableType> {
        Ok(self.arena.var(var)?.var_type)
    }

    pub(crate) fn new_var(
        &mut self,
        ctx: CtxId,
        var_type: VariableType,
        kind: VariableKind,
    ) -> TranslationResult<VarId> {
        Ok(self.arena.create(ctx, var_type, kind)?)
    }

    /// Create a variable that contributes a from-clause entry.
    pub(crate) fn new_source(
        &mut self,
        ctx: CtxId,
        var_type: VariableType,
        kind: VariableKind,
    ) -> TranslationResult<VarId> {
        let var = self.arena.create(ctx, var_type, kind)?;
        self.arena.add_table_ref(ctx, var)?;
        Ok(var)
    }

    /// Move the pivot to a new traversal position (recorded in the path).
    pub(crate) fn set_pivot(&mut self, ctx: CtxId, var: VarId) -> TranslationResult<()> {
        let scope = self.arena.ctx_mut(ctx)?;
        scope.pivot = Some(var);
        scope.history.push(var);
        if scope.path_tracking {
            self.arena.mark_path_carrier(var)?;
        }
        Ok(())
    }

    /// Replace the pivot with a wrapper of the same traversal position.
    pub(crate) fn replace_pivot(&mut self, ctx: CtxId, var: VarId) -> TranslationResult<()> {
        self.arena.ctx_mut(ctx)?.pivot = Some(var);
        Ok(())
    }

    pub(crate) fn mark_needs_filter(&mut self, var: VarId) -> TranslationResult<()> {
        self.arena.var_mut(var)?.needs_filter = true;
        Ok(())
    }

    /// Apply a predicate to the pivot's rows.
    ///
    /// Conjoined onto the scope unless the pivot can no longer absorb one, in
    /// which case a filter source wraps the pivot and takes its place.
    pub(crate) fn merge_predicate(
        &mut self,
        ctx: CtxId,
        predicate: BooleanExpr,
    ) -> TranslationResult<()> {
        let pivot = self.require_pivot(ctx, StepName::Where)?;
        let (var_type, wrapped) = {
            let var = self.arena.var(pivot)?;
            (var.var_type, var.requires_wrapped_filter())
        };

        if wrapped {
            let filter = self.new_source(
                ctx,
                var_type,
                VariableKind::Filter {
                    input: pivot,
                    predicate,
                },
            )?;
            self.mark_needs_filter(filter)?;
            debug!("wrapped predicate on {} in filter {}", pivot, filter);
            return self.replace_pivot(ctx, filter);
        }

        let scope = self.arena.ctx_mut(ctx)?;
        scope.predicate = Some(conjoin(scope.predicate.take(), predicate));
        Ok(())
    }

    /// Column carrying `key` of `var`, populating it where it is not intrinsic.
    pub(crate) fn property_expr(&mut self, var: VarId, key: &str) -> TranslationResult<ScalarExpr> {
        if !self.is_intrinsic(var, key)? {
            self.arena.populate(var, key, None)?;
        }
        Ok(self.builder().expr(var, Some(key))?)
    }

    /// Whether `key` is a column every row of `var`'s source carries anyway.
    fn is_intrinsic(&self, var: VarId, key: &str) -> TranslationResult<bool> {
        let mut current = var;
        loop {
            let v = self.arena.var(current)?;
            match &v.kind {
                VariableKind::ContextRef { real } => current = *real,
                VariableKind::Vertex(_)
                | VariableKind::Edge(_)
                | VariableKind::AddVertex { .. }
                | VariableKind::AddEdge { .. } => return Ok(matches!(key, "id" | "label")),
                VariableKind::Properties { .. } => {
                    return Ok(matches!(key, "id" | "label" | "key" | "value"))
                }
                _ => return Ok(false),
            }
        }
    }

    /// Child scope whose first variable reads `input` from the enclosing scope.
    pub(crate) fn new_subcontext(
        &mut self,
        ctx: CtxId,
        kind: ContextKind,
        input: VarId,
    ) -> TranslationResult<CtxId> {
        let sub = self.arena.new_context(Some(ctx), kind);
        let var_type = self.var_type(input)?;
        let reference = self.new_var(sub, var_type, VariableKind::ContextRef { real: input })?;
        self.set_pivot(sub, reference)?;
        Ok(sub)
    }

    pub(crate) fn compile_subtraversal(
        &mut self,
        ctx: CtxId,
        kind: ContextKind,
        input: VarId,
        traversal: &Traversal,
    ) -> TranslationResult<CtxId> {
        let sub = self.new_subcontext(ctx, kind, input)?;
        self.compile_steps(sub, traversal)?;
        Ok(sub)
    }

    /// A nested traversal consumed as a boolean test of `input`.
    pub(crate) fn condition(
        &mut self,
        ctx: CtxId,
        input: VarId,
        traversal: &Traversal,
    ) -> TranslationResult<BooleanExpr> {
        let sub = self.compile_subtraversal(ctx, ContextKind::Condition, input, traversal)?;
        Ok(self.builder().condition(sub)?)
    }

    /// A nested traversal consumed as the scalar value of its first row.
    pub(crate) fn scalar_subquery(
        &mut self,
        ctx: CtxId,
        input: VarId,
        traversal: &Traversal,
    ) -> TranslationResult<ScalarExpr> {
        let sub = self.compile_subtraversal(ctx, ContextKind::Modulator, input, traversal)?;
        let block = self.builder().value_block(sub)?;
        Ok(ScalarExpr::Subquery(Box::new(QueryExpr::block(block))))
    }

    /// Value a `by()` modulator computes from `var`.
    pub(crate) fn by_expr(&mut self, ctx: CtxId, var: VarId, by: &By) -> TranslationResult<ScalarExpr> {
        match by {
            By::Identity => Ok(self.builder().expr(var, None)?),
            By::Key(key) => self.property_expr(var, key),
            By::Traversal(t) => self.scalar_subquery(ctx, var, t),
        }
    }
}
