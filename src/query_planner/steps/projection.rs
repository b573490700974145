//! Value-extracting steps.

use crate::{
    gremlin_ast::{By, Traversal, Value},
    query_planner::{
        errors::TranslationError,
        plan_ctx::{ContextKind, CtxId},
        types::{StepName, VariableType},
        variable::{Composite, Construct, VariableKind},
        TranslationResult, TraversalCompiler,
    },
    render_plan::render_expr::Literal,
};

impl TraversalCompiler {
    pub(crate) fn values(&mut self, ctx: CtxId, keys: &[String]) -> TranslationResult<()> {
        let pivot = self.require_pivot(ctx, StepName::Values)?;
        for key in keys {
            self.property_expr(pivot, key)?;
        }
        let var = self.new_source(
            ctx,
            VariableType::Scalar,
            VariableKind::Values {
                of: pivot,
                keys: keys.to_vec(),
            },
        )?;
        self.set_pivot(ctx, var)
    }

    pub(crate) fn properties(&mut self, ctx: CtxId, keys: &[String]) -> TranslationResult<()> {
        let pivot = self.require_pivot(ctx, StepName::Properties)?;
        let var_type = match self.var_type(pivot)? {
            VariableType::Vertex | VariableType::VertexAndEdge => VariableType::VertexProperty,
            _ => VariableType::Property,
        };
        for key in keys {
            self.property_expr(pivot, key)?;
        }
        let var = self.new_source(
            ctx,
            var_type,
            VariableKind::Properties {
                of: pivot,
                keys: keys.to_vec(),
            },
        )?;
        self.set_pivot(ctx, var)
    }

    pub(crate) fn value_map(&mut self, ctx: CtxId, keys: &[String]) -> TranslationResult<()> {
        let pivot = self.require_pivot(ctx, StepName::ValueMap)?;
        for key in keys {
            self.property_expr(pivot, key)?;
        }
        let var = self.new_source(
            ctx,
            VariableType::Map,
            VariableKind::ValueMap {
                of: pivot,
                keys: keys.to_vec(),
            },
        )?;
        self.set_pivot(ctx, var)
    }

    pub(crate) fn id(&mut self, ctx: CtxId) -> TranslationResult<()> {
        let pivot = self.require_pivot(ctx, StepName::Id)?;
        if !self.var_type(pivot)?.is_element() {
            self.property_expr(pivot, "id")?;
        }
        let var = self.new_var(ctx, VariableType::Scalar, VariableKind::Id { of: pivot })?;
        self.set_pivot(ctx, var)
    }

    pub(crate) fn label(&mut self, ctx: CtxId) -> TranslationResult<()> {
        let pivot = self.require_pivot(ctx, StepName::Label)?;
        self.property_expr(pivot, "label")?;
        let var = self.new_var(ctx, VariableType::Scalar, VariableKind::Label { of: pivot })?;
        self.set_pivot(ctx, var)
    }

    pub(crate) fn key(&mut self, ctx: CtxId) -> TranslationResult<()> {
        let pivot = self.require_pivot(ctx, StepName::Key)?;
        self.property_expr(pivot, "key")?;
        let var = self.new_var(ctx, VariableType::Scalar, VariableKind::Key { of: pivot })?;
        self.set_pivot(ctx, var)
    }

    pub(crate) fn value(&mut self, ctx: CtxId) -> TranslationResult<()> {
        let pivot = self.require_pivot(ctx, StepName::Value)?;
        self.property_expr(pivot, "value")?;
        let var = self.new_var(ctx, VariableType::Scalar, VariableKind::Value { of: pivot })?;
        self.set_pivot(ctx, var)
    }

    pub(crate) fn constant(&mut self, ctx: CtxId, value: &Value) -> TranslationResult<()> {
        let var = self.new_var(
            ctx,
            VariableType::Scalar,
            VariableKind::Constant(Literal::from(value)),
        )?;
        self.set_pivot(ctx, var)
    }

    /// `project(k1, k2, ...).by(...)`: one modulator scope per key, the `by`
    /// modulators applied round-robin.
    pub(crate) fn project(&mut self, ctx: CtxId, keys: &[String], by: &[By]) -> TranslationResult<()> {
        let pivot = self.require_pivot(ctx, StepName::Project)?;
        if keys.is_empty() {
            return Err(TranslationError::InvalidArgument(
                "project() needs at least one key".to_string(),
            ));
        }

        let mut branches = Vec::with_capacity(keys.len());
        for i in 0..keys.len() {
            let traversal = match by.get(i % by.len().max(1)) {
                None | Some(By::Identity) => Traversal::new(),
                Some(By::Key(key)) => Traversal::new().values(&[key.as_str()]),
                Some(By::Traversal(t)) => t.clone(),
            };
            branches.push(self.compile_subtraversal(ctx, ContextKind::Modulator, pivot, &traversal)?);
        }

        let composite = Composite::new(
            Construct::Project {
                keys: keys.to_vec(),
            },
            Some(pivot),
            branches.clone(),
        );
        let var = self.new_source(ctx, VariableType::Map, VariableKind::Composite(composite))?;
        for branch in branches {
            self.arena.ctx_mut(branch)?.owner_var = Some(var);
        }
        self.set_pivot(ctx, var)
    }

    /// `path().by(...)` over every step leading to the current row, enclosing
    /// scopes included.
    pub(crate) fn path(&mut self, ctx: CtxId, by: &[By]) -> TranslationResult<()> {
        self.arena.track_path(ctx)?;
        let steps = self.arena.path_steps(ctx, None)?;
        let mut keys = Vec::with_capacity(by.len());
        for modulator in by {
            keys.push(match modulator {
                By::Identity => None,
                By::Key(key) => Some(key.clone()),
                By::Traversal(_) => {
                    return Err(TranslationError::UnsupportedConstruct(
                        "path().by(traversal)".to_string(),
                    ))
                }
            });
        }

        if !keys.is_empty() {
            let mut position = 0;
            for step in &steps {
                if self.arena.carries_path(*step)? {
                    continue;
                }
                if let Some(key) = &keys[position % keys.len()] {
                    self.property_expr(*step, key)?;
                }
                position += 1;
            }
        }

        let var = self.new_var(
            ctx,
            VariableType::Path,
            VariableKind::Path {
                steps,
                by: keys,
                live: false,
            },
        )?;
        self.set_pivot(ctx, var)
    }

    pub(crate) fn unfold(&mut self, ctx: CtxId) -> TranslationResult<()> {
        let pivot = self.require_pivot(ctx, StepName::Unfold)?;
        let var_type = match &self.arena.var(pivot)?.kind {
            VariableKind::Composite(c) if c.construct == Construct::Fold => {
                match c.branches.first() {
                    Some(branch) => match self.arena.pivot(*branch)? {
                        Some(inner) => self.var_type(inner)?,
                        None => VariableType::Unknown,
                    },
                    None => VariableType::Unknown,
                }
            }
            _ => match self.var_type(pivot)? {
                VariableType::Map => VariableType::MapEntry,
                VariableType::List | VariableType::Path | VariableType::Tree => {
                    VariableType::Unknown
                }
                other => other,
            },
        };
        let var = self.new_source(ctx, var_type, VariableKind::Unfold { of: pivot })?;
        self.set_pivot(ctx, var)
    }
}
