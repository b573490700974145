//! Storage for every context and variable of one compilation.
//!
//! Contexts and variables refer to each other through [`CtxId`] and
//! [`VarId`] handles into this arena rather than through pointers, so a
//! ghost can name the real variable it forwards to without owning it, and
//! the whole tree is dropped at once when compilation finishes.

use std::collections::{BTreeSet, HashMap};

use super::{errors::PlanCtxError, ContextKind, CtxId, TranslationContext};
use crate::{
    query_planner::{
        types::VariableType,
        variable::{VarId, Variable, VariableKind},
    },
    utils::naming::NameGenerator,
};

#[derive(Debug, Default)]
pub struct CompilationArena {
    variables: Vec<Variable>,
    contexts: Vec<TranslationContext>,
    aliases: HashMap<String, VarId>,
    names: NameGenerator,
    path_carriers: BTreeSet<VarId>,
}

impl CompilationArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_context(&mut self, parent: Option<CtxId>, kind: ContextKind) -> CtxId {
        let id = CtxId(self.contexts.len());
        self.contexts.push(TranslationContext::new(id, parent, kind));
        id
    }

    pub fn ctx(&self, id: CtxId) -> Result<&TranslationContext, PlanCtxError> {
        self.contexts
            .get(id.0)
            .ok_or(PlanCtxError::UnknownContext { id: id.0 })
    }

    pub fn ctx_mut(&mut self, id: CtxId) -> Result<&mut TranslationContext, PlanCtxError> {
        self.contexts
            .get_mut(id.0)
            .ok_or(PlanCtxError::UnknownContext { id: id.0 })
    }

    pub fn var(&self, id: VarId) -> Result<&Variable, PlanCtxError> {
        self.variables
            .get(id.0)
            .ok_or(PlanCtxError::UnknownVariable { id: id.0 })
    }

    pub fn var_mut(&mut self, id: VarId) -> Result<&mut Variable, PlanCtxError> {
        self.variables
            .get_mut(id.0)
            .ok_or(PlanCtxError::UnknownVariable { id: id.0 })
    }

    pub fn var_by_alias(&self, alias: &str) -> Result<&Variable, PlanCtxError> {
        let id = self
            .aliases
            .get(alias)
            .ok_or_else(|| PlanCtxError::UnknownAlias {
                alias: alias.to_string(),
            })?;
        self.var(*id)
    }

    pub fn contexts(&self) -> impl Iterator<Item = &TranslationContext> {
        self.contexts.iter()
    }

    pub fn names_mut(&mut self) -> &mut NameGenerator {
        &mut self.names
    }

    /// Create a variable owned by `owner` without adding it to the scope's
    /// variable list. Loops use this to exist before their body compiles.
    pub fn allocate(
        &mut self,
        owner: CtxId,
        var_type: VariableType,
        kind: VariableKind,
    ) -> Result<VarId, PlanCtxError> {
        self.ctx(owner)?;
        let id = VarId(self.variables.len());
        let alias = self.names.alias(kind.alias_prefix());
        self.aliases.insert(alias.clone(), id);
        self.variables.push(Variable {
            id,
            alias,
            var_type,
            labels: BTreeSet::new(),
            projected: BTreeSet::new(),
            needs_filter: false,
            owner,
            kind,
        });
        Ok(id)
    }

    pub fn attach(&mut self, ctx: CtxId, var: VarId) -> Result<(), PlanCtxError> {
        self.var(var)?;
        let scope = self.ctx_mut(ctx)?;
        if !scope.variables.contains(&var) {
            scope.variables.push(var);
        }
        Ok(())
    }

    /// Create a variable and append it to its scope.
    pub fn create(
        &mut self,
        owner: CtxId,
        var_type: VariableType,
        kind: VariableKind,
    ) -> Result<VarId, PlanCtxError> {
        let id = self.allocate(owner, var_type, kind)?;
        self.attach(owner, id)?;
        Ok(id)
    }

    pub fn add_table_ref(&mut self, ctx: CtxId, var: VarId) -> Result<(), PlanCtxError> {
        let scope = self.ctx_mut(ctx)?;
        if !scope.table_refs.contains(&var) {
            scope.table_refs.push(var);
        }
        Ok(())
    }

    /// Record that `var` emits its rows' path in a column of its own.
    /// Returns false when it already did.
    pub fn insert_path_carrier(&mut self, var: VarId) -> bool {
        self.path_carriers.insert(var)
    }

    pub fn is_path_carrier(&self, var: VarId) -> bool {
        self.path_carriers.contains(&var)
    }

    pub fn pivot(&self, ctx: CtxId) -> Result<Option<VarId>, PlanCtxError> {
        Ok(self.ctx(ctx)?.pivot)
    }

    /// Whether `ctx` is `ancestor` or nested (through parents) inside it.
    pub fn is_within(&self, ctx: CtxId, ancestor: CtxId) -> Result<bool, PlanCtxError> {
        let mut current = Some(ctx);
        while let Some(id) = current {
            if id == ancestor {
                return Ok(true);
            }
            current = self.ctx(id)?.parent;
        }
        Ok(false)
    }

    /// The variable behind any chain of scope references.
    pub fn real_of(&self, var: VarId) -> Result<VarId, PlanCtxError> {
        let mut current = var;
        loop {
            match &self.var(current)?.kind {
                VariableKind::ContextRef { real } => current = *real,
                VariableKind::Ghost(g) => current = g.real,
                _ => return Ok(current),
            }
        }
    }

    /// Move the whole state of `ctx` into a fresh child scope and reset `ctx`.
    ///
    /// Used by steps that subsume the prior scope into a single new variable
    /// (`count`, `fold`, `order`, ...). Moved variables change owner; nothing
    /// is copied.
    pub fn snapshot(&mut self, ctx: CtxId) -> Result<CtxId, PlanCtxError> {
        let snapshot = self.new_context(Some(ctx), ContextKind::Snapshot);
        let source = self.ctx_mut(ctx)?;
        let mut moved = TranslationContext::new(snapshot, Some(ctx), ContextKind::Snapshot);
        moved.pivot = source.pivot;
        moved.variables = std::mem::take(&mut source.variables);
        moved.table_refs = std::mem::take(&mut source.table_refs);
        moved.predicate = source.predicate.take();
        moved.tags = std::mem::take(&mut source.tags);
        moved.path_tracking = source.path_tracking;
        moved.path_variable = source.path_variable;
        moved.history = std::mem::take(&mut source.history);
        moved.match_paths = std::mem::take(&mut source.match_paths);
        moved.frozen_by_group = source.frozen_by_group;
        source.reset();

        for var in &moved.variables {
            self.var_mut(*var)?.owner = snapshot;
        }
        *self.ctx_mut(snapshot)? = moved;
        Ok(snapshot)
    }
}
