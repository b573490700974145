//! Traversal paths across scope boundaries.
//!
//! A scope's history only lists the steps taken inside it. The full path of
//! a row also includes the steps of the enclosing scopes, up to the row the
//! scope was entered with, and the steps taken inside any loop or branch
//! construct along the way.
//!
//! Constructs that pass rows through (loops, `union`, `local`, the `order`
//! family, ...) carry the hops taken inside them in a path column of their
//! own once a path is requested across them. Such a construct is a *path
//! carrier*: it appears in a step list as one spliced segment instead of one
//! element.
//!
//! ```text
//! V().repeat(out()).times(2).path()
//!
//!   root:  N_0 → R_1                      Path(N_0.id) ++ R_1._path
//!   seed:  R_1._path = Path()
//!   step:  R_1._path = R_2._path ++ Path(N_4.id)
//! ```

use log::trace;

use crate::query_planner::{
    plan_ctx::{errors::PlanCtxError, CompilationArena, CtxId},
    variable::{VarId, VariableKind},
};

impl CompilationArena {
    /// Path of the rows of `ctx`, ending at `upto` (or at the current pivot).
    ///
    /// Starts with the enclosing scopes' steps up to the row `ctx` was
    /// entered with. A loop input entry stays in the list; it stands for the
    /// previous iteration's path.
    pub fn path_steps(&self, ctx: CtxId, upto: Option<VarId>) -> Result<Vec<VarId>, PlanCtxError> {
        let mut steps = match self.scope_entry(ctx)? {
            Some(entry) => self.entry_prefix(entry)?,
            None => Vec::new(),
        };
        steps.extend(self.local_path_steps(ctx, upto)?);
        Ok(steps)
    }

    /// Steps taken inside `ctx` only, without the row it was entered with.
    pub fn local_path_steps(
        &self,
        ctx: CtxId,
        upto: Option<VarId>,
    ) -> Result<Vec<VarId>, PlanCtxError> {
        let history = &self.ctx(ctx)?.history;
        let end = match upto {
            Some(var) => match self.history_position(history, var)? {
                Some(position) => position + 1,
                None => history.len(),
            },
            None => history.len(),
        };

        let mut steps = Vec::with_capacity(end);
        for (i, step) in history[..end].iter().enumerate() {
            if i == 0 && matches!(self.var(*step)?.kind, VariableKind::ContextRef { .. }) {
                continue;
            }
            steps.push(*step);
        }
        Ok(steps)
    }

    /// Whether `var` splices a path column into the paths running through it.
    pub fn carries_path(&self, var: VarId) -> Result<bool, PlanCtxError> {
        match &self.var(var)?.kind {
            VariableKind::LoopInput { repeat } => Ok(self.is_path_carrier(*repeat)),
            _ => Ok(self.is_path_carrier(var)),
        }
    }

    /// Make every construct on the current path of `ctx` carry its hops.
    pub fn track_path(&mut self, ctx: CtxId) -> Result<(), PlanCtxError> {
        for step in self.path_steps(ctx, None)? {
            self.mark_path_carrier(step)?;
        }
        Ok(())
    }

    /// Mark `var` as a path carrier when it passes rows through, together
    /// with every construct nested in its scopes.
    pub fn mark_path_carrier(&mut self, var: VarId) -> Result<(), PlanCtxError> {
        let scopes = match &self.var(var)?.kind {
            VariableKind::LoopInput { repeat } => return self.mark_path_carrier(*repeat),
            VariableKind::Repeat(r) => vec![r.body],
            VariableKind::Composite(c) if c.construct.exposes_labels() => c.branches.clone(),
            _ => return Ok(()),
        };
        if !self.insert_path_carrier(var) {
            return Ok(());
        }
        trace!("{} carries a path column", self.var(var)?.alias);

        for scope in scopes {
            for step in self.ctx(scope)?.history.clone() {
                self.mark_path_carrier(step)?;
            }
        }
        Ok(())
    }

    /// The variable `ctx` was entered with: a scope reference, a loop input,
    /// or that of the scope a barrier replays.
    fn scope_entry(&self, ctx: CtxId) -> Result<Option<VarId>, PlanCtxError> {
        let Some(first) = self.ctx(ctx)?.history.first().copied() else {
            return Ok(None);
        };
        match &self.var(first)?.kind {
            VariableKind::ContextRef { .. } | VariableKind::LoopInput { .. } => Ok(Some(first)),
            VariableKind::Composite(c) if c.construct.wraps_scope() => match c.branches.first() {
                Some(snapshot) => self.scope_entry(*snapshot),
                None => Ok(None),
            },
            _ => Ok(None),
        }
    }

    fn entry_prefix(&self, entry: VarId) -> Result<Vec<VarId>, PlanCtxError> {
        let input = match &self.var(entry)?.kind {
            VariableKind::ContextRef { real } => *real,
            VariableKind::LoopInput { repeat } => match &self.var(*repeat)?.kind {
                VariableKind::Repeat(r) => r.input,
                _ => return Ok(Vec::new()),
            },
            _ => return Ok(Vec::new()),
        };
        let owner = self.var(input)?.owner;
        self.path_steps(owner, Some(input))
    }

    /// Position of `var` in a history, looking through filter and write
    /// wrappers that replaced a pivot without moving the traversal.
    fn history_position(&self, history: &[VarId], var: VarId) -> Result<Option<usize>, PlanCtxError> {
        let mut current = var;
        loop {
            if let Some(position) = history.iter().rposition(|h| *h == current) {
                return Ok(Some(position));
            }
            current = match &self.var(current)?.kind {
                VariableKind::Filter { input, .. } => *input,
                VariableKind::PropertyWrite { target, .. } | VariableKind::Drop { target } => *target,
                _ => return Ok(None),
            };
        }
    }
}
