//! Lazy property projection.
//!
//! Variables start out emitting only their default column. Whenever a later
//! step needs a property of a variable (`values('name')`, `has('age', ...)`,
//! `select('a').by('name')`) the property is *populated* on that variable,
//! and wrappers forward the request to whatever they wrap, so the property
//! surfaces in every branch of a union and in both halves of a loop.
//!
//! # Forwarding
//!
//! ```text
//! ContextRef / Ghost      → the real variable (label check carried along)
//! Filter / PropertyWrite  → the filtered / written variable
//! LoopInput               → the loop it feeds back into
//! Repeat                  → the loop input and the body pivot
//! Unfold / Select / Path  → the unfolded value / selected bindings / path steps
//! row-passing composites  → every branch pivot
//! ```
//!
//! Insertion happens before forwarding, which stops the cycle
//! `Repeat → body pivot → ... → LoopInput → Repeat`.

use log::trace;

use crate::query_planner::{
    plan_ctx::{errors::PlanCtxError, CompilationArena},
    variable::{VarId, VariableKind},
};

impl CompilationArena {
    /// Ensure `property` is materialized for `var`.
    ///
    /// Returns false when `label` is given but not held by `var`, or when the
    /// owning scope's layout was fixed by `group()`. Repeated calls are no-ops.
    pub fn populate(
        &mut self,
        var: VarId,
        property: &str,
        label: Option<&str>,
    ) -> Result<bool, PlanCtxError> {
        if let Some(label) = label {
            if !self.var(var)?.labels.contains(label) {
                return Ok(false);
            }
        }

        let mut pending: Vec<(VarId, Option<String>)> = vec![(var, label.map(str::to_string))];
        let mut accepted = false;
        let mut first = true;
        while let Some((current, label)) = pending.pop() {
            let owner = self.var(current)?.owner;
            if self.ctx(owner)?.frozen_by_group {
                trace!("populate {} on {}: scope {} is frozen", property, current, owner);
                first = false;
                continue;
            }
            if let Some(label) = &label {
                if !self.var(current)?.labels.contains(label) {
                    first = false;
                    continue;
                }
            }

            let inserted = self.var_mut(current)?.projected.insert(property.to_string());
            if first {
                accepted = true;
                first = false;
            }
            if !inserted {
                continue;
            }
            trace!("populated {} on {}", property, self.var(current)?.alias);
            pending.extend(self.population_targets(current, label)?);
        }
        Ok(accepted)
    }

    fn population_targets(
        &self,
        var: VarId,
        label: Option<String>,
    ) -> Result<Vec<(VarId, Option<String>)>, PlanCtxError> {
        let unlabelled = |ids: Vec<VarId>| -> Vec<(VarId, Option<String>)> {
            ids.into_iter().map(|id| (id, None)).collect()
        };
        let targets = match &self.var(var)?.kind {
            VariableKind::ContextRef { real } => vec![(*real, label)],
            VariableKind::Ghost(g) => vec![(g.real, label)],
            VariableKind::Filter { input, .. } => unlabelled(vec![*input]),
            VariableKind::PropertyWrite { target, .. } => unlabelled(vec![*target]),
            VariableKind::LoopInput { repeat } => unlabelled(vec![*repeat]),
            VariableKind::Unfold { of } => unlabelled(vec![*of]),
            VariableKind::Select { entries, .. } => {
                unlabelled(entries.iter().map(|e| e.var).collect())
            }
            VariableKind::Path { steps, live, .. } => {
                let steps = if *live {
                    self.ctx(self.var(var)?.owner)?.history.clone()
                } else {
                    steps.clone()
                };
                unlabelled(steps)
            }
            VariableKind::Composite(c) if c.construct.forwards_population() => {
                let mut pivots = Vec::new();
                for branch in &c.branches {
                    if let Some(pivot) = self.ctx(*branch)?.pivot {
                        pivots.push(pivot);
                    }
                }
                unlabelled(pivots)
            }
            VariableKind::Repeat(r) => {
                let mut ids = vec![r.input];
                if let Some(pivot) = self.ctx(r.body)?.pivot {
                    ids.push(pivot);
                }
                unlabelled(ids)
            }
            _ => Vec::new(),
        };
        Ok(targets)
    }
}

#[cfg(test)]
mod tests {
    use crate::query_planner::{
        plan_ctx::{CompilationArena, ContextKind},
        types::VariableType,
        variable::{VariableKind, VertexSource},
    };

    #[test]
    fn test_populate_is_idempotent() {
        let mut arena = CompilationArena::new();
        let root = arena.new_context(None, ContextKind::Root);
        let v = arena
            .create(root, VariableType::Vertex, VariableKind::Vertex(VertexSource::Scan))
            .unwrap();

        assert!(arena.populate(v, "name", None).unwrap());
        let after_first = arena.var(v).unwrap().projected.clone();
        assert!(arena.populate(v, "name", None).unwrap());
        assert_eq!(arena.var(v).unwrap().projected, after_first);
    }

    #[test]
    fn test_populate_rejects_unheld_label() {
        let mut arena = CompilationArena::new();
        let root = arena.new_context(None, ContextKind::Root);
        let v = arena
            .create(root, VariableType::Vertex, VariableKind::Vertex(VertexSource::Scan))
            .unwrap();

        assert!(!arena.populate(v, "name", Some("a")).unwrap());
        assert!(arena.var(v).unwrap().projected.is_empty());

        arena.var_mut(v).unwrap().labels.insert("a".to_string());
        assert!(arena.populate(v, "name", Some("a")).unwrap());
    }

    #[test]
    fn test_context_ref_forwards_to_real() {
        let mut arena = CompilationArena::new();
        let root = arena.new_context(None, ContextKind::Root);
        let child = arena.new_context(Some(root), ContextKind::Branch);
        let real = arena
            .create(root, VariableType::Vertex, VariableKind::Vertex(VertexSource::Scan))
            .unwrap();
        let reference = arena
            .create(child, VariableType::Vertex, VariableKind::ContextRef { real })
            .unwrap();

        arena.populate(reference, "age", None).unwrap();
        assert!(arena.var(real).unwrap().projected.contains("age"));
    }

    #[test]
    fn test_frozen_scope_ignores_requests() {
        let mut arena = CompilationArena::new();
        let root = arena.new_context(None, ContextKind::Root);
        let v = arena
            .create(root, VariableType::Vertex, VariableKind::Vertex(VertexSource::Scan))
            .unwrap();
        arena.ctx_mut(root).unwrap().frozen_by_group = true;

        assert!(!arena.populate(v, "name", None).unwrap());
        assert!(arena.var(v).unwrap().projected.is_empty());
    }
}
