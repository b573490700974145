//! Label binding and resolution across nested scopes.
//!
//! `as(label)` records the pivot under `label` in the current scope.
//! Resolution collects the bindings of the current scope and of every
//! enclosing one, outermost scope first:
//!
//! - A binding made directly in the resolving scope yields a ghost with an
//!   empty chain, so every selected binding has its own synthetic column.
//! - A binding found inside a label-exposing construct of the scope (a union
//!   branch, a loop body, an `order()` snapshot) yields a ghost captured by
//!   that construct: the construct's output carries the binding under a fresh
//!   column, and the ghost reads that column.
//! - A binding found in an enclosing scope is wrapped in a context reference
//!   and read through correlation.
//!
//! Bindings are returned in binding order: creation order within a scope,
//! branch order within a construct.

use log::debug;

use crate::{
    gremlin_ast::{By, Pop},
    query_planner::{
        errors::TranslationError,
        plan_ctx::CtxId,
        types::{StepName, VariableType},
        variable::{Ghost, SelectEntry, SelectValue, VarId, VariableKind},
        TranslationResult, TraversalCompiler,
    },
};

/// A binding as seen from the scope it was found in.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Binding {
    /// Tagged directly in that scope
    Direct(VarId),
    /// Ghost re-keyed through a construct of that scope
    Captured(VarId),
}

impl Binding {
    fn var(&self) -> VarId {
        match self {
            Binding::Direct(v) | Binding::Captured(v) => *v,
        }
    }
}

/// A binding found in a scope, before any construct re-keys it.
#[derive(Debug, Clone)]
struct Found {
    /// Constructs between the scope and the binding, each with the scope
    /// holding it, outermost first
    chain: Vec<(CtxId, VarId)>,
    real: VarId,
}

impl TraversalCompiler {
    pub(crate) fn bind_labels(&mut self, ctx: CtxId, labels: &[String]) -> TranslationResult<()> {
        let pivot = self.require_pivot(ctx, StepName::As)?;
        let real = self.arena.real_of(pivot)?;
        for label in labels {
            self.arena.var_mut(pivot)?.labels.insert(label.clone());
            if real != pivot {
                self.arena.var_mut(real)?.labels.insert(label.clone());
            }
            self.arena.ctx_mut(ctx)?.tag(label, pivot);
        }
        debug!("bound {:?} to {} in {}", labels, pivot, ctx);
        Ok(())
    }

    /// The single binding of `label` that `pop` selects.
    ///
    /// Used where one value is compared or connected, so `Pop::All` is
    /// rejected rather than narrowed.
    pub(crate) fn resolve_label(&mut self, ctx: CtxId, label: &str, pop: Pop) -> TranslationResult<VarId> {
        if pop == Pop::All {
            return Err(TranslationError::InvalidArgument(format!(
                "label '{}' must resolve to a single binding, not all of them",
                label
            )));
        }
        let bound = self.resolve_bindings(ctx, label, pop)?;
        bound.first().copied().ok_or_else(|| TranslationError::UndefinedTag {
            label: label.to_string(),
        })
    }

    /// The bindings of `label` visible from `ctx` that `pop` selects, usable
    /// inside `ctx`.
    ///
    /// Enclosing scopes come first, outermost first, since their bindings
    /// were made earlier on the traversal.
    pub(crate) fn resolve_bindings(
        &mut self,
        ctx: CtxId,
        label: &str,
        pop: Pop,
    ) -> TranslationResult<Vec<VarId>> {
        let mut per_scope = Vec::new();
        let mut scope = Some(ctx);
        while let Some(current) = scope {
            let found = self.find_bindings(current, label)?;
            if !found.is_empty() {
                per_scope.push((current, found));
            }
            scope = self.arena.ctx(current)?.parent;
        }

        let mut bindings: Vec<(CtxId, Found)> = per_scope
            .into_iter()
            .rev()
            .flat_map(|(scope, found)| found.into_iter().map(move |b| (scope, b)))
            .collect();
        match pop {
            Pop::First => bindings.truncate(1),
            Pop::Last => {
                let skip = bindings.len().saturating_sub(1);
                bindings.drain(..skip);
            }
            Pop::All => {}
        }
        if bindings.is_empty() {
            return Err(TranslationError::UndefinedTag {
                label: label.to_string(),
            });
        }

        let mut vars = Vec::with_capacity(bindings.len());
        for (scope, found) in bindings {
            let binding = self.materialize(found, label, pop)?;
            let var = if scope == ctx {
                match binding {
                    Binding::Direct(var) => self.local_ghost(ctx, var, label, pop)?,
                    Binding::Captured(ghost) => ghost,
                }
            } else {
                let var_type = self.var_type(binding.var())?;
                self.new_var(
                    ctx,
                    var_type,
                    VariableKind::ContextRef {
                        real: binding.var(),
                    },
                )?
            };
            vars.push(var);
        }
        Ok(vars)
    }

    /// Bindings of `label` in `scope`, looking into label-exposing constructs.
    fn find_bindings(&self, scope: CtxId, label: &str) -> TranslationResult<Vec<Found>> {
        let s = self.arena.ctx(scope)?;
        let tagged = s.tags.get(label).cloned().unwrap_or_default();

        let mut found = Vec::new();
        for var in s.variables.clone() {
            if tagged.contains(&var) {
                found.push(Found {
                    chain: Vec::new(),
                    real: var,
                });
            }
            let v = self.arena.var(var)?;
            if !v.exposes_labels() {
                continue;
            }
            for inner_scope in v.label_scopes() {
                for inner in self.find_bindings(inner_scope, label)? {
                    let mut chain = vec![(scope, var)];
                    chain.extend(inner.chain);
                    found.push(Found {
                        chain,
                        real: inner.real,
                    });
                }
            }
        }
        Ok(found)
    }

    /// Re-key a nested binding through each construct around it, innermost first.
    fn materialize(&mut self, found: Found, label: &str, pop: Pop) -> TranslationResult<Binding> {
        if found.chain.is_empty() {
            return Ok(Binding::Direct(found.real));
        }
        let mut current = found.real;
        for (scope, construct) in found.chain.into_iter().rev() {
            current = self.capture(scope, construct, current, label, pop)?;
        }
        Ok(Binding::Captured(current))
    }

    /// Ghost of `inner` re-keyed through `construct`'s output.
    fn capture(
        &mut self,
        scope: CtxId,
        construct: VarId,
        inner: VarId,
        label: &str,
        pop: Pop,
    ) -> TranslationResult<VarId> {
        for existing in self.arena.var(construct)?.ghost_outputs().to_vec() {
            if let VariableKind::Ghost(g) = &self.arena.var(existing)?.kind {
                if g.real == inner && g.label == label && g.pop == pop {
                    return Ok(existing);
                }
            }
        }

        let ghost = self.new_ghost(scope, inner, vec![construct], label, pop)?;
        match &mut self.arena.var_mut(construct)?.kind {
            VariableKind::Composite(c) => c.ghost_outputs.push(ghost),
            VariableKind::Repeat(r) => r.ghost_outputs.push(ghost),
            _ => {}
        }
        debug!("captured {} as {} through {}", inner, ghost, construct);
        Ok(ghost)
    }

    fn local_ghost(&mut self, ctx: CtxId, var: VarId, label: &str, pop: Pop) -> TranslationResult<VarId> {
        if matches!(self.arena.var(var)?.kind, VariableKind::Ghost(_)) {
            return Ok(var);
        }
        for existing in self.arena.ctx(ctx)?.variables.clone() {
            if let VariableKind::Ghost(g) = &self.arena.var(existing)?.kind {
                if g.chain.is_empty() && g.real == var && g.label == label && g.pop == pop {
                    return Ok(existing);
                }
            }
        }
        self.new_ghost(ctx, var, Vec::new(), label, pop)
    }

    fn new_ghost(
        &mut self,
        scope: CtxId,
        real: VarId,
        chain: Vec<VarId>,
        label: &str,
        pop: Pop,
    ) -> TranslationResult<VarId> {
        let var_type = self.var_type(real)?;
        let column = self.arena.names_mut().column(label);
        self.new_var(
            scope,
            var_type,
            VariableKind::Ghost(Ghost {
                real,
                chain,
                label: label.to_string(),
                column,
                pop,
            }),
        )
    }

    /// `select(pop, labels...).by(...)`, the `by` modulators applied round-robin.
    pub(crate) fn select(
        &mut self,
        ctx: CtxId,
        pop: Pop,
        labels: &[String],
        modulators: &[By],
    ) -> TranslationResult<()> {
        if labels.is_empty() {
            return Err(TranslationError::InvalidArgument(
                "select() needs at least one label".to_string(),
            ));
        }

        let mut entries = Vec::new();
        for (i, label) in labels.iter().enumerate() {
            let chosen = self.resolve_bindings(ctx, label, pop)?;
            let modulator = if modulators.is_empty() {
                None
            } else {
                modulators.get(i % modulators.len())
            };

            for var in chosen {
                let value = match modulator {
                    None | Some(By::Identity) => SelectValue::Identity,
                    Some(By::Key(key)) => {
                        self.property_expr(var, key)?;
                        SelectValue::Property(key.clone())
                    }
                    Some(By::Traversal(t)) => SelectValue::Expr(self.scalar_subquery(ctx, var, t)?),
                };
                entries.push(SelectEntry {
                    label: label.clone(),
                    var,
                    value,
                });
            }
        }

        let var_type = match entries.as_slice() {
            [entry] if pop != Pop::All => match entry.value {
                SelectValue::Identity => self.var_type(entry.var)?,
                _ => VariableType::Scalar,
            },
            _ if labels.len() == 1 => VariableType::List,
            _ => VariableType::Map,
        };
        let var = self.new_var(ctx, var_type, VariableKind::Select { pop, entries })?;
        self.set_pivot(ctx, var)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        config::CompilerConfig,
        gremlin_ast::{By, Pop, Traversal},
        query_planner::{compile_traversal, errors::TranslationError, TraversalCompiler},
        render_plan::{QueryBlock, ScalarExpr},
    };

    fn compile(t: Traversal) -> Result<QueryBlock, TranslationError> {
        compile_traversal(&t, &CompilerConfig::default())
    }

    #[test]
    fn test_select_by_key_uses_distinct_ghost_columns() {
        let block = compile(
            Traversal::new()
                .v()
                .as_("a")
                .out(&[])
                .as_("b")
                .select_by(&["a", "b"], vec![By::Key("name".to_string())]),
        )
        .unwrap();

        assert_eq!(
            block.select_item("a_0_name").unwrap().expr,
            ScalarExpr::column("N_0", "name")
        );
        assert_eq!(
            block.select_item("b_1_name").unwrap().expr,
            ScalarExpr::column("N_2", "name")
        );
    }

    #[test]
    fn test_pop_first_and_last() {
        let t = Traversal::new().v().as_("a").out(&[]).as_("a");
        let first = compile(t.clone().select_pop(Pop::First, "a")).unwrap();
        let last = compile(t.select_pop(Pop::Last, "a")).unwrap();
        assert_eq!(first.select[0].expr, ScalarExpr::column("N_0", "id"));
        assert_eq!(last.select[0].expr, ScalarExpr::column("N_2", "id"));
    }

    #[test]
    fn test_pop_first_across_branches_picks_first_branch() {
        let block = compile(
            Traversal::new()
                .v()
                .union(vec![
                    Traversal::new().out(&[]).as_("a"),
                    Traversal::new().in_(&[]).as_("a"),
                ])
                .select_pop(Pop::First, "a"),
        )
        .unwrap();

        let union = block.find_table_function("Union").unwrap();
        let branches = union.queries().next().unwrap().blocks();
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[0].column_names(), branches[1].column_names());

        let ghost_column = match &block.select[0].expr {
            ScalarExpr::Column(c) => c.column.clone(),
            other => panic!("Expected column, got {:?}", other),
        };
        assert!(!branches[0].select_item(&ghost_column).unwrap().expr.is_null_literal());
        assert!(branches[1].select_item(&ghost_column).unwrap().expr.is_null_literal());
    }

    #[test]
    fn test_parent_binding_is_read_by_correlation() {
        let block = compile(
            Traversal::new()
                .v()
                .as_("a")
                .out(&[])
                .local(Traversal::new().select(&["a"]).values(&["name"])),
        )
        .unwrap();

        let local = block.find_table_function("Local").unwrap();
        let inner = local.queries().next().unwrap().blocks()[0];
        let values = inner.find_table_function("Values").unwrap();
        assert_eq!(
            values.params[0],
            crate::render_plan::FunctionParam::Scalar(ScalarExpr::column("N_0", "name"))
        );
    }

    #[test]
    fn test_undefined_label() {
        assert_eq!(
            compile(Traversal::new().v().select(&["x"])).unwrap_err(),
            TranslationError::UndefinedTag {
                label: "x".to_string()
            }
        );
    }

    #[test]
    fn test_relabelled_selection() {
        let block = compile(
            Traversal::new()
                .v()
                .as_("a")
                .out(&[])
                .select(&["a"])
                .as_("b")
                .select(&["b"]),
        )
        .unwrap();
        assert_eq!(block.select[0].expr, ScalarExpr::column("N_0", "id"));
    }

    #[test]
    fn test_pop_first_prefers_enclosing_binding() {
        let block = compile(
            Traversal::new().v().as_("a").union(vec![Traversal::new()
                .out(&[])
                .as_("a")
                .select_pop(Pop::First, "a")]),
        )
        .unwrap();

        let union = block.find_table_function("Union").unwrap();
        let branch = union.queries().next().unwrap().blocks()[0];
        assert_eq!(
            branch.select_item("_default").unwrap().expr,
            ScalarExpr::column("N_0", "id")
        );
    }

    #[test]
    fn test_pop_last_prefers_innermost_binding() {
        let block = compile(
            Traversal::new().v().as_("a").union(vec![Traversal::new()
                .out(&[])
                .as_("a")
                .select_pop(Pop::Last, "a")]),
        )
        .unwrap();

        let union = block.find_table_function("Union").unwrap();
        let branch = union.queries().next().unwrap().blocks()[0];
        assert_ne!(
            branch.select_item("_default").unwrap().expr,
            ScalarExpr::column("N_0", "id")
        );
    }

    #[test]
    fn test_pop_all_lists_enclosing_bindings_first() {
        let block = compile(
            Traversal::new().v().as_("a").local(
                Traversal::new()
                    .out(&[])
                    .as_("a")
                    .select_pop(Pop::All, "a"),
            ),
        )
        .unwrap();

        let local = block.find_table_function("Local").unwrap();
        let inner = local.queries().next().unwrap().blocks()[0];
        let ScalarExpr::FunctionCall(list) = &inner.select_item("_default").unwrap().expr else {
            panic!("Expected a list");
        };
        assert_eq!(list.name, "List");
        assert_eq!(list.args.len(), 2);
        assert_eq!(list.args[0], ScalarExpr::column("N_0", "id"));
    }

    #[test]
    fn test_single_binding_lookup_rejects_pop_all() {
        let mut compiler = TraversalCompiler::new(CompilerConfig::default());
        compiler.compile(&Traversal::new().v().as_("a")).unwrap();
        let root = compiler.root();

        assert!(matches!(
            compiler.resolve_label(root, "a", Pop::All),
            Err(TranslationError::InvalidArgument(_))
        ));
        assert!(compiler.resolve_label(root, "a", Pop::Last).is_ok());
    }
}
