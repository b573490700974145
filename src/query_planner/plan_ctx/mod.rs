//! Per-scope translation state.
//!
//! [`TranslationContext`] is one lexical compilation scope, tracking:
//! - The pivot (the variable the next step applies to)
//! - Owned variables in creation order, and the subset that are table sources
//! - The accumulated conjunctive predicate
//! - Label bindings made with `as()`
//! - Path tracking and pending match paths
//!
//! # Scope Tree
//!
//! Every nested traversal gets its own context whose `parent` is the scope
//! it was written in:
//! ```text
//! V().as('a').union(out().as('b'), in()).repeat(out()).until(has('x'))
//! └─ root ──────────────────────────────────────────────────────────────┘
//!             └ branch ┘ └ branch ┘    └ body ┘       └ condition ┘
//!                                        (condition's parent is the body)
//! ```
//!
//! Label lookup walks outward through `parent`; property population walks
//! inward through the constructs owning sub-contexts.

pub mod arena;
pub mod errors;

pub use arena::CompilationArena;

use std::collections::BTreeMap;
use std::fmt;

use crate::{query_planner::variable::VarId, render_plan::render_expr::BooleanExpr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CtxId(pub usize);

impl fmt::Display for CtxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    Root,
    /// Branch of union/coalesce/optional/choose/local/map/flatMap/project/sideEffect
    Branch,
    /// Prior scope subsumed by an aggregating or barrier step
    Snapshot,
    /// `by()` modulator or `choose` selector
    Modulator,
    LoopBody,
    /// `until`/`emit` of a loop; its parent is the loop body
    LoopCondition,
    /// `where`/`not`/`and`/`or`/`choose` predicate, consumed as a boolean
    Condition,
}

/// `(source)-[edge]->(sink)` awaiting emission in the match clause.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchPath {
    pub source: Option<VarId>,
    pub edge: VarId,
    pub sink: Option<VarId>,
}

/// Termination and emission state of one `repeat`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RepeatCondition {
    /// Rewritten to read only the recursive construct's columns
    pub until: Option<BooleanExpr>,
    pub emit: Option<BooleanExpr>,
    pub cap: Option<u32>,
    pub until_first: bool,
    pub emit_first: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranslationContext {
    pub id: CtxId,
    pub parent: Option<CtxId>,
    pub kind: ContextKind,
    /// Construct that owns this scope, once it has been created
    pub owner_var: Option<VarId>,
    pub pivot: Option<VarId>,
    pub variables: Vec<VarId>,
    pub table_refs: Vec<VarId>,
    pub predicate: Option<BooleanExpr>,
    pub tags: BTreeMap<String, Vec<VarId>>,
    pub path_tracking: bool,
    pub path_variable: Option<VarId>,
    /// Pivots in traversal order, the rows of an emitted path
    pub history: Vec<VarId>,
    pub match_paths: Vec<MatchPath>,
    /// Set once a `group()` has fixed this scope's output layout
    pub frozen_by_group: bool,
}

impl TranslationContext {
    pub fn new(id: CtxId, parent: Option<CtxId>, kind: ContextKind) -> Self {
        Self {
            id,
            parent,
            kind,
            owner_var: None,
            pivot: None,
            variables: Vec::new(),
            table_refs: Vec::new(),
            predicate: None,
            tags: BTreeMap::new(),
            path_tracking: false,
            path_variable: None,
            history: Vec::new(),
            match_paths: Vec::new(),
            frozen_by_group: false,
        }
    }

    /// Clear all compilation state, keeping identity and position in the tree.
    pub fn reset(&mut self) {
        self.pivot = None;
        self.variables.clear();
        self.table_refs.clear();
        self.predicate = None;
        self.tags.clear();
        self.path_tracking = false;
        self.path_variable = None;
        self.history.clear();
        self.match_paths.clear();
        self.frozen_by_group = false;
    }

    pub fn is_tagged(&self, label: &str, var: VarId) -> bool {
        self.tags
            .get(label)
            .map(|bound| bound.contains(&var))
            .unwrap_or(false)
    }

    pub fn tag(&mut self, label: &str, var: VarId) {
        let bound = self.tags.entry(label.to_string()).or_default();
        if !bound.contains(&var) {
            bound.push(var);
        }
    }

    pub fn match_path_of_edge_mut(&mut self, edge: VarId) -> Option<&mut MatchPath> {
        self.match_paths.iter_mut().find(|p| p.edge == edge)
    }

    pub fn match_path_of_edge(&self, edge: VarId) -> Option<&MatchPath> {
        self.match_paths.iter().find(|p| p.edge == edge)
    }
}
