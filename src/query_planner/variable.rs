//! Compiled values flowing through a traversal.
//!
//! A [`Variable`] pairs a type tag ([`VariableType`], what steps may follow)
//! with a payload ([`VariableKind`], which construct produced it and therefore
//! how it is emitted). Variables live in the compilation arena and refer to
//! each other through [`VarId`] handles; a variable is owned by exactly one
//! context and is never re-added to another.

use std::collections::BTreeSet;
use std::fmt;

use crate::{
    gremlin_ast::Pop,
    query_planner::{
        plan_ctx::{CtxId, RepeatCondition},
        types::VariableType,
    },
    render_plan::render_expr::{BooleanExpr, ColumnRef, Literal, ScalarExpr},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub usize);

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Out,
    In,
    Both,
}

impl Direction {
    /// Table-valued function expanding a vertex to its incident edges.
    pub fn edge_function(&self) -> &'static str {
        match self {
            Direction::Out => "VertexToForwardEdge",
            Direction::In => "VertexToBackwardEdge",
            Direction::Both => "VertexToBothEdge",
        }
    }
}

/// Which end of an edge a vertex step lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeEnd {
    Source,
    Sink,
    Other,
    Both,
}

impl EdgeEnd {
    pub fn vertex_function(&self) -> &'static str {
        match self {
            EdgeEnd::Source => "EdgeToSourceVertex",
            EdgeEnd::Sink => "EdgeToSinkVertex",
            EdgeEnd::Other => "EdgeToOtherVertex",
            EdgeEnd::Both => "EdgeToBothVertex",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VertexSource {
    /// `V()`: a plain scan of the vertex relation
    Scan,
    /// Endpoint introduced by a match path
    MatchEndpoint,
    /// Reached from an edge through a table-valued call
    FromEdge {
        edge: VarId,
        end: EdgeEnd,
        /// vertex the edge was reached from, needed by `otherV`
        origin: Option<VarId>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum EdgeSource {
    /// `E()`
    Scan,
    /// Edge of a match path; `origin` is the vertex it was reached from
    MatchEdge { origin: Option<VarId> },
    FromVertex { vertex: VarId, direction: Direction },
}

/// One `(label, value)` pair of a `select`.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectEntry {
    pub label: String,
    pub var: VarId,
    pub value: SelectValue,
}

/// What a `by()` modulator made of a selected binding.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectValue {
    Identity,
    Property(String),
    /// `by(traversal)`: a scalar subquery built when the step compiled
    Expr(ScalarExpr),
}

/// A forwarding reference to a label binding captured by a nested construct.
///
/// `chain` lists the label-exposing constructs the binding was found
/// through, outermost first; the real variable lives in a branch of the last
/// one. An empty chain means the binding is in the resolving scope itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Ghost {
    pub real: VarId,
    pub chain: Vec<VarId>,
    pub label: String,
    /// Synthetic base column the binding is re-keyed to at each boundary
    pub column: String,
    pub pop: Pop,
}

impl Ghost {
    /// Construct whose output carries this ghost in the resolving scope.
    pub fn capture(&self) -> Option<VarId> {
        self.chain.first().copied()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub column: String,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChooseForm {
    /// Branches are `[true, false]`
    Predicate(BooleanExpr),
    /// One branch per key, then the default branch
    Options {
        selector: ScalarExpr,
        keys: Vec<Literal>,
    },
}

/// Construct behind a [`Composite`] variable.
#[derive(Debug, Clone, PartialEq)]
pub enum Construct {
    Union,
    Coalesce,
    Optional,
    Choose(ChooseForm),
    Local,
    Map,
    FlatMap,
    Order { keys: Vec<SortKey> },
    Range { low: i64, high: i64 },
    Dedup,
    Count,
    Fold,
    Max,
    Min,
    Sum,
    Mean,
    Group,
    GroupCount,
    Tree,
    SideEffect,
    Aggregate { key: String },
    Store { key: String },
    Subgraph { key: String },
    Project { keys: Vec<String> },
}

impl Construct {
    pub fn function_name(&self) -> &'static str {
        match self {
            Construct::Union => "Union",
            Construct::Coalesce => "Coalesce",
            Construct::Optional => "Optional",
            Construct::Choose(_) => "Choose",
            Construct::Local => "Local",
            Construct::Map => "Map",
            Construct::FlatMap => "FlatMap",
            Construct::Order { .. } => "OrderBy",
            Construct::Range { .. } => "Range",
            Construct::Dedup => "Dedup",
            Construct::Count => "Count",
            Construct::Fold => "Fold",
            Construct::Max => "Max",
            Construct::Min => "Min",
            Construct::Sum => "Sum",
            Construct::Mean => "Mean",
            Construct::Group => "Group",
            Construct::GroupCount => "GroupCount",
            Construct::Tree => "Tree",
            Construct::SideEffect => "SideEffect",
            Construct::Aggregate { .. } => "Aggregate",
            Construct::Store { .. } => "Store",
            Construct::Subgraph { .. } => "Subgraph",
            Construct::Project { .. } => "Project",
        }
    }

    /// Whether a property requested on the construct is requested on every
    /// branch pivot too, i.e. the construct passes its branches' rows through.
    pub fn forwards_population(&self) -> bool {
        matches!(
            self,
            Construct::Union
                | Construct::Coalesce
                | Construct::Optional
                | Construct::Choose(_)
                | Construct::Local
                | Construct::Map
                | Construct::FlatMap
                | Construct::Order { .. }
                | Construct::Range { .. }
                | Construct::Dedup
                | Construct::Fold
        )
    }

    /// Whether labels bound inside the branches stay visible after the construct.
    pub fn exposes_labels(&self) -> bool {
        matches!(
            self,
            Construct::Union
                | Construct::Coalesce
                | Construct::Optional
                | Construct::Choose(_)
                | Construct::Local
                | Construct::Map
                | Construct::FlatMap
                | Construct::Order { .. }
                | Construct::Range { .. }
                | Construct::Dedup
        )
    }

    /// Whether the construct replays the whole prior scope from a snapshot.
    pub fn wraps_scope(&self) -> bool {
        matches!(
            self,
            Construct::Order { .. } | Construct::Range { .. } | Construct::Dedup
        )
    }

    /// Whether all branches are concatenated into one UNION ALL parameter.
    pub fn concatenates_branches(&self) -> bool {
        matches!(self, Construct::Union | Construct::Optional)
    }
}

/// A variable produced by a construct wrapping one or more sub-contexts.
#[derive(Debug, Clone, PartialEq)]
pub struct Composite {
    pub construct: Construct,
    /// Pivot the construct was applied to
    pub input: Option<VarId>,
    pub branches: Vec<CtxId>,
    /// Ghosts re-keyed through this construct's output
    pub ghost_outputs: Vec<VarId>,
    /// Branch-only columns (sort keys, group keys) appended after the layout
    pub branch_columns: Vec<(String, ScalarExpr)>,
}

impl Composite {
    pub fn new(construct: Construct, input: Option<VarId>, branches: Vec<CtxId>) -> Self {
        Self {
            construct,
            input,
            branches,
            ghost_outputs: Vec::new(),
            branch_columns: Vec::new(),
        }
    }
}

/// Value a loop condition reads from the loop body, carried through the
/// recursive construct under a synthetic column.
#[derive(Debug, Clone, PartialEq)]
pub struct PulledColumn {
    pub column: String,
    pub source: ColumnRef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RepeatLoop {
    pub input: VarId,
    pub body: CtxId,
    /// First variable of the body, reading the previous iteration's row
    pub loop_input: Option<VarId>,
    pub condition: RepeatCondition,
    pub ghost_outputs: Vec<VarId>,
    pub pulled: Vec<PulledColumn>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VariableKind {
    Vertex(VertexSource),
    Edge(EdgeSource),
    Values { of: VarId, keys: Vec<String> },
    Properties { of: VarId, keys: Vec<String> },
    ValueMap { of: VarId, keys: Vec<String> },
    Id { of: VarId },
    Label { of: VarId },
    Key { of: VarId },
    Value { of: VarId },
    Constant(Literal),
    /// Predicate that could not be conjoined onto the scope
    Filter { input: VarId, predicate: BooleanExpr },
    /// Read-only reference to a variable of an enclosing scope
    ContextRef { real: VarId },
    Ghost(Ghost),
    /// The row entering one iteration of a loop body
    LoopInput { repeat: VarId },
    Select { pop: Pop, entries: Vec<SelectEntry> },
    Unfold { of: VarId },
    /// `live` paths follow the owning scope's history at emission time
    Path {
        steps: Vec<VarId>,
        by: Vec<Option<String>>,
        live: bool,
    },
    Composite(Composite),
    Repeat(RepeatLoop),
    Inject { values: Vec<Literal> },
    AddVertex { label: Option<String> },
    AddEdge {
        label: String,
        from: ScalarExpr,
        to: ScalarExpr,
    },
    PropertyWrite {
        target: VarId,
        key: String,
        value: Literal,
    },
    Drop { target: VarId },
}

impl VariableKind {
    pub fn alias_prefix(&self) -> &'static str {
        match self {
            VariableKind::Vertex(_) | VariableKind::AddVertex { .. } => "N",
            VariableKind::Edge(_) | VariableKind::AddEdge { .. } => "E",
            _ => "R",
        }
    }

    /// Whether the variable contributes an entry of its scope's from-clause.
    pub fn is_table_source(&self) -> bool {
        !matches!(
            self,
            VariableKind::Id { .. }
                | VariableKind::Label { .. }
                | VariableKind::Key { .. }
                | VariableKind::Value { .. }
                | VariableKind::Constant(_)
                | VariableKind::ContextRef { .. }
                | VariableKind::Ghost(_)
                | VariableKind::Select { .. }
                | VariableKind::Path { .. }
        )
    }

    pub fn as_composite(&self) -> Option<&Composite> {
        match self {
            VariableKind::Composite(c) => Some(c),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub id: VarId,
    /// Relational alias, unique within one compilation
    pub alias: String,
    pub var_type: VariableType,
    pub labels: BTreeSet<String>,
    /// Properties guaranteed to be materialized at emission time
    pub projected: BTreeSet<String>,
    pub needs_filter: bool,
    pub owner: CtxId,
    pub kind: VariableKind,
}

impl Variable {
    /// A vertex or edge whose emission can still absorb a match-path role.
    pub fn is_free_element(&self, scope: CtxId) -> bool {
        if self.owner != scope || self.needs_filter {
            return false;
        }
        matches!(
            self.kind,
            VariableKind::Vertex(VertexSource::Scan)
                | VariableKind::Vertex(VertexSource::MatchEndpoint)
        )
    }

    /// Whether later predicates must be wrapped in their own filter source.
    pub fn requires_wrapped_filter(&self) -> bool {
        self.needs_filter
    }

    /// Ghosts re-keyed through this variable's output, for composites and loops.
    pub fn ghost_outputs(&self) -> &[VarId] {
        match &self.kind {
            VariableKind::Composite(c) => &c.ghost_outputs,
            VariableKind::Repeat(r) => &r.ghost_outputs,
            _ => &[],
        }
    }

    pub fn exposes_labels(&self) -> bool {
        match &self.kind {
            VariableKind::Composite(c) => c.construct.exposes_labels(),
            VariableKind::Repeat(_) => true,
            _ => false,
        }
    }

    /// Sub-contexts whose labels this variable exposes, in binding order.
    pub fn label_scopes(&self) -> Vec<CtxId> {
        match &self.kind {
            VariableKind::Composite(c) if c.construct.exposes_labels() => c.branches.clone(),
            VariableKind::Repeat(r) => vec![r.body],
            _ => Vec::new(),
        }
    }
}
