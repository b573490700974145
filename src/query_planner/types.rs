//! Variable type tags and the step capability registry.
//!
//! Every step is legal on a variable only if the step is in the capability
//! set of the variable's [`VariableType`]. The registry is a static table
//! rather than per-type code so the type-gating rule lives in one place.

use std::collections::{HashMap, HashSet};
use std::fmt;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::gremlin_ast::Step;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariableType {
    Vertex,
    Edge,
    VertexAndEdge,
    Scalar,
    Property,
    VertexProperty,
    Map,
    MapEntry,
    List,
    Path,
    Tree,
    Subgraph,
    Mixed,
    Unknown,
    Null,
}

impl VariableType {
    pub fn is_element(&self) -> bool {
        matches!(
            self,
            VariableType::Vertex | VariableType::Edge | VariableType::VertexAndEdge
        )
    }

    /// Alias prefix for relational sources of this type.
    pub fn alias_prefix(&self) -> &'static str {
        match self {
            VariableType::Vertex => "N",
            VariableType::Edge => "E",
            _ => "R",
        }
    }

    /// Column a source of this type exposes as its value.
    pub fn default_column(&self) -> &'static str {
        if self.is_element() {
            "id"
        } else {
            "value"
        }
    }

    /// Resolve the type of a construct whose rows come from several branches.
    ///
    /// Identical types unify to that type; a mix of vertices and edges to
    /// `VertexAndEdge`; anything else degrades to `Mixed`. `Null` branches
    /// (e.g. `drop()`) produce no rows and do not take part.
    pub fn unify(types: &[VariableType]) -> VariableType {
        let live: Vec<VariableType> = types
            .iter()
            .copied()
            .filter(|t| *t != VariableType::Null)
            .collect();
        let Some(first) = live.first().copied() else {
            return VariableType::Null;
        };
        if live.iter().all(|t| *t == first) {
            return first;
        }
        if live.iter().all(|t| t.is_element()) {
            return VariableType::VertexAndEdge;
        }
        VariableType::Mixed
    }
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Name of a step, independent of its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepName {
    V,
    E,
    Out,
    In,
    Both,
    OutE,
    InE,
    BothE,
    OutV,
    InV,
    OtherV,
    BothV,
    Has,
    HasLabel,
    HasId,
    HasKey,
    HasNot,
    Is,
    Where,
    Not,
    And,
    Or,
    SimplePath,
    CyclicPath,
    Dedup,
    Range,
    Values,
    Properties,
    ValueMap,
    Id,
    Label,
    Key,
    Value,
    Constant,
    As,
    Select,
    Project,
    Count,
    Fold,
    Unfold,
    Max,
    Min,
    Sum,
    Mean,
    Group,
    GroupCount,
    Order,
    Path,
    Tree,
    Map,
    FlatMap,
    Local,
    Union,
    Coalesce,
    Optional,
    Choose,
    Repeat,
    Aggregate,
    Store,
    SideEffect,
    Subgraph,
    Cap,
    Inject,
    AddV,
    AddE,
    Property,
    Drop,
    Barrier,
    TimeLimit,
}

impl StepName {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepName::V => "V",
            StepName::E => "E",
            StepName::Out => "out",
            StepName::In => "in",
            StepName::Both => "both",
            StepName::OutE => "outE",
            StepName::InE => "inE",
            StepName::BothE => "bothE",
            StepName::OutV => "outV",
            StepName::InV => "inV",
            StepName::OtherV => "otherV",
            StepName::BothV => "bothV",
            StepName::Has => "has",
            StepName::HasLabel => "hasLabel",
            StepName::HasId => "hasId",
            StepName::HasKey => "hasKey",
            StepName::HasNot => "hasNot",
            StepName::Is => "is",
            StepName::Where => "where",
            StepName::Not => "not",
            StepName::And => "and",
            StepName::Or => "or",
            StepName::SimplePath => "simplePath",
            StepName::CyclicPath => "cyclicPath",
            StepName::Dedup => "dedup",
            StepName::Range => "range",
            StepName::Values => "values",
            StepName::Properties => "properties",
            StepName::ValueMap => "valueMap",
            StepName::Id => "id",
            StepName::Label => "label",
            StepName::Key => "key",
            StepName::Value => "value",
            StepName::Constant => "constant",
            StepName::As => "as",
            StepName::Select => "select",
            StepName::Project => "project",
            StepName::Count => "count",
            StepName::Fold => "fold",
            StepName::Unfold => "unfold",
            StepName::Max => "max",
            StepName::Min => "min",
            StepName::Sum => "sum",
            StepName::Mean => "mean",
            StepName::Group => "group",
            StepName::GroupCount => "groupCount",
            StepName::Order => "order",
            StepName::Path => "path",
            StepName::Tree => "tree",
            StepName::Map => "map",
            StepName::FlatMap => "flatMap",
            StepName::Local => "local",
            StepName::Union => "union",
            StepName::Coalesce => "coalesce",
            StepName::Optional => "optional",
            StepName::Choose => "choose",
            StepName::Repeat => "repeat",
            StepName::Aggregate => "aggregate",
            StepName::Store => "store",
            StepName::SideEffect => "sideEffect",
            StepName::Subgraph => "subgraph",
            StepName::Cap => "cap",
            StepName::Inject => "inject",
            StepName::AddV => "addV",
            StepName::AddE => "addE",
            StepName::Property => "property",
            StepName::Drop => "drop",
            StepName::Barrier => "barrier",
            StepName::TimeLimit => "timeLimit",
        }
    }

    /// Steps that start a traversal and need no pivot.
    pub fn is_source(&self) -> bool {
        matches!(
            self,
            StepName::V | StepName::E | StepName::Inject | StepName::AddV
        )
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Step {
    pub fn name(&self) -> StepName {
        match self {
            Step::V(_) => StepName::V,
            Step::E(_) => StepName::E,
            Step::Out(_) => StepName::Out,
            Step::In(_) => StepName::In,
            Step::Both(_) => StepName::Both,
            Step::OutE(_) => StepName::OutE,
            Step::InE(_) => StepName::InE,
            Step::BothE(_) => StepName::BothE,
            Step::OutV => StepName::OutV,
            Step::InV => StepName::InV,
            Step::OtherV => StepName::OtherV,
            Step::BothV => StepName::BothV,
            Step::Has(_) => StepName::Has,
            Step::HasLabel(_) => StepName::HasLabel,
            Step::HasId(_) => StepName::HasId,
            Step::HasKey(_) => StepName::HasKey,
            Step::HasNot(_) => StepName::HasNot,
            Step::Is(_) => StepName::Is,
            Step::Where(_) | Step::WhereLabel { .. } => StepName::Where,
            Step::Not(_) => StepName::Not,
            Step::And(_) => StepName::And,
            Step::Or(_) => StepName::Or,
            Step::SimplePath => StepName::SimplePath,
            Step::CyclicPath => StepName::CyclicPath,
            Step::Dedup => StepName::Dedup,
            Step::Range { .. } | Step::Limit(_) | Step::Skip(_) => StepName::Range,
            Step::Values(_) => StepName::Values,
            Step::Properties(_) => StepName::Properties,
            Step::ValueMap(_) => StepName::ValueMap,
            Step::Id => StepName::Id,
            Step::Label => StepName::Label,
            Step::Key => StepName::Key,
            Step::Value => StepName::Value,
            Step::Constant(_) => StepName::Constant,
            Step::As(_) => StepName::As,
            Step::Select { .. } => StepName::Select,
            Step::Project { .. } => StepName::Project,
            Step::Count => StepName::Count,
            Step::Fold => StepName::Fold,
            Step::Unfold => StepName::Unfold,
            Step::Max => StepName::Max,
            Step::Min => StepName::Min,
            Step::Sum => StepName::Sum,
            Step::Mean => StepName::Mean,
            Step::Group { .. } => StepName::Group,
            Step::GroupCount { .. } => StepName::GroupCount,
            Step::Order(_) => StepName::Order,
            Step::Path(_) => StepName::Path,
            Step::Tree => StepName::Tree,
            Step::Map(_) => StepName::Map,
            Step::FlatMap(_) => StepName::FlatMap,
            Step::Local(_) => StepName::Local,
            Step::Union(_) => StepName::Union,
            Step::Coalesce(_) => StepName::Coalesce,
            Step::Optional(_) => StepName::Optional,
            Step::Choose(_) => StepName::Choose,
            Step::Repeat(_) => StepName::Repeat,
            Step::Aggregate(_) => StepName::Aggregate,
            Step::Store(_) => StepName::Store,
            Step::SideEffect(_) => StepName::SideEffect,
            Step::Subgraph(_) => StepName::Subgraph,
            Step::Cap(_) => StepName::Cap,
            Step::Inject(_) => StepName::Inject,
            Step::AddV(_) => StepName::AddV,
            Step::AddE { .. } => StepName::AddE,
            Step::Property { .. } => StepName::Property,
            Step::Drop => StepName::Drop,
            Step::Barrier => StepName::Barrier,
            Step::TimeLimit(_) => StepName::TimeLimit,
        }
    }
}

/// Steps legal on every type: they only rearrange, filter or wrap rows.
const UNIVERSAL_STEPS: &[StepName] = &[
    StepName::V,
    StepName::E,
    StepName::Is,
    StepName::Where,
    StepName::Not,
    StepName::And,
    StepName::Or,
    StepName::SimplePath,
    StepName::CyclicPath,
    StepName::Dedup,
    StepName::Range,
    StepName::Constant,
    StepName::As,
    StepName::Select,
    StepName::Project,
    StepName::Count,
    StepName::Fold,
    StepName::Unfold,
    StepName::Max,
    StepName::Min,
    StepName::Sum,
    StepName::Mean,
    StepName::Group,
    StepName::GroupCount,
    StepName::Order,
    StepName::Path,
    StepName::Tree,
    StepName::Map,
    StepName::FlatMap,
    StepName::Local,
    StepName::Union,
    StepName::Coalesce,
    StepName::Optional,
    StepName::Choose,
    StepName::Repeat,
    StepName::Aggregate,
    StepName::Store,
    StepName::SideEffect,
    StepName::Cap,
    StepName::Inject,
    StepName::AddV,
    StepName::Barrier,
    StepName::TimeLimit,
];

/// Steps of any graph element.
const ELEMENT_STEPS: &[StepName] = &[
    StepName::Has,
    StepName::HasLabel,
    StepName::HasId,
    StepName::HasKey,
    StepName::HasNot,
    StepName::Values,
    StepName::Properties,
    StepName::ValueMap,
    StepName::Id,
    StepName::Label,
    StepName::Property,
    StepName::Drop,
];

const VERTEX_STEPS: &[StepName] = &[
    StepName::Out,
    StepName::In,
    StepName::Both,
    StepName::OutE,
    StepName::InE,
    StepName::BothE,
    StepName::AddE,
];

const EDGE_STEPS: &[StepName] = &[
    StepName::OutV,
    StepName::InV,
    StepName::OtherV,
    StepName::BothV,
    StepName::Subgraph,
];

/// Type-erased steps that stay legal after a construct degrades to Mixed.
const TYPE_ERASED_STEPS: &[StepName] = &[StepName::Values, StepName::Properties, StepName::Has];

const VERTEX_PROPERTY_STEPS: &[StepName] = &[
    StepName::Values,
    StepName::Properties,
    StepName::Key,
    StepName::Value,
    StepName::Id,
    StepName::Label,
    StepName::Has,
    StepName::HasKey,
    StepName::HasNot,
    StepName::Property,
    StepName::Drop,
];

const PROPERTY_STEPS: &[StepName] = &[StepName::Key, StepName::Value, StepName::Drop];

const MAP_ENTRY_STEPS: &[StepName] = &[StepName::Key, StepName::Value];

lazy_static! {
    static ref CAPABILITIES: HashMap<VariableType, HashSet<StepName>> = {
        let mut m = HashMap::new();
        let with = |extra: &[&[StepName]]| -> HashSet<StepName> {
            let mut set: HashSet<StepName> = UNIVERSAL_STEPS.iter().copied().collect();
            for group in extra {
                set.extend(group.iter().copied());
            }
            set
        };

        m.insert(VariableType::Vertex, with(&[ELEMENT_STEPS, VERTEX_STEPS]));
        m.insert(VariableType::Edge, with(&[ELEMENT_STEPS, EDGE_STEPS]));
        m.insert(VariableType::VertexAndEdge, with(&[ELEMENT_STEPS]));
        m.insert(VariableType::VertexProperty, with(&[VERTEX_PROPERTY_STEPS]));
        m.insert(VariableType::Property, with(&[PROPERTY_STEPS]));
        m.insert(VariableType::MapEntry, with(&[MAP_ENTRY_STEPS]));
        m.insert(VariableType::Mixed, with(&[TYPE_ERASED_STEPS]));
        m.insert(VariableType::Unknown, with(&[TYPE_ERASED_STEPS]));
        for t in [
            VariableType::Scalar,
            VariableType::Map,
            VariableType::List,
            VariableType::Path,
            VariableType::Tree,
            VariableType::Subgraph,
            VariableType::Null,
        ] {
            m.insert(t, with(&[]));
        }
        m
    };
}

/// Whether `step` may be applied to a variable of type `var_type`.
pub fn supports(var_type: VariableType, step: StepName) -> bool {
    CAPABILITIES
        .get(&var_type)
        .map(|set| set.contains(&step))
        .unwrap_or(false)
}
