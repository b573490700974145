//! Step descriptors fed to the translator.
//!
//! A [`Traversal`] is the ordered sequence of [`Step`]s produced by the
//! (external) Gremlin parser. Steps that take a sub-traversal (`union`,
//! `repeat`, `where`, `by` modulators, ...) carry nested [`Traversal`]s.
//!
//! The types derive serde so the CLI can read a parser's JSON output directly:
//!
//! ```text
//! {"steps": [{"V": []}, {"out": ["knows"]}, {"values": ["name"]}]}
//! ```
//!
//! Tests and embedders usually build traversals with the fluent builder:
//!
//! ```
//! use gremlin_translator::gremlin_ast::Traversal;
//!
//! let t = Traversal::new().v().out(&["knows"]).values(&["name"]);
//! assert_eq!(t.steps.len(), 3);
//! ```

pub mod predicate;

pub use predicate::{Predicate, PredicateOp, Value};

use serde::{Deserialize, Serialize};

/// Which of several bindings of one label `select` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Pop {
    First,
    #[default]
    Last,
    All,
}

/// A `by()` modulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum By {
    /// `by()` - the element itself
    Identity,
    /// `by('name')` - a property key
    Key(String),
    /// `by(__.out().count())` - a sub-traversal
    Traversal(Traversal),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub by: By,
    #[serde(default)]
    pub descending: bool,
}

/// Argument of `has(...)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HasStep {
    /// `has(label, key, ...)` form
    #[serde(default)]
    pub label: Option<String>,
    pub key: String,
    /// `None` means `has(key)` (property existence)
    #[serde(default)]
    pub predicate: Option<Predicate>,
}

/// Endpoint argument of `addE(...).from(...)` / `.to(...)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EdgeEndpoint {
    Label(String),
    Traversal(Traversal),
}

/// `emit()` modulator of `repeat`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EmitCondition {
    /// `emit()` with no argument: every iteration is emitted
    Always,
    Traversal(Traversal),
}

/// `repeat(body)` with its `until`/`emit`/`times` modulators folded in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepeatStep {
    pub body: Traversal,
    #[serde(default)]
    pub until: Option<Traversal>,
    #[serde(default)]
    pub emit: Option<EmitCondition>,
    #[serde(default)]
    pub times: Option<u32>,
    /// `until(...)` written before `repeat(...)`: checked before the body runs
    #[serde(default)]
    pub until_first: bool,
    /// `emit(...)` written before `repeat(...)`: the entering row is emittable
    #[serde(default)]
    pub emit_first: bool,
}

impl RepeatStep {
    pub fn new(body: Traversal) -> Self {
        Self {
            body,
            until: None,
            emit: None,
            times: None,
            until_first: false,
            emit_first: false,
        }
    }

    pub fn until(mut self, condition: Traversal) -> Self {
        self.until = Some(condition);
        self
    }

    pub fn until_first(mut self, condition: Traversal) -> Self {
        self.until = Some(condition);
        self.until_first = true;
        self
    }

    pub fn emit(mut self) -> Self {
        self.emit = Some(EmitCondition::Always);
        self
    }

    pub fn emit_when(mut self, condition: Traversal) -> Self {
        self.emit = Some(EmitCondition::Traversal(condition));
        self
    }

    pub fn times(mut self, times: u32) -> Self {
        self.times = Some(times);
        self
    }
}

/// `choose(...)` in either of its two forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChooseStep {
    /// `choose(predicate, trueChoice, falseChoice)`
    Predicate {
        predicate: Traversal,
        true_branch: Traversal,
        false_branch: Traversal,
    },
    /// `choose(selector).option(k1, t1).option(k2, t2)...`
    Options {
        selector: Traversal,
        options: Vec<(Value, Traversal)>,
        #[serde(default)]
        default: Option<Traversal>,
    },
}

/// One step of a traversal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Step {
    #[serde(rename = "V")]
    V(Vec<Value>),
    #[serde(rename = "E")]
    E(Vec<Value>),
    Out(Vec<String>),
    In(Vec<String>),
    Both(Vec<String>),
    #[serde(rename = "outE")]
    OutE(Vec<String>),
    #[serde(rename = "inE")]
    InE(Vec<String>),
    #[serde(rename = "bothE")]
    BothE(Vec<String>),
    #[serde(rename = "outV")]
    OutV,
    #[serde(rename = "inV")]
    InV,
    #[serde(rename = "otherV")]
    OtherV,
    #[serde(rename = "bothV")]
    BothV,
    Has(HasStep),
    HasLabel(Vec<String>),
    HasId(Vec<Value>),
    HasKey(Vec<String>),
    HasNot(String),
    Is(Predicate),
    Where(Traversal),
    WhereLabel {
        #[serde(default)]
        start: Option<String>,
        predicate: Predicate,
    },
    Not(Traversal),
    And(Vec<Traversal>),
    Or(Vec<Traversal>),
    SimplePath,
    CyclicPath,
    Dedup,
    Range { low: i64, high: i64 },
    Limit(i64),
    Skip(i64),
    Values(Vec<String>),
    Properties(Vec<String>),
    ValueMap(Vec<String>),
    Id,
    Label,
    Key,
    Value,
    Constant(Value),
    As(Vec<String>),
    Select {
        #[serde(default)]
        pop: Pop,
        labels: Vec<String>,
        #[serde(default)]
        by: Vec<By>,
    },
    Project {
        keys: Vec<String>,
        #[serde(default)]
        by: Vec<By>,
    },
    Count,
    Fold,
    Unfold,
    Max,
    Min,
    Sum,
    Mean,
    Group {
        #[serde(default)]
        by: Vec<By>,
    },
    GroupCount {
        #[serde(default)]
        by: Option<By>,
    },
    Order(Vec<OrderBy>),
    Path(Vec<By>),
    Tree,
    Map(Traversal),
    FlatMap(Traversal),
    Local(Traversal),
    Union(Vec<Traversal>),
    Coalesce(Vec<Traversal>),
    Optional(Traversal),
    Choose(ChooseStep),
    Repeat(RepeatStep),
    Aggregate(String),
    Store(String),
    SideEffect(Traversal),
    Subgraph(String),
    Cap(String),
    Inject(Vec<Value>),
    AddV(Option<String>),
    AddE {
        label: String,
        #[serde(default)]
        from: Option<EdgeEndpoint>,
        #[serde(default)]
        to: Option<EdgeEndpoint>,
    },
    Property {
        key: String,
        value: Value,
    },
    Drop,
    Barrier,
    TimeLimit(u64),
}

/// An ordered step sequence, either a whole query or a nested sub-traversal.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Traversal {
    pub steps: Vec<Step>,
}

fn labels(labels: &[&str]) -> Vec<String> {
    labels.iter().map(|s| s.to_string()).collect()
}

impl Traversal {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn from_steps(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    pub fn push(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn v(self) -> Self {
        self.push(Step::V(Vec::new()))
    }

    pub fn v_ids<V: Into<Value>>(self, ids: impl IntoIterator<Item = V>) -> Self {
        self.push(Step::V(ids.into_iter().map(Into::into).collect()))
    }

    pub fn e(self) -> Self {
        self.push(Step::E(Vec::new()))
    }

    pub fn out(self, edge_labels: &[&str]) -> Self {
        self.push(Step::Out(labels(edge_labels)))
    }

    pub fn in_(self, edge_labels: &[&str]) -> Self {
        self.push(Step::In(labels(edge_labels)))
    }

    pub fn both(self, edge_labels: &[&str]) -> Self {
        self.push(Step::Both(labels(edge_labels)))
    }

    pub fn out_e(self, edge_labels: &[&str]) -> Self {
        self.push(Step::OutE(labels(edge_labels)))
    }

    pub fn in_e(self, edge_labels: &[&str]) -> Self {
        self.push(Step::InE(labels(edge_labels)))
    }

    pub fn out_v(self) -> Self {
        self.push(Step::OutV)
    }

    pub fn in_v(self) -> Self {
        self.push(Step::InV)
    }

    pub fn other_v(self) -> Self {
        self.push(Step::OtherV)
    }

    pub fn has(self, key: &str, value: impl Into<Value>) -> Self {
        self.push(Step::Has(HasStep {
            label: None,
            key: key.to_string(),
            predicate: Some(Predicate::eq(value)),
        }))
    }

    pub fn has_predicate(self, key: &str, predicate: Predicate) -> Self {
        self.push(Step::Has(HasStep {
            label: None,
            key: key.to_string(),
            predicate: Some(predicate),
        }))
    }

    pub fn has_key_present(self, key: &str) -> Self {
        self.push(Step::Has(HasStep {
            label: None,
            key: key.to_string(),
            predicate: None,
        }))
    }

    pub fn has_label(self, vertex_labels: &[&str]) -> Self {
        self.push(Step::HasLabel(labels(vertex_labels)))
    }

    pub fn is(self, predicate: Predicate) -> Self {
        self.push(Step::Is(predicate))
    }

    pub fn where_(self, condition: Traversal) -> Self {
        self.push(Step::Where(condition))
    }

    pub fn not(self, condition: Traversal) -> Self {
        self.push(Step::Not(condition))
    }

    pub fn values(self, keys: &[&str]) -> Self {
        self.push(Step::Values(labels(keys)))
    }

    pub fn properties(self, keys: &[&str]) -> Self {
        self.push(Step::Properties(labels(keys)))
    }

    pub fn id(self) -> Self {
        self.push(Step::Id)
    }

    pub fn label(self) -> Self {
        self.push(Step::Label)
    }

    pub fn constant(self, value: impl Into<Value>) -> Self {
        self.push(Step::Constant(value.into()))
    }

    pub fn as_(self, label: &str) -> Self {
        self.push(Step::As(vec![label.to_string()]))
    }

    pub fn select(self, select_labels: &[&str]) -> Self {
        self.push(Step::Select {
            pop: Pop::Last,
            labels: labels(select_labels),
            by: Vec::new(),
        })
    }

    pub fn select_pop(self, pop: Pop, label: &str) -> Self {
        self.push(Step::Select {
            pop,
            labels: vec![label.to_string()],
            by: Vec::new(),
        })
    }

    pub fn select_by(self, select_labels: &[&str], by: Vec<By>) -> Self {
        self.push(Step::Select {
            pop: Pop::Last,
            labels: labels(select_labels),
            by,
        })
    }

    pub fn project(self, keys: &[&str], by: Vec<By>) -> Self {
        self.push(Step::Project {
            keys: labels(keys),
            by,
        })
    }

    pub fn count(self) -> Self {
        self.push(Step::Count)
    }

    pub fn fold(self) -> Self {
        self.push(Step::Fold)
    }

    pub fn unfold(self) -> Self {
        self.push(Step::Unfold)
    }

    pub fn path(self) -> Self {
        self.push(Step::Path(Vec::new()))
    }

    pub fn dedup(self) -> Self {
        self.push(Step::Dedup)
    }

    pub fn limit(self, n: i64) -> Self {
        self.push(Step::Limit(n))
    }

    pub fn order_by(self, key: &str, descending: bool) -> Self {
        self.push(Step::Order(vec![OrderBy {
            by: By::Key(key.to_string()),
            descending,
        }]))
    }

    pub fn local(self, body: Traversal) -> Self {
        self.push(Step::Local(body))
    }

    pub fn map(self, body: Traversal) -> Self {
        self.push(Step::Map(body))
    }

    pub fn flat_map(self, body: Traversal) -> Self {
        self.push(Step::FlatMap(body))
    }

    pub fn union(self, branches: Vec<Traversal>) -> Self {
        self.push(Step::Union(branches))
    }

    pub fn coalesce(self, branches: Vec<Traversal>) -> Self {
        self.push(Step::Coalesce(branches))
    }

    pub fn optional(self, body: Traversal) -> Self {
        self.push(Step::Optional(body))
    }

    pub fn choose(self, predicate: Traversal, true_branch: Traversal, false_branch: Traversal) -> Self {
        self.push(Step::Choose(ChooseStep::Predicate {
            predicate,
            true_branch,
            false_branch,
        }))
    }

    pub fn repeat(self, repeat: RepeatStep) -> Self {
        self.push(Step::Repeat(repeat))
    }

    pub fn aggregate(self, key: &str) -> Self {
        self.push(Step::Aggregate(key.to_string()))
    }

    pub fn store(self, key: &str) -> Self {
        self.push(Step::Store(key.to_string()))
    }

    pub fn side_effect(self, body: Traversal) -> Self {
        self.push(Step::SideEffect(body))
    }

    pub fn group_count(self, by: Option<By>) -> Self {
        self.push(Step::GroupCount { by })
    }

    pub fn add_v(self, label: &str) -> Self {
        self.push(Step::AddV(Some(label.to_string())))
    }

    pub fn property(self, key: &str, value: impl Into<Value>) -> Self {
        self.push(Step::Property {
            key: key.to_string(),
            value: value.into(),
        })
    }

    pub fn drop_(self) -> Self {
        self.push(Step::Drop)
    }
}
