//! Step compilation protocol.
//!
//! Every step goes through [`TraversalCompiler::compile_step`]: the pivot's
//! type is checked against the capability registry, then the step is handed
//! to the function of its family:
//!
//! | Module | Steps |
//! |---|---|
//! | `expansion` | `V`, `E`, `out`/`in`/`both`, `outE`/`inE`/`bothE`, `outV`/`inV`/`otherV`/`bothV` |
//! | `filter` | `has*`, `is`, `where`, `not`, `and`, `or`, `simplePath`, `cyclicPath`, `dedup`, `range` |
//! | `projection` | `values`, `properties`, `valueMap`, `id`, `label`, `key`, `value`, `constant`, `project`, `path`, `unfold` |
//! | `aggregation` | `count`, `fold`, `max`/`min`/`sum`/`mean`, `group`, `groupCount`, `order`, `tree` |
//! | `side_effect` | `aggregate`, `store`, `sideEffect`, `subgraph`, `cap` |
//! | `mutation` | `inject`, `addV`, `addE`, `property`, `drop` |
//!
//! Label steps (`as`, `select`) live in the label resolver, branching steps
//! in the branch unifier and `repeat` in the loop compiler.

pub mod aggregation;
pub mod expansion;
pub mod filter;
pub mod mutation;
pub mod predicate;
pub mod projection;
pub mod side_effect;

use log::debug;

use super::{
    errors::TranslationError,
    plan_ctx::CtxId,
    types::{supports, StepName},
    variable::{Direction, EdgeEnd},
    TranslationResult, TraversalCompiler,
};
use crate::{
    gremlin_ast::{Pop, Step},
    query_planner::variable::Construct,
};

impl TraversalCompiler {
    pub(crate) fn compile_step(&mut self, ctx: CtxId, step: &Step) -> TranslationResult<()> {
        let name = step.name();
        self.check_applicable(ctx, name)?;
        debug!("compiling `{}` in {}", name, ctx);

        match step {
            Step::V(ids) => self.vertex_scan(ctx, ids),
            Step::E(ids) => self.edge_scan(ctx, ids),
            Step::Out(labels) => self.adjacent_vertices(ctx, Direction::Out, labels),
            Step::In(labels) => self.adjacent_vertices(ctx, Direction::In, labels),
            Step::Both(labels) => self.adjacent_vertices(ctx, Direction::Both, labels),
            Step::OutE(labels) => self.incident_edges(ctx, Direction::Out, labels),
            Step::InE(labels) => self.incident_edges(ctx, Direction::In, labels),
            Step::BothE(labels) => self.incident_edges(ctx, Direction::Both, labels),
            Step::OutV => self.edge_vertex(ctx, EdgeEnd::Source),
            Step::InV => self.edge_vertex(ctx, EdgeEnd::Sink),
            Step::OtherV => self.edge_vertex(ctx, EdgeEnd::Other),
            Step::BothV => self.edge_vertex(ctx, EdgeEnd::Both),

            Step::Has(has) => self.has(ctx, has),
            Step::HasLabel(labels) => self.has_label(ctx, labels),
            Step::HasId(ids) => self.has_id(ctx, ids),
            Step::HasKey(keys) => self.has_key(ctx, keys),
            Step::HasNot(key) => self.has_not(ctx, key),
            Step::Is(predicate) => self.is(ctx, predicate),
            Step::Where(condition) => self.where_traversal(ctx, condition),
            Step::WhereLabel { start, predicate } => {
                self.where_label(ctx, start.as_deref(), predicate)
            }
            Step::Not(condition) => self.not(ctx, condition),
            Step::And(conditions) => self.and_or(ctx, conditions, true),
            Step::Or(conditions) => self.and_or(ctx, conditions, false),
            Step::SimplePath => self.path_filter(ctx, true),
            Step::CyclicPath => self.path_filter(ctx, false),
            Step::Dedup => self.wrap_scope(ctx, Construct::Dedup),
            Step::Range { low, high } => self.range(ctx, *low, *high),
            Step::Limit(n) => self.range(ctx, 0, *n),
            Step::Skip(n) => self.range(ctx, *n, -1),

            Step::Values(keys) => self.values(ctx, keys),
            Step::Properties(keys) => self.properties(ctx, keys),
            Step::ValueMap(keys) => self.value_map(ctx, keys),
            Step::Id => self.id(ctx),
            Step::Label => self.label(ctx),
            Step::Key => self.key(ctx),
            Step::Value => self.value(ctx),
            Step::Constant(value) => self.constant(ctx, value),
            Step::Project { keys, by } => self.project(ctx, keys, by),
            Step::Path(by) => self.path(ctx, by),
            Step::Unfold => self.unfold(ctx),

            Step::As(labels) => self.bind_labels(ctx, labels),
            Step::Select { pop, labels, by } => self.select(ctx, *pop, labels, by),

            Step::Count => self.aggregate_scope(ctx, Construct::Count),
            Step::Fold => self.aggregate_scope(ctx, Construct::Fold),
            Step::Max => self.aggregate_scope(ctx, Construct::Max),
            Step::Min => self.aggregate_scope(ctx, Construct::Min),
            Step::Sum => self.aggregate_scope(ctx, Construct::Sum),
            Step::Mean => self.aggregate_scope(ctx, Construct::Mean),
            Step::Tree => self.aggregate_scope(ctx, Construct::Tree),
            Step::Group { by } => self.group(ctx, by),
            Step::GroupCount { by } => self.group_count(ctx, by.as_ref()),
            Step::Order(keys) => self.order(ctx, keys),

            Step::Map(body) => self.single_branch(ctx, Construct::Map, body),
            Step::FlatMap(body) => self.single_branch(ctx, Construct::FlatMap, body),
            Step::Local(body) => self.single_branch(ctx, Construct::Local, body),
            Step::Union(branches) => self.union(ctx, branches),
            Step::Coalesce(branches) => self.coalesce(ctx, branches),
            Step::Optional(body) => self.optional(ctx, body),
            Step::Choose(choose) => self.choose(ctx, choose),
            Step::Repeat(repeat) => self.repeat(ctx, repeat),

            Step::Aggregate(key) => {
                self.collect_side_effect(ctx, Construct::Aggregate { key: key.clone() }, key)
            }
            Step::Store(key) => {
                self.collect_side_effect(ctx, Construct::Store { key: key.clone() }, key)
            }
            Step::Subgraph(key) => {
                self.collect_side_effect(ctx, Construct::Subgraph { key: key.clone() }, key)
            }
            Step::SideEffect(body) => self.side_effect(ctx, body),
            Step::Cap(key) => self.select(ctx, Pop::Last, std::slice::from_ref(key), &[]),

            Step::Inject(values) => self.inject(ctx, values),
            Step::AddV(label) => self.add_vertex(ctx, label.as_deref()),
            Step::AddE { label, from, to } => {
                self.add_edge(ctx, label, from.as_ref(), to.as_ref())
            }
            Step::Property { key, value } => self.write_property(ctx, key, value),
            Step::Drop => self.drop_element(ctx),

            Step::Barrier => Ok(()),
            Step::TimeLimit(_) => Err(TranslationError::UnsupportedConstruct(
                "timeLimit".to_string(),
            )),
        }
    }

    /// Reject a step the pivot's type does not support.
    fn check_applicable(&self, ctx: CtxId, step: StepName) -> TranslationResult<()> {
        match self.arena.pivot(ctx)? {
            None if step.is_source() || matches!(step, StepName::Barrier | StepName::TimeLimit) => {
                Ok(())
            }
            None => Err(TranslationError::MissingPivot { step }),
            Some(pivot) => {
                let var_type = self.var_type(pivot)?;
                if supports(var_type, step) {
                    Ok(())
                } else {
                    Err(TranslationError::InvalidStep { step, var_type })
                }
            }
        }
    }
}
