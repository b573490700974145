//! Source scans and adjacency steps.
//!
//! A vertex created by `V()` (or at the far end of a match path) is *free*:
//! its relation has not been tied to anything yet, so `out()`/`in()` from it
//! extend a MATCH pattern instead of cross-applying expansion functions.
//! Consuming a free vertex as a path endpoint binds it; later predicates on
//! it are wrapped rather than conjoined.

use log::debug;

use crate::{
    gremlin_ast::{PredicateOp, Value},
    query_planner::{
        plan_ctx::{CtxId, MatchPath},
        steps::predicate::lower_operands,
        types::{StepName, VariableType},
        variable::{Direction, EdgeEnd, EdgeSource, VarId, VariableKind, VertexSource},
        TranslationResult, TraversalCompiler,
    },
    render_plan::render_expr::{conjoin, BooleanExpr, Literal, ScalarExpr},
};

impl TraversalCompiler {
    pub(crate) fn vertex_scan(&mut self, ctx: CtxId, ids: &[Value]) -> TranslationResult<()> {
        let vertex = self.new_source(
            ctx,
            VariableType::Vertex,
            VariableKind::Vertex(VertexSource::Scan),
        )?;
        self.set_pivot(ctx, vertex)?;
        self.restrict_ids(ctx, vertex, ids)
    }

    pub(crate) fn edge_scan(&mut self, ctx: CtxId, ids: &[Value]) -> TranslationResult<()> {
        let edge = self.new_source(ctx, VariableType::Edge, VariableKind::Edge(EdgeSource::Scan))?;
        self.set_pivot(ctx, edge)?;
        self.restrict_ids(ctx, edge, ids)
    }

    fn restrict_ids(&mut self, ctx: CtxId, var: VarId, ids: &[Value]) -> TranslationResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let column = self.builder().expr(var, None)?;
        let operands = ids.iter().map(|id| ScalarExpr::Literal(Literal::from(id))).collect();
        let predicate = lower_operands(PredicateOp::Within, column, operands)?;
        self.conjoin_scope(ctx, predicate)
    }

    /// Conjoin onto the scope regardless of the pivot, for predicates on
    /// variables the current step just created.
    pub(crate) fn conjoin_scope(&mut self, ctx: CtxId, predicate: BooleanExpr) -> TranslationResult<()> {
        let scope = self.arena.ctx_mut(ctx)?;
        scope.predicate = Some(conjoin(scope.predicate.take(), predicate));
        Ok(())
    }

    fn edge_label_filter(&mut self, ctx: CtxId, edge: VarId, labels: &[String]) -> TranslationResult<()> {
        if labels.is_empty() {
            return Ok(());
        }
        let column = self.builder().expr(edge, Some("label"))?;
        let operands = labels
            .iter()
            .map(|l| ScalarExpr::Literal(Literal::String(l.clone())))
            .collect();
        let predicate = lower_operands(PredicateOp::Within, column, operands)?;
        self.conjoin_scope(ctx, predicate)
    }

    /// Whether an expansion from `origin` may extend a MATCH pattern.
    fn extends_match(&self, ctx: CtxId, origin: VarId, direction: Direction) -> TranslationResult<bool> {
        Ok(self.config.enable_match_paths
            && direction != Direction::Both
            && self.arena.var(origin)?.is_free_element(ctx))
    }

    pub(crate) fn adjacent_vertices(
        &mut self,
        ctx: CtxId,
        direction: Direction,
        labels: &[String],
    ) -> TranslationResult<()> {
        let step = match direction {
            Direction::Out => StepName::Out,
            Direction::In => StepName::In,
            Direction::Both => StepName::Both,
        };
        let origin = self.require_pivot(ctx, step)?;

        if self.extends_match(ctx, origin, direction)? {
            let edge = self.new_source(
                ctx,
                VariableType::Edge,
                VariableKind::Edge(EdgeSource::MatchEdge {
                    origin: Some(origin),
                }),
            )?;
            self.edge_label_filter(ctx, edge, labels)?;
            let vertex = self.new_source(
                ctx,
                VariableType::Vertex,
                VariableKind::Vertex(VertexSource::MatchEndpoint),
            )?;
            let path = match direction {
                Direction::In => MatchPath {
                    source: Some(vertex),
                    edge,
                    sink: Some(origin),
                },
                _ => MatchPath {
                    source: Some(origin),
                    edge,
                    sink: Some(vertex),
                },
            };
            debug!("{} extends match path through {}", step, edge);
            self.arena.ctx_mut(ctx)?.match_paths.push(path);
            self.mark_needs_filter(origin)?;
            return self.set_pivot(ctx, vertex);
        }

        let edge = self.new_source(
            ctx,
            VariableType::Edge,
            VariableKind::Edge(EdgeSource::FromVertex {
                vertex: origin,
                direction,
            }),
        )?;
        self.edge_label_filter(ctx, edge, labels)?;
        let end = match direction {
            Direction::Out => EdgeEnd::Sink,
            Direction::In => EdgeEnd::Source,
            Direction::Both => EdgeEnd::Other,
        };
        let vertex = self.new_source(
            ctx,
            VariableType::Vertex,
            VariableKind::Vertex(VertexSource::FromEdge {
                edge,
                end,
                origin: Some(origin),
            }),
        )?;
        self.set_pivot(ctx, vertex)
    }

    pub(crate) fn incident_edges(
        &mut self,
        ctx: CtxId,
        direction: Direction,
        labels: &[String],
    ) -> TranslationResult<()> {
        let step = match direction {
            Direction::Out => StepName::OutE,
            Direction::In => StepName::InE,
            Direction::Both => StepName::BothE,
        };
        let origin = self.require_pivot(ctx, step)?;

        let edge = if self.extends_match(ctx, origin, direction)? {
            let edge = self.new_source(
                ctx,
                VariableType::Edge,
                VariableKind::Edge(EdgeSource::MatchEdge {
                    origin: Some(origin),
                }),
            )?;
            let path = match direction {
                Direction::In => MatchPath {
                    source: None,
                    edge,
                    sink: Some(origin),
                },
                _ => MatchPath {
                    source: Some(origin),
                    edge,
                    sink: None,
                },
            };
            self.arena.ctx_mut(ctx)?.match_paths.push(path);
            self.mark_needs_filter(origin)?;
            edge
        } else {
            self.new_source(
                ctx,
                VariableType::Edge,
                VariableKind::Edge(EdgeSource::FromVertex {
                    vertex: origin,
                    direction,
                }),
            )?
        };
        self.edge_label_filter(ctx, edge, labels)?;
        self.set_pivot(ctx, edge)
    }

    /// `outV`/`inV`/`otherV`/`bothV`.
    ///
    /// On an edge of a pending match path whose requested end is still open,
    /// the new vertex closes the path; otherwise it is reached through an
    /// edge-to-vertex function.
    pub(crate) fn edge_vertex(&mut self, ctx: CtxId, end: EdgeEnd) -> TranslationResult<()> {
        let step = match end {
            EdgeEnd::Source => StepName::OutV,
            EdgeEnd::Sink => StepName::InV,
            EdgeEnd::Other => StepName::OtherV,
            EdgeEnd::Both => StepName::BothV,
        };
        let edge = self.require_pivot(ctx, step)?;

        if end != EdgeEnd::Both && self.arena.var(edge)?.owner == ctx {
            if let Some(path) = self.arena.ctx(ctx)?.match_path_of_edge(edge).cloned() {
                let open = match end {
                    EdgeEnd::Source => path.source.is_none(),
                    EdgeEnd::Sink => path.sink.is_none(),
                    _ => path.source.is_none() != path.sink.is_none(),
                };
                if open {
                    let vertex = self.new_source(
                        ctx,
                        VariableType::Vertex,
                        VariableKind::Vertex(VertexSource::MatchEndpoint),
                    )?;
                    if let Some(path) = self.arena.ctx_mut(ctx)?.match_path_of_edge_mut(edge) {
                        if path.source.is_none() {
                            path.source = Some(vertex);
                        } else {
                            path.sink = Some(vertex);
                        }
                    }
                    return self.set_pivot(ctx, vertex);
                }
            }
        }

        let origin = match &self.arena.var(self.arena.real_of(edge)?)?.kind {
            VariableKind::Edge(EdgeSource::FromVertex { vertex, .. }) => Some(*vertex),
            VariableKind::Edge(EdgeSource::MatchEdge { origin }) => *origin,
            _ => None,
        };
        let vertex = self.new_source(
            ctx,
            VariableType::Vertex,
            VariableKind::Vertex(VertexSource::FromEdge {
                edge,
                end,
                origin: if end == EdgeEnd::Other { origin } else { None },
            }),
        )?;
        self.set_pivot(ctx, vertex)
    }
}
