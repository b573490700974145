//! Context → query block emission.
//!
//! [`PlanBuilder`] reads a finished (or, for boolean sub-scopes, locally
//! finished) translation context out of the arena and produces one
//! [`QueryBlock`]:
//!
//! ```text
//! select  pivot default column, populated properties, path column
//! from    one entry per table reference, in creation order
//! match   pending match paths
//! where   the scope's accumulated predicate
//! ```
//!
//! Constructs owning sub-contexts (union, coalesce, repeat, ...) emit their
//! sub-contexts recursively as nested blocks inside a table-valued call.
//! All branches of one construct are emitted against a single column
//! [`LayoutColumn`] list so they line up under UNION ALL.

use log::trace;

use super::{
    errors::RenderBuildError,
    render_expr::{BooleanExpr, ColumnRef, FunctionCall, Literal, ScalarExpr},
    rewriter::ColumnSubstitution,
    FromItem, FunctionParam, MatchClause, MatchPathFragment, NamedSource, QueryBlock, QueryExpr,
    SelectItem, TableValuedFunction,
};
use crate::{
    config::CompilerConfig,
    gremlin_ast::Pop,
    query_planner::{
        plan_ctx::{CompilationArena, CtxId},
        variable::{
            ChooseForm, Composite, Construct, EdgeEnd, EdgeSource, PulledColumn, RepeatLoop,
            SelectEntry, SelectValue, VarId, Variable, VariableKind, VertexSource,
        },
    },
    utils::naming::synthetic_property_column,
};

pub type BuildResult<T> = Result<T, RenderBuildError>;

/// One output column of a construct, shared by all of its branches.
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutColumn {
    Default,
    Property(String),
    Ghost {
        ghost: VarId,
        property: Option<String>,
    },
    Pulled(PulledColumn),
    /// Hops taken inside the construct, for paths running through it.
    Path,
}

pub struct PlanBuilder<'a> {
    arena: &'a CompilationArena,
    config: &'a CompilerConfig,
}

impl<'a> PlanBuilder<'a> {
    pub fn new(arena: &'a CompilationArena, config: &'a CompilerConfig) -> Self {
        Self { arena, config }
    }

    /// Block for a top-level scope: the pivot and everything requested of it.
    pub fn build_query(&self, ctx: CtxId) -> BuildResult<QueryBlock> {
        let scope = self.arena.ctx(ctx)?;
        let pivot = scope.pivot.ok_or(RenderBuildError::MissingPivot(ctx.0))?;
        let mut select = self.output_columns(pivot)?;
        if scope.path_tracking {
            if let Some(path) = scope.path_variable {
                select.push(SelectItem::new(
                    self.expr(path, None)?,
                    self.config.path_column.clone(),
                ));
            }
        }
        self.build_block(ctx, select)
    }

    /// Block selecting only the pivot's value.
    pub fn value_block(&self, ctx: CtxId) -> BuildResult<QueryBlock> {
        let pivot = self
            .arena
            .ctx(ctx)?
            .pivot
            .ok_or(RenderBuildError::MissingPivot(ctx.0))?;
        let select = vec![SelectItem::new(
            self.expr(pivot, None)?,
            self.config.default_column.clone(),
        )];
        self.build_block(ctx, select)
    }

    /// A scope consumed only as a boolean test.
    ///
    /// Without table references the scope is just its predicate; otherwise it
    /// holds when its block yields a row.
    pub fn condition(&self, ctx: CtxId) -> BuildResult<BooleanExpr> {
        let scope = self.arena.ctx(ctx)?;
        if scope.table_refs.is_empty() && scope.match_paths.is_empty() {
            return Ok(scope
                .predicate
                .clone()
                .unwrap_or(BooleanExpr::Literal(true)));
        }
        Ok(BooleanExpr::Exists(Box::new(self.value_block(ctx)?)))
    }

    pub fn build_block(&self, ctx: CtxId, select: Vec<SelectItem>) -> BuildResult<QueryBlock> {
        let scope = self.arena.ctx(ctx)?;

        let mut from = Vec::with_capacity(scope.table_refs.len());
        for var in &scope.table_refs {
            from.push(self.from_item(*var)?);
        }

        let match_clause = if scope.match_paths.is_empty() {
            None
        } else {
            let mut paths = Vec::with_capacity(scope.match_paths.len());
            for path in &scope.match_paths {
                paths.push(MatchPathFragment {
                    source: path.source.map(|v| self.alias(v)).transpose()?,
                    edge: self.alias(path.edge)?,
                    sink: path.sink.map(|v| self.alias(v)).transpose()?,
                    min_hops: 1,
                    max_hops: 1,
                });
            }
            Some(MatchClause { paths })
        };

        Ok(QueryBlock {
            select,
            from,
            match_clause,
            where_clause: scope.predicate.clone(),
        })
    }

    fn alias(&self, var: VarId) -> BuildResult<String> {
        Ok(self.arena.var(var)?.alias.clone())
    }

    /// Select items for a variable emitted as the result of a scope.
    pub fn output_columns(&self, id: VarId) -> BuildResult<Vec<SelectItem>> {
        let var = self.arena.var(id)?;
        let mut items = vec![SelectItem::new(
            self.expr(id, None)?,
            self.config.default_column.clone(),
        )];

        if let VariableKind::Select { entries, pop } = &var.kind {
            if entries.len() > 1 && *pop != Pop::All {
                for entry in entries {
                    let column = self.entry_column(entry)?;
                    if items.iter().all(|item| item.alias != column) {
                        items.push(SelectItem::new(self.entry_expr(entry)?, column));
                    }
                }
            }
        }

        for property in &var.projected {
            let expr = self.expr(id, Some(property))?;
            if !expr.is_null_literal() && items.iter().all(|item| &item.alias != property) {
                items.push(SelectItem::new(expr, property.clone()));
            }
        }
        Ok(items)
    }

    fn entry_expr(&self, entry: &SelectEntry) -> BuildResult<ScalarExpr> {
        match &entry.value {
            SelectValue::Identity => self.expr(entry.var, None),
            SelectValue::Property(p) => self.expr(entry.var, Some(p)),
            SelectValue::Expr(e) => Ok(e.clone()),
        }
    }

    /// Distinct output name of one select entry, derived from its ghost.
    fn entry_column(&self, entry: &SelectEntry) -> BuildResult<String> {
        let property = match &entry.value {
            SelectValue::Property(p) => Some(p.as_str()),
            _ => None,
        };
        let mut current = entry.var;
        loop {
            match &self.arena.var(current)?.kind {
                VariableKind::Ghost(g) => {
                    return Ok(synthetic_property_column(&g.column, property))
                }
                VariableKind::ContextRef { real } => current = *real,
                _ => return Ok(synthetic_property_column(&entry.label, property)),
            }
        }
    }

    /// Scalar value of `property` of a variable, or of the variable itself.
    ///
    /// Values a variable cannot carry (a property of a scalar) are NULL, which
    /// is what lets a branch lacking a column still line up with its siblings.
    pub fn expr(&self, id: VarId, property: Option<&str>) -> BuildResult<ScalarExpr> {
        let var = self.arena.var(id)?;
        let column = |c: &str| ScalarExpr::column(var.alias.clone(), c);
        let value_only = |c: &str| match property {
            None => column(c),
            Some(_) => ScalarExpr::null(),
        };

        let expr = match &var.kind {
            VariableKind::Vertex(_)
            | VariableKind::Edge(_)
            | VariableKind::AddVertex { .. }
            | VariableKind::AddEdge { .. } => column(property.unwrap_or("id")),
            VariableKind::Properties { .. } | VariableKind::Unfold { .. } => {
                column(property.unwrap_or("value"))
            }
            VariableKind::Values { .. }
            | VariableKind::ValueMap { .. }
            | VariableKind::Inject { .. } => value_only("value"),
            VariableKind::Id { of } => match property {
                Some(_) => ScalarExpr::null(),
                None if self.arena.var(*of)?.var_type.is_element() => self.expr(*of, None)?,
                None => self.expr(*of, Some("id"))?,
            },
            VariableKind::Label { of } => self.intrinsic(*of, "label", property)?,
            VariableKind::Key { of } => self.intrinsic(*of, "key", property)?,
            VariableKind::Value { of } => self.intrinsic(*of, "value", property)?,
            VariableKind::Constant(literal) => match property {
                None => ScalarExpr::Literal(literal.clone()),
                Some(_) => ScalarExpr::null(),
            },
            VariableKind::Filter { input, .. } => self.expr(*input, property)?,
            VariableKind::PropertyWrite { target, .. } => self.expr(*target, property)?,
            VariableKind::ContextRef { real } => self.expr(*real, property)?,
            VariableKind::Ghost(g) => match g.capture() {
                None => self.expr(g.real, property)?,
                Some(capture) => ScalarExpr::column(
                    self.alias(capture)?,
                    synthetic_property_column(&g.column, property),
                ),
            },
            VariableKind::LoopInput { .. } => {
                column(property.unwrap_or(var.var_type.default_column()))
            }
            VariableKind::Select { pop, entries } => self.select_expr(*pop, entries, property)?,
            VariableKind::Path { .. } => match property {
                None => self.path_expr(var)?,
                Some(_) => ScalarExpr::null(),
            },
            VariableKind::Composite(c) => match property {
                None => column(&self.config.default_column),
                Some(p) if c.construct.forwards_population() => column(p),
                Some(_) => ScalarExpr::null(),
            },
            VariableKind::Repeat(_) => column(property.unwrap_or(&self.config.default_column)),
            VariableKind::Drop { .. } => ScalarExpr::null(),
        };
        Ok(expr)
    }

    fn intrinsic(&self, of: VarId, name: &str, property: Option<&str>) -> BuildResult<ScalarExpr> {
        match property {
            None => self.expr(of, Some(name)),
            Some(_) => Ok(ScalarExpr::null()),
        }
    }

    fn select_expr(
        &self,
        pop: Pop,
        entries: &[SelectEntry],
        property: Option<&str>,
    ) -> BuildResult<ScalarExpr> {
        if let [entry] = entries {
            if pop != Pop::All {
                return match (&entry.value, property) {
                    (SelectValue::Identity, _) => self.expr(entry.var, property),
                    (_, None) => self.entry_expr(entry),
                    (_, Some(_)) => Ok(ScalarExpr::null()),
                };
            }
        }
        if property.is_some() {
            return Ok(ScalarExpr::null());
        }

        let mut args = Vec::new();
        let name = if pop == Pop::All && entries.iter().all(|e| e.label == entries[0].label) {
            for entry in entries {
                args.push(self.entry_expr(entry)?);
            }
            "List"
        } else {
            for entry in entries {
                args.push(ScalarExpr::Literal(Literal::String(entry.label.clone())));
                args.push(self.entry_expr(entry)?);
            }
            "Map"
        };
        Ok(ScalarExpr::FunctionCall(FunctionCall {
            name: name.to_string(),
            args,
        }))
    }

    fn path_expr(&self, var: &Variable) -> BuildResult<ScalarExpr> {
        let VariableKind::Path { steps, by, live } = &var.kind else {
            return Ok(ScalarExpr::null());
        };
        let steps = if *live {
            self.arena.path_steps(var.owner, None)?
        } else {
            steps.clone()
        };
        self.path_value(&steps, by)
    }

    /// `Path(...)` over the steps, with the path column of every carrier
    /// spliced in place. `by` keys cycle over the plain elements only.
    fn path_value(&self, steps: &[VarId], by: &[Option<String>]) -> BuildResult<ScalarExpr> {
        let path = |args: Vec<ScalarExpr>| {
            ScalarExpr::FunctionCall(FunctionCall {
                name: "Path".to_string(),
                args,
            })
        };

        let mut segments = Vec::new();
        let mut elements = Vec::new();
        let mut position = 0;
        for step in steps {
            if self.arena.carries_path(*step)? {
                if !elements.is_empty() {
                    segments.push(path(std::mem::take(&mut elements)));
                }
                segments.push(ScalarExpr::column(
                    self.alias(*step)?,
                    self.config.path_column.clone(),
                ));
                continue;
            }
            let key = if by.is_empty() {
                None
            } else {
                by[position % by.len()].as_deref()
            };
            elements.push(self.expr(*step, key)?);
            position += 1;
        }
        if !elements.is_empty() || segments.is_empty() {
            segments.push(path(elements));
        }

        if segments.len() == 1 {
            return Ok(segments.remove(0));
        }
        Ok(ScalarExpr::FunctionCall(FunctionCall {
            name: "ConcatPath".to_string(),
            args: segments,
        }))
    }

    /// Relational source contributed by a table reference.
    pub fn from_item(&self, id: VarId) -> BuildResult<FromItem> {
        let var = self.arena.var(id)?;
        let named = |name: &str| {
            FromItem::Named(NamedSource {
                name: name.to_string(),
                alias: var.alias.clone(),
            })
        };
        let call = |name: &str, params: Vec<FunctionParam>| {
            FromItem::TableFunction(TableValuedFunction {
                name: name.to_string(),
                params,
                alias: var.alias.clone(),
            })
        };
        let scalar = |e: ScalarExpr| FunctionParam::Scalar(e);
        let literal = |l: Literal| FunctionParam::Scalar(ScalarExpr::Literal(l));

        let item = match &var.kind {
            VariableKind::Vertex(VertexSource::Scan | VertexSource::MatchEndpoint) => {
                named("Node")
            }
            VariableKind::Edge(EdgeSource::Scan | EdgeSource::MatchEdge { .. }) => named("Edge"),
            VariableKind::Vertex(VertexSource::FromEdge { edge, end, origin }) => {
                let mut params = vec![scalar(self.expr(*edge, None)?)];
                if let (EdgeEnd::Other, Some(origin)) = (end, origin) {
                    params.push(scalar(self.expr(*origin, None)?));
                }
                call(end.vertex_function(), params)
            }
            VariableKind::Edge(EdgeSource::FromVertex { vertex, direction }) => call(
                direction.edge_function(),
                vec![scalar(self.expr(*vertex, None)?)],
            ),
            VariableKind::Values { of, keys } => {
                let mut params = Vec::new();
                if keys.is_empty() {
                    params.push(scalar(self.expr(*of, None)?));
                }
                for key in keys {
                    params.push(scalar(self.expr(*of, Some(key))?));
                }
                call("Values", params)
            }
            VariableKind::Properties { of, keys } => {
                let mut params = vec![scalar(self.expr(*of, None)?)];
                params.extend(keys.iter().map(|k| literal(Literal::String(k.clone()))));
                call("Properties", params)
            }
            VariableKind::ValueMap { of, keys } => {
                let mut params = Vec::new();
                if keys.is_empty() {
                    params.push(scalar(self.expr(*of, None)?));
                }
                for key in keys {
                    params.push(literal(Literal::String(key.clone())));
                    params.push(scalar(self.expr(*of, Some(key))?));
                }
                call("ValueMap", params)
            }
            VariableKind::Unfold { of } => {
                let mut params = vec![scalar(self.expr(*of, None)?)];
                for property in &var.projected {
                    params.push(scalar(self.expr(*of, Some(property))?));
                }
                call("Unfold", params)
            }
            VariableKind::Filter { input, predicate } => call(
                "Filter",
                vec![
                    scalar(self.expr(*input, None)?),
                    FunctionParam::Predicate(predicate.clone()),
                ],
            ),
            VariableKind::LoopInput { repeat } => FromItem::Named(NamedSource {
                name: self.alias(*repeat)?,
                alias: var.alias.clone(),
            }),
            VariableKind::Composite(c) => FromItem::TableFunction(self.composite_function(var, c)?),
            VariableKind::Repeat(r) => FromItem::TableFunction(self.repeat_function(var, r)?),
            VariableKind::Inject { values } => {
                call("Inject", values.iter().cloned().map(literal).collect())
            }
            VariableKind::AddVertex { label } => call(
                "AddV",
                vec![literal(
                    label.clone().map(Literal::String).unwrap_or(Literal::Null),
                )],
            ),
            VariableKind::AddEdge { label, from, to } => call(
                "AddE",
                vec![
                    literal(Literal::String(label.clone())),
                    scalar(from.clone()),
                    scalar(to.clone()),
                ],
            ),
            VariableKind::PropertyWrite { target, key, value } => call(
                "SetProperty",
                vec![
                    scalar(self.expr(*target, None)?),
                    literal(Literal::String(key.clone())),
                    literal(value.clone()),
                ],
            ),
            VariableKind::Drop { target } => call("Drop", vec![scalar(self.expr(*target, None)?)]),
            VariableKind::Id { .. }
            | VariableKind::Label { .. }
            | VariableKind::Key { .. }
            | VariableKind::Value { .. }
            | VariableKind::Constant(_)
            | VariableKind::ContextRef { .. }
            | VariableKind::Ghost(_)
            | VariableKind::Select { .. }
            | VariableKind::Path { .. } => {
                return Err(RenderBuildError::NotATableReference(var.alias.clone()))
            }
        };
        Ok(item)
    }

    /// Output columns of a construct, in the order every branch emits them.
    pub fn layout(&self, id: VarId) -> BuildResult<Vec<LayoutColumn>> {
        let var = self.arena.var(id)?;
        let mut columns = vec![LayoutColumn::Default];

        let carries_properties = match &var.kind {
            VariableKind::Composite(c) => c.construct.forwards_population(),
            VariableKind::Repeat(_) => true,
            _ => false,
        };
        if carries_properties {
            columns.extend(var.projected.iter().cloned().map(LayoutColumn::Property));
        }

        for ghost in var.ghost_outputs() {
            columns.push(LayoutColumn::Ghost {
                ghost: *ghost,
                property: None,
            });
            for property in &self.arena.var(*ghost)?.projected {
                columns.push(LayoutColumn::Ghost {
                    ghost: *ghost,
                    property: Some(property.clone()),
                });
            }
        }

        if let VariableKind::Repeat(r) = &var.kind {
            columns.extend(r.pulled.iter().cloned().map(LayoutColumn::Pulled));
        }
        if self.arena.carries_path(id)? {
            columns.push(LayoutColumn::Path);
        }
        Ok(columns)
    }

    pub fn column_name(&self, column: &LayoutColumn) -> BuildResult<String> {
        Ok(match column {
            LayoutColumn::Default => self.config.default_column.clone(),
            LayoutColumn::Property(p) => p.clone(),
            LayoutColumn::Ghost { ghost, property } => match &self.arena.var(*ghost)?.kind {
                VariableKind::Ghost(g) => synthetic_property_column(&g.column, property.as_deref()),
                _ => {
                    return Err(RenderBuildError::InvalidRenderPlan(format!(
                        "{} is not a ghost",
                        ghost
                    )))
                }
            },
            LayoutColumn::Pulled(p) => p.column.clone(),
            LayoutColumn::Path => self.config.path_column.clone(),
        })
    }

    /// Value of a ghost column inside one branch of a construct that carries it.
    ///
    /// The branch holding the next construct of the ghost's chain reads that
    /// construct's re-keyed column; the branch holding the binding reads the
    /// binding; any other branch contributes NULL.
    fn ghost_value(
        &self,
        ghost: VarId,
        construct: VarId,
        branch: CtxId,
        property: Option<&str>,
    ) -> BuildResult<ScalarExpr> {
        let ghost_var = self.arena.var(ghost)?;
        let VariableKind::Ghost(g) = &ghost_var.kind else {
            return Err(RenderBuildError::InvalidRenderPlan(format!(
                "{} is not a ghost",
                ghost_var.alias
            )));
        };
        let position = g.chain.iter().position(|c| *c == construct).ok_or_else(|| {
            RenderBuildError::GhostNotCaptured {
                ghost: ghost_var.alias.clone(),
                construct: self.alias(construct).unwrap_or_default(),
            }
        })?;

        match g.chain.get(position + 1) {
            Some(next) => {
                let next_var = self.arena.var(*next)?;
                if next_var.owner == branch {
                    Ok(ScalarExpr::column(
                        next_var.alias.clone(),
                        synthetic_property_column(&g.column, property),
                    ))
                } else {
                    Ok(ScalarExpr::null())
                }
            }
            None if self.arena.var(g.real)?.owner == branch => self.expr(g.real, property),
            None => Ok(ScalarExpr::null()),
        }
    }

    fn branch_block(
        &self,
        construct: &Variable,
        composite: &Composite,
        branch: CtxId,
        layout: &[LayoutColumn],
        with_branch_columns: bool,
    ) -> BuildResult<QueryBlock> {
        let pivot = self
            .arena
            .ctx(branch)?
            .pivot
            .ok_or(RenderBuildError::MissingPivot(branch.0))?;

        let mut select = Vec::with_capacity(layout.len());
        for column in layout {
            let expr = match column {
                LayoutColumn::Default => self.expr(pivot, None)?,
                LayoutColumn::Property(p) => self.expr(pivot, Some(p))?,
                LayoutColumn::Ghost { ghost, property } => {
                    self.ghost_value(*ghost, construct.id, branch, property.as_deref())?
                }
                LayoutColumn::Pulled(_) => ScalarExpr::null(),
                LayoutColumn::Path => {
                    self.path_value(&self.arena.local_path_steps(branch, None)?, &[])?
                }
            };
            select.push(SelectItem::new(expr, self.column_name(column)?));
        }
        if with_branch_columns {
            for (name, expr) in &composite.branch_columns {
                select.push(SelectItem::new(expr.clone(), name.clone()));
            }
        }
        trace!(
            "branch {} of {} emits {} columns",
            branch,
            construct.alias,
            select.len()
        );
        self.build_block(branch, select)
    }

    fn composite_function(
        &self,
        var: &Variable,
        composite: &Composite,
    ) -> BuildResult<TableValuedFunction> {
        let layout = self.layout(var.id)?;
        let mut blocks = Vec::with_capacity(composite.branches.len());
        for (i, branch) in composite.branches.iter().enumerate() {
            blocks.push(self.branch_block(var, composite, *branch, &layout, i == 0)?);
        }

        let query = |block: QueryBlock| FunctionParam::Query(QueryExpr::block(block));
        let literal = |l: Literal| FunctionParam::Scalar(ScalarExpr::Literal(l));
        let input = match composite.input {
            Some(input) => self.expr(input, None)?,
            None => ScalarExpr::null(),
        };

        let mut params = Vec::new();
        match &composite.construct {
            construct if construct.concatenates_branches() => {
                let union = QueryExpr::union_all(blocks).ok_or_else(|| {
                    RenderBuildError::InvalidRenderPlan(format!("{} has no branches", var.alias))
                })?;
                params.push(FunctionParam::Query(union));
            }
            Construct::Choose(ChooseForm::Predicate(predicate)) => {
                params.push(FunctionParam::Predicate(predicate.clone()));
                params.extend(blocks.into_iter().map(query));
            }
            Construct::Choose(ChooseForm::Options { selector, keys }) => {
                params.push(FunctionParam::Scalar(selector.clone()));
                let mut blocks = blocks.into_iter();
                for key in keys {
                    params.push(literal(key.clone()));
                    if let Some(block) = blocks.next() {
                        params.push(query(block));
                    }
                }
                params.extend(blocks.map(query));
            }
            Construct::Order { keys } => {
                params.extend(blocks.into_iter().map(query));
                for key in keys {
                    params.push(literal(Literal::String(key.column.clone())));
                    params.push(literal(Literal::String(
                        if key.descending { "desc" } else { "asc" }.to_string(),
                    )));
                }
            }
            Construct::Range { low, high } => {
                params.extend(blocks.into_iter().map(query));
                params.push(literal(Literal::Integer(*low)));
                params.push(literal(Literal::Integer(*high)));
            }
            Construct::SideEffect => {
                params.push(FunctionParam::Scalar(input));
                params.extend(blocks.into_iter().map(query));
            }
            Construct::Aggregate { key } | Construct::Store { key } | Construct::Subgraph { key } => {
                params.push(literal(Literal::String(key.clone())));
                params.push(FunctionParam::Scalar(input));
            }
            Construct::Project { keys } => {
                for (key, block) in keys.iter().zip(blocks) {
                    params.push(literal(Literal::String(key.clone())));
                    params.push(query(block));
                }
            }
            _ => params.extend(blocks.into_iter().map(query)),
        }

        Ok(TableValuedFunction {
            name: composite.construct.function_name().to_string(),
            params,
            alias: var.alias.clone(),
        })
    }

    /// Seed and step halves of a loop, aligned on the loop's layout.
    pub fn repeat_blocks(&self, id: VarId) -> BuildResult<(QueryBlock, QueryBlock)> {
        let var = self.arena.var(id)?;
        let VariableKind::Repeat(r) = &var.kind else {
            return Err(RenderBuildError::InvalidRenderPlan(format!(
                "{} is not a loop",
                var.alias
            )));
        };
        let layout = self.layout(id)?;
        let body_pivot = self
            .arena
            .ctx(r.body)?
            .pivot
            .ok_or(RenderBuildError::MissingPivot(r.body.0))?;

        let mut seed = Vec::with_capacity(layout.len());
        let mut step = Vec::with_capacity(layout.len());
        for column in &layout {
            let name = self.column_name(column)?;
            let (seeded, stepped) = match column {
                LayoutColumn::Default => (self.expr(r.input, None)?, self.expr(body_pivot, None)?),
                LayoutColumn::Property(p) => {
                    (self.expr(r.input, Some(p))?, self.expr(body_pivot, Some(p))?)
                }
                LayoutColumn::Ghost { ghost, property } => {
                    let current = self.ghost_value(*ghost, id, r.body, property.as_deref())?;
                    (ScalarExpr::null(), self.keep_first_binding(*ghost, r, &name, current)?)
                }
                LayoutColumn::Pulled(p) => (ScalarExpr::null(), ScalarExpr::Column(p.source.clone())),
                LayoutColumn::Path => (
                    self.path_value(&[], &[])?,
                    self.path_value(&self.arena.local_path_steps(r.body, None)?, &[])?,
                ),
            };
            seed.push(SelectItem::new(seeded, name.clone()));
            step.push(SelectItem::new(stepped, name));
        }

        let seed = QueryBlock {
            select: seed,
            ..Default::default()
        };
        let step = self.build_block(r.body, step)?;
        Ok((seed, self.loop_input_substitution(r)?.block(&step)))
    }

    /// `select(first, ...)` of a loop binding keeps the earliest iteration's value.
    fn keep_first_binding(
        &self,
        ghost: VarId,
        r: &RepeatLoop,
        column: &str,
        current: ScalarExpr,
    ) -> BuildResult<ScalarExpr> {
        let first = matches!(&self.arena.var(ghost)?.kind, VariableKind::Ghost(g) if g.pop == Pop::First);
        match (first, r.loop_input) {
            (true, Some(input)) if !current.is_null_literal() => {
                Ok(ScalarExpr::FunctionCall(FunctionCall {
                    name: "Coalesce".to_string(),
                    args: vec![ScalarExpr::column(self.alias(input)?, column), current],
                }))
            }
            _ => Ok(current),
        }
    }

    /// Inside the step block the previous iteration is a row of the loop
    /// relation, whose value lives in the default column rather than in the
    /// input type's natural column.
    fn loop_input_substitution(&self, r: &RepeatLoop) -> BuildResult<ColumnSubstitution> {
        let mut env = ColumnSubstitution::new();
        if let Some(input) = r.loop_input {
            let input = self.arena.var(input)?;
            env.insert(
                ColumnRef::new(input.alias.clone(), input.var_type.default_column()),
                ColumnRef::new(input.alias.clone(), self.config.default_column.clone()),
            );
        }
        Ok(env)
    }

    fn repeat_function(&self, var: &Variable, r: &RepeatLoop) -> BuildResult<TableValuedFunction> {
        let (seed, step) = self.repeat_blocks(var.id)?;
        let recursive = QueryExpr::UnionAll(
            Box::new(QueryExpr::block(seed)),
            Box::new(QueryExpr::block(step)),
        );
        let condition = &r.condition;
        let cap = condition
            .cap
            .map(|c| Literal::Integer(i64::from(c)))
            .unwrap_or(Literal::Null);

        Ok(TableValuedFunction {
            name: "Repeat".to_string(),
            params: vec![
                FunctionParam::Query(recursive),
                FunctionParam::Predicate(
                    condition
                        .until
                        .clone()
                        .unwrap_or(BooleanExpr::Literal(false)),
                ),
                FunctionParam::Predicate(
                    condition.emit.clone().unwrap_or(BooleanExpr::Literal(false)),
                ),
                FunctionParam::Scalar(ScalarExpr::Literal(cap)),
                FunctionParam::Scalar(ScalarExpr::Literal(Literal::Boolean(condition.until_first))),
                FunctionParam::Scalar(ScalarExpr::Literal(Literal::Boolean(condition.emit_first))),
            ],
            alias: var.alias.clone(),
        })
    }
}
