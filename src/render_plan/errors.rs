use thiserror::Error;

use crate::query_planner::plan_ctx::errors::PlanCtxError;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RenderBuildError {
    #[error("Context {0} has no pivot to project.")]
    MissingPivot(usize),

    #[error("Variable `{0}` does not contribute a relational source.")]
    NotATableReference(String),

    #[error("Ghost `{ghost}` is not captured by construct `{construct}`.")]
    GhostNotCaptured { ghost: String, construct: String },

    #[error("Invalid render plan: {0}")]
    InvalidRenderPlan(String),

    #[error("{0}")]
    Context(#[from] PlanCtxError),
}
