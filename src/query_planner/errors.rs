use thiserror::Error;

use crate::{
    query_planner::{
        plan_ctx::errors::PlanCtxError,
        types::{StepName, VariableType},
    },
    render_plan::errors::RenderBuildError,
};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TranslationError {
    #[error("Step `{step}` cannot be applied to a {var_type} value")]
    InvalidStep {
        step: StepName,
        var_type: VariableType,
    },

    #[error("Label `{label}` is not bound by any `as()` step in scope")]
    UndefinedTag { label: String },

    #[error("Loop condition references `{reference}`, which is not reachable from the loop body or its input")]
    UnboundLoopReference { reference: String },

    #[error("Unsupported construct: {0}")]
    UnsupportedConstruct(String),

    #[error("Step `{step}` needs an input but the traversal has no current value")]
    MissingPivot { step: StepName },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("PlanCtxError: {0}")]
    Context(#[from] PlanCtxError),

    #[error("RenderBuildError: {0}")]
    Render(#[from] RenderBuildError),
}
