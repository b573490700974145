//! Error types for arena lookups.
//!
//! Handles are only minted by the arena itself, so these indicate a handle
//! from a different compilation leaking in.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum PlanCtxError {
    #[error("No variable with id `{id}` in this compilation")]
    UnknownVariable { id: usize },

    #[error("No translation context with id `{id}` in this compilation")]
    UnknownContext { id: usize },

    #[error("No variable with alias `{alias}` in this compilation")]
    UnknownAlias { alias: String },
}
