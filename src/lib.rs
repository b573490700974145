//! Gremlin translator - graph traversals compiled to relational query blocks
//!
//! This crate provides the translation core of a graph query engine:
//! - Step descriptors for Gremlin-style traversals (built fluently or read as JSON)
//! - Per-scope compilation with type-gated steps and lazy property projection
//! - Label resolution across branches, loops and aggregation barriers
//! - Emission of query blocks with match fragments and table-valued constructs
//!
//! ```
//! use gremlin_translator::{compile_traversal, gremlin_ast::Traversal, CompilerConfig, ToSql};
//!
//! let block = compile_traversal(
//!     &Traversal::new().v().out(&["knows"]).values(&["name"]),
//!     &CompilerConfig::default(),
//! )
//! .unwrap();
//! assert!(block.to_sql().contains("MATCH"));
//! ```

pub mod utils;

pub mod config;
pub mod gremlin_ast;
pub mod query_planner;
pub mod render_plan;

pub use config::CompilerConfig;
pub use query_planner::{compile_traversal, TranslationError, TraversalCompiler};
pub use render_plan::{QueryBlock, ToSql};
