//! Integration tests - whole traversals compiled and rendered end to end
//!
//! These tests drive the public API the way the CLI does: step descriptors
//! in, a query block (or its rendered text) out.

mod config_file_tests;
mod scenario_tests;
mod sql_rendering_tests;
