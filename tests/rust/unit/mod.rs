//! Unit tests - step capability gating and step descriptor decoding
//!
//! These tests exercise single components through the public API without
//! compiling whole traversals.

mod capability_tests;
mod traversal_json_tests;
