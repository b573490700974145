//! Shared helpers.

pub mod naming;
