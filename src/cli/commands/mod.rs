//! CLI command implementations.

pub mod cache;
pub mod common;
pub mod organize;
pub mod reorganize;
