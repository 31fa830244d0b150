//! Core business logic modules.

pub mod cache;
pub mod classifier;
pub mod executor;
pub mod grouper;
pub mod identity;
pub mod pipeline;
pub mod planner;
pub mod reorganizer;
pub mod resolver;
pub mod scanner;
