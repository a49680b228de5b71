// src/core/mod.rs

/// Finding, reading and merging JSON documents.
pub mod config_loader;
/// The proxy forest and identifier resolution.
pub mod config_tree;
/// Shell quoting for nested command lines.
pub mod quoting;
/// Per-run state shared with handlers.
pub mod run_context;
/// Composing and executing chains.
pub mod runner;
