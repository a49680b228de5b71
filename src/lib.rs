//! # shell-proxy
//!
//! Composes chains of proxy hops (ssh, docker, kubectl exec, database shells, screen
//! sessions) into a single command that survives every nested shell on the way.

/// Command line arguments.
pub mod cli;
/// Names and defaults shared across the crate.
pub mod constants;
/// Configuration, resolution, quoting and composition.
pub mod core;
/// Per-kind proxy handlers and their registry.
pub mod handlers;
/// Configuration and run data types.
pub mod models;
/// Process execution.
pub mod system;
