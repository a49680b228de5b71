//! # System Interaction Layer
//!
//! The boundary between command composition and the operating system.
//!
//! - **`executor`**: spawns the composed command and the sub-commands handlers need while
//!   preparing hops. Interactive runs mirror the child's exit code; captures return stdout.

/// Spawning, capturing and interrupting processes.
pub mod executor;
