// src/core/run_context.rs

use crate::models::{InvocationMode, ProxyKind, RunParams};
use serde_json::{Map, Value};

/// Per-invocation state threaded through composition.
///
/// Holds the invocation mode, the run parameters and the enrichment state that handlers
/// need across the leaf's argument tokens. A fresh context is built for every run, so
/// nothing leaks from one invocation into the next.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    /// How the leaf is invoked.
    pub mode: InvocationMode,
    /// Run parameters keyed by canonical kind.
    pub params: RunParams,
    /// Print instead of executing side effects and the final command.
    pub dry_run: bool,
    /// Echo commands before they run.
    pub verbose: bool,
    previous_token: Option<String>,
    eval_guarded: bool,
}

impl RunContext {
    /// A fresh context for one run.
    pub fn new(mode: InvocationMode, params: RunParams) -> Self {
        Self {
            mode,
            params,
            ..Self::default()
        }
    }

    /// Sets dry-run mode.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Sets verbose mode.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// The parameter object for a kind, if one was supplied.
    pub fn params_for(&self, kind: &ProxyKind) -> Option<&Map<String, Value>> {
        self.params.get(kind.as_str()).and_then(Value::as_object)
    }

    /// A string parameter, if present.
    pub fn param_str(&self, kind: &ProxyKind, key: &str) -> Option<&str> {
        self.params_for(kind)?.get(key)?.as_str()
    }

    /// A boolean parameter. Absent or non-boolean values read as `false`.
    pub fn param_flag(&self, kind: &ProxyKind, key: &str) -> bool {
        self.params_for(kind)
            .and_then(|params| params.get(key))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// The original (pre-enrichment) token that preceded the one being enriched.
    pub fn previous_token(&self) -> Option<&str> {
        self.previous_token.as_deref()
    }

    /// Remembers `token` as the one preceding the next.
    pub fn record_token(&mut self, token: &str) {
        self.previous_token = Some(token.to_string());
    }

    /// Returns `true` exactly once per run. Used for prefixes that must only be applied
    /// to the first evaluated expression.
    pub fn take_first_eval_guard(&mut self) -> bool {
        !std::mem::replace(&mut self.eval_guarded, true)
    }

    /// Clears enrichment state before composing.
    pub fn reset_enrichment(&mut self) {
        self.previous_token = None;
        self.eval_guarded = false;
    }

    /// Whether composed commands are echoed before they run.
    pub fn echo_commands(&self) -> bool {
        self.verbose || self.dry_run
    }
}
