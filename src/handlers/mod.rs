//! # Proxy Handlers
//!
//! One handler per proxy kind. A handler turns a proxy node into the shell tokens that hop
//! contributes to the composed command:
//!
//! - **base tokens** when the hop is a transit hop inside a longer chain,
//! - **tty tokens** when the hop is the leaf and the user wants an interactive session,
//! - **eval tokens** when the hop is the leaf and runs a one-shot command or query.
//!
//! Handlers may also rewrite individual leaf tokens (`enrich_argument`) and discover or set
//! up resources before any token is generated (`prepare`).
//!
//! The `HandlerRegistry` dispatches on the node's kind. Handlers registered by library users
//! are consulted before the built-in ones. There is no fallback handler: a node nobody claims
//! is an `UnrecognizedProxy` error.

/// Helpers shared by handlers.
pub mod commons;
/// Kinds declared by templates in the configuration.
pub mod custom;
/// `docker exec` and `docker run`.
pub mod docker;
/// `kubectl exec` with pod discovery.
pub mod k8s;
/// The `mongo` shell.
pub mod mongo;
/// `psql` with schema and table shorthands.
pub mod postgres;
/// GNU screen sessions.
pub mod screen;
/// `ssh` with optional sshfs mounts.
pub mod ssh;

use crate::{
    core::{config_tree::ResolutionError, run_context::RunContext},
    models::{ProxyConfig, ShellCommand},
};
use anyhow::Result;
use async_trait::async_trait;
use std::fmt::Debug;
use thiserror::Error;

/// Failures detected while preparing a hop.
#[derive(Error, Debug)]
pub enum PreconditionError {
    /// No pod name contains the pattern.
    #[error("No pods found matching '{pattern}'.")]
    NoPodsFound { pattern: String },
    /// More than one pod name contains the pattern.
    #[error("Pod pattern '{pattern}' is ambiguous. Matching pods: {}", .pods.join(", "))]
    AmbiguousPods { pattern: String, pods: Vec<String> },
    #[error(
        "No pod configured. Select one with --merge '{{\"k8s\": {{\"find\": \"<pattern>\"}}}}' or list them with --merge '{{\"k8s\": {{\"list\": true}}}}'."
    )]
    /// Neither a pod, a pattern nor a listing was asked for.
    MissingPod,
    /// More than one host/guest pair on one ssh hop.
    #[error("Only one host/guest mount per ssh hop is supported, found {count}.")]
    MultipleMounts { count: usize },
    /// The node's fields do not fit its kind.
    #[error("Invalid settings for '{kind}' proxy: {reason}")]
    InvalidSettings { kind: String, reason: String },
    /// A leaf argument shorthand could not be expanded.
    #[error("Invalid shorthand '{shorthand}': {reason}")]
    InvalidShorthand { shorthand: String, reason: String },
}

/// Outcome of a hop's preparation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preparation {
    /// The node is concrete; carry on composing.
    Continue,
    /// The handler already produced what the user asked for (e.g. a pod listing).
    Finished,
}

/// Runs sub-commands on behalf of a handler's `prepare`, from the position of the hop
/// being prepared (i.e. through every transit hop already composed).
#[async_trait]
pub trait HopExec: Send + Sync {
    /// Runs a read-only command and returns its standard output.
    async fn capture(&self, command: &[String]) -> Result<String>;
    /// Runs a command for its side effects.
    async fn run(&self, command: &[String]) -> Result<()>;
    /// Whether commands run on another machine than this process (behind a transit hop).
    fn is_remote(&self) -> bool {
        false
    }
}

/// The capability every proxy kind implements.
#[async_trait]
pub trait ProxyHandler: Send + Sync + Debug {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Whether this handler claims the node.
    fn matches(&self, config: &ProxyConfig) -> bool;

    /// Tokens for a transit hop (or a leaf in run mode).
    fn base_tokens(&self, config: &ProxyConfig) -> Result<ShellCommand>;

    /// Tokens for an interactive leaf.
    fn tty_tokens(&self, config: &ProxyConfig) -> Result<ShellCommand>;

    /// Tokens for a one-shot leaf evaluating `args`.
    fn eval_tokens(&self, args: &[String], config: &ProxyConfig) -> Result<ShellCommand>;

    /// Rewrites one leaf token. `context` exposes the token that preceded this one.
    fn enrich_argument(
        &self,
        token: &str,
        _config: &ProxyConfig,
        _context: &mut RunContext,
    ) -> Result<String> {
        Ok(token.to_string())
    }

    /// Whether the command placed after this hop's tokens is parsed by another shell.
    fn reparses_command(&self, _config: &ProxyConfig) -> bool {
        false
    }

    /// Discovers or sets up resources before tokens are built.
    async fn prepare(
        &self,
        _config: &mut ProxyConfig,
        _context: &RunContext,
        _exec: &dyn HopExec,
    ) -> Result<Preparation> {
        Ok(Preparation::Continue)
    }
}

/// Maps proxy nodes to their handlers.
#[derive(Debug)]
pub struct HandlerRegistry {
    custom: Vec<Box<dyn ProxyHandler>>,
    builtins: Vec<Box<dyn ProxyHandler>>,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerRegistry {
    /// A registry with every built-in handler.
    pub fn new() -> Self {
        Self {
            custom: Vec::new(),
            builtins: vec![
                Box::new(ssh::SshHandler),
                Box::new(docker::DockerHandler),
                Box::new(mongo::MongoHandler),
                Box::new(postgres::PostgresHandler),
                Box::new(k8s::K8sHandler),
                Box::new(screen::ScreenHandler),
                Box::new(custom::TemplateHandler),
            ],
        }
    }

    /// A registry without built-ins. Only explicitly registered handlers are consulted.
    pub fn empty() -> Self {
        Self {
            custom: Vec::new(),
            builtins: Vec::new(),
        }
    }

    /// Adds a handler. Registered handlers take precedence over built-ins, in
    /// registration order.
    pub fn register(&mut self, handler: Box<dyn ProxyHandler>) {
        log::debug!("Registering proxy handler '{}'", handler.name());
        self.custom.push(handler);
    }

    /// The first handler claiming `config`. `path` only names the node in the error.
    pub fn find(
        &self,
        config: &ProxyConfig,
        path: &str,
    ) -> Result<&dyn ProxyHandler, ResolutionError> {
        self.custom
            .iter()
            .chain(&self.builtins)
            .find(|handler| handler.matches(config))
            .map(|handler| &**handler)
            .ok_or_else(|| ResolutionError::UnrecognizedProxy {
                kind: config.kind.clone(),
                path: path.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProxyKind;

    #[derive(Debug)]
    struct EchoHandler;

    impl ProxyHandler for EchoHandler {
        fn name(&self) -> &str {
            "echo"
        }

        fn matches(&self, config: &ProxyConfig) -> bool {
            matches!(config.proxy_kind(), ProxyKind::Ssh | ProxyKind::Custom(_))
        }

        fn base_tokens(&self, _config: &ProxyConfig) -> Result<ShellCommand> {
            Ok(vec!["echo".to_string()])
        }

        fn tty_tokens(&self, config: &ProxyConfig) -> Result<ShellCommand> {
            self.base_tokens(config)
        }

        fn eval_tokens(&self, args: &[String], config: &ProxyConfig) -> Result<ShellCommand> {
            let mut tokens = self.base_tokens(config)?;
            tokens.extend_from_slice(args);
            Ok(tokens)
        }
    }

    #[test]
    fn test_builtins_dispatch_on_kind() {
        let registry = HandlerRegistry::new();
        for (kind, expected) in [
            ("ssh", "ssh"),
            ("docker", "docker"),
            ("pg", "postgres"),
            ("kubernetes", "k8s"),
            ("screen", "screen"),
        ] {
            let handler = registry.find(&ProxyConfig::new(kind), kind).unwrap();
            assert_eq!(handler.name(), expected);
        }
    }

    #[test]
    fn test_unknown_kind_without_template_is_rejected() {
        let registry = HandlerRegistry::new();
        let error = registry
            .find(&ProxyConfig::new("telnet"), "lab/telnet")
            .unwrap_err();
        assert!(matches!(
            error,
            ResolutionError::UnrecognizedProxy { ref kind, ref path } if kind == "telnet" && path == "lab/telnet"
        ));
    }

    #[test]
    fn test_registered_handlers_take_precedence() {
        let mut registry = HandlerRegistry::new();
        registry.register(Box::new(EchoHandler));

        assert_eq!(registry.find(&ProxyConfig::new("ssh"), "a").unwrap().name(), "echo");
        assert_eq!(registry.find(&ProxyConfig::new("telnet"), "b").unwrap().name(), "echo");
        assert_eq!(registry.find(&ProxyConfig::new("docker"), "c").unwrap().name(), "docker");
    }

    #[test]
    fn test_empty_registry_claims_nothing() {
        let registry = HandlerRegistry::empty();
        assert!(registry.find(&ProxyConfig::new("ssh"), "a").is_err());
    }
}
