// src/cli.rs

use crate::{constants::NAMESPACE_ENV_VAR, models::InvocationMode};
use clap::Parser;

/// shell-proxy: reach a shell, a container or a database through a chain of proxy hops.
///
/// Hops (ssh, docker, kubectl, mongo, psql, screen, ...) are declared as a tree in a JSON
/// configuration file. Naming a node runs every hop on the way to it, folded into one
/// correctly quoted command.
///
/// Examples:
/// - `shell-proxy prod/web` opens an interactive session on the `prod/web` node.
/// - `shell-proxy -e prod-db 'db.people.find()'` evaluates a query on the node aliased `prod-db`.
/// - `shell-proxy -m '{"k8s": {"find": "api"}}' cluster/k8s` picks the pod matching `api`.
///
/// Options must come before TARGET; everything after it is passed to the leaf hop.
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// One-shot evaluation of ARGS on the target instead of an interactive session.
    #[arg(short, long, conflicts_with = "run")]
    pub eval: bool,

    /// Run ARGS verbatim as a program behind the target hop.
    #[arg(short, long)]
    pub run: bool,

    /// Log debug output and echo every command before it runs.
    #[arg(short, long)]
    pub verbose: bool,

    /// JSON run parameters keyed by proxy kind. Repeatable; later documents win.
    #[arg(short, long = "merge", value_name = "JSON")]
    pub merge: Vec<String>,

    /// Path to the configuration file (defaults to ./shell-proxy.json, then the user config dir).
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<String>,

    /// Print the composed command without running it.
    #[arg(short, long)]
    pub dry_run: bool,

    /// Resolve short identifiers inside this path prefix.
    #[arg(short, long, value_name = "PATH", env = NAMESPACE_ENV_VAR)]
    pub namespace: Option<String>,

    /// Print every known identifier, one per line, and exit.
    #[arg(short, long)]
    pub list: bool,

    /// The proxy to reach: a full path, a path suffix or a global alias.
    pub target: Option<String>,

    /// Arguments passed to the target hop.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

impl Cli {
    /// The invocation mode selected by `--eval` and `--run`.
    pub fn mode(&self) -> InvocationMode {
        if self.eval {
            InvocationMode::Eval
        } else if self.run {
            InvocationMode::Run
        } else {
            InvocationMode::Tty
        }
    }
}
