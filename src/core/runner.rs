//! # Proxy Runner
//!
//! Turns a resolved chain into one command and runs it.
//!
//! Every transit hop is prepared and contributes its base tokens plus its configured flags.
//! The leaf is prepared and contributes tty, eval or run tokens depending on the invocation
//! mode, each mapped through the handler's enrichment. The stages are then grouped by the
//! hops whose trailing command is parsed by another shell, and folded into a single argv
//! with the nested quoting algorithm.
//!
//! Preparation may need to run commands of its own (listing pods, reading the mount table).
//! Those run from the position of the hop being prepared, i.e. behind every transit hop
//! composed so far.

use crate::{
    core::{
        config_tree::{ChainHop, ProxyChain, ProxyTree},
        quoting,
        run_context::RunContext,
    },
    handlers::{HandlerRegistry, HopExec, Preparation, ProxyHandler, commons},
    models::{InvocationMode, ShellCommand},
    system::executor::ProcessLauncher,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use colored::*;

/// One hop's contribution to the composed command.
#[derive(Debug, Clone, PartialEq)]
struct Stage {
    tokens: ShellCommand,
    /// The command following this stage is handed to a shell on the other side.
    reparses: bool,
    /// Tokens are already quoted for one shell pass.
    prequoted: bool,
}

impl Stage {
    fn text(&self) -> String {
        if self.prequoted {
            self.tokens.join(" ")
        } else {
            quoting::join_words(&self.tokens)
        }
    }
}

/// The per-hop stages of a composed command, outermost first.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedCommand {
    stages: Vec<Stage>,
}

impl ComposedCommand {
    /// Token lists contributed by each hop, root first.
    pub fn stages(&self) -> Vec<&[String]> {
        self.stages.iter().map(|stage| stage.tokens.as_slice()).collect()
    }

    /// The argv to execute.
    pub fn argv(&self) -> ShellCommand {
        quoting::nested_quote(&self.groups(), false)
    }

    /// The same command as one line, for echoing and pasting into a shell.
    pub fn command_line(&self) -> String {
        quoting::command_line(&self.groups())
    }

    /// Joins stages into shell lines. A line ends after every stage whose trailing
    /// command is re-parsed, since that is where one more quoting level begins.
    fn groups(&self) -> Vec<String> {
        let mut groups = Vec::new();
        let mut current: Vec<String> = Vec::new();
        for stage in &self.stages {
            current.push(stage.text());
            if stage.reparses {
                groups.push(current.join(" "));
                current.clear();
            }
        }
        if !current.is_empty() {
            groups.push(current.join(" "));
        }
        groups
    }
}

/// What a run ended with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The final command ran; its exit code is mirrored.
    Completed { exit_code: i32 },
    /// Dry run: the argv that would have been executed.
    DryRun(ShellCommand),
    /// A handler fulfilled the request while preparing (e.g. listed pods).
    Stopped,
}

impl RunOutcome {
    /// The process exit code this outcome maps to.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Completed { exit_code } => *exit_code,
            Self::DryRun(_) | Self::Stopped => 0,
        }
    }
}

/// Prints `→ <command>`, the way every executed command is announced.
pub fn echo_command(line: &str) {
    println!("{} {}", "→".blue(), line.green());
}

/// Composes and runs chains with the given handlers and launcher.
#[derive(Debug)]
pub struct ProxyRunner<'a> {
    registry: &'a HandlerRegistry,
    launcher: &'a dyn ProcessLauncher,
}

impl<'a> ProxyRunner<'a> {
    /// A runner dispatching through `registry`.
    pub fn new(registry: &'a HandlerRegistry, launcher: &'a dyn ProcessLauncher) -> Self {
        Self { registry, launcher }
    }

    /// Resolves `id` and runs the resulting chain.
    pub async fn run_target(
        &self,
        tree: &ProxyTree,
        id: &str,
        args: &[String],
        context: &mut RunContext,
    ) -> Result<RunOutcome> {
        let mut chain = tree.get_branch(id)?;
        log::debug!("'{}' resolved to {}", id, chain.paths().join(" -> "));
        self.run(&mut chain, args, context).await
    }

    /// Composes the chain and executes it, or only prints it in dry-run mode.
    pub async fn run(
        &self,
        chain: &mut ProxyChain,
        args: &[String],
        context: &mut RunContext,
    ) -> Result<RunOutcome> {
        let Some(composed) = self.compose(chain, args, context).await? else {
            return Ok(RunOutcome::Stopped);
        };

        if context.echo_commands() {
            echo_command(&composed.command_line());
        }
        let argv = composed.argv();
        if context.dry_run {
            return Ok(RunOutcome::DryRun(argv));
        }

        let exit_code = self.launcher.interactive(&argv).await?;
        Ok(RunOutcome::Completed { exit_code })
    }

    /// Builds the command for `chain`. Returns `None` when a hop's preparation already
    /// finished the run.
    ///
    /// Preparation may write discovered values into the chain's nodes. The chain is resolved
    /// per run, so those values never outlive it.
    pub async fn compose(
        &self,
        chain: &mut ProxyChain,
        args: &[String],
        context: &mut RunContext,
    ) -> Result<Option<ComposedCommand>> {
        context.reset_enrichment();
        let quote_leaf = !chain.is_single_hop();
        let (transit, leaf) = chain.parts_mut();
        let mut stages: Vec<Stage> = Vec::with_capacity(transit.len() + 1);

        // --- Transit hops ---
        for hop in transit.iter_mut() {
            let handler = self.registry.find(&hop.config, &hop.path)?;
            if self.prepare(handler, hop, &stages, context).await? == Preparation::Finished {
                return Ok(None);
            }
            let mut tokens = handler
                .base_tokens(&hop.config)
                .with_context(|| format!("Could not build the '{}' hop", hop.path))?;
            tokens.extend(commons::flag_tokens(&hop.config.flags));
            stages.push(Stage {
                tokens,
                reparses: handler.reparses_command(&hop.config),
                prequoted: false,
            });
        }

        // --- Leaf hop ---
        let handler = self.registry.find(&leaf.config, &leaf.path)?;
        if self.prepare(handler, leaf, &stages, context).await? == Preparation::Finished {
            return Ok(None);
        }
        let raw = leaf_tokens(handler, leaf, args, context.mode)
            .with_context(|| format!("Could not build the '{}' hop", leaf.path))?;

        let mut tokens = Vec::with_capacity(raw.len());
        for token in &raw {
            let enriched = handler.enrich_argument(token, &leaf.config, context)?;
            context.record_token(token);
            tokens.push(if quote_leaf {
                quoting::single_quote(&enriched)
            } else {
                enriched
            });
        }
        stages.push(Stage {
            tokens,
            reparses: false,
            prequoted: quote_leaf,
        });

        Ok(Some(ComposedCommand { stages }))
    }

    async fn prepare(
        &self,
        handler: &dyn ProxyHandler,
        hop: &mut ChainHop,
        prefix: &[Stage],
        context: &RunContext,
    ) -> Result<Preparation> {
        log::debug!("Preparing '{}' with the {} handler", hop.path, handler.name());
        let exec = HopCommandExec {
            launcher: self.launcher,
            prefix,
            context,
        };
        let outcome = handler
            .prepare(&mut hop.config, context, &exec)
            .await
            .with_context(|| format!("Could not prepare the '{}' hop", hop.path))?;
        if outcome == Preparation::Finished {
            log::debug!("'{}' finished the run while preparing", hop.path);
        }
        Ok(outcome)
    }
}

fn leaf_tokens(
    handler: &dyn ProxyHandler,
    leaf: &ChainHop,
    args: &[String],
    mode: InvocationMode,
) -> Result<ShellCommand> {
    let mut tokens = match mode {
        InvocationMode::Eval => return handler.eval_tokens(args, &leaf.config),
        InvocationMode::Tty => handler.tty_tokens(&leaf.config)?,
        InvocationMode::Run => {
            let mut tokens = handler.base_tokens(&leaf.config)?;
            tokens.extend(commons::flag_tokens(&leaf.config.flags));
            tokens
        }
    };
    tokens.extend_from_slice(args);
    Ok(tokens)
}

/// Runs preparation commands behind the transit stages composed so far.
struct HopCommandExec<'a> {
    launcher: &'a dyn ProcessLauncher,
    prefix: &'a [Stage],
    context: &'a RunContext,
}

impl HopCommandExec<'_> {
    fn compose(&self, command: &[String]) -> ComposedCommand {
        let mut stages = self.prefix.to_vec();
        let nested = !stages.is_empty();
        stages.push(Stage {
            tokens: if nested {
                command.iter().map(|token| quoting::single_quote(token)).collect()
            } else {
                command.to_vec()
            },
            reparses: false,
            prequoted: nested,
        });
        ComposedCommand { stages }
    }
}

#[async_trait]
impl<'a> HopExec for HopCommandExec<'a> {
    async fn capture(&self, command: &[String]) -> Result<String> {
        let composed = self.compose(command);
        if self.context.echo_commands() {
            echo_command(&composed.command_line());
        }
        Ok(self.launcher.capture(&composed.argv()).await?)
    }

    async fn run(&self, command: &[String]) -> Result<()> {
        let composed = self.compose(command);
        if self.context.echo_commands() {
            echo_command(&composed.command_line());
        }
        if self.context.dry_run {
            return Ok(());
        }
        Ok(self.launcher.run(&composed.argv()).await?)
    }

    fn is_remote(&self) -> bool {
        !self.prefix.is_empty()
    }
}
