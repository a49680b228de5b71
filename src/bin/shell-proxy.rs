// src/bin/shell-proxy.rs

use anyhow::Result;
use clap::Parser;
use colored::*;
use shell_proxy::{
    cli::Cli,
    constants::INTERRUPTED_EXIT_CODE,
    core::{
        config_loader,
        config_tree::{ProxyTree, ResolutionError},
        run_context::RunContext,
        runner::ProxyRunner,
    },
    handlers::HandlerRegistry,
    models::RunParams,
    system::executor::{self, SystemLauncher},
};

/// The entry point of `shell-proxy`.
/// Sets up logging, parses arguments, runs the target and maps failures to exit codes.
#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run_cli(cli).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            // --- Centralized Error Handling ---
            if let Some(executor::ExecutionError::Interrupted { .. }) =
                e.downcast_ref::<executor::ExecutionError>()
            {
                std::process::exit(INTERRUPTED_EXIT_CODE);
            }

            eprintln!("\n{}: {:#}", "Error".red().bold(), e);
            if let Some(ResolutionError::UnknownIdentifier { known, .. }) =
                e.downcast_ref::<ResolutionError>()
            {
                print_known_ids(known);
            }
            std::process::exit(1);
        }
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

/// Loads the configuration, resolves the target and runs it. Returns the exit code to mirror.
async fn run_cli(cli: Cli) -> Result<i32> {
    log::debug!("CLI args parsed: {:?}", cli);

    let config_path = config_loader::locate_config(cli.config.as_deref())?;
    let document = config_loader::load_document(&config_path)?;
    let tree = ProxyTree::new(&document)?.in_namespace(cli.namespace.clone());

    if cli.list {
        for id in tree.get_ids() {
            println!("{}", id);
        }
        return Ok(0);
    }

    let Some(target) = cli.target.as_deref() else {
        eprintln!("{}: no target given.", "Error".red().bold());
        print_known_ids(&tree.get_ids());
        return Ok(1);
    };

    let mut params = RunParams::new();
    for document in &cli.merge {
        config_loader::merge_params(&mut params, document)?;
    }

    let mut context = RunContext::new(cli.mode(), params)
        .with_dry_run(cli.dry_run)
        .with_verbose(cli.verbose);
    let registry = HandlerRegistry::new();
    let launcher = SystemLauncher;
    let runner = ProxyRunner::new(&registry, &launcher);

    let outcome = runner
        .run_target(&tree, target, &cli.args, &mut context)
        .await?;
    log::debug!("Run finished: {:?}", outcome);
    Ok(outcome.exit_code())
}

fn print_known_ids(ids: &[String]) {
    eprintln!("\n{}", "Known identifiers:".bold());
    for id in ids {
        eprintln!("  {}", id.cyan());
    }
}
