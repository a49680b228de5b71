// src/system/executor.rs

use crate::{constants::INTERRUPTED_EXIT_CODE, core::quoting};
use async_trait::async_trait;
use std::fmt::Debug;
use std::process::{ExitStatus, Stdio};
use thiserror::Error;
use tokio::process::Command;

/// Failures while running an external command.
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// The argv had no program.
    #[error("No command specified to run.")]
    EmptyCommand,
    /// The program could not be started.
    #[error("Command '{command}' could not be executed: {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },
    /// A captured or side-effect command failed.
    #[error("Command '{command}' exited with a non-zero error code ({code}).")]
    NonZeroExitStatus { command: String, code: i32 },
    /// Captured output was not UTF-8.
    #[error("Command '{command}' produced output that was not valid UTF-8")]
    InvalidUtf8Output {
        command: String,
        #[source]
        source: std::string::FromUtf8Error,
    },
    /// The user interrupted the command.
    #[error("Command '{command}' was interrupted.")]
    Interrupted { command: String },
}

/// Starts processes. The seam between command composition and the operating system.
#[async_trait]
pub trait ProcessLauncher: Send + Sync + Debug {
    /// Runs with the terminal attached and returns the exit code.
    async fn interactive(&self, argv: &[String]) -> Result<i32, ExecutionError>;
    /// Runs and returns standard output. Non-zero exit is an error.
    async fn capture(&self, argv: &[String]) -> Result<String, ExecutionError>;
    /// Runs with the terminal attached. Non-zero exit is an error.
    async fn run(&self, argv: &[String]) -> Result<(), ExecutionError>;
}

/// Launches real processes through `tokio::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLauncher;

#[async_trait]
impl ProcessLauncher for SystemLauncher {
    async fn interactive(&self, argv: &[String]) -> Result<i32, ExecutionError> {
        execute_interactive(argv).await
    }

    async fn capture(&self, argv: &[String]) -> Result<String, ExecutionError> {
        execute_and_capture_output(argv).await
    }

    async fn run(&self, argv: &[String]) -> Result<(), ExecutionError> {
        execute_command(argv).await
    }
}

fn prepare_command(argv: &[String]) -> Result<(Command, String), ExecutionError> {
    let (program, args) = argv.split_first().ok_or(ExecutionError::EmptyCommand)?;
    let mut command = Command::new(program);
    command.args(args);
    Ok((command, quoting::join_words(argv)))
}

/// Exit code of a finished process. Death by signal reports as an interruption.
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(INTERRUPTED_EXIT_CODE)
}

/// Runs a command attached to the terminal and returns its exit code.
///
/// Ctrl+C is delivered to the child by the terminal; this process keeps waiting so the
/// child decides whether the interrupt ends it (as a REPL usually does not).
pub async fn execute_interactive(argv: &[String]) -> Result<i32, ExecutionError> {
    let (mut command, display) = prepare_command(argv)?;
    let mut child = command
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|e| ExecutionError::SpawnFailed {
            command: display.clone(),
            source: e,
        })?;

    loop {
        tokio::select! {
            status = child.wait() => {
                let status = status.map_err(|e| ExecutionError::SpawnFailed {
                    command: display.clone(),
                    source: e,
                })?;
                log::debug!("'{}' finished with {}", display, status);
                return Ok(exit_code(status));
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    log::warn!("Could not listen for Ctrl+C: {}", e);
                    let status = child.wait().await.map_err(|e| ExecutionError::SpawnFailed {
                        command: display.clone(),
                        source: e,
                    })?;
                    return Ok(exit_code(status));
                }
                log::debug!("Ctrl+C received, waiting for '{}' to exit", display);
            }
        }
    }
}

/// Runs a command and captures its standard output. Stderr goes to the terminal.
pub async fn execute_and_capture_output(argv: &[String]) -> Result<String, ExecutionError> {
    let (mut command, display) = prepare_command(argv)?;
    let output = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .output()
        .await
        .map_err(|e| ExecutionError::SpawnFailed {
            command: display.clone(),
            source: e,
        })?;

    if !output.status.success() {
        return Err(failure(display, output.status));
    }
    String::from_utf8(output.stdout).map_err(|e| ExecutionError::InvalidUtf8Output {
        command: display,
        source: e,
    })
}

/// Runs a command for its side effects with the terminal attached.
pub async fn execute_command(argv: &[String]) -> Result<(), ExecutionError> {
    let (mut command, display) = prepare_command(argv)?;
    let status = command
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
        .map_err(|e| ExecutionError::SpawnFailed {
            command: display.clone(),
            source: e,
        })?;

    if status.success() {
        Ok(())
    } else {
        Err(failure(display, status))
    }
}

fn failure(command: String, status: ExitStatus) -> ExecutionError {
    match status.code() {
        Some(code) => ExecutionError::NonZeroExitStatus { command, code },
        None => ExecutionError::Interrupted { command },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|part| part.to_string()).collect()
    }

    #[tokio::test]
    async fn test_empty_command_is_rejected() {
        assert!(matches!(
            execute_command(&[]).await,
            Err(ExecutionError::EmptyCommand)
        ));
    }

    #[tokio::test]
    async fn test_missing_program_fails_to_spawn() {
        let result = execute_and_capture_output(&argv(&["definitely-not-a-real-binary-xyz"])).await;
        assert!(matches!(result, Err(ExecutionError::SpawnFailed { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_capture_returns_stdout() {
        let output = execute_and_capture_output(&argv(&["sh", "-c", "printf 'a b'"]))
            .await
            .unwrap();
        assert_eq!(output, "a b");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_reported_with_code() {
        match execute_command(&argv(&["sh", "-c", "exit 3"])).await {
            Err(ExecutionError::NonZeroExitStatus { code, command }) => {
                assert_eq!(code, 3);
                assert_eq!(command, "sh -c 'exit 3'");
            }
            other => panic!("expected NonZeroExitStatus, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_interactive_mirrors_exit_code() {
        let code = execute_interactive(&argv(&["sh", "-c", "exit 7"])).await.unwrap();
        assert_eq!(code, 7);

        let code = SystemLauncher
            .interactive(&argv(&["sh", "-c", "kill -9 $$"]))
            .await
            .unwrap();
        assert_eq!(code, INTERRUPTED_EXIT_CODE);
    }
}
