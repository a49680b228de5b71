// src/handlers/docker.rs

use super::{PreconditionError, ProxyHandler, commons};
use crate::models::{ProxyConfig, ProxyKind, ShellCommand};
use anyhow::Result;
use serde::Deserialize;

fn default_sudo() -> bool {
    true
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct DockerSettings {
    image: Option<String>,
    /// A running container to exec into. Takes precedence over `image`.
    container: Option<String>,
    #[serde(default = "default_sudo")]
    sudo: bool,
}

enum Target<'a> {
    Container(&'a str),
    Image(&'a str),
}

impl DockerSettings {
    fn target(&self) -> Result<Target<'_>, PreconditionError> {
        match (&self.container, &self.image) {
            (Some(container), _) => Ok(Target::Container(container)),
            (None, Some(image)) => Ok(Target::Image(image)),
            (None, None) => Err(PreconditionError::InvalidSettings {
                kind: ProxyKind::Docker.to_string(),
                reason: "either `image` or `container` is required".to_string(),
            }),
        }
    }

    /// `[sudo] docker <subcommand> <interactive flag> [run flags] <target>`.
    fn command(&self, interactive: &str) -> Result<ShellCommand, PreconditionError> {
        let mut tokens = if self.sudo {
            commons::tokens(["sudo", "docker"])
        } else {
            commons::tokens(["docker"])
        };
        match self.target()? {
            Target::Container(container) => {
                tokens.extend(commons::tokens(["exec", interactive, container]));
            }
            Target::Image(image) => {
                tokens.extend(commons::tokens(["run", interactive, "--net=host", "--rm", image]));
            }
        }
        Ok(tokens)
    }
}

/// Runs a throwaway container from an image, or execs into a running one.
#[derive(Debug, Default)]
pub struct DockerHandler;

impl ProxyHandler for DockerHandler {
    fn name(&self) -> &str {
        "docker"
    }

    fn matches(&self, config: &ProxyConfig) -> bool {
        config.proxy_kind() == ProxyKind::Docker
    }

    fn base_tokens(&self, config: &ProxyConfig) -> Result<ShellCommand> {
        let settings: DockerSettings = commons::settings(config)?;
        Ok(settings.command("-it")?)
    }

    fn tty_tokens(&self, config: &ProxyConfig) -> Result<ShellCommand> {
        let mut tokens = self.base_tokens(config)?;
        tokens.push("sh".to_string());
        Ok(tokens)
    }

    fn eval_tokens(&self, args: &[String], config: &ProxyConfig) -> Result<ShellCommand> {
        let settings: DockerSettings = commons::settings(config)?;
        let mut tokens = settings.command("-i")?;
        tokens.extend_from_slice(args);
        Ok(tokens)
    }
}
