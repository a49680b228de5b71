// src/handlers/ssh.rs

use super::{HopExec, Preparation, PreconditionError, ProxyHandler, commons};
use crate::core::run_context::RunContext;
use crate::models::{ProxyConfig, ProxyKind, ShellCommand};
use anyhow::{Context, Result};
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;

lazy_static! {
    // Matches the mount point in both Linux (`x on /p type fuse`) and BSD (`x on /p (apfs`) output.
    static ref MOUNT_POINT_RE: Regex = Regex::new(r" on (.+?) (?:type \S+|\()").unwrap();
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct SshSettings {
    ssh_alias: String,
    /// Host path -> guest path, mounted with sshfs before the hop is used.
    #[serde(default)]
    volumes_host_guest: BTreeMap<String, String>,
}

/// `ssh` into a host configured in the user's ssh config.
#[derive(Debug, Default)]
pub struct SshHandler;

#[async_trait]
impl ProxyHandler for SshHandler {
    fn name(&self) -> &str {
        "ssh"
    }

    fn matches(&self, config: &ProxyConfig) -> bool {
        config.proxy_kind() == ProxyKind::Ssh
    }

    fn base_tokens(&self, config: &ProxyConfig) -> Result<ShellCommand> {
        let settings: SshSettings = commons::settings(config)?;
        Ok(commons::tokens(["ssh", "-t", &settings.ssh_alias]))
    }

    fn tty_tokens(&self, config: &ProxyConfig) -> Result<ShellCommand> {
        let settings: SshSettings = commons::settings(config)?;
        Ok(commons::tokens(["ssh", &settings.ssh_alias]))
    }

    fn eval_tokens(&self, args: &[String], config: &ProxyConfig) -> Result<ShellCommand> {
        let mut tokens = self.tty_tokens(config)?;
        tokens.extend_from_slice(args);
        Ok(tokens)
    }

    fn reparses_command(&self, _config: &ProxyConfig) -> bool {
        true
    }

    async fn prepare(
        &self,
        config: &mut ProxyConfig,
        _context: &RunContext,
        exec: &dyn HopExec,
    ) -> Result<Preparation> {
        let settings: SshSettings = commons::settings(config)?;
        let (host, guest) = match settings.volumes_host_guest.len() {
            0 => return Ok(Preparation::Continue),
            1 => match settings.volumes_host_guest.iter().next() {
                Some(pair) => pair,
                None => return Ok(Preparation::Continue),
            },
            count => return Err(PreconditionError::MultipleMounts { count }.into()),
        };

        let host_path = expand_host_path(host, exec).await?;
        let mount_table = exec
            .capture(&commons::tokens(["mount"]))
            .await
            .context("Could not read the local mount table")?;

        if is_mounted(&mount_table, &host_path) {
            log::debug!("'{}' is already mounted, skipping sshfs", host_path);
            return Ok(Preparation::Continue);
        }

        let remote = format!("{}:{}", settings.ssh_alias, guest);
        log::debug!("Mounting '{}' on '{}'", remote, host_path);
        exec.run(&commons::tokens(["mkdir", "-p", &host_path])).await?;
        exec.run(&commons::tokens(["sshfs", &remote, &host_path]))
            .await
            .with_context(|| format!("Could not mount '{}' on '{}'", remote, host_path))?;
        Ok(Preparation::Continue)
    }
}

/// Expands `~` against the home directory of the machine the mount commands run on.
async fn expand_host_path(host: &str, exec: &dyn HopExec) -> Result<String> {
    if !host.starts_with('~') || !exec.is_remote() {
        return Ok(shellexpand::tilde(host).into_owned());
    }
    let home = exec
        .capture(&commons::tokens(["printenv", "HOME"]))
        .await
        .context("Could not read the home directory behind the previous hop")?;
    let home = home.trim().to_string();
    if home.is_empty() {
        return Err(PreconditionError::InvalidSettings {
            kind: ProxyKind::Ssh.to_string(),
            reason: format!("cannot expand '{}': HOME is not set behind the previous hop", host),
        }
        .into());
    }
    Ok(shellexpand::tilde_with_context(host, || Some(home)).into_owned())
}

fn is_mounted(mount_table: &str, path: &str) -> bool {
    let wanted = path.trim_end_matches('/');
    mount_table
        .lines()
        .filter_map(|line| MOUNT_POINT_RE.captures(line))
        .filter_map(|captures| captures.get(1))
        .any(|mount_point| mount_point.as_str().trim_end_matches('/') == wanted)
}
