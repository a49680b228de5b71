// src/handlers/screen.rs

use super::{ProxyHandler, commons};
use crate::models::{ProxyConfig, ProxyKind, ShellCommand};
use anyhow::Result;
use serde::Deserialize;

#[derive(Deserialize, Debug)]
struct ScreenSettings {
    name: String,
}

/// A named GNU screen session. Eval types the arguments into the session.
#[derive(Debug, Default)]
pub struct ScreenHandler;

impl ProxyHandler for ScreenHandler {
    fn name(&self) -> &str {
        "screen"
    }

    fn matches(&self, config: &ProxyConfig) -> bool {
        config.proxy_kind() == ProxyKind::Screen
    }

    fn base_tokens(&self, config: &ProxyConfig) -> Result<ShellCommand> {
        let settings: ScreenSettings = commons::settings(config)?;
        Ok(commons::tokens(["screen", "-r", &settings.name]))
    }

    fn tty_tokens(&self, config: &ProxyConfig) -> Result<ShellCommand> {
        self.base_tokens(config)
    }

    fn eval_tokens(&self, args: &[String], config: &ProxyConfig) -> Result<ShellCommand> {
        let settings: ScreenSettings = commons::settings(config)?;
        let keystrokes = format!("{}\n", args.join(" "));
        Ok(commons::tokens([
            "screen",
            "-S",
            &settings.name,
            "-X",
            "stuff",
            &keystrokes,
        ]))
    }
}
