// src/handlers/custom.rs

use super::{PreconditionError, ProxyHandler, commons};
use crate::models::{ProxyConfig, ProxyKind, ShellCommand};
use anyhow::Result;
use serde::Deserialize;

const TEMPLATE_FIELDS: [&str; 3] = ["base", "tty", "eval"];

/// A token template, written either as a shell line or as an explicit token array.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
enum Template {
    Line(String),
    Tokens(Vec<String>),
}

impl Template {
    fn tokens(&self, kind: &str) -> Result<ShellCommand, PreconditionError> {
        match self {
            Self::Tokens(tokens) => Ok(tokens.clone()),
            Self::Line(line) => shlex::split(line).ok_or_else(|| PreconditionError::InvalidSettings {
                kind: kind.to_string(),
                reason: format!("template '{}' is not valid shell syntax", line),
            }),
        }
    }
}

#[derive(Deserialize, Debug)]
struct TemplateSettings {
    base: Option<Template>,
    tty: Option<Template>,
    eval: Option<Template>,
    /// The hop hands its trailing command to a shell (like ssh does).
    #[serde(default)]
    shell: bool,
}

impl TemplateSettings {
    fn render(&self, kind: &str, preferred: Option<&Template>) -> Result<ShellCommand, PreconditionError> {
        preferred
            .or(self.base.as_ref())
            .ok_or_else(|| PreconditionError::InvalidSettings {
                kind: kind.to_string(),
                reason: "no `base` template to fall back on".to_string(),
            })?
            .tokens(kind)
    }
}

/// Proxy kinds declared entirely in the configuration document through token templates.
///
/// `tty` and `eval` fall back on `base`; eval appends the leaf arguments.
#[derive(Debug, Default)]
pub struct TemplateHandler;

impl ProxyHandler for TemplateHandler {
    fn name(&self) -> &str {
        "template"
    }

    fn matches(&self, config: &ProxyConfig) -> bool {
        matches!(config.proxy_kind(), ProxyKind::Custom(_))
            && TEMPLATE_FIELDS
                .iter()
                .any(|field| config.fields.contains_key(*field))
    }

    fn base_tokens(&self, config: &ProxyConfig) -> Result<ShellCommand> {
        let settings: TemplateSettings = commons::settings(config)?;
        Ok(settings.render(&config.kind, None)?)
    }

    fn tty_tokens(&self, config: &ProxyConfig) -> Result<ShellCommand> {
        let settings: TemplateSettings = commons::settings(config)?;
        Ok(settings.render(&config.kind, settings.tty.as_ref())?)
    }

    fn eval_tokens(&self, args: &[String], config: &ProxyConfig) -> Result<ShellCommand> {
        let settings: TemplateSettings = commons::settings(config)?;
        let mut tokens = settings.render(&config.kind, settings.eval.as_ref())?;
        tokens.extend_from_slice(args);
        Ok(tokens)
    }

    fn reparses_command(&self, config: &ProxyConfig) -> bool {
        commons::settings::<TemplateSettings>(config)
            .map(|settings| settings.shell)
            .unwrap_or(false)
    }
}
