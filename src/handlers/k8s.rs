// src/handlers/k8s.rs

use super::{HopExec, Preparation, PreconditionError, ProxyHandler, commons};
use crate::core::run_context::RunContext;
use crate::models::{ProxyConfig, ProxyKind, ShellCommand};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct K8sSettings {
    pod: Option<String>,
    namespace: Option<String>,
    container: Option<String>,
}

impl K8sSettings {
    fn kubectl(&self) -> ShellCommand {
        let mut tokens = commons::tokens(["kubectl"]);
        if let Some(namespace) = &self.namespace {
            tokens.extend(commons::tokens(["-n", namespace]));
        }
        tokens
    }

    /// `kubectl [-n ns] exec <interactive flag> <pod> [-c container] --`.
    fn exec_command(&self, interactive: &str) -> Result<ShellCommand, PreconditionError> {
        let pod = self.pod.as_deref().ok_or(PreconditionError::MissingPod)?;
        let mut tokens = self.kubectl();
        tokens.extend(commons::tokens(["exec", interactive, pod]));
        if let Some(container) = &self.container {
            tokens.extend(commons::tokens(["-c", container]));
        }
        tokens.push("--".to_string());
        Ok(tokens)
    }
}

/// `kubectl exec` into a pod, optionally discovered by name at run time.
#[derive(Debug, Default)]
pub struct K8sHandler;

#[async_trait]
impl ProxyHandler for K8sHandler {
    fn name(&self) -> &str {
        "k8s"
    }

    fn matches(&self, config: &ProxyConfig) -> bool {
        config.proxy_kind() == ProxyKind::K8s
    }

    fn base_tokens(&self, config: &ProxyConfig) -> Result<ShellCommand> {
        let settings: K8sSettings = commons::settings(config)?;
        Ok(settings.exec_command("-it")?)
    }

    fn tty_tokens(&self, config: &ProxyConfig) -> Result<ShellCommand> {
        let mut tokens = self.base_tokens(config)?;
        tokens.push("sh".to_string());
        Ok(tokens)
    }

    fn eval_tokens(&self, args: &[String], config: &ProxyConfig) -> Result<ShellCommand> {
        let settings: K8sSettings = commons::settings(config)?;
        let mut tokens = settings.exec_command("-i")?;
        tokens.extend_from_slice(args);
        Ok(tokens)
    }

    /// Resolves the pod when none is configured.
    ///
    /// `{"k8s": {"list": true}}` prints every pod and finishes the run.
    /// `{"k8s": {"find": "<pattern>"}}` picks the single pod whose name contains the pattern.
    async fn prepare(
        &self,
        config: &mut ProxyConfig,
        context: &RunContext,
        exec: &dyn HopExec,
    ) -> Result<Preparation> {
        let settings: K8sSettings = commons::settings(config)?;
        if settings.pod.is_some() {
            return Ok(Preparation::Continue);
        }

        let list = context.param_flag(&ProxyKind::K8s, "list");
        let pattern = context.param_str(&ProxyKind::K8s, "find");
        if !list && pattern.is_none() {
            return Err(PreconditionError::MissingPod.into());
        }

        let mut command = settings.kubectl();
        command.extend(commons::tokens(["get", "pods", "-o", "name"]));
        let output = exec
            .capture(&command)
            .await
            .context("Could not list pods")?;
        let pods = pod_names(&output);

        if list {
            for pod in &pods {
                println!("{}", pod);
            }
            return Ok(Preparation::Finished);
        }

        let pattern = pattern.unwrap_or_default();
        let matching: Vec<&str> = pods
            .into_iter()
            .filter(|pod| pod.contains(pattern))
            .collect();
        match matching.as_slice() {
            [] => Err(PreconditionError::NoPodsFound {
                pattern: pattern.to_string(),
            }
            .into()),
            [pod] => {
                log::debug!("Pattern '{}' resolved to pod '{}'", pattern, pod);
                config.set_field("pod", *pod);
                Ok(Preparation::Continue)
            }
            _ => Err(PreconditionError::AmbiguousPods {
                pattern: pattern.to_string(),
                pods: matching.iter().map(|pod| pod.to_string()).collect(),
            }
            .into()),
        }
    }
}

/// Pod names from `kubectl get pods -o name` output, without the `pod/` prefix.
fn pod_names(output: &str) -> Vec<&str> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.strip_prefix("pod/").unwrap_or(line))
        .collect()
}
