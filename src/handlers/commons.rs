// src/handlers/commons.rs

use super::PreconditionError;
use crate::models::{ProxyConfig, ShellCommand};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Deserializes a node's kind-specific fields, reporting failures against the node's kind.
pub fn settings<T: DeserializeOwned>(config: &ProxyConfig) -> Result<T, PreconditionError> {
    config
        .settings()
        .map_err(|e| PreconditionError::InvalidSettings {
            kind: config.kind.clone(),
            reason: e.to_string(),
        })
}

/// Serializes configured flags in document order.
///
/// `true` becomes a bare `--name`, `false` and `null` are dropped, anything else becomes
/// `--name <value>`.
pub fn flag_tokens(flags: &Map<String, Value>) -> ShellCommand {
    let mut tokens = Vec::with_capacity(flags.len() * 2);
    for (name, value) in flags {
        let value = match value {
            Value::Null | Value::Bool(false) => continue,
            Value::Bool(true) => None,
            Value::String(text) => Some(text.clone()),
            other => Some(other.to_string()),
        };
        tokens.push(format!("--{}", name));
        tokens.extend(value);
    }
    tokens
}

/// Builds an owned token list from string slices.
pub fn tokens<const N: usize>(parts: [&str; N]) -> ShellCommand {
    parts.iter().map(|part| part.to_string()).collect()
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::handlers::HopExec;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every requested command and answers captures with canned output.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingExec {
        output: String,
        remote: bool,
        captured: Mutex<Vec<Vec<String>>>,
        ran: Mutex<Vec<Vec<String>>>,
    }

    impl RecordingExec {
        pub(crate) fn with_output(output: &str) -> Self {
            Self {
                output: output.to_string(),
                ..Self::default()
            }
        }

        /// Behaves as if a transit hop sat in front of it.
        pub(crate) fn remote(mut self) -> Self {
            self.remote = true;
            self
        }

        pub(crate) fn captured(&self) -> Vec<Vec<String>> {
            self.captured.lock().unwrap().clone()
        }

        pub(crate) fn ran(&self) -> Vec<Vec<String>> {
            self.ran.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HopExec for RecordingExec {
        async fn capture(&self, command: &[String]) -> Result<String> {
            self.captured.lock().unwrap().push(command.to_vec());
            Ok(self.output.clone())
        }

        async fn run(&self, command: &[String]) -> Result<()> {
            self.ran.lock().unwrap().push(command.to_vec());
            Ok(())
        }

        fn is_remote(&self) -> bool {
            self.remote
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn test_flag_tokens_follow_value_rules_in_order() {
        let flags = json!({
            "zeta": true,
            "skip": false,
            "gone": null,
            "name": "value",
            "port": 5432,
            "ratio": 0.5
        });
        let flags = flags.as_object().unwrap();

        assert_eq!(
            flag_tokens(flags),
            ["--zeta", "--name", "value", "--port", "5432", "--ratio", "0.5"]
        );
    }

    #[test]
    fn test_flag_tokens_empty() {
        assert!(flag_tokens(&Map::new()).is_empty());
    }

    #[test]
    fn test_settings_reports_kind_on_mismatch() {
        #[derive(Deserialize, Debug)]
        #[allow(dead_code)]
        struct Needs {
            uri: String,
        }

        let config = ProxyConfig::new("mongo");
        match settings::<Needs>(&config) {
            Err(PreconditionError::InvalidSettings { kind, reason }) => {
                assert_eq!(kind, "mongo");
                assert!(reason.contains("uri"));
            }
            other => panic!("expected InvalidSettings, got {other:?}"),
        }
    }
}
