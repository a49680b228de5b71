// src/handlers/mongo.rs

use super::{ProxyHandler, commons};
use crate::core::run_context::RunContext;
use crate::models::{ProxyConfig, ProxyKind, ShellCommand};
use anyhow::Result;
use serde::Deserialize;

/// Leading words that switch from the shell's `--eval` to a standalone tool.
const TOOLS: [&str; 4] = ["dump", "restore", "export", "import"];
const EVAL_FLAG: &str = "--eval";
const SLAVE_GUARD: &str = "rs.slaveOk(); ";

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct MongoSettings {
    uri: String,
    /// The target is a secondary; reads must be allowed explicitly.
    #[serde(default)]
    slave: bool,
}

/// The `mongo` shell and its companion tools.
#[derive(Debug, Default)]
pub struct MongoHandler;

impl ProxyHandler for MongoHandler {
    fn name(&self) -> &str {
        "mongo"
    }

    fn matches(&self, config: &ProxyConfig) -> bool {
        config.proxy_kind() == ProxyKind::Mongo
    }

    fn base_tokens(&self, config: &ProxyConfig) -> Result<ShellCommand> {
        let settings: MongoSettings = commons::settings(config)?;
        Ok(commons::tokens(["mongo", &settings.uri]))
    }

    fn tty_tokens(&self, config: &ProxyConfig) -> Result<ShellCommand> {
        self.base_tokens(config)
    }

    fn eval_tokens(&self, args: &[String], config: &ProxyConfig) -> Result<ShellCommand> {
        let settings: MongoSettings = commons::settings(config)?;

        if let Some((tool, rest)) = args.split_first() {
            if TOOLS.contains(&tool.as_str()) {
                let program = format!("mongo{}", tool);
                let mut tokens = commons::tokens([program.as_str(), "--uri", &settings.uri]);
                tokens.extend_from_slice(rest);
                return Ok(tokens);
            }
        }

        Ok(commons::tokens([
            "mongo",
            &settings.uri,
            "--quiet",
            EVAL_FLAG,
            &args.join(" "),
        ]))
    }

    fn enrich_argument(
        &self,
        token: &str,
        config: &ProxyConfig,
        context: &mut RunContext,
    ) -> Result<String> {
        if context.previous_token() != Some(EVAL_FLAG) {
            return Ok(token.to_string());
        }

        let mut expression = stringify_shorthand(token);
        let settings: MongoSettings = commons::settings(config)?;
        if settings.slave && context.take_first_eval_guard() {
            expression.insert_str(0, SLAVE_GUARD);
        }
        Ok(expression)
    }
}

/// `j <expr>` and `jp <expr>` print the expression as (pretty) JSON.
fn stringify_shorthand(expression: &str) -> String {
    if let Some(rest) = expression.strip_prefix("jp ") {
        format!("JSON.stringify({}, null, 2)", rest)
    } else if let Some(rest) = expression.strip_prefix("j ") {
        format!("JSON.stringify({})", rest)
    } else {
        expression.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mongo(slave: bool) -> ProxyConfig {
        ProxyConfig::new("mongo")
            .with_field("uri", "mongo://example")
            .with_field("slave", slave)
    }

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    fn enrich_all(tokens: &[String], config: &ProxyConfig, context: &mut RunContext) -> Vec<String> {
        tokens
            .iter()
            .map(|token| {
                let enriched = MongoHandler.enrich_argument(token, config, context).unwrap();
                context.record_token(token);
                enriched
            })
            .collect()
    }

    #[test]
    fn test_eval_joins_arguments() {
        let tokens = MongoHandler
            .eval_tokens(&args(&["db.people", ".find()"]), &mongo(false))
            .unwrap();
        assert_eq!(
            tokens,
            ["mongo", "mongo://example", "--quiet", "--eval", "db.people .find()"]
        );
    }

    #[test]
    fn test_eval_switches_to_tools() {
        let tokens = MongoHandler
            .eval_tokens(&args(&["dump", "--out", "/tmp/d"]), &mongo(false))
            .unwrap();
        assert_eq!(
            tokens,
            ["mongodump", "--uri", "mongo://example", "--out", "/tmp/d"]
        );
    }

    #[test]
    fn test_tty_opens_the_shell() {
        assert_eq!(
            MongoHandler.tty_tokens(&mongo(false)).unwrap(),
            ["mongo", "mongo://example"]
        );
    }

    #[test]
    fn test_enrichment_wraps_json_shorthand() {
        let config = mongo(false);
        let tokens = MongoHandler
            .eval_tokens(&args(&["jp", "db.people.findOne()"]), &config)
            .unwrap();
        let enriched = enrich_all(&tokens, &config, &mut RunContext::default());

        assert_eq!(
            enriched.last().unwrap(),
            "JSON.stringify(db.people.findOne(), null, 2)"
        );
        assert_eq!(stringify_shorthand("j x"), "JSON.stringify(x)");
        assert_eq!(stringify_shorthand("jx"), "jx");
    }

    #[test]
    fn test_slave_guard_applies_once_per_run() {
        let config = mongo(true);
        let mut context = RunContext::default();
        let tokens = args(&["--eval", "db.a.count()", "--eval", "db.b.count()"]);

        let enriched = enrich_all(&tokens, &config, &mut context);
        assert_eq!(
            enriched,
            ["--eval", "rs.slaveOk(); db.a.count()", "--eval", "db.b.count()"]
        );

        // A fresh run starts guarded again.
        let enriched = enrich_all(&tokens, &config, &mut RunContext::default());
        assert_eq!(enriched[1], "rs.slaveOk(); db.a.count()");
    }

    #[test]
    fn test_tokens_outside_eval_are_untouched() {
        let config = mongo(true);
        let enriched = enrich_all(&args(&["mongo", "j x"]), &config, &mut RunContext::default());
        assert_eq!(enriched, ["mongo", "j x"]);
    }
}
