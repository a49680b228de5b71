// src/handlers/postgres.rs

use super::{PreconditionError, ProxyHandler, commons};
use crate::core::run_context::RunContext;
use crate::models::{ProxyConfig, ProxyKind, ShellCommand};
use anyhow::Result;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

lazy_static! {
    // Plain or schema-qualified identifiers only; shortcuts interpolate them into SQL.
    static ref IDENTIFIER_RE: Regex =
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*(?:\.[A-Za-z_][A-Za-z0-9_$]*)?$").unwrap();
}

const SQL_FLAG: &str = "-c";
const LIST_TABLES_SQL: &str = "select table_name from information_schema.tables \
     where table_schema = current_schema() order by table_name";

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PostgresSettings {
    uri: String,
}

/// A query ready for `psql -c`, plus any output flags it needs.
#[derive(Debug, PartialEq)]
struct Query {
    sql: String,
    flags: Vec<&'static str>,
}

/// `psql` with one-letter query shortcuts.
#[derive(Debug, Default)]
pub struct PostgresHandler;

impl ProxyHandler for PostgresHandler {
    fn name(&self) -> &str {
        "postgres"
    }

    fn matches(&self, config: &ProxyConfig) -> bool {
        config.proxy_kind() == ProxyKind::Postgres
    }

    fn base_tokens(&self, config: &ProxyConfig) -> Result<ShellCommand> {
        let settings: PostgresSettings = commons::settings(config)?;
        Ok(commons::tokens(["psql", &settings.uri]))
    }

    fn tty_tokens(&self, config: &ProxyConfig) -> Result<ShellCommand> {
        self.base_tokens(config)
    }

    fn eval_tokens(&self, args: &[String], config: &ProxyConfig) -> Result<ShellCommand> {
        let query = expand_query(args)?;
        let mut tokens = self.base_tokens(config)?;
        tokens.extend(query.flags.iter().map(|flag| flag.to_string()));
        tokens.push(SQL_FLAG.to_string());
        tokens.push(query.sql);
        Ok(tokens)
    }

    fn enrich_argument(
        &self,
        token: &str,
        _config: &ProxyConfig,
        context: &mut RunContext,
    ) -> Result<String> {
        if context.previous_token() != Some(SQL_FLAG) {
            return Ok(token.to_string());
        }
        match context.param_str(&ProxyKind::Postgres, "schema") {
            Some(schema) => {
                let schema = identifier("schema", schema)?;
                Ok(format!("set search_path to {}; {}", schema, token))
            }
            None => Ok(token.to_string()),
        }
    }
}

/// Expands the shortcut grammar: `t`, `a <table>`, `f <table>`, `c <table>`, `j <query>`.
/// Anything else is taken as literal SQL.
fn expand_query(args: &[String]) -> Result<Query, PreconditionError> {
    let Some((head, rest)) = args.split_first() else {
        return Err(invalid("", "no query given"));
    };

    let sql = match head.as_str() {
        "t" if rest.is_empty() => LIST_TABLES_SQL.to_string(),
        "a" => format!("select * from {}", single_table(head, rest)?),
        "f" => format!("select * from {} limit 1", single_table(head, rest)?),
        "c" => format!("select count(*) from {}", single_table(head, rest)?),
        "j" => {
            let inner = expand_query(rest).map_err(|e| match e {
                PreconditionError::InvalidShorthand { reason, .. } => invalid("j", &reason),
                other => other,
            })?;
            return Ok(Query {
                sql: format!("select json_agg(t) from ({}) t", inner.sql),
                flags: vec!["--no-align", "--tuples-only"],
            });
        }
        _ => args.join(" "),
    };
    Ok(Query {
        sql,
        flags: Vec::new(),
    })
}

fn single_table<'a>(shorthand: &str, rest: &'a [String]) -> Result<&'a str, PreconditionError> {
    match rest {
        [table] => identifier(shorthand, table),
        _ => Err(invalid(shorthand, "expects exactly one table name")),
    }
}

fn identifier<'a>(shorthand: &str, name: &'a str) -> Result<&'a str, PreconditionError> {
    if IDENTIFIER_RE.is_match(name) {
        Ok(name)
    } else {
        Err(invalid(
            shorthand,
            &format!("'{}' is not a valid identifier", name),
        ))
    }
}

fn invalid(shorthand: &str, reason: &str) -> PreconditionError {
    PreconditionError::InvalidShorthand {
        shorthand: shorthand.to_string(),
        reason: reason.to_string(),
    }
}
