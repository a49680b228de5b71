// src/models.rs

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// One process invocation: an ordered list of argv tokens.
pub type ShellCommand = Vec<String>;

/// Invocation-time parameters keyed by proxy kind (e.g. `{ "k8s": { "find": "web" } }`).
/// Only consulted while preparing hops, never written back to the configuration.
pub type RunParams = Map<String, Value>;

// --- PROXY KINDS ---

/// The kind tag of a proxy node. Drives handler dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProxyKind {
    /// `ssh`.
    Ssh,
    /// `docker`.
    Docker,
    /// `mongo`.
    Mongo,
    /// `postgres` or `pg`.
    Postgres,
    /// `k8s` or `kubernetes`.
    K8s,
    /// `screen`.
    Screen,
    /// Any kind the crate does not know about. Claimed by a registered handler or rejected.
    Custom(String),
}

impl ProxyKind {
    /// Parses a kind tag, accepting aliases and any case.
    pub fn parse(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "ssh" => Self::Ssh,
            "docker" => Self::Docker,
            "mongo" => Self::Mongo,
            "postgres" | "pg" => Self::Postgres,
            "k8s" | "kubernetes" => Self::K8s,
            "screen" => Self::Screen,
            _ => Self::Custom(tag.trim().to_string()),
        }
    }

    /// Canonical tag, also used as the key into `RunParams`.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ssh => "ssh",
            Self::Docker => "docker",
            Self::Mongo => "mongo",
            Self::Postgres => "postgres",
            Self::K8s => "k8s",
            Self::Screen => "screen",
            Self::Custom(tag) => tag,
        }
    }
}

impl fmt::Display for ProxyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the leaf hop is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvocationMode {
    /// Attach an interactive session (shell, REPL, screen session).
    #[default]
    Tty,
    /// One-shot, non-interactive evaluation of the leaf arguments.
    Eval,
    /// Run the leaf arguments verbatim as a program behind the leaf hop.
    Run,
}

// --- CONFIGURATION DOCUMENT MODELS ---

/// Accepts either a single value or an array of values. Uses `untagged` for flexible syntax.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    /// A single value.
    One(Box<T>),
    /// An array of values.
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    /// Both shapes as a slice.
    pub fn as_slice(&self) -> &[T] {
        match self {
            Self::One(item) => std::slice::from_ref(item.as_ref()),
            Self::Many(items) => items,
        }
    }
}

/// A proxy node as written in the configuration document.
///
/// Kind-specific fields (`sshAlias`, `image`, `uri`, `pod`, ...) are kept in `fields`
/// and deserialized by the matching handler on demand.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    /// The kind tag as written.
    pub kind: String,
    /// Replaces the kind tag as this node's path segment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_alias: Option<String>,
    /// An identifier resolving to this node from anywhere.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_alias: Option<String>,
    /// Extra `--name value` flags for transit tokens.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub flags: Map<String, Value>,
    /// Nodes reached through this one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<OneOrMany<ProxyConfig>>,
    /// Kind-specific fields.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ProxyConfig {
    /// Creates a bare node of the given kind. Mostly useful when building trees in code.
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            path_alias: None,
            global_alias: None,
            flags: Map::new(),
            children: None,
            fields: Map::new(),
        }
    }

    /// The parsed kind.
    pub fn proxy_kind(&self) -> ProxyKind {
        ProxyKind::parse(&self.kind)
    }

    /// The path segment this node contributes: its `pathAlias`, or its kind tag.
    pub fn segment(&self) -> &str {
        self.path_alias.as_deref().unwrap_or(&self.kind)
    }

    /// Child nodes, in document order.
    pub fn children(&self) -> &[ProxyConfig] {
        self.children.as_ref().map(OneOrMany::as_slice).unwrap_or_default()
    }

    /// A copy of the node without its sub-chains.
    pub fn detached(&self) -> Self {
        Self {
            children: None,
            ..self.clone()
        }
    }

    /// A kind-specific string field.
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Sets a kind-specific field.
    pub fn set_field(&mut self, key: &str, value: impl Into<Value>) {
        self.fields.insert(key.to_string(), value.into());
    }

    /// Deserializes the kind-specific fields into a typed settings struct.
    pub fn settings<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.fields.clone()))
    }

    // Builder helpers.

    /// Builder form of `set_field`.
    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set_field(key, value);
        self
    }

    /// Adds a transit flag.
    pub fn with_flag(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.flags.insert(name.to_string(), value.into());
        self
    }

    /// Sets `pathAlias`.
    pub fn with_path_alias(mut self, alias: &str) -> Self {
        self.path_alias = Some(alias.to_string());
        self
    }

    /// Sets `globalAlias`.
    pub fn with_global_alias(mut self, alias: &str) -> Self {
        self.global_alias = Some(alias.to_string());
        self
    }

    /// Replaces the children.
    pub fn with_children(mut self, children: Vec<ProxyConfig>) -> Self {
        self.children = Some(OneOrMany::Many(children));
        self
    }
}

/// The parsed configuration document: top-level identifiers in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigDocument {
    /// Top-level identifier and its node or alternatives.
    pub entries: Vec<(String, OneOrMany<ProxyConfig>)>,
}

impl ConfigDocument {
    /// Appends a top-level entry.
    pub fn with_entry(mut self, key: &str, entry: OneOrMany<ProxyConfig>) -> Self {
        self.entries.push((key.to_string(), entry));
        self
    }
}
