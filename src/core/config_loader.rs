//! # Config Loader
//!
//! Locates and parses the JSON proxy configuration document, and merges `--merge`
//! documents into the run parameters.
//!
//! The document is a JSON object mapping each top-level identifier to one proxy node or an
//! array of alternative nodes. Entries are kept in file order, which is also the order
//! identifiers are listed in.

use crate::{
    constants::{CONFIG_DIR_NAME, DEFAULT_CONFIG_FILENAME},
    models::{ConfigDocument, OneOrMany, ProxyConfig, ProxyKind, RunParams},
};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failures while locating, reading or merging JSON documents.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No configuration file at any searched location.
    #[error("No configuration file found. Searched: {}", format_paths(.searched))]
    NotFound { searched: Vec<PathBuf> },
    /// A `--config` path could not be expanded.
    #[error("Could not expand config path '{path}': {reason}")]
    PathExpansion { path: String, reason: String },
    /// The file could not be read.
    #[error("Could not read configuration file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid JSON.
    #[error("Invalid JSON in '{origin}': {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },
    /// The document root is not an object.
    #[error("Configuration in '{origin}' must be a JSON object of identifiers, found {found}")]
    NotAnObject { origin: String, found: &'static str },
    /// An entry is not a proxy node or an array of them.
    #[error("Invalid proxy entry '{key}' in '{origin}': {source}")]
    InvalidEntry {
        key: String,
        origin: String,
        #[source]
        source: serde_json::Error,
    },
    /// A `--merge` document is not an object of objects.
    #[error("Invalid --merge document: {reason}")]
    InvalidMerge { reason: String },
}

fn format_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Finds the configuration document to load.
///
/// An explicit path wins (with `~` and `$VARS` expanded). Otherwise the current directory
/// is searched first, then the user's config directory.
pub fn locate_config(explicit: Option<&str>) -> Result<PathBuf, ConfigError> {
    let candidates = match explicit {
        Some(raw) => vec![expand_path(raw)?],
        None => default_locations(),
    };

    for candidate in &candidates {
        log::debug!("Looking for configuration at '{}'", candidate.display());
        if candidate.is_file() {
            return Ok(candidate.clone());
        }
    }
    Err(ConfigError::NotFound {
        searched: candidates,
    })
}

fn expand_path(raw: &str) -> Result<PathBuf, ConfigError> {
    shellexpand::full(raw)
        .map(|expanded| PathBuf::from(expanded.as_ref()))
        .map_err(|e| ConfigError::PathExpansion {
            path: raw.to_string(),
            reason: e.to_string(),
        })
}

fn default_locations() -> Vec<PathBuf> {
    let mut locations = vec![PathBuf::from(DEFAULT_CONFIG_FILENAME)];
    if let Some(config_dir) = dirs::config_dir() {
        locations.push(config_dir.join(CONFIG_DIR_NAME).join(DEFAULT_CONFIG_FILENAME));
    }
    locations
}

/// Reads and parses the document at `path`.
pub fn load_document(path: &Path) -> Result<ConfigDocument, ConfigError> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_document(&content, &path.display().to_string())
}

/// Parses a configuration document. `origin` only names the source in error messages.
pub fn parse_document(content: &str, origin: &str) -> Result<ConfigDocument, ConfigError> {
    let root: Value = serde_json::from_str(content).map_err(|e| ConfigError::Parse {
        origin: origin.to_string(),
        source: e,
    })?;
    let Value::Object(entries) = root else {
        return Err(ConfigError::NotAnObject {
            origin: origin.to_string(),
            found: json_type_name(&root),
        });
    };

    let mut document = ConfigDocument::default();
    for (key, value) in entries {
        let entry = serde_json::from_value::<OneOrMany<ProxyConfig>>(value).map_err(|e| {
            ConfigError::InvalidEntry {
                key: key.clone(),
                origin: origin.to_string(),
                source: e,
            }
        })?;
        document.entries.push((key, entry));
    }
    log::debug!(
        "Parsed {} top-level proxy entries from '{}'",
        document.entries.len(),
        origin
    );
    Ok(document)
}

/// Merges one `--merge` JSON document into the run parameters.
///
/// Both sides are keyed by proxy kind. Per-kind objects are merged key by key with the new
/// document winning; anything that is not an object replaces the previous value.
pub fn merge_params(params: &mut RunParams, document: &str) -> Result<(), ConfigError> {
    let incoming: Value =
        serde_json::from_str(document).map_err(|e| ConfigError::InvalidMerge {
            reason: e.to_string(),
        })?;
    let Value::Object(incoming) = incoming else {
        return Err(ConfigError::InvalidMerge {
            reason: format!(
                "expected a JSON object keyed by proxy kind, found {}",
                json_type_name(&incoming)
            ),
        });
    };

    for (tag, value) in incoming {
        // Kind aliases ("pg", "kubernetes") share the canonical kind's parameters.
        let kind = ProxyKind::parse(&tag).as_str().to_string();
        match (params.get_mut(&kind), value) {
            (Some(Value::Object(existing)), Value::Object(update)) => {
                merge_objects(existing, update);
            }
            (_, value) => {
                params.insert(kind, value);
            }
        }
    }
    Ok(())
}

fn merge_objects(target: &mut Map<String, Value>, update: Map<String, Value>) {
    for (key, value) in update {
        target.insert(key, value);
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
