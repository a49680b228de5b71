// src/core/config_tree.rs

use crate::constants::PATH_SEPARATOR;
use crate::models::{ConfigDocument, OneOrMany, ProxyConfig};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Failures while building the tree or resolving an identifier against it.
#[derive(Error, Debug)]
pub enum ResolutionError {
    /// No node answers to `id`. `known` lists every addressable identifier.
    #[error("Unknown proxy identifier '{id}'.")]
    UnknownIdentifier { id: String, known: Vec<String> },
    /// More than one node answers to `id` at the same precedence level.
    #[error(
        "Ambiguous proxy identifier '{id}'. Use a longer path, candidates: {}",
        .candidates.join(", ")
    )]
    AmbiguousIdentifier { id: String, candidates: Vec<String> },
    /// No handler claims the node's kind.
    #[error("Unrecognized proxy kind '{kind}' at '{path}'.")]
    UnrecognizedProxy { kind: String, path: String },
    /// Two nodes declare the same global alias.
    #[error("Global alias '{alias}' is declared by both '{first}' and '{second}'.")]
    DuplicateGlobalAlias {
        alias: String,
        first: String,
        second: String,
    },
    /// Two siblings share a path segment, so neither could be addressed.
    #[error(
        "Proxy path '{path}' is declared {count} times. Give the siblings distinct 'pathAlias' values."
    )]
    DuplicatePath { path: String, count: usize },
}

type ResolutionResult<T> = Result<T, ResolutionError>;

/// A flattened node of the tree. The parent link replaces the nested `children`.
#[derive(Debug, Clone)]
struct ProxyNode {
    path: String,
    parent: Option<usize>,
    config: ProxyConfig,
}

/// One hop of a resolved chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainHop {
    /// Full path of the node.
    pub path: String,
    /// The node without its children.
    pub config: ProxyConfig,
}

/// The resolved root-to-leaf sequence of hops.
///
/// Non-empty by construction: the leaf is stored apart from the transit hops.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyChain {
    transit: Vec<ChainHop>,
    leaf: ChainHop,
}

impl ProxyChain {
    /// Builds a chain from its transit hops (root first) and its leaf.
    pub fn new(transit: Vec<ChainHop>, leaf: ChainHop) -> Self {
        Self { transit, leaf }
    }

    /// The hop the chain ends at.
    pub fn leaf(&self) -> &ChainHop {
        &self.leaf
    }

    /// Mutable access to every hop, transit hops first, for per-run preparation.
    pub fn parts_mut(&mut self) -> (&mut [ChainHop], &mut ChainHop) {
        (&mut self.transit, &mut self.leaf)
    }

    /// Number of hops, leaf included.
    pub fn len(&self) -> usize {
        self.transit.len() + 1
    }

    /// Always `false`: a chain has at least its leaf.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Whether the leaf is the only hop.
    pub fn is_single_hop(&self) -> bool {
        self.transit.is_empty()
    }

    /// Every hop's full path, root first.
    pub fn paths(&self) -> Vec<&str> {
        self.transit
            .iter()
            .chain(std::iter::once(&self.leaf))
            .map(|hop| hop.path.as_str())
            .collect()
    }
}

/// The immutable forest of proxy nodes loaded from the configuration document.
#[derive(Debug, Clone, Default)]
pub struct ProxyTree {
    nodes: Vec<ProxyNode>,
    namespace: Option<String>,
}

impl ProxyTree {
    /// Flattens the document depth-first, in document order, assigning each node its path.
    pub fn new(document: &ConfigDocument) -> ResolutionResult<Self> {
        let mut nodes: Vec<ProxyNode> = Vec::new();
        let mut stack: Vec<(&ProxyConfig, String, Option<usize>)> = Vec::new();

        for (key, entry) in document.entries.iter().rev() {
            match entry {
                OneOrMany::One(config) => stack.push((config.as_ref(), key.clone(), None)),
                OneOrMany::Many(configs) => {
                    for config in configs.iter().rev() {
                        stack.push((config, join_path(key, config.segment()), None));
                    }
                }
            }
        }

        while let Some((config, path, parent)) = stack.pop() {
            let index = nodes.len();
            for child in config.children().iter().rev() {
                stack.push((child, join_path(&path, child.segment()), Some(index)));
            }
            nodes.push(ProxyNode {
                path,
                parent,
                config: config.detached(),
            });
        }

        let tree = Self {
            nodes,
            namespace: None,
        };
        tree.check_unique_paths()?;
        tree.check_global_aliases()?;
        log::debug!("Proxy tree built with {} nodes.", tree.nodes.len());
        Ok(tree)
    }

    /// Scopes short-identifier resolution to the given path prefix.
    pub fn in_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace
            .map(|ns| ns.trim().trim_matches(PATH_SEPARATOR).to_string())
            .filter(|ns| !ns.is_empty());
        self
    }

    /// The active namespace, normalized without surrounding separators.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Every externally addressable identifier (full paths and global aliases), in document order.
    pub fn get_ids(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.nodes
            .iter()
            .flat_map(|node| {
                std::iter::once(node.path.as_str()).chain(node.config.global_alias.as_deref())
            })
            .filter(|id| seen.insert(*id))
            .map(str::to_string)
            .collect()
    }

    /// Resolves `id` into the ordered ancestor chain, root first.
    pub fn get_branch(&self, id: &str) -> ResolutionResult<ProxyChain> {
        let index = self.find(id)?;
        self.branch_of(index, id)
    }

    // --- Resolution ---

    /// Precedence: global alias, full path, namespace-relative path, then segment suffix.
    fn find(&self, id: &str) -> ResolutionResult<usize> {
        let id = id.trim().trim_matches(PATH_SEPARATOR);
        if id.is_empty() {
            return Err(self.unknown(id));
        }

        if let Some(index) = self
            .nodes
            .iter()
            .position(|node| node.config.global_alias.as_deref() == Some(id))
        {
            log::debug!("'{}' resolved as a global alias.", id);
            return Ok(index);
        }

        if let Some(index) = self.single_match(id, |node| node.path == id)? {
            log::debug!("'{}' resolved as a full path.", id);
            return Ok(index);
        }

        if let Some(namespace) = &self.namespace {
            let scoped = join_path(namespace, id);
            if let Some(index) = self.single_match(id, |node| node.path == scoped)? {
                log::debug!("'{}' resolved inside namespace '{}'.", id, namespace);
                return Ok(index);
            }
        }

        let suffix = format!("{PATH_SEPARATOR}{id}");
        if let Some(index) = self.single_match(id, |node| {
            self.in_active_namespace(node) && node.path.ends_with(&suffix)
        })? {
            log::debug!("'{}' resolved as a path suffix.", id);
            return Ok(index);
        }

        Err(self.unknown(id))
    }

    fn single_match(
        &self,
        id: &str,
        predicate: impl Fn(&ProxyNode) -> bool,
    ) -> ResolutionResult<Option<usize>> {
        let hits: Vec<usize> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| predicate(node))
            .map(|(index, _)| index)
            .collect();

        match hits.as_slice() {
            [] => Ok(None),
            [index] => Ok(Some(*index)),
            _ => {
                let mut candidates: Vec<String> = hits
                    .iter()
                    .filter_map(|index| self.nodes.get(*index))
                    .map(|node| node.path.clone())
                    .collect();
                candidates.sort();
                Err(ResolutionError::AmbiguousIdentifier {
                    id: id.to_string(),
                    candidates,
                })
            }
        }
    }

    fn in_active_namespace(&self, node: &ProxyNode) -> bool {
        match &self.namespace {
            None => true,
            Some(namespace) => {
                node.path == *namespace
                    || node
                        .path
                        .strip_prefix(namespace.as_str())
                        .is_some_and(|rest| rest.starts_with(PATH_SEPARATOR))
            }
        }
    }

    fn branch_of(&self, index: usize, id: &str) -> ResolutionResult<ProxyChain> {
        let mut hops = Vec::new();
        let mut cursor = Some(index);
        while let Some(current) = cursor {
            let node = self.nodes.get(current).ok_or_else(|| self.unknown(id))?;
            hops.push(ChainHop {
                path: node.path.clone(),
                config: node.config.clone(),
            });
            cursor = node.parent;
        }

        // Collected leaf first.
        let mut hops = hops.into_iter();
        let leaf = hops.next().ok_or_else(|| self.unknown(id))?;
        let mut transit: Vec<ChainHop> = hops.collect();
        transit.reverse();
        Ok(ProxyChain::new(transit, leaf))
    }

    fn unknown(&self, id: &str) -> ResolutionError {
        ResolutionError::UnknownIdentifier {
            id: id.to_string(),
            known: self.get_ids(),
        }
    }

    fn check_unique_paths(&self) -> ResolutionResult<()> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for node in &self.nodes {
            *counts.entry(node.path.as_str()).or_default() += 1;
        }
        match self
            .nodes
            .iter()
            .map(|node| node.path.as_str())
            .find(|path| counts.get(path).is_some_and(|count| *count > 1))
        {
            Some(path) => Err(ResolutionError::DuplicatePath {
                path: path.to_string(),
                count: counts.get(path).copied().unwrap_or_default(),
            }),
            None => Ok(()),
        }
    }

    fn check_global_aliases(&self) -> ResolutionResult<()> {
        let mut owners: HashMap<&str, &str> = HashMap::new();
        for node in &self.nodes {
            let Some(alias) = node.config.global_alias.as_deref() else {
                continue;
            };
            if let Some(first) = owners.insert(alias, node.path.as_str()) {
                return Err(ResolutionError::DuplicateGlobalAlias {
                    alias: alias.to_string(),
                    first: first.to_string(),
                    second: node.path.clone(),
                });
            }
        }
        Ok(())
    }
}

fn join_path(parent: &str, segment: &str) -> String {
    format!("{parent}{PATH_SEPARATOR}{segment}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config_loader::parse_document;

    fn mongo() -> ProxyConfig {
        ProxyConfig::new("mongo").with_field("uri", "mongo://example")
    }

    /// prod (ssh) -> web (docker) -> mongo, stage (ssh) -> web (docker) -> mongo,
    /// plus an array entry `boxes` with two alternatives.
    fn sample_document() -> ConfigDocument {
        let prod = ProxyConfig::new("ssh")
            .with_field("sshAlias", "prod-host")
            .with_children(vec![
                ProxyConfig::new("docker")
                    .with_path_alias("web")
                    .with_field("image", "web:1")
                    .with_children(vec![mongo().with_global_alias("prod-db")]),
            ]);
        let stage = ProxyConfig::new("ssh")
            .with_field("sshAlias", "stage-host")
            .with_children(vec![
                ProxyConfig::new("docker")
                    .with_path_alias("web")
                    .with_field("image", "web:1")
                    .with_children(vec![mongo()]),
            ]);
        let boxes = vec![
            ProxyConfig::new("ssh").with_field("sshAlias", "a"),
            ProxyConfig::new("ssh")
                .with_path_alias("b")
                .with_field("sshAlias", "b"),
        ];

        ConfigDocument::default()
            .with_entry("prod", OneOrMany::One(Box::new(prod)))
            .with_entry("stage", OneOrMany::One(Box::new(stage)))
            .with_entry("boxes", OneOrMany::Many(boxes))
    }

    #[test]
    fn test_ids_are_paths_and_global_aliases_in_document_order() {
        let tree = ProxyTree::new(&sample_document()).unwrap();
        assert_eq!(
            tree.get_ids(),
            [
                "prod",
                "prod/web",
                "prod/web/mongo",
                "prod-db",
                "stage",
                "stage/web",
                "stage/web/mongo",
                "boxes/ssh",
                "boxes/b",
            ]
        );
    }

    #[test]
    fn test_every_id_resolves_to_a_root_first_branch_ending_at_it() {
        let tree = ProxyTree::new(&sample_document()).unwrap();
        for id in tree.get_ids() {
            let chain = tree.get_branch(&id).unwrap();
            let leaf = chain.leaf();
            assert!(
                leaf.path == id || leaf.config.global_alias.as_deref() == Some(id.as_str()),
                "branch for '{}' ended at '{}'",
                id,
                leaf.path
            );
            // Root first: each hop's path is a prefix of the next one.
            let paths = chain.paths();
            for pair in paths.windows(2) {
                assert!(pair[1].starts_with(&format!("{}/", pair[0])));
            }
        }
    }

    #[test]
    fn test_branch_contains_all_ancestors() {
        let tree = ProxyTree::new(&sample_document()).unwrap();
        let chain = tree.get_branch("prod/web/mongo").unwrap();
        assert_eq!(chain.paths(), ["prod", "prod/web", "prod/web/mongo"]);
        assert_eq!(chain.len(), 3);
        assert!(chain.leaf().config.children().is_empty());
    }

    #[test]
    fn test_global_alias_wins_over_paths() {
        let doc = ConfigDocument::default()
            .with_entry(
                "db",
                OneOrMany::One(Box::new(mongo())),
            )
            .with_entry(
                "other",
                OneOrMany::One(Box::new(mongo().with_global_alias("db"))),
            );
        let tree = ProxyTree::new(&doc).unwrap();
        let chain = tree.get_branch("db").unwrap();
        assert_eq!(chain.leaf().path, "other");
    }

    #[test]
    fn test_short_alias_shared_by_two_paths_is_ambiguous() {
        let tree = ProxyTree::new(&sample_document()).unwrap();
        let err = tree.get_branch("web/mongo").unwrap_err();
        match err {
            ResolutionError::AmbiguousIdentifier { id, candidates } => {
                assert_eq!(id, "web/mongo");
                assert_eq!(candidates, ["prod/web/mongo", "stage/web/mongo"]);
            }
            other => panic!("expected ambiguity, got {other:?}"),
        }
    }

    #[test]
    fn test_namespace_disambiguates_short_alias() {
        let tree = ProxyTree::new(&sample_document())
            .unwrap()
            .in_namespace(Some("stage/".to_string()));
        let chain = tree.get_branch("mongo").unwrap();
        assert_eq!(chain.leaf().path, "stage/web/mongo");

        // Namespace-relative exact path.
        let chain = tree.get_branch("web").unwrap();
        assert_eq!(chain.leaf().path, "stage/web");
    }

    #[test]
    fn test_suffix_match_respects_segment_boundaries() {
        let doc = ConfigDocument::default()
            .with_entry(
                "a",
                OneOrMany::One(Box::new(
                    ProxyConfig::new("ssh")
                        .with_field("sshAlias", "a")
                        .with_children(vec![ProxyConfig::new("screen").with_path_alias("xmongo")]),
                )),
            )
            .with_entry("b", OneOrMany::One(Box::new(mongo())));
        let tree = ProxyTree::new(&doc).unwrap();

        // `a/xmongo` must not be a candidate for `mongo`.
        assert!(matches!(
            tree.get_branch("mongo"),
            Err(ResolutionError::UnknownIdentifier { .. })
        ));
        assert_eq!(tree.get_branch("xmongo").unwrap().leaf().path, "a/xmongo");
    }

    #[test]
    fn test_unknown_identifier_lists_known_ids() {
        let tree = ProxyTree::new(&sample_document()).unwrap();
        match tree.get_branch("nope").unwrap_err() {
            ResolutionError::UnknownIdentifier { id, known } => {
                assert_eq!(id, "nope");
                assert_eq!(known, tree.get_ids());
            }
            other => panic!("expected unknown identifier, got {other:?}"),
        }
        assert!(tree.get_branch("   ").is_err());
    }

    #[test]
    fn test_duplicate_global_alias_is_rejected() {
        let doc = ConfigDocument::default()
            .with_entry("a", OneOrMany::One(Box::new(mongo().with_global_alias("db"))))
            .with_entry("b", OneOrMany::One(Box::new(mongo().with_global_alias("db"))));
        assert!(matches!(
            ProxyTree::new(&doc),
            Err(ResolutionError::DuplicateGlobalAlias { .. })
        ));
    }

    #[test]
    fn test_siblings_sharing_a_segment_are_rejected() {
        let doc = ConfigDocument::default().with_entry(
            "host",
            OneOrMany::One(Box::new(ProxyConfig::new("ssh").with_children(vec![
                ProxyConfig::new("docker").with_field("image", "a"),
                ProxyConfig::new("docker").with_field("image", "b"),
            ]))),
        );
        match ProxyTree::new(&doc).unwrap_err() {
            ResolutionError::DuplicatePath { path, count } => {
                assert_eq!(path, "host/docker");
                assert_eq!(count, 2);
            }
            other => panic!("expected a duplicate path, got {other:?}"),
        }
    }

    #[test]
    fn test_array_alternatives_without_path_alias_are_rejected() {
        let document = parse_document(
            r#"{"boxes": [{"kind": "ssh", "sshAlias": "a"}, {"kind": "ssh", "sshAlias": "b"}]}"#,
            "inline",
        )
        .unwrap();
        assert!(matches!(
            ProxyTree::new(&document),
            Err(ResolutionError::DuplicatePath { ref path, .. }) if path == "boxes/ssh"
        ));

        let document = parse_document(
            r#"{"boxes": [{"kind": "ssh", "sshAlias": "a"},
                          {"kind": "ssh", "pathAlias": "b", "sshAlias": "b"}]}"#,
            "inline",
        )
        .unwrap();
        let tree = ProxyTree::new(&document).unwrap();
        for id in tree.get_ids() {
            assert!(tree.get_branch(&id).is_ok(), "listed id '{}' does not resolve", id);
        }
    }

    #[test]
    fn test_ambiguity_inside_namespace_lists_only_scoped_candidates() {
        let lab = ProxyConfig::new("ssh")
            .with_field("sshAlias", "lab")
            .with_children(vec![
                ProxyConfig::new("docker")
                    .with_path_alias("a")
                    .with_field("image", "a")
                    .with_children(vec![mongo()]),
                ProxyConfig::new("docker")
                    .with_path_alias("b")
                    .with_field("image", "b")
                    .with_children(vec![mongo()]),
            ]);
        let doc = ConfigDocument::default()
            .with_entry("lab", OneOrMany::One(Box::new(lab)))
            .with_entry("other", OneOrMany::One(Box::new(mongo())));
        let tree = ProxyTree::new(&doc)
            .unwrap()
            .in_namespace(Some(" /lab/ ".to_string()));
        assert_eq!(tree.namespace(), Some("lab"));

        match tree.get_branch("mongo").unwrap_err() {
            ResolutionError::AmbiguousIdentifier { id, candidates } => {
                assert_eq!(id, "mongo");
                assert_eq!(candidates, ["lab/a/mongo", "lab/b/mongo"]);
            }
            other => panic!("expected ambiguity, got {other:?}"),
        }
        assert_eq!(tree.get_branch("b/mongo").unwrap().leaf().path, "lab/b/mongo");
    }
}
