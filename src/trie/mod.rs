//! # Parameterized Path Trie
//!
//! A segment-indexed tree mapping path templates (with `{param}` wildcard
//! segments) to an opaque value. Lookup of a concrete path collects every
//! template that matches it and picks the most specific one: an exact literal
//! match wins outright, otherwise the template traversing the fewest
//! parameter segments wins. HTTP paths are genuinely ambiguous once
//! parameterized (`/api/{p1}/items` and `/api/{p1}/{p2}` both match
//! `/api/1/items`); the fewest-wildcards rule matches common router
//! semantics.

use std::collections::BTreeMap;

const PATH_SEPARATOR: char = '/';

/// Check whether a template segment is a `{param}` wildcard
fn is_param_segment(segment: &str) -> bool {
    segment.len() > 2 && segment.starts_with('{') && segment.ends_with('}')
}

fn split_segments(path: &str) -> Vec<&str> {
    path.split(PATH_SEPARATOR).filter(|segment| !segment.is_empty()).collect()
}

#[derive(Debug, Clone)]
struct TrieNode<V> {
    segment: String,
    /// Uniquely identifies the node: the template joined from the root.
    full_path: String,
    /// Number of parameter segments between the root and this node.
    param_count: usize,
    /// Only terminal nodes of inserted paths carry a value.
    value: Option<V>,
    children: BTreeMap<String, TrieNode<V>>,
}

impl<V> TrieNode<V> {
    fn new(segment: &str, full_path: String, param_count: usize) -> Self {
        Self {
            segment: segment.to_string(),
            full_path,
            param_count,
            value: None,
            children: BTreeMap::new(),
        }
    }
}

/// Trie over parameterized path templates.
#[derive(Debug, Clone)]
pub struct PathTrie<V> {
    root: TrieNode<V>,
}

impl<V> Default for PathTrie<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> PathTrie<V> {
    pub fn new() -> Self {
        Self { root: TrieNode::new("", String::new(), 0) }
    }

    /// Insert a template, overwriting any value already stored under it.
    /// Returns whether a new node was created (as opposed to a value update
    /// of an existing terminal node).
    pub fn insert(&mut self, path: &str, value: V) -> bool {
        self.insert_merge(path, value, |_, new| new)
    }

    /// Insert a template, combining with any existing value via `merge`.
    pub fn insert_merge(
        &mut self,
        path: &str,
        value: V,
        merge: impl FnOnce(&V, V) -> V,
    ) -> bool {
        let segments = split_segments(path);
        let mut created = false;
        let mut node = &mut self.root;
        let mut params = 0;

        for segment in segments {
            if is_param_segment(segment) {
                params += 1;
            }
            let prefix = node.full_path.clone();
            let param_count = params;
            node = node.children.entry(segment.to_string()).or_insert_with(|| {
                created = true;
                TrieNode::new(segment, format!("{}/{}", prefix, segment), param_count)
            });
        }

        node.value = Some(match node.value.take() {
            Some(existing) => merge(&existing, value),
            None => value,
        });
        created
    }

    /// Resolve a concrete path to the value of the most specific matching
    /// template.
    pub fn get_value(&self, path: &str) -> Option<&V> {
        self.get_node(path).and_then(|node| node.value.as_ref())
    }

    /// Resolve a concrete path to the matching template and its value.
    pub fn get_path_and_value(&self, path: &str) -> Option<(&str, &V)> {
        self.get_node(path)
            .and_then(|node| node.value.as_ref().map(|value| (node.full_path.as_str(), value)))
    }

    fn get_node(&self, path: &str) -> Option<&TrieNode<V>> {
        let segments = split_segments(path);
        let mut matches = Vec::new();
        collect_matches(&self.root, &segments, &mut matches);

        // An exact literal match (no wildcards traversed) wins outright;
        // otherwise the fewest parameter segments. `min_by_key` keeps the
        // first of equals, and collection order is deterministic.
        matches.into_iter().min_by_key(|node| node.param_count)
    }
}

fn collect_matches<'t, V>(
    node: &'t TrieNode<V>,
    segments: &[&str],
    matches: &mut Vec<&'t TrieNode<V>>,
) {
    let Some((segment, rest)) = segments.split_first() else {
        if node.value.is_some() {
            matches.push(node);
        }
        return;
    };

    if let Some(child) = node.children.get(*segment) {
        collect_matches(child, rest, matches);
    }
    for child in node.children.values() {
        if is_param_segment(&child.segment) && child.segment != *segment {
            collect_matches(child, rest, matches);
        }
    }
}
