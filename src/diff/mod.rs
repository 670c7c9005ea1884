//! # Diff Classification
//!
//! Classifies one live interaction against a base specification (approved or
//! provided). Exactly one [`ApiDiff`] is produced per diffed interaction:
//! an unknown path or method is a shadow diff, a content mismatch is a
//! general diff (or a zombie diff when the stored operation is deprecated),
//! and an exact structural match is no diff at all. Lookup misses are
//! classified outcomes, never errors.

use std::collections::BTreeMap;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::domain::{Method, Operation, PathItem};
use crate::telemetry::Interaction;
use crate::trie::PathTrie;

/// Status-code key always kept when restricting stored responses for
/// comparison.
const DEFAULT_RESPONSE_KEY: &str = "default";

/// Terminal classification of one diffed interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiffClass {
    /// The interaction matches the base spec exactly.
    NoDiff,
    /// Path or operation absent from the base spec: entirely new behavior.
    ShadowDiff,
    /// Path and operation exist but content differs.
    GeneralDiff,
    /// Content differs and the stored operation is deprecated: traffic is
    /// still hitting something that should no longer be used.
    ZombieDiff,
}

/// The classified result of diffing one interaction
#[derive(Debug, Clone, Serialize)]
pub struct ApiDiff {
    pub classification: DiffClass,
    /// The matched template, or the concrete path when nothing matched.
    pub path: String,
    /// Identifier of the matched path in the base spec, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_id: Option<String>,
    /// The stored path item, when one existed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original: Option<PathItem>,
    /// The stored path item with the observed operation applied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<PathItem>,
    /// Deterministic identifier derived from the interaction's request id,
    /// so duplicate reports for the same interaction are recognizable.
    pub interaction_id: String,
    pub spec_id: String,
}

/// Derive the deterministic diff identifier for an interaction
pub fn interaction_diff_id(request_id: &str) -> String {
    hex::encode(Sha256::digest(request_id.as_bytes()))
}

/// The base specification side of a diff
#[derive(Debug)]
pub struct DiffSource<'s> {
    pub paths: &'s BTreeMap<String, PathItem>,
    pub trie: &'s PathTrie<String>,
    /// Non-root server base path of a provided spec; empty for approved
    /// specs.
    pub base_path: &'s str,
}

/// Classify one interaction against a base spec. `fresh` is the operation
/// regenerated from the live interaction.
pub fn diff_interaction(
    source: &DiffSource<'_>,
    interaction: &Interaction,
    method: Method,
    fresh: Operation,
    spec_id: &str,
) -> ApiDiff {
    let interaction_id = interaction_diff_id(&interaction.request_id);
    let concrete_path = interaction.request_path();
    let lookup_path = strip_base_path(concrete_path, source.base_path);

    let matched = lookup_path
        .and_then(|path| source.trie.get_path_and_value(path))
        .map(|(template, path_id)| (template.to_string(), path_id.clone()));

    let Some((template, path_id)) = matched else {
        // Nothing to compare against: a synthetic path item built purely
        // from the freshly inferred operation.
        return ApiDiff {
            classification: DiffClass::ShadowDiff,
            path: concrete_path.to_string(),
            path_id: None,
            original: None,
            modified: Some(PathItem::with_operation(method, fresh)),
            interaction_id,
            spec_id: spec_id.to_string(),
        };
    };

    let display_path = format!("{}{}", source.base_path, template);
    let Some(stored_item) = source.paths.get(&template) else {
        return ApiDiff {
            classification: DiffClass::ShadowDiff,
            path: display_path,
            path_id: Some(path_id),
            original: None,
            modified: Some(PathItem::with_operation(method, fresh)),
            interaction_id,
            spec_id: spec_id.to_string(),
        };
    };

    let Some(stored_operation) = stored_item.operation(method) else {
        // The path exists but this method was never specified.
        let mut modified = stored_item.clone();
        modified.insert_operation(method, fresh);
        return ApiDiff {
            classification: DiffClass::ShadowDiff,
            path: display_path,
            path_id: Some(path_id),
            original: Some(stored_item.clone()),
            modified: Some(modified),
            interaction_id,
            spec_id: spec_id.to_string(),
        };
    };

    let observed_status = interaction.response.status_code.to_string();
    let canonical_stored = canonicalize_stored(stored_operation, &observed_status);
    let canonical_fresh = canonicalize_fresh(fresh.clone());

    if canonical_stored == canonical_fresh {
        return ApiDiff {
            classification: DiffClass::NoDiff,
            path: display_path,
            path_id: Some(path_id),
            original: None,
            modified: None,
            interaction_id,
            spec_id: spec_id.to_string(),
        };
    }

    let classification = if stored_operation.deprecated {
        DiffClass::ZombieDiff
    } else {
        DiffClass::GeneralDiff
    };
    let mut modified = stored_item.clone();
    modified.insert_operation(method, fresh);

    ApiDiff {
        classification,
        path: display_path,
        path_id: Some(path_id),
        original: Some(stored_item.clone()),
        modified: Some(modified),
        interaction_id,
        spec_id: spec_id.to_string(),
    }
}

/// Strip a provided spec's base path before trie lookup. A path outside the
/// base path cannot match the spec.
fn strip_base_path<'p>(path: &'p str, base_path: &str) -> Option<&'p str> {
    if base_path.is_empty() {
        return Some(path);
    }
    match path.strip_prefix(base_path) {
        Some("") => Some("/"),
        Some(rest) if rest.starts_with('/') => Some(rest),
        _ => None,
    }
}

/// Canonicalize the stored operation for comparison: sort parameters and
/// restrict responses to the observed status code plus any `default`
/// response — comparing against status codes the interaction never hit
/// would always show a diff.
fn canonicalize_stored(operation: &Operation, observed_status: &str) -> Operation {
    let mut canonical = operation.clone();
    canonical.sort_parameters();
    canonical
        .responses
        .retain(|status, _| status == observed_status || status == DEFAULT_RESPONSE_KEY);
    canonical.deprecated = false;
    canonical
}

fn canonicalize_fresh(mut operation: Operation) -> Operation {
    operation.sort_parameters();
    operation.deprecated = false;
    operation
}
