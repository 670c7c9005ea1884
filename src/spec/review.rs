//! Review and approval workflow.
//!
//! A suggested review proposes groupings of concrete learned paths under
//! parameterized templates (`/users/123` and `/users/456` under
//! `/users/{userId}`). Operators may edit the grouping before approving it.
//! Approval folds each group's learned path items into one approved entry
//! via the merger, synthesizes path-level parameters, and removes the
//! members from the learning spec. The whole approval is transactional: it
//! operates on a deep copy of the state and only swaps it in once the new
//! approved document regenerates and validates.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::PathNormalizationConfig;
use crate::domain::{Parameter, ParameterLocation, PathItem, Schema};
use crate::inference::value::infer_string;
use crate::merge::{merge_path_items, merge_schemas};
use crate::openapi::export;
use crate::{Error, Result};

use super::Spec;

/// A proposed grouping of concrete learned paths under one parameterized
/// template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewPathItem {
    /// The parameterized template the group is filed under.
    pub suggested_path: String,
    /// The concrete learning-spec paths folded into the template.
    pub member_paths: BTreeSet<String>,
}

/// The engine's proposal for the operator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuggestedSpecReview {
    pub path_items: Vec<ReviewPathItem>,
}

/// The operator's (possibly edited) decision
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApprovedSpecReview {
    pub path_items: Vec<ReviewPathItem>,
}

impl From<SuggestedSpecReview> for ApprovedSpecReview {
    fn from(review: SuggestedSpecReview) -> Self {
        Self { path_items: review.path_items }
    }
}

impl Spec {
    /// Propose a review grouping the current learning-spec paths under
    /// parameterized templates.
    pub fn create_suggested_review(&self) -> SuggestedSpecReview {
        let state = self.lock_state();
        let mut groups: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for path in state.learning.keys() {
            let template = parameterize_path(path, &self.config.normalization);
            groups.entry(template).or_default().insert(path.clone());
        }

        SuggestedSpecReview {
            path_items: groups
                .into_iter()
                .map(|(suggested_path, member_paths)| ReviewPathItem { suggested_path, member_paths })
                .collect(),
        }
    }

    /// Apply an approved review, promoting learned operations into the
    /// approved spec. A failure at any step — unknown member path, document
    /// regeneration, meta-schema validation — leaves the original state
    /// untouched.
    #[instrument(skip(self, review), fields(address = %self.address()))]
    pub fn apply_approved_review(&self, review: &ApprovedSpecReview) -> Result<()> {
        let mut state = self.lock_state();
        let mut staged = state.clone();

        for item in &review.path_items {
            if item.member_paths.is_empty() {
                return Err(Error::validation(format!(
                    "review item '{}' has no member paths",
                    item.suggested_path
                )));
            }

            let mut merged: Option<PathItem> = None;
            for member in &item.member_paths {
                let learned = staged
                    .learning
                    .get(member)
                    .ok_or_else(|| Error::not_found("learned path", member.clone()))?;
                merged = Some(match merged {
                    None => learned.clone(),
                    Some(current) => {
                        let (combined, conflicts) =
                            merge_path_items(&current, learned, &item.suggested_path);
                        for conflict in &conflicts {
                            warn!(
                                path = %conflict.path,
                                message = %conflict.message,
                                "merge conflict while approving; keeping the first-seen value"
                            );
                        }
                        combined
                    }
                });
            }

            let mut approved_item = merged.unwrap_or_default();
            approved_item.parameters =
                build_path_parameters(&item.suggested_path, &item.member_paths);

            let path_id = Uuid::new_v4().to_string();
            staged.approved.insert(item.suggested_path.clone(), approved_item);
            staged.approved_ids.insert(item.suggested_path.clone(), path_id.clone());
            staged.approved_trie.insert(&item.suggested_path, path_id);
            for member in &item.member_paths {
                staged.learning.remove(member);
            }
        }

        // The approval only commits if the resulting document validates.
        export::generate_document(
            self.host(),
            self.port(),
            &staged.approved,
            &staged.security_schemes,
        )?;

        info!(
            approved_paths = review.path_items.len(),
            remaining_learning_paths = staged.learning.len(),
            "approved review applied"
        );
        *state = staged;
        Ok(())
    }
}

/// Infer schemas for the `{param}` segments of a template from the concrete
/// segment values observed across the group's member paths.
fn build_path_parameters(template: &str, members: &BTreeSet<String>) -> Vec<Parameter> {
    let template_segments: Vec<&str> = template.split('/').collect();
    let mut parameters = Vec::new();

    for (index, segment) in template_segments.iter().enumerate() {
        let Some(name) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) else {
            continue;
        };

        let mut schema: Option<Schema> = None;
        for member in members {
            let member_segments: Vec<&str> = member.split('/').collect();
            let Some(value) = member_segments.get(index) else {
                continue;
            };
            let observed = infer_string(value);
            schema = Some(match schema {
                None => observed,
                Some(current) => merge_schemas(&current, &observed, name).0,
            });
        }

        parameters.push(Parameter::new(
            name,
            ParameterLocation::Path,
            schema.unwrap_or_else(Schema::plain_string),
        ));
    }

    parameters
}

/// Segment classes that may be parameterized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmentClass {
    NumericId,
    Uuid,
    AlphanumericCode,
    Date,
    Timestamp,
}

impl SegmentClass {
    fn placeholder(&self) -> &'static str {
        match self {
            SegmentClass::NumericId | SegmentClass::Uuid => "id",
            SegmentClass::AlphanumericCode => "code",
            SegmentClass::Date => "date",
            SegmentClass::Timestamp => "timestamp",
        }
    }

    fn suffix(&self) -> &'static str {
        match self {
            SegmentClass::NumericId | SegmentClass::Uuid => "Id",
            SegmentClass::AlphanumericCode => "Code",
            SegmentClass::Date => "Date",
            SegmentClass::Timestamp => "Timestamp",
        }
    }
}

struct SegmentPatterns {
    uuid: Regex,
    numeric_id: Regex,
    alphanumeric_code: Regex,
    date: Regex,
    timestamp: Regex,
}

fn segment_patterns() -> &'static SegmentPatterns {
    static PATTERNS: OnceLock<SegmentPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| SegmentPatterns {
        uuid: Regex::new(
            r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$",
        )
        .expect("UUID regex compilation failed"),
        numeric_id: Regex::new(r"^\d+$").expect("numeric id regex compilation failed"),
        alphanumeric_code: Regex::new(r"^[a-zA-Z0-9]{2,}$")
            .expect("alphanumeric code regex compilation failed"),
        date: Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date regex compilation failed"),
        timestamp: Regex::new(r"^\d{10,}$").expect("timestamp regex compilation failed"),
    })
}

/// Segments that look like common literals are never parameterized.
fn is_common_literal(segment: &str) -> bool {
    // Version-ish segments: v1, v2.1, ...
    if segment.starts_with('v') && segment.len() <= 5 {
        let rest = &segment[1..];
        if !rest.is_empty() && rest.chars().all(|c| c.is_numeric() || c == '.') {
            return true;
        }
    }

    // Short hyphenated identifiers ("team-1", "proj-2") stay literal, but
    // date-shaped segments are left for the date pattern.
    if segment.contains('-') && segment.len() <= 10 {
        let parts: Vec<&str> = segment.split('-').collect();
        if parts.len() == 3 && parts.iter().all(|p| !p.is_empty() && p.chars().all(char::is_numeric))
        {
            return false;
        }
        return true;
    }

    let keywords = ["api", "admin", "public", "private"];
    keywords.contains(&segment)
}

fn classify_segment(segment: &str, config: &PathNormalizationConfig) -> Option<SegmentClass> {
    if segment.len() < config.min_param_length || segment.len() > config.max_param_length {
        return None;
    }
    if is_common_literal(segment) {
        return None;
    }

    let patterns = segment_patterns();
    if patterns.uuid.is_match(segment) {
        return Some(SegmentClass::Uuid);
    }
    if patterns.date.is_match(segment) {
        return Some(SegmentClass::Date);
    }
    if patterns.timestamp.is_match(segment) {
        return Some(SegmentClass::Timestamp);
    }
    if segment.len() >= 5 && patterns.alphanumeric_code.is_match(segment) {
        let has_letter = segment.chars().any(|c| c.is_alphabetic());
        let has_digit = segment.chars().any(|c| c.is_numeric());
        if has_letter && has_digit {
            return Some(SegmentClass::AlphanumericCode);
        }
    }
    if patterns.numeric_id.is_match(segment) {
        return Some(SegmentClass::NumericId);
    }
    None
}

/// Contextual parameter name from the preceding literal segment
/// (`/users/123` -> `userId`).
fn parameter_name(class: SegmentClass, previous: Option<&str>) -> String {
    match previous {
        Some(prev) => {
            let singular =
                if prev.ends_with('s') && prev.len() > 1 { &prev[..prev.len() - 1] } else { prev };
            format!("{}{}", singular, class.suffix())
        }
        None => class.placeholder().to_string(),
    }
}

/// Rewrite a concrete path into a parameterized template by classifying its
/// segments.
pub fn parameterize_path(path: &str, config: &PathNormalizationConfig) -> String {
    if !config.enabled {
        return path.to_string();
    }

    let mut template = Vec::new();
    let mut previous: Option<&str> = None;
    let mut used_names: BTreeSet<String> = BTreeSet::new();

    for segment in path.split('/') {
        if segment.is_empty() {
            template.push(segment.to_string());
            continue;
        }

        match classify_segment(segment, config) {
            Some(class) => {
                let mut name = parameter_name(class, previous);
                // Repeated context yields a repeated name; disambiguate.
                let mut suffix = 1;
                while used_names.contains(&name) {
                    name = format!("{}{}", parameter_name(class, previous), suffix);
                    suffix += 1;
                }
                used_names.insert(name.clone());
                template.push(format!("{{{}}}", name));
            }
            None => {
                template.push(segment.to_string());
                previous = Some(segment);
            }
        }
    }

    template.join("/")
}
