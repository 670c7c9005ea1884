//! # Operation and Schema Merging
//!
//! Combines two independently inferred operations (or schemas, parameter
//! sets, responses) into one. Merging never fails: type mismatches that
//! cannot be resolved by the preference policy are accumulated into a
//! [`Conflict`] list and the first operand's value survives.
//!
//! The absence rule applies uniformly at every level: when one side is
//! empty, the other side is returned unchanged with no conflict.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::{
    MediaTypeObject, Operation, Parameter, ParameterLocation, PathItem, RequestBody, Response,
    ResponseHeader, Schema, SecurityRequirement,
};

/// One unresolved merge conflict. Reported alongside the merge result;
/// never a hard failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conflict {
    /// Structural pointer into the document (slash-separated).
    pub path: String,
    /// The first operand's value (the one that survived).
    pub first: String,
    /// The second operand's value.
    pub second: String,
    pub message: String,
}

impl Conflict {
    fn type_mismatch(path: &str, first: &Schema, second: &Schema) -> Self {
        Self {
            path: path.to_string(),
            first: render_schema(first),
            second: render_schema(second),
            message: format!(
                "type mismatch: {} vs {}",
                first.type_name(),
                second.type_name()
            ),
        }
    }
}

fn render_schema(schema: &Schema) -> String {
    serde_json::to_string(schema).unwrap_or_else(|_| schema.type_name().to_string())
}

fn child_path(path: &str, segment: &str) -> String {
    format!("{}/{}", path, segment)
}

/// Merge two schemas depth-first.
///
/// Type-conflict policy: equal types merge structurally; `string` is
/// preferred over any other type; `number` is preferred over `integer`;
/// any other mismatch is an unresolved conflict and the first operand
/// survives.
pub fn merge_schemas(first: &Schema, second: &Schema, path: &str) -> (Schema, Vec<Conflict>) {
    match (first, second) {
        (Schema::String(first_format), Schema::String(second_format)) => {
            // A format is a refinement that cannot be assumed when example
            // values disagree.
            let format = if first_format == second_format { *first_format } else { None };
            (Schema::String(format), Vec::new())
        }
        (Schema::String(format), _) | (_, Schema::String(format)) => {
            (Schema::String(*format), Vec::new())
        }
        (Schema::Number, Schema::Integer) | (Schema::Integer, Schema::Number) => {
            (Schema::Number, Vec::new())
        }
        (Schema::Array(first_items), Schema::Array(second_items)) => {
            let (items, conflicts) =
                merge_schemas(first_items, second_items, &child_path(path, "items"));
            (Schema::Array(Box::new(items)), conflicts)
        }
        (Schema::Object(first_props), Schema::Object(second_props)) => {
            let mut conflicts = Vec::new();
            let mut properties = first_props.clone();
            for (name, second_prop) in second_props {
                match properties.get(name) {
                    Some(first_prop) => {
                        let (merged, mut nested) =
                            merge_schemas(first_prop, second_prop, &child_path(path, name));
                        conflicts.append(&mut nested);
                        properties.insert(name.clone(), merged);
                    }
                    None => {
                        properties.insert(name.clone(), second_prop.clone());
                    }
                }
            }
            (Schema::Object(properties), conflicts)
        }
        (first, second) if first == second => (first.clone(), Vec::new()),
        (first, second) => {
            (first.clone(), vec![Conflict::type_mismatch(path, first, second)])
        }
    }
}

/// Merge two parameter lists: separately per location, then per name within
/// a location. Non-mutual parameters are kept as-is.
pub fn merge_parameters(
    first: &[Parameter],
    second: &[Parameter],
    path: &str,
) -> (Vec<Parameter>, Vec<Conflict>) {
    if first.is_empty() {
        return (second.to_vec(), Vec::new());
    }
    if second.is_empty() {
        return (first.to_vec(), Vec::new());
    }

    let mut merged: BTreeMap<(ParameterLocation, String), Parameter> = first
        .iter()
        .map(|parameter| ((parameter.location, parameter.name.clone()), parameter.clone()))
        .collect();
    let mut conflicts = Vec::new();

    for parameter in second {
        let key = (parameter.location, parameter.name.clone());
        match merged.get_mut(&key) {
            Some(existing) => {
                let schema_path = child_path(
                    &child_path(&child_path(path, "parameters"), parameter.location.as_str()),
                    &parameter.name,
                );
                let (schema, mut nested) =
                    merge_schemas(&existing.schema, &parameter.schema, &schema_path);
                conflicts.append(&mut nested);
                existing.schema = schema;
                existing.required = existing.required || parameter.required;
            }
            None => {
                merged.insert(key, parameter.clone());
            }
        }
    }

    (merged.into_values().collect(), conflicts)
}

fn merge_content(
    first: &BTreeMap<String, MediaTypeObject>,
    second: &BTreeMap<String, MediaTypeObject>,
    path: &str,
) -> (BTreeMap<String, MediaTypeObject>, Vec<Conflict>) {
    let mut merged = first.clone();
    let mut conflicts = Vec::new();

    for (media_type, second_media) in second {
        match merged.get_mut(media_type) {
            Some(first_media) => {
                let (schema, mut nested) = match (&first_media.schema, &second_media.schema) {
                    (Some(first_schema), Some(second_schema)) => {
                        let (schema, nested) = merge_schemas(
                            first_schema,
                            second_schema,
                            &child_path(path, media_type),
                        );
                        (Some(schema), nested)
                    }
                    (Some(schema), None) | (None, Some(schema)) => {
                        (Some(schema.clone()), Vec::new())
                    }
                    (None, None) => (None, Vec::new()),
                };
                conflicts.append(&mut nested);
                first_media.schema = schema;
            }
            None => {
                merged.insert(media_type.clone(), second_media.clone());
            }
        }
    }

    (merged, conflicts)
}

/// Merge two request bodies per media type.
pub fn merge_request_bodies(
    first: Option<&RequestBody>,
    second: Option<&RequestBody>,
    path: &str,
) -> (Option<RequestBody>, Vec<Conflict>) {
    match (first, second) {
        (None, None) => (None, Vec::new()),
        (Some(body), None) | (None, Some(body)) => (Some(body.clone()), Vec::new()),
        (Some(first), Some(second)) => {
            let (content, conflicts) = merge_content(
                &first.content,
                &second.content,
                &child_path(path, "requestBody"),
            );
            (Some(RequestBody { content }), conflicts)
        }
    }
}

fn merge_response_headers(
    first: &BTreeMap<String, ResponseHeader>,
    second: &BTreeMap<String, ResponseHeader>,
    path: &str,
) -> (BTreeMap<String, ResponseHeader>, Vec<Conflict>) {
    let mut merged = first.clone();
    let mut conflicts = Vec::new();

    for (name, second_header) in second {
        match merged.get_mut(name) {
            Some(first_header) => {
                let (schema, mut nested) = merge_schemas(
                    &first_header.schema,
                    &second_header.schema,
                    &child_path(path, name),
                );
                conflicts.append(&mut nested);
                first_header.schema = schema;
            }
            None => {
                merged.insert(name.clone(), second_header.clone());
            }
        }
    }

    (merged, conflicts)
}

/// Merge two response maps per status code.
pub fn merge_responses(
    first: &BTreeMap<String, Response>,
    second: &BTreeMap<String, Response>,
    path: &str,
) -> (BTreeMap<String, Response>, Vec<Conflict>) {
    if first.is_empty() {
        return (second.clone(), Vec::new());
    }
    if second.is_empty() {
        return (first.clone(), Vec::new());
    }

    let mut merged = first.clone();
    let mut conflicts = Vec::new();

    for (status, second_response) in second {
        let status_path = child_path(&child_path(path, "responses"), status);
        match merged.get_mut(status) {
            Some(first_response) => {
                let (content, mut content_conflicts) = merge_content(
                    &first_response.content,
                    &second_response.content,
                    &status_path,
                );
                conflicts.append(&mut content_conflicts);

                let (headers, mut header_conflicts) = merge_response_headers(
                    &first_response.headers,
                    &second_response.headers,
                    &child_path(&status_path, "headers"),
                );
                conflicts.append(&mut header_conflicts);

                first_response.content = content;
                first_response.headers = headers;
            }
            None => {
                merged.insert(status.clone(), second_response.clone());
            }
        }
    }

    (merged, conflicts)
}

/// Merge security requirement lists.
///
/// Requirement objects are treated as logical OR alternatives, merged by
/// scheme name with the first-seen requirement kept for a given name.
/// AND-combinations supplied on either side are deliberately flattened into
/// separate OR-alternatives in the output.
pub fn merge_security(
    first: &[SecurityRequirement],
    second: &[SecurityRequirement],
) -> Vec<SecurityRequirement> {
    let mut merged = Vec::new();
    let mut seen: Vec<String> = Vec::new();

    for requirement in first.iter().chain(second.iter()) {
        for (scheme, scopes) in &requirement.0 {
            if seen.iter().any(|name| name == scheme) {
                continue;
            }
            seen.push(scheme.clone());
            merged.push(SecurityRequirement::single(scheme.clone(), scopes.clone()));
        }
    }

    merged
}

/// Merge two operations depth-first, accumulating every nested conflict with
/// a fully qualified path.
pub fn merge_operations(
    first: &Operation,
    second: &Operation,
    path: &str,
) -> (Operation, Vec<Conflict>) {
    let mut conflicts = Vec::new();

    let (parameters, mut nested) = merge_parameters(&first.parameters, &second.parameters, path);
    conflicts.append(&mut nested);

    let (request_body, mut nested) =
        merge_request_bodies(first.request_body.as_ref(), second.request_body.as_ref(), path);
    conflicts.append(&mut nested);

    let (responses, mut nested) = merge_responses(&first.responses, &second.responses, path);
    conflicts.append(&mut nested);

    let operation = Operation {
        parameters,
        request_body,
        responses,
        security: merge_security(&first.security, &second.security),
        deprecated: first.deprecated || second.deprecated,
    };

    (operation, conflicts)
}

/// Merge two path items: operations per method, plus path-level parameters.
/// This is the algorithm the approval workflow uses to fold multiple
/// concrete paths sharing a parameterized template into one approved entry.
pub fn merge_path_items(
    first: &PathItem,
    second: &PathItem,
    path: &str,
) -> (PathItem, Vec<Conflict>) {
    let mut conflicts = Vec::new();
    let mut operations = first.operations.clone();

    for (method, second_operation) in &second.operations {
        match operations.get(method) {
            Some(first_operation) => {
                let (merged, mut nested) = merge_operations(
                    first_operation,
                    second_operation,
                    &child_path(path, method.as_str()),
                );
                conflicts.append(&mut nested);
                operations.insert(*method, merged);
            }
            None => {
                operations.insert(*method, second_operation.clone());
            }
        }
    }

    let (parameters, mut nested) =
        merge_parameters(&first.parameters, &second.parameters, path);
    conflicts.append(&mut nested);

    (PathItem { operations, parameters }, conflicts)
}
