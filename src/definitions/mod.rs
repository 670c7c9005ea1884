//! # Definition Extraction
//!
//! Rewrites a tree of inferred schemas into a flat table of named,
//! reference-linked definitions so structurally identical payload shapes
//! anywhere in a document collapse to one shared entry. The table is passed
//! by value through every call and returned updated, keeping the pass
//! reentrant.

use std::collections::BTreeMap;

use crate::domain::{Operation, PathItem, Schema};

/// Recursion bound for extraction. Schemas nested deeper stay fully inline
/// and register no definitions; this bounds pathological or cyclic-looking
/// inputs.
pub const MAX_SCHEMA_DEPTH: usize = 20;

/// The shared definitions table: name to schema. No two entries are
/// structurally identical.
pub type Definitions = BTreeMap<String, Schema>;

/// Rewrite a schema into a reference where possible, registering definitions
/// in `definitions`.
///
/// Only object schemas with at least one property are extraction candidates;
/// arrays recurse into their item schema with a singularized name hint;
/// primitives and empty objects pass through untouched.
pub fn schema_to_ref(
    definitions: Definitions,
    schema: Schema,
    name_hint: Option<&str>,
    depth: usize,
) -> (Definitions, Schema) {
    if depth >= MAX_SCHEMA_DEPTH {
        return (definitions, schema);
    }

    match schema {
        Schema::Array(items) => {
            let singular = name_hint.map(singularize);
            let (definitions, items) =
                schema_to_ref(definitions, *items, singular.as_deref(), depth + 1);
            (definitions, Schema::Array(Box::new(items)))
        }
        Schema::Object(properties) if !properties.is_empty() => {
            let mut definitions = definitions;
            let mut rewritten = BTreeMap::new();
            for (name, property) in properties {
                let (updated, property) =
                    schema_to_ref(definitions, property, Some(name.as_str()), depth + 1);
                definitions = updated;
                rewritten.insert(name, property);
            }
            let object = Schema::Object(rewritten);

            // Structural comparison, not identity: an identical schema under
            // any existing name is reused instead of duplicated.
            if let Some(existing) =
                definitions.iter().find_map(|(name, schema)| (*schema == object).then(|| name.clone()))
            {
                return (definitions, Schema::Reference(existing));
            }

            let base = match name_hint {
                Some(hint) if !hint.is_empty() => sanitize_name(hint),
                _ => synthesize_name(&object),
            };
            let name = free_name(&definitions, base);
            definitions.insert(name.clone(), object);
            (definitions, Schema::Reference(name))
        }
        other => (definitions, other),
    }
}

/// Apply extraction across an operation's parameter, request-body, and
/// response schemas, sharing one definitions table.
pub fn extract_operation(definitions: Definitions, operation: Operation) -> (Definitions, Operation) {
    let mut definitions = definitions;
    let mut operation = operation;

    for parameter in &mut operation.parameters {
        let (updated, schema) =
            schema_to_ref(definitions, parameter.schema.clone(), None, 0);
        definitions = updated;
        parameter.schema = schema;
    }

    if let Some(body) = &mut operation.request_body {
        for media in body.content.values_mut() {
            if let Some(schema) = media.schema.take() {
                let (updated, schema) = schema_to_ref(definitions, schema, None, 0);
                definitions = updated;
                media.schema = Some(schema);
            }
        }
    }

    for response in operation.responses.values_mut() {
        for media in response.content.values_mut() {
            if let Some(schema) = media.schema.take() {
                let (updated, schema) = schema_to_ref(definitions, schema, None, 0);
                definitions = updated;
                media.schema = Some(schema);
            }
        }
        for header in response.headers.values_mut() {
            let (updated, schema) = schema_to_ref(definitions, header.schema.clone(), None, 0);
            definitions = updated;
            header.schema = schema;
        }
    }

    (definitions, operation)
}

/// Apply extraction across a whole path item.
pub fn extract_path_item(definitions: Definitions, item: PathItem) -> (Definitions, PathItem) {
    let mut definitions = definitions;
    let mut item = item;

    let mut operations = BTreeMap::new();
    for (method, operation) in std::mem::take(&mut item.operations) {
        let (updated, operation) = extract_operation(definitions, operation);
        definitions = updated;
        operations.insert(method, operation);
    }
    item.operations = operations;

    for parameter in &mut item.parameters {
        let (updated, schema) = schema_to_ref(definitions, parameter.schema.clone(), None, 0);
        definitions = updated;
        parameter.schema = schema;
    }

    (definitions, item)
}

/// Synthesize a definition name from the sorted, underscore-joined property
/// names. Sorting keeps naming reproducible across runs over the same
/// logical schema.
fn synthesize_name(object: &Schema) -> String {
    let Schema::Object(properties) = object else {
        return "schema".to_string();
    };
    // BTreeMap keys are already sorted.
    let joined = properties.keys().cloned().collect::<Vec<_>>().join("_");
    sanitize_name(&joined)
}

/// First free name: the base itself, else `base_0`, `base_1`, ...
fn free_name(definitions: &Definitions, base: String) -> String {
    if !definitions.contains_key(&base) {
        return base;
    }
    let mut suffix = 0;
    loop {
        let candidate = format!("{}_{}", base, suffix);
        if !definitions.contains_key(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}

fn singularize(hint: &str) -> String {
    if hint.len() > 1 && hint.ends_with('s') {
        hint[..hint.len() - 1].to_string()
    } else {
        hint.to_string()
    }
}

/// Component names must stay within the OpenAPI key character set.
fn sanitize_name(raw: &str) -> String {
    let name: String = raw
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect();
    if name.is_empty() {
        "schema".to_string()
    } else {
        name
    }
}
