//! Provided-spec ingestion.
//!
//! Parses an externally authored OpenAPI document (JSON or YAML) through
//! `openapiv3` for structural validation, then converts the paths into the
//! internal model. `#/components/schemas/` references are resolved inline
//! (depth-capped) so later diff comparisons against freshly inferred,
//! always-inline operations are structural rather than reference-sensitive.

use std::collections::BTreeMap;

use openapiv3::{OpenAPI, ReferenceOr};
use tracing::{debug, warn};

use crate::definitions::MAX_SCHEMA_DEPTH;
use crate::domain::{
    MediaTypeObject, Method, Operation, Parameter, ParameterLocation, PathItem, RequestBody,
    Response, ResponseHeader, Schema, SecurityRequirement, StringFormat,
};
use crate::{Error, Result};

/// A provided OpenAPI document converted into the internal model
#[derive(Debug, Clone)]
pub struct ImportedSpec {
    /// Doc-relative template path -> path item.
    pub paths: BTreeMap<String, PathItem>,
    /// Non-root base path taken from the first server URL; empty otherwise.
    pub base_path: String,
}

/// Parse a provided OpenAPI document from JSON or YAML bytes.
pub fn parse_provided_document(document: &[u8]) -> Result<ImportedSpec> {
    let value = load_document_value(document)?;
    let openapi: OpenAPI = serde_json::from_value(value)
        .map_err(|error| Error::validation(format!("invalid OpenAPI document: {}", error)))?;

    let base_path = server_base_path(&openapi);
    let components = openapi.components.as_ref();
    let document_security = openapi.security.as_deref().unwrap_or(&[]);

    let mut paths = BTreeMap::new();
    for (path, item) in openapi.paths.paths.iter() {
        let item = match item {
            ReferenceOr::Item(item) => item,
            ReferenceOr::Reference { reference } => {
                warn!(path = %path, reference = %reference, "skipping referenced path item");
                continue;
            }
        };
        paths.insert(path.clone(), convert_path_item(item, components, document_security));
    }

    debug!(paths = paths.len(), base_path = %base_path, "imported provided OpenAPI document");
    Ok(ImportedSpec { paths, base_path })
}

/// Decode document bytes: JSON first, then YAML.
fn load_document_value(document: &[u8]) -> Result<serde_json::Value> {
    if let Ok(value) = serde_json::from_slice(document) {
        return Ok(value);
    }
    serde_yaml::from_slice(document)
        .map_err(|error| Error::validation(format!("document is neither JSON nor YAML: {}", error)))
}

/// The path portion of the first server URL ("https://api.example.com/v1"
/// -> "/v1"); empty when the spec serves from the root.
fn server_base_path(openapi: &OpenAPI) -> String {
    let Some(server) = openapi.servers.first() else {
        return String::new();
    };

    let path = match url::Url::parse(&server.url) {
        Ok(url) => url.path().to_string(),
        // Relative server URLs ("/v1") are already paths.
        Err(_) => server.url.clone(),
    };

    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() || !trimmed.starts_with('/') {
        String::new()
    } else {
        trimmed.to_string()
    }
}

fn convert_path_item(
    item: &openapiv3::PathItem,
    components: Option<&openapiv3::Components>,
    document_security: &[openapiv3::SecurityRequirement],
) -> PathItem {
    let mut converted = PathItem::default();

    let operations = [
        (Method::Get, &item.get),
        (Method::Put, &item.put),
        (Method::Post, &item.post),
        (Method::Delete, &item.delete),
        (Method::Options, &item.options),
        (Method::Head, &item.head),
        (Method::Patch, &item.patch),
    ];
    for (method, operation) in operations {
        if let Some(operation) = operation {
            converted
                .insert_operation(method, convert_operation(operation, components, document_security));
        }
    }

    converted.parameters = convert_parameters(&item.parameters, components);
    converted
}

fn convert_operation(
    operation: &openapiv3::Operation,
    components: Option<&openapiv3::Components>,
    document_security: &[openapiv3::SecurityRequirement],
) -> Operation {
    let mut converted = Operation {
        parameters: convert_parameters(&operation.parameters, components),
        deprecated: operation.deprecated,
        ..Default::default()
    };

    if let Some(request_body) = &operation.request_body {
        if let Some(request_body) = resolve_request_body(request_body, components) {
            let content = convert_content(&request_body.content, components);
            if !content.is_empty() {
                converted.request_body = Some(RequestBody { content });
            }
        }
    }

    if let Some(default) = &operation.responses.default {
        if let Some(response) = resolve_response(default, components) {
            converted
                .responses
                .insert("default".to_string(), convert_response(response, components));
        }
    }
    for (status, response) in operation.responses.responses.iter() {
        let openapiv3::StatusCode::Code(code) = status else {
            warn!(status = %status, "skipping response status range");
            continue;
        };
        if let Some(response) = resolve_response(response, components) {
            converted.responses.insert(code.to_string(), convert_response(response, components));
        }
    }

    // Operation-level security overrides the document default.
    let security = operation.security.as_deref().unwrap_or(document_security);
    converted.security = security
        .iter()
        .map(|requirement| {
            SecurityRequirement(
                requirement
                    .iter()
                    .map(|(scheme, scopes)| (scheme.clone(), scopes.clone()))
                    .collect(),
            )
        })
        .collect();

    converted
}

fn convert_response(
    response: &openapiv3::Response,
    components: Option<&openapiv3::Components>,
) -> Response {
    let mut headers = BTreeMap::new();
    for (name, header) in response.headers.iter() {
        let Some(header) = resolve_header(header, components) else {
            continue;
        };
        let schema = match &header.format {
            openapiv3::ParameterSchemaOrContent::Schema(schema) => {
                convert_schema_ref(schema, components, 0)
            }
            openapiv3::ParameterSchemaOrContent::Content(_) => Schema::plain_string(),
        };
        headers.insert(name.clone(), ResponseHeader { schema });
    }

    Response {
        description: response.description.clone(),
        headers,
        content: convert_content(&response.content, components),
    }
}

fn convert_content<'c>(
    content: impl IntoIterator<Item = (&'c String, &'c openapiv3::MediaType)>,
    components: Option<&openapiv3::Components>,
) -> BTreeMap<String, MediaTypeObject> {
    content
        .into_iter()
        .map(|(media_type, media)| {
            let schema = media
                .schema
                .as_ref()
                .map(|schema| convert_schema_ref(schema, components, 0));
            (media_type.clone(), MediaTypeObject { schema })
        })
        .collect()
}

fn convert_parameters(
    parameters: &[ReferenceOr<openapiv3::Parameter>],
    components: Option<&openapiv3::Components>,
) -> Vec<Parameter> {
    parameters
        .iter()
        .filter_map(|parameter| {
            let parameter = resolve_parameter(parameter, components)?;
            Some(convert_parameter(parameter, components))
        })
        .collect()
}

fn convert_parameter(
    parameter: &openapiv3::Parameter,
    components: Option<&openapiv3::Components>,
) -> Parameter {
    let (location, data) = match parameter {
        openapiv3::Parameter::Query { parameter_data, .. } => {
            (ParameterLocation::Query, parameter_data)
        }
        openapiv3::Parameter::Header { parameter_data, .. } => {
            (ParameterLocation::Header, parameter_data)
        }
        openapiv3::Parameter::Path { parameter_data, .. } => {
            (ParameterLocation::Path, parameter_data)
        }
        openapiv3::Parameter::Cookie { parameter_data, .. } => {
            (ParameterLocation::Cookie, parameter_data)
        }
    };

    let schema = match &data.format {
        openapiv3::ParameterSchemaOrContent::Schema(schema) => {
            convert_schema_ref(schema, components, 0)
        }
        openapiv3::ParameterSchemaOrContent::Content(_) => Schema::plain_string(),
    };

    Parameter {
        name: data.name.clone(),
        location,
        required: data.required || location == ParameterLocation::Path,
        schema,
    }
}

fn convert_schema_ref(
    schema: &ReferenceOr<openapiv3::Schema>,
    components: Option<&openapiv3::Components>,
    depth: usize,
) -> Schema {
    match schema {
        ReferenceOr::Item(schema) => convert_schema(schema, components, depth),
        ReferenceOr::Reference { reference } => {
            resolve_schema_reference(reference, components, depth)
        }
    }
}

fn convert_boxed_schema_ref(
    schema: &ReferenceOr<Box<openapiv3::Schema>>,
    components: Option<&openapiv3::Components>,
    depth: usize,
) -> Schema {
    match schema {
        ReferenceOr::Item(schema) => convert_schema(schema, components, depth),
        ReferenceOr::Reference { reference } => {
            resolve_schema_reference(reference, components, depth)
        }
    }
}

/// Resolve a `#/components/schemas/` reference inline. Beyond the depth cap
/// (cyclic or pathologically nested documents) the reference is kept as-is.
fn resolve_schema_reference(
    reference: &str,
    components: Option<&openapiv3::Components>,
    depth: usize,
) -> Schema {
    let Some(name) = reference.strip_prefix(crate::domain::SCHEMA_REF_PREFIX) else {
        warn!(reference = %reference, "unsupported schema reference; keeping as-is");
        return Schema::Reference(reference.to_string());
    };
    if depth >= MAX_SCHEMA_DEPTH {
        return Schema::Reference(name.to_string());
    }

    match components.and_then(|components| components.schemas.get(name)) {
        Some(schema) => convert_schema_ref(schema, components, depth + 1),
        None => {
            warn!(reference = %reference, "dangling schema reference; keeping as-is");
            Schema::Reference(name.to_string())
        }
    }
}

fn convert_schema(
    schema: &openapiv3::Schema,
    components: Option<&openapiv3::Components>,
    depth: usize,
) -> Schema {
    match &schema.schema_kind {
        openapiv3::SchemaKind::Type(schema_type) => match schema_type {
            openapiv3::Type::String(string_type) => {
                let format = match &string_type.format {
                    openapiv3::VariantOrUnknownOrEmpty::Item(format) => match format {
                        openapiv3::StringFormat::Date => Some(StringFormat::Date),
                        openapiv3::StringFormat::DateTime => Some(StringFormat::DateTime),
                        _ => None,
                    },
                    openapiv3::VariantOrUnknownOrEmpty::Unknown(raw) => StringFormat::parse(raw),
                    openapiv3::VariantOrUnknownOrEmpty::Empty => None,
                };
                Schema::String(format)
            }
            openapiv3::Type::Number(_) => Schema::Number,
            openapiv3::Type::Integer(_) => Schema::Integer,
            openapiv3::Type::Object(object_type) => {
                let properties = object_type
                    .properties
                    .iter()
                    .map(|(name, property)| {
                        (name.clone(), convert_boxed_schema_ref(property, components, depth + 1))
                    })
                    .collect();
                Schema::Object(properties)
            }
            openapiv3::Type::Array(array_type) => {
                let items = array_type
                    .items
                    .as_ref()
                    .map(|items| convert_boxed_schema_ref(items, components, depth + 1))
                    .unwrap_or_else(Schema::plain_string);
                Schema::Array(Box::new(items))
            }
            _ => Schema::Boolean,
        },
        openapiv3::SchemaKind::OneOf { one_of } => convert_variants(one_of, components, depth),
        openapiv3::SchemaKind::AnyOf { any_of } => convert_variants(any_of, components, depth),
        openapiv3::SchemaKind::AllOf { all_of } => convert_variants(all_of, components, depth),
        openapiv3::SchemaKind::Not { .. } => {
            debug!("'not' schemas are not modeled; treating as empty object");
            Schema::Object(BTreeMap::new())
        }
        openapiv3::SchemaKind::Any(any) => {
            let properties: BTreeMap<String, Schema> = any
                .properties
                .iter()
                .map(|(name, property)| {
                    (name.clone(), convert_boxed_schema_ref(property, components, depth + 1))
                })
                .collect();
            if !properties.is_empty() {
                Schema::Object(properties)
            } else if let Some(items) = &any.items {
                Schema::Array(Box::new(convert_boxed_schema_ref(items, components, depth + 1)))
            } else {
                Schema::Object(BTreeMap::new())
            }
        }
    }
}

fn convert_variants(
    variants: &[ReferenceOr<openapiv3::Schema>],
    components: Option<&openapiv3::Components>,
    depth: usize,
) -> Schema {
    let mut converted: Vec<Schema> = variants
        .iter()
        .map(|variant| convert_schema_ref(variant, components, depth + 1))
        .collect();
    match converted.len() {
        0 => Schema::Object(BTreeMap::new()),
        1 => converted.remove(0),
        _ => Schema::Mixed(converted),
    }
}

fn resolve_parameter<'c>(
    parameter: &'c ReferenceOr<openapiv3::Parameter>,
    components: Option<&'c openapiv3::Components>,
) -> Option<&'c openapiv3::Parameter> {
    resolve_component(parameter, "#/components/parameters/", components, |components, name| {
        components.parameters.get(name)
    })
}

fn resolve_request_body<'c>(
    request_body: &'c ReferenceOr<openapiv3::RequestBody>,
    components: Option<&'c openapiv3::Components>,
) -> Option<&'c openapiv3::RequestBody> {
    resolve_component(request_body, "#/components/requestBodies/", components, |components, name| {
        components.request_bodies.get(name)
    })
}

fn resolve_response<'c>(
    response: &'c ReferenceOr<openapiv3::Response>,
    components: Option<&'c openapiv3::Components>,
) -> Option<&'c openapiv3::Response> {
    resolve_component(response, "#/components/responses/", components, |components, name| {
        components.responses.get(name)
    })
}

fn resolve_header<'c>(
    header: &'c ReferenceOr<openapiv3::Header>,
    components: Option<&'c openapiv3::Components>,
) -> Option<&'c openapiv3::Header> {
    resolve_component(header, "#/components/headers/", components, |components, name| {
        components.headers.get(name)
    })
}

/// One-level component resolution for non-schema objects.
fn resolve_component<'c, T>(
    item: &'c ReferenceOr<T>,
    prefix: &str,
    components: Option<&'c openapiv3::Components>,
    lookup: impl Fn(&'c openapiv3::Components, &str) -> Option<&'c ReferenceOr<T>>,
) -> Option<&'c T> {
    match item {
        ReferenceOr::Item(item) => Some(item),
        ReferenceOr::Reference { reference } => {
            let resolved = reference
                .strip_prefix(prefix)
                .and_then(|name| components.map(|components| (components, name)))
                .and_then(|(components, name)| lookup(components, name))
                .and_then(|entry| match entry {
                    ReferenceOr::Item(item) => Some(item),
                    ReferenceOr::Reference { .. } => None,
                });
            if resolved.is_none() {
                warn!(reference = %reference, "unresolvable component reference; skipping");
            }
            resolved
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PETSTORE: &str = r##"{
        "openapi": "3.0.0",
        "info": {"title": "Petstore", "version": "1.0.0"},
        "servers": [{"url": "https://api.example.com/v1"}],
        "paths": {
            "/pets": {
                "get": {
                    "parameters": [
                        {"name": "limit", "in": "query", "schema": {"type": "integer"}}
                    ],
                    "responses": {
                        "200": {
                            "description": "A list of pets",
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "type": "array",
                                        "items": {"$ref": "#/components/schemas/Pet"}
                                    }
                                }
                            }
                        }
                    }
                }
            },
            "/pets/{petId}": {
                "get": {
                    "deprecated": true,
                    "responses": {
                        "200": {
                            "description": "A pet",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/Pet"}
                                }
                            }
                        }
                    }
                },
                "parameters": [
                    {"name": "petId", "in": "path", "required": true, "schema": {"type": "integer"}}
                ]
            }
        },
        "components": {
            "schemas": {
                "Pet": {
                    "type": "object",
                    "properties": {
                        "id": {"type": "integer"},
                        "name": {"type": "string"}
                    }
                }
            }
        }
    }"##;

    #[test]
    fn test_parse_json_document() {
        let imported = parse_provided_document(PETSTORE.as_bytes()).unwrap();

        assert_eq!(imported.base_path, "/v1");
        assert_eq!(imported.paths.len(), 2);

        let pets = &imported.paths["/pets"];
        let operation = pets.operation(Method::Get).unwrap();
        assert_eq!(operation.parameters.len(), 1);
        assert_eq!(operation.parameters[0].schema, Schema::Integer);

        // The $ref was resolved inline.
        let response = &operation.responses["200"];
        let schema = response.content["application/json"].schema.clone().unwrap();
        let Schema::Array(items) = schema else { panic!("expected array") };
        let Schema::Object(properties) = *items else { panic!("expected inline object items") };
        assert_eq!(properties["id"], Schema::Integer);
    }

    #[test]
    fn test_deprecated_and_path_parameters_survive() {
        let imported = parse_provided_document(PETSTORE.as_bytes()).unwrap();
        let item = &imported.paths["/pets/{petId}"];
        assert!(item.operation(Method::Get).unwrap().deprecated);
        assert_eq!(item.parameters.len(), 1);
        assert_eq!(item.parameters[0].location, ParameterLocation::Path);
        assert!(item.parameters[0].required);
    }

    #[test]
    fn test_parse_yaml_document() {
        let yaml = r#"
openapi: 3.0.0
info:
  title: Minimal
  version: "1.0"
paths:
  /ping:
    get:
      responses:
        "200":
          description: OK
"#;
        let imported = parse_provided_document(yaml.as_bytes()).unwrap();
        assert_eq!(imported.base_path, "");
        assert!(imported.paths["/ping"].operation(Method::Get).is_some());
    }

    #[test]
    fn test_invalid_document_is_rejected() {
        assert!(parse_provided_document(b"{\"not\": \"openapi\"}").is_err());
        assert!(parse_provided_document(b"\x00\xff garbage").is_err());
    }

    #[test]
    fn test_relative_server_url_is_base_path() {
        let doc = r#"{
            "openapi": "3.0.0",
            "info": {"title": "t", "version": "1"},
            "servers": [{"url": "/api/v2"}],
            "paths": {}
        }"#;
        let imported = parse_provided_document(doc.as_bytes()).unwrap();
        assert_eq!(imported.base_path, "/api/v2");
    }

    #[test]
    fn test_cyclic_references_are_depth_capped() {
        let doc = r##"{
            "openapi": "3.0.0",
            "info": {"title": "t", "version": "1"},
            "paths": {
                "/nodes": {
                    "get": {
                        "responses": {
                            "200": {
                                "description": "OK",
                                "content": {
                                    "application/json": {
                                        "schema": {"$ref": "#/components/schemas/Node"}
                                    }
                                }
                            }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Node": {
                        "type": "object",
                        "properties": {
                            "child": {"$ref": "#/components/schemas/Node"}
                        }
                    }
                }
            }
        }"##;

        // Conversion terminates; the innermost level keeps the reference.
        let imported = parse_provided_document(doc.as_bytes()).unwrap();
        let operation = imported.paths["/nodes"].operation(Method::Get).unwrap();
        let mut schema =
            operation.responses["200"].content["application/json"].schema.clone().unwrap();
        let mut levels = 0;
        while let Schema::Object(properties) = schema {
            schema = properties["child"].clone();
            levels += 1;
        }
        assert!(matches!(schema, Schema::Reference(_)));
        assert!(levels <= MAX_SCHEMA_DEPTH + 1);
    }
}
