//! Approved-spec document generation.
//!
//! Builds a complete OpenAPI 3.0 document from an approved spec, hoisting
//! shared object schemas into `components.schemas` via the definition
//! extractor, and validates the serialized result against the embedded
//! OpenAPI meta-schema before returning it. Validation failure is a hard
//! error, never a partial result.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use jsonschema::Validator;
use tracing::debug;

use crate::definitions::{extract_path_item, Definitions};
use crate::domain::{Components, OasDocument, PathItem, SecurityScheme};
use crate::{Error, Result};

static META_SCHEMA: &str = include_str!("openapi-3.0-schema.json");

fn meta_schema_validator() -> &'static Validator {
    static VALIDATOR: OnceLock<Validator> = OnceLock::new();
    VALIDATOR.get_or_init(|| {
        let schema: serde_json::Value =
            serde_json::from_str(META_SCHEMA).expect("embedded meta-schema is valid JSON");
        jsonschema::validator_for(&schema).expect("embedded meta-schema compiles")
    })
}

/// Generate the OpenAPI document for an approved spec and validate it.
pub fn generate_document(
    host: &str,
    port: u16,
    approved: &BTreeMap<String, PathItem>,
    security_schemes: &BTreeMap<String, SecurityScheme>,
) -> Result<Vec<u8>> {
    // Definitions are regenerated in full on every export; one table is
    // shared across all paths so identical payload shapes anywhere in the
    // document collapse to one definition.
    let mut definitions = Definitions::new();
    let mut paths = BTreeMap::new();
    for (path, item) in approved {
        let (updated, item) = extract_path_item(definitions, item.clone());
        definitions = updated;
        paths.insert(path.clone(), item);
    }

    let mut document = OasDocument::new(host, port, paths);
    let components =
        Components { schemas: definitions, security_schemes: security_schemes.clone() };
    if !components.is_empty() {
        document.components = Some(components);
    }

    let value = serde_json::to_value(&document)
        .map_err(|source| Error::serialization(source, "failed to serialize OpenAPI document"))?;
    validate_document(&value)?;

    debug!(
        paths = document.paths.len(),
        definitions = document.components.as_ref().map(|c| c.schemas.len()).unwrap_or(0),
        "generated OpenAPI document"
    );

    serde_json::to_vec_pretty(&value)
        .map_err(|source| Error::serialization(source, "failed to encode OpenAPI document"))
}

/// Validate a serialized document against the embedded OpenAPI meta-schema.
pub fn validate_document(document: &serde_json::Value) -> Result<()> {
    let errors: Vec<String> = meta_schema_validator()
        .iter_errors(document)
        .map(|error| format!("{}: {}", error.instance_path, error))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::document(errors.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        MediaTypeObject, Method, Operation, Parameter, ParameterLocation, Response, Schema,
    };
    use serde_json::json;

    fn approved_entry(schema: Schema) -> PathItem {
        let operation = Operation {
            parameters: vec![Parameter::new("verbose", ParameterLocation::Query, Schema::Boolean)],
            responses: BTreeMap::from([(
                "200".to_string(),
                Response {
                    description: "OK".to_string(),
                    headers: BTreeMap::new(),
                    content: BTreeMap::from([(
                        "application/json".to_string(),
                        MediaTypeObject { schema: Some(schema) },
                    )]),
                },
            )]),
            ..Default::default()
        };
        PathItem::with_operation(Method::Get, operation)
    }

    fn user_schema() -> Schema {
        Schema::Object(BTreeMap::from([
            ("id".to_string(), Schema::Integer),
            ("name".to_string(), Schema::plain_string()),
        ]))
    }

    #[test]
    fn test_generated_document_is_valid_and_complete() {
        let approved = BTreeMap::from([
            ("/users/{userId}".to_string(), approved_entry(user_schema())),
            ("/accounts/{accountId}".to_string(), approved_entry(user_schema())),
        ]);

        let bytes =
            generate_document("api.example.com", 8080, &approved, &BTreeMap::new()).unwrap();
        let document: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(document["openapi"], json!("3.0.3"));
        assert_eq!(document["servers"][0]["url"], json!("http://api.example.com:8080"));

        // Identical payload shapes on both paths collapse to one shared
        // definition.
        let schemas = document["components"]["schemas"].as_object().unwrap();
        assert_eq!(schemas.len(), 1);
        let reference = &document["paths"]["/users/{userId}"]["get"]["responses"]["200"]["content"]
            ["application/json"]["schema"]["$ref"];
        assert!(reference.as_str().unwrap().starts_with("#/components/schemas/"));
        assert_eq!(
            reference,
            &document["paths"]["/accounts/{accountId}"]["get"]["responses"]["200"]["content"]
                ["application/json"]["schema"]["$ref"]
        );
    }

    #[test]
    fn test_empty_spec_generates_empty_paths() {
        let bytes =
            generate_document("api.example.com", 8080, &BTreeMap::new(), &BTreeMap::new())
                .unwrap();
        let document: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(document["paths"], json!({}));
        assert!(document.get("components").is_none());
    }

    #[test]
    fn test_meta_schema_rejects_malformed_documents() {
        assert!(validate_document(&json!({"openapi": "3.0.3"})).is_err());
        assert!(validate_document(&json!({
            "openapi": "2.0",
            "info": {"title": "t", "version": "1"},
            "paths": {}
        }))
        .is_err());
        assert!(validate_document(&json!({
            "openapi": "3.0.3",
            "info": {"title": "t", "version": "1"},
            "paths": {
                "/x": {"get": {}}
            }
        }))
        .is_err());
    }

    #[test]
    fn test_meta_schema_accepts_generated_shape() {
        let document = json!({
            "openapi": "3.0.3",
            "info": {"title": "t", "version": "1"},
            "paths": {
                "/users/{id}": {
                    "get": {
                        "responses": {"200": {"description": "OK"}}
                    },
                    "parameters": [
                        {"name": "id", "in": "path", "required": true, "schema": {"type": "integer"}}
                    ]
                }
            }
        });
        assert!(validate_document(&document).is_ok());
    }
}
