//! Diff classification against an externally provided specification,
//! including base-path handling and zombie detection.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use specsift::spec::{Spec, SpecKind};
use specsift::telemetry::{Header, Interaction, InteractionRequest, InteractionResponse};
use specsift::{Config, DiffClass};

const PROVIDED_DOC: &str = r##"{
    "openapi": "3.0.0",
    "info": {"title": "Pets", "version": "1.0"},
    "servers": [{"url": "https://pets.example.com/v1"}],
    "paths": {
        "/pets/{petId}": {
            "get": {
                "responses": {
                    "200": {
                        "description": "OK",
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
        },
        "/legacy": {
            "get": {
                "deprecated": true,
                "responses": {
                    "200": {"description": "OK"}
                }
            }
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

fn provided_spec() -> Spec {
    let spec = Spec::new("pets.example.com", 443, Arc::new(Config::default()));
    let path_ids = BTreeMap::from([
        ("/pets/{petId}".to_string(), "pets-by-id".to_string()),
        ("/legacy".to_string(), "legacy".to_string()),
    ]);
    spec.load_provided_spec(PROVIDED_DOC.as_bytes(), &path_ids).unwrap();
    spec
}

fn get_interaction(request_id: &str, path: &str, response_body: &str) -> Interaction {
    Interaction {
        request_id: request_id.to_string(),
        destination_address: "pets.example.com:443".to_string(),
        request: InteractionRequest {
            method: "GET".to_string(),
            host: "pets.example.com".to_string(),
            path: path.to_string(),
            ..Default::default()
        },
        response: InteractionResponse {
            status_code: 200,
            headers: if response_body.is_empty() {
                Vec::new()
            } else {
                vec![Header::new("Content-Type", "application/json")]
            },
            body: Bytes::from(response_body.as_bytes().to_vec()),
            truncated_body: false,
        },
    }
}

#[test]
fn matching_interaction_is_no_diff() {
    let spec = provided_spec();
    let diff = spec
        .diff_telemetry(
            &get_interaction("r1", "/v1/pets/42", r#"{"id":42,"name":"rex"}"#),
            SpecKind::Provided,
        )
        .unwrap();

    assert_eq!(diff.classification, DiffClass::NoDiff);
    assert_eq!(diff.path, "/v1/pets/{petId}");
    assert_eq!(diff.path_id.as_deref(), Some("pets-by-id"));
}

#[test]
fn changed_response_shape_is_general_diff() {
    let spec = provided_spec();
    let diff = spec
        .diff_telemetry(
            &get_interaction("r2", "/v1/pets/42", r#"{"id":42,"name":"rex","age":3}"#),
            SpecKind::Provided,
        )
        .unwrap();

    assert_eq!(diff.classification, DiffClass::GeneralDiff);
    assert!(diff.original.is_some());
    assert!(diff.modified.is_some());
}

#[test]
fn deprecated_operation_mismatch_is_zombie_diff() {
    let spec = provided_spec();
    let diff = spec
        .diff_telemetry(
            &get_interaction("r3", "/v1/legacy", r#"{"unexpected":true}"#),
            SpecKind::Provided,
        )
        .unwrap();

    assert_eq!(diff.classification, DiffClass::ZombieDiff);
}

#[test]
fn path_outside_base_path_is_shadow_diff() {
    let spec = provided_spec();
    let diff = spec
        .diff_telemetry(&get_interaction("r4", "/pets/42", ""), SpecKind::Provided)
        .unwrap();

    assert_eq!(diff.classification, DiffClass::ShadowDiff);
    assert_eq!(diff.path, "/pets/42");
    assert!(diff.path_id.is_none());
}

#[test]
fn unknown_method_is_shadow_diff() {
    let spec = provided_spec();
    let mut interaction = get_interaction("r5", "/v1/pets/42", "");
    interaction.request.method = "DELETE".to_string();
    interaction.response.status_code = 204;

    let diff = spec.diff_telemetry(&interaction, SpecKind::Provided).unwrap();
    assert_eq!(diff.classification, DiffClass::ShadowDiff);
    assert!(diff.original.is_some());
}

#[test]
fn provided_trie_only_contains_mapped_paths() {
    let spec = Spec::new("pets.example.com", 443, Arc::new(Config::default()));
    // Only one of the two document paths is registered.
    let path_ids = BTreeMap::from([("/pets/{petId}".to_string(), "pets-by-id".to_string())]);
    spec.load_provided_spec(PROVIDED_DOC.as_bytes(), &path_ids).unwrap();

    let diff = spec
        .diff_telemetry(&get_interaction("r6", "/v1/legacy", ""), SpecKind::Provided)
        .unwrap();
    assert_eq!(diff.classification, DiffClass::ShadowDiff);
}

#[test]
fn reloading_replaces_the_provided_spec_wholesale() {
    let spec = provided_spec();

    let minimal = r#"{
        "openapi": "3.0.0",
        "info": {"title": "Pets", "version": "2.0"},
        "paths": {
            "/health": {
                "get": {"responses": {"200": {"description": "OK"}}}
            }
        }
    }"#;
    let path_ids = BTreeMap::from([("/health".to_string(), "health".to_string())]);
    spec.load_provided_spec(minimal.as_bytes(), &path_ids).unwrap();

    // The old paths are gone along with the old base path.
    let diff = spec
        .diff_telemetry(&get_interaction("r7", "/v1/pets/42", ""), SpecKind::Provided)
        .unwrap();
    assert_eq!(diff.classification, DiffClass::ShadowDiff);

    let diff =
        spec.diff_telemetry(&get_interaction("r8", "/health", ""), SpecKind::Provided).unwrap();
    assert_eq!(diff.classification, DiffClass::NoDiff);
}
