//! Top-level OpenAPI document model used for generated output.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::operation::SecurityScheme;
use super::path_item::PathItem;
use super::schema::Schema;

pub const OPENAPI_VERSION: &str = "3.0.3";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Info {
    pub title: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Components {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub schemas: BTreeMap<String, Schema>,
    #[serde(
        rename = "securitySchemes",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub security_schemes: BTreeMap<String, SecurityScheme>,
}

impl Components {
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty() && self.security_schemes.is_empty()
    }
}

/// A complete generated OpenAPI document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OasDocument {
    pub openapi: String,
    pub info: Info,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<Server>,
    pub paths: BTreeMap<String, PathItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<Components>,
}

impl OasDocument {
    /// Create a document skeleton for the given serving address
    pub fn new(host: &str, port: u16, paths: BTreeMap<String, PathItem>) -> Self {
        Self {
            openapi: OPENAPI_VERSION.to_string(),
            info: Info {
                title: format!("{}:{}", host, port),
                version: "1.0".to_string(),
            },
            servers: vec![Server { url: format!("http://{}:{}", host, port) }],
            paths,
            components: None,
        }
    }
}
