//! # Domain Model
//!
//! The OpenAPI-facing data model of the engine: schemas, parameters,
//! operations, path items, and documents. All maps are ordered so document
//! generation is deterministic.

pub mod document;
pub mod operation;
pub mod path_item;
pub mod schema;

pub use document::{Components, Info, OasDocument, Server, OPENAPI_VERSION};
pub use operation::{
    ApiKeyLocation, HttpAuthScheme, MediaTypeObject, OAuthFlow, OAuthFlows, Operation, Parameter,
    ParameterLocation, RequestBody, Response, ResponseHeader, SecurityRequirement, SecurityScheme,
};
pub use path_item::{Method, PathItem};
pub use schema::{Schema, StringFormat, SCHEMA_REF_PREFIX};
