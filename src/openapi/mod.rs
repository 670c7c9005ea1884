//! # OpenAPI Document Boundary
//!
//! The two places the engine touches real OpenAPI documents:
//!
//! - [`import`] — ingestion of externally provided documents (JSON or YAML)
//!   into the internal model
//! - [`export`] — generation and meta-schema validation of approved-spec
//!   documents

pub mod export;
pub mod import;

pub use export::generate_document;
pub use import::{parse_provided_document, ImportedSpec};
