//! # specsift
//!
//! specsift passively infers OpenAPI-style API specifications from observed
//! HTTP request/response pairs ("interactions"), incrementally merges them
//! into a canonical learned specification, lets an operator approve a
//! normalized (parameterized) version of that specification, and then
//! classifies each subsequent live interaction as matching, shadowing, or
//! conflicting with the approved or an externally provided specification.
//!
//! ## Architecture
//!
//! ```text
//! Interaction ──▶ OperationGenerator ──▶ Merger ──▶ LearningSpec
//!                       │                               │  review/approve
//!                       ▼                               ▼
//!                   DiffEngine ◀── PathTrie ◀──── ApprovedSpec ──▶ OpenAPI document
//! ```
//!
//! ## Core Components
//!
//! - [`trie::PathTrie`]: resolves concrete request paths to the most
//!   specific parameterized route template
//! - [`inference`]: turns observed values and interactions into typed
//!   schema fragments and operations
//! - [`merge`]: combines independently inferred operations, reporting (but
//!   never failing on) type conflicts
//! - [`definitions`]: deduplicates structurally identical object schemas
//!   into shared named definitions
//! - [`diff`]: classifies live traffic against a base specification
//! - [`spec`] / [`registry`]: per-(host,port) state, the review/approval
//!   workflow, and whole-state persistence

pub mod cli;
pub mod config;
pub mod definitions;
pub mod diff;
pub mod domain;
pub mod errors;
pub mod inference;
pub mod merge;
pub mod observability;
pub mod openapi;
pub mod registry;
pub mod spec;
pub mod telemetry;
pub mod trie;

// Re-export commonly used types
pub use config::Config;
pub use diff::{ApiDiff, DiffClass};
pub use errors::{Error, Result};
pub use observability::init_tracing;
pub use registry::{SpecKey, SpecRegistry};
pub use spec::{Spec, SpecKind};
pub use telemetry::Interaction;

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
