//! # Spec State
//!
//! One [`Spec`] per (host, port): the continuously learned specification,
//! the operator-approved specification, an optionally provided external
//! specification, and the path tries that resolve concrete request paths to
//! templates. All state lives behind a single exclusive lock; every public
//! operation is a synchronous, blocking call that holds the lock for its
//! duration. Distinct specs are independent.

pub mod review;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::diff::{diff_interaction, ApiDiff, DiffSource};
use crate::domain::{Method, PathItem, SecurityScheme};
use crate::inference::OperationGenerator;
use crate::merge::merge_operations;
use crate::openapi::{export, import};
use crate::telemetry::Interaction;
use crate::trie::PathTrie;
use crate::{Error, Result};

/// Which base specification a diff runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecKind {
    Approved,
    Provided,
}

/// An externally provided specification, converted to the internal model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidedSpec {
    pub paths: BTreeMap<String, PathItem>,
    /// Non-root server base path, empty when the spec serves from `/`.
    pub base_path: String,
    /// Path identifiers for the subset of paths registered in the trie.
    pub path_ids: BTreeMap<String, String>,
}

/// Everything a [`Spec`] guards under its lock
#[derive(Debug, Clone, Default)]
pub(crate) struct SpecState {
    /// Concrete path -> inferred path item, continuously updated.
    pub learning: BTreeMap<String, PathItem>,
    /// Parameterized template -> approved path item.
    pub approved: BTreeMap<String, PathItem>,
    /// Parameterized template -> opaque path identifier.
    pub approved_ids: BTreeMap<String, String>,
    pub approved_trie: PathTrie<String>,
    /// Shared security-schemes table for learned and approved operations.
    pub security_schemes: BTreeMap<String, SecurityScheme>,
    pub provided: Option<ProvidedSpec>,
    pub provided_trie: PathTrie<String>,
}

/// Serializable snapshot of a spec. Tries are rebuilt on decode and the
/// runtime configuration is deliberately not part of the snapshot.
#[derive(Debug, Serialize, Deserialize)]
pub struct PersistedSpec {
    pub id: Uuid,
    pub host: String,
    pub port: u16,
    pub learning: BTreeMap<String, PathItem>,
    pub approved: BTreeMap<String, PathItem>,
    pub approved_ids: BTreeMap<String, String>,
    pub security_schemes: BTreeMap<String, SecurityScheme>,
    pub provided: Option<ProvidedSpec>,
}

/// Per-(host, port) specification instance
#[derive(Debug)]
pub struct Spec {
    id: Uuid,
    host: String,
    port: u16,
    config: Arc<Config>,
    state: Mutex<SpecState>,
}

impl Spec {
    pub fn new(host: &str, port: u16, config: Arc<Config>) -> Self {
        Self {
            id: Uuid::new_v4(),
            host: host.to_string(),
            port,
            config,
            state: Mutex::new(SpecState::default()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// The registry key of this spec
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, SpecState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Learn one interaction: infer its operation and merge it into the
    /// learning spec entry for the concrete path. Merge conflicts are
    /// logged, never fatal.
    #[instrument(
        skip(self, interaction),
        fields(address = %self.address(), request_id = %interaction.request_id)
    )]
    pub fn learn_telemetry(&self, interaction: &Interaction) -> Result<()> {
        let method: Method = interaction.request.method.parse()?;
        let path = interaction.request_path().to_string();

        let mut state = self.lock_state();
        let generator = OperationGenerator::new(&self.config.generator);
        let operation = generator.generate(interaction, &mut state.security_schemes)?;

        let entry = state.learning.entry(path.clone()).or_default();
        let merged = match entry.operation(method) {
            Some(existing) => {
                let base = format!("{}/{}", path, method.as_str());
                let (merged, conflicts) = merge_operations(existing, &operation, &base);
                for conflict in &conflicts {
                    warn!(
                        path = %conflict.path,
                        message = %conflict.message,
                        "merge conflict while learning; keeping the first-seen value"
                    );
                }
                merged
            }
            None => operation,
        };
        entry.insert_operation(method, merged);
        Ok(())
    }

    /// Classify one interaction against the approved or provided spec.
    #[instrument(
        skip(self, interaction),
        fields(address = %self.address(), request_id = %interaction.request_id)
    )]
    pub fn diff_telemetry(&self, interaction: &Interaction, kind: SpecKind) -> Result<ApiDiff> {
        let method: Method = interaction.request.method.parse()?;

        let state = self.lock_state();
        // Diffing must not mutate the spec: discovered schemes land in a
        // scratch table.
        let mut scratch_schemes = BTreeMap::new();
        let generator = OperationGenerator::new(&self.config.generator);
        let fresh = generator.generate(interaction, &mut scratch_schemes)?;

        let spec_id = self.id.to_string();
        match kind {
            SpecKind::Approved => {
                let source = DiffSource {
                    paths: &state.approved,
                    trie: &state.approved_trie,
                    base_path: "",
                };
                Ok(diff_interaction(&source, interaction, method, fresh, &spec_id))
            }
            SpecKind::Provided => {
                let provided = state
                    .provided
                    .as_ref()
                    .ok_or_else(|| Error::not_found("provided spec", self.address()))?;
                let source = DiffSource {
                    paths: &provided.paths,
                    trie: &state.provided_trie,
                    base_path: &provided.base_path,
                };
                Ok(diff_interaction(&source, interaction, method, fresh, &spec_id))
            }
        }
    }

    /// Generate the approved OpenAPI document (validated against the
    /// OpenAPI meta-schema).
    pub fn generate_oas_document(&self) -> Result<Vec<u8>> {
        let state = self.lock_state();
        export::generate_document(&self.host, self.port, &state.approved, &state.security_schemes)
    }

    /// Replace the provided spec wholesale from an externally authored
    /// OpenAPI document (JSON or YAML), rebuilding the provided path trie
    /// from exactly the paths present in `path_ids`.
    #[instrument(skip(self, document, path_ids), fields(address = %self.address()))]
    pub fn load_provided_spec(
        &self,
        document: &[u8],
        path_ids: &BTreeMap<String, String>,
    ) -> Result<()> {
        let imported = import::parse_provided_document(document)?;

        let mut trie = PathTrie::new();
        let mut registered = BTreeMap::new();
        for (path, path_id) in path_ids {
            if imported.paths.contains_key(path) {
                trie.insert(path, path_id.clone());
                registered.insert(path.clone(), path_id.clone());
            } else {
                warn!(path = %path, "path id supplied for a path absent from the provided document");
            }
        }

        let mut state = self.lock_state();
        state.provided = Some(ProvidedSpec {
            paths: imported.paths,
            base_path: imported.base_path,
            path_ids: registered,
        });
        state.provided_trie = trie;
        Ok(())
    }

    /// Whether any operations have been approved yet
    pub fn has_approved_paths(&self) -> bool {
        !self.lock_state().approved.is_empty()
    }

    /// Concrete paths currently held by the learning spec
    pub fn learning_paths(&self) -> Vec<String> {
        self.lock_state().learning.keys().cloned().collect()
    }

    /// Snapshot this spec for persistence.
    pub fn to_persisted(&self) -> PersistedSpec {
        let state = self.lock_state();
        PersistedSpec {
            id: self.id,
            host: self.host.clone(),
            port: self.port,
            learning: state.learning.clone(),
            approved: state.approved.clone(),
            approved_ids: state.approved_ids.clone(),
            security_schemes: state.security_schemes.clone(),
            provided: state.provided.clone(),
        }
    }

    /// Restore a spec from its persisted snapshot, re-attaching a fresh
    /// runtime configuration and rebuilding both tries.
    pub fn from_persisted(persisted: PersistedSpec, config: Arc<Config>) -> Self {
        let mut approved_trie = PathTrie::new();
        for (path, path_id) in &persisted.approved_ids {
            approved_trie.insert(path, path_id.clone());
        }

        let mut provided_trie = PathTrie::new();
        if let Some(provided) = &persisted.provided {
            for (path, path_id) in &provided.path_ids {
                provided_trie.insert(path, path_id.clone());
            }
        }

        Self {
            id: persisted.id,
            host: persisted.host,
            port: persisted.port,
            config,
            state: Mutex::new(SpecState {
                learning: persisted.learning,
                approved: persisted.approved,
                approved_ids: persisted.approved_ids,
                approved_trie,
                security_schemes: persisted.security_schemes,
                provided: persisted.provided,
                provided_trie,
            }),
        }
    }
}
