//! # Spec Registry
//!
//! Maps a destination network address (host:port) to an independent
//! [`Spec`] instance. The registry is an explicit object owning a
//! concurrent-safe map; each spec is independently lockable, so distinct
//! addresses never contend. Whole-state persistence lives here: the
//! registry encodes to a byte stream and decodes back with a freshly
//! supplied runtime configuration re-attached.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::Config;
use crate::diff::ApiDiff;
use crate::spec::{PersistedSpec, Spec, SpecKind};
use crate::telemetry::Interaction;
use crate::{Error, Result};

/// Registry key: one spec per (host, port)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpecKey {
    pub host: String,
    pub port: u16,
}

impl SpecKey {
    /// Parse a `host:port` destination address
    pub fn parse(address: &str) -> Result<Self> {
        let (host, port) = address
            .rsplit_once(':')
            .ok_or_else(|| Error::validation(format!("invalid destination address '{}'", address)))?;
        if host.is_empty() {
            return Err(Error::validation(format!("invalid destination address '{}'", address)));
        }
        let port: u16 = port.parse().map_err(|_| {
            Error::validation(format!("invalid port in destination address '{}'", address))
        })?;
        Ok(Self { host: host.to_string(), port })
    }
}

impl std::fmt::Display for SpecKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedRegistry {
    specs: Vec<PersistedSpec>,
}

/// Registry of all known specs
#[derive(Debug)]
pub struct SpecRegistry {
    specs: DashMap<SpecKey, Arc<Spec>>,
    config: Arc<Config>,
}

impl SpecRegistry {
    pub fn new(config: Config) -> Self {
        Self { specs: DashMap::new(), config: Arc::new(config) }
    }

    pub fn get(&self, key: &SpecKey) -> Option<Arc<Spec>> {
        self.specs.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Fetch the spec for a key, creating it on first sight.
    pub fn get_or_create(&self, key: SpecKey) -> Arc<Spec> {
        let entry = self
            .specs
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Spec::new(&key.host, key.port, Arc::clone(&self.config))));
        Arc::clone(entry.value())
    }

    /// Route one interaction to its spec (created on demand) and learn it.
    pub fn learn_telemetry(&self, interaction: &Interaction) -> Result<()> {
        let key = SpecKey::parse(&interaction.destination_address)?;
        self.get_or_create(key).learn_telemetry(interaction)
    }

    /// Route one interaction to its spec and classify it against the given
    /// base spec. Unknown addresses are an error: there is nothing to diff
    /// against.
    pub fn diff_telemetry(&self, interaction: &Interaction, kind: SpecKind) -> Result<ApiDiff> {
        let key = SpecKey::parse(&interaction.destination_address)?;
        let spec = self
            .get(&key)
            .ok_or_else(|| Error::not_found("spec", key.to_string()))?;
        spec.diff_telemetry(interaction, kind)
    }

    /// Snapshot of all registered specs, ordered by address.
    pub fn specs(&self) -> Vec<Arc<Spec>> {
        let mut specs: Vec<Arc<Spec>> =
            self.specs.iter().map(|entry| Arc::clone(entry.value())).collect();
        specs.sort_by_key(|spec| spec.address());
        specs
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Encode the whole registry to a byte stream.
    pub fn encode_state(&self) -> Result<Vec<u8>> {
        let persisted =
            PersistedRegistry { specs: self.specs().iter().map(|spec| spec.to_persisted()).collect() };
        serde_json::to_vec(&persisted)
            .map_err(|source| Error::serialization(source, "failed to encode registry state"))
    }

    /// Decode a previously encoded registry, re-attaching the supplied
    /// runtime configuration. A corrupt stream is fatal: no partial
    /// registry is returned.
    pub fn decode_state(bytes: &[u8], config: Config) -> Result<Self> {
        let persisted: PersistedRegistry = serde_json::from_slice(bytes).map_err(|source| {
            Error::state_with_source("persisted state is corrupt or incompatible", Box::new(source))
        })?;

        let registry = Self::new(config);
        for spec in persisted.specs {
            let key = SpecKey { host: spec.host.clone(), port: spec.port };
            let spec = Spec::from_persisted(spec, Arc::clone(&registry.config));
            registry.specs.insert(key, Arc::new(spec));
        }

        info!(specs = registry.specs.len(), "decoded registry state");
        Ok(registry)
    }
}
