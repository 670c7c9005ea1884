//! # Interaction Records
//!
//! One captured HTTP request/response pair ("interaction") is the unit of
//! learning and diffing input. Records are serde-friendly so capture files
//! can be read from disk; bodies travel base64-encoded so binary payloads
//! survive JSON transport.

use std::path::Path;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One request or response header. Headers are ordered and duplicate keys
/// are allowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub key: String,
    pub value: String,
}

impl Header {
    pub fn new<K: Into<String>, V: Into<String>>(key: K, value: V) -> Self {
        Self { key: key.into(), value: value.into() }
    }
}

/// Captured request half of an interaction
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InteractionRequest {
    pub method: String,
    pub host: String,
    /// Request path, possibly carrying a query string.
    pub path: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default, with = "base64_bytes")]
    pub body: Bytes,
    /// Whether the captured body was cut short by the capture layer.
    #[serde(default)]
    pub truncated_body: bool,
}

/// Captured response half of an interaction
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InteractionResponse {
    pub status_code: u16,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default, with = "base64_bytes")]
    pub body: Bytes,
    #[serde(default)]
    pub truncated_body: bool,
}

/// One captured HTTP request/response pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    /// Caller-supplied identifier for the capture.
    pub request_id: String,
    /// Destination network address (`host:port`), used to route the
    /// interaction to the right spec instance.
    pub destination_address: String,
    pub request: InteractionRequest,
    pub response: InteractionResponse,
}

impl Interaction {
    /// The request path with any query string stripped
    pub fn request_path(&self) -> &str {
        match self.request.path.split_once('?') {
            Some((path, _)) => path,
            None => &self.request.path,
        }
    }

    /// The query-string portion of the request path, if any
    pub fn request_query(&self) -> Option<&str> {
        self.request.path.split_once('?').map(|(_, query)| query)
    }
}

/// Read interactions from a capture file: either a JSON array of records or
/// a single record object.
pub fn read_interactions_file(path: &Path) -> Result<Vec<Interaction>> {
    let raw = std::fs::read(path)?;
    let value: serde_json::Value = serde_json::from_slice(&raw).map_err(|source| {
        Error::serialization(source, format!("failed to parse capture file {}", path.display()))
    })?;

    let interactions = match value {
        serde_json::Value::Array(entries) => entries
            .into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<Interaction>, _>>(),
        object => serde_json::from_value(object).map(|interaction| vec![interaction]),
    }
    .map_err(|source| {
        Error::serialization(source, format!("invalid interaction record in {}", path.display()))
    })?;

    Ok(interactions)
}

/// Base64 transport encoding for body bytes
mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}
