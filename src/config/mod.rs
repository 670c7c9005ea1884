//! # Configuration Management
//!
//! Runtime configuration for the inference engine. Configuration is loaded
//! from environment variables with sensible defaults and is deliberately not
//! part of persisted state: decoded state gets a freshly loaded configuration
//! re-attached.

use serde::{Deserialize, Serialize};

use crate::Result;

/// Top-level engine configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub generator: GeneratorConfig,
    pub normalization: PathNormalizationConfig,
}

/// Configuration for operation generation from interactions
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Request header names (lowercase) excluded from inferred parameters
    pub request_headers_to_ignore: Vec<String>,
    /// Response header names (lowercase) excluded from inferred response headers
    pub response_headers_to_ignore: Vec<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            request_headers_to_ignore: [
                "accept",
                "accept-encoding",
                "accept-language",
                "cache-control",
                "connection",
                "content-length",
                "host",
                "origin",
                "pragma",
                "referer",
                "user-agent",
            ]
            .iter()
            .map(|header| header.to_string())
            .collect(),
            response_headers_to_ignore: [
                "age",
                "cache-control",
                "connection",
                "content-length",
                "date",
                "keep-alive",
                "server",
                "transfer-encoding",
                "vary",
            ]
            .iter()
            .map(|header| header.to_string())
            .collect(),
        }
    }
}

impl GeneratorConfig {
    /// Check whether a request header is excluded from parameter inference
    pub fn ignores_request_header(&self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        self.request_headers_to_ignore.iter().any(|ignored| *ignored == name)
    }

    /// Check whether a response header is excluded from response-header inference
    pub fn ignores_response_header(&self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        self.response_headers_to_ignore.iter().any(|ignored| *ignored == name)
    }
}

/// Configuration for path parameterization in suggested reviews
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathNormalizationConfig {
    /// Enable path parameterization (default: true)
    pub enabled: bool,

    /// Minimum segment length to consider for parameterization (default: 1)
    pub min_param_length: usize,

    /// Maximum segment length to consider for parameterization (default: 100)
    pub max_param_length: usize,
}

impl Default for PathNormalizationConfig {
    fn default() -> Self {
        Self { enabled: true, min_param_length: 1, max_param_length: 100 }
    }
}

impl Config {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Ok(headers) = std::env::var("SPECSIFT_REQUEST_HEADERS_TO_IGNORE") {
            config.generator.request_headers_to_ignore = parse_header_list(&headers);
        }
        if let Ok(headers) = std::env::var("SPECSIFT_RESPONSE_HEADERS_TO_IGNORE") {
            config.generator.response_headers_to_ignore = parse_header_list(&headers);
        }
        if let Ok(enabled) = std::env::var("SPECSIFT_PATH_NORMALIZATION") {
            config.normalization.enabled = enabled
                .parse()
                .map_err(|_| crate::Error::validation("SPECSIFT_PATH_NORMALIZATION must be a boolean"))?;
        }

        Ok(config)
    }
}

fn parse_header_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|header| header.trim().to_ascii_lowercase())
        .filter(|header| !header.is_empty())
        .collect()
}
