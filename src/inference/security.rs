//! Security-credential recognition.
//!
//! Inspects authorization headers, well-known API-key parameter names, and
//! OAuth2 access-token parameters, and turns what it finds into OpenAPI
//! security-scheme declarations plus per-operation security requirements.
//! When one request carries several credential-delivery mechanisms at once,
//! the first-seen one is kept and the rest are logged (a policy decision,
//! not an error).

use std::collections::BTreeMap;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use tracing::{debug, warn};

use crate::domain::{
    ApiKeyLocation, HttpAuthScheme, OAuthFlow, OAuthFlows, SecurityRequirement, SecurityScheme,
};

/// Scheme-table key for HTTP basic credentials
pub const BASIC_AUTH_SCHEME: &str = "BasicAuth";
/// Scheme-table key for HTTP bearer credentials
pub const BEARER_AUTH_SCHEME: &str = "BearerAuth";
/// Scheme-table key for OAuth2 credentials
pub const OAUTH2_SCHEME: &str = "OAuth2";
/// Scheme-table key for API-key credentials
pub const API_KEY_SCHEME: &str = "ApiKeyAuth";

const BASIC_PREFIX: &str = "Basic ";
const BEARER_PREFIX: &str = "Bearer ";

/// Well-known API-key header names (lowercase)
const API_KEY_HEADERS: [&str; 3] = ["x-api-key", "api-key", "apikey"];
/// Well-known API-key query-parameter names
const API_KEY_QUERY_PARAMS: [&str; 3] = ["api_key", "apikey", "api-key"];
/// OAuth2 access-token parameter name (query or form body)
const ACCESS_TOKEN_PARAM: &str = "access_token";

#[derive(Debug, Clone)]
struct DetectedScheme {
    name: String,
    scheme: SecurityScheme,
    scopes: Vec<String>,
}

/// Per-request credential detector. First-seen mechanism wins.
#[derive(Debug, Default)]
pub struct SecurityDetector {
    detected: Option<DetectedScheme>,
}

impl SecurityDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect an `Authorization` header value.
    pub fn inspect_authorization_header(&mut self, value: &str) {
        if let Some(credentials) = value.strip_prefix(BASIC_PREFIX) {
            if credentials.is_empty() {
                return;
            }
            self.record(DetectedScheme {
                name: BASIC_AUTH_SCHEME.to_string(),
                scheme: SecurityScheme::Http { scheme: HttpAuthScheme::Basic },
                scopes: Vec::new(),
            });
        } else if let Some(token) = value.strip_prefix(BEARER_PREFIX) {
            match parse_jwt_scopes(token) {
                Some(scopes) => self.record(oauth2_scheme(scopes)),
                None => self.record(DetectedScheme {
                    name: BEARER_AUTH_SCHEME.to_string(),
                    scheme: SecurityScheme::Http { scheme: HttpAuthScheme::Bearer },
                    scopes: Vec::new(),
                }),
            }
        }
    }

    /// Inspect a request header; returns true when it was consumed as a
    /// credential and should not be documented as a plain parameter.
    pub fn inspect_header(&mut self, name: &str, _value: &str) -> bool {
        let lowercase = name.to_ascii_lowercase();
        if !API_KEY_HEADERS.contains(&lowercase.as_str()) {
            return false;
        }
        self.record(DetectedScheme {
            name: API_KEY_SCHEME.to_string(),
            scheme: SecurityScheme::ApiKey {
                location: ApiKeyLocation::Header,
                name: name.to_string(),
            },
            scopes: Vec::new(),
        });
        true
    }

    /// Inspect a query parameter; returns true when consumed as a credential.
    pub fn inspect_query_param(&mut self, name: &str, _value: &str) -> bool {
        if name == ACCESS_TOKEN_PARAM {
            self.record(oauth2_scheme(Vec::new()));
            return true;
        }
        if API_KEY_QUERY_PARAMS.contains(&name) {
            self.record(DetectedScheme {
                name: API_KEY_SCHEME.to_string(),
                scheme: SecurityScheme::ApiKey {
                    location: ApiKeyLocation::Query,
                    name: name.to_string(),
                },
                scopes: Vec::new(),
            });
            return true;
        }
        false
    }

    /// Inspect a form-body field; returns true when consumed as a credential.
    pub fn inspect_form_field(&mut self, name: &str, _value: &str) -> bool {
        if name == ACCESS_TOKEN_PARAM {
            self.record(oauth2_scheme(Vec::new()));
            return true;
        }
        false
    }

    fn record(&mut self, candidate: DetectedScheme) {
        match &self.detected {
            Some(existing) => {
                warn!(
                    kept = %existing.name,
                    dropped = %candidate.name,
                    "request carries multiple credential mechanisms; keeping the first seen"
                );
            }
            None => self.detected = Some(candidate),
        }
    }

    /// Register the detected scheme in the shared security-schemes table
    /// (re-insertion under the same name overwrites) and return the
    /// operation's security requirements.
    pub fn finish(
        self,
        schemes: &mut BTreeMap<String, SecurityScheme>,
    ) -> Vec<SecurityRequirement> {
        let Some(detected) = self.detected else {
            return Vec::new();
        };
        schemes.insert(detected.name.clone(), detected.scheme);
        vec![SecurityRequirement::single(detected.name, detected.scopes)]
    }
}

fn oauth2_scheme(scopes: Vec<String>) -> DetectedScheme {
    DetectedScheme {
        name: OAUTH2_SCHEME.to_string(),
        scheme: SecurityScheme::OAuth2 {
            flows: OAuthFlows {
                client_credentials: Some(OAuthFlow {
                    token_url: String::new(),
                    scopes: scopes
                        .iter()
                        .map(|scope| (scope.clone(), String::new()))
                        .collect(),
                }),
            },
        },
        scopes,
    }
}

/// Decode the claims of a JWT without verifying its signature and extract
/// the `scope` claim. Returns `None` when the token is not a parsable JWT or
/// carries no scopes, in which case it is treated as a plain bearer token.
fn parse_jwt_scopes(token: &str) -> Option<Vec<String>> {
    let mut parts = token.split('.');
    let (_header, payload, _signature) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    let decoded = URL_SAFE_NO_PAD.decode(payload.as_bytes()).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&decoded).ok()?;
    let scope = claims.get("scope")?.as_str()?;

    let scopes: Vec<String> = scope.split_whitespace().map(|s| s.to_string()).collect();
    if scopes.is_empty() {
        debug!("bearer JWT carries an empty scope claim");
        return None;
    }
    Some(scopes)
}
