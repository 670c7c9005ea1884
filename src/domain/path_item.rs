//! Path item model: per-method operations plus path-level parameters.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::operation::{Operation, Parameter};

/// HTTP methods an operation can be recorded under
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
    Options,
    Head,
    Patch,
}

impl Method {
    pub const ALL: [Method; 7] = [
        Method::Get,
        Method::Put,
        Method::Post,
        Method::Delete,
        Method::Options,
        Method::Head,
        Method::Patch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "get",
            Method::Put => "put",
            Method::Post => "post",
            Method::Delete => "delete",
            Method::Options => "options",
            Method::Head => "head",
            Method::Patch => "patch",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = crate::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "PUT" => Ok(Method::Put),
            "POST" => Ok(Method::Post),
            "DELETE" => Ok(Method::Delete),
            "OPTIONS" => Ok(Method::Options),
            "HEAD" => Ok(Method::Head),
            "PATCH" => Ok(Method::Patch),
            other => Err(crate::Error::validation(format!("unsupported HTTP method '{}'", other))),
        }
    }
}

/// One path entry: up to one operation per method plus path-level parameters
/// (the schemas of `{param}` segments).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PathItem {
    #[serde(flatten)]
    pub operations: BTreeMap<Method, Operation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
}

impl PathItem {
    /// Create a path item holding a single operation
    pub fn with_operation(method: Method, operation: Operation) -> Self {
        Self { operations: BTreeMap::from([(method, operation)]), parameters: Vec::new() }
    }

    pub fn operation(&self, method: Method) -> Option<&Operation> {
        self.operations.get(&method)
    }

    pub fn insert_operation(&mut self, method: Method, operation: Operation) {
        self.operations.insert(method, operation);
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
