//! Inferred schema model.
//!
//! [`Schema`] is an explicit sum type over the value shapes the engine can
//! observe. Conversion to and from OpenAPI schema-object JSON happens at the
//! serde boundary via [`RawSchema`]; the rest of the engine only ever works
//! with the typed representation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Prefix used when serializing [`Schema::Reference`] as a JSON `$ref`.
pub const SCHEMA_REF_PREFIX: &str = "#/components/schemas/";

/// Detected format for string values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StringFormat {
    Uuid,
    Email,
    Ipv4,
    Ipv6,
    Date,
    Time,
    DateTime,
    JsonPointer,
}

impl StringFormat {
    /// Parse an OpenAPI format string; unknown formats map to `None`.
    pub fn parse(raw: &str) -> Option<StringFormat> {
        match raw {
            "uuid" => Some(StringFormat::Uuid),
            "email" => Some(StringFormat::Email),
            "ipv4" => Some(StringFormat::Ipv4),
            "ipv6" => Some(StringFormat::Ipv6),
            "date" => Some(StringFormat::Date),
            "time" => Some(StringFormat::Time),
            "date-time" => Some(StringFormat::DateTime),
            "json-pointer" => Some(StringFormat::JsonPointer),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StringFormat::Uuid => "uuid",
            StringFormat::Email => "email",
            StringFormat::Ipv4 => "ipv4",
            StringFormat::Ipv6 => "ipv6",
            StringFormat::Date => "date",
            StringFormat::Time => "time",
            StringFormat::DateTime => "date-time",
            StringFormat::JsonPointer => "json-pointer",
        }
    }
}

/// An inferred schema.
///
/// Invariant: a schema is never both "has properties" and "is a reference" —
/// reference extraction rewrites an [`Schema::Object`] into a
/// [`Schema::Reference`], it never annotates one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSchema", into = "RawSchema")]
pub enum Schema {
    Boolean,
    Integer,
    Number,
    String(Option<StringFormat>),
    Array(Box<Schema>),
    Object(BTreeMap<String, Schema>),
    /// Minimal mixed-type fallback for heterogeneous arrays; never produced
    /// anywhere else.
    Mixed(Vec<Schema>),
    /// Reference to a named entry in the definitions table (bare name).
    Reference(String),
}

impl Schema {
    /// Plain string schema without a detected format
    pub fn plain_string() -> Schema {
        Schema::String(None)
    }

    /// The OpenAPI type tag used in conflict reports and mixed-type ordering
    pub fn type_name(&self) -> &'static str {
        match self {
            Schema::Boolean => "boolean",
            Schema::Integer => "integer",
            Schema::Number => "number",
            Schema::String(_) => "string",
            Schema::Array(_) => "array",
            Schema::Object(_) => "object",
            Schema::Mixed(_) => "oneOf",
            Schema::Reference(_) => "$ref",
        }
    }

    /// Whether this is an object schema with at least one property
    pub fn has_properties(&self) -> bool {
        matches!(self, Schema::Object(properties) if !properties.is_empty())
    }
}

/// Serde-facing OpenAPI schema object. All fields optional; the typed
/// [`Schema`] enforces which combinations are meaningful.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawSchema {
    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    reference: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    schema_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    items: Option<Box<RawSchema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    properties: Option<BTreeMap<String, RawSchema>>,
    #[serde(rename = "oneOf", skip_serializing_if = "Option::is_none")]
    one_of: Option<Vec<RawSchema>>,
}

impl From<Schema> for RawSchema {
    fn from(schema: Schema) -> Self {
        match schema {
            Schema::Boolean => RawSchema { schema_type: Some("boolean".into()), ..Default::default() },
            Schema::Integer => RawSchema { schema_type: Some("integer".into()), ..Default::default() },
            Schema::Number => RawSchema { schema_type: Some("number".into()), ..Default::default() },
            Schema::String(format) => RawSchema {
                schema_type: Some("string".into()),
                format: format.map(|format| format.as_str().to_string()),
                ..Default::default()
            },
            Schema::Array(items) => RawSchema {
                schema_type: Some("array".into()),
                items: Some(Box::new(RawSchema::from(*items))),
                ..Default::default()
            },
            Schema::Object(properties) => RawSchema {
                schema_type: Some("object".into()),
                properties: if properties.is_empty() {
                    None
                } else {
                    Some(
                        properties
                            .into_iter()
                            .map(|(name, prop)| (name, RawSchema::from(prop)))
                            .collect(),
                    )
                },
                ..Default::default()
            },
            Schema::Mixed(variants) => RawSchema {
                one_of: Some(variants.into_iter().map(RawSchema::from).collect()),
                ..Default::default()
            },
            Schema::Reference(name) => RawSchema {
                reference: Some(format!("{}{}", SCHEMA_REF_PREFIX, name)),
                ..Default::default()
            },
        }
    }
}

impl TryFrom<RawSchema> for Schema {
    type Error = String;

    fn try_from(raw: RawSchema) -> Result<Self, Self::Error> {
        if let Some(reference) = raw.reference {
            let name = reference.strip_prefix(SCHEMA_REF_PREFIX).unwrap_or(&reference);
            return Ok(Schema::Reference(name.to_string()));
        }

        if let Some(variants) = raw.one_of {
            let variants: Result<Vec<Schema>, String> =
                variants.into_iter().map(Schema::try_from).collect();
            return Ok(Schema::Mixed(variants?));
        }

        match raw.schema_type.as_deref() {
            Some("boolean") => Ok(Schema::Boolean),
            Some("integer") => Ok(Schema::Integer),
            Some("number") => Ok(Schema::Number),
            Some("string") => {
                // Unknown formats degrade to a formatless string.
                Ok(Schema::String(raw.format.as_deref().and_then(StringFormat::parse)))
            }
            Some("array") => {
                let items = match raw.items {
                    Some(items) => Schema::try_from(*items)?,
                    None => Schema::plain_string(),
                };
                Ok(Schema::Array(Box::new(items)))
            }
            Some("object") => {
                let properties = raw
                    .properties
                    .unwrap_or_default()
                    .into_iter()
                    .map(|(name, prop)| Ok((name, Schema::try_from(prop)?)))
                    .collect::<Result<BTreeMap<String, Schema>, String>>()?;
                Ok(Schema::Object(properties))
            }
            Some(other) => Err(format!("unsupported schema type '{}'", other)),
            None => Err("schema object carries no type, $ref, or oneOf".to_string()),
        }
    }
}
