//! Operation generation from a single interaction.
//!
//! Builds one [`Operation`] — parameters, request/response bodies, security —
//! from one captured request/response pair. Malformed fields are skipped with
//! a warning rather than aborting the whole call, except when the only
//! usable information was in the malformed field.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::config::GeneratorConfig;
use crate::domain::{
    MediaTypeObject, Operation, Parameter, ParameterLocation, RequestBody, Response,
    ResponseHeader, Schema, SecurityScheme,
};
use crate::inference::security::SecurityDetector;
use crate::inference::value::{infer_delimited_value, infer_json_value, infer_repeatable_values};
use crate::telemetry::{Header, Interaction};
use crate::{Error, Result};

const CONTENT_TYPE_HEADER: &str = "content-type";
const AUTHORIZATION_HEADER: &str = "authorization";
const COOKIE_HEADER: &str = "cookie";

/// Builds one operation per interaction.
#[derive(Debug)]
pub struct OperationGenerator<'a> {
    config: &'a GeneratorConfig,
}

impl<'a> OperationGenerator<'a> {
    pub fn new(config: &'a GeneratorConfig) -> Self {
        Self { config }
    }

    /// Generate an operation from an interaction, registering any discovered
    /// security schemes in `schemes`.
    pub fn generate(
        &self,
        interaction: &Interaction,
        schemes: &mut BTreeMap<String, SecurityScheme>,
    ) -> Result<Operation> {
        let mut detector = SecurityDetector::new();
        let mut operation = Operation::default();

        self.add_request_headers(interaction, &mut detector, &mut operation);
        self.add_query_parameters(interaction, &mut detector, &mut operation);
        self.add_request_body(interaction, &mut detector, &mut operation);
        self.add_response(interaction, &mut operation)?;

        operation.security = detector.finish(schemes);
        Ok(operation)
    }

    fn add_request_headers(
        &self,
        interaction: &Interaction,
        detector: &mut SecurityDetector,
        operation: &mut Operation,
    ) {
        let mut seen: Vec<String> = Vec::new();

        for header in &interaction.request.headers {
            let lowercase = header.key.to_ascii_lowercase();
            match lowercase.as_str() {
                AUTHORIZATION_HEADER => {
                    detector.inspect_authorization_header(&header.value);
                    continue;
                }
                COOKIE_HEADER => {
                    add_cookie_parameters(&header.value, operation);
                    continue;
                }
                CONTENT_TYPE_HEADER => continue,
                _ => {}
            }
            if self.config.ignores_request_header(&lowercase) {
                continue;
            }
            if detector.inspect_header(&header.key, &header.value) {
                continue;
            }
            // Headers may repeat; the first instance wins.
            if seen.contains(&lowercase) {
                continue;
            }
            seen.push(lowercase);

            operation.parameters.push(Parameter::new(
                header.key.clone(),
                ParameterLocation::Header,
                infer_delimited_value(&header.value),
            ));
        }
    }

    fn add_query_parameters(
        &self,
        interaction: &Interaction,
        detector: &mut SecurityDetector,
        operation: &mut Operation,
    ) {
        let Some(query) = interaction.request_query() else {
            return;
        };

        for (name, values) in group_form_pairs(query) {
            let consumed = values
                .first()
                .is_some_and(|value| detector.inspect_query_param(&name, value));
            if consumed {
                continue;
            }
            operation.parameters.push(Parameter::new(
                name,
                ParameterLocation::Query,
                infer_repeatable_values(&values),
            ));
        }
    }

    fn add_request_body(
        &self,
        interaction: &Interaction,
        detector: &mut SecurityDetector,
        operation: &mut Operation,
    ) {
        let body = &interaction.request.body;
        if body.is_empty() {
            return;
        }
        if interaction.request.truncated_body {
            debug!(
                request_id = %interaction.request_id,
                "request body was truncated at capture; skipping body inference"
            );
            return;
        }

        let Some(content_type) = header_value(&interaction.request.headers, CONTENT_TYPE_HEADER)
        else {
            warn!(
                request_id = %interaction.request_id,
                "request has a body but no content type; skipping body inference"
            );
            return;
        };

        match infer_body_schema(content_type, body, detector) {
            Ok(Some((media_type, schema))) => {
                operation.request_body = Some(RequestBody {
                    content: BTreeMap::from([(media_type, MediaTypeObject { schema: Some(schema) })]),
                });
            }
            Ok(None) => {}
            Err(message) => {
                warn!(
                    request_id = %interaction.request_id,
                    error = %message,
                    "failed to infer request body schema; skipping"
                );
            }
        }
    }

    fn add_response(&self, interaction: &Interaction, operation: &mut Operation) -> Result<()> {
        let status = http::StatusCode::from_u16(interaction.response.status_code)
            .map_err(|_| {
                Error::validation(format!(
                    "invalid response status code {}",
                    interaction.response.status_code
                ))
            })?;

        let mut response = Response {
            description: status.canonical_reason().unwrap_or("Response").to_string(),
            headers: BTreeMap::new(),
            content: BTreeMap::new(),
        };

        for header in &interaction.response.headers {
            let lowercase = header.key.to_ascii_lowercase();
            if lowercase == CONTENT_TYPE_HEADER
                || self.config.ignores_response_header(&lowercase)
                || response.headers.contains_key(&header.key)
            {
                continue;
            }
            response.headers.insert(
                header.key.clone(),
                ResponseHeader { schema: infer_delimited_value(&header.value) },
            );
        }

        let body = &interaction.response.body;
        if !body.is_empty() && !interaction.response.truncated_body {
            if let Some(content_type) =
                header_value(&interaction.response.headers, CONTENT_TYPE_HEADER)
            {
                let mut ignored = SecurityDetector::new();
                match infer_body_schema(content_type, body, &mut ignored) {
                    Ok(Some((media_type, schema))) => {
                        response
                            .content
                            .insert(media_type, MediaTypeObject { schema: Some(schema) });
                    }
                    Ok(None) => {}
                    Err(message) => {
                        warn!(
                            request_id = %interaction.request_id,
                            error = %message,
                            "failed to infer response body schema; skipping"
                        );
                    }
                }
            }
        }

        operation.responses.insert(status.as_u16().to_string(), response);
        Ok(())
    }
}

/// Infer a body schema from its content type. JSON-family and
/// form-urlencoded bodies are supported; other content types are skipped.
fn infer_body_schema(
    content_type: &str,
    body: &[u8],
    detector: &mut SecurityDetector,
) -> std::result::Result<Option<(String, Schema)>, String> {
    let mime: mime::Mime = content_type
        .parse()
        .map_err(|_| format!("unparseable content type '{}'", content_type))?;

    if mime.subtype() == mime::JSON || mime.suffix() == Some(mime::JSON) {
        let value: serde_json::Value =
            serde_json::from_slice(body).map_err(|error| format!("invalid JSON body: {}", error))?;
        return Ok(Some((mime.essence_str().to_string(), infer_json_value(&value))));
    }

    if mime.essence_str() == "application/x-www-form-urlencoded" {
        let text = std::str::from_utf8(body)
            .map_err(|_| "form body is not valid UTF-8".to_string())?;
        let mut properties = BTreeMap::new();
        for (name, values) in group_form_pairs(text) {
            let consumed = values
                .first()
                .is_some_and(|value| detector.inspect_form_field(&name, value));
            if consumed {
                continue;
            }
            let schema = infer_repeatable_values(&values);
            properties.insert(name, schema);
        }
        return Ok(Some((mime.essence_str().to_string(), Schema::Object(properties))));
    }

    debug!(content_type = %content_type, "unsupported content type; skipping body");
    Ok(None)
}

/// Decode `name=value&name=value` pairs, grouping repeated keys in first-seen
/// order.
fn group_form_pairs(encoded: &str) -> Vec<(String, Vec<String>)> {
    let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
    for (name, value) in url::form_urlencoded::parse(encoded.as_bytes()) {
        if name.is_empty() {
            continue;
        }
        match grouped.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, values)) => values.push(value.into_owned()),
            None => grouped.push((name.into_owned(), vec![value.into_owned()])),
        }
    }
    grouped
}

fn add_cookie_parameters(cookie_header: &str, operation: &mut Operation) {
    for pair in cookie_header.split(';') {
        let Some((name, value)) = pair.trim().split_once('=') else {
            continue;
        };
        if name.is_empty() {
            continue;
        }
        operation.parameters.push(Parameter::new(
            name,
            ParameterLocation::Cookie,
            infer_delimited_value(value),
        ));
    }
}

fn header_value<'h>(headers: &'h [Header], name: &str) -> Option<&'h str> {
    headers
        .iter()
        .find(|header| header.key.eq_ignore_ascii_case(name))
        .map(|header| header.value.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StringFormat;
    use crate::inference::security::BASIC_AUTH_SCHEME;
    use crate::telemetry::{InteractionRequest, InteractionResponse};
    use bytes::Bytes;

    fn interaction(path: &str) -> Interaction {
        Interaction {
            request_id: "req-1".to_string(),
            destination_address: "example.com:80".to_string(),
            request: InteractionRequest {
                method: "GET".to_string(),
                host: "example.com".to_string(),
                path: path.to_string(),
                ..Default::default()
            },
            response: InteractionResponse { status_code: 200, ..Default::default() },
        }
    }

    fn generate(interaction: &Interaction) -> Operation {
        let config = GeneratorConfig::default();
        let generator = OperationGenerator::new(&config);
        generator.generate(interaction, &mut BTreeMap::new()).unwrap()
    }

    fn find_param<'o>(
        operation: &'o Operation,
        name: &str,
        location: ParameterLocation,
    ) -> Option<&'o Parameter> {
        operation
            .parameters
            .iter()
            .find(|parameter| parameter.name == name && parameter.location == location)
    }

    #[test]
    fn test_query_parameters_inferred() {
        let operation = generate(&interaction("/items?limit=10&active=true&name=widget"));

        assert_eq!(
            find_param(&operation, "limit", ParameterLocation::Query).unwrap().schema,
            Schema::Integer
        );
        assert_eq!(
            find_param(&operation, "active", ParameterLocation::Query).unwrap().schema,
            Schema::Boolean
        );
        assert_eq!(
            find_param(&operation, "name", ParameterLocation::Query).unwrap().schema,
            Schema::plain_string()
        );
    }

    #[test]
    fn test_repeated_query_key_becomes_array() {
        let operation = generate(&interaction("/items?id=1&id=2"));
        assert_eq!(
            find_param(&operation, "id", ParameterLocation::Query).unwrap().schema,
            Schema::Array(Box::new(Schema::Integer))
        );
    }

    #[test]
    fn test_headers_become_parameters_and_ignored_headers_are_skipped() {
        let mut capture = interaction("/items");
        capture.request.headers = vec![
            Header::new("X-Request-Count", "5"),
            Header::new("User-Agent", "curl/8.0"),
            Header::new("X-Tags", "a,b,c"),
        ];
        let operation = generate(&capture);

        assert_eq!(
            find_param(&operation, "X-Request-Count", ParameterLocation::Header).unwrap().schema,
            Schema::Integer
        );
        assert!(find_param(&operation, "User-Agent", ParameterLocation::Header).is_none());
        assert_eq!(
            find_param(&operation, "X-Tags", ParameterLocation::Header).unwrap().schema,
            Schema::Array(Box::new(Schema::plain_string()))
        );
    }

    #[test]
    fn test_cookie_header_becomes_cookie_parameters() {
        let mut capture = interaction("/items");
        capture.request.headers = vec![Header::new("Cookie", "session=abc123; count=3")];
        let operation = generate(&capture);

        assert!(find_param(&operation, "session", ParameterLocation::Cookie).is_some());
        assert_eq!(
            find_param(&operation, "count", ParameterLocation::Cookie).unwrap().schema,
            Schema::Integer
        );
        assert!(find_param(&operation, "Cookie", ParameterLocation::Header).is_none());
    }

    #[test]
    fn test_json_request_body_inferred() {
        let mut capture = interaction("/items");
        capture.request.headers = vec![Header::new("Content-Type", "application/json")];
        capture.request.body = Bytes::from_static(br#"{"name":"widget","price":9.5}"#);
        let operation = generate(&capture);

        let body = operation.request_body.unwrap();
        let schema = body.content["application/json"].schema.clone().unwrap();
        let Schema::Object(properties) = schema else { panic!("expected object") };
        assert_eq!(properties["name"], Schema::plain_string());
        assert_eq!(properties["price"], Schema::Number);
    }

    #[test]
    fn test_malformed_json_body_is_skipped_not_fatal() {
        let mut capture = interaction("/items");
        capture.request.headers = vec![Header::new("Content-Type", "application/json")];
        capture.request.body = Bytes::from_static(b"{not json");
        let operation = generate(&capture);
        assert!(operation.request_body.is_none());
        // The response was still recorded.
        assert!(operation.responses.contains_key("200"));
    }

    #[test]
    fn test_truncated_body_is_skipped() {
        let mut capture = interaction("/items");
        capture.request.headers = vec![Header::new("Content-Type", "application/json")];
        capture.request.body = Bytes::from_static(br#"{"name":"wid"#);
        capture.request.truncated_body = true;
        let operation = generate(&capture);
        assert!(operation.request_body.is_none());
    }

    #[test]
    fn test_form_body_inferred_as_object() {
        let mut capture = interaction("/login");
        capture.request.headers =
            vec![Header::new("Content-Type", "application/x-www-form-urlencoded")];
        capture.request.body = Bytes::from_static(b"user=jo&attempts=2");
        let operation = generate(&capture);

        let body = operation.request_body.unwrap();
        let schema = body.content["application/x-www-form-urlencoded"].schema.clone().unwrap();
        let Schema::Object(properties) = schema else { panic!("expected object") };
        assert_eq!(properties["user"], Schema::plain_string());
        assert_eq!(properties["attempts"], Schema::Integer);
    }

    #[test]
    fn test_unsupported_content_type_skipped() {
        let mut capture = interaction("/upload");
        capture.request.headers = vec![Header::new("Content-Type", "application/octet-stream")];
        capture.request.body = Bytes::from_static(&[0xde, 0xad, 0xbe, 0xef]);
        let operation = generate(&capture);
        assert!(operation.request_body.is_none());
    }

    #[test]
    fn test_response_recorded_with_canonical_description() {
        let mut capture = interaction("/items");
        capture.response.status_code = 404;
        let operation = generate(&capture);
        assert_eq!(operation.responses["404"].description, "Not Found");
    }

    #[test]
    fn test_invalid_status_code_is_an_error() {
        let mut capture = interaction("/items");
        capture.response.status_code = 42;
        let config = GeneratorConfig::default();
        let generator = OperationGenerator::new(&config);
        assert!(generator.generate(&capture, &mut BTreeMap::new()).is_err());
    }

    #[test]
    fn test_response_body_and_headers_inferred() {
        let mut capture = interaction("/items");
        capture.response.headers = vec![
            Header::new("Content-Type", "application/json"),
            Header::new("X-RateLimit-Remaining", "49"),
            Header::new("Date", "Wed, 18 Oct 2023 12:00:00 GMT"),
        ];
        capture.response.body = Bytes::from_static(br#"{"id":"550e8400-e29b-41d4-a716-446655440000"}"#);
        let operation = generate(&capture);

        let response = &operation.responses["200"];
        assert_eq!(
            response.headers["X-RateLimit-Remaining"].schema,
            Schema::Integer
        );
        assert!(!response.headers.contains_key("Date"));

        let schema = response.content["application/json"].schema.clone().unwrap();
        let Schema::Object(properties) = schema else { panic!("expected object") };
        assert_eq!(properties["id"], Schema::String(Some(StringFormat::Uuid)));
    }

    #[test]
    fn test_security_scheme_registered_from_authorization_header() {
        let mut capture = interaction("/items");
        capture.request.headers = vec![Header::new("Authorization", "Basic dXNlcjpwYXNz")];

        let config = GeneratorConfig::default();
        let generator = OperationGenerator::new(&config);
        let mut schemes = BTreeMap::new();
        let operation = generator.generate(&capture, &mut schemes).unwrap();

        assert_eq!(operation.security.len(), 1);
        assert!(schemes.contains_key(BASIC_AUTH_SCHEME));
        assert!(find_param(&operation, "Authorization", ParameterLocation::Header).is_none());
    }

    #[test]
    fn test_api_key_query_param_not_documented_as_parameter() {
        let operation = generate(&interaction("/items?api_key=secret&limit=5"));
        assert!(find_param(&operation, "api_key", ParameterLocation::Query).is_none());
        assert!(find_param(&operation, "limit", ParameterLocation::Query).is_some());
        assert_eq!(operation.security.len(), 1);
    }
}
