use serde_json::{Map, Value};

use crate::collection::EndpointKey;
use crate::openapi::{HttpMethod, OpenApiDocument, Operation};

pub const BASE_URL_PLACEHOLDER: &str = "{{baseUrl}}";
pub const BEARER_SCHEME: &str = "bearerAuth";

/// Request example name that is left out of example labels.
const DEFAULT_EXAMPLE_NAME: &str = "default";

#[derive(Debug, Clone, PartialEq)]
pub struct OperationRecord {
    pub method: HttpMethod,
    pub url: String,
    pub name: String,
    /// Primary request payload, always a JSON object.
    pub body: Value,
    pub bearer_auth: bool,
    pub examples: Vec<ExamplePair>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExamplePair {
    pub name: String,
    pub status: u64,
    pub status_text: &'static str,
    pub request_body: Value,
    pub response_body: Value,
}

impl OperationRecord {
    pub fn from_operation(path: &str, method: HttpMethod, operation: &Operation) -> Self {
        let name = display_name(path, method, operation);
        let body = primary_body(operation);
        let examples = example_pairs(operation, &body);
        Self {
            method,
            url: format!("{BASE_URL_PLACEHOLDER}{path}"),
            name,
            body,
            bearer_auth: requires_bearer(operation),
            examples,
        }
    }

    pub fn key(&self) -> EndpointKey {
        EndpointKey::new(self.method.as_str(), &self.url)
    }
}

pub fn extract_operations(doc: &OpenApiDocument) -> Vec<OperationRecord> {
    doc.paths
        .iter()
        .flat_map(|(path, item)| {
            item.operations
                .iter()
                .map(move |(method, op)| OperationRecord::from_operation(path, *method, op))
        })
        .collect()
}

fn display_name(path: &str, method: HttpMethod, operation: &Operation) -> String {
    [&operation.summary, &operation.operation_id]
        .into_iter()
        .flatten()
        .find(|candidate| !candidate.is_empty())
        .cloned()
        .unwrap_or_else(|| format!("{method} {path}"))
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Value of the first declared JSON request example, or `{}`.
fn primary_body(operation: &Operation) -> Value {
    operation
        .request_body
        .as_ref()
        .and_then(|body| body.json_examples())
        .and_then(|examples| examples.values().next())
        .and_then(|example| example.object_value())
        .cloned()
        .unwrap_or_else(empty_object)
}

fn requires_bearer(operation: &Operation) -> bool {
    operation
        .security
        .iter()
        .any(|requirement| requirement.contains_key(BEARER_SCHEME))
}

/// The request example every response example is paired with: the first one
/// holding an object value, else the primary body under the default name.
fn pairing_request(operation: &Operation, default_body: &Value) -> (String, Value) {
    operation
        .request_body
        .as_ref()
        .and_then(|body| body.json_examples())
        .and_then(|examples| {
            examples
                .iter()
                .find_map(|(name, example)| Some((name.clone(), example.object_value()?.clone())))
        })
        .unwrap_or_else(|| (DEFAULT_EXAMPLE_NAME.to_string(), default_body.clone()))
}

fn example_pairs(operation: &Operation, default_body: &Value) -> Vec<ExamplePair> {
    let (request_name, request_body) = pairing_request(operation, default_body);
    let label = |base: &str| {
        if request_name == DEFAULT_EXAMPLE_NAME {
            base.to_string()
        } else {
            format!("{base} ({request_name})")
        }
    };

    let mut pairs = Vec::new();
    for (code, response) in &operation.responses {
        let status = parse_status(code);
        let status_text = status_text(code);
        let examples = response.json_examples().filter(|examples| !examples.is_empty());

        match examples {
            Some(examples) => {
                for (name, example) in examples {
                    pairs.push(ExamplePair {
                        name: label(name),
                        status,
                        status_text,
                        request_body: request_body.clone(),
                        response_body: example.object_value().cloned().unwrap_or_else(empty_object),
                    });
                }
            }
            None => pairs.push(ExamplePair {
                name: label(&format!("status{code}")),
                status,
                status_text,
                request_body: request_body.clone(),
                response_body: empty_object(),
            }),
        }
    }
    pairs
}

/// Numeric status for a response key; `default`, `2XX` and the like map to 200.
/// All-digit keys are kept as written, even outside the HTTP range.
fn parse_status(code: &str) -> u64 {
    if !code.is_empty() && code.bytes().all(|b| b.is_ascii_digit()) {
        code.parse().unwrap_or(200)
    } else {
        200
    }
}

fn status_text(code: &str) -> &'static str {
    match code {
        "200" => "OK",
        "201" => "Created",
        "204" => "No Content",
        "400" => "Bad Request",
        "401" => "Unauthorized",
        "403" => "Forbidden",
        "404" => "Not Found",
        "409" => "Conflict",
        "500" => "Internal Server Error",
        "503" => "Service Unavailable",
        _ => "Response",
    }
}
