use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::Deserialize;
use serde::de::{Deserializer, IgnoredAny, MapAccess, Visitor};
use serde_json::{Map, Value};

pub const JSON_MEDIA_TYPE: &str = "application/json";

#[derive(Debug, Default, Deserialize)]
pub struct OpenApiDocument {
    #[serde(default, deserialize_with = "nullable")]
    pub paths: IndexMap<String, PathItem>,
}

impl OpenApiDocument {
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read openapi json '{}'", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse openapi json '{}'", path.display()))
    }
}

/// The operations of one path, in document order.
#[derive(Debug, Default)]
pub struct PathItem {
    pub operations: Vec<(HttpMethod, Operation)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Put,
    Post,
    Delete,
    Options,
    Head,
    Patch,
    Trace,
}

impl HttpMethod {
    pub fn from_key(key: &str) -> Option<Self> {
        let method = match key.to_ascii_lowercase().as_str() {
            "get" => Self::Get,
            "put" => Self::Put,
            "post" => Self::Post,
            "delete" => Self::Delete,
            "options" => Self::Options,
            "head" => Self::Head,
            "patch" => Self::Patch,
            "trace" => Self::Trace,
            _ => return None,
        };
        Some(method)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Post => "POST",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
            Self::Head => "HEAD",
            Self::Patch => "PATCH",
            Self::Trace => "TRACE",
        }
    }

    /// Methods whose requests carry a JSON body in the collection format.
    pub fn has_body(self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub summary: Option<String>,
    pub operation_id: Option<String>,
    pub request_body: Option<RequestBody>,
    #[serde(default, deserialize_with = "nullable")]
    pub responses: IndexMap<String, Response>,
    #[serde(default, deserialize_with = "object_entries")]
    pub security: Vec<SecurityRequirement>,
}

/// Scheme name to required scopes.
pub type SecurityRequirement = Map<String, Value>;

#[derive(Debug, Default, Deserialize)]
pub struct RequestBody {
    #[serde(default, deserialize_with = "nullable")]
    pub content: IndexMap<String, MediaType>,
}

impl RequestBody {
    pub fn json_examples(&self) -> Option<&IndexMap<String, Example>> {
        self.content.get(JSON_MEDIA_TYPE).map(|media| &media.examples)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Response {
    #[serde(default, deserialize_with = "nullable")]
    pub content: IndexMap<String, MediaType>,
}

impl Response {
    pub fn json_examples(&self) -> Option<&IndexMap<String, Example>> {
        self.content.get(JSON_MEDIA_TYPE).map(|media| &media.examples)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct MediaType {
    #[serde(default, deserialize_with = "nullable")]
    pub examples: IndexMap<String, Example>,
}

/// A named example. Entries that are not objects carry no value.
#[derive(Debug, Default)]
pub struct Example {
    pub value: Option<Value>,
}

impl<'de> Deserialize<'de> for Example {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = match Value::deserialize(deserializer)? {
            Value::Object(mut fields) => fields.remove("value"),
            _ => None,
        };
        Ok(Self { value })
    }
}

impl Example {
    /// The example payload when it is a JSON object.
    pub fn object_value(&self) -> Option<&Value> {
        self.value.as_ref().filter(|value| value.is_object())
    }
}

/// Treats an explicit `null` the same as a missing field.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Keeps the object entries of a sequence and drops everything else.
fn object_entries<'de, D>(deserializer: D) -> Result<Vec<Map<String, Value>>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries: Vec<Value> = nullable(deserializer)?;
    Ok(entries
        .into_iter()
        .filter_map(|entry| match entry {
            Value::Object(fields) => Some(fields),
            _ => None,
        })
        .collect())
}

impl<'de> Deserialize<'de> for PathItem {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PathItemVisitor;

        impl<'de> Visitor<'de> for PathItemVisitor {
            type Value = PathItem;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an OpenAPI path item object")
            }

            fn visit_map<A>(self, mut map: A) -> Result<PathItem, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut operations = Vec::new();
                while let Some(key) = map.next_key::<String>()? {
                    match HttpMethod::from_key(&key) {
                        Some(method) => operations.push((method, map.next_value()?)),
                        None => {
                            map.next_value::<IgnoredAny>()?;
                        }
                    }
                }
                Ok(PathItem { operations })
            }
        }

        deserializer.deserialize_map(PathItemVisitor)
    }
}
