use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::extract::{ExamplePair, OperationRecord};
use crate::render;

/// Collection-level manifest; never indexed or written.
pub const COLLECTION_MANIFEST: &str = "opencollection.yml";
pub const ENDPOINT_EXTENSION: &str = "yml";
pub const TOKEN_PLACEHOLDER: &str = "{{token}}";

/// Identity of an endpoint file: uppercased method plus templated url.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointKey {
    pub method: String,
    pub url: String,
}

impl EndpointKey {
    pub fn new(method: &str, url: &str) -> Self {
        Self {
            method: method.to_uppercase(),
            url: url.to_string(),
        }
    }
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

pub fn is_manifest(path: &Path) -> bool {
    path.file_name().is_some_and(|name| name == COLLECTION_MANIFEST)
}

fn is_endpoint_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == ENDPOINT_EXTENSION) && !is_manifest(path)
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexedFile {
    pub path: PathBuf,
    pub seq: Option<i64>,
}

/// Endpoint files found in the target directory, keyed by identity.
#[derive(Debug, Default)]
pub struct ExistingIndex {
    files: HashMap<EndpointKey, IndexedFile>,
    max_seq: i64,
}

impl ExistingIndex {
    /// Reads every `*.yml` file directly under `dir` except the manifest.
    ///
    /// Files that cannot be read or parsed are left out. Entries are visited
    /// in file-name order; when two files share an identity the later one wins.
    pub fn scan(dir: &Path) -> Result<Self> {
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)
            .with_context(|| format!("failed to read target directory '{}'", dir.display()))?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| is_endpoint_file(path))
            .collect();
        paths.sort();

        let mut index = Self::default();
        for path in paths {
            let header = match read_header(&path) {
                Ok(header) => header,
                Err(err) => {
                    debug!(path = %path.display(), "skipping unreadable endpoint file: {err:#}");
                    continue;
                }
            };
            index.record(path, header);
        }
        Ok(index)
    }

    fn record(&mut self, path: PathBuf, header: FileHeader) {
        let seq = header.info.and_then(|info| info.seq).and_then(|seq| seq.as_i64());
        if let Some(seq) = seq {
            self.max_seq = self.max_seq.max(seq);
        }

        let Some(http) = header.http else {
            return;
        };
        let method = http.method.as_ref().and_then(scalar_text).unwrap_or_default();
        let url = http.url.as_ref().and_then(scalar_text).unwrap_or_default();
        if method.is_empty() || url.is_empty() {
            return;
        }

        let key = EndpointKey::new(&method, &url);
        if let Some(previous) = self.files.get(&key) {
            warn!(
                %key,
                previous = %previous.path.display(),
                current = %path.display(),
                "duplicate endpoint identity, keeping the later file"
            );
        }
        self.files.insert(key, IndexedFile { path, seq });
    }

    pub fn get(&self, key: &EndpointKey) -> Option<&IndexedFile> {
        self.files.get(key)
    }

    pub fn insert(&mut self, key: EndpointKey, file: IndexedFile) {
        self.files.insert(key, file);
    }

    /// Highest integer `info.seq` seen while scanning, 0 when there is none.
    pub fn max_seq(&self) -> i64 {
        self.max_seq
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileHeader {
    info: Option<InfoHeader>,
    http: Option<HttpHeader>,
}

#[derive(Debug, Default, Deserialize)]
struct InfoHeader {
    seq: Option<serde_yaml::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct HttpHeader {
    method: Option<serde_yaml::Value>,
    url: Option<serde_yaml::Value>,
}

fn read_header(path: &Path) -> Result<FileHeader> {
    let raw = fs::read_to_string(path)?;
    let header = serde_yaml::from_str::<Option<FileHeader>>(&raw)?;
    Ok(header.unwrap_or_default())
}

fn scalar_text(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(text) => Some(text.clone()),
        serde_yaml::Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// One endpoint file in the collection format.
#[derive(Debug, Serialize)]
pub struct EndpointFile {
    pub info: Info,
    pub http: HttpSection,
    pub settings: Settings,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<EndpointExample>,
}

impl EndpointFile {
    pub fn from_record(record: &OperationRecord, seq: i64) -> Result<Self> {
        let method = record.method.as_str();
        let body = if record.method.has_body() {
            Some(Body::json(&record.body)?)
        } else {
            None
        };
        let auth = if record.bearer_auth {
            Auth::Bearer {
                token: TOKEN_PLACEHOLDER.to_string(),
            }
        } else {
            Auth::Inherit
        };
        let examples = record
            .examples
            .iter()
            .map(|pair| EndpointExample::from_pair(record, pair))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            info: Info {
                name: record.name.clone(),
                kind: "http",
                seq,
            },
            http: HttpSection {
                method,
                url: record.url.clone(),
                body,
                auth,
            },
            settings: Settings::default(),
            examples,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct Info {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub seq: i64,
}

#[derive(Debug, Serialize)]
pub struct HttpSection {
    pub method: &'static str,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Body>,
    pub auth: Auth,
}

/// JSON payload embedded as pretty-printed text.
#[derive(Debug, Serialize)]
pub struct Body {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub data: String,
}

impl Body {
    pub fn json(value: &Value) -> Result<Self> {
        Ok(Self {
            kind: "json",
            data: render::pretty_json(value)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Auth {
    /// Use the collection-level auth.
    Inherit,
    Bearer { token: String },
}

impl Serialize for Auth {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Inherit => serializer.serialize_str("inherit"),
            Self::Bearer { token } => {
                let mut state = serializer.serialize_struct("Auth", 2)?;
                state.serialize_field("type", "bearer")?;
                state.serialize_field("token", token)?;
                state.end()
            }
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub encode_url: bool,
    pub timeout: u64,
    pub follow_redirects: bool,
    pub max_redirects: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            encode_url: true,
            timeout: 0,
            follow_redirects: true,
            max_redirects: 5,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EndpointExample {
    pub name: String,
    pub request: ExampleRequest,
    pub response: ExampleResponse,
}

impl EndpointExample {
    fn from_pair(record: &OperationRecord, pair: &ExamplePair) -> Result<Self> {
        let body = if record.method.has_body() {
            Some(Body::json(&pair.request_body)?)
        } else {
            None
        };
        Ok(Self {
            name: pair.name.clone(),
            request: ExampleRequest {
                url: record.url.clone(),
                method: record.method.as_str(),
                body,
            },
            response: ExampleResponse {
                status: pair.status,
                status_text: pair.status_text,
                headers: vec![Header {
                    name: "Content-Type",
                    value: "application/json",
                }],
                body: Body::json(&pair.response_body)?,
            },
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ExampleRequest {
    pub url: String,
    pub method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Body>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExampleResponse {
    pub status: u64,
    pub status_text: &'static str,
    pub headers: Vec<Header>,
    pub body: Body,
}

#[derive(Debug, Serialize)]
pub struct Header {
    pub name: &'static str,
    pub value: &'static str,
}
