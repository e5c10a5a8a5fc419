use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::{debug, info};

use crate::collection::{ENDPOINT_EXTENSION, EndpointFile, ExistingIndex, IndexedFile, is_manifest};
use crate::config::Config;
use crate::extract::{OperationRecord, extract_operations};
use crate::openapi::OpenApiDocument;
use crate::render;

const UNNAMED_ENDPOINT: &str = "Unnamed endpoint";

static RESERVED_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[\\/:*?"<>|]+"#).expect("valid regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    pub added: Vec<PathBuf>,
    pub updated: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementKind {
    Added,
    Updated,
}

/// Where an operation is written and with which seq.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub path: PathBuf,
    pub seq: i64,
    pub kind: PlacementKind,
}

/// Run state threaded through one pass over the document.
#[derive(Debug)]
pub struct Reconciler {
    target_dir: PathBuf,
    index: ExistingIndex,
    next_seq: i64,
}

impl Reconciler {
    pub fn new(target_dir: &Path, index: ExistingIndex) -> Self {
        let next_seq = index.max_seq() + 1;
        Self {
            target_dir: target_dir.to_path_buf(),
            index,
            next_seq,
        }
    }

    pub fn place(&self, record: &OperationRecord) -> Placement {
        match self.index.get(&record.key()) {
            Some(existing) => Placement {
                path: existing.path.clone(),
                // files without a seq are backfilled without advancing the counter
                seq: existing.seq.unwrap_or(self.next_seq),
                kind: PlacementKind::Updated,
            },
            None => Placement {
                path: self.free_path(&record.name),
                seq: self.next_seq,
                kind: PlacementKind::Added,
            },
        }
    }

    /// Records a written placement so later operations see it.
    pub fn commit(&mut self, record: &OperationRecord, placement: &Placement) {
        if placement.kind == PlacementKind::Added {
            self.index.insert(
                record.key(),
                IndexedFile {
                    path: placement.path.clone(),
                    seq: Some(placement.seq),
                },
            );
            self.next_seq += 1;
        }
    }

    fn free_path(&self, name: &str) -> PathBuf {
        let stem = sanitize_file_name(name);
        let mut path = self.target_dir.join(format!("{stem}.{ENDPOINT_EXTENSION}"));
        let mut counter = 2;
        while path.exists() || is_manifest(&path) {
            path = self
                .target_dir
                .join(format!("{stem} ({counter}).{ENDPOINT_EXTENSION}"));
            counter += 1;
        }
        path
    }
}

/// File stem for a display name: reserved characters and whitespace runs
/// collapse to single spaces.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned = RESERVED_CHARS.replace_all(name, " ");
    let cleaned = WHITESPACE.replace_all(&cleaned, " ");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        UNNAMED_ENDPOINT.to_string()
    } else {
        cleaned.to_string()
    }
}

pub fn run(config: &Config) -> Result<SyncOutcome> {
    let doc = OpenApiDocument::from_path(&config.openapi_json)?;
    let index = ExistingIndex::scan(&config.target_dir)?;
    info!(
        files = index.len(),
        max_seq = index.max_seq(),
        "indexed existing endpoint files"
    );

    let mut reconciler = Reconciler::new(&config.target_dir, index);
    let mut outcome = SyncOutcome::default();

    for record in extract_operations(&doc) {
        let placement = reconciler.place(&record);
        let file = EndpointFile::from_record(&record, placement.seq)?;
        let yaml = render::to_yaml(&file)?;
        fs::write(&placement.path, yaml).with_context(|| {
            format!("failed to write endpoint file '{}'", placement.path.display())
        })?;
        debug!(
            key = %record.key(),
            path = %placement.path.display(),
            seq = placement.seq,
            kind = ?placement.kind,
            "wrote endpoint file"
        );

        reconciler.commit(&record, &placement);
        match placement.kind {
            PlacementKind::Added => outcome.added.push(placement.path),
            PlacementKind::Updated => outcome.updated.push(placement.path),
        }
    }

    info!(
        added = outcome.added.len(),
        updated = outcome.updated.len(),
        "sync finished"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};
    use tempfile::{TempDir, tempdir};

    struct Workspace {
        _root: TempDir,
        config: Config,
    }

    impl Workspace {
        fn new(doc: &Value) -> Result<Self> {
            let root = tempdir()?;
            let openapi_json = root.path().join("openapi.json");
            let target_dir = root.path().join("collection");
            fs::create_dir(&target_dir)?;
            fs::write(&openapi_json, serde_json::to_string(doc)?)?;
            Ok(Self {
                _root: root,
                config: Config {
                    openapi_json,
                    target_dir,
                },
            })
        }

        fn dir(&self) -> &Path {
            &self.config.target_dir
        }

        fn write(&self, name: &str, contents: &str) -> Result<PathBuf> {
            let path = self.dir().join(name);
            fs::write(&path, contents)?;
            Ok(path)
        }

        fn read(&self, name: &str) -> Result<String> {
            Ok(fs::read_to_string(self.dir().join(name))?)
        }

        fn load(&self, name: &str) -> Result<serde_yaml::Value> {
            Ok(serde_yaml::from_str(&self.read(name)?)?)
        }
    }

    fn endpoint(name: &str, seq: i64, method: &str, url: &str) -> String {
        format!(
            "info:\n  name: {name}\n  type: http\n  seq: {seq}\n\
             http:\n  method: {method}\n  url: \"{url}\"\n"
        )
    }

    #[test]
    fn ping_into_empty_directory() -> Result<()> {
        let ws = Workspace::new(&json!({
            "openapi": "3.0.3",
            "paths": { "/ping": { "get": { "summary": "Ping", "responses": { "200": {} } } } }
        }))?;

        let outcome = run(&ws.config)?;

        assert_eq!(outcome.added, vec![ws.dir().join("Ping.yml")]);
        assert!(outcome.updated.is_empty());
        assert_eq!(
            ws.read("Ping.yml")?,
            r#"info:
  name: Ping
  type: http
  seq: 1
http:
  method: GET
  url: "{{baseUrl}}/ping"
  auth: inherit
settings:
  encodeUrl: true
  timeout: 0
  followRedirects: true
  maxRedirects: 5
examples:
- name: status200
  request:
    url: "{{baseUrl}}/ping"
    method: GET
  response:
    status: 200
    statusText: OK
    headers:
    - name: Content-Type
      value: application/json
    body:
      type: json
      data: '{}'
"#
        );
        Ok(())
    }

    #[test]
    fn second_run_is_byte_for_byte_stable() -> Result<()> {
        let ws = Workspace::new(&json!({
            "paths": {
                "/users": {
                    "get": { "operationId": "listUsers", "responses": { "200": {} } },
                    "post": {
                        "summary": "Create user",
                        "security": [{ "bearerAuth": [] }],
                        "requestBody": { "content": { "application/json": { "examples": {
                            "sample": { "value": { "name": "Zoë" } }
                        }}}},
                        "responses": { "201": { "content": { "application/json": { "examples": {
                            "ok": { "value": { "id": 1 } }
                        }}}}}
                    }
                }
            }
        }))?;

        let first = run(&ws.config)?;
        let list = ws.read("listUsers.yml")?;
        let create = ws.read("Create user.yml")?;

        let second = run(&ws.config)?;

        assert_eq!(first.added.len(), 2);
        assert!(second.added.is_empty());
        assert_eq!(second.updated, first.added);
        assert_eq!(ws.read("listUsers.yml")?, list);
        assert_eq!(ws.read("Create user.yml")?, create);
        Ok(())
    }

    #[test]
    fn existing_seq_is_preserved_and_new_ones_follow_max() -> Result<()> {
        let ws = Workspace::new(&json!({
            "paths": {
                "/a": { "get": { "summary": "New A" } },
                "/users": { "get": { "summary": "Renamed list" } },
                "/b": { "get": { "summary": "New B" } }
            }
        }))?;
        let kept = ws.write("Users.yml", &endpoint("Users", 4, "get", "{{baseUrl}}/users"))?;
        ws.write("Other.yml", &endpoint("Other", 9, "GET", "{{baseUrl}}/gone"))?;

        let outcome = run(&ws.config)?;

        assert_eq!(outcome.updated, vec![kept]);
        assert_eq!(
            outcome.added,
            vec![ws.dir().join("New A.yml"), ws.dir().join("New B.yml")]
        );
        assert_eq!(ws.load("Users.yml")?["info"]["seq"], 4);
        assert_eq!(ws.load("Users.yml")?["info"]["name"], "Renamed list");
        assert_eq!(ws.load("New A.yml")?["info"]["seq"], 10);
        assert_eq!(ws.load("New B.yml")?["info"]["seq"], 11);
        // unmatched files are left alone
        assert_eq!(ws.load("Other.yml")?["info"]["seq"], 9);
        Ok(())
    }

    #[test]
    fn missing_seq_is_backfilled_with_next_seq() -> Result<()> {
        let ws = Workspace::new(&json!({
            "paths": { "/users": { "get": { "summary": "List Users" } } }
        }))?;
        ws.write(
            "whatever.yml",
            "http:\n  method: GET\n  url: \"{{baseUrl}}/users\"\n",
        )?;
        ws.write("seq.yml", &endpoint("Seq", 2, "GET", "{{baseUrl}}/other"))?;

        let outcome = run(&ws.config)?;

        assert_eq!(outcome.updated, vec![ws.dir().join("whatever.yml")]);
        assert_eq!(ws.load("whatever.yml")?["info"]["seq"], 3);
        Ok(())
    }

    #[test]
    fn name_collision_gets_numbered_suffix() -> Result<()> {
        let ws = Workspace::new(&json!({
            "paths": { "/users": { "get": { "summary": "List Users" } } }
        }))?;
        ws.write("List Users.yml", "notes: unrelated\n")?;
        ws.write("List Users (2).yml", "- not an endpoint\n")?;

        let outcome = run(&ws.config)?;

        assert_eq!(outcome.added, vec![ws.dir().join("List Users (3).yml")]);
        assert_eq!(ws.read("List Users.yml")?, "notes: unrelated\n");
        Ok(())
    }

    #[test]
    fn manifest_is_never_written() -> Result<()> {
        let ws = Workspace::new(&json!({
            "paths": { "/": { "get": { "summary": "opencollection" } } }
        }))?;

        let outcome = run(&ws.config)?;

        assert_eq!(outcome.added, vec![ws.dir().join("opencollection (2).yml")]);
        assert!(!ws.dir().join("opencollection.yml").exists());
        Ok(())
    }

    #[test]
    fn bearer_auth_and_body_rendering() -> Result<()> {
        let ws = Workspace::new(&json!({
            "paths": { "/users/{id}": { "patch": {
                "summary": "Update: user?",
                "security": [{ "bearerAuth": [] }],
                "requestBody": { "content": { "application/json": { "examples": {
                    "sample": { "value": { "name": "x" } }
                }}}},
                "responses": { "200": { "content": { "application/json": { "examples": {
                    "ok": { "value": { "id": 1 } }
                }}}}}
            }}}
        }))?;

        run(&ws.config)?;

        let text = ws.read("Update user.yml")?;
        assert!(text.contains("  url: \"{{baseUrl}}/users/{id}\"\n"));
        assert!(text.contains("    token: \"{{token}}\"\n"));

        let doc: serde_yaml::Value = serde_yaml::from_str(&text)?;
        assert_eq!(doc["http"]["auth"]["type"], "bearer");
        assert_eq!(doc["http"]["auth"]["token"], "{{token}}");
        assert_eq!(doc["http"]["body"]["type"], "json");
        assert_eq!(doc["http"]["body"]["data"], "{\n  \"name\": \"x\"\n}");

        let example = &doc["examples"][0];
        assert_eq!(example["name"], "ok (sample)");
        assert_eq!(example["request"]["body"]["data"], "{\n  \"name\": \"x\"\n}");
        assert_eq!(example["response"]["status"], 200);
        assert_eq!(example["response"]["body"]["data"], "{\n  \"id\": 1\n}");
        Ok(())
    }

    #[test]
    fn no_operations_reports_nothing() -> Result<()> {
        let ws = Workspace::new(&json!({ "openapi": "3.0.3", "paths": {} }))?;
        assert_eq!(run(&ws.config)?, SyncOutcome::default());
        Ok(())
    }

    #[test]
    fn malformed_document_fails() -> Result<()> {
        let ws = Workspace::new(&json!({}))?;
        fs::write(&ws.config.openapi_json, "{ not json")?;

        let err = run(&ws.config).expect_err("parse failure");
        assert!(format!("{err:#}").contains("failed to parse openapi json"));
        Ok(())
    }

    #[test]
    fn sanitizes_reserved_characters() {
        assert_eq!(sanitize_file_name("a/b\\c:d*e?f\"g<h>i|j"), "a b c d e f g h i j");
        assert_eq!(sanitize_file_name("  many   spaces\tand\ttabs "), "many spaces and tabs");
        assert_eq!(sanitize_file_name("GET /users/{id}"), "GET users {id}");
        assert_eq!(sanitize_file_name(" ::// "), "Unnamed endpoint");
    }
}
