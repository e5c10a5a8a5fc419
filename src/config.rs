use std::path::PathBuf;

use clap::ArgMatches;

use crate::error::SyncError;

pub const OPENAPI_JSON_ENV: &str = "OPENAPI_JSON";
pub const TARGET_DIR_ENV: &str = "TARGET_DIR";
pub const DEFAULT_OPENAPI_JSON: &str = "./openapi.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub openapi_json: PathBuf,
    pub target_dir: PathBuf,
}

impl Config {
    pub fn from_matches(
        matches: &ArgMatches,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, SyncError> {
        Self::resolve(
            matches.get_one::<String>("openapi_json").cloned(),
            matches.get_one::<String>("target_dir").cloned(),
            env,
        )
    }

    /// Flag first, then environment variable. An empty target directory
    /// counts as unset; an empty document path is kept and fails validation.
    pub fn resolve(
        openapi_json: Option<String>,
        target_dir: Option<String>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, SyncError> {
        let openapi_json = openapi_json
            .or_else(|| env(OPENAPI_JSON_ENV))
            .unwrap_or_else(|| DEFAULT_OPENAPI_JSON.to_string());
        let target_dir = target_dir
            .or_else(|| env(TARGET_DIR_ENV))
            .filter(|value| !value.is_empty())
            .ok_or(SyncError::MissingTargetDir)?;

        Ok(Self {
            openapi_json: PathBuf::from(openapi_json),
            target_dir: PathBuf::from(target_dir),
        })
    }

    /// The document must be a file and the target a directory.
    pub fn validate(&self) -> Result<(), SyncError> {
        if !self.openapi_json.is_file() {
            return Err(SyncError::OpenApiNotFound(self.openapi_json.clone()));
        }
        if !self.target_dir.is_dir() {
            return Err(SyncError::TargetDirNotFound(self.target_dir.clone()));
        }
        Ok(())
    }
}
