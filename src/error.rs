use std::path::PathBuf;

use thiserror::Error;

/// Precondition failures that stop a sync before anything is read.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("target directory is required: use --target-dir or set TARGET_DIR")]
    MissingTargetDir,

    #[error("openapi json not found: {}", .0.display())]
    OpenApiNotFound(PathBuf),

    #[error("target directory not found: {}", .0.display())]
    TargetDirNotFound(PathBuf),
}
