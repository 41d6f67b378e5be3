use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("core error: {0}")]
    Core(#[from] soilcast_core::SoilcastError),

    #[error("artifact not found: {0} (run `soilcast process` first)")]
    NotFound(PathBuf),

    #[error("invalid artifact {name}: {reason}")]
    Format { name: String, reason: String },
}
