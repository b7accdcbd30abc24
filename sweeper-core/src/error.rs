use std::path::PathBuf;
use sweeper_scanner::AssetId;
use thiserror::Error;

/// Problems reading a usage report.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Usage report unavailable at {}: {source}", path.display())]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Usage report has no '{0}' column")]
    MissingColumn(&'static str),

    #[error("Line {line}: expected at least {expected} fields, found {found}")]
    ShortRow {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("Line {line}: TotalUsage '{value}' is not a non-negative integer")]
    InvalidUsage { line: usize, value: String },
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Manifest line {line}: {reason}")]
    InvalidManifest { line: usize, reason: String },

    #[error("Registry connection lock poisoned")]
    Poisoned,
}

/// A single failed call to the deletion collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeleteError {
    #[error("asset not found: {0}")]
    Missing(AssetId),

    #[error("could not delete {asset}: {reason}")]
    Backend { asset: AssetId, reason: String },
}

#[derive(Error, Debug)]
pub enum RemovalError {
    #[error("Removal stopped after {deleted_count} deletions: {source}")]
    DeleteFailed {
        #[source]
        source: DeleteError,
        deleted_count: usize,
        remaining: Vec<AssetId>,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
