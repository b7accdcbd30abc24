use crate::asset::AssetId;
use thiserror::Error;

/// A single failed query against the host's dependency data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("asset not found: {0}")]
    NotFound(AssetId),

    #[error("dependency query failed for {asset}: {reason}")]
    Query { asset: AssetId, reason: String },
}

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Lookup failed: {0}")]
    Lookup(#[from] LookupError),

    #[error("Task join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),

    #[error("Other error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ScanError>;
