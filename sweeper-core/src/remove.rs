// Batch removal through a deletion collaborator

use crate::error::{DeleteError, RemovalError};
use serde::{Deserialize, Serialize};
use sweeper_scanner::{AssetId, CancelToken, ProgressCallback};
use tracing::{info, warn};

/// Deletes one asset in the host.
pub trait AssetDeleter: Send + Sync {
    fn delete_asset(&self, asset: &AssetId) -> Result<(), DeleteError>;
}

impl<F> AssetDeleter for F
where
    F: Fn(&AssetId) -> Result<(), DeleteError> + Send + Sync,
{
    fn delete_asset(&self, asset: &AssetId) -> Result<(), DeleteError> {
        self(asset)
    }
}

/// What to do when a single delete fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Stop at the first failure. Nothing already deleted is restored.
    #[default]
    FailFast,
    /// Record the failure and carry on with the rest of the batch.
    Continue,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalOutcome {
    pub deleted_count: usize,
    /// Items never attempted because the batch was cancelled.
    pub remaining: Vec<AssetId>,
    pub failures: Vec<(AssetId, DeleteError)>,
    pub cancelled: bool,
}

pub struct BatchRemover<'a, D: AssetDeleter + ?Sized> {
    deleter: &'a D,
    policy: FailurePolicy,
    cancel: Option<CancelToken>,
    progress_callback: Option<ProgressCallback>,
}

impl<'a, D: AssetDeleter + ?Sized> BatchRemover<'a, D> {
    pub fn new(deleter: &'a D) -> Self {
        Self {
            deleter,
            policy: FailurePolicy::default(),
            cancel: None,
            progress_callback: None,
        }
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Called with `(completed, total, asset)` after every attempt,
    /// successful or not.
    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Delete `assets` in order. Not atomic: a cancelled or failed batch
    /// keeps whatever was already deleted.
    pub fn remove(&self, assets: &[AssetId]) -> Result<RemovalOutcome, RemovalError> {
        let total = assets.len();
        let mut outcome = RemovalOutcome::default();
        info!("Removing {} assets", total);

        for (idx, asset) in assets.iter().enumerate() {
            if self.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
                info!("Removal cancelled with {} assets left", total - idx);
                outcome.remaining = assets[idx..].to_vec();
                outcome.cancelled = true;
                break;
            }

            let result = self.deleter.delete_asset(asset);

            if let Some(ref callback) = self.progress_callback {
                callback(idx + 1, total, asset.to_string());
            }

            match result {
                Ok(()) => outcome.deleted_count += 1,
                Err(e) => {
                    warn!("Failed to delete {}: {}", asset, e);
                    match self.policy {
                        FailurePolicy::FailFast => {
                            return Err(RemovalError::DeleteFailed {
                                source: e,
                                deleted_count: outcome.deleted_count,
                                remaining: assets[idx + 1..].to_vec(),
                            });
                        }
                        FailurePolicy::Continue => outcome.failures.push((asset.clone(), e)),
                    }
                }
            }
        }

        info!(
            "Removal finished: {} deleted, {} failed",
            outcome.deleted_count,
            outcome.failures.len()
        );
        Ok(outcome)
    }
}
