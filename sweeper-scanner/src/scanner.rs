use crate::asset::AssetId;
use crate::error::{Result, ScanError};
use crate::result::{ScanResult, WalkResult};
use crate::service::DependencyService;
use crate::walker::{GraphWalker, WalkContext};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Called after each top-level asset with (completed, total, asset).
pub type ProgressCallback = Arc<dyn Fn(usize, usize, String) + Send + Sync>;

/// Cooperative cancellation flag shared between a caller and a running job.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Walks every asset under a path and folds the results into one graph.
///
/// Workers pull top-level assets from a shared queue and send their walk
/// results over a channel; only the collecting task writes the aggregate.
pub struct ModuleScanner<S: DependencyService + ?Sized + 'static> {
    service: Arc<S>,
    ctx: Arc<WalkContext>,
    progress_callback: Option<ProgressCallback>,
    cancel: CancelToken,
}

impl<S: DependencyService + ?Sized + 'static> ModuleScanner<S> {
    pub fn new(service: Arc<S>, ctx: WalkContext) -> Self {
        Self {
            service,
            ctx: Arc::new(ctx),
            progress_callback: None,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn context(&self) -> &WalkContext {
        &self.ctx
    }

    /// Enumerate every asset stored under `path`.
    pub fn assets_under(&self, path: &str) -> Result<Vec<AssetId>> {
        Ok(self.service.assets_under(path)?)
    }

    /// Enumerate and scan everything under `path`.
    pub async fn scan_path(&self, path: &str, workers: usize) -> Result<ScanResult> {
        let assets = self.assets_under(path)?;
        info!("Total assets to check under {}: {}", path, assets.len());
        self.scan(assets, workers).await
    }

    pub async fn scan(&self, assets: Vec<AssetId>, workers: usize) -> Result<ScanResult> {
        let total = assets.len();
        let workers = workers.max(1).min(total.max(1));
        info!("Scanning {} assets with {} workers", total, workers);

        let queue = Arc::new(Mutex::new(VecDeque::from(assets)));
        let abort = Arc::new(AtomicBool::new(false));
        let (tx, mut rx) = mpsc::unbounded_channel::<(AssetId, Result<WalkResult>)>();

        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let service = self.service.clone();
            let ctx = self.ctx.clone();
            let queue = queue.clone();
            let cancel = self.cancel.clone();
            let abort = abort.clone();
            let tx = tx.clone();

            handles.push(tokio::task::spawn_blocking(move || -> Result<()> {
                debug!("Worker {} started", worker_id);
                let mut walker = GraphWalker::new(service.as_ref(), ctx.as_ref());
                loop {
                    if cancel.is_cancelled() || abort.load(Ordering::SeqCst) {
                        break;
                    }
                    let next = queue
                        .lock()
                        .map_err(|_| ScanError::Other("scan queue poisoned".to_string()))?
                        .pop_front();
                    let Some(asset) = next else { break };

                    let result = walker.walk(&asset);
                    if tx.send((asset, result)).is_err() {
                        break;
                    }
                }
                debug!("Worker {} finished", worker_id);
                Ok(())
            }));
        }
        drop(tx);

        let mut aggregate = ScanResult {
            total,
            ..ScanResult::default()
        };
        let mut first_error = None;

        while let Some((asset, result)) = rx.recv().await {
            // Results arriving after cancellation are dropped
            if self.cancel.is_cancelled() {
                continue;
            }
            match result {
                Ok(walk) => {
                    aggregate.absorb(&walk);
                    if let Some(ref callback) = self.progress_callback {
                        callback(aggregate.scanned, total, asset.to_string());
                    }
                }
                Err(e) => {
                    warn!("Walk of {} failed: {}", asset, e);
                    abort.store(true, Ordering::SeqCst);
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        for handle in handles {
            handle.await??;
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        aggregate.cancelled = self.cancel.is_cancelled() && aggregate.scanned < total;
        if aggregate.cancelled {
            info!(
                "Scan cancelled: {} of {} assets checked",
                aggregate.scanned, total
            );
        } else {
            info!(
                "Scan complete: {} dependencies, {} unreachable",
                aggregate.graph.len(),
                aggregate.unreachable.len()
            );
        }
        Ok(aggregate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::ModuleScope;
    use crate::service::MemoryService;
    use crate::walker::{LookupPolicy, WalkOptions};
    use std::sync::atomic::AtomicUsize;

    fn service() -> Arc<MemoryService> {
        let mut service = MemoryService::new();
        for i in 0..8 {
            service.add_edge(format!("/mod/a{}", i), "/ext/shared");
            service.add_edge(format!("/mod/a{}", i), format!("/ext/only{}", i));
        }
        service.add_edge("/ext/shared", "/mod/a0");
        Arc::new(service)
    }

    #[tokio::test]
    async fn test_scan_aggregates_across_roots() {
        let scanner = ModuleScanner::new(service(), WalkContext::new(ModuleScope::new("mod")));
        let result = scanner.scan_path("/mod", 1).await.unwrap();

        assert_eq!(result.total, 8);
        assert_eq!(result.scanned, 8);
        assert!(!result.cancelled);
        for i in 0..8 {
            let root = AssetId::new(format!("/mod/a{}", i));
            assert!(result.graph.count(&AssetId::new("/ext/shared"), &root) >= 1);
            assert!(result.unreachable.contains(&AssetId::new(format!("/ext/only{}", i))));
        }
        assert!(!result.unreachable.contains(&AssetId::new("/ext/shared")));
    }

    #[tokio::test]
    async fn test_worker_count_does_not_change_result() {
        let ctx = WalkContext::new(ModuleScope::new("mod"));
        let single = ModuleScanner::new(service(), ctx.clone())
            .scan_path("/mod", 1)
            .await
            .unwrap();
        let many = ModuleScanner::new(service(), ctx)
            .scan_path("/mod", 4)
            .await
            .unwrap();

        assert_eq!(single.graph, many.graph);
        assert_eq!(single.unreachable, many.unreachable);
    }

    #[tokio::test]
    async fn test_cancel_stops_between_assets() {
        let token = CancelToken::new();
        let cancel_from_callback = token.clone();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();

        let scanner = ModuleScanner::new(service(), WalkContext::new(ModuleScope::new("mod")))
            .with_cancel_token(token)
            .with_progress_callback(Arc::new(move |completed: usize, _total: usize, _asset: String| {
                seen_clone.store(completed, Ordering::SeqCst);
                if completed == 2 {
                    cancel_from_callback.cancel();
                }
            }));

        let result = scanner.scan_path("/mod", 1).await.unwrap();
        assert!(result.cancelled);
        assert!(result.scanned < result.total);
        assert_eq!(result.skipped(), result.total - result.scanned);
        assert_eq!(seen.load(Ordering::SeqCst), result.scanned);
    }

    #[tokio::test]
    async fn test_strict_lookup_failure_fails_scan() {
        let mut service = MemoryService::with_edges([("/mod/a", "/ext/broken")]);
        service.break_dependencies("/ext/broken");
        let options = WalkOptions {
            lookup_policy: LookupPolicy::Fail,
            ..WalkOptions::default()
        };
        let ctx = WalkContext::new(ModuleScope::new("mod")).with_options(options);
        let scanner = ModuleScanner::new(Arc::new(service), ctx);

        let err = scanner.scan_path("/mod", 2).await.unwrap_err();
        assert!(matches!(err, ScanError::Lookup(_)));
    }

    #[tokio::test]
    async fn test_empty_path_scans_nothing() {
        let scanner = ModuleScanner::new(service(), WalkContext::new(ModuleScope::new("mod")));
        let result = scanner.scan_path("/nothing", 3).await.unwrap();
        assert_eq!(result.total, 0);
        assert!(result.graph.is_empty());
    }
}
