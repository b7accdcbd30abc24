// Analysis session: the operations callers run against one module

use crate::error::RemovalError;
use crate::liveness::{self, AssetSet, Liveness};
use crate::remove::{AssetDeleter, BatchRemover, FailurePolicy, RemovalOutcome};
use crate::usage::UsageReport;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use sweeper_scanner::error::Result;
use sweeper_scanner::{
    AssetId, CancelToken, DependencyService, ModuleScanner, ModuleScope, ProgressCallback, ScanResult,
    WalkContext, WeightedGraph,
};
use tracing::{info, warn};

/// Owns everything one analysis needs. Results are rebuilt from scratch on
/// every call; nothing carries over between scans.
pub struct Session<S: DependencyService + ?Sized + 'static> {
    service: Arc<S>,
    ctx: WalkContext,
    workers: usize,
    cancel: CancelToken,
    show_progress_bars: bool,
    progress_callback: Option<ProgressCallback>,
}

impl<S: DependencyService + ?Sized + 'static> Session<S> {
    pub fn new(service: Arc<S>, ctx: WalkContext) -> Self {
        Self {
            service,
            ctx,
            workers: 1,
            cancel: CancelToken::new(),
            show_progress_bars: false,
            progress_callback: None,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_progress_bars(mut self, show: bool) -> Self {
        self.show_progress_bars = show;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn context(&self) -> &WalkContext {
        &self.ctx
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Walk every asset stored under `path`, judging liveness against the
    /// session's module scope.
    pub async fn scan_path(&self, path: &str) -> Result<ScanResult> {
        let scanner = ModuleScanner::new(self.service.clone(), self.ctx.clone())
            .with_cancel_token(self.cancel.clone());
        let assets = scanner.assets_under(path)?;
        let total = assets.len();

        let progress_bar = if self.show_progress_bars {
            let pb = ProgressBar::new(total as u64);
            pb.set_style(
                ProgressStyle::with_template(
                    "{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
            );
            pb.set_message(format!("Retrieving asset dependencies under {}", path));
            Some(pb)
        } else {
            None
        };

        let bar = progress_bar.clone();
        let forward = self.progress_callback.clone();
        let callback: ProgressCallback = Arc::new(move |completed: usize, total: usize, asset: String| {
            if let Some(ref pb) = bar {
                pb.set_position(completed as u64);
                pb.set_message(asset.clone());
            }
            if let Some(ref cb) = forward {
                cb(completed, total, asset);
            }
        });

        let result = scanner
            .with_progress_callback(callback)
            .scan(assets, self.workers)
            .await;

        if let Some(ref pb) = progress_bar {
            match result {
                Ok(ref scan) if scan.cancelled => pb.abandon_with_message(format!(
                    "Cancelled after {} of {} assets",
                    scan.scanned, scan.total
                )),
                Ok(ref scan) => pb.finish_with_message(format!(
                    "Scan complete! {} assets, {} dependencies",
                    scan.scanned,
                    scan.graph.len()
                )),
                Err(_) => pb.abandon_with_message("Scan failed"),
            }
        }

        result
    }

    /// Scan the session's own module.
    pub async fn scan_module(&self) -> Result<ScanResult> {
        let root = self.ctx.scope.root().to_string();
        self.scan_path(&root).await
    }

    /// Full weighted dependency graph of the module.
    pub async fn compute_module_graph(&self) -> Result<WeightedGraph> {
        Ok(self.scan_module().await?.graph)
    }

    /// Assets under any `path` that nothing inside the module keeps alive.
    pub async fn compute_unused_under_path(&self, path: &str) -> Result<AssetSet> {
        let scan = self.scan_path(path).await?;
        Ok(scan.unreachable.into())
    }

    /// Scan the module and, when `path` lies outside it, `path` as well.
    /// The module's own graph is always part of the result, so anything the
    /// module depends on can be told apart from content nothing live uses.
    pub async fn scan_for_liveness(&self, path: &str) -> Result<ScanResult> {
        let mut scan = self.scan_module().await?;
        if self.covers(path) || scan.cancelled {
            return Ok(scan);
        }

        let wider = self.scan_path(path).await?;
        scan.graph.merge(&wider.graph);
        scan.unreachable.extend(wider.unreachable);
        scan.lookup_failures.extend(wider.lookup_failures);
        scan.scanned += wider.scanned;
        scan.total += wider.total;
        scan.cancelled = wider.cancelled;
        Ok(scan)
    }

    /// Split the report into used and unused, and add the module's dead
    /// external dependencies.
    pub async fn classify_liveness(&self, report: &UsageReport) -> Result<Liveness> {
        let root = self.ctx.scope.root().to_string();
        self.classify_liveness_under(report, &root).await
    }

    /// Like `classify_liveness`, but looks for dead dependencies among the
    /// assets under `path` too.
    pub async fn classify_liveness_under(
        &self,
        report: &UsageReport,
        path: &str,
    ) -> Result<Liveness> {
        let scan = self.scan_for_liveness(path).await?;
        if scan.cancelled {
            warn!(
                "Scan cancelled after {} of {} assets; dead dependencies are partial",
                scan.scanned, scan.total
            );
        }
        let liveness = liveness::classify(report, &self.ctx.scope, &scan.unreachable, &scan.graph);
        info!(
            "Liveness: {} used, {} unused, {} dead dependencies",
            liveness.used.len(),
            liveness.unused.len(),
            liveness.dead_dependencies.len()
        );
        Ok(liveness)
    }

    /// Whether `path` is the module itself or lies inside it.
    fn covers(&self, path: &str) -> bool {
        ModuleScope::new(path)
            .prefix()
            .starts_with(self.ctx.scope.prefix())
    }
}

/// Delete `assets` in order, stopping early when `cancel` is set.
pub fn remove_assets<D: AssetDeleter + ?Sized>(
    deleter: &D,
    assets: &[AssetId],
    cancel: &CancelToken,
    progress_callback: Option<ProgressCallback>,
    policy: FailurePolicy,
) -> std::result::Result<RemovalOutcome, RemovalError> {
    let mut remover = BatchRemover::new(deleter)
        .with_cancel_token(cancel.clone())
        .with_failure_policy(policy);
    if let Some(callback) = progress_callback {
        remover = remover.with_progress_callback(callback);
    }
    remover.remove(assets)
}
