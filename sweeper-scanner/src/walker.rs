// Depth-bounded, memoized dependency walk rooted at one asset

use crate::asset::{AssetId, ModuleScope};
use crate::error::{Result, ScanError};
use crate::policy::PathPolicy;
use crate::result::WalkResult;
use crate::service::DependencyService;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, trace, warn};

pub const DEFAULT_MAX_DEPTH: usize = 10;

/// What to do when a dependency's own lookup fails mid-walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LookupPolicy {
    /// Drop that dependency, note it in `lookup_failures`, keep walking.
    #[default]
    Skip,
    /// Abort the walk with the lookup error.
    Fail,
}

/// Where the walker looks for proof that a dependency is still live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LivenessEvidence {
    /// Assets discovered while walking the dependency's own subtree.
    #[default]
    Subtree,
    /// The host's `referencers_reachable_from` answer for the dependency.
    Referencers,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkOptions {
    pub max_depth: usize,
    pub honor_exclusions: bool,
    pub skip_internal_assets: bool,
    pub lookup_policy: LookupPolicy,
    pub evidence: LivenessEvidence,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            honor_exclusions: true,
            skip_internal_assets: false,
            lookup_policy: LookupPolicy::Skip,
            evidence: LivenessEvidence::Subtree,
        }
    }
}

/// Everything a walk needs besides the service. Shared read-only by every
/// walker of a session.
#[derive(Debug, Clone)]
pub struct WalkContext {
    pub scope: ModuleScope,
    pub policy: PathPolicy,
    pub options: WalkOptions,
}

impl WalkContext {
    pub fn new(scope: ModuleScope) -> Self {
        Self {
            scope,
            policy: PathPolicy::default(),
            options: WalkOptions::default(),
        }
    }

    /// Use `policy` for every edge. Policies can only be built by extending
    /// `PathPolicy::default()`, so the default rules always apply.
    pub fn with_policy(mut self, policy: PathPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_options(mut self, options: WalkOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.options.max_depth = depth;
        self
    }

    fn skips(&self, asset: &AssetId) -> bool {
        self.options.honor_exclusions && self.policy.is_excluded(asset)
    }
}

/// Result of a direct-dependency lookup, cached per asset.
#[derive(Debug, Clone)]
enum LookupOutcome {
    Edges(Vec<AssetId>),
    Failed,
}

/// Subtree result plus every dependency-side asset it touched. `reach`
/// ignores `skip_internal_assets`, so liveness never depends on it.
#[derive(Debug, Clone, Default)]
struct Fragment {
    result: WalkResult,
    reach: BTreeSet<AssetId>,
}

impl Fragment {
    fn merge(&mut self, other: &Fragment) {
        self.result.merge(&other.result);
        self.reach.extend(other.reach.iter().cloned());
    }
}

struct Frame {
    asset: AssetId,
    depth: usize,
    dependencies: Vec<AssetId>,
    next: usize,
    acc: Fragment,
}

enum Step {
    Continue,
    Descend(Frame),
    Finish,
}

/// Walks the dependency graph below one root at a time.
///
/// Lookups are cached for the walker's lifetime, so reusing one walker for
/// every asset of a scan asks the host about each asset at most once.
pub struct GraphWalker<'a, S: DependencyService + ?Sized> {
    service: &'a S,
    ctx: &'a WalkContext,
    dependencies: HashMap<AssetId, LookupOutcome>,
    referencers: HashMap<AssetId, Vec<AssetId>>,
}

impl<'a, S: DependencyService + ?Sized> GraphWalker<'a, S> {
    pub fn new(service: &'a S, ctx: &'a WalkContext) -> Self {
        Self {
            service,
            ctx,
            dependencies: HashMap::new(),
            referencers: HashMap::new(),
        }
    }

    /// Walk everything reachable from `root` within the depth bound.
    pub fn walk(&mut self, root: &AssetId) -> Result<WalkResult> {
        debug!("Walking {} (max depth {})", root, self.ctx.options.max_depth);

        let Some(root_deps) = self.lookup_dependencies(root)? else {
            let mut result = WalkResult::new();
            result.lookup_failures.insert(root.clone());
            return Ok(result);
        };

        // Finished subtrees keyed by (asset, depth), not by asset alone: the
        // depth bound truncates a subtree differently depending on where it
        // is entered, so an asset reached at several depths is walked once
        // per depth. Each (asset, depth) pair is expanded at most once.
        let mut memo: HashMap<(AssetId, usize), Fragment> = HashMap::new();
        let mut active: HashSet<AssetId> = HashSet::from([root.clone()]);
        let mut stack = vec![self.frame(root.clone(), 0, root_deps)];

        loop {
            let step = match stack.last_mut() {
                None => break,
                Some(top) => self.advance(top, &active, &memo)?,
            };

            match step {
                Step::Continue => {}
                Step::Descend(frame) => {
                    active.insert(frame.asset.clone());
                    stack.push(frame);
                }
                Step::Finish => {
                    let Some(done) = stack.pop() else { break };
                    active.remove(&done.asset);
                    let Some(parent) = stack.last_mut() else {
                        return Ok(done.acc.result);
                    };
                    parent.acc.merge(&done.acc);
                    self.test_liveness(&done.asset, &done.acc, &mut parent.acc);
                    memo.insert((done.asset, done.depth), done.acc);
                }
            }
        }

        Ok(WalkResult::new())
    }

    /// Handle the next pending dependency of `top`.
    fn advance(
        &mut self,
        top: &mut Frame,
        active: &HashSet<AssetId>,
        memo: &HashMap<(AssetId, usize), Fragment>,
    ) -> Result<Step> {
        let Some(dep) = top.dependencies.get(top.next).cloned() else {
            return Ok(Step::Finish);
        };
        top.next += 1;
        let child_depth = top.depth + 1;

        if child_depth > self.ctx.options.max_depth {
            trace!("Depth bound reached at {}", dep);
            self.record(&mut top.acc, dep, top.asset.clone());
            return Ok(Step::Continue);
        }

        if active.contains(&dep) {
            // Back edge: the ancestor frame finishes its own subtree
            trace!("Cycle back to {} from {}", dep, top.asset);
            self.record(&mut top.acc, dep, top.asset.clone());
            return Ok(Step::Continue);
        }

        if let Some(done) = memo.get(&(dep.clone(), child_depth)) {
            self.record(&mut top.acc, dep.clone(), top.asset.clone());
            top.acc.merge(done);
            self.test_liveness(&dep, done, &mut top.acc);
            return Ok(Step::Continue);
        }

        match self.lookup_dependencies(&dep)? {
            None => {
                top.acc.result.lookup_failures.insert(dep);
                Ok(Step::Continue)
            }
            Some(child_deps) => {
                self.record(&mut top.acc, dep.clone(), top.asset.clone());
                Ok(Step::Descend(self.frame(dep, child_depth, child_deps)))
            }
        }
    }

    fn frame(&self, asset: AssetId, depth: usize, dependencies: Vec<AssetId>) -> Frame {
        let dependencies = dependencies
            .into_iter()
            .filter(|d| {
                let skip = self.ctx.skips(d);
                if skip {
                    trace!("Skipping excluded dependency {}", d);
                }
                !skip
            })
            .collect();
        Frame {
            asset,
            depth,
            dependencies,
            next: 0,
            acc: Fragment::default(),
        }
    }

    /// Count `referencer -> dependency` unless the dependency is internal
    /// and internal assets are being skipped.
    fn record(&self, acc: &mut Fragment, dependency: AssetId, referencer: AssetId) {
        acc.reach.insert(dependency.clone());
        if self.ctx.options.skip_internal_assets && self.ctx.scope.contains(&dependency) {
            return;
        }
        acc.result.graph.add(dependency, referencer);
    }

    /// Mark `dep` unreachable when nothing in its evidence set lies inside
    /// the module scope; otherwise record the evidence as edges into `dep`.
    fn test_liveness(&mut self, dep: &AssetId, child: &Fragment, acc: &mut Fragment) {
        let evidence: Vec<AssetId> = match self.ctx.options.evidence {
            LivenessEvidence::Subtree => child.reach.iter().cloned().collect(),
            LivenessEvidence::Referencers => self.lookup_referencers(dep),
        };

        if !evidence.iter().any(|a| self.ctx.scope.contains(a)) {
            debug!("{} has no live referencer inside {}", dep, self.ctx.scope.prefix());
            acc.result.unreachable.insert(dep.clone());
            return;
        }

        for referencer in evidence {
            if self.ctx.skips(&referencer) {
                continue;
            }
            self.record(acc, referencer, dep.clone());
        }
    }

    fn lookup_dependencies(&mut self, asset: &AssetId) -> Result<Option<Vec<AssetId>>> {
        let outcome = match self.dependencies.get(asset) {
            Some(outcome) => outcome.clone(),
            None => {
                let outcome = match self.service.direct_dependencies(asset) {
                    Ok(deps) => LookupOutcome::Edges(deps),
                    Err(e) => {
                        if self.ctx.options.lookup_policy == LookupPolicy::Fail {
                            return Err(ScanError::Lookup(e));
                        }
                        warn!("Skipping {}: {}", asset, e);
                        LookupOutcome::Failed
                    }
                };
                self.dependencies.insert(asset.clone(), outcome.clone());
                outcome
            }
        };

        Ok(match outcome {
            LookupOutcome::Edges(deps) => Some(deps),
            LookupOutcome::Failed => None,
        })
    }

    fn lookup_referencers(&mut self, asset: &AssetId) -> Vec<AssetId> {
        if let Some(found) = self.referencers.get(asset) {
            return found.clone();
        }
        let found = match self
            .service
            .referencers_reachable_from(asset, &self.ctx.scope)
        {
            Ok(found) => found,
            Err(e) => {
                debug!("No referencer evidence for {}: {}", asset, e);
                Vec::new()
            }
        };
        self.referencers.insert(asset.clone(), found.clone());
        found
    }
}

/// Walk a single root with a fresh walker.
pub fn walk<S: DependencyService + ?Sized>(
    service: &S,
    ctx: &WalkContext,
    root: &AssetId,
) -> Result<WalkResult> {
    GraphWalker::new(service, ctx).walk(root)
}
