use crate::asset::{AssetId, ModuleScope};
use crate::error::LookupError;
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::sync::Arc;

pub type LookupResult<T> = std::result::Result<T, LookupError>;

/// Read-only dependency queries supplied by the host that owns the assets.
///
/// Every call answers for one asset at a time, so the graph is discovered
/// lazily while walking. Implementations must be shareable across scan
/// workers.
pub trait DependencyService: Send + Sync {
    /// Direct outgoing edges of `asset`. The same target may appear more
    /// than once when the asset references it more than once.
    fn direct_dependencies(&self, asset: &AssetId) -> LookupResult<Vec<AssetId>>;

    /// Assets that (transitively) depend on `asset`. Implementations may
    /// stop expanding a branch once it reaches `scope`.
    fn referencers_reachable_from(
        &self,
        asset: &AssetId,
        scope: &ModuleScope,
    ) -> LookupResult<Vec<AssetId>>;

    /// Every asset stored under `path`, recursively.
    fn assets_under(&self, path: &str) -> LookupResult<Vec<AssetId>>;
}

impl<T: DependencyService + ?Sized> DependencyService for Arc<T> {
    fn direct_dependencies(&self, asset: &AssetId) -> LookupResult<Vec<AssetId>> {
        (**self).direct_dependencies(asset)
    }

    fn referencers_reachable_from(
        &self,
        asset: &AssetId,
        scope: &ModuleScope,
    ) -> LookupResult<Vec<AssetId>> {
        (**self).referencers_reachable_from(asset, scope)
    }

    fn assets_under(&self, path: &str) -> LookupResult<Vec<AssetId>> {
        (**self).assets_under(path)
    }
}

/// In-memory dependency graph, useful for embedding and tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryService {
    assets: BTreeSet<AssetId>,
    edges: BTreeMap<AssetId, Vec<AssetId>>,
    broken_dependencies: HashSet<AssetId>,
    broken_referencers: HashSet<AssetId>,
}

impl MemoryService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_edges<'a, I>(edges: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut service = Self::new();
        for (from, to) in edges {
            service.add_edge(from, to);
        }
        service
    }

    pub fn add_asset(&mut self, asset: impl Into<AssetId>) {
        self.assets.insert(asset.into());
    }

    /// Record that `from` depends on `to`. Calling twice records two edges.
    pub fn add_edge(&mut self, from: impl Into<AssetId>, to: impl Into<AssetId>) {
        let from = from.into();
        let to = to.into();
        self.assets.insert(from.clone());
        self.assets.insert(to.clone());
        self.edges.entry(from).or_default().push(to);
    }

    /// Make `direct_dependencies` fail for `asset`.
    pub fn break_dependencies(&mut self, asset: impl Into<AssetId>) {
        self.broken_dependencies.insert(asset.into());
    }

    /// Make `referencers_reachable_from` fail for `asset`.
    pub fn break_referencers(&mut self, asset: impl Into<AssetId>) {
        self.broken_referencers.insert(asset.into());
    }

    fn direct_referencers(&self, asset: &AssetId) -> Vec<&AssetId> {
        self.edges
            .iter()
            .filter(|(_, targets)| targets.contains(asset))
            .map(|(from, _)| from)
            .collect()
    }
}

impl DependencyService for MemoryService {
    fn direct_dependencies(&self, asset: &AssetId) -> LookupResult<Vec<AssetId>> {
        if self.broken_dependencies.contains(asset) {
            return Err(LookupError::Query {
                asset: asset.clone(),
                reason: "dependency lookup unavailable".to_string(),
            });
        }
        if !self.assets.contains(asset) {
            return Err(LookupError::NotFound(asset.clone()));
        }
        Ok(self.edges.get(asset).cloned().unwrap_or_default())
    }

    fn referencers_reachable_from(
        &self,
        asset: &AssetId,
        scope: &ModuleScope,
    ) -> LookupResult<Vec<AssetId>> {
        if self.broken_referencers.contains(asset) {
            return Err(LookupError::Query {
                asset: asset.clone(),
                reason: "referencer lookup unavailable".to_string(),
            });
        }
        if !self.assets.contains(asset) {
            return Err(LookupError::NotFound(asset.clone()));
        }

        let mut seen: BTreeSet<AssetId> = BTreeSet::new();
        let mut queue = VecDeque::from([asset.clone()]);
        while let Some(current) = queue.pop_front() {
            for referencer in self.direct_referencers(&current) {
                if referencer == asset || !seen.insert(referencer.clone()) {
                    continue;
                }
                if !scope.contains(referencer) {
                    queue.push_back(referencer.clone());
                }
            }
        }
        Ok(seen.into_iter().collect())
    }

    fn assets_under(&self, path: &str) -> LookupResult<Vec<AssetId>> {
        let scope = ModuleScope::new(path);
        Ok(self
            .assets
            .iter()
            .filter(|a| scope.contains(a))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_dependencies_keep_duplicates() {
        let service = MemoryService::with_edges([("/mod/r", "/ext/d"), ("/mod/r", "/ext/d")]);
        let deps = service.direct_dependencies(&"/mod/r".into()).unwrap();
        assert_eq!(deps.len(), 2);
    }

    #[test]
    fn test_unknown_asset_is_not_found() {
        let service = MemoryService::new();
        let err = service.direct_dependencies(&"/nope".into()).unwrap_err();
        assert!(matches!(err, LookupError::NotFound(_)));
    }

    #[test]
    fn test_referencers_are_transitive_and_stop_at_scope() {
        let service = MemoryService::with_edges([
            ("/mod/a", "/ext/b"),
            ("/ext/b", "/ext/c"),
            ("/other/x", "/mod/a"),
        ]);
        let scope = ModuleScope::new("mod");
        let refs = service
            .referencers_reachable_from(&"/ext/c".into(), &scope)
            .unwrap();
        // "/other/x" is only reachable through "/mod/a", which is in scope
        assert_eq!(refs, vec![AssetId::new("/ext/b"), AssetId::new("/mod/a")]);
    }

    #[test]
    fn test_assets_under_path() {
        let service = MemoryService::with_edges([("/mod/a", "/ext/b"), ("/mod/sub/c", "/mod/a")]);
        let assets = service.assets_under("/mod").unwrap();
        assert_eq!(assets.len(), 2);
    }
}
