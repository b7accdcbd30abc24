// Used / unused / dead-dependency classification

use crate::usage::UsageReport;
use serde::Serialize;
use std::collections::BTreeSet;
use sweeper_scanner::{AssetId, ModuleScope, WeightedGraph, asset::normalize};

/// Ordered set of assets. Every operation returns a new set and leaves its
/// inputs untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AssetSet(BTreeSet<AssetId>);

impl AssetSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, asset: AssetId) -> bool {
        self.0.insert(asset)
    }

    pub fn contains(&self, asset: &AssetId) -> bool {
        self.0.contains(asset)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AssetId> {
        self.0.iter()
    }

    pub fn union(&self, other: &AssetSet) -> AssetSet {
        self.0.union(&other.0).cloned().collect()
    }

    pub fn difference(&self, other: &AssetSet) -> AssetSet {
        self.0.difference(&other.0).cloned().collect()
    }

    pub fn intersection(&self, other: &AssetSet) -> AssetSet {
        self.0.intersection(&other.0).cloned().collect()
    }

    /// Assets whose path contains `needle`, ignoring case. An empty needle
    /// keeps everything.
    pub fn filter_containing(&self, needle: &str) -> AssetSet {
        let needle = normalize(needle);
        self.0
            .iter()
            .filter(|a| a.key().contains(&needle))
            .cloned()
            .collect()
    }

    pub fn to_vec(&self) -> Vec<AssetId> {
        self.0.iter().cloned().collect()
    }
}

impl FromIterator<AssetId> for AssetSet {
    fn from_iter<I: IntoIterator<Item = AssetId>>(iter: I) -> Self {
        AssetSet(iter.into_iter().collect())
    }
}

impl From<BTreeSet<AssetId>> for AssetSet {
    fn from(set: BTreeSet<AssetId>) -> Self {
        AssetSet(set)
    }
}

impl IntoIterator for AssetSet {
    type Item = AssetId;
    type IntoIter = std::collections::btree_set::IntoIter<AssetId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a AssetSet {
    type Item = &'a AssetId;
    type IntoIter = std::collections::btree_set::Iter<'a, AssetId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Liveness {
    pub used: AssetSet,
    pub unused: AssetSet,
    /// Assets outside the module that the walk found nothing inside the
    /// module keeping alive.
    pub dead_dependencies: AssetSet,
}

impl Liveness {
    /// Every asset the usage report mentions.
    pub fn all(&self) -> AssetSet {
        self.used.union(&self.unused)
    }

    /// What a removal pass would offer for deletion.
    pub fn candidates(&self) -> AssetSet {
        self.unused.union(&self.dead_dependencies)
    }
}

/// Combine a usage report with a walk's unreachable set and graph.
///
/// An unreachable asset outside `scope` is only a dead dependency when no
/// chain of edges in `graph` leads to it from an asset inside `scope`.
pub fn classify(
    report: &UsageReport,
    scope: &ModuleScope,
    unreachable: &BTreeSet<AssetId>,
    graph: &WeightedGraph,
) -> Liveness {
    let kept_alive = graph.reachable_from(|a| scope.contains(a));
    let dead_dependencies = unreachable
        .iter()
        .filter(|a| !scope.contains(a) && !kept_alive.contains(*a))
        .cloned()
        .collect();

    Liveness {
        used: report.used(),
        unused: report.unused(),
        dead_dependencies,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> AssetSet {
        items.iter().map(|s| AssetId::new(*s)).collect()
    }

    #[test]
    fn test_set_operations() {
        let a = set(&["/mod/a", "/mod/b"]);
        let b = set(&["/MOD/B", "/mod/c"]);

        assert_eq!(a.union(&b), set(&["/mod/a", "/mod/b", "/mod/c"]));
        assert_eq!(a.difference(&b), set(&["/mod/a"]));
        assert_eq!(a.intersection(&b), set(&["/mod/b"]));
    }

    #[test]
    fn test_filter_containing_ignores_case() {
        let s = set(&["/Mod/Meshes/SM_Rock", "/Mod/Textures/T_Rock", "/Mod/Meshes/SM_Tree"]);
        assert_eq!(s.filter_containing("rock").len(), 2);
        assert_eq!(s.filter_containing("MESHES").len(), 2);
        assert_eq!(s.filter_containing("").len(), 3);
        assert!(s.filter_containing("water").is_empty());
    }

    #[test]
    fn test_classify_keeps_external_unreachable_only() {
        let report = UsageReport::from_rows([("/mod/a", "X", 3), ("/mod/b", "Y", 0)]);
        let unreachable: BTreeSet<AssetId> =
            [AssetId::new("/external/z"), AssetId::new("/mod/leaf")].into();
        let mut graph = WeightedGraph::new();
        graph.add(AssetId::new("/external/z"), AssetId::new("/pack/p"));

        let liveness = classify(&report, &ModuleScope::new("mod"), &unreachable, &graph);

        assert_eq!(liveness.used, set(&["/mod/a/X"]));
        assert_eq!(liveness.unused, set(&["/mod/b/Y"]));
        assert_eq!(liveness.dead_dependencies, set(&["/external/z"]));
        assert_eq!(liveness.candidates(), set(&["/mod/b/Y", "/external/z"]));
        assert_eq!(liveness.all().len(), 2);
    }

    #[test]
    fn test_classify_spares_anything_the_module_reaches() {
        // /mod/a -> /ext/x -> /ext/y, both leaves of the walk are unreachable
        let report = UsageReport::from_rows([("/mod", "a", 5)]);
        let unreachable: BTreeSet<AssetId> =
            [AssetId::new("/ext/x"), AssetId::new("/ext/y")].into();
        let mut graph = WeightedGraph::new();
        graph.add(AssetId::new("/ext/x"), AssetId::new("/mod/a"));
        graph.add(AssetId::new("/ext/y"), AssetId::new("/ext/x"));

        let liveness = classify(&report, &ModuleScope::new("mod"), &unreachable, &graph);

        assert!(liveness.dead_dependencies.is_empty());
        assert!(liveness.candidates().is_empty());
    }
}
