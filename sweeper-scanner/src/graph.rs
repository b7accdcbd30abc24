use crate::asset::AssetId;
use serde::Serialize;
use std::collections::btree_map;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// dependency -> referencer -> number of times the edge was seen.
///
/// Counts are always at least one; bumping an existing pair never adds a
/// second entry for it. Counts saturate at `u64::MAX`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct WeightedGraph {
    edges: BTreeMap<AssetId, BTreeMap<AssetId, u64>>,
}

impl WeightedGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one occurrence of `referencer` depending on `dependency`.
    pub fn add(&mut self, dependency: AssetId, referencer: AssetId) {
        self.add_weighted(dependency, referencer, 1);
    }

    pub fn add_weighted(&mut self, dependency: AssetId, referencer: AssetId, count: u64) {
        if count == 0 {
            return;
        }
        let slot = self
            .edges
            .entry(dependency)
            .or_default()
            .entry(referencer)
            .or_insert(0);
        *slot = slot.saturating_add(count);
    }

    /// Fold `fragment` into `self`, adding counts for pairs present in both.
    pub fn merge(&mut self, fragment: &WeightedGraph) {
        for (dependency, referencers) in &fragment.edges {
            for (referencer, count) in referencers {
                self.add_weighted(dependency.clone(), referencer.clone(), *count);
            }
        }
    }

    pub fn count(&self, dependency: &AssetId, referencer: &AssetId) -> u64 {
        self.edges
            .get(dependency)
            .and_then(|r| r.get(referencer))
            .copied()
            .unwrap_or(0)
    }

    pub fn referencers(&self, dependency: &AssetId) -> Option<&BTreeMap<AssetId, u64>> {
        self.edges.get(dependency)
    }

    pub fn contains(&self, dependency: &AssetId) -> bool {
        self.edges.contains_key(dependency)
    }

    pub fn dependencies(&self) -> impl Iterator<Item = &AssetId> {
        self.edges.keys()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, AssetId, BTreeMap<AssetId, u64>> {
        self.edges.iter()
    }

    /// Sum of all counts recorded against `dependency`.
    pub fn total_references(&self, dependency: &AssetId) -> u64 {
        self.edges
            .get(dependency)
            .map(|r| r.values().fold(0u64, |acc, c| acc.saturating_add(*c)))
            .unwrap_or(0)
    }

    /// Every asset reachable from an asset matching `seed` by following
    /// referencer -> dependency edges. Matching seeds are included.
    pub fn reachable_from<F: Fn(&AssetId) -> bool>(&self, seed: F) -> BTreeSet<AssetId> {
        let mut forward: BTreeMap<&AssetId, Vec<&AssetId>> = BTreeMap::new();
        for (dependency, referencers) in &self.edges {
            for referencer in referencers.keys() {
                forward.entry(referencer).or_default().push(dependency);
            }
        }

        let mut queue: VecDeque<&AssetId> = forward
            .keys()
            .copied()
            .chain(self.edges.keys())
            .filter(|a| seed(*a))
            .collect();
        let mut seen = BTreeSet::new();
        while let Some(asset) = queue.pop_front() {
            if !seen.insert(asset.clone()) {
                continue;
            }
            if let Some(next) = forward.get(asset) {
                queue.extend(next.iter().copied().filter(|n| !seen.contains(*n)));
            }
        }
        seen
    }

    /// Number of distinct dependencies.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Number of distinct (dependency, referencer) pairs.
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

impl<'a> IntoIterator for &'a WeightedGraph {
    type Item = (&'a AssetId, &'a BTreeMap<AssetId, u64>);
    type IntoIter = btree_map::Iter<'a, AssetId, BTreeMap<AssetId, u64>>;

    fn into_iter(self) -> Self::IntoIter {
        self.edges.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> AssetId {
        AssetId::new(s)
    }

    #[test]
    fn test_repeated_pair_increments() {
        let mut g = WeightedGraph::new();
        g.add(id("/ext/d"), id("/mod/r"));
        g.add(id("/EXT/d"), id("/mod/R"));
        assert_eq!(g.count(&id("/ext/d"), &id("/mod/r")), 2);
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn test_merge_adds_counts() {
        let mut target = WeightedGraph::new();
        target.add_weighted(id("/d"), id("/r1"), 2);

        let mut fragment = WeightedGraph::new();
        fragment.add_weighted(id("/d"), id("/r1"), 3);
        fragment.add(id("/d"), id("/r2"));
        fragment.add(id("/e"), id("/r1"));

        target.merge(&fragment);
        assert_eq!(target.count(&id("/d"), &id("/r1")), 5);
        assert_eq!(target.count(&id("/d"), &id("/r2")), 1);
        assert_eq!(target.total_references(&id("/d")), 6);
        assert_eq!(target.len(), 2);
    }

    #[test]
    fn test_merge_is_order_independent() {
        let mut a = WeightedGraph::new();
        a.add(id("/d"), id("/r"));
        let mut b = WeightedGraph::new();
        b.add(id("/d"), id("/r"));
        b.add(id("/x"), id("/r"));

        let mut ab = a.clone();
        ab.merge(&b);
        let mut ba = b.clone();
        ba.merge(&a);
        assert_eq!(ab, ba);
    }

    #[test]
    fn test_counts_saturate_instead_of_wrapping() {
        let mut g = WeightedGraph::new();
        g.add_weighted(id("/d"), id("/r"), u64::MAX - 1);
        g.add_weighted(id("/d"), id("/r"), 5);
        g.add_weighted(id("/d"), id("/r2"), 7);

        assert_eq!(g.count(&id("/d"), &id("/r")), u64::MAX);
        assert_eq!(g.total_references(&id("/d")), u64::MAX);
    }

    #[test]
    fn test_reachable_from_follows_referencer_to_dependency() {
        // /mod/a -> /ext/x -> /ext/y, /pack/p -> /ext/z
        let mut g = WeightedGraph::new();
        g.add(id("/ext/x"), id("/mod/a"));
        g.add(id("/ext/y"), id("/ext/x"));
        g.add(id("/ext/z"), id("/pack/p"));

        let kept = g.reachable_from(|a| a.has_prefix("/mod/"));
        assert!(kept.contains(&id("/mod/a")));
        assert!(kept.contains(&id("/ext/x")));
        assert!(kept.contains(&id("/ext/y")));
        assert!(!kept.contains(&id("/ext/z")));
        assert!(!kept.contains(&id("/pack/p")));
    }

    #[test]
    fn test_zero_count_is_ignored() {
        let mut g = WeightedGraph::new();
        g.add_weighted(id("/d"), id("/r"), 0);
        assert!(g.is_empty());
    }

    #[test]
    fn test_serializes_as_nested_map() {
        let mut g = WeightedGraph::new();
        g.add(id("/Ext/D"), id("/Mod/R"));
        let json = serde_json::to_string(&g).unwrap();
        assert_eq!(json, r#"{"/Ext/D":{"/Mod/R":1}}"#);
    }
}
