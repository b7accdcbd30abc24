// Property tests for the dependency walker

use proptest::prelude::*;
use std::collections::BTreeSet;
use sweeper_scanner::{
    AssetId, Classification, DependencyService, MemoryService, ModuleScope, PathPolicy,
    WalkContext, WalkResult, WeightedGraph, walker::walk,
};

/// A random DAG: node i may only depend on nodes with a larger index.
fn arb_dag() -> impl Strategy<Value = (Vec<bool>, Vec<(usize, usize)>)> {
    (2usize..9).prop_flat_map(|n| {
        let internal = proptest::collection::vec(any::<bool>(), n);
        let edges = proptest::collection::vec((0..n, 0..n), 0..(n * 2)).prop_map(|pairs| {
            pairs
                .into_iter()
                .filter(|(a, b)| a < b)
                .collect::<Vec<_>>()
        });
        (internal, edges)
    })
}

fn node(i: usize, internal: &[bool]) -> String {
    if i == 0 || internal[i] {
        format!("/mod/n{}", i)
    } else {
        format!("/ext/n{}", i)
    }
}

fn build(internal: &[bool], edges: &[(usize, usize)]) -> MemoryService {
    let mut service = MemoryService::new();
    for i in 0..internal.len() {
        service.add_asset(node(i, internal));
    }
    for (a, b) in edges {
        service.add_edge(node(*a, internal), node(*b, internal));
    }
    service
}

#[derive(Default)]
struct Naive {
    graph: WeightedGraph,
    unreachable: BTreeSet<AssetId>,
    reach: BTreeSet<AssetId>,
}

/// Straight recursion with no memo and no cycle guard.
fn naive(service: &MemoryService, ctx: &WalkContext, asset: &AssetId, depth: usize) -> Option<Naive> {
    if depth > ctx.options.max_depth {
        return None;
    }
    let mut acc = Naive::default();
    let deps = service.direct_dependencies(asset).unwrap_or_default();
    for dep in deps {
        if ctx.policy.is_excluded(&dep) {
            continue;
        }
        acc.reach.insert(dep.clone());
        acc.graph.add(dep.clone(), asset.clone());
        let Some(child) = naive(service, ctx, &dep, depth + 1) else {
            continue;
        };
        acc.graph.merge(&child.graph);
        acc.unreachable.extend(child.unreachable.iter().cloned());
        acc.reach.extend(child.reach.iter().cloned());
        if !child.reach.iter().any(|a| ctx.scope.contains(a)) {
            acc.unreachable.insert(dep.clone());
            continue;
        }
        for r in &child.reach {
            acc.reach.insert(r.clone());
            acc.graph.add(r.clone(), dep.clone());
        }
    }
    Some(acc)
}

proptest! {
    #[test]
    fn inclusion_always_wins(suffix in "[a-z/]{0,12}") {
        let policy = PathPolicy::default()
            .with_exclude("/shared/")
            .with_include("/shared/");
        let path = AssetId::new(format!("/shared/{}", suffix));
        prop_assert_eq!(policy.classify(&path), Classification::Included);

        let brush = AssetId::new(format!("/Content/Brushify{}", suffix));
        prop_assert_eq!(PathPolicy::default().classify(&brush), Classification::Included);
    }

    #[test]
    fn depth_beyond_longest_path_changes_nothing((internal, edges) in arb_dag(), extra in 1usize..5) {
        let service = build(&internal, &edges);
        let root = AssetId::new(node(0, &internal));
        let longest = internal.len() - 1;

        let base = WalkContext::new(ModuleScope::new("mod")).with_max_depth(longest);
        let deeper = WalkContext::new(ModuleScope::new("mod")).with_max_depth(longest + extra);

        let a: WalkResult = walk(&service, &base, &root).unwrap();
        let b: WalkResult = walk(&service, &deeper, &root).unwrap();
        prop_assert_eq!(a.unreachable, b.unreachable);
        prop_assert_eq!(a.graph, b.graph);
    }

    #[test]
    fn memoized_walk_matches_plain_recursion((internal, edges) in arb_dag(), depth in 0usize..6) {
        let service = build(&internal, &edges);
        let root = AssetId::new(node(0, &internal));
        let ctx = WalkContext::new(ModuleScope::new("mod")).with_max_depth(depth);

        let walked = walk(&service, &ctx, &root).unwrap();
        let expected = naive(&service, &ctx, &root, 0).unwrap_or_default();
        prop_assert_eq!(walked.graph, expected.graph);
        prop_assert_eq!(walked.unreachable, expected.unreachable);
    }

    #[test]
    fn cyclic_graphs_terminate(n in 2usize..7, extra in proptest::collection::vec((0usize..7, 0usize..7), 0..10)) {
        let mut service = MemoryService::new();
        // ring plus random chords
        for i in 0..n {
            service.add_edge(format!("/ext/c{}", i), format!("/ext/c{}", (i + 1) % n));
        }
        for (a, b) in extra {
            service.add_edge(format!("/ext/c{}", a % n), format!("/ext/c{}", b % n));
        }
        let ctx = WalkContext::new(ModuleScope::new("mod")).with_max_depth(usize::MAX - 1);
        let result = walk(&service, &ctx, &AssetId::new("/ext/c0")).unwrap();
        prop_assert!(result.graph.len() <= n);
    }
}
