//! Community detection behind a pluggable interface.
//!
//! The partitioner only needs one thing from a detector: a membership
//! vector over the block graph, stable for a fixed seed. The built-in
//! [`ModularityDetector`] is a one-level greedy modularity optimizer;
//! wrappers around external graph libraries fit the same trait.

use rand::prelude::*;
use rand_chacha::ChaCha20Rng;
use std::collections::{BTreeMap, HashMap};

/// Assigns every vertex of a directed graph to a community.
pub trait CommunityDetector {
    /// Returns one community label per vertex, in vertex order.
    ///
    /// `edges` are directed `(src, dst)` pairs; parallel edges are allowed
    /// and count with their multiplicity. Implementations must be
    /// deterministic for a fixed `seed`.
    fn detect(
        &self,
        vertex_count: usize,
        edges: &[(u32, u32)],
        iterations: u32,
        seed: u64,
    ) -> Vec<u32>;
}

/// Greedy modularity maximization by local moving.
///
/// Treats the graph as undirected and weighted (parallel edges accumulate).
/// Every vertex starts in its own community; each iteration visits vertices
/// in a seeded-shuffled order and moves each to the neighboring community
/// with the largest positive modularity gain. Labels are compacted to
/// `0..k` in order of first appearance.
#[derive(Debug, Default, Clone, Copy)]
pub struct ModularityDetector;

impl ModularityDetector {
    /// Creates the detector.
    pub fn new() -> Self {
        Self
    }
}

impl CommunityDetector for ModularityDetector {
    fn detect(
        &self,
        vertex_count: usize,
        edges: &[(u32, u32)],
        iterations: u32,
        seed: u64,
    ) -> Vec<u32> {
        if vertex_count == 0 {
            return Vec::new();
        }

        // Undirected weighted adjacency. Self-edges do not move the
        // optimum and are dropped.
        let mut adjacency: Vec<BTreeMap<u32, f64>> = vec![BTreeMap::new(); vertex_count];
        let mut two_m = 0.0;
        for &(a, b) in edges {
            if a == b || a as usize >= vertex_count || b as usize >= vertex_count {
                continue;
            }
            *adjacency[a as usize].entry(b).or_insert(0.0) += 1.0;
            *adjacency[b as usize].entry(a).or_insert(0.0) += 1.0;
            two_m += 2.0;
        }

        let degree: Vec<f64> = adjacency.iter().map(|n| n.values().sum()).collect();
        let mut community: Vec<u32> = (0..vertex_count as u32).collect();
        if two_m == 0.0 {
            return compact(community);
        }
        let mut community_degree = degree.clone();

        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let mut order: Vec<usize> = (0..vertex_count).collect();
        for _ in 0..iterations {
            order.shuffle(&mut rng);
            let mut moved = false;
            for &v in &order {
                let current = community[v];
                let mut k_in: BTreeMap<u32, f64> = BTreeMap::new();
                for (&n, &w) in &adjacency[v] {
                    *k_in.entry(community[n as usize]).or_insert(0.0) += w;
                }

                // Evaluate gains with v removed from its community.
                community_degree[current as usize] -= degree[v];
                let gain = |c: u32| {
                    k_in.get(&c).copied().unwrap_or(0.0)
                        - degree[v] * community_degree[c as usize] / two_m
                };
                let mut best = current;
                let mut best_gain = gain(current);
                for &c in k_in.keys() {
                    let g = gain(c);
                    if g > best_gain {
                        best = c;
                        best_gain = g;
                    }
                }
                community_degree[best as usize] += degree[v];
                if best != current {
                    community[v] = best;
                    moved = true;
                }
            }
            if !moved {
                break;
            }
        }

        compact(community)
    }
}

/// Relabels communities to `0..k` in order of first appearance.
fn compact(labels: Vec<u32>) -> Vec<u32> {
    let mut remap: HashMap<u32, u32> = HashMap::new();
    let mut next = 0u32;
    labels
        .into_iter()
        .map(|label| {
            *remap.entry(label).or_insert_with(|| {
                let compacted = next;
                next += 1;
                compacted
            })
        })
        .collect()
}
