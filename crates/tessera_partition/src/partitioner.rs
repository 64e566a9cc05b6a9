//! The partitioning pipeline: detect, collapse cycles, enforce capacity.

use crate::cluster_graph::{ClusterGraph, ClusterId, ClusterMap, ClusterNetlist};
use crate::detect::CommunityDetector;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tessera_common::{TesseraError, TesseraResult};

/// Configuration for a partitioning run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PartitionConfig {
    /// Optimizer iterations handed to the community detector.
    pub iterations: u32,
    /// Seed for the detector; fixes the membership vector.
    pub seed: u64,
    /// Maximum number of blocks per cluster after the capacity merge.
    pub max_cluster_size: usize,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            iterations: 10,
            seed: 0,
            max_cluster_size: 32,
        }
    }
}

/// Drives a [`CommunityDetector`] and the cluster graph merges.
pub struct Partitioner<'a> {
    detector: &'a dyn CommunityDetector,
}

impl<'a> Partitioner<'a> {
    /// Creates a partitioner over the given detector.
    pub fn new(detector: &'a dyn CommunityDetector) -> Self {
        Self { detector }
    }

    /// Runs community detection over the block fanout graph.
    ///
    /// Builds a directed graph with one vertex per distinct block (in net
    /// iteration order) and one edge per net fanout, asks the detector for
    /// a membership vector, and inverts it into a cluster map. Every block
    /// of the netlist lands in exactly one cluster.
    pub fn partition_netlist(
        &self,
        netlist: &ClusterNetlist,
        iterations: u32,
        seed: u64,
    ) -> TesseraResult<ClusterMap> {
        let mut block_index: HashMap<&str, u32> = HashMap::new();
        let mut blocks: Vec<&str> = Vec::new();
        for terminals in netlist.values() {
            for (blk, _) in terminals {
                if !block_index.contains_key(blk.as_str()) {
                    block_index.insert(blk, blocks.len() as u32);
                    blocks.push(blk);
                }
            }
        }

        let mut edges = Vec::new();
        for terminals in netlist.values() {
            let Some((src, _)) = terminals.first() else {
                continue;
            };
            let src_idx = block_index[src.as_str()];
            for (dst, _) in &terminals[1..] {
                edges.push((src_idx, block_index[dst.as_str()]));
            }
        }

        let membership = self.detector.detect(blocks.len(), &edges, iterations, seed);
        if membership.len() != blocks.len() {
            return Err(TesseraError::invariant(format!(
                "community detector returned {} labels for {} vertices",
                membership.len(),
                blocks.len()
            )));
        }

        let mut clusters = ClusterMap::new();
        for (idx, blk) in blocks.iter().enumerate() {
            let cluster = membership[idx] as ClusterId;
            clusters
                .entry(cluster)
                .or_default()
                .insert((*blk).to_string());
        }
        Ok(clusters)
    }

    /// Runs the full pipeline: detection, acyclic merge, capacity merge.
    ///
    /// Returns the final cluster graph; its cluster ids are dense and its
    /// vertex set is acyclic with every cluster within the size bound.
    pub fn partition(
        &self,
        netlist: &ClusterNetlist,
        config: &PartitionConfig,
    ) -> TesseraResult<ClusterGraph> {
        let clusters = self.partition_netlist(netlist, config.iterations, config.seed)?;
        let mut graph = ClusterGraph::new(clusters, netlist.clone())?;
        graph.merge_until_acyclic()?;
        graph.merge_with_capacity(config.max_cluster_size)?;
        Ok(graph)
    }
}
