//! Netlist partitioning for the Tessera CGRA toolchain.
//!
//! Partitioning reconciles a probabilistic community-detection result with
//! two hard constraints: the cluster-level graph must be acyclic (downstream
//! scheduling needs a DAG) and no cluster may exceed the capacity of a
//! partition. The pipeline is:
//!
//! 1. **Detect** — a [`CommunityDetector`] assigns every block to a
//!    community, maximizing modularity over the block-level fanout graph.
//! 2. **Acyclic merge** — cycles between clusters are collapsed by merging
//!    every cluster on a found cycle path ([`ClusterGraph::merge_until_acyclic`]).
//! 3. **Capacity merge** — clusters are greedily coalesced along the
//!    heaviest inter-cluster edges, as long as no cycle appears, the size
//!    bound holds, and the total cut weight does not grow
//!    ([`ClusterGraph::merge_with_capacity`]).

#![warn(missing_docs)]

pub mod cluster_graph;
pub mod detect;
pub mod partitioner;

pub use cluster_graph::{
    BlockId, ClusterEdge, ClusterGraph, ClusterId, ClusterMap, ClusterNetlist, ClusterVertex,
};
pub use detect::{CommunityDetector, ModularityDetector};
pub use partitioner::{PartitionConfig, Partitioner};
