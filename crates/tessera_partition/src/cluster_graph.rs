//! The cluster-level graph and its merge operations.
//!
//! Vertices are clusters of block ids; a directed edge `(a, b)` carries the
//! number of net fanouts crossing from cluster `a` into cluster `b`.
//! The graph owns the cluster assignment and a copy of the netlist it was
//! built from, so edges can be rebuilt after any merge.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use tessera_common::{TesseraError, TesseraResult};

/// A cluster identifier. Kept dense (0..N-1) after renumbering.
pub type ClusterId = usize;

/// An opaque block identifier, owned by the external netlist.
pub type BlockId = String;

/// A cluster assignment: cluster id to the blocks it holds.
pub type ClusterMap = BTreeMap<ClusterId, BTreeSet<BlockId>>;

/// A netlist in partitioning form: net name to `(block, port)` terminals,
/// entry 0 being the driver.
pub type ClusterNetlist = BTreeMap<String, Vec<(BlockId, String)>>;

/// A vertex of the cluster graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterVertex {
    /// The cluster this vertex stands for.
    pub id: ClusterId,
    /// The number of blocks in that cluster.
    pub size: usize,
}

/// A directed, weighted edge of the cluster graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterEdge {
    /// Source cluster.
    pub from: ClusterId,
    /// Destination cluster.
    pub to: ClusterId,
    /// Number of net fanouts crossing this edge.
    pub weight: u64,
}

/// A directed multigraph over clusters, with merge support.
#[derive(Debug, Clone)]
pub struct ClusterGraph {
    clusters: ClusterMap,
    netlist: ClusterNetlist,
    vertices: Vec<ClusterVertex>,
    edges: BTreeMap<(ClusterId, ClusterId), u64>,
}

impl ClusterGraph {
    /// Builds a cluster graph from an assignment and a netlist.
    pub fn new(clusters: ClusterMap, netlist: ClusterNetlist) -> TesseraResult<Self> {
        let mut graph = Self {
            clusters,
            netlist,
            vertices: Vec::new(),
            edges: BTreeMap::new(),
        };
        graph.update()?;
        Ok(graph)
    }

    /// Returns the current cluster assignment.
    pub fn clusters(&self) -> &ClusterMap {
        &self.clusters
    }

    /// Returns the current vertices.
    pub fn vertices(&self) -> &[ClusterVertex] {
        &self.vertices
    }

    /// Returns the current edges.
    pub fn edges(&self) -> Vec<ClusterEdge> {
        self.edges
            .iter()
            .map(|(&(from, to), &weight)| ClusterEdge { from, to, weight })
            .collect()
    }

    /// Returns the sum of all edge weights.
    pub fn total_weight(&self) -> u64 {
        self.edges.values().sum()
    }

    /// Rebuilds vertices and edges from the current assignment.
    ///
    /// Every inter-cluster net fanout contributes one unit of weight to the
    /// edge from the driver's cluster to the receiver's cluster;
    /// intra-cluster fanouts contribute nothing. A self-loop in the result
    /// means the assignment is corrupt and fails hard.
    pub fn update(&mut self) -> TesseraResult<()> {
        self.vertices.clear();
        self.edges.clear();

        let mut owner: HashMap<&str, ClusterId> = HashMap::new();
        for (id, blocks) in &self.clusters {
            self.vertices.push(ClusterVertex {
                id: *id,
                size: blocks.len(),
            });
            for blk in blocks {
                owner.insert(blk.as_str(), *id);
            }
        }

        for (net_name, terminals) in &self.netlist {
            let Some((src_blk, _)) = terminals.first() else {
                continue;
            };
            let src = *owner.get(src_blk.as_str()).ok_or_else(|| {
                TesseraError::invariant(format!(
                    "block {src_blk} of net {net_name} is not assigned to any cluster"
                ))
            })?;
            for (dst_blk, _) in &terminals[1..] {
                let dst = *owner.get(dst_blk.as_str()).ok_or_else(|| {
                    TesseraError::invariant(format!(
                        "block {dst_blk} of net {net_name} is not assigned to any cluster"
                    ))
                })?;
                if dst == src {
                    continue;
                }
                *self.edges.entry((src, dst)).or_insert(0) += 1;
            }
        }

        for &(from, to) in self.edges.keys() {
            if from == to {
                return Err(TesseraError::invariant(format!(
                    "self-loop on cluster {from} while rebuilding the cluster graph"
                )));
            }
        }
        Ok(())
    }

    fn successors(&self, from: ClusterId) -> impl Iterator<Item = ClusterId> + '_ {
        self.edges
            .range((from, ClusterId::MIN)..=(from, ClusterId::MAX))
            .map(|(&(_, to), _)| to)
    }

    /// Returns `true` if any vertex can reach itself along directed edges.
    pub fn has_loop(&self) -> bool {
        for start in self.clusters.keys().copied() {
            let mut visited = HashSet::new();
            let mut queue = VecDeque::from([start]);
            while let Some(n) = queue.pop_front() {
                if !visited.insert(n) {
                    continue;
                }
                for to in self.successors(n) {
                    if to == start {
                        return true;
                    }
                    queue.push_back(to);
                }
            }
        }
        false
    }

    /// Returns the cluster ids in an order respecting every edge.
    ///
    /// Only meaningful when [`has_loop`](Self::has_loop) is `false`.
    pub fn topological_sort(&self) -> Vec<ClusterId> {
        let mut visited = HashSet::new();
        let mut out = Vec::with_capacity(self.clusters.len());
        for v in self.clusters.keys().copied() {
            if !visited.contains(&v) {
                self.sort_visit(v, &mut visited, &mut out);
            }
        }
        out.reverse();
        out
    }

    fn sort_visit(&self, v: ClusterId, visited: &mut HashSet<ClusterId>, out: &mut Vec<ClusterId>) {
        visited.insert(v);
        for to in self.successors(v) {
            if !visited.contains(&to) {
                self.sort_visit(to, visited, out);
            }
        }
        out.push(v);
    }

    /// Finds a directed cycle through `start`, or returns an empty path.
    ///
    /// Brute-force BFS with predecessor recording; the cluster graph stays
    /// small (tens to low hundreds of vertices), so this is fine.
    pub fn find_loop_path(&self, start: ClusterId) -> Vec<ClusterId> {
        let mut pred: HashMap<ClusterId, ClusterId> = HashMap::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([start]);

        while let Some(n) = queue.pop_front() {
            if visited.contains(&n) {
                if n == start {
                    let mut path = vec![start];
                    let mut cur = start;
                    while let Some(&p) = pred.get(&cur) {
                        cur = p;
                        if cur == start {
                            break;
                        }
                        path.push(cur);
                    }
                    return path;
                }
                continue;
            }
            visited.insert(n);
            for to in self.successors(n) {
                pred.entry(to).or_insert(n);
                queue.push_back(to);
            }
        }
        Vec::new()
    }

    /// Moves every block of `target` into `base` and erases `target`.
    ///
    /// Does not rebuild edges; call [`update`](Self::update) afterwards.
    pub fn merge(&mut self, base: ClusterId, target: ClusterId) -> TesseraResult<()> {
        if !self.clusters.contains_key(&base) {
            return Err(TesseraError::invariant(format!(
                "merge base cluster {base} does not exist"
            )));
        }
        let blocks = self.clusters.remove(&target).ok_or_else(|| {
            TesseraError::invariant(format!("merge target cluster {target} does not exist"))
        })?;
        if let Some(base_blocks) = self.clusters.get_mut(&base) {
            base_blocks.extend(blocks);
        }
        Ok(())
    }

    /// Collapses cycles until the graph is a DAG, then renumbers.
    ///
    /// While a cycle exists, any cycle path is found and every vertex on it
    /// is merged into the path's first element. Fails with
    /// [`TesseraError::AcyclicityInfeasible`] if a sweep over all vertices
    /// finds no collapsible path while a loop remains.
    pub fn merge_until_acyclic(&mut self) -> TesseraResult<()> {
        while self.has_loop() {
            let ids: Vec<ClusterId> = self.clusters.keys().copied().collect();
            let mut progressed = false;
            for v in ids {
                let path = self.find_loop_path(v);
                if !path.is_empty() {
                    let base = path[0];
                    for &target in &path[1..] {
                        self.merge(base, target)?;
                    }
                    self.update()?;
                    progressed = true;
                    break;
                }
            }
            if !progressed {
                return Err(TesseraError::AcyclicityInfeasible);
            }
        }
        self.fix_cluster_id()
    }

    /// Greedily merges clusters along the heaviest edges under a size bound.
    ///
    /// A merge of edge `(a, b)` is accepted iff the merged graph stays
    /// acyclic, `|a| + |b|` fits in `max_size`, and the total edge weight
    /// does not increase. Each accepted merge restarts the sweep; the pass
    /// ends when a full sweep accepts nothing. Fails upfront with
    /// [`TesseraError::CapacityInfeasible`] if a cluster already exceeds
    /// the bound.
    pub fn merge_with_capacity(&mut self, max_size: usize) -> TesseraResult<()> {
        loop {
            let old_cluster_count = self.clusters.len();
            for (id, blocks) in &self.clusters {
                if blocks.len() > max_size {
                    return Err(TesseraError::CapacityInfeasible {
                        cluster: *id,
                        size: blocks.len(),
                        max_size,
                    });
                }
            }

            // Heaviest edges first; (from, to) tie-break keeps the sweep
            // deterministic.
            let mut candidates: Vec<(ClusterId, ClusterId, u64)> = self
                .edges
                .iter()
                .map(|(&(from, to), &w)| (from, to, w))
                .collect();
            candidates.sort_by(|a, b| b.2.cmp(&a.2).then((a.0, a.1).cmp(&(b.0, b.1))));

            let weight_before = self.total_weight();
            for (from, to, _) in candidates {
                let from_size = self.clusters[&from].len();
                let to_size = self.clusters[&to].len();
                if from_size + to_size > max_size {
                    continue;
                }
                let mut trial = self.clone();
                trial.merge(from, to)?;
                trial.update()?;
                if !trial.has_loop() && trial.total_weight() <= weight_before {
                    self.clusters = trial.clusters;
                    self.update()?;
                    break;
                }
            }

            if old_cluster_count == self.clusters.len() {
                break;
            }
        }
        self.fix_cluster_id()
    }

    /// Renumbers clusters densely to `0..N-1`, preserving iteration order,
    /// and rebuilds the graph.
    pub fn fix_cluster_id(&mut self) -> TesseraResult<()> {
        let old = std::mem::take(&mut self.clusters);
        for (next_id, (_, blocks)) in old.into_iter().enumerate() {
            self.clusters.insert(next_id, blocks);
        }
        self.update()
    }
}
