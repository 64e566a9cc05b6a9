//! The logical timing graph derived from a netlist.
//!
//! One [`TimingNode`] per distinct driver-pin name: a node aggregates every
//! net driven by the operator of that name, and edges follow net fanout.
//! The graph is rebuilt from the current netlist once per retiming pass and
//! stays immutable during it.

use std::collections::HashMap;
use tessera_fabric::{NetId, Netlist, PinId};

/// A logical operator in the timing DAG.
///
/// Pin-list naming follows the net-centric view of the operator:
/// `sink_pins` holds the operator's own *driver* terminals (the pins its
/// nets sink data out of it through), while `src_pins` holds the receiver
/// terminals other nets drive *into* it. The inversion is deliberate and
/// load-bearing for the retimer, which reads source waves from `src_pins`
/// and seeds output delays through `sink_pins`.
#[derive(Debug, Clone)]
pub struct TimingNode {
    /// The operator name (shared by all its pins).
    pub name: String,
    /// Receiver pins feeding this operator.
    pub src_pins: Vec<PinId>,
    /// Driver pins of the nets this operator drives.
    pub sink_pins: Vec<PinId>,
    /// Successor operators, as indices into the graph.
    pub next: Vec<usize>,
}

/// The timing DAG over logical operators.
#[derive(Debug, Clone)]
pub struct TimingGraph {
    nodes: Vec<TimingNode>,
    by_name: HashMap<String, usize>,
}

impl TimingGraph {
    /// Derives the timing graph from a netlist.
    ///
    /// Nets are visited in id order, so node indices and pin lists are
    /// deterministic for a given netlist.
    pub fn new(netlist: &Netlist) -> Self {
        let mut graph = Self {
            nodes: Vec::new(),
            by_name: HashMap::new(),
        };
        for net in netlist.values() {
            let driver = net.driver();
            let src_idx = graph.get_or_create(&driver.name);
            graph.nodes[src_idx].sink_pins.push(driver.id);
            for pin in net.receivers() {
                let sink_idx = graph.get_or_create(&pin.name);
                graph.nodes[src_idx].next.push(sink_idx);
                graph.nodes[sink_idx].src_pins.push(pin.id);
            }
        }
        graph
    }

    fn get_or_create(&mut self, name: &str) -> usize {
        if let Some(&idx) = self.by_name.get(name) {
            return idx;
        }
        let idx = self.nodes.len();
        self.nodes.push(TimingNode {
            name: name.to_string(),
            src_pins: Vec::new(),
            sink_pins: Vec::new(),
            next: Vec::new(),
        });
        self.by_name.insert(name.to_string(), idx);
        idx
    }

    /// Returns the node at `idx`.
    pub fn node(&self, idx: usize) -> &TimingNode {
        &self.nodes[idx]
    }

    /// Returns the index of the operator with the given name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Returns the number of operators.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the graph has no operators.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns node indices such that every edge goes forward in the order.
    pub fn topological_sort(&self) -> Vec<usize> {
        let mut visited = vec![false; self.nodes.len()];
        let mut out = Vec::with_capacity(self.nodes.len());
        for idx in 0..self.nodes.len() {
            if !visited[idx] {
                self.sort_visit(idx, &mut visited, &mut out);
            }
        }
        out.reverse();
        out
    }

    fn sort_visit(&self, idx: usize, visited: &mut [bool], out: &mut Vec<usize>) {
        visited[idx] = true;
        for &next in &self.nodes[idx].next {
            if !visited[next] {
                self.sort_visit(next, visited, out);
            }
        }
        out.push(idx);
    }

    /// Returns the ids of every net driven by the operator at `idx`.
    pub fn sink_net_ids(&self, idx: usize, netlist: &Netlist) -> Vec<NetId> {
        let name = &self.nodes[idx].name;
        netlist
            .iter()
            .filter(|(_, net)| &net.driver().name == name)
            .map(|(&id, _)| id)
            .collect()
    }
}
