//! Per-net routed graphs and the router interface.
//!
//! A [`RoutedGraph`] is the physical realization of one net: for every
//! receiver pin, the ordered node path from the driver's port node to that
//! receiver's port node. Routes are trees, so two segments agree on their
//! common prefix. The retimer mutates routed graphs by splicing
//! `Register` nodes into segments; both mutators take the shared
//! [`NodeArena`] so new registers get globally unique node ids.

use crate::ids::{NetId, NodeId, PinId};
use crate::node::{NodeArena, NodeKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A route snapshot: receiver pin id to the node path reaching it.
pub type RouteSegments = BTreeMap<PinId, Vec<NodeId>>;

/// The physical routing of one net.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutedGraph {
    net: NetId,
    segments: RouteSegments,
}

impl RoutedGraph {
    /// Creates a routed graph for `net` from its per-receiver segments.
    ///
    /// Every segment must start at the driver's port node and end at the
    /// receiver's port node.
    pub fn new(net: NetId, segments: RouteSegments) -> Self {
        Self { net, segments }
    }

    /// Returns the net this graph realizes.
    pub fn net(&self) -> NetId {
        self.net
    }

    /// Returns a snapshot of the current segments.
    ///
    /// Callers that interleave traversal with mutation take a fresh
    /// snapshot after every mutation; the graph itself never hands out
    /// references into live segment storage.
    pub fn route(&self) -> RouteSegments {
        self.segments.clone()
    }

    /// Returns the receiver pins of `route` in dependency order.
    ///
    /// Routes are trees and every segment starts at the driver, so the
    /// segment of a receiver that lies on the way to another receiver is a
    /// strict prefix of the longer segment. Ascending segment length (pin
    /// id as tie-break) therefore visits prerequisites first.
    pub fn pin_order(&self, route: &RouteSegments) -> Vec<PinId> {
        let mut order: Vec<PinId> = route.keys().copied().collect();
        order.sort_by_key(|pin| (route[pin].len(), pin.as_raw()));
        order
    }

    /// Inserts a pipeline register on the route feeding `pin`.
    ///
    /// The register lands on the wire closest to the receiver that can hold
    /// one: walking back from the receiver's port node, switch-box inputs
    /// are skipped, and the register is spliced after the node found
    /// (typically the nearest upstream switch-box output). Every receiver
    /// whose segment shares that wire picks up the register too.
    ///
    /// Returns the ids of all receiver pins whose wave number advances by
    /// one; empty if `pin` has no segment or the segment is degenerate.
    pub fn insert_pipeline_reg(&mut self, arena: &mut NodeArena, pin: PinId) -> BTreeSet<PinId> {
        let Some(segment) = self.segments.get(&pin) else {
            return BTreeSet::new();
        };
        if segment.len() < 2 {
            return BTreeSet::new();
        }
        let mut j = segment.len() - 2;
        while j > 0 && arena.get(segment[j]).is_sb_in() {
            j -= 1;
        }
        let after = segment[j];
        let before = segment[j + 1];
        let reg = alloc_register(arena, after);
        self.splice_on_edge(reg, after, before)
    }

    /// Inserts a pipeline register immediately after `node` in every
    /// segment where `node` is not the last element.
    ///
    /// With `force` false, segments in which a register already directly
    /// follows `node` are left alone. Returns the ids of all receiver pins
    /// downstream of the new register; empty means nothing was inserted.
    pub fn insert_reg_output(
        &mut self,
        arena: &mut NodeArena,
        node: NodeId,
        force: bool,
    ) -> BTreeSet<PinId> {
        let mut targets = BTreeMap::new();
        for (pin, segment) in &self.segments {
            let Some(pos) = segment.iter().position(|&n| n == node) else {
                continue;
            };
            if pos + 1 >= segment.len() {
                continue;
            }
            if !force && arena.get(segment[pos + 1]).is_register() {
                continue;
            }
            targets.insert(*pin, pos);
        }
        if targets.is_empty() {
            return BTreeSet::new();
        }
        // One register serves the whole fanout of the node's output wire.
        let reg = alloc_register(arena, node);
        let mut affected = BTreeSet::new();
        for (pin, segment) in &mut self.segments {
            if let Some(&pos) = targets.get(pin) {
                segment.insert(pos + 1, reg);
                affected.insert(*pin);
            }
        }
        affected
    }

    /// Splices `reg` between `after` and `before` in every segment that
    /// contains that consecutive pair, returning the affected receivers.
    fn splice_on_edge(&mut self, reg: NodeId, after: NodeId, before: NodeId) -> BTreeSet<PinId> {
        let mut affected = BTreeSet::new();
        for (pin, segment) in &mut self.segments {
            let hit = segment
                .windows(2)
                .position(|w| w[0] == after && w[1] == before);
            if let Some(pos) = hit {
                segment.insert(pos + 1, reg);
                affected.insert(*pin);
            }
        }
        affected
    }
}

/// Creates a register node co-located with `at`.
fn alloc_register(arena: &mut NodeArena, at: NodeId) -> NodeId {
    let (x, y) = {
        let node = arena.get(at);
        (node.x, node.y)
    };
    let name = format!("reg_{x}_{y}_{}", arena.len());
    arena.alloc(name, x, y, NodeKind::Register)
}

/// The owner of a partition's netlist and routed graphs.
///
/// The retimer merges the view of several routers into one pass, mutates a
/// working copy of their routed graphs, and hands the updated routes back
/// through [`set_current_routes`](Router::set_current_routes) when the pass
/// finishes. Each router receives only the nets it owns.
pub trait Router {
    /// Returns the nets this router owns.
    fn netlist(&self) -> &crate::net::Netlist;

    /// Returns an owned copy of this router's routed graphs, keyed by net.
    fn routed_graphs(&self) -> BTreeMap<NetId, RoutedGraph>;

    /// Returns `true` if this router owns `net`.
    fn has_net(&self, net: NetId) -> bool;

    /// Accepts the final routes for the nets this router owns.
    fn set_current_routes(&mut self, routes: BTreeMap<NetId, RouteSegments>);
}
