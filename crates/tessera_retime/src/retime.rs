//! The wave-aligned retiming / static timing pass.
//!
//! The pass walks the logical timing graph in topological order. For every
//! net an operator drives it first aligns the wave numbers of the
//! operator's source pins (inserting pipeline registers on lagging feeder
//! routes), then pushes combinational delay through the net's routed
//! segments, inserting a register whenever a wire's accumulated delay
//! would blow the clock budget. Inserting a register invalidates the
//! segments being walked, so the propagation restarts from a fresh route
//! snapshot after every mutation and runs to a fix point.

use crate::delay::DelayModel;
use crate::graph::TimingGraph;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tessera_common::{ClockSpec, TesseraError, TesseraResult};
use tessera_diagnostics::{Diagnostic, DiagnosticSink};
use tessera_fabric::{
    LayoutGrid, NetId, Netlist, NodeArena, NodeId, Pin, PinId, RoutedGraph, Router,
    TimingCostTable,
};

/// The outcome of a retiming pass.
#[derive(Debug, Clone)]
pub struct RetimingReport {
    /// The largest wave number of any pin; the pipeline depth of the design.
    pub max_wave: u64,
    /// Final wave number per pin.
    pub pin_wave: HashMap<PinId, u64>,
    /// Final accumulated combinational delay per pin.
    pub pin_delay: HashMap<PinId, u64>,
}

/// Returns `(net, driver pin)` for every net driven by a primary input.
pub fn source_pins(netlist: &Netlist) -> Vec<(NetId, PinId)> {
    netlist
        .iter()
        .filter(|(_, net)| net.driver().is_primary_input())
        .map(|(&id, net)| (id, net.driver().id))
        .collect()
}

/// Returns the largest wave number in the map, or 0 if it is empty.
pub fn max_wave_number(pin_wave: &HashMap<PinId, u64>) -> u64 {
    pin_wave.values().copied().max().unwrap_or(0)
}

/// The retiming pass over one or more routers.
pub struct RetimingPass<'a> {
    layout: &'a LayoutGrid,
    costs: &'a TimingCostTable,
    clock: ClockSpec,
}

impl<'a> RetimingPass<'a> {
    /// Creates a pass for the given board, cost table, and clock target.
    pub fn new(layout: &'a LayoutGrid, costs: &'a TimingCostTable, clock: ClockSpec) -> Self {
        Self {
            layout,
            costs,
            clock,
        }
    }

    /// Retimes the merged netlist of `routers` and hands the mutated routes
    /// back to them.
    ///
    /// `arena` is the node storage shared by all pins and routed graphs;
    /// register nodes created by the pass are allocated from it. Returns a
    /// report whose `max_wave` is the pipeline depth of the retimed design.
    pub fn run(
        &self,
        arena: &mut NodeArena,
        routers: &mut [&mut dyn Router],
        sink: &DiagnosticSink,
    ) -> TesseraResult<RetimingReport> {
        let model = DelayModel::new(self.layout, self.costs);
        let allowed = self.clock.allowed_delay();

        // Merge every router's view into one netlist and one routed map.
        let mut netlist = Netlist::new();
        let mut routed: BTreeMap<NetId, RoutedGraph> = BTreeMap::new();
        for router in routers.iter() {
            for (&net_id, net) in router.netlist() {
                if netlist.insert(net_id, net.clone()).is_some() {
                    return Err(TesseraError::invariant(format!(
                        "net {net_id} is owned by more than one router"
                    )));
                }
            }
            for (net_id, graph) in router.routed_graphs() {
                routed.insert(net_id, graph);
            }
        }

        // Side tables keyed by id; pins and nodes themselves stay read-only.
        let mut pin_info: HashMap<PinId, Pin> = HashMap::new();
        let mut node_to_pin: HashMap<NodeId, PinId> = HashMap::new();
        let mut pin_to_net: HashMap<PinId, NetId> = HashMap::new();
        for (&net_id, net) in &netlist {
            for pin in &net.pins {
                pin_info.insert(pin.id, pin.clone());
                node_to_pin.insert(pin.node, pin.id);
                pin_to_net.insert(pin.id, net_id);
            }
        }

        let mut pin_delay: HashMap<PinId, u64> = HashMap::new();
        let mut pin_wave: HashMap<PinId, u64> = HashMap::new();
        for (_, driver_pin) in source_pins(&netlist) {
            pin_wave.insert(driver_pin, 0);
            pin_delay.insert(driver_pin, 0);
        }

        let timing_graph = TimingGraph::new(&netlist);
        let order = timing_graph.topological_sort();
        let mut start_delay: Vec<u64> = vec![0; timing_graph.len()];
        // Nodes whose own cost exceeds the budget; warned once each.
        let mut over_budget_reported: HashSet<NodeId> = HashSet::new();

        for &tn_idx in &order {
            let operator = timing_graph.node(tn_idx);
            for net_id in timing_graph.sink_net_ids(tn_idx, &netlist) {
                let net = netlist.get(&net_id).ok_or_else(|| {
                    TesseraError::invariant(format!("net {net_id} vanished from the netlist"))
                })?;

                // Every source pin must carry a wave and a delay by now;
                // the topological order guarantees its feeder was visited.
                let mut max_delay = start_delay[tn_idx];
                let mut waves: BTreeSet<u64> = BTreeSet::new();
                for &src_pin in &operator.src_pins {
                    let pin = pin_info.get(&src_pin).ok_or_else(|| {
                        TesseraError::invariant(format!("unknown source pin {src_pin}"))
                    })?;
                    let wave = *pin_wave.get(&src_pin).ok_or_else(|| {
                        TesseraError::invariant(format!(
                            "no wave number for pin {} of operator {}",
                            pin.name, operator.name
                        ))
                    })?;
                    waves.insert(wave);
                    let delay = *pin_delay.get(&src_pin).ok_or_else(|| {
                        TesseraError::invariant(format!(
                            "no delay for pin {} of operator {}",
                            pin.name, operator.name
                        ))
                    })?;
                    max_delay = max_delay.max(delay);
                }

                // The source-side delay is already folded into max_delay;
                // the operator's driver pins all see it.
                for &driver_pin in &operator.sink_pins {
                    pin_delay.insert(driver_pin, max_delay);
                }

                let src_wave = if waves.is_empty() {
                    0
                } else if waves.len() == 1 {
                    *waves.iter().next().unwrap_or(&0)
                } else {
                    wave_matching(
                        &mut routed,
                        arena,
                        &pin_to_net,
                        &pin_info,
                        &operator.src_pins,
                        &mut pin_wave,
                    )?
                };

                let node_delay = self.propagate_net_delay(
                    arena,
                    &mut routed,
                    net_id,
                    net.driver().node,
                    max_delay,
                    src_wave,
                    allowed,
                    &model,
                    &node_to_pin,
                    &mut pin_wave,
                    &mut pin_delay,
                    &mut over_budget_reported,
                    sink,
                )?;

                // Seed successor operators with the delay observed at their
                // receiving pins on this net.
                for &next_idx in &timing_graph.node(tn_idx).next {
                    for &src_pin in &timing_graph.node(next_idx).src_pins {
                        let Some(pin) = pin_info.get(&src_pin) else {
                            continue;
                        };
                        if let Some(&delay) = node_delay.get(&pin.node) {
                            start_delay[next_idx] = start_delay[next_idx].max(delay);
                        }
                    }
                }
            }
        }

        // Hand the final routes back; each router takes only its own nets.
        let final_routes: BTreeMap<NetId, _> =
            routed.iter().map(|(&id, graph)| (id, graph.route())).collect();
        for router in routers.iter_mut() {
            let owned: BTreeMap<NetId, _> = final_routes
                .iter()
                .filter(|(&id, _)| router.has_net(id))
                .map(|(&id, segments)| (id, segments.clone()))
                .collect();
            router.set_current_routes(owned);
        }

        Ok(RetimingReport {
            max_wave: max_wave_number(&pin_wave),
            pin_wave,
            pin_delay,
        })
    }

    /// Pushes delay through one net's segments to a fix point, inserting
    /// pipeline registers where the budget is exceeded. Returns the final
    /// per-node delay map of the net.
    #[allow(clippy::too_many_arguments)]
    fn propagate_net_delay(
        &self,
        arena: &mut NodeArena,
        routed: &mut BTreeMap<NetId, RoutedGraph>,
        net_id: NetId,
        source_node: NodeId,
        max_delay: u64,
        src_wave: u64,
        allowed: u64,
        model: &DelayModel<'_>,
        node_to_pin: &HashMap<NodeId, PinId>,
        pin_wave: &mut HashMap<PinId, u64>,
        pin_delay: &mut HashMap<PinId, u64>,
        over_budget_reported: &mut HashSet<NodeId>,
        sink: &DiagnosticSink,
    ) -> TesseraResult<HashMap<NodeId, u64>> {
        let graph = routed.get_mut(&net_id).ok_or_else(|| {
            TesseraError::invariant(format!("no routed graph for net {net_id}"))
        })?;

        let mut node_delay: HashMap<NodeId, u64> = HashMap::new();
        node_delay.insert(source_node, max_delay);

        loop {
            let mut updated = false;
            let segments = graph.route();
            let order = graph.pin_order(&segments);

            'segments: for pin_id in order {
                let segment = &segments[&pin_id];
                let last_node = *segment.last().ok_or_else(|| {
                    TesseraError::invariant(format!("empty segment for pin {pin_id}"))
                })?;
                let last_pin = *node_to_pin.get(&last_node).ok_or_else(|| {
                    TesseraError::invariant(format!(
                        "terminal node {} of net {net_id} has no pin",
                        arena.get(last_node).name
                    ))
                })?;
                let mut num_reg: u64 = 0;

                for i in 1..segment.len() {
                    let cur = segment[i];
                    let prev = segment[i - 1];
                    let mut delay = *node_delay.get(&prev).ok_or_else(|| {
                        TesseraError::invariant(format!(
                            "no delay recorded for node {}",
                            arena.get(prev).name
                        ))
                    })?;

                    // A register mid-segment starts a new pipeline stage. A
                    // register as the segment terminal is an operator of its
                    // own and just contributes its cost.
                    let starts_stage = arena.get(cur).is_register() && i != segment.len() - 1;
                    if starts_stage {
                        delay = 0;
                        num_reg += 1;
                    } else {
                        delay += model.delay_of(arena.get(cur))?;
                    }

                    if delay > allowed && !starts_stage {
                        // Register the wire feeding `cur`: walk back past
                        // switch-box inputs to the wire that can hold a
                        // register.
                        let mut j = i - 1;
                        while j > 0 && arena.get(segment[j]).is_sb_in() {
                            j -= 1;
                        }
                        let anchor = segment[j];
                        if arena.get(anchor).is_register() {
                            // The stage is already bounded by a register;
                            // cur's own cost exceeds the budget and no
                            // insertion can fix that.
                            if over_budget_reported.insert(cur) {
                                sink.emit(
                                    Diagnostic::warning(format!(
                                        "combinational delay {delay} exceeds the clock budget \
                                         {allowed} and cannot be pipelined further"
                                    ))
                                    .with_entity(arena.get(cur).name.clone()),
                                );
                            }
                        } else {
                            let affected = graph.insert_reg_output(arena, anchor, true);
                            if affected.is_empty() {
                                return Err(TesseraError::InsertionFailure {
                                    node: arena.get(anchor).name.clone(),
                                });
                            }
                            num_reg += 1;
                            pin_wave.insert(last_pin, src_wave + num_reg);
                            node_delay.clear();
                            node_delay.insert(source_node, max_delay);
                            updated = true;
                            break 'segments;
                        }
                    }

                    node_delay.insert(cur, delay);
                    pin_wave.insert(last_pin, src_wave + num_reg);
                    pin_delay.insert(last_pin, delay);
                }
            }

            if !updated {
                return Ok(node_delay);
            }
        }
    }
}

/// Raises every lagging source pin to the highest wave among them.
///
/// A lagging pin is brought forward by inserting pipeline registers on the
/// route of the net feeding it; each insertion advances the waves of every
/// receiver sharing the registered wire. Stops when no pin is below the
/// target wave (a pin pushed past it by a shared wire does not block
/// termination) and returns the target.
fn wave_matching(
    routed: &mut BTreeMap<NetId, RoutedGraph>,
    arena: &mut NodeArena,
    pin_to_net: &HashMap<PinId, NetId>,
    pin_info: &HashMap<PinId, Pin>,
    src_pins: &[PinId],
    pin_wave: &mut HashMap<PinId, u64>,
) -> TesseraResult<u64> {
    let mut max_wave = 0;
    for &pin in src_pins {
        max_wave = max_wave.max(pin_wave.get(&pin).copied().unwrap_or(0));
    }

    loop {
        let lagging = src_pins
            .iter()
            .copied()
            .find(|pin| pin_wave.get(pin).copied().unwrap_or(0) < max_wave);
        let Some(pin) = lagging else {
            return Ok(max_wave);
        };
        let pin_name = pin_info
            .get(&pin)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| pin.to_string());
        let net_id = *pin_to_net.get(&pin).ok_or_else(|| {
            TesseraError::invariant(format!("pin {pin_name} belongs to no net"))
        })?;
        let graph = routed.get_mut(&net_id).ok_or_else(|| {
            TesseraError::invariant(format!("no routed graph for net {net_id}"))
        })?;
        let affected = graph.insert_pipeline_reg(arena, pin);
        if affected.is_empty() {
            return Err(TesseraError::InsertionFailure { node: pin_name });
        }
        for advanced in affected {
            *pin_wave.entry(advanced).or_insert(0) += 1;
        }
    }
}
