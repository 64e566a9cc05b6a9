//! Wave-aligned retiming and static timing analysis for the Tessera CGRA
//! toolchain.
//!
//! Given an already-routed netlist, the retimer inserts pipeline registers
//! so that (a) every combinational wire span meets the target clock period
//! and (b) every multi-input operator receives all of its inputs on the
//! same wavefront. The pass interleaves a topological traversal of the
//! logical [`TimingGraph`] with in-place mutation of the physical routed
//! graphs, restarting the per-net delay propagation whenever it mutates a
//! route.
//!
//! # Usage
//!
//! ```ignore
//! use tessera_retime::RetimingPass;
//!
//! let pass = RetimingPass::new(&layout, &costs, clock);
//! let report = pass.run(&mut arena, &mut [&mut router], &sink)?;
//! println!("pipeline depth: {}", report.max_wave);
//! ```

#![warn(missing_docs)]

pub mod delay;
pub mod graph;
pub mod retime;

pub use delay::DelayModel;
pub use graph::{TimingGraph, TimingNode};
pub use retime::{max_wave_number, source_pins, RetimingPass, RetimingReport};

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tessera_common::ClockSpec;
    use tessera_diagnostics::DiagnosticSink;
    use tessera_fabric::{
        LayoutGrid, Net, NetId, Netlist, NodeArena, NodeId, NodeKind, Pin, PinId, RouteSegments,
        RoutedGraph, Router, SwitchBoxIo, TimingCostTable,
    };

    /// A router owning a slice of the netlist, as the maze router would.
    struct TestRouter {
        netlist: Netlist,
        routes: BTreeMap<NetId, RouteSegments>,
    }

    impl TestRouter {
        fn new(netlist: Netlist, routes: BTreeMap<NetId, RouteSegments>) -> Self {
            Self { netlist, routes }
        }

        fn segment(&self, net: u32, pin: u32) -> &[NodeId] {
            &self.routes[&NetId::from_raw(net)][&PinId::from_raw(pin)]
        }
    }

    impl Router for TestRouter {
        fn netlist(&self) -> &Netlist {
            &self.netlist
        }

        fn routed_graphs(&self) -> BTreeMap<NetId, RoutedGraph> {
            self.routes
                .iter()
                .map(|(&id, segments)| (id, RoutedGraph::new(id, segments.clone())))
                .collect()
        }

        fn has_net(&self, net: NetId) -> bool {
            self.netlist.contains_key(&net)
        }

        fn set_current_routes(&mut self, routes: BTreeMap<NetId, RouteSegments>) {
            for (id, segments) in routes {
                self.routes.insert(id, segments);
            }
        }
    }

    struct NetBuilder {
        arena: NodeArena,
        netlist: Netlist,
        routes: BTreeMap<NetId, RouteSegments>,
        next_pin: u32,
    }

    impl NetBuilder {
        fn new() -> Self {
            Self {
                arena: NodeArena::new(),
                netlist: Netlist::new(),
                routes: BTreeMap::new(),
                next_pin: 0,
            }
        }

        fn node(&mut self, name: &str, x: u32, y: u32, kind: NodeKind) -> NodeId {
            self.arena.alloc(name, x, y, kind)
        }

        fn pin(&mut self, name: &str, port: &str, x: u32, y: u32, node: NodeId) -> Pin {
            let id = PinId::from_raw(self.next_pin);
            self.next_pin += 1;
            Pin {
                id,
                x,
                y,
                name: name.to_string(),
                port: port.to_string(),
                node,
            }
        }

        /// Adds a net and one segment per receiver.
        fn net(&mut self, id: u32, pins: Vec<Pin>, segments: Vec<Vec<NodeId>>) {
            let net_id = NetId::from_raw(id);
            let mut route = RouteSegments::new();
            for (receiver, segment) in pins[1..].iter().zip(segments) {
                route.insert(receiver.id, segment);
            }
            self.routes.insert(net_id, route);
            self.netlist.insert(net_id, Net { id: net_id, pins });
        }

        fn finish(self) -> (NodeArena, TestRouter) {
            (self.arena, TestRouter::new(self.netlist, self.routes))
        }
    }

    fn count_registers(arena: &NodeArena, segment: &[NodeId]) -> usize {
        segment
            .iter()
            .filter(|&&n| arena.get(n).is_register())
            .count()
    }

    /// Sums delays between consecutive registers of a segment and checks
    /// every wire span against the budget. The terminal node is excluded:
    /// its cost belongs to the downstream operator.
    fn assert_spans_within_budget(
        arena: &NodeArena,
        layout: &LayoutGrid,
        costs: &TimingCostTable,
        segment: &[NodeId],
        allowed: u64,
    ) {
        let model = DelayModel::new(layout, costs);
        let mut span = 0;
        for &node_id in &segment[1..segment.len() - 1] {
            let node = arena.get(node_id);
            if node.is_register() {
                assert!(span <= allowed, "wire span {span} exceeds budget {allowed}");
                span = 0;
            } else {
                span += model.delay_of(node).unwrap();
            }
        }
        assert!(span <= allowed, "tail span {span} exceeds budget {allowed}");
    }

    /// One net from a primary input to a PE, with a single hop through a
    /// switch box. The PE's operation alone exceeds the clock budget, so
    /// the pass registers the crossing wire once and accepts the rest.
    fn io_path() -> (NodeArena, TestRouter) {
        let mut b = NetBuilder::new();
        let drv = b.node("I0", 0, 0, NodeKind::Port);
        let sb_out = b.node("sb_out_0_0", 0, 0, NodeKind::SwitchBox(SwitchBoxIo::SbOut));
        let sb_in = b.node("sb_in_1_0", 1, 0, NodeKind::SwitchBox(SwitchBoxIo::SbIn));
        let dst = b.node("p1", 1, 0, NodeKind::Port);
        let p_drv = b.pin("I0", "out", 0, 0, drv);
        let p_dst = b.pin("p1", "in", 1, 0, dst);
        b.net(0, vec![p_drv, p_dst], vec![vec![drv, sb_out, sb_in, dst]]);
        b.finish()
    }

    fn io_costs() -> TimingCostTable {
        TimingCostTable {
            clb_op: 5,
            clb_sb: 5,
            ..TimingCostTable::default()
        }
    }

    #[test]
    fn trivial_io_path_gets_one_register() {
        let (mut arena, mut router) = io_path();
        let layout = LayoutGrid::from_rows(&["ip"]);
        let costs = io_costs();
        let sink = DiagnosticSink::new();
        // 500000 MHz target: a budget of 2 delay units per stage.
        let pass = RetimingPass::new(&layout, &costs, ClockSpec::new(500_000));
        let report = pass.run(&mut arena, &mut [&mut router], &sink).unwrap();

        assert_eq!(report.max_wave, 1);
        assert_eq!(report.pin_wave[&PinId::from_raw(1)], 1);

        let segment = router.segment(0, 1);
        assert_eq!(segment.len(), 5);
        assert_eq!(count_registers(&arena, segment), 1);
        // The register sits right after the driver-side switch-box output.
        assert_eq!(arena.get(segment[1]).name, "sb_out_0_0");
        assert!(arena.get(segment[2]).is_register());
        // The PE operation itself cannot meet a budget of 2; the pass says so.
        let diags = sink.take_all();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].entity.as_deref(), Some("p1"));
    }

    #[test]
    fn retime_is_idempotent() {
        let (mut arena, mut router) = io_path();
        let layout = LayoutGrid::from_rows(&["ip"]);
        let costs = io_costs();
        let pass = RetimingPass::new(&layout, &costs, ClockSpec::new(500_000));

        let sink = DiagnosticSink::new();
        let first = pass.run(&mut arena, &mut [&mut router], &sink).unwrap();
        let nodes_after_first = arena.len();
        let segment_after_first = router.segment(0, 1).to_vec();

        let second = pass.run(&mut arena, &mut [&mut router], &sink).unwrap();
        assert_eq!(second.max_wave, first.max_wave);
        assert_eq!(arena.len(), nodes_after_first, "no new registers");
        assert_eq!(router.segment(0, 1), segment_after_first.as_slice());
    }

    /// Two nets feed an adder: one arrives two waves late of the other.
    /// The lagging input's feeder route gets two registers.
    #[test]
    fn wave_mismatch_is_matched_on_the_feeder_net() {
        let mut b = NetBuilder::new();
        // Net 0: I0 -> a, pre-pipelined with two registers.
        let i0 = b.node("I0", 0, 0, NodeKind::Port);
        let r0 = b.node("r_pre_0", 0, 0, NodeKind::Register);
        let r1 = b.node("r_pre_1", 0, 0, NodeKind::Register);
        let a_in0 = b.node("a_in0", 1, 0, NodeKind::Port);
        let p_i0 = b.pin("I0", "out", 0, 0, i0);
        let p_a0 = b.pin("a", "in0", 1, 0, a_in0);
        b.net(0, vec![p_i0, p_a0], vec![vec![i0, r0, r1, a_in0]]);

        // Net 1: I1 -> a, unpipelined.
        let i1 = b.node("I1", 0, 1, NodeKind::Port);
        let a_in1 = b.node("a_in1", 1, 0, NodeKind::Port);
        let p_i1 = b.pin("I1", "out", 0, 1, i1);
        let p_a1 = b.pin("a", "in1", 1, 0, a_in1);
        b.net(1, vec![p_i1, p_a1], vec![vec![i1, a_in1]]);

        // Net 2: a -> o, so the adder is actually processed.
        let a_out = b.node("a_out", 1, 0, NodeKind::Port);
        let o_in = b.node("o_in", 2, 0, NodeKind::Port);
        let p_a_out = b.pin("a", "out", 1, 0, a_out);
        let p_o = b.pin("o1", "in", 2, 0, o_in);
        b.net(2, vec![p_a_out, p_o], vec![vec![a_out, o_in]]);

        let (mut arena, mut router) = b.finish();
        let layout = LayoutGrid::from_rows(&["ippp", "ippp"]);
        let costs = TimingCostTable::default();
        let sink = DiagnosticSink::new();
        let pass = RetimingPass::new(&layout, &costs, ClockSpec::new(1));
        let report = pass.run(&mut arena, &mut [&mut router], &sink).unwrap();

        // Both adder inputs sit on wave 2 now.
        assert_eq!(report.pin_wave[&PinId::from_raw(1)], 2);
        assert_eq!(report.pin_wave[&PinId::from_raw(3)], 2);
        assert_eq!(report.max_wave, 2);
        // The two catch-up registers landed on I1's route, not I0's.
        assert_eq!(count_registers(&arena, router.segment(1, 3)), 2);
        assert_eq!(count_registers(&arena, router.segment(0, 1)), 2);
        // Waves never decrease along the path.
        assert!(report.pin_wave[&PinId::from_raw(5)] >= report.pin_wave[&PinId::from_raw(1)]);
    }

    /// Memory ports carry the access cost, but only explicit registers
    /// advance the wave.
    #[test]
    fn memory_cost_does_not_advance_waves() {
        let mut b = NetBuilder::new();
        // Net 0: p0 -> m1 (into the memory tile).
        let p0 = b.node("p0", 0, 0, NodeKind::Port);
        let m_in = b.node("m1_in", 1, 0, NodeKind::Port);
        let pin_p0 = b.pin("p0", "out", 0, 0, p0);
        let pin_m = b.pin("m1", "in", 1, 0, m_in);
        b.net(0, vec![pin_p0, pin_m], vec![vec![p0, m_in]]);

        // Net 1: m1 -> p2 (out of the memory tile).
        let m_out = b.node("m1_out", 1, 0, NodeKind::Port);
        let p2 = b.node("p2", 2, 0, NodeKind::Port);
        let pin_m_out = b.pin("m1", "out", 1, 0, m_out);
        let pin_p2 = b.pin("p2", "in", 2, 0, p2);
        b.net(1, vec![pin_m_out, pin_p2], vec![vec![m_out, p2]]);

        let (mut arena, mut router) = b.finish();
        let layout = LayoutGrid::from_rows(&["pmp"]);
        let costs = TimingCostTable {
            clb_op: 1,
            mem: 3,
            ..TimingCostTable::default()
        };
        let sink = DiagnosticSink::new();
        // Budget of 10: nothing needs pipelining.
        let pass = RetimingPass::new(&layout, &costs, ClockSpec::new(100_000));
        let report = pass.run(&mut arena, &mut [&mut router], &sink).unwrap();

        assert_eq!(report.max_wave, 0);
        // The memory access cost shows up in the delays…
        assert_eq!(report.pin_delay[&PinId::from_raw(1)], 3);
        assert_eq!(report.pin_delay[&PinId::from_raw(3)], 4);
        // …but no register was created anywhere.
        assert_eq!(count_registers(&arena, router.segment(0, 1)), 0);
        assert_eq!(count_registers(&arena, router.segment(1, 3)), 0);
    }

    /// A chain of routing muxes long enough to need two pipeline stages.
    #[test]
    fn long_wire_is_cut_into_stages() {
        let mut b = NetBuilder::new();
        let i0 = b.node("I0", 0, 0, NodeKind::Port);
        let g1 = b.node("rmux_1", 1, 0, NodeKind::Generic);
        let g2 = b.node("rmux_2", 2, 0, NodeKind::Generic);
        let g3 = b.node("rmux_3", 3, 0, NodeKind::Generic);
        let p1 = b.node("p1", 4, 0, NodeKind::Port);
        let p_drv = b.pin("I0", "out", 0, 0, i0);
        let p_dst = b.pin("p1", "in", 4, 0, p1);
        b.net(0, vec![p_drv, p_dst], vec![vec![i0, g1, g2, g3, p1]]);

        let (mut arena, mut router) = b.finish();
        let layout = LayoutGrid::from_rows(&["ipppp"]);
        let costs = TimingCostTable {
            rmux: 3,
            ..TimingCostTable::default()
        };
        let sink = DiagnosticSink::new();
        // Budget 4: each mux costs 3, so no two muxes fit one stage.
        let pass = RetimingPass::new(&layout, &costs, ClockSpec::new(250_000));
        let report = pass.run(&mut arena, &mut [&mut router], &sink).unwrap();

        assert_eq!(report.max_wave, 2);
        let segment = router.segment(0, 1);
        assert_eq!(count_registers(&arena, segment), 2);
        assert_spans_within_budget(&arena, &layout, &costs, segment, 4);
        assert!(!sink.has_errors());
        assert!(sink.take_all().is_empty(), "budget is satisfiable");
    }

    #[test]
    fn routes_are_handed_back_per_router() {
        // Router A owns net 0 (I0 -> p0), router B owns net 1 (p0 -> p1).
        let mut b = NetBuilder::new();
        let i0 = b.node("I0", 0, 0, NodeKind::Port);
        let p0_in = b.node("p0_in", 1, 0, NodeKind::Port);
        let p_i0 = b.pin("I0", "out", 0, 0, i0);
        let p_p0 = b.pin("p0", "in", 1, 0, p0_in);
        b.net(0, vec![p_i0, p_p0], vec![vec![i0, p0_in]]);

        let p0_out = b.node("p0_out", 1, 0, NodeKind::Port);
        let p1_in = b.node("p1_in", 2, 0, NodeKind::Port);
        let p_p0_out = b.pin("p0", "out", 1, 0, p0_out);
        let p_p1 = b.pin("p1", "in", 2, 0, p1_in);
        b.net(1, vec![p_p0_out, p_p1], vec![vec![p0_out, p1_in]]);

        let (mut arena, combined) = b.finish();
        let mut netlist_a = Netlist::new();
        let mut netlist_b = Netlist::new();
        let mut routes_a = BTreeMap::new();
        let mut routes_b = BTreeMap::new();
        for (id, net) in combined.netlist {
            if id == NetId::from_raw(0) {
                routes_a.insert(id, combined.routes[&id].clone());
                netlist_a.insert(id, net);
            } else {
                routes_b.insert(id, combined.routes[&id].clone());
                netlist_b.insert(id, net);
            }
        }
        let mut router_a = TestRouter::new(netlist_a, routes_a);
        let mut router_b = TestRouter::new(netlist_b, routes_b);

        let layout = LayoutGrid::from_rows(&["ippp"]);
        let costs = TimingCostTable::default();
        let sink = DiagnosticSink::new();
        let pass = RetimingPass::new(&layout, &costs, ClockSpec::new(1));
        let report = pass
            .run(&mut arena, &mut [&mut router_a, &mut router_b], &sink)
            .unwrap();

        assert_eq!(report.max_wave, 0);
        assert!(router_a.routes.contains_key(&NetId::from_raw(0)));
        assert!(!router_a.routes.contains_key(&NetId::from_raw(1)));
        assert!(router_b.routes.contains_key(&NetId::from_raw(1)));
        assert!(!router_b.routes.contains_key(&NetId::from_raw(0)));
    }

    #[test]
    fn duplicate_net_ownership_fails() {
        let (mut arena, router) = io_path();
        let netlist = router.netlist.clone();
        let routes = router.routes.clone();
        let mut router_a = TestRouter::new(netlist.clone(), routes.clone());
        let mut router_b = TestRouter::new(netlist, routes);

        let layout = LayoutGrid::from_rows(&["ip"]);
        let costs = io_costs();
        let sink = DiagnosticSink::new();
        let pass = RetimingPass::new(&layout, &costs, ClockSpec::new(500_000));
        let err = pass
            .run(&mut arena, &mut [&mut router_a, &mut router_b], &sink)
            .unwrap_err();
        assert!(err.to_string().contains("more than one router"));
    }

    #[test]
    fn missing_routed_graph_fails() {
        let (mut arena, router) = io_path();
        let mut bare = TestRouter::new(router.netlist.clone(), BTreeMap::new());

        let layout = LayoutGrid::from_rows(&["ip"]);
        let costs = io_costs();
        let sink = DiagnosticSink::new();
        let pass = RetimingPass::new(&layout, &costs, ClockSpec::new(500_000));
        let err = pass.run(&mut arena, &mut [&mut bare], &sink).unwrap_err();
        assert!(err.to_string().contains("no routed graph"));
    }

    #[test]
    fn empty_netlist_is_a_no_op() {
        let mut arena = NodeArena::new();
        let mut router = TestRouter::new(Netlist::new(), BTreeMap::new());
        let layout = LayoutGrid::from_rows(&["ip"]);
        let costs = TimingCostTable::default();
        let sink = DiagnosticSink::new();
        let pass = RetimingPass::new(&layout, &costs, ClockSpec::new(100));
        let report = pass.run(&mut arena, &mut [&mut router], &sink).unwrap();
        assert_eq!(report.max_wave, 0);
        assert!(report.pin_wave.is_empty());
    }
}
